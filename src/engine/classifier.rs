use crate::dom::{HostDocument, NodeId};
use crate::engine::cache::SelectionCaches;
use crate::engine::constants::{DEV_TOOLS_OVERLAY_Z_INDEX_THRESHOLD, OVERLAY_Z_INDEX_THRESHOLD};
use crate::engine::constants::{IGNORE_TAGS, OVERLAY_ROOT_ATTRIBUTE, USER_IGNORE_ATTRIBUTE};
use crate::engine::constants::VIEWPORT_COVERAGE_THRESHOLD;
use std::time::Instant;

/// Decide whether a node may be hovered or selected.
///
/// Structural checks (connection, ignored tags, overlay and opt-out subtrees) always run;
/// the visual verdict is cached per node.
pub fn is_valid_selectable_element<D: HostDocument + ?Sized>(
    doc: &D,
    caches: &mut SelectionCaches,
    node: NodeId,
    now: Instant,
) -> bool {
    if !doc.is_connected(node) {
        return false;
    }
    if node == doc.document_element() || node == doc.body() {
        return false;
    }
    if IGNORE_TAGS.contains(&doc.tag_name(node).as_str()) {
        return false;
    }
    if doc.closest_with_attribute(node, OVERLAY_ROOT_ATTRIBUTE).is_some() {
        return false;
    }
    if doc.closest_with_attribute(node, USER_IGNORE_ATTRIBUTE).is_some() {
        return false;
    }

    if let Some(visible) = caches.visibility(node, now) {
        return visible;
    }

    let visible = classify_visual(doc, node);
    caches.store_visibility(node, visible, now);
    visible
}

fn classify_visual<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> bool {
    if is_dev_tools_overlay(doc, node) {
        log::trace!("Rejecting dev tools overlay {}", node);
        return false;
    }
    if is_full_viewport_overlay(doc, node) {
        log::trace!("Rejecting full viewport overlay {}", node);
        return false;
    }

    doc.bounding_client_rect(node).has_area() && is_element_visible(doc, node)
}

/// `display`, `visibility`, `opacity` and the `hidden` attribute
pub fn is_element_visible<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> bool {
    doc.computed_style(node, "display") != "none"
        && doc.computed_style(node, "visibility") != "hidden"
        && doc.computed_style(node, "opacity") != "0"
        && !doc.has_attribute(node, "hidden")
}

fn z_index<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> Option<i64> {
    parse_css_int(&doc.computed_style(node, "z-index"))
}

/// `parseInt` semantics: leading integer, trailing garbage ignored
fn parse_css_int(value: &str) -> Option<i64> {
    let value = value.trim();
    let end = value
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

fn is_dev_tools_overlay<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> bool {
    doc.computed_style(node, "pointer-events") == "none"
        && doc.computed_style(node, "position") == "fixed"
        && z_index(doc, node).is_some_and(|z| z >= DEV_TOOLS_OVERLAY_Z_INDEX_THRESHOLD)
}

fn is_full_viewport_overlay<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> bool {
    let position = doc.computed_style(node, "position");
    if position != "fixed" && position != "absolute" {
        return false;
    }

    let (viewport_width, viewport_height) = doc.viewport_size();
    if viewport_width <= 0.0 || viewport_height <= 0.0 {
        return false;
    }

    let rect = doc.bounding_client_rect(node);
    let covers_viewport = rect.width / viewport_width >= VIEWPORT_COVERAGE_THRESHOLD
        && rect.height / viewport_height >= VIEWPORT_COVERAGE_THRESHOLD;
    if !covers_viewport {
        return false;
    }

    let background = doc.computed_style(node, "background-color");
    let opacity = doc.computed_style(node, "opacity").trim().parse::<f64>().unwrap_or(1.0);
    if background == "transparent" || background == "rgba(0, 0, 0, 0)" || opacity < 0.1 {
        return true;
    }

    z_index(doc, node).is_some_and(|z| z > OVERLAY_Z_INDEX_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomTree, ElementNode};
    use std::time::Duration;

    fn classify(tree: &DomTree, id: &str) -> bool {
        let node = tree.element_by_id(id).unwrap();
        is_valid_selectable_element(tree, &mut SelectionCaches::default(), node, Instant::now())
    }

    fn page(children: Vec<ElementNode>) -> DomTree {
        DomTree::new(ElementNode::new("body").with_children(children))
    }

    #[test]
    fn test_plain_element_is_selectable() {
        let tree = page(vec![
            ElementNode::new("button")
                .with_attribute("id", "cta")
                .with_bounding_box(10.0, 10.0, 120.0, 40.0),
        ]);
        assert!(classify(&tree, "cta"));
    }

    #[test]
    fn test_structural_rejections() {
        let tree = page(vec![
            ElementNode::new("script")
                .with_attribute("id", "script")
                .with_bounding_box(0.0, 0.0, 10.0, 10.0),
            ElementNode::new("div")
                .with_attribute("data-wiblo-design-overlay", "")
                .with_bounding_box(0.0, 0.0, 10.0, 10.0)
                .with_child(
                    ElementNode::new("span")
                        .with_attribute("id", "in-overlay")
                        .with_bounding_box(0.0, 0.0, 5.0, 5.0),
                ),
            ElementNode::new("aside")
                .with_attribute("data-wiblo-ignore", "")
                .with_bounding_box(0.0, 0.0, 10.0, 10.0)
                .with_child(
                    ElementNode::new("p")
                        .with_attribute("id", "ignored")
                        .with_bounding_box(0.0, 0.0, 5.0, 5.0),
                ),
        ]);
        assert!(!classify(&tree, "script"));
        assert!(!classify(&tree, "in-overlay"));
        assert!(!classify(&tree, "ignored"));

        let mut caches = SelectionCaches::default();
        let now = Instant::now();
        assert!(!is_valid_selectable_element(&tree, &mut caches, tree.body(), now));
        assert!(!is_valid_selectable_element(&tree, &mut caches, tree.document_element(), now));
    }

    #[test]
    fn test_visual_rejections() {
        let sized = |id: &str| {
            ElementNode::new("div")
                .with_attribute("id", id)
                .with_bounding_box(0.0, 0.0, 50.0, 50.0)
        };
        let tree = page(vec![
            ElementNode::new("div").with_attribute("id", "empty"),
            sized("display").with_style("display", "none"),
            sized("visibility").with_style("visibility", "hidden"),
            sized("opacity").with_style("opacity", "0"),
            sized("hidden").with_attribute("hidden", ""),
        ]);
        for id in ["empty", "display", "visibility", "opacity", "hidden"] {
            assert!(!classify(&tree, id), "{id} should be rejected");
        }
    }

    #[test]
    fn test_dev_tools_overlay() {
        let tree = page(vec![
            ElementNode::new("div")
                .with_attribute("id", "devtools")
                .with_bounding_box(0.0, 0.0, 300.0, 30.0)
                .with_style("position", "fixed")
                .with_style("pointer-events", "none")
                .with_style("z-index", "2147483647"),
            ElementNode::new("div")
                .with_attribute("id", "toast")
                .with_bounding_box(0.0, 0.0, 300.0, 30.0)
                .with_style("position", "fixed")
                .with_style("pointer-events", "none")
                .with_style("z-index", "50"),
        ]);
        assert!(!classify(&tree, "devtools"));
        assert!(classify(&tree, "toast"));
    }

    #[test]
    fn test_full_viewport_overlays() {
        let cover = |id: &str| {
            ElementNode::new("div")
                .with_attribute("id", id)
                .with_bounding_box(0.0, 0.0, 1280.0, 760.0)
                .with_style("position", "fixed")
        };
        let tree = page(vec![
            cover("transparent"),
            cover("high-z")
                .with_style("background-color", "rgb(0, 0, 0)")
                .with_style("z-index", "1001"),
            cover("modal")
                .with_style("background-color", "rgb(255, 255, 255)")
                .with_style("z-index", "10"),
            cover("faded")
                .with_style("background-color", "rgb(0, 0, 0)")
                .with_style("opacity", "0.05"),
        ]);
        assert!(!classify(&tree, "transparent"));
        assert!(!classify(&tree, "high-z"));
        assert!(classify(&tree, "modal"));
        assert!(!classify(&tree, "faded"));
    }

    #[test]
    fn test_verdict_is_cached_until_ttl() {
        let mut tree = page(vec![
            ElementNode::new("div")
                .with_attribute("id", "box")
                .with_bounding_box(0.0, 0.0, 50.0, 50.0),
        ]);
        let node = tree.element_by_id("box").unwrap();
        let mut caches = SelectionCaches::default();
        let start = Instant::now();

        assert!(is_valid_selectable_element(&tree, &mut caches, node, start));
        tree.set_declared_style(node, "visibility", "hidden").unwrap();
        let within_ttl = start + Duration::from_millis(10);
        assert!(is_valid_selectable_element(&tree, &mut caches, node, within_ttl));
        let expired = start + Duration::from_millis(60);
        assert!(!is_valid_selectable_element(&tree, &mut caches, node, expired));
    }

    #[test]
    fn test_parse_css_int() {
        assert_eq!(parse_css_int("2147483647"), Some(2_147_483_647));
        assert_eq!(parse_css_int("-5"), Some(-5));
        assert_eq!(parse_css_int("12px"), Some(12));
        assert_eq!(parse_css_int("auto"), None);
    }
}
