use crate::dom::{HostDocument, NodeId};
use crate::engine::cache::SelectionCaches;
use crate::engine::constants::{MAX_TRANSFORM_ANCESTOR_DEPTH, TRANSFORM_EARLY_BAIL_DEPTH};
use crate::engine::matrix::Matrix2D;
use crate::protocol::ElementBounds;
use std::time::Instant;

/// Transform-corrected bounds of a node, cached per node for a short TTL
pub fn create_element_bounds<D: HostDocument + ?Sized>(
    doc: &D,
    caches: &mut SelectionCaches,
    node: NodeId,
    now: Instant,
) -> ElementBounds {
    if let Some(bounds) = caches.bounds(node, now) {
        return bounds;
    }

    let bounds = measure_bounds(doc, node);
    caches.store_bounds(node, bounds.clone(), now);
    bounds
}

fn measure_bounds<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> ElementBounds {
    let rect = doc.bounding_client_rect(node);
    let transform = accumulated_transform(doc, node, &doc.computed_style(node, "transform"));

    let border_radius = match doc.computed_style(node, "border-radius") {
        radius if radius.is_empty() => "0px".to_string(),
        radius => radius,
    };

    let layout_size = doc.offset_size(node).filter(|(width, height)| *width > 0.0 && *height > 0.0);

    match layout_size {
        Some((width, height)) if transform != "none" => {
            let center_x = rect.left() + rect.width * 0.5;
            let center_y = rect.top() + rect.height * 0.5;
            ElementBounds {
                x: center_x - width * 0.5,
                y: center_y - height * 0.5,
                width,
                height,
                border_radius,
                transform,
            }
        }
        _ => ElementBounds {
            x: rect.left(),
            y: rect.top(),
            width: rect.width,
            height: rect.height,
            border_radius,
            transform,
        },
    }
}

fn parse_transform(value: &str) -> Option<Matrix2D> {
    match Matrix2D::parse(value) {
        Ok(matrix) => Some(matrix),
        Err(e) => {
            log::debug!("Ignoring transform: {}", e);
            None
        }
    }
}

/// Combined rotation/scale/skew of the node and its nearest ancestors as CSS text.
///
/// Ancestor matrices multiply as `ancestor × accumulated`; the node's own transform is
/// applied last. Translation is dropped.
fn accumulated_transform<D: HostDocument + ?Sized>(
    doc: &D,
    node: NodeId,
    self_transform: &str,
) -> String {
    let self_matrix = match self_transform.trim() {
        "" | "none" => None,
        value => parse_transform(value),
    };

    let mut accumulated: Option<Matrix2D> = None;
    let mut current = doc.parent(node);
    let mut depth = 0;

    while let Some(ancestor) = current {
        if ancestor == doc.document_element() || depth >= MAX_TRANSFORM_ANCESTOR_DEPTH {
            break;
        }

        let value = doc.computed_style(ancestor, "transform");
        let matrix = match value.trim() {
            "" | "none" => None,
            value => parse_transform(value),
        };

        match matrix {
            Some(matrix) => {
                accumulated = Some(match accumulated {
                    Some(inner) => matrix.multiply(&inner),
                    None => matrix,
                });
            }
            None if self_matrix.is_none()
                && accumulated.is_none()
                && depth >= TRANSFORM_EARLY_BAIL_DEPTH =>
            {
                return "none".to_string();
            }
            None => {}
        }

        current = doc.parent(ancestor);
        depth += 1;
    }

    let combined = match (accumulated, self_matrix) {
        (None, None) => return "none".to_string(),
        (None, Some(own)) => own,
        (Some(outer), None) => outer,
        (Some(outer), Some(own)) => outer.multiply(&own),
    };

    combined.to_css_without_translation()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomTree, ElementNode};
    use std::time::Duration;

    fn bounds_of(tree: &DomTree, id: &str) -> ElementBounds {
        let node = tree.element_by_id(id).unwrap();
        create_element_bounds(tree, &mut SelectionCaches::default(), node, Instant::now())
    }

    #[test]
    fn test_untransformed_bounds_equal_rect() {
        let tree = DomTree::new(
            ElementNode::new("body").with_child(
                ElementNode::new("div")
                    .with_attribute("id", "card")
                    .with_bounding_box(100.0, 100.0, 100.0, 50.0),
            ),
        );

        let bounds = bounds_of(&tree, "card");
        assert_eq!(bounds.x, 100.0);
        assert_eq!(bounds.y, 100.0);
        assert_eq!(bounds.width, 100.0);
        assert_eq!(bounds.height, 50.0);
        assert_eq!(bounds.transform, "none");
        assert_eq!(bounds.border_radius, "0px");
    }

    #[test]
    fn test_scaled_ancestor_uses_layout_size() {
        // the 100x50 card renders at 200x100 because its wrapper is scaled
        let tree = DomTree::new(
            ElementNode::new("body").with_child(
                ElementNode::new("div")
                    .with_attribute("id", "wrapper")
                    .with_style("transform", "matrix(2, 0, 0, 2, 0, 0)")
                    .with_bounding_box(0.0, 0.0, 800.0, 600.0)
                    .with_child(
                        ElementNode::new("div")
                            .with_attribute("id", "card")
                            .with_bounding_box(200.0, 200.0, 200.0, 100.0)
                            .with_offset_size(100.0, 50.0),
                    ),
            ),
        );

        let bounds = bounds_of(&tree, "card");
        assert_ne!(bounds.transform, "none");
        assert_eq!(bounds.transform, "matrix(2, 0, 0, 2, 0, 0)");
        assert_eq!(bounds.width, 100.0);
        assert_eq!(bounds.height, 50.0);
        // centered on the visual center (300, 250)
        assert_eq!(bounds.x, 250.0);
        assert_eq!(bounds.y, 225.0);
    }

    #[test]
    fn test_translation_is_stripped() {
        let tree = DomTree::new(
            ElementNode::new("body").with_child(
                ElementNode::new("div")
                    .with_attribute("id", "slide")
                    .with_style("transform", "translate(40px, 10px)")
                    .with_bounding_box(40.0, 10.0, 100.0, 100.0),
            ),
        );
        let bounds = bounds_of(&tree, "slide");
        assert_eq!(bounds.transform, "none");
        assert_eq!((bounds.x, bounds.y), (40.0, 10.0));
    }

    #[test]
    fn test_self_transform_after_ancestor() {
        let tree = DomTree::new(
            ElementNode::new("body").with_child(
                ElementNode::new("div")
                    .with_style("transform", "scale(2)")
                    .with_bounding_box(0.0, 0.0, 400.0, 400.0)
                    .with_child(
                        ElementNode::new("div")
                            .with_attribute("id", "icon")
                            .with_style("transform", "translateX(5px) scaleY(3)")
                            .with_bounding_box(0.0, 0.0, 40.0, 120.0)
                            .with_offset_size(20.0, 20.0),
                    ),
            ),
        );
        assert_eq!(bounds_of(&tree, "icon").transform, "matrix(2, 0, 0, 6, 0, 0)");
    }

    #[test]
    fn test_early_bail_after_plain_ancestors() {
        // transform sits four levels up, beyond the early-bail depth
        let leaf = ElementNode::new("span")
            .with_attribute("id", "leaf")
            .with_bounding_box(0.0, 0.0, 10.0, 10.0);
        let nested = (0..4).fold(leaf, |child, _| ElementNode::new("div").with_child(child));
        let tree = DomTree::new(
            ElementNode::new("body").with_child(
                ElementNode::new("section").with_style("transform", "scale(2)").with_child(nested),
            ),
        );
        assert_eq!(bounds_of(&tree, "leaf").transform, "none");
    }

    #[test]
    fn test_svg_keeps_visual_rect() {
        let tree = DomTree::new(
            ElementNode::new("body").with_child(
                ElementNode::new("div").with_style("transform", "rotate(90deg)").with_child(
                    ElementNode::new("svg")
                        .with_attribute("id", "logo")
                        .with_bounding_box(5.0, 5.0, 30.0, 60.0),
                ),
            ),
        );
        let bounds = bounds_of(&tree, "logo");
        assert_ne!(bounds.transform, "none");
        assert_eq!((bounds.x, bounds.y, bounds.width, bounds.height), (5.0, 5.0, 30.0, 60.0));
    }

    #[test]
    fn test_bounds_cache() {
        let mut tree = DomTree::new(
            ElementNode::new("body").with_child(
                ElementNode::new("div")
                    .with_attribute("id", "box")
                    .with_bounding_box(0.0, 0.0, 10.0, 10.0),
            ),
        );
        let node = tree.element_by_id("box").unwrap();
        let mut caches = SelectionCaches::default();
        let start = Instant::now();

        create_element_bounds(&tree, &mut caches, node, start);
        tree.set_bounding_box(node, crate::dom::Rect::new(50.0, 0.0, 10.0, 10.0)).unwrap();

        let within_ttl = start + Duration::from_millis(5);
        assert_eq!(create_element_bounds(&tree, &mut caches, node, within_ttl).x, 0.0);
        let expired = start + Duration::from_millis(20);
        assert_eq!(create_element_bounds(&tree, &mut caches, node, expired).x, 50.0);
    }
}
