//! Highlight renderer
//!
//! Owns a fixed, always-on-top overlay subtree with a hover box, one box per selected
//! element and the drag rectangle. Every overlay node carries the overlay attribute so the
//! classifier never offers it for selection. Selection boxes and the label are pooled and
//! reused across renders.

use crate::dom::{HostDocument, NodeId, Rect};
use crate::engine::constants::OVERLAY_ROOT_ATTRIBUTE;
use crate::protocol::SelectionSnapshot;

pub const OVERLAY_ROOT_Z_INDEX: i64 = 2_147_483_000;

const SELECTION_BORDER: &str = "2px solid rgba(113, 86, 255, 1)";
const SELECTION_BACKGROUND: &str = "rgba(113, 86, 255, 0.12)";
const HOVER_BORDER: &str = "2px solid rgba(96, 165, 250, 1)";
const HOVER_BACKGROUND: &str = "rgba(96, 165, 250, 0.12)";
const DRAG_BORDER: &str = "1px solid rgba(113, 86, 255, 0.7)";
const DRAG_BACKGROUND: &str = "rgba(113, 86, 255, 0.1)";

/// Visual feedback layer mounted into `<body>`
#[derive(Debug)]
pub struct HighlightRenderer {
    root: NodeId,
    hover_layer: NodeId,
    selection_layer: NodeId,
    drag_layer: NodeId,
    /// Selection boxes ever created; the first `n` are attached while `n` elements are selected
    boxes: Vec<NodeId>,
    label: Option<NodeId>,
}

impl HighlightRenderer {
    pub fn mount<D: HostDocument + ?Sized>(doc: &mut D) -> Self {
        let root = overlay_element(doc, "div");
        set_styles(
            doc,
            root,
            &[
                ("position", "fixed"),
                ("inset", "0"),
                ("pointer-events", "none"),
                ("z-index", &OVERLAY_ROOT_Z_INDEX.to_string()),
            ],
        );

        let hover_layer = overlay_element(doc, "div");
        set_styles(
            doc,
            hover_layer,
            &[
                ("position", "fixed"),
                ("pointer-events", "none"),
                ("display", "none"),
                ("box-sizing", "border-box"),
                ("border", HOVER_BORDER),
                ("background", HOVER_BACKGROUND),
            ],
        );

        let selection_layer = overlay_element(doc, "div");
        set_styles(
            doc,
            selection_layer,
            &[("position", "fixed"), ("inset", "0"), ("pointer-events", "none")],
        );

        let drag_layer = overlay_element(doc, "div");
        set_styles(
            doc,
            drag_layer,
            &[
                ("position", "fixed"),
                ("pointer-events", "none"),
                ("box-sizing", "border-box"),
                ("border", DRAG_BORDER),
                ("background", DRAG_BACKGROUND),
                ("display", "none"),
            ],
        );

        doc.append_child(root, hover_layer);
        doc.append_child(root, selection_layer);
        doc.append_child(root, drag_layer);
        let body = doc.body();
        doc.append_child(body, root);

        Self {
            root,
            hover_layer,
            selection_layer,
            drag_layer,
            boxes: Vec::new(),
            label: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn hover_layer(&self) -> NodeId {
        self.hover_layer
    }

    pub fn selection_layer(&self) -> NodeId {
        self.selection_layer
    }

    pub fn drag_layer(&self) -> NodeId {
        self.drag_layer
    }

    pub fn set_hover<D: HostDocument + ?Sized>(
        &self,
        doc: &mut D,
        selection: Option<&SelectionSnapshot>,
    ) {
        match selection {
            None => doc.set_inline_style(self.hover_layer, "display", "none"),
            Some(snapshot) => {
                doc.set_inline_style(self.hover_layer, "display", "block");
                apply_snapshot_geometry(doc, self.hover_layer, snapshot);
            }
        }
    }

    /// One box per snapshot; the first box is labelled with the tag name and `(+N)` for
    /// additional selections
    pub fn set_selection<D: HostDocument + ?Sized>(
        &mut self,
        doc: &mut D,
        selections: &[SelectionSnapshot],
    ) {
        doc.clear_children(self.selection_layer);

        for (index, snapshot) in selections.iter().enumerate() {
            let selection_box = match self.boxes.get(index) {
                Some(existing) => *existing,
                None => {
                    let created = create_selection_box(doc);
                    self.boxes.push(created);
                    created
                }
            };
            apply_snapshot_geometry(doc, selection_box, snapshot);
            doc.append_child(self.selection_layer, selection_box);
        }

        let Some(first) = selections.first() else {
            return;
        };
        let label = match self.label {
            Some(label) => label,
            None => {
                let label = create_label(doc);
                self.label = Some(label);
                label
            }
        };
        let suffix = if selections.len() > 1 {
            format!(" (+{})", selections.len() - 1)
        } else {
            String::new()
        };
        doc.set_text_content(label, &format!("{}{}", first.tag_name.to_lowercase(), suffix));
        doc.append_child(self.boxes[0], label);
    }

    /// Show the drag rectangle; hidden when absent or zero-area
    pub fn set_drag_rect<D: HostDocument + ?Sized>(&self, doc: &mut D, drag_rect: Option<Rect>) {
        let Some(rect) = drag_rect.filter(Rect::has_area) else {
            doc.set_inline_style(self.drag_layer, "display", "none");
            return;
        };

        set_styles(
            doc,
            self.drag_layer,
            &[
                ("display", "block"),
                ("left", &px(rect.x)),
                ("top", &px(rect.y)),
                ("width", &px(rect.width)),
                ("height", &px(rect.height)),
            ],
        );
    }

    /// Remove the overlay subtree from the document
    pub fn dispose<D: HostDocument + ?Sized>(self, doc: &mut D) {
        doc.remove_node(self.root);
    }
}

fn overlay_element<D: HostDocument + ?Sized>(doc: &mut D, tag_name: &str) -> NodeId {
    let element = doc.create_element(tag_name);
    doc.set_attribute(element, OVERLAY_ROOT_ATTRIBUTE, "");
    element
}

fn set_styles<D: HostDocument + ?Sized>(doc: &mut D, element: NodeId, styles: &[(&str, &str)]) {
    for (property, value) in styles {
        doc.set_inline_style(element, property, value);
    }
}

fn px(value: f64) -> String {
    format!("{}px", value)
}

/// Position an overlay box over a snapshot. Transformed elements use their layout box plus
/// the residual transform around the center; everything else uses the visual rect.
fn apply_snapshot_geometry<D: HostDocument + ?Sized>(
    doc: &mut D,
    element: NodeId,
    snapshot: &SelectionSnapshot,
) {
    let bounds = &snapshot.bounds;
    if bounds.has_transform() {
        set_styles(
            doc,
            element,
            &[
                ("left", &px(bounds.x)),
                ("top", &px(bounds.y)),
                ("width", &px(bounds.width)),
                ("height", &px(bounds.height)),
                ("transform", &bounds.transform),
                ("transform-origin", "center center"),
            ],
        );
    } else {
        let rect = &snapshot.rect;
        set_styles(
            doc,
            element,
            &[
                ("left", &px(rect.left)),
                ("top", &px(rect.top)),
                ("width", &px(rect.width)),
                ("height", &px(rect.height)),
                ("transform", "none"),
            ],
        );
        doc.remove_inline_style(element, "transform-origin");
    }

    let radius = if bounds.border_radius.is_empty() {
        "0px"
    } else {
        bounds.border_radius.as_str()
    };
    doc.set_inline_style(element, "border-radius", radius);
}

fn create_selection_box<D: HostDocument + ?Sized>(doc: &mut D) -> NodeId {
    let selection_box = overlay_element(doc, "div");
    set_styles(
        doc,
        selection_box,
        &[
            ("position", "fixed"),
            ("pointer-events", "none"),
            ("box-sizing", "border-box"),
            ("border", SELECTION_BORDER),
            ("background", SELECTION_BACKGROUND),
        ],
    );
    selection_box
}

fn create_label<D: HostDocument + ?Sized>(doc: &mut D) -> NodeId {
    let label = overlay_element(doc, "span");
    set_styles(
        doc,
        label,
        &[
            ("position", "absolute"),
            ("top", "-22px"),
            ("left", "0"),
            ("background", "rgba(113, 86, 255, 1)"),
            ("color", "white"),
            ("font-size", "11px"),
            ("font-weight", "600"),
            ("padding", "2px 6px"),
            ("border-radius", "3px"),
            ("font-family", "system-ui, -apple-system, sans-serif"),
            ("white-space", "nowrap"),
        ],
    );
    label
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomTree, ElementNode};
    use crate::engine::{SelectionCaches, create_selection_snapshot};
    use crate::protocol::SelectionMode;
    use std::time::Instant;

    fn create_test_tree() -> DomTree {
        DomTree::new(
            ElementNode::new("body")
                .with_child(
                    ElementNode::new("h1")
                        .with_attribute("id", "title")
                        .with_bounding_box(10.0, 20.0, 300.0, 40.0),
                )
                .with_child(
                    ElementNode::new("div")
                        .with_style("transform", "rotate(90deg)")
                        .with_bounding_box(0.0, 100.0, 200.0, 200.0)
                        .with_child(
                            ElementNode::new("p")
                                .with_attribute("id", "rotated")
                                .with_bounding_box(50.0, 100.0, 20.0, 100.0)
                                .with_offset_size(100.0, 20.0),
                        ),
                ),
        )
    }

    fn snapshot(tree: &mut DomTree, id: &str) -> SelectionSnapshot {
        let node = tree.element_by_id(id).unwrap();
        let mut caches = SelectionCaches::default();
        let now = Instant::now();
        create_selection_snapshot(tree, &mut caches, node, SelectionMode::Point, None, now)
    }

    #[test]
    fn test_mount_builds_marked_layers() {
        let mut tree = create_test_tree();
        let renderer = HighlightRenderer::mount(&mut tree);

        assert_eq!(tree.parent(renderer.root()), Some(tree.body()));
        assert_eq!(tree.computed_style(renderer.root(), "z-index"), "2147483000");
        let layers = [
            renderer.root(),
            renderer.hover_layer(),
            renderer.selection_layer(),
            renderer.drag_layer(),
        ];
        for layer in layers {
            assert!(tree.has_attribute(layer, OVERLAY_ROOT_ATTRIBUTE));
        }
        assert_eq!(tree.inline_style(renderer.hover_layer(), "display"), "none");
        assert_eq!(tree.inline_style(renderer.drag_layer(), "display"), "none");
    }

    #[test]
    fn test_hover_geometry() {
        let mut tree = create_test_tree();
        let renderer = HighlightRenderer::mount(&mut tree);
        let title = snapshot(&mut tree, "title");

        renderer.set_hover(&mut tree, Some(&title));
        let hover = renderer.hover_layer();
        assert_eq!(tree.inline_style(hover, "display"), "block");
        assert_eq!(tree.inline_style(hover, "left"), "10px");
        assert_eq!(tree.inline_style(hover, "width"), "300px");
        assert_eq!(tree.inline_style(hover, "transform"), "none");

        renderer.set_hover(&mut tree, None);
        assert_eq!(tree.inline_style(hover, "display"), "none");
    }

    #[test]
    fn test_transformed_selection_uses_bounds() {
        let mut tree = create_test_tree();
        let mut renderer = HighlightRenderer::mount(&mut tree);
        let rotated = snapshot(&mut tree, "rotated");

        renderer.set_selection(&mut tree, std::slice::from_ref(&rotated));
        let boxes = tree.children(renderer.selection_layer());
        assert_eq!(boxes.len(), 1);
        assert_eq!(tree.inline_style(boxes[0], "width"), "100px");
        assert_eq!(tree.inline_style(boxes[0], "left"), "10px");
        assert_eq!(tree.inline_style(boxes[0], "transform"), rotated.bounds.transform);
        assert_eq!(tree.inline_style(boxes[0], "transform-origin"), "center center");
    }

    #[test]
    fn test_multi_selection_label() {
        let mut tree = create_test_tree();
        let mut renderer = HighlightRenderer::mount(&mut tree);
        let title = snapshot(&mut tree, "title");
        let rotated = snapshot(&mut tree, "rotated");

        renderer.set_selection(&mut tree, &[title.clone(), rotated]);
        let boxes = tree.children(renderer.selection_layer());
        assert_eq!(boxes.len(), 2);
        assert_eq!(tree.text_content(boxes[0]), "h1 (+1)");
        assert!(tree.children(boxes[1]).is_empty());

        renderer.set_selection(&mut tree, &[title]);
        let boxes = tree.children(renderer.selection_layer());
        assert_eq!(tree.text_content(boxes[0]), "h1");

        renderer.set_selection(&mut tree, &[]);
        assert!(tree.children(renderer.selection_layer()).is_empty());
    }

    #[test]
    fn test_selection_boxes_are_reused() {
        let mut tree = create_test_tree();
        let mut renderer = HighlightRenderer::mount(&mut tree);
        let title = snapshot(&mut tree, "title");
        let rotated = snapshot(&mut tree, "rotated");

        renderer.set_selection(&mut tree, &[title.clone(), rotated.clone()]);
        let first_boxes = tree.children(renderer.selection_layer());
        let allocated = tree.node_count();

        for _ in 0..50 {
            renderer.set_selection(&mut tree, &[rotated.clone(), title.clone()]);
            renderer.set_selection(&mut tree, &[title.clone()]);
        }
        renderer.set_selection(&mut tree, &[title.clone(), rotated]);

        assert_eq!(tree.node_count(), allocated);
        assert_eq!(tree.children(renderer.selection_layer()), first_boxes);
        assert_eq!(tree.inline_style(first_boxes[0], "transform"), "none");
        assert_eq!(tree.inline_style(first_boxes[0], "transform-origin"), "");
        assert_eq!(tree.text_content(first_boxes[0]), "h1 (+1)");
    }

    #[test]
    fn test_drag_rect_visibility() {
        let mut tree = create_test_tree();
        let renderer = HighlightRenderer::mount(&mut tree);
        let drag = renderer.drag_layer();

        renderer.set_drag_rect(&mut tree, Some(Rect::new(5.0, 6.0, 70.0, 80.0)));
        assert_eq!(tree.inline_style(drag, "display"), "block");
        assert_eq!(tree.inline_style(drag, "height"), "80px");

        renderer.set_drag_rect(&mut tree, Some(Rect::new(5.0, 6.0, 0.0, 80.0)));
        assert_eq!(tree.inline_style(drag, "display"), "none");
    }

    #[test]
    fn test_dispose_detaches_root() {
        let mut tree = create_test_tree();
        let renderer = HighlightRenderer::mount(&mut tree);
        let root = renderer.root();
        renderer.dispose(&mut tree);
        assert!(!tree.is_connected(root));
    }
}
