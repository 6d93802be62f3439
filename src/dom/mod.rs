//! Host document access
//!
//! The bridge never touches a concrete DOM directly. Everything it needs from the
//! page goes through [`HostDocument`], a narrow capability interface keyed by
//! stable [`NodeId`] handles. This module provides:
//! - ElementNode: serializable description of an element subtree
//! - DomTree: in-memory document implementing [`HostDocument`]
//! - Selector: CSS selector queries, parsed and matched by `scraper`
//! - StyleDeclaration: inline style storage with `cssText` round-tripping

pub mod element;
pub mod selector;
pub mod style;
pub mod tree;

pub use element::{ElementNode, Viewport};
pub use selector::Selector;
pub use style::StyleDeclaration;
pub use tree::DomTree;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle of an element inside a [`HostDocument`].
///
/// Handles are never reused for another element, so they double as cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Viewport-relative rectangle (the shape of `getBoundingClientRect`)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Check if the rectangle has a non-zero area
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.left() && x <= self.right() && y >= self.top() && y <= self.bottom()
    }

    /// Overlapping area of two rectangles (zero when disjoint)
    pub fn intersection_area(&self, other: &Rect) -> f64 {
        let width = self.right().min(other.right()) - self.left().max(other.left());
        let height = self.bottom().min(other.bottom()) - self.top().max(other.top());
        if width <= 0.0 || height <= 0.0 {
            return 0.0;
        }
        width * height
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.intersection_area(other) > 0.0
    }
}

/// Pseudo-classes the freeze subsystem needs to enumerate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoClass {
    Hover,
    Focus,
    FocusVisible,
}

/// How a blocked capture-phase event is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventBlockPolicy {
    /// Stop propagation only
    StopPropagation,
    /// Stop propagation and prevent the default action
    PreventDefault,
}

/// Capability interface over the page the bridge runs in.
///
/// Tag names are reported lowercase. Style properties use their CSS (kebab-case) names.
pub trait HostDocument {
    /// The `<html>` element
    fn document_element(&self) -> NodeId;

    fn head(&self) -> NodeId;

    fn body(&self) -> NodeId;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Whether the node is attached to the document (directly or through a shadow host)
    fn is_connected(&self, node: NodeId) -> bool;

    fn tag_name(&self, node: NodeId) -> String;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// All attributes in document order
    fn attributes(&self, node: NodeId) -> Vec<(String, String)>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);

    fn remove_attribute(&mut self, node: NodeId, name: &str);

    fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    /// Nearest inclusive ancestor carrying the attribute
    fn closest_with_attribute(&self, node: NodeId, name: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if self.has_attribute(candidate, name) {
                return Some(candidate);
            }
            current = self.parent(candidate);
        }
        None
    }

    fn bounding_client_rect(&self, node: NodeId) -> Rect;

    /// `offsetWidth`/`offsetHeight`; `None` for elements without a layout box model (SVG)
    fn offset_size(&self, node: NodeId) -> Option<(f64, f64)>;

    fn offset_parent(&self, node: NodeId) -> Option<NodeId>;

    fn computed_style(&self, node: NodeId, property: &str) -> String;

    /// Inline style value, empty when unset
    fn inline_style(&self, node: NodeId, property: &str) -> String;

    fn set_inline_style(&mut self, node: NodeId, property: &str, value: &str);

    fn remove_inline_style(&mut self, node: NodeId, property: &str);

    fn inline_css_text(&self, node: NodeId) -> String;

    fn set_inline_css_text(&mut self, node: NodeId, css_text: &str);

    /// Text of the node when its only child is a text node
    fn single_text_child(&self, node: NodeId) -> Option<String>;

    /// Concatenated text of the whole subtree
    fn text_content(&self, node: NodeId) -> String;

    /// First element of the document matching the selector
    fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        self.query_selector_in(self.document_element(), selector)
    }

    /// First descendant of `root` matching the selector
    fn query_selector_in(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>>;

    /// Elements under the point, topmost first
    fn elements_from_point(&self, x: f64, y: f64) -> Vec<NodeId>;

    /// Descendants of `root` in document order (excluding `root`)
    fn descendants(&self, root: NodeId) -> Vec<NodeId>;

    fn viewport_size(&self) -> (f64, f64);

    fn pseudo_class_elements(&self, pseudo: PseudoClass) -> Vec<NodeId>;

    fn shadow_root(&self, node: NodeId) -> Option<NodeId>;

    /// Create a detached element
    fn create_element(&mut self, tag_name: &str) -> NodeId;

    fn append_child(&mut self, parent: NodeId, child: NodeId);

    /// Detach the node from its parent
    fn remove_node(&mut self, node: NodeId);

    fn clear_children(&mut self, node: NodeId);

    fn set_text_content(&mut self, node: NodeId, text: &str);

    /// Install capture-phase blockers for the given event types
    fn block_events(&mut self, events: &[&str], policy: EventBlockPolicy);

    fn unblock_events(&mut self, events: &[&str]);
}
