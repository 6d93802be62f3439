use crate::dom::Rect;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Serializable description of an element and its subtree.
///
/// This is the input format of [`DomTree`](crate::dom::DomTree): fixtures, replays and
/// hosts that mirror a live page all describe it with `ElementNode`s.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ElementNode {
    /// HTML tag name (e.g., "div", "button", "input")
    pub tag_name: String,

    /// Element attributes in source order
    #[serde(default)]
    pub attributes: IndexMap<String, String>,

    /// Text node child. When `children` is empty this is the element's sole child.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,

    /// Child elements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementNode>,

    /// Viewport-relative box as reported by `getBoundingClientRect`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<Rect>,

    /// Computed style declarations (kebab-case property names)
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub styles: IndexMap<String, String>,

    /// Untransformed layout width; defaults to the bounding box width
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_width: Option<f64>,

    /// Untransformed layout height; defaults to the bounding box height
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_height: Option<f64>,

    /// Element is under the pointer (`:hover`)
    #[serde(default)]
    pub hovered: bool,

    /// Element has focus (`:focus`)
    #[serde(default)]
    pub focused: bool,

    /// Element matches `:focus-visible`
    #[serde(default)]
    pub focus_visible: bool,

    /// Children of an attached open shadow root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_root: Option<Vec<ElementNode>>,
}

/// Size of the layout viewport
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { width: 1280.0, height: 800.0 }
    }
}

impl ElementNode {
    /// Create a new ElementNode
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            ..Default::default()
        }
    }

    /// Builder method: add one attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder method: set text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }

    /// Builder method: set children
    pub fn with_children(mut self, children: Vec<ElementNode>) -> Self {
        self.children = children;
        self
    }

    /// Builder method: append a child
    pub fn with_child(mut self, child: ElementNode) -> Self {
        self.children.push(child);
        self
    }

    /// Builder method: set bounding box
    pub fn with_bounding_box(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bounding_box = Some(Rect::new(x, y, width, height));
        self
    }

    /// Builder method: set one computed style declaration
    pub fn with_style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles.insert(property.into(), value.into());
        self
    }

    /// Builder method: set the untransformed layout size
    pub fn with_offset_size(mut self, width: f64, height: f64) -> Self {
        self.offset_width = Some(width);
        self.offset_height = Some(height);
        self
    }

    /// Builder method: mark as hovered
    pub fn hovered(mut self) -> Self {
        self.hovered = true;
        self
    }

    /// Builder method: mark as focused (and focus-visible)
    pub fn focused(mut self) -> Self {
        self.focused = true;
        self.focus_visible = true;
        self
    }

    /// Builder method: attach a shadow root with the given children
    pub fn with_shadow_root(mut self, children: Vec<ElementNode>) -> Self {
        self.shadow_root = Some(children);
        self
    }

    /// Check if element is a specific tag
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_node_creation() {
        let element = ElementNode::new("button")
            .with_attribute("id", "test-id")
            .with_attribute("class", "btn primary")
            .with_text("Click me")
            .with_bounding_box(10.0, 20.0, 100.0, 40.0)
            .hovered();

        assert_eq!(element.tag_name, "button");
        assert_eq!(element.attributes.get("id").map(String::as_str), Some("test-id"));
        assert_eq!(element.text_content, Some("Click me".to_string()));
        assert_eq!(element.bounding_box, Some(Rect::new(10.0, 20.0, 100.0, 40.0)));
        assert!(element.hovered);
        assert!(!element.focused);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "tag_name": "section",
            "attributes": {"class": "hero"},
            "bounding_box": {"x": 0, "y": 0, "width": 1280, "height": 600},
            "children": [{"tag_name": "h1", "text_content": "Welcome"}]
        }"#;

        let element: ElementNode = serde_json::from_str(json).unwrap();
        assert!(element.is_tag("SECTION"));
        assert_eq!(element.attributes["class"], "hero");
        assert_eq!(element.children.len(), 1);
        assert_eq!(element.children[0].text_content.as_deref(), Some("Welcome"));
        assert!(element.styles.is_empty());
        assert!(element.shadow_root.is_none());
    }

    #[test]
    fn test_attribute_order_preserved() {
        let element = ElementNode::new("a")
            .with_attribute("href", "/docs")
            .with_attribute("class", "link")
            .with_attribute("target", "_blank");

        let keys: Vec<_> = element.attributes.keys().cloned().collect();
        assert_eq!(keys, vec!["href", "class", "target"]);
    }
}
