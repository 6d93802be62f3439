use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::protocol::DESIGN_BRIDGE_PROTOCOL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SelectionConfidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Point,
    Drag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SelectionFramework {
    React,
    Nextjs,
    #[default]
    Unknown,
}

/// Element box as reported by `getBoundingClientRect`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ElementRect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
    pub right: f64,
    pub bottom: f64,
}

impl From<crate::dom::Rect> for ElementRect {
    fn from(rect: crate::dom::Rect) -> Self {
        Self {
            top: rect.top(),
            left: rect.left(),
            width: rect.width,
            height: rect.height,
            right: rect.right(),
            bottom: rect.bottom(),
        }
    }
}

/// Transform-corrected geometry.
///
/// Translation is carried by `x`/`y`; `transform` only holds rotation, scale and skew.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElementBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub border_radius: String,
    pub transform: String,
}

impl ElementBounds {
    pub fn has_transform(&self) -> bool {
        self.transform != "none"
    }
}

macro_rules! element_styles {
    ($($field:ident => $css:literal),+ $(,)?) => {
        /// Computed style values reported with every snapshot
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
        #[serde(rename_all = "camelCase")]
        pub struct ElementStyles {
            $(pub $field: String,)+
        }

        impl ElementStyles {
            /// CSS property names, in field order
            pub const CSS_PROPERTIES: &'static [&'static str] = &[$($css),+];

            /// Build from a computed-style lookup keyed by CSS property name
            pub fn from_computed(mut lookup: impl FnMut(&str) -> String) -> Self {
                Self {
                    $($field: lookup($css),)+
                }
            }
        }
    };
}

element_styles! {
    font_family => "font-family",
    font_size => "font-size",
    font_weight => "font-weight",
    line_height => "line-height",
    letter_spacing => "letter-spacing",
    text_align => "text-align",
    color => "color",
    background_color => "background-color",
    background_image => "background-image",
    padding => "padding",
    padding_top => "padding-top",
    padding_right => "padding-right",
    padding_bottom => "padding-bottom",
    padding_left => "padding-left",
    margin => "margin",
    margin_top => "margin-top",
    margin_right => "margin-right",
    margin_bottom => "margin-bottom",
    margin_left => "margin-left",
    display => "display",
    position => "position",
    flex_direction => "flex-direction",
    justify_content => "justify-content",
    align_items => "align-items",
    gap => "gap",
    opacity => "opacity",
    border_radius => "border-radius",
    border_width => "border-width",
    border_color => "border-color",
    border_style => "border-style",
    width => "width",
    height => "height",
    min_width => "min-width",
    max_width => "max-width",
    min_height => "min-height",
    max_height => "max-height",
}

/// Source location of the component that rendered an element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReactSelectionContext {
    #[serde(default)]
    pub component_name: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub column_number: Option<u32>,
    #[serde(default)]
    pub framework: SelectionFramework,
}

/// Immutable descriptor of one element at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectionSnapshot {
    /// Best-effort CSS selector, not guaranteed unique
    pub selector: String,
    pub dom_id: String,
    pub tag_name: String,
    pub class_name: String,
    pub id: Option<String>,
    pub text_content: Option<String>,
    pub attributes: IndexMap<String, String>,
    pub parent_path: Vec<String>,
    pub rect: ElementRect,
    pub bounds: ElementBounds,
    pub styles: ElementStyles,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub react_context: Option<ReactSelectionContext>,
    pub confidence: SelectionConfidence,
    pub selection_mode: SelectionMode,
}

/// Feature set advertised to the parent on connect and on design-mode enable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BridgeCapabilities {
    pub protocol: String,
    pub selection_modes: Vec<SelectionMode>,
    pub supports_react_context: bool,
    pub supports_multi_select_drag: bool,
    pub supports_freeze: bool,
}

impl Default for BridgeCapabilities {
    fn default() -> Self {
        Self {
            protocol: DESIGN_BRIDGE_PROTOCOL.to_string(),
            selection_modes: vec![SelectionMode::Point, SelectionMode::Drag],
            supports_react_context: true,
            supports_multi_select_drag: true,
            supports_freeze: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum PreviewErrorType {
    Runtime,
    UnhandledRejection,
    NextjsOverlay,
    ConsoleError,
    DevServer,
}

impl PreviewErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreviewErrorType::Runtime => "runtime",
            PreviewErrorType::UnhandledRejection => "unhandled-rejection",
            PreviewErrorType::NextjsOverlay => "nextjs-overlay",
            PreviewErrorType::ConsoleError => "console-error",
            PreviewErrorType::DevServer => "dev-server",
        }
    }
}

/// Error raised by the hosted page and forwarded to the parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PreviewErrorInfo {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(rename = "type")]
    pub error_type: PreviewErrorType,
}

impl PreviewErrorInfo {
    pub fn new(error_type: PreviewErrorType, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            filename: None,
            lineno: None,
            colno: None,
            stack: None,
            error_type,
        }
    }

    /// Key used to suppress repeated reports of the same error
    pub fn dedup_key(&self) -> String {
        let prefix: String = self.message.chars().take(200).collect();
        format!("{}:{}", self.error_type.as_str(), prefix)
    }
}

/// Convert a camelCase style key (`backgroundColor`) to its CSS property name
/// (`background-color`). Keys already in kebab-case pass through unchanged.
pub fn css_property_name(key: &str) -> String {
    let mut property = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            property.push('-');
            property.push(c.to_ascii_lowercase());
        } else {
            property.push(c);
        }
    }
    property
}
