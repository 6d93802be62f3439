use crate::dom::{HostDocument, NodeId};
use crate::engine::cache::SelectionCaches;
use crate::engine::constants::{BRIDGE_ATTRIBUTE_PREFIX, DOM_ID_ATTRIBUTE};
use crate::engine::constants::{MAX_SELECTOR_CLASSES, MAX_TEXT_CONTENT_LENGTH};
use crate::engine::geometry::create_element_bounds;
use crate::protocol::{ElementRect, ElementStyles, ReactSelectionContext};
use crate::protocol::{SelectionConfidence, SelectionMode, SelectionSnapshot};
use indexmap::IndexMap;
use rand::Rng;
use std::time::Instant;

const DOM_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const DOM_ID_LENGTH: usize = 12;

/// Describe a node for the parent frame.
///
/// Stamps a `data-wiblo-dom-id` on first use; the id never changes afterwards.
pub fn create_selection_snapshot<D: HostDocument + ?Sized>(
    doc: &mut D,
    caches: &mut SelectionCaches,
    node: NodeId,
    selection_mode: SelectionMode,
    react_context: Option<ReactSelectionContext>,
    now: Instant,
) -> SelectionSnapshot {
    let dom_id = ensure_dom_id(doc, node);
    let rect = doc.bounding_client_rect(node);

    SelectionSnapshot {
        selector: generate_selector(doc, node),
        dom_id,
        tag_name: doc.tag_name(node),
        class_name: doc.attribute(node, "class").unwrap_or_default(),
        id: doc.attribute(node, "id").filter(|id| !id.is_empty()),
        text_content: text_content(doc, node),
        attributes: reported_attributes(doc, node),
        parent_path: parent_path(doc, node),
        rect: ElementRect::from(rect),
        bounds: create_element_bounds(doc, caches, node, now),
        styles: ElementStyles::from_computed(|property| doc.computed_style(node, property)),
        react_context,
        confidence: infer_confidence(rect.width, rect.height),
        selection_mode,
    }
}

/// Existing dom id of the node, assigning a fresh one when missing
pub fn ensure_dom_id<D: HostDocument + ?Sized>(doc: &mut D, node: NodeId) -> String {
    if let Some(existing) = doc.attribute(node, DOM_ID_ATTRIBUTE).filter(|id| !id.is_empty()) {
        return existing;
    }
    let dom_id = format!("wiblo-{}", random_id());
    doc.set_attribute(node, DOM_ID_ATTRIBUTE, &dom_id);
    dom_id
}

fn random_id() -> String {
    let mut rng = rand::thread_rng();
    (0..DOM_ID_LENGTH)
        .map(|_| DOM_ID_ALPHABET[rng.gen_range(0..DOM_ID_ALPHABET.len())] as char)
        .collect()
}

/// Best-effort CSS path from below `<body>` to the node; not guaranteed unique
pub fn generate_selector<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> String {
    let mut path: Vec<String> = Vec::new();
    let mut current = Some(node);

    while let Some(element) = current {
        if element == doc.document_element() || element == doc.body() {
            break;
        }

        let tag_name = doc.tag_name(element);
        if let Some(id) = doc.attribute(element, "id").filter(|id| !id.is_empty()) {
            path.push(format!("#{}", escape_identifier(&id)));
            break;
        }

        let mut part = tag_name.clone();
        if let Some(class_name) = doc.attribute(element, "class") {
            for class in class_name.split_whitespace().take(MAX_SELECTOR_CLASSES) {
                part.push('.');
                part.push_str(&escape_identifier(class));
            }
        }

        let parent = doc.parent(element);
        if let Some(parent) = parent {
            let same_tag: Vec<NodeId> = doc
                .children(parent)
                .into_iter()
                .filter(|sibling| doc.tag_name(*sibling) == tag_name)
                .collect();
            if same_tag.len() > 1 {
                if let Some(index) = same_tag.iter().position(|sibling| *sibling == element) {
                    part.push_str(&format!(":nth-of-type({})", index + 1));
                }
            }
        }

        path.push(part);
        current = parent;
    }

    path.reverse();
    path.join(" > ")
}

/// Escape a value for use as a CSS identifier, the way `CSS.escape` does
fn escape_identifier(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let leading_hyphen = value.starts_with('-');
    for (index, c) in value.chars().enumerate() {
        let leading_digit = c.is_ascii_digit() && (index == 0 || (index == 1 && leading_hyphen));
        if c == '\0' {
            escaped.push('\u{FFFD}');
        } else if c.is_ascii_control() || leading_digit {
            escaped.push_str(&format!("\\{:x} ", c as u32));
        } else if index == 0 && c == '-' && value.len() == 1 {
            escaped.push_str("\\-");
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            escaped.push(c);
        } else {
            escaped.push('\\');
            escaped.push(c);
        }
    }
    escaped
}

/// Tag names from below `<body>` down to the node, inclusive
pub fn parent_path<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> Vec<String> {
    let mut path = Vec::new();
    let mut current = Some(node);
    while let Some(element) = current {
        if element == doc.document_element() || element == doc.body() {
            break;
        }
        path.push(doc.tag_name(element));
        current = doc.parent(element);
    }
    path.reverse();
    path
}

fn reported_attributes<D: HostDocument + ?Sized>(
    doc: &D,
    node: NodeId,
) -> IndexMap<String, String> {
    doc.attributes(node)
        .into_iter()
        .filter(|(name, _)| !name.starts_with(BRIDGE_ATTRIBUTE_PREFIX))
        .collect()
}

fn text_content<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> Option<String> {
    let text = doc.single_text_child(node)?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_TEXT_CONTENT_LENGTH).collect())
}

pub fn infer_confidence(width: f64, height: f64) -> SelectionConfidence {
    if width <= 2.0 || height <= 2.0 {
        SelectionConfidence::Low
    } else if width <= 8.0 || height <= 8.0 {
        SelectionConfidence::Medium
    } else {
        SelectionConfidence::High
    }
}
