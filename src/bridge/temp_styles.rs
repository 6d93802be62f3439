use crate::dom::{HostDocument, NodeId};
use crate::protocol::css_property_name;
use indexmap::IndexMap;
use serde_json::Value;

/// Inline style overrides applied on behalf of the parent, with the values they replaced
#[derive(Debug, Default)]
pub struct TempStyleMemory {
    /// element → (css property → inline value before the first override)
    entries: IndexMap<NodeId, IndexMap<String, String>>,
}

impl TempStyleMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply camelCase `styles` to the element's inline style. The pre-override value of each
    /// property is remembered once; non-string values only reserve the slot.
    pub fn apply<D: HostDocument + ?Sized>(
        &mut self,
        doc: &mut D,
        node: NodeId,
        styles: &IndexMap<String, Value>,
    ) {
        let memory = self.entries.entry(node).or_default();

        for (key, value) in styles {
            let property = css_property_name(key);
            if !memory.contains_key(&property) {
                memory.insert(property.clone(), doc.inline_style(node, &property));
            }

            match value {
                Value::String(value) => doc.set_inline_style(node, &property, value),
                other => log::trace!("Ignoring non-string temp style {}: {}", key, other),
            }
        }
    }

    /// Put back the remembered values of one element
    pub fn restore<D: HostDocument + ?Sized>(&mut self, doc: &mut D, node: NodeId) -> bool {
        let Some(memory) = self.entries.shift_remove(&node) else {
            return false;
        };

        for (property, previous) in memory {
            if previous.is_empty() {
                doc.remove_inline_style(node, &property);
            } else {
                doc.set_inline_style(node, &property, &previous);
            }
        }
        true
    }

    pub fn restore_all<D: HostDocument + ?Sized>(&mut self, doc: &mut D) {
        let nodes: Vec<NodeId> = self.entries.keys().copied().collect();
        for node in nodes {
            self.restore(doc, node);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomTree, ElementNode};
    use serde_json::json;

    fn styles(value: Value) -> IndexMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_apply_and_restore() {
        let mut tree = DomTree::new(
            ElementNode::new("body").with_child(
                ElementNode::new("p")
                    .with_attribute("id", "p")
                    .with_attribute("style", "color: red;"),
            ),
        );
        let p = tree.element_by_id("p").unwrap();
        let mut memory = TempStyleMemory::new();

        memory.apply(&mut tree, p, &styles(json!({ "color": "blue", "backgroundColor": "black" })));
        assert_eq!(tree.inline_style(p, "color"), "blue");
        assert_eq!(tree.inline_style(p, "background-color"), "black");

        // the first remembered value wins
        memory.apply(&mut tree, p, &styles(json!({ "color": "green" })));

        assert!(memory.restore(&mut tree, p));
        assert_eq!(tree.inline_style(p, "color"), "red");
        assert_eq!(tree.inline_style(p, "background-color"), "");
        assert!(memory.is_empty());
        assert!(!memory.restore(&mut tree, p));
    }

    #[test]
    fn test_non_string_values_are_ignored() {
        let mut tree = DomTree::new(
            ElementNode::new("body").with_child(ElementNode::new("p").with_attribute("id", "p")),
        );
        let p = tree.element_by_id("p").unwrap();
        let mut memory = TempStyleMemory::new();

        memory.apply(&mut tree, p, &styles(json!({ "fontSize": 12, "margin": null })));
        assert_eq!(tree.inline_css_text(p), "");
        assert_eq!(memory.len(), 1);

        memory.restore_all(&mut tree);
        assert!(memory.is_empty());
        assert_eq!(tree.inline_css_text(p), "");
    }
}
