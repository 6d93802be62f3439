use crate::dom::{HostDocument, NodeId};
use crate::engine::constants::FROZEN_ELEMENT_ATTRIBUTE;
use crate::freeze::InjectedStyle;

pub const FROZEN_STYLES_ATTRIBUTE: &str = "data-wiblo-design-frozen-styles";
pub const GLOBAL_FREEZE_ATTRIBUTE: &str = "data-wiblo-design-global-freeze";

const FROZEN_STYLES: &str = "
[data-wiblo-design-frozen],
[data-wiblo-design-frozen] * {
  animation-play-state: paused !important;
  transition: none !important;
}
";

const GLOBAL_FREEZE_STYLES: &str = "
*, *::before, *::after {
  animation-play-state: paused !important;
  transition: none !important;
}
";

/// Pauses animations and transitions.
///
/// The global freeze supersedes the scoped one: enabling it releases the working set, and
/// scoped freezes requested while it is active are ignored.
#[derive(Debug, Default)]
pub struct AnimationFreeze {
    scoped_style: InjectedStyle,
    global_style: InjectedStyle,
    frozen: Vec<NodeId>,
}

impl AnimationFreeze {
    pub fn new() -> Self {
        Self::default()
    }

    /// Freeze the given working set. An empty set releases the current one.
    pub fn freeze_elements<D: HostDocument + ?Sized>(&mut self, doc: &mut D, elements: &[NodeId]) {
        if elements.is_empty() {
            self.unfreeze_elements(doc);
            return;
        }
        if self.global_style.is_attached() {
            log::trace!("Global animation freeze active, ignoring scoped freeze");
            return;
        }
        if self.frozen == elements {
            return;
        }

        self.unfreeze_elements(doc);
        self.scoped_style.insert(doc, FROZEN_STYLES_ATTRIBUTE, FROZEN_STYLES);

        for element in elements {
            doc.set_attribute(*element, FROZEN_ELEMENT_ATTRIBUTE, "");
        }
        self.frozen = elements.to_vec();
    }

    pub fn unfreeze_elements<D: HostDocument + ?Sized>(&mut self, doc: &mut D) {
        for element in self.frozen.drain(..) {
            doc.remove_attribute(element, FROZEN_ELEMENT_ATTRIBUTE);
        }
    }

    pub fn freeze_global<D: HostDocument + ?Sized>(&mut self, doc: &mut D) {
        if self.global_style.is_attached() {
            return;
        }
        self.unfreeze_elements(doc);
        self.global_style.insert(doc, GLOBAL_FREEZE_ATTRIBUTE, GLOBAL_FREEZE_STYLES);
    }

    pub fn unfreeze_global<D: HostDocument + ?Sized>(&mut self, doc: &mut D) {
        self.global_style.remove(doc);
    }

    pub fn is_global_active(&self) -> bool {
        self.global_style.is_attached()
    }

    pub fn frozen_elements(&self) -> &[NodeId] {
        &self.frozen
    }

    /// Release everything and remove the injected stylesheets
    pub fn dispose<D: HostDocument + ?Sized>(&mut self, doc: &mut D) {
        self.unfreeze_elements(doc);
        self.unfreeze_global(doc);
        self.scoped_style.remove(doc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomTree, ElementNode};

    fn create_test_tree() -> (DomTree, NodeId, NodeId) {
        let tree = DomTree::new(
            ElementNode::new("body")
                .with_child(ElementNode::new("div").with_attribute("id", "a"))
                .with_child(ElementNode::new("div").with_attribute("id", "b")),
        );
        let a = tree.element_by_id("a").unwrap();
        let b = tree.element_by_id("b").unwrap();
        (tree, a, b)
    }

    fn style_count(tree: &DomTree, attribute: &str) -> usize {
        tree.children(tree.head()).iter().filter(|n| tree.has_attribute(**n, attribute)).count()
    }

    #[test]
    fn test_scoped_freeze_marks_working_set() {
        let (mut tree, a, b) = create_test_tree();
        let mut freeze = AnimationFreeze::new();

        freeze.freeze_elements(&mut tree, &[a]);
        assert!(tree.has_attribute(a, FROZEN_ELEMENT_ATTRIBUTE));
        assert_eq!(style_count(&tree, FROZEN_STYLES_ATTRIBUTE), 1);

        freeze.freeze_elements(&mut tree, &[b]);
        assert!(!tree.has_attribute(a, FROZEN_ELEMENT_ATTRIBUTE));
        assert!(tree.has_attribute(b, FROZEN_ELEMENT_ATTRIBUTE));
        assert_eq!(style_count(&tree, FROZEN_STYLES_ATTRIBUTE), 1);

        freeze.freeze_elements(&mut tree, &[]);
        assert!(!tree.has_attribute(b, FROZEN_ELEMENT_ATTRIBUTE));
        assert!(freeze.frozen_elements().is_empty());
    }

    #[test]
    fn test_same_working_set_is_noop() {
        let (mut tree, a, b) = create_test_tree();
        let mut freeze = AnimationFreeze::new();

        freeze.freeze_elements(&mut tree, &[a, b]);
        let nodes_before = tree.node_count();
        freeze.freeze_elements(&mut tree, &[a, b]);
        assert_eq!(tree.node_count(), nodes_before);
        assert_eq!(freeze.frozen_elements(), &[a, b]);
    }

    #[test]
    fn test_global_supersedes_scoped() {
        let (mut tree, a, b) = create_test_tree();
        let mut freeze = AnimationFreeze::new();

        freeze.freeze_elements(&mut tree, &[a]);
        freeze.freeze_global(&mut tree);
        assert!(freeze.is_global_active());
        assert!(!tree.has_attribute(a, FROZEN_ELEMENT_ATTRIBUTE));
        assert_eq!(style_count(&tree, GLOBAL_FREEZE_ATTRIBUTE), 1);

        freeze.freeze_elements(&mut tree, &[b]);
        assert!(!tree.has_attribute(b, FROZEN_ELEMENT_ATTRIBUTE));

        freeze.freeze_global(&mut tree);
        assert_eq!(style_count(&tree, GLOBAL_FREEZE_ATTRIBUTE), 1);

        freeze.unfreeze_global(&mut tree);
        assert_eq!(style_count(&tree, GLOBAL_FREEZE_ATTRIBUTE), 0);
        freeze.unfreeze_global(&mut tree);
    }

    #[test]
    fn test_stylesheet_nodes_are_reused() {
        let (mut tree, _, _) = create_test_tree();
        let mut freeze = AnimationFreeze::new();

        freeze.freeze_global(&mut tree);
        freeze.unfreeze_global(&mut tree);
        let allocated = tree.node_count();

        for _ in 0..20 {
            freeze.freeze_global(&mut tree);
            assert_eq!(style_count(&tree, GLOBAL_FREEZE_ATTRIBUTE), 1);
            freeze.unfreeze_global(&mut tree);
        }
        assert_eq!(tree.node_count(), allocated);
        assert!(!freeze.is_global_active());
    }

    #[test]
    fn test_dispose_removes_stylesheets() {
        let (mut tree, a, _) = create_test_tree();
        let mut freeze = AnimationFreeze::new();
        freeze.freeze_elements(&mut tree, &[a]);
        freeze.dispose(&mut tree);
        assert!(tree.children(tree.head()).is_empty());
        assert!(!tree.has_attribute(a, FROZEN_ELEMENT_ATTRIBUTE));
    }
}
