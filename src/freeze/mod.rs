//! Visual freezing while a drag selection is in progress
//!
//! Two independent mechanisms:
//! - [`AnimationFreeze`] pauses animations and transitions, globally or for a working set
//! - [`PseudoStateFreeze`] pins the current `:hover`/`:focus` look of the page

pub mod animations;
pub mod pseudo_states;

pub use animations::AnimationFreeze;
pub use pseudo_states::PseudoStateFreeze;

use crate::dom::{HostDocument, NodeId};

/// A `<style>` element in `<head>`, created on first insertion and reused afterwards
#[derive(Debug, Default)]
pub(crate) struct InjectedStyle {
    node: Option<NodeId>,
    attached: bool,
}

impl InjectedStyle {
    pub(crate) fn is_attached(&self) -> bool {
        self.attached
    }

    /// Insert the stylesheet marked with `attribute`; no-op while attached
    pub(crate) fn insert<D: HostDocument + ?Sized>(
        &mut self,
        doc: &mut D,
        attribute: &str,
        content: &str,
    ) {
        if self.attached {
            return;
        }
        let style = match self.node {
            Some(style) => style,
            None => {
                let style = doc.create_element("style");
                doc.set_attribute(style, attribute, "");
                doc.set_text_content(style, content);
                self.node = Some(style);
                style
            }
        };
        let head = doc.head();
        doc.append_child(head, style);
        self.attached = true;
    }

    pub(crate) fn remove<D: HostDocument + ?Sized>(&mut self, doc: &mut D) {
        if let Some(style) = self.node.filter(|_| self.attached) {
            doc.remove_node(style);
        }
        self.attached = false;
    }
}
