use crate::dom::{EventBlockPolicy, HostDocument, NodeId, PseudoClass};
use crate::freeze::InjectedStyle;
use indexmap::IndexMap;

pub const FROZEN_PSEUDO_ATTRIBUTE: &str = "data-wiblo-design-frozen-pseudo";
pub const POINTER_OVERRIDE_ATTRIBUTE: &str = "data-wiblo-design-pointer-override";

const POINTER_EVENTS_STYLES: &str = "* { pointer-events: none !important; }";
const POINTER_OVERRIDE_STYLES: &str = "* { pointer-events: auto !important; }";

pub const MOUSE_EVENTS_TO_BLOCK: &[&str] = &[
    "mouseenter",
    "mouseleave",
    "mouseover",
    "mouseout",
    "pointerenter",
    "pointerleave",
    "pointerover",
    "pointerout",
];

pub const FOCUS_EVENTS_TO_BLOCK: &[&str] = &["focus", "blur", "focusin", "focusout"];

pub const HOVER_STYLE_PROPERTIES: &[&str] = &[
    "background-color",
    "color",
    "border-color",
    "box-shadow",
    "transform",
    "opacity",
    "outline",
    "filter",
    "scale",
    "visibility",
];

pub const FOCUS_STYLE_PROPERTIES: &[&str] = &[
    "background-color",
    "color",
    "border-color",
    "box-shadow",
    "outline",
    "outline-offset",
    "outline-width",
    "outline-color",
    "outline-style",
    "filter",
    "opacity",
];

/// Properties an animation may be driving; these are removed rather than restored
const ANIMATION_CONTROLLED_PROPERTIES: &[&str] =
    &["opacity", "transform", "scale", "translate", "rotate"];

struct FrozenState {
    element: NodeId,
    original_css_text: String,
    frozen_css_text: String,
}

/// Pins the current hover and focus appearance of the page.
///
/// While enabled, pointer events are disabled by stylesheet, hover/focus transitions are
/// blocked at the capture phase and every hovered or focused element carries its computed
/// look as inline `!important` declarations.
#[derive(Debug, Default)]
pub struct PseudoStateFreeze {
    pointer_events_style: InjectedStyle,
    override_style: InjectedStyle,
    /// element → inline `cssText` before freezing
    hover: IndexMap<NodeId, String>,
    focus: IndexMap<NodeId, String>,
}

impl PseudoStateFreeze {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.pointer_events_style.is_attached()
    }

    /// Returns false when already enabled
    pub fn enable<D: HostDocument + ?Sized>(&mut self, doc: &mut D) -> bool {
        if self.is_active() {
            return false;
        }

        doc.block_events(MOUSE_EVENTS_TO_BLOCK, EventBlockPolicy::StopPropagation);
        doc.block_events(FOCUS_EVENTS_TO_BLOCK, EventBlockPolicy::PreventDefault);

        let hovered = doc.pseudo_class_elements(PseudoClass::Hover);
        let hover_states = collect_states(&*doc, &hovered, HOVER_STYLE_PROPERTIES);

        let mut focused = doc.pseudo_class_elements(PseudoClass::Focus);
        for element in doc.pseudo_class_elements(PseudoClass::FocusVisible) {
            if !focused.contains(&element) {
                focused.push(element);
            }
        }
        focused.retain(|element| !self.focus.contains_key(element));
        let focus_states = collect_states(&*doc, &focused, FOCUS_STYLE_PROPERTIES);

        apply_states(doc, hover_states, &mut self.hover);
        apply_states(doc, focus_states, &mut self.focus);

        self.pointer_events_style.insert(doc, FROZEN_PSEUDO_ATTRIBUTE, POINTER_EVENTS_STYLES);
        self.override_style.insert(doc, POINTER_OVERRIDE_ATTRIBUTE, POINTER_OVERRIDE_STYLES);

        log::debug!(
            "Froze pseudo states of {} hovered and {} focused elements",
            self.hover.len(),
            self.focus.len()
        );
        true
    }

    /// Returns false when not enabled
    pub fn disable<D: HostDocument + ?Sized>(&mut self, doc: &mut D) -> bool {
        if !self.is_active() {
            return false;
        }

        self.override_style.remove(doc);

        doc.unblock_events(MOUSE_EVENTS_TO_BLOCK);
        doc.unblock_events(FOCUS_EVENTS_TO_BLOCK);

        restore_states(doc, &mut self.hover, HOVER_STYLE_PROPERTIES);
        restore_states(doc, &mut self.focus, FOCUS_STYLE_PROPERTIES);

        self.pointer_events_style.remove(doc);
        true
    }
}

fn collect_states<D: HostDocument + ?Sized>(
    doc: &D,
    elements: &[NodeId],
    properties: &[&str],
) -> Vec<FrozenState> {
    elements
        .iter()
        .map(|element| {
            let original_css_text = doc.inline_css_text(*element);
            let mut frozen_css_text = original_css_text.clone();
            for property in properties {
                let value = doc.computed_style(*element, property);
                if !value.is_empty() {
                    if !frozen_css_text.is_empty() {
                        frozen_css_text.push(' ');
                    }
                    frozen_css_text.push_str(&format!("{}: {} !important;", property, value));
                }
            }
            FrozenState { element: *element, original_css_text, frozen_css_text }
        })
        .collect()
}

fn apply_states<D: HostDocument + ?Sized>(
    doc: &mut D,
    states: Vec<FrozenState>,
    storage: &mut IndexMap<NodeId, String>,
) {
    for state in states {
        storage.insert(state.element, state.original_css_text);
        doc.set_inline_css_text(state.element, &state.frozen_css_text);
    }
}

fn has_animation_controlled_property(css_text: &str) -> bool {
    let lower = css_text.to_ascii_lowercase();
    ANIMATION_CONTROLLED_PROPERTIES.iter().any(|property| lower.contains(property))
}

fn restore_states<D: HostDocument + ?Sized>(
    doc: &mut D,
    storage: &mut IndexMap<NodeId, String>,
    properties: &[&str],
) {
    for (element, original_css_text) in storage.drain(..) {
        if has_animation_controlled_property(&original_css_text) {
            for property in properties {
                doc.remove_inline_style(element, property);
            }
        } else {
            doc.set_inline_css_text(element, &original_css_text);
        }
    }
}
