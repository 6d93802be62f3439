//! Page error forwarding: runtime errors, unhandled rejections and the Next.js error overlay

use crate::dom::{HostDocument, NodeId};
use crate::protocol::{PreviewErrorInfo, PreviewErrorType};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

pub const NEXTJS_PORTAL_TAG: &str = "nextjs-portal";
pub const OVERLAY_FALLBACK_MESSAGE: &str = "Next.js error overlay detected";
pub const MAX_OVERLAY_MESSAGE_CHARS: usize = 2000;

const LIGHT_DOM_OVERLAY_SELECTORS: &[&str] =
    &["[data-nextjs-dialog]", "[data-nextjs-error-overlay]", "#__next-build-watcher"];
const SHADOW_OVERLAY_SELECTORS: &[&str] =
    &["[data-nextjs-dialog]", "[data-nextjs-error-overlay]", "[role='dialog']"];
const HEADER_SELECTORS: &[&str] = &["[data-nextjs-dialog-header]", "h1"];
const BODY_SELECTORS: &[&str] = &["[data-nextjs-dialog-body]", "[data-nextjs-error-message]"];
const CODEFRAME_SELECTORS: &[&str] = &["[data-nextjs-codeframe]", "pre"];

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank line pattern"));

/// Window `error` event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeErrorEvent {
    pub message: String,
    pub filename: Option<String>,
    pub lineno: Option<u32>,
    pub colno: Option<u32>,
    pub stack: Option<String>,
}

impl RuntimeErrorEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), ..Default::default() }
    }

    pub fn into_error_info(self) -> PreviewErrorInfo {
        let message = if self.message.is_empty() {
            "Runtime error".to_string()
        } else {
            self.message
        };
        PreviewErrorInfo {
            message,
            filename: self.filename.filter(|filename| !filename.is_empty()),
            lineno: self.lineno.filter(|line| *line > 0),
            colno: self.colno.filter(|column| *column > 0),
            stack: self.stack,
            error_type: PreviewErrorType::Runtime,
        }
    }
}

/// Reason carried by an `unhandledrejection` event
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    Message(String),
    Error { message: String, stack: Option<String> },
    Other,
}

impl RejectionReason {
    pub fn into_error_info(self) -> PreviewErrorInfo {
        let (message, stack) = match self {
            RejectionReason::Message(message) => (message, None),
            RejectionReason::Error { message, stack } => (message, stack),
            RejectionReason::Other => ("Unhandled promise rejection".to_string(), None),
        };
        let mut info = PreviewErrorInfo::new(PreviewErrorType::UnhandledRejection, message);
        info.stack = stack;
        info
    }
}

/// Suppresses repeated reports of the same error
#[derive(Debug, Default)]
pub struct ErrorReporter {
    emitted: HashSet<String>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error. Returns false when an identical one was already reported.
    pub fn report(&mut self, error: &PreviewErrorInfo) -> bool {
        self.emitted.insert(error.dedup_key())
    }

    /// Forget reported errors of one type, or all of them
    pub fn clear(&mut self, error_type: Option<PreviewErrorType>) {
        match error_type {
            Some(error_type) => {
                let prefix = format!("{}:", error_type.as_str());
                self.emitted.retain(|key| !key.starts_with(&prefix));
            }
            None => self.emitted.clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.emitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitted.is_empty()
    }
}

/// Outcome of an overlay check
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayCheck {
    /// A visible overlay is present
    Present(PreviewErrorInfo),
    /// The overlay seen previously went away
    Dismissed,
    Unchanged,
}

/// What the host must do after a portal lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalAction {
    /// Look again after the delay
    Poll(Duration),
    /// Start observing the shadow root and run an overlay check
    Observe(NodeId),
    /// Stop observing the previously observed shadow root
    Disconnect,
}

/// Tracks the Next.js dev overlay and its shadow-root host
#[derive(Debug)]
pub struct OverlayDetector {
    last_overlay_present: bool,
    observed_portal: Option<NodeId>,
    shadow_observed: bool,
    attempts: u32,
    max_attempts: u32,
    poll_interval: Duration,
}

impl OverlayDetector {
    pub fn new(poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            last_overlay_present: false,
            observed_portal: None,
            shadow_observed: false,
            attempts: 0,
            max_attempts,
            poll_interval,
        }
    }

    pub fn is_overlay_present(&self) -> bool {
        self.last_overlay_present
    }

    pub fn is_observing(&self) -> bool {
        self.shadow_observed
    }

    /// Locate the portal and its shadow root, retrying a bounded number of times
    pub fn observe_portal<D: HostDocument + ?Sized>(&mut self, doc: &D) -> Vec<PortalAction> {
        let mut actions = Vec::new();

        let Some(portal) = doc.query_selector(NEXTJS_PORTAL_TAG).ok().flatten() else {
            self.attempts = 0;
            if self.observed_portal.take().is_some() && std::mem::take(&mut self.shadow_observed) {
                actions.push(PortalAction::Disconnect);
            }
            return actions;
        };

        if self.observed_portal != Some(portal) {
            self.observed_portal = Some(portal);
            self.attempts = 0;
            if std::mem::take(&mut self.shadow_observed) {
                actions.push(PortalAction::Disconnect);
            }
        }

        match doc.shadow_root(portal) {
            None if self.attempts < self.max_attempts => {
                self.attempts += 1;
                log::trace!(
                    "Portal shadow root not ready, attempt {}/{}",
                    self.attempts,
                    self.max_attempts
                );
                actions.push(PortalAction::Poll(self.poll_interval));
            }
            None => {}
            Some(_) if self.shadow_observed => {}
            Some(shadow_root) => {
                self.shadow_observed = true;
                actions.push(PortalAction::Observe(shadow_root));
            }
        }
        actions
    }

    /// Look for a visible overlay dialog
    pub fn check<D: HostDocument + ?Sized>(&mut self, doc: &D) -> OverlayCheck {
        let dialog = find_overlay_dialog(doc).filter(|dialog| is_overlay_visible(doc, *dialog));

        let Some(dialog) = dialog else {
            if std::mem::take(&mut self.last_overlay_present) {
                return OverlayCheck::Dismissed;
            }
            return OverlayCheck::Unchanged;
        };

        self.last_overlay_present = true;
        let message = overlay_message(doc, dialog);
        OverlayCheck::Present(PreviewErrorInfo::new(PreviewErrorType::NextjsOverlay, message))
    }
}

fn find_overlay_dialog<D: HostDocument + ?Sized>(doc: &D) -> Option<NodeId> {
    let light = LIGHT_DOM_OVERLAY_SELECTORS
        .iter()
        .find_map(|selector| doc.query_selector(selector).ok().flatten());
    if light.is_some() {
        return light;
    }

    let portal = doc.query_selector(NEXTJS_PORTAL_TAG).ok().flatten()?;
    let shadow_root = doc.shadow_root(portal)?;
    SHADOW_OVERLAY_SELECTORS
        .iter()
        .find_map(|selector| doc.query_selector_in(shadow_root, selector).ok().flatten())
}

fn is_overlay_visible<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> bool {
    doc.computed_style(node, "display") != "none"
        && doc.computed_style(node, "visibility") != "hidden"
        && doc.computed_style(node, "opacity") != "0"
        && doc.offset_parent(node).is_some()
}

fn first_text<D: HostDocument + ?Sized>(doc: &D, root: NodeId, selectors: &[&str]) -> String {
    selectors
        .iter()
        .find_map(|selector| doc.query_selector_in(root, selector).ok().flatten())
        .map(|node| doc.text_content(node).trim().to_string())
        .unwrap_or_default()
}

fn overlay_message<D: HostDocument + ?Sized>(doc: &D, dialog: NodeId) -> String {
    let parts = [
        first_text(doc, dialog, HEADER_SELECTORS),
        first_text(doc, dialog, BODY_SELECTORS),
        first_text(doc, dialog, CODEFRAME_SELECTORS),
    ];
    let mut message = parts
        .iter()
        .filter(|part| !part.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");

    if message.trim().is_empty() {
        message = BLANK_LINES.replace_all(&doc.text_content(dialog), "\n\n").trim().to_string();
    }
    if message.is_empty() {
        message = OVERLAY_FALLBACK_MESSAGE.to_string();
    }

    message.chars().take(MAX_OVERLAY_MESSAGE_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomTree, ElementNode};

    #[test]
    fn test_runtime_error_defaults() {
        let info = RuntimeErrorEvent::new("").into_error_info();
        assert_eq!(info.message, "Runtime error");
        assert_eq!(info.error_type, PreviewErrorType::Runtime);

        let info = RuntimeErrorEvent {
            message: "boom".into(),
            filename: Some(String::new()),
            lineno: Some(0),
            colno: Some(4),
            stack: None,
        }
        .into_error_info();
        assert_eq!(info.filename, None);
        assert_eq!(info.lineno, None);
        assert_eq!(info.colno, Some(4));
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(RejectionReason::Message("nope".into()).into_error_info().message, "nope");
        assert_eq!(RejectionReason::Other.into_error_info().message, "Unhandled promise rejection");
        let reason = RejectionReason::Error { message: "bad".into(), stack: Some("at x".into()) };
        let info = reason.into_error_info();
        assert_eq!(info.error_type, PreviewErrorType::UnhandledRejection);
        assert_eq!(info.stack.as_deref(), Some("at x"));
    }

    #[test]
    fn test_reporter_dedup_and_clear() {
        let mut reporter = ErrorReporter::new();
        let runtime = PreviewErrorInfo::new(PreviewErrorType::Runtime, "x".repeat(300));
        let mut similar = runtime.clone();
        similar.message.push_str("different tail");

        assert!(reporter.report(&runtime));
        assert!(!reporter.report(&similar));
        let overlay = PreviewErrorInfo::new(PreviewErrorType::NextjsOverlay, "overlay");
        assert!(reporter.report(&overlay));

        reporter.clear(Some(PreviewErrorType::NextjsOverlay));
        assert_eq!(reporter.len(), 1);
        reporter.clear(None);
        assert!(reporter.is_empty());
        assert!(reporter.report(&runtime));
    }

    fn dialog(children: Vec<ElementNode>) -> ElementNode {
        ElementNode::new("div")
            .with_attribute("data-nextjs-dialog", "")
            .with_bounding_box(100.0, 100.0, 400.0, 300.0)
            .with_children(children)
    }

    #[test]
    fn test_light_dom_overlay_message() {
        let tree = DomTree::new(ElementNode::new("body").with_child(dialog(vec![
            ElementNode::new("h1").with_text(" Unhandled Runtime Error "),
            ElementNode::new("p")
                .with_attribute("data-nextjs-error-message", "")
                .with_text("x is undefined"),
            ElementNode::new("pre").with_text("> 1 | x.y"),
        ])));
        let mut detector = OverlayDetector::new(Duration::from_millis(50), 10);

        let OverlayCheck::Present(info) = detector.check(&tree) else {
            panic!("overlay not detected");
        };
        assert_eq!(info.message, "Unhandled Runtime Error\nx is undefined\n> 1 | x.y");
        assert_eq!(info.error_type, PreviewErrorType::NextjsOverlay);
        assert!(detector.is_overlay_present());
    }

    #[test]
    fn test_overlay_fallback_text() {
        let empty = DomTree::new(ElementNode::new("body").with_child(dialog(vec![])));
        let mut detector = OverlayDetector::new(Duration::from_millis(50), 10);
        assert_eq!(
            detector.check(&empty),
            OverlayCheck::Present(PreviewErrorInfo::new(
                PreviewErrorType::NextjsOverlay,
                OVERLAY_FALLBACK_MESSAGE
            ))
        );

        let long_text = ElementNode::new("div").with_text(&"e".repeat(2500));
        let long = DomTree::new(ElementNode::new("body").with_child(dialog(vec![long_text])));
        let OverlayCheck::Present(info) = detector.check(&long) else {
            panic!("overlay not detected");
        };
        assert_eq!(info.message.chars().count(), MAX_OVERLAY_MESSAGE_CHARS);
    }

    #[test]
    fn test_hidden_overlay_is_ignored_and_dismissal_reported() {
        let heading = ElementNode::new("h1").with_text("Error");
        let mut tree = DomTree::new(ElementNode::new("body").with_child(dialog(vec![heading])));
        let mut detector = OverlayDetector::new(Duration::from_millis(50), 10);
        assert!(matches!(detector.check(&tree), OverlayCheck::Present(_)));

        let overlay = tree.query_selector("[data-nextjs-dialog]").unwrap().unwrap();
        tree.set_inline_style(overlay, "display", "none");
        assert_eq!(detector.check(&tree), OverlayCheck::Dismissed);
        assert_eq!(detector.check(&tree), OverlayCheck::Unchanged);
    }

    #[test]
    fn test_shadow_root_overlay_and_polling() {
        let mut tree =
            DomTree::new(ElementNode::new("body").with_child(ElementNode::new("nextjs-portal")));
        let portal = tree.query_selector("nextjs-portal").unwrap().unwrap();
        let mut detector = OverlayDetector::new(Duration::from_millis(50), 2);

        let poll = vec![PortalAction::Poll(Duration::from_millis(50))];
        assert_eq!(detector.observe_portal(&tree), poll);
        assert_eq!(detector.observe_portal(&tree), poll);
        assert!(detector.observe_portal(&tree).is_empty());

        let shadow_root = tree.attach_shadow(portal).unwrap();
        let overlay = tree.create_element("div");
        tree.set_attribute(overlay, "role", "dialog");
        let title = tree.create_element("h1");
        tree.set_text_content(title, "Build Error");
        tree.append_child(overlay, title);
        tree.append_child(shadow_root, overlay);

        assert_eq!(detector.observe_portal(&tree), vec![PortalAction::Observe(shadow_root)]);
        assert!(detector.observe_portal(&tree).is_empty());
        assert!(detector.is_observing());

        let OverlayCheck::Present(info) = detector.check(&tree) else {
            panic!("shadow overlay not detected");
        };
        assert_eq!(info.message, "Build Error");

        tree.remove_node(portal);
        assert_eq!(detector.observe_portal(&tree), vec![PortalAction::Disconnect]);
        assert_eq!(detector.check(&tree), OverlayCheck::Dismissed);
    }
}
