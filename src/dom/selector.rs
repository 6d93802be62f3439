use crate::dom::NodeId;
use crate::error::{BridgeError, Result};
use scraper::Html;

/// Attribute carrying the arena index of every element in serialized markup
pub(crate) const NODE_MARKER_ATTRIBUTE: &str = "data-wiblo-node";

/// Elements that never have an end tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Parsed CSS selector list, matched with `scraper`
#[derive(Debug, Clone)]
pub struct Selector {
    inner: scraper::Selector,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self> {
        let inner = scraper::Selector::parse(input).map_err(|e| BridgeError::InvalidSelector {
            selector: input.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { inner })
    }

    /// Nodes of `markup` matching the selector, in document order
    pub(crate) fn select(&self, markup: &Markup) -> Vec<NodeId> {
        let html = match markup.kind {
            MarkupKind::Document => Html::parse_document(&markup.text),
            MarkupKind::Fragment => Html::parse_fragment(&markup.text),
        };
        let matched: Vec<NodeId> = html
            .select(&self.inner)
            .filter_map(|element| element.value().attr(NODE_MARKER_ATTRIBUTE))
            .filter_map(|index| index.parse::<usize>().ok())
            .map(NodeId)
            .collect();
        matched
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkupKind {
    /// A whole `<html>` document
    Document,
    /// Shadow root content or a detached subtree
    Fragment,
}

/// HTML serialization of a node tree where each element carries [`NODE_MARKER_ATTRIBUTE`]
#[derive(Debug)]
pub(crate) struct Markup {
    kind: MarkupKind,
    text: String,
}

impl Markup {
    pub(crate) fn new(kind: MarkupKind) -> Self {
        let text = match kind {
            // standards mode, so the parser does not apply quirks
            MarkupKind::Document => "<!DOCTYPE html>".to_string(),
            MarkupKind::Fragment => String::new(),
        };
        Self { kind, text }
    }

    /// Write a start tag; returns false for void elements, which take no content
    pub(crate) fn open(
        &mut self,
        tag_name: &str,
        node: NodeId,
        attributes: &[(String, String)],
    ) -> bool {
        self.text.push('<');
        self.text.push_str(tag_name);
        self.text.push_str(&format!(" {}=\"{}\"", NODE_MARKER_ATTRIBUTE, node.0));
        for (name, value) in attributes {
            if name == NODE_MARKER_ATTRIBUTE || !is_attribute_name(name) {
                continue;
            }
            self.text.push(' ');
            self.text.push_str(name);
            self.text.push_str("=\"");
            self.text.push_str(&escape_markup(value, true));
            self.text.push('"');
        }
        self.text.push('>');
        !VOID_ELEMENTS.contains(&tag_name)
    }

    pub(crate) fn text(&mut self, text: &str) {
        self.text.push_str(&escape_markup(text, false));
    }

    pub(crate) fn close(&mut self, tag_name: &str) {
        self.text.push_str("</");
        self.text.push_str(tag_name);
        self.text.push('>');
    }
}

fn is_attribute_name(name: &str) -> bool {
    let forbidden = |c: char| {
        c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '>' | '/' | '=' | '<')
    };
    !name.is_empty() && !name.chars().any(forbidden)
}

fn escape_markup(value: &str, in_attribute: bool) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' if in_attribute => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selectors() {
        assert!(Selector::parse("main > section.hero.dark:nth-of-type(2) > h1").is_ok());
        assert!(Selector::parse("#pricing").is_ok());
        assert!(Selector::parse("[data-nextjs-dialog]").is_ok());
        assert!(Selector::parse("[role='dialog']").is_ok());
        assert!(Selector::parse("li:not(#a), li:nth-child(2n+1), ul li:first-of-type").is_ok());
        assert!(Selector::parse("li:is(#b), [id=b i]").is_ok());
        assert!(Selector::parse(r"#\:r1\:").is_ok());
    }

    #[test]
    fn test_parse_errors() {
        let err = Selector::parse("div >").unwrap_err();
        assert!(matches!(
            err,
            BridgeError::InvalidSelector { ref selector, .. } if selector == "div >"
        ));
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("#:r1:").is_err());
        assert!(Selector::parse("[href").is_err());
    }

    #[test]
    fn test_markup_escaping() {
        let mut markup = Markup::new(MarkupKind::Fragment);
        let attributes = vec![
            ("title".to_string(), "say \"hi\" & <bye>".to_string()),
            ("bad name".to_string(), "dropped".to_string()),
        ];
        assert!(markup.open("p", NodeId(3), &attributes));
        markup.text("1 < 2");
        markup.close("p");
        assert_eq!(
            markup.text,
            "<p data-wiblo-node=\"3\" title=\"say &quot;hi&quot; &amp; &lt;bye&gt;\">1 &lt; 2</p>"
        );

        let mut void = Markup::new(MarkupKind::Fragment);
        assert!(!void.open("img", NodeId(0), &[]));
    }

    #[test]
    fn test_select_maps_back_to_nodes() {
        let mut markup = Markup::new(MarkupKind::Fragment);
        markup.open("ul", NodeId(10), &[]);
        for (index, id) in [(11, "a"), (12, "b"), (13, "c")] {
            markup.open("li", NodeId(index), &[("id".to_string(), id.to_string())]);
            markup.close("li");
        }
        markup.close("ul");

        let selector = Selector::parse("li:not(#a)").unwrap();
        assert_eq!(selector.select(&markup), vec![NodeId(12), NodeId(13)]);

        let selector = Selector::parse("li:nth-child(2n)").unwrap();
        assert_eq!(selector.select(&markup), vec![NodeId(12)]);

        let selector = Selector::parse("[id=B i]").unwrap();
        assert_eq!(selector.select(&markup), vec![NodeId(12)]);
    }
}
