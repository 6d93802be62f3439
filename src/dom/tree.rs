use crate::dom::element::{ElementNode, Viewport};
use crate::dom::selector::{Markup, MarkupKind, Selector};
use crate::dom::style::StyleDeclaration;
use crate::dom::{EventBlockPolicy, HostDocument, NodeId, PseudoClass, Rect};
use crate::error::{BridgeError, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashSet;

const SHADOW_ROOT_TAG: &str = "#shadow-root";

const SVG_TAGS: &[&str] = &[
    "svg", "g", "path", "circle", "ellipse", "line", "polyline", "polygon", "rect", "text", "use",
    "defs", "symbol",
];

const INHERITED_PROPERTIES: &[&str] = &[
    "color",
    "cursor",
    "font-family",
    "font-size",
    "font-weight",
    "letter-spacing",
    "line-height",
    "text-align",
    "visibility",
];

/// Initial values reported when neither inline nor declared styles set a property
fn initial_value(property: &str) -> &'static str {
    match property {
        "display" => "block",
        "position" => "static",
        "opacity" => "1",
        "visibility" => "visible",
        "transform" => "none",
        "pointer-events" => "auto",
        "z-index" => "auto",
        "background-color" => "rgba(0, 0, 0, 0)",
        "background-image" => "none",
        "color" => "rgb(0, 0, 0)",
        "font-size" => "16px",
        "font-weight" => "400",
        "font-family" => "system-ui",
        "line-height" => "normal",
        "letter-spacing" => "normal",
        "text-align" => "start",
        "border-radius" => "0px",
        "border-width" => "0px",
        "border-style" => "none",
        "border-color" => "rgb(0, 0, 0)",
        "box-shadow" => "none",
        "filter" => "none",
        "outline" => "rgb(0, 0, 0) none 0px",
        "outline-style" => "none",
        "outline-width" => "0px",
        "outline-offset" => "0px",
        "outline-color" => "rgb(0, 0, 0)",
        "scale" => "none",
        "translate" => "none",
        "rotate" => "none",
        "flex-direction" => "row",
        "justify-content" => "normal",
        "align-items" => "normal",
        "gap" => "normal",
        "min-width" | "min-height" => "auto",
        "max-width" | "max-height" => "none",
        "margin" | "margin-top" | "margin-right" | "margin-bottom" | "margin-left" => "0px",
        "padding" | "padding-top" | "padding-right" | "padding-bottom" | "padding-left" => "0px",
        "cursor" => "auto",
        _ => "",
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    tag_name: String,
    attributes: IndexMap<String, String>,
    inline: StyleDeclaration,
    computed: IndexMap<String, String>,
    rect: Rect,
    offset_size: Option<(f64, f64)>,
    text: Option<String>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    /// Host element when this node is a shadow root
    host: Option<NodeId>,
    shadow_root: Option<NodeId>,
    hovered: bool,
    focused: bool,
    focus_visible: bool,
}

impl NodeData {
    fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_ascii_lowercase(),
            attributes: IndexMap::new(),
            inline: StyleDeclaration::new(),
            computed: IndexMap::new(),
            rect: Rect::default(),
            offset_size: None,
            text: None,
            children: Vec::new(),
            parent: None,
            host: None,
            shadow_root: None,
            hovered: false,
            focused: false,
            focus_visible: false,
        }
    }
}

/// Document file format accepted by [`DomTree::from_json`]
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DocumentDescription {
    Full {
        #[serde(default)]
        viewport: Viewport,
        root: ElementNode,
    },
    Root(ElementNode),
}

/// In-memory document implementing [`HostDocument`].
///
/// Nodes live in an arena and are never freed, so every [`NodeId`] stays valid for the
/// lifetime of the tree. Detached nodes simply report `is_connected() == false`.
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<NodeData>,
    html: NodeId,
    head: NodeId,
    body: NodeId,
    viewport: Viewport,
    blocked_events: IndexMap<String, EventBlockPolicy>,
}

impl DomTree {
    /// Build a document from a root element.
    ///
    /// An `html` root is used as is (missing `head`/`body` are created); a `body` root is
    /// wrapped in `html`; any other root becomes the single child of a new `body`.
    pub fn new(root: ElementNode) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            html: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            viewport: Viewport::default(),
            blocked_events: IndexMap::new(),
        };

        let html_description = if root.is_tag("html") {
            root
        } else if root.is_tag("body") {
            ElementNode::new("html").with_child(root)
        } else {
            ElementNode::new("html").with_child(ElementNode::new("body").with_child(root))
        };

        tree.html = tree.insert_subtree(&html_description, None);

        let children = tree.nodes[tree.html.0].children.clone();
        let head = children.iter().copied().find(|c| tree.nodes[c.0].tag_name == "head");
        let body = children.iter().copied().find(|c| tree.nodes[c.0].tag_name == "body");

        tree.head = match head {
            Some(head) => head,
            None => {
                let head = tree.alloc(NodeData::new("head"));
                tree.nodes[head.0].parent = Some(tree.html);
                tree.nodes[tree.html.0].children.insert(0, head);
                head
            }
        };
        tree.body = match body {
            Some(body) => body,
            None => {
                let body = tree.alloc(NodeData::new("body"));
                tree.append_child(tree.html, body);
                body
            }
        };

        let (width, height) = (tree.viewport.width, tree.viewport.height);
        for root in [tree.html, tree.body] {
            if !tree.nodes[root.0].rect.has_area() {
                tree.nodes[root.0].rect = Rect::new(0.0, 0.0, width, height);
            }
        }

        tree
    }

    /// Parse a document description: either `{"viewport": {...}, "root": {...}}` or a bare
    /// root element
    pub fn from_json(json: &str) -> Result<Self> {
        let description: DocumentDescription = serde_json::from_str(json)
            .map_err(|e| {
                BridgeError::DocumentParseFailed(format!("Failed to parse document JSON: {}", e))
            })?;

        Ok(match description {
            DocumentDescription::Full { viewport, root } => Self::new(root).with_viewport(viewport),
            DocumentDescription::Root(root) => Self::new(root),
        })
    }

    /// Builder method: set viewport size
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        let previous = Rect::new(0.0, 0.0, self.viewport.width, self.viewport.height);
        for root in [self.html, self.body] {
            if self.nodes[root.0].rect == previous {
                self.nodes[root.0].rect = Rect::new(0.0, 0.0, viewport.width, viewport.height);
            }
        }
        self.viewport = viewport;
        self
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(data);
        id
    }

    fn insert_subtree(&mut self, description: &ElementNode, parent: Option<NodeId>) -> NodeId {
        let mut data = NodeData::new(&description.tag_name);
        data.attributes = description.attributes.clone();
        data.computed = description.styles.clone();
        if let Some(inline) = description.attributes.get("style") {
            data.inline = StyleDeclaration::parse(inline);
        }
        data.rect = description.bounding_box.unwrap_or_default();
        data.offset_size = match (description.offset_width, description.offset_height) {
            (Some(width), Some(height)) => Some((width, height)),
            _ => None,
        };
        data.text = description.text_content.clone();
        data.parent = parent;
        data.hovered = description.hovered;
        data.focused = description.focused;
        data.focus_visible = description.focus_visible;

        let id = self.alloc(data);
        for child in &description.children {
            let child_id = self.insert_subtree(child, Some(id));
            self.nodes[id.0].children.push(child_id);
        }

        if let Some(shadow_children) = &description.shadow_root {
            let mut fragment = NodeData::new(SHADOW_ROOT_TAG);
            fragment.host = Some(id);
            let fragment_id = self.alloc(fragment);
            for child in shadow_children {
                let child_id = self.insert_subtree(child, Some(fragment_id));
                self.nodes[fragment_id.0].children.push(child_id);
            }
            self.nodes[id.0].shadow_root = Some(fragment_id);
        }

        id
    }

    fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        let node = self.nodes.get_mut(id.0);
        if node.is_none() {
            log::warn!("Ignoring mutation of unknown node {}", id);
        }
        node
    }

    /// Resolve a node by its `id` attribute
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.html)
            .into_iter()
            .find(|node| self.attribute(*node, "id").as_deref() == Some(id))
    }

    /// Update the bounding box of a node (layout change)
    pub fn set_bounding_box(&mut self, node: NodeId, rect: Rect) -> Result<()> {
        let data = self.nodes.get_mut(node.0).ok_or(BridgeError::UnknownNode(node))?;
        data.rect = rect;
        Ok(())
    }

    /// Set a declared (non-inline) computed style value
    pub fn set_declared_style(&mut self, node: NodeId, property: &str, value: &str) -> Result<()> {
        let data = self.nodes.get_mut(node.0).ok_or(BridgeError::UnknownNode(node))?;
        data.computed.insert(property.to_string(), value.to_string());
        Ok(())
    }

    /// Attach a shadow root to `host` and return it
    pub fn attach_shadow(&mut self, host: NodeId) -> Result<NodeId> {
        if self.node(host).is_none() {
            return Err(BridgeError::UnknownNode(host));
        }
        if let Some(existing) = self.nodes[host.0].shadow_root {
            return Ok(existing);
        }
        let mut fragment = NodeData::new(SHADOW_ROOT_TAG);
        fragment.host = Some(host);
        let fragment_id = self.alloc(fragment);
        self.nodes[host.0].shadow_root = Some(fragment_id);
        Ok(fragment_id)
    }

    /// Mark hover state, as the pointer would
    pub fn set_hovered(&mut self, node: NodeId, hovered: bool) -> Result<()> {
        let data = self.nodes.get_mut(node.0).ok_or(BridgeError::UnknownNode(node))?;
        data.hovered = hovered;
        Ok(())
    }

    /// Event types currently blocked at the capture phase
    pub fn blocked_events(&self) -> Vec<(String, EventBlockPolicy)> {
        self.blocked_events
            .iter()
            .map(|(event, policy)| (event.clone(), *policy))
            .collect()
    }

    /// Number of nodes ever allocated (attached or not)
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn is_rendered(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if self.computed_style(candidate, "display") == "none" {
                return false;
            }
            current = self.parent(candidate);
        }
        true
    }

    fn z_index(&self, node: NodeId) -> i64 {
        self.computed_style(node, "z-index").trim().parse::<i64>().unwrap_or(0)
    }

    /// Serialize the tree holding `node`: the document, a shadow root's content, or a
    /// detached subtree
    fn markup_for(&self, node: NodeId) -> Markup {
        let mut top = node;
        while let Some(parent) = self.node(top).and_then(|n| n.parent) {
            top = parent;
        }

        if top == self.html {
            let mut markup = Markup::new(MarkupKind::Document);
            self.write_markup(self.html, &mut markup);
            return markup;
        }

        let mut markup = Markup::new(MarkupKind::Fragment);
        if self.node(top).is_some_and(|n| n.host.is_some()) {
            for child in self.children(top) {
                self.write_markup(child, &mut markup);
            }
        } else {
            self.write_markup(top, &mut markup);
        }
        markup
    }

    fn write_markup(&self, node: NodeId, markup: &mut Markup) {
        let Some(data) = self.node(node) else {
            return;
        };
        if !markup.open(&data.tag_name, node, &self.attributes(node)) {
            return;
        }
        if let Some(text) = &data.text {
            markup.text(text);
        }
        for child in &data.children {
            self.write_markup(*child, markup);
        }
        markup.close(&data.tag_name);
    }

    fn collect_descendants(&self, root: NodeId, out: &mut Vec<NodeId>) {
        if let Some(data) = self.node(root) {
            for child in &data.children {
                out.push(*child);
                self.collect_descendants(*child, out);
            }
        }
    }
}

impl HostDocument for DomTree {
    fn document_element(&self) -> NodeId {
        self.html
    }

    fn head(&self) -> NodeId {
        self.head
    }

    fn body(&self) -> NodeId {
        self.body
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node).map(|n| n.children.clone()).unwrap_or_default()
    }

    fn is_connected(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if candidate == self.html {
                return true;
            }
            let Some(data) = self.node(candidate) else {
                return false;
            };
            current = data.parent.or(data.host);
        }
        false
    }

    fn tag_name(&self, node: NodeId) -> String {
        self.node(node).map(|n| n.tag_name.clone()).unwrap_or_default()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        let data = self.node(node)?;
        if name == "style" {
            return (!data.inline.is_empty()).then(|| data.inline.css_text());
        }
        data.attributes.get(name).cloned()
    }

    fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        let Some(data) = self.node(node) else {
            return Vec::new();
        };
        let mut attributes: Vec<(String, String)> = data
            .attributes
            .iter()
            .map(|(name, value)| {
                if name == "style" {
                    (name.clone(), data.inline.css_text())
                } else {
                    (name.clone(), value.clone())
                }
            })
            .collect();
        if !data.inline.is_empty() && !data.attributes.contains_key("style") {
            attributes.push(("style".to_string(), data.inline.css_text()));
        }
        attributes
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(data) = self.node_mut(node) {
            if name == "style" {
                data.inline = StyleDeclaration::parse(value);
            }
            data.attributes.insert(name.to_string(), value.to_string());
        }
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(data) = self.node_mut(node) {
            if name == "style" {
                data.inline = StyleDeclaration::new();
            }
            data.attributes.shift_remove(name);
        }
    }

    fn bounding_client_rect(&self, node: NodeId) -> Rect {
        if !self.is_connected(node) || !self.is_rendered(node) {
            return Rect::default();
        }
        self.node(node).map(|n| n.rect).unwrap_or_default()
    }

    fn offset_size(&self, node: NodeId) -> Option<(f64, f64)> {
        let data = self.node(node)?;
        if SVG_TAGS.contains(&data.tag_name.as_str()) {
            return None;
        }
        if !self.is_connected(node) || !self.is_rendered(node) {
            return Some((0.0, 0.0));
        }
        Some(data.offset_size.unwrap_or((data.rect.width, data.rect.height)))
    }

    fn offset_parent(&self, node: NodeId) -> Option<NodeId> {
        if node == self.body || node == self.html {
            return None;
        }
        if !self.is_connected(node) || !self.is_rendered(node) {
            return None;
        }
        let mut current = self.parent(node);
        while let Some(ancestor) = current {
            if ancestor == self.body || self.computed_style(ancestor, "position") != "static" {
                return Some(ancestor);
            }
            current = self.parent(ancestor);
        }
        Some(self.body)
    }

    fn computed_style(&self, node: NodeId, property: &str) -> String {
        let Some(data) = self.node(node) else {
            return String::new();
        };

        let inline = data.inline.get(property);
        if !inline.is_empty() {
            return inline;
        }
        if let Some(value) = data.computed.get(property) {
            return value.clone();
        }
        if INHERITED_PROPERTIES.contains(&property) {
            if let Some(parent) = data.parent {
                return self.computed_style(parent, property);
            }
        }
        if property == "width" {
            return format!("{}px", data.rect.width);
        }
        if property == "height" {
            return format!("{}px", data.rect.height);
        }
        initial_value(property).to_string()
    }

    fn inline_style(&self, node: NodeId, property: &str) -> String {
        self.node(node).map(|n| n.inline.get(property)).unwrap_or_default()
    }

    fn set_inline_style(&mut self, node: NodeId, property: &str, value: &str) {
        if let Some(data) = self.node_mut(node) {
            data.inline.set(property, value);
        }
    }

    fn remove_inline_style(&mut self, node: NodeId, property: &str) {
        if let Some(data) = self.node_mut(node) {
            data.inline.remove(property);
        }
    }

    fn inline_css_text(&self, node: NodeId) -> String {
        self.node(node).map(|n| n.inline.css_text()).unwrap_or_default()
    }

    fn set_inline_css_text(&mut self, node: NodeId, css_text: &str) {
        if let Some(data) = self.node_mut(node) {
            data.inline = StyleDeclaration::parse(css_text);
        }
    }

    fn single_text_child(&self, node: NodeId) -> Option<String> {
        let data = self.node(node)?;
        if !data.children.is_empty() {
            return None;
        }
        data.text.clone()
    }

    fn text_content(&self, node: NodeId) -> String {
        let Some(data) = self.node(node) else {
            return String::new();
        };
        let mut text = data.text.clone().unwrap_or_default();
        for child in &data.children {
            text.push_str(&self.text_content(*child));
        }
        text
    }

    fn query_selector_in(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>> {
        let selector = Selector::parse(selector)?;
        let scope: HashSet<NodeId> = self.descendants(root).into_iter().collect();
        Ok(selector
            .select(&self.markup_for(root))
            .into_iter()
            .find(|node| scope.contains(node)))
    }

    fn elements_from_point(&self, x: f64, y: f64) -> Vec<NodeId> {
        let mut hits: Vec<(i64, usize, NodeId)> = std::iter::once(self.html)
            .chain(self.descendants(self.html))
            .enumerate()
            .filter(|(_, node)| {
                self.computed_style(*node, "visibility") != "hidden"
                    && self.computed_style(*node, "pointer-events") != "none"
                    && self.bounding_client_rect(*node).contains_point(x, y)
            })
            .map(|(order, node)| (self.z_index(node), order, node))
            .collect();

        hits.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        hits.into_iter().map(|(_, _, node)| node).collect()
    }

    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_descendants(root, &mut out);
        out
    }

    fn viewport_size(&self) -> (f64, f64) {
        (self.viewport.width, self.viewport.height)
    }

    fn pseudo_class_elements(&self, pseudo: PseudoClass) -> Vec<NodeId> {
        let mut matched: Vec<NodeId> = Vec::new();
        for node in self.descendants(self.html) {
            let data = &self.nodes[node.0];
            let hit = match pseudo {
                PseudoClass::Hover => data.hovered,
                PseudoClass::Focus => data.focused,
                PseudoClass::FocusVisible => data.focus_visible,
            };
            if !hit {
                continue;
            }
            if pseudo == PseudoClass::Hover {
                // :hover also matches every ancestor of the hovered element
                let mut current = data.parent;
                while let Some(ancestor) = current {
                    if !matched.contains(&ancestor) {
                        matched.push(ancestor);
                    }
                    current = self.parent(ancestor);
                }
            }
            if !matched.contains(&node) {
                matched.push(node);
            }
        }
        matched.sort();
        matched
    }

    fn shadow_root(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.shadow_root
    }

    fn create_element(&mut self, tag_name: &str) -> NodeId {
        self.alloc(NodeData::new(tag_name))
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.node(parent).is_none() || self.node(child).is_none() || parent == child {
            log::warn!("Refusing to append {} to {}", child, parent);
            return;
        }
        self.remove_node(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn remove_node(&mut self, node: NodeId) {
        let Some(parent) = self.node(node).and_then(|n| n.parent) else {
            return;
        };
        self.nodes[parent.0].children.retain(|c| *c != node);
        self.nodes[node.0].parent = None;
    }

    fn clear_children(&mut self, node: NodeId) {
        for child in self.children(node) {
            self.remove_node(child);
        }
    }

    fn set_text_content(&mut self, node: NodeId, text: &str) {
        self.clear_children(node);
        if let Some(data) = self.node_mut(node) {
            data.text = Some(text.to_string());
        }
    }

    fn block_events(&mut self, events: &[&str], policy: EventBlockPolicy) {
        for event in events {
            self.blocked_events.insert(event.to_string(), policy);
        }
    }

    fn unblock_events(&mut self, events: &[&str]) {
        for event in events {
            self.blocked_events.shift_remove(*event);
        }
    }
}
