//! In-memory live document
//!
//! Nodes live in an arena. Detaching a subtree frees its slots for reuse;
//! handles to freed nodes stop resolving.

use super::html::HtmlParser;
use super::{DomPatchSurface, FocusState, NodeId};
use crate::network::FileBlob;
use crate::utils::{Result, error::DomError};

/// Node types in the DOM
#[derive(Debug, Clone, PartialEq)]
pub enum NodeType {
    /// Document root
    Document,
    /// Element node (e.g., <div>)
    Element(ElementData),
    /// Text node
    Text(String),
    /// Comment node
    Comment(String),
}

/// Data for element nodes
#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    /// Lowercase tag name (e.g., "div", "span")
    pub tag_name: String,
    /// Attributes in source order
    pub attributes: Vec<(String, String)>,
}

impl ElementData {
    /// Create a new element
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into().to_ascii_lowercase(),
            attributes: Vec::new(),
        }
    }

    /// Get an attribute value
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute value, keeping its position if it already exists
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) {
        self.attributes.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    /// Get the ID attribute
    pub fn id(&self) -> Option<&str> {
        self.get_attribute("id")
    }
}

/// A detached node tree, as produced by the parser
#[derive(Debug, Clone)]
pub struct Node {
    /// Node type and data
    pub node_type: NodeType,
    /// Child nodes
    pub children: Vec<Node>,
}

impl Node {
    /// Create a new node
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            children: Vec::new(),
        }
    }

    /// Create an element node
    pub fn element(tag_name: impl Into<String>) -> Self {
        Self::new(NodeType::Element(ElementData::new(tag_name)))
    }

    /// Create a text node
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(NodeType::Text(content.into()))
    }

    /// Add a child node
    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Get element data if this is an element
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.node_type {
            NodeType::Element(data) => Some(data),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct ArenaNode {
    node_type: NodeType,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    files: Vec<FileBlob>,
}

/// Arena slot; `generation` is bumped every time the slot is freed
#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<ArenaNode>,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Live document implementing [`DomPatchSurface`]
#[derive(Clone)]
pub struct ArenaDocument {
    slots: Vec<Slot>,
    free: Vec<usize>,
    root: NodeId,
    location: Option<String>,
    focus: Option<FocusState>,
    navigations: Vec<String>,
    parser: HtmlParser,
}

impl ArenaDocument {
    /// Create an empty document
    pub fn new() -> Self {
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(ArenaNode {
                    node_type: NodeType::Document,
                    parent: None,
                    children: Vec::new(),
                    files: Vec::new(),
                }),
            }],
            free: Vec::new(),
            root: NodeId::new(0, 0),
            location: None,
            focus: None,
            navigations: Vec::new(),
            parser: HtmlParser::new(),
        }
    }

    /// Parse a full HTML page
    pub fn parse(html: &str) -> Result<Self> {
        let mut document = Self::new();
        let parsed = document.parser.parse(html)?;
        let root = document.root;
        for child in parsed.children {
            let id = document.adopt(child, Some(root));
            document.push_child(root, id);
        }
        Ok(document)
    }

    /// Set the page URL
    pub fn with_location(mut self, url: impl Into<String>) -> Self {
        self.location = Some(url.into());
        self
    }

    /// Element data of a node
    pub fn element(&self, node: NodeId) -> Option<&ElementData> {
        match &self.node(node)?.node_type {
            NodeType::Element(data) => Some(data),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Result<&mut ElementData> {
        match self.node_mut(node).map(|n| &mut n.node_type) {
            Some(NodeType::Element(data)) => Ok(data),
            _ => Err(DomError::UnknownNode(node.index()).into()),
        }
    }

    /// Select files in a file input
    pub fn attach_file(&mut self, node: NodeId, file: FileBlob) {
        if let Some(arena_node) = self.node_mut(node) {
            arena_node.files.push(file);
        }
    }

    /// Focus an element by id
    pub fn set_focus(&mut self, element_id: &str, caret: Option<usize>) {
        self.focus = Some(FocusState {
            element_id: element_id.to_string(),
            caret,
        });
    }

    /// URLs navigated to, in order
    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }

    /// Number of live nodes, the document node included
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    fn node(&self, id: NodeId) -> Option<&ArenaNode> {
        let slot = self.slots.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut ArenaNode> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    fn push_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        let Some(arena_node) = self.node(node) else {
            return;
        };
        match &arena_node.node_type {
            NodeType::Document => {
                for &child in &arena_node.children {
                    self.write_node(child, out);
                }
            }
            NodeType::Text(text) => {
                let raw = self
                    .parent(node)
                    .and_then(|p| self.tag_name(p))
                    .is_some_and(|t| t == "script" || t == "style");
                if raw {
                    out.push_str(text);
                } else {
                    out.push_str(&escape(text, false));
                }
            }
            NodeType::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeType::Element(data) => {
                out.push('<');
                out.push_str(&data.tag_name);
                for (name, value) in &data.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape(value, true));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&data.tag_name.as_str()) {
                    return;
                }
                for &child in &arena_node.children {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(&data.tag_name);
                out.push('>');
            }
        }
    }

    fn alloc(&mut self, node_type: NodeType, parent: Option<NodeId>) -> NodeId {
        let node = ArenaNode {
            node_type,
            parent,
            children: Vec::new(),
            files: Vec::new(),
        };
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.node = Some(node);
                NodeId::new(index, slot.generation)
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId::new(self.slots.len() - 1, 0)
            }
        }
    }

    /// Free a detached subtree
    fn release(&mut self, root: NodeId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if id == self.root {
                continue;
            }
            let Some(slot) = self.slots.get_mut(id.index) else {
                continue;
            };
            if slot.generation != id.generation {
                continue;
            }
            if let Some(node) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
                stack.extend(node.children);
            }
        }
    }

    /// Move a detached tree into the arena under `parent`
    fn adopt(&mut self, node: Node, parent: Option<NodeId>) -> NodeId {
        let id = self.alloc(node.node_type, parent);
        for child in node.children {
            let child_id = self.adopt(child, Some(id));
            self.push_child(id, child_id);
        }
        id
    }

    /// Parent and index of an attached node
    fn position(&self, node: NodeId) -> Result<(NodeId, usize)> {
        let parent = self
            .node(node)
            .ok_or(DomError::UnknownNode(node.index()))?
            .parent
            .ok_or(DomError::Detached(node.index()))?;
        let index = self
            .node(parent)
            .and_then(|p| p.children.iter().position(|&c| c == node))
            .ok_or(DomError::Detached(node.index()))?;
        Ok((parent, index))
    }

    /// Parse markup and splice it into `parent` at `index`, freeing the
    /// `remove` children it replaces
    fn splice_markup(
        &mut self,
        parent: NodeId,
        index: usize,
        remove: usize,
        markup: &str,
    ) -> Result<Vec<NodeId>> {
        let fragment = self.parser.parse_fragment(markup)?;
        let ids: Vec<NodeId> = fragment
            .into_iter()
            .map(|node| self.adopt(node, Some(parent)))
            .collect();
        let removed: Vec<NodeId> = self
            .node_mut(parent)
            .ok_or(DomError::UnknownNode(parent.index()))?
            .children
            .splice(index..index + remove, ids.iter().copied())
            .collect();
        for old in removed {
            self.release(old);
        }
        Ok(ids)
    }

    fn child_element(&self, parent: NodeId, tag: &str) -> Option<NodeId> {
        self.node(parent)?
            .children
            .iter()
            .copied()
            .find(|&c| self.tag_name(c).as_deref() == Some(tag))
    }

    fn document_element(&self) -> Option<NodeId> {
        self.child_element(self.root, "html")
    }

    /// Pre-order walk of the subtree below `root`
    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.node(root) {
            Some(node) => node.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(node) = stack.pop() {
            out.push(node);
            if let Some(arena_node) = self.node(node) {
                stack.extend(arena_node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Identity of a head resource in the live tree
    fn live_resource_key(&self, node: NodeId) -> Option<(String, String)> {
        let element = self.element(node)?;
        resource_key(element, || self.text_content(node))
    }
}

impl Default for ArenaDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// `(tag, href | src | inline text)` of a `link`, `style` or `script`
fn resource_key(element: &ElementData, text: impl FnOnce() -> String) -> Option<(String, String)> {
    let tag = element.tag_name.as_str();
    let identity = match tag {
        "link" => element.get_attribute("href")?.to_string(),
        "script" => match element.get_attribute("src") {
            Some(src) => src.to_string(),
            None => text(),
        },
        "style" => text(),
        _ => return None,
    };
    Some((tag.to_string(), identity))
}

fn node_text(node: &Node) -> String {
    node.children
        .iter()
        .filter_map(|child| match &child.node_type {
            NodeType::Text(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            other => out.push(other),
        }
    }
    out
}

impl DomPatchSurface for ArenaDocument {
    fn document(&self) -> NodeId {
        self.root
    }

    fn location(&self) -> Option<String> {
        self.location.clone()
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|&node| self.element(node).and_then(|e| e.id()) == Some(id))
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.element(node).map(|e| e.tag_name.clone())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.element(node)
            .and_then(|e| e.get_attribute(name))
            .map(str::to_string)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<()> {
        self.element_mut(node)?.set_attribute(name, value);
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<()> {
        self.element_mut(node)?.remove_attribute(name);
        Ok(())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn text_content(&self, node: NodeId) -> String {
        if let Some(NodeType::Text(text)) = self.node(node).map(|n| &n.node_type) {
            return text.clone();
        }
        self.descendants(node)
            .into_iter()
            .filter_map(|n| match self.node(n).map(|n| &n.node_type) {
                Some(NodeType::Text(text)) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn find_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|&node| {
                self.element(node)
                    .is_some_and(|e| e.tag_name.eq_ignore_ascii_case(tag))
            })
            .collect()
    }

    fn is_connected(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if candidate == self.root {
                return true;
            }
            current = self.parent(candidate);
        }
        false
    }

    fn head(&self) -> Option<NodeId> {
        self.child_element(self.document_element()?, "head")
    }

    fn body(&self) -> Option<NodeId> {
        self.child_element(self.document_element()?, "body")
    }

    fn replace_outer(&mut self, node: NodeId, markup: &str) -> Result<Vec<NodeId>> {
        let (parent, index) = self.position(node)?;
        self.splice_markup(parent, index, 1, markup)
    }

    fn insert_before(&mut self, anchor: NodeId, markup: &str) -> Result<Vec<NodeId>> {
        let (parent, index) = self.position(anchor)?;
        self.splice_markup(parent, index, 0, markup)
    }

    fn insert_after(&mut self, anchor: NodeId, markup: &str) -> Result<Vec<NodeId>> {
        let (parent, index) = self.position(anchor)?;
        self.splice_markup(parent, index + 1, 0, markup)
    }

    fn append_markup(&mut self, parent: NodeId, markup: &str) -> Result<Vec<NodeId>> {
        let end = self
            .node(parent)
            .ok_or(DomError::UnknownNode(parent.index()))?
            .children
            .len();
        self.splice_markup(parent, end, 0, markup)
    }

    fn remove(&mut self, node: NodeId) -> Result<()> {
        if self.node(node).is_none() {
            // already removed and freed
            return Ok(());
        }
        match self.position(node) {
            Ok((parent, index)) => {
                if let Some(parent) = self.node_mut(parent) {
                    parent.children.remove(index);
                }
                self.release(node);
                Ok(())
            }
            Err(crate::utils::AjaxError::Dom(DomError::Detached(_))) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn merge_head_resources(&mut self, markup: &str) -> Result<Vec<NodeId>> {
        let head = self.head().ok_or(DomError::Parse("document has no head".to_string()))?;
        let sections = self.parser.parse_sections(markup)?;
        let mut present: Vec<(String, String)> = self
            .children(head)
            .into_iter()
            .filter_map(|child| self.live_resource_key(child))
            .collect();
        let mut added = Vec::new();
        for node in sections.head {
            let Some(key) = node.as_element().and_then(|e| resource_key(e, || node_text(&node))) else {
                continue;
            };
            if present.contains(&key) {
                log::trace!("head already has {} {}", key.0, key.1);
                continue;
            }
            present.push(key);
            let id = self.adopt(node, Some(head));
            self.push_child(head, id);
            added.push(id);
        }
        Ok(added)
    }

    fn replace_body(&mut self, markup: &str) -> Result<Vec<NodeId>> {
        let body = self.body().ok_or(DomError::Parse("document has no body".to_string()))?;
        let sections = self.parser.parse_sections(markup)?;
        let new_body = sections
            .body
            .ok_or(DomError::Parse("markup has no body".to_string()))?;

        let old_children = {
            let body_node = self
                .node_mut(body)
                .ok_or(DomError::UnknownNode(body.index()))?;
            if let (NodeType::Element(data), NodeType::Element(new_data)) =
                (&mut body_node.node_type, new_body.node_type)
            {
                data.attributes = new_data.attributes;
            }
            std::mem::take(&mut body_node.children)
        };
        for old in old_children {
            self.release(old);
        }
        for child in new_body.children {
            let id = self.adopt(child, Some(body));
            self.push_child(body, id);
        }
        // Replacing the body drops focus
        self.focus = None;
        Ok(vec![body])
    }

    fn files(&self, node: NodeId) -> Vec<FileBlob> {
        self.node(node)
            .map(|n| n.files.clone())
            .unwrap_or_default()
    }

    fn focus_state(&self) -> Option<FocusState> {
        self.focus.clone()
    }

    fn restore_focus(&mut self, state: &FocusState) -> bool {
        if self.element_by_id(&state.element_id).is_some() {
            self.focus = Some(state.clone());
            true
        } else {
            false
        }
    }

    fn navigate(&mut self, url: &str) {
        self.location = Some(url.to_string());
        self.navigations.push(url.to_string());
    }

    fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }
}
