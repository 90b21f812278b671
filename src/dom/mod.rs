//! DOM patch surface
//!
//! The engine never touches a document directly; it drives a
//! [`DomPatchSurface`], the capability interface a DOM layer supplies.
//! [`ArenaDocument`] is an in-memory implementation backed by html5ever.

mod document;
pub mod html;

pub use document::{ArenaDocument, ElementData, Node, NodeType};
pub use html::HtmlParser;

use crate::js_engine::ScriptEngine;
use crate::network::FileBlob;
use crate::utils::Result;
use std::fmt;

/// Handle on a node of a live document. Once the node is removed the
/// handle no longer resolves, even if its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Focused element and caret position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusState {
    pub element_id: String,
    pub caret: Option<usize>,
}

/// Operations the engine needs from a live document.
///
/// Mutating calls apply immediately; ids are resolved against the current
/// tree on every call, so nodes created by an earlier patch are visible to
/// the next one.
pub trait DomPatchSurface {
    /// The document node
    fn document(&self) -> NodeId;

    /// URL of the current page
    fn location(&self) -> Option<String>;

    fn element_by_id(&self, id: &str) -> Option<NodeId>;

    /// Lowercase tag name, `None` for non-element nodes
    fn tag_name(&self, node: NodeId) -> Option<String>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<()>;

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<()>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Concatenated text of all descendant text nodes
    fn text_content(&self, node: NodeId) -> String;

    /// Descendant elements (excluding `root`) with the given tag, in document order
    fn find_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId>;

    /// Whether the node is still reachable from the document
    fn is_connected(&self, node: NodeId) -> bool;

    fn head(&self) -> Option<NodeId>;

    fn body(&self) -> Option<NodeId>;

    /// Replace `node` by the parsed markup, returning the new top-level nodes
    fn replace_outer(&mut self, node: NodeId, markup: &str) -> Result<Vec<NodeId>>;

    fn insert_before(&mut self, anchor: NodeId, markup: &str) -> Result<Vec<NodeId>>;

    fn insert_after(&mut self, anchor: NodeId, markup: &str) -> Result<Vec<NodeId>>;

    /// Append parsed markup as the last children of `parent`
    fn append_markup(&mut self, parent: NodeId, markup: &str) -> Result<Vec<NodeId>>;

    /// Detach `node`; removing a detached node is a no-op
    fn remove(&mut self, node: NodeId) -> Result<()>;

    /// Append the `link`, `style` and `script` elements of a head (or
    /// whole document) markup to the live head
    fn merge_head_resources(&mut self, markup: &str) -> Result<Vec<NodeId>>;

    /// Replace attributes and content of the live body with those of the
    /// body in `markup`; returns the body node
    fn replace_body(&mut self, markup: &str) -> Result<Vec<NodeId>>;

    /// Files selected in a file input
    fn files(&self, node: NodeId) -> Vec<FileBlob>;

    fn focus_state(&self) -> Option<FocusState>;

    /// Focus the element named by `state` if it exists
    fn restore_focus(&mut self, state: &FocusState) -> bool;

    fn navigate(&mut self, url: &str);

    /// Serialized markup of a node, tag included
    fn outer_html(&self, node: NodeId) -> String;

    /// All forms of the document
    fn forms(&self) -> Vec<NodeId> {
        self.find_by_tag(self.document(), "form")
    }

    /// Nearest ancestor-or-self form
    fn enclosing_form(&self, node: NodeId) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if self.tag_name(candidate).as_deref() == Some("form") {
                return Some(candidate);
            }
            current = self.parent(candidate);
        }
        None
    }

    fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    /// Execute inline scripts contained in (or equal to) `nodes`, in
    /// document order. External scripts are skipped.
    fn run_embedded_scripts(&self, nodes: &[NodeId], scripts: &mut dyn ScriptEngine) -> Result<()> {
        for &node in nodes {
            let mut found = Vec::new();
            if self.tag_name(node).as_deref() == Some("script") {
                found.push(node);
            } else if self.tag_name(node).is_some() {
                found.extend(self.find_by_tag(node, "script"));
            }
            for script in found {
                if self.has_attribute(script, "src") {
                    log::debug!("skipping external script {}", script);
                    continue;
                }
                let runnable = match self.attribute(script, "type") {
                    None => true,
                    Some(kind) => {
                        let kind = kind.to_ascii_lowercase();
                        kind.is_empty() || kind.contains("javascript") || kind.contains("ecmascript")
                    }
                };
                if runnable {
                    let code = self.text_content(script);
                    if !code.trim().is_empty() {
                        scripts.execute(&code)?;
                    }
                }
            }
        }
        Ok(())
    }
}
