//! HTML5 parsing via html5ever into detached [`Node`] trees

use super::document::{ElementData, Node, NodeType};
use crate::utils::error::DomError;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::{ParseOpts, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Head and body of a parsed document
#[derive(Debug, Clone)]
pub struct ParsedSections {
    /// Children of `<head>`
    pub head: Vec<Node>,
    /// The `<body>` element itself
    pub body: Option<Node>,
}

/// HTML5 parser using html5ever
#[derive(Clone)]
pub struct HtmlParser {
    opts: ParseOpts,
}

impl HtmlParser {
    /// Create a new HTML parser
    pub fn new() -> Self {
        Self {
            opts: ParseOpts {
                tree_builder: TreeBuilderOpts {
                    drop_doctype: true,
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    fn parse_dom(&self, content: &str) -> Result<RcDom, DomError> {
        parse_document(RcDom::default(), self.opts.clone())
            .from_utf8()
            .read_from(&mut content.as_bytes())
            .map_err(|e| DomError::Parse(e.to_string()))
    }

    /// Parse a whole document; the returned node is the document node
    pub fn parse(&self, content: &str) -> Result<Node, DomError> {
        let dom = self.parse_dom(content)?;
        Ok(convert(&dom.document).unwrap_or_else(|| Node::new(NodeType::Document)))
    }

    /// Parse markup as body content, returning its top-level nodes
    pub fn parse_fragment(&self, markup: &str) -> Result<Vec<Node>, DomError> {
        let wrapped = format!("<!DOCTYPE html><html><head></head><body>{}</body></html>", markup);
        let dom = self.parse_dom(&wrapped)?;
        let body = html_child(&dom.document, "body")
            .ok_or_else(|| DomError::Parse("fragment produced no body".to_string()))?;
        let nodes = body.children.borrow().iter().filter_map(convert).collect();
        Ok(nodes)
    }

    /// Parse a document (or head / body markup) and split it into sections
    pub fn parse_sections(&self, markup: &str) -> Result<ParsedSections, DomError> {
        let dom = self.parse_dom(markup)?;
        let head = html_child(&dom.document, "head")
            .map(|head| head.children.borrow().iter().filter_map(convert).collect())
            .unwrap_or_default();
        let body = html_child(&dom.document, "body").and_then(|body| convert(&body));
        Ok(ParsedSections { head, body })
    }
}

impl Default for HtmlParser {
    fn default() -> Self {
        Self::new()
    }
}

fn element_name(handle: &Handle) -> Option<String> {
    match &handle.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

/// `<html>` child named `tag` (`head` or `body`)
fn html_child(document: &Handle, tag: &str) -> Option<Handle> {
    let html = document
        .children
        .borrow()
        .iter()
        .find(|child| element_name(child).as_deref() == Some("html"))
        .cloned()?;
    let found = html
        .children
        .borrow()
        .iter()
        .find(|child| element_name(child).as_deref() == Some(tag))
        .cloned();
    found
}

fn convert(handle: &Handle) -> Option<Node> {
    let mut node = match &handle.data {
        NodeData::Document => Node::new(NodeType::Document),
        NodeData::Element { name, attrs, .. } => {
            let mut data = ElementData::new(name.local.to_string());
            for attr in attrs.borrow().iter() {
                data.set_attribute(attr.name.local.to_string(), attr.value.to_string());
            }
            Node::new(NodeType::Element(data))
        }
        NodeData::Text { contents } => return Some(Node::text(contents.borrow().to_string())),
        NodeData::Comment { contents } => {
            return Some(Node::new(NodeType::Comment(contents.to_string())));
        }
        NodeData::Doctype { .. } | NodeData::ProcessingInstruction { .. } => return None,
    };
    for child in handle.children.borrow().iter() {
        if let Some(converted) = convert(child) {
            node.add_child(converted);
        }
    }
    Some(node)
}
