//! `partial-response` documents
//!
//! The reply is parsed with xml5ever into a small owned element tree.
//! Directives and commands are kept as elements and only turned into
//! [`Command`]s when the interpreter reaches them, so a malformed command
//! fails at its own position and never before the ones preceding it.

use super::protocol::PARTIAL_RESPONSE;
use crate::utils::{Result, error::ProtocolError};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use xml5ever::driver::{XmlParseOpts, parse_document};
use xml5ever::tendril::TendrilSink;

/// Element of a response document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

impl XmlElement {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements in order
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|element| element.name == name)
    }

    /// Concatenated direct text children; CDATA may arrive split over
    /// several of them
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlNode::Text(text) => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }
}

/// Position of inserted markup relative to its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Before,
    After,
}

/// A `changes` sub-command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Update { target: String, markup: String },
    Insert { anchor: String, relation: Relation, markup: String },
    Delete { target: String },
    Eval { code: String },
    Attributes { target: String, entries: Vec<(String, String)> },
    Extension,
}

fn required<'a>(
    element: &'a XmlElement,
    command: &'static str,
    attribute: &'static str,
) -> Result<&'a str> {
    element
        .attribute(attribute)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ProtocolError::MissingAttribute { command, attribute }.into())
}

impl Command {
    /// Decode one sub-command; `None` for elements the protocol does not know
    pub fn parse(element: &XmlElement) -> Result<Option<Self>> {
        let command = match element.name.as_str() {
            "update" => Command::Update {
                target: required(element, "update", "id")?.to_string(),
                markup: element.text(),
            },
            "insert" => Self::parse_insert(element)?,
            "delete" => Command::Delete {
                target: required(element, "delete", "id")?.to_string(),
            },
            "eval" => Command::Eval { code: element.text() },
            "attributes" => {
                let target = required(element, "attributes", "id")?.to_string();
                let mut entries = Vec::new();
                for attribute in element.elements().filter(|e| e.name == "attribute") {
                    let name = required(attribute, "attribute", "name")?;
                    let value = attribute.attribute("value").unwrap_or_default();
                    entries.push((name.to_string(), value.to_string()));
                }
                Command::Attributes { target, entries }
            }
            "extension" => Command::Extension,
            _ => return Ok(None),
        };
        Ok(Some(command))
    }

    /// `<insert before|after="anchor">markup</insert>` or
    /// `<insert><before|after id="anchor">markup</..></insert>`
    fn parse_insert(element: &XmlElement) -> Result<Self> {
        for (name, relation) in [("before", Relation::Before), ("after", Relation::After)] {
            if let Some(anchor) = element.attribute(name).filter(|a| !a.is_empty()) {
                return Ok(Command::Insert {
                    anchor: anchor.to_string(),
                    relation,
                    markup: element.text(),
                });
            }
            if let Some(child) = element.child(name) {
                return Ok(Command::Insert {
                    anchor: required(child, "insert", "id")?.to_string(),
                    relation,
                    markup: child.text(),
                });
            }
        }
        Err(ProtocolError::MissingAttribute {
            command: "insert",
            attribute: "before",
        }
        .into())
    }
}

/// Top-level directive of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Error { name: String, message: String },
    Redirect { url: Option<String> },
    Changes(Vec<XmlElement>),
    Unknown(String),
}

impl Directive {
    fn from_element(element: &XmlElement) -> Self {
        match element.name.as_str() {
            "error" => Directive::Error {
                name: element.child("error-name").map(XmlElement::text).unwrap_or_default(),
                message: element
                    .child("error-message")
                    .map(XmlElement::text)
                    .unwrap_or_default(),
            },
            "redirect" => Directive::Redirect {
                url: element.attribute("url").map(str::to_string),
            },
            "changes" => Directive::Changes(element.elements().cloned().collect()),
            other => Directive::Unknown(other.to_string()),
        }
    }
}

/// A validated `partial-response`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseDocument {
    /// Optional `id` of the root (naming container of the view)
    pub id: Option<String>,
    pub directives: Vec<Directive>,
}

impl ResponseDocument {
    /// Parse and validate a response body
    pub fn parse(body: &str) -> Result<Self> {
        if body.trim().is_empty() {
            return Err(ProtocolError::EmptyResponse.into());
        }
        let dom = parse_document(RcDom::default(), XmlParseOpts::default())
            .from_utf8()
            .read_from(&mut body.as_bytes())
            .map_err(|e| ProtocolError::MalformedXml(e.to_string()))?;

        // declarations, comments and whitespace may precede the root
        let root = dom
            .document
            .children
            .borrow()
            .iter()
            .find_map(convert_element)
            .ok_or_else(|| ProtocolError::MalformedXml("document has no root element".to_string()))?;
        if root.name != PARTIAL_RESPONSE {
            return Err(ProtocolError::UnexpectedRoot(root.name).into());
        }

        Ok(Self {
            id: root.attribute("id").map(str::to_string),
            directives: root.elements().map(Directive::from_element).collect(),
        })
    }
}

fn convert_element(handle: &Handle) -> Option<XmlElement> {
    let NodeData::Element { name, attrs, .. } = &handle.data else {
        return None;
    };
    let attributes = attrs
        .borrow()
        .iter()
        .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
        .collect();
    let children = handle
        .children
        .borrow()
        .iter()
        .filter_map(|child| match &child.data {
            NodeData::Text { contents } => Some(XmlNode::Text(contents.borrow().to_string())),
            NodeData::Element { .. } => convert_element(child).map(XmlNode::Element),
            _ => None,
        })
        .collect();
    Some(XmlElement {
        name: name.local.to_string(),
        attributes,
        children,
    })
}
