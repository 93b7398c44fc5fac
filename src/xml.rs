//! Namespace-aware XML tree built from quick-xml events.
//!
//! The reader checks well-formedness (matching end tags, a single root,
//! no unclosed elements) and keeps every element and text node in an arena
//! whose indices follow document order. Sorting element handles by their
//! [`NodeId`] therefore yields document order, which the query engine relies
//! on for union semantics.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use thiserror::Error;

/// Errors raised when the input is not well-formed XML.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum XmlError {
    #[error("{message} at byte {position}")]
    Syntax { message: String, position: u64 },

    #[error("unexpected end of input, expected closing tag </{0}>")]
    UnclosedElement(String),

    #[error("unexpected closing tag </{0}>")]
    UnexpectedEndTag(String),

    #[error("text content outside of the root element at byte {0}")]
    TextOutsideRoot(u64),

    #[error("document has more than one root element")]
    MultipleRoots,

    #[error("document has no root element")]
    EmptyDocument,
}

/// Position of a node in the document arena.
///
/// Ids are handed out in the order start tags and text appear in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
enum NodeKind {
    Element {
        namespace: Option<String>,
        local_name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    children: Vec<usize>,
}

/// A parsed XML document.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    /// Parses `content` into a document tree.
    ///
    /// # Errors
    ///
    /// Returns an [`XmlError`] if the input is not well-formed.
    pub fn parse(content: &str) -> Result<Document, XmlError> {
        let mut reader = NsReader::from_str(content);
        reader.config_mut().trim_text(false);

        let mut nodes: Vec<Node> = Vec::new();
        let mut stack: Vec<usize> = Vec::new();
        let mut has_root = false;

        loop {
            let event_start = reader.buffer_position();
            let (namespace, event) = match reader.read_resolved_event() {
                Ok((ResolveResult::Bound(ns), event)) => {
                    (Some(String::from_utf8_lossy(ns.as_ref()).into_owned()), event)
                }
                Ok((_, event)) => (None, event),
                Err(e) => {
                    return Err(XmlError::Syntax {
                        message: e.to_string(),
                        position: reader.error_position(),
                    })
                }
            };

            if matches!(event, Event::Start(_) | Event::Empty(_)) && stack.is_empty() && has_root {
                return Err(XmlError::MultipleRoots);
            }

            match event {
                Event::Start(e) => {
                    let id = push_element(&mut nodes, &stack, namespace, &e, event_start)?;
                    has_root = true;
                    stack.push(id);
                }
                Event::Empty(e) => {
                    push_element(&mut nodes, &stack, namespace, &e, event_start)?;
                    has_root = true;
                }
                Event::End(e) => {
                    if stack.pop().is_none() {
                        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        return Err(XmlError::UnexpectedEndTag(name));
                    }
                }
                Event::Text(e) => {
                    let text = e.unescape().map_err(|err| XmlError::Syntax {
                        message: format!("invalid text content: {}", err),
                        position: event_start,
                    })?;
                    push_text(&mut nodes, &stack, text.into_owned(), event_start)?;
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    push_text(&mut nodes, &stack, text, event_start)?;
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions and DOCTYPE
                // carry nothing the extractor reads.
                _ => {}
            }
        }

        if let Some(&open) = stack.last() {
            let name = match &nodes[open].kind {
                NodeKind::Element { local_name, .. } => local_name.clone(),
                NodeKind::Text(_) => String::new(),
            };
            return Err(XmlError::UnclosedElement(name));
        }
        if nodes.is_empty() {
            return Err(XmlError::EmptyDocument);
        }

        Ok(Document { nodes })
    }

    /// The document element.
    pub fn root(&self) -> Element<'_> {
        // The first node ever pushed is the root: text outside the root is
        // either skipped (whitespace) or rejected.
        Element { doc: self, index: 0 }
    }
}

fn push_element(
    nodes: &mut Vec<Node>,
    stack: &[usize],
    namespace: Option<String>,
    start: &BytesStart<'_>,
    position: u64,
) -> Result<usize, XmlError> {
    let local_name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Syntax {
            message: e.to_string(),
            position,
        })?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| XmlError::Syntax {
            message: format!("invalid attribute value: {}", e),
            position,
        })?;
        attributes.push((key, value.into_owned()));
    }

    let id = nodes.len();
    nodes.push(Node {
        kind: NodeKind::Element {
            namespace,
            local_name,
            attributes,
        },
        children: Vec::new(),
    });
    if let Some(&parent) = stack.last() {
        nodes[parent].children.push(id);
    }
    Ok(id)
}

fn push_text(
    nodes: &mut Vec<Node>,
    stack: &[usize],
    text: String,
    position: u64,
) -> Result<(), XmlError> {
    let Some(&parent) = stack.last() else {
        if text.trim().is_empty() {
            return Ok(());
        }
        return Err(XmlError::TextOutsideRoot(position));
    };

    let id = nodes.len();
    nodes.push(Node {
        kind: NodeKind::Text(text),
        children: Vec::new(),
    });
    nodes[parent].children.push(id);
    Ok(())
}

/// A borrowed handle to an element node.
#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    doc: &'a Document,
    index: usize,
}

impl PartialEq for Element<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.index == other.index
    }
}

impl Eq for Element<'_> {}

impl<'a> Element<'a> {
    pub fn id(&self) -> NodeId {
        NodeId(self.index)
    }

    fn node(&self) -> &'a Node {
        &self.doc.nodes[self.index]
    }

    /// Local (unprefixed) element name.
    pub fn local_name(&self) -> &'a str {
        match &self.node().kind {
            NodeKind::Element { local_name, .. } => local_name,
            NodeKind::Text(_) => "",
        }
    }

    /// Namespace URI the element name resolved to, if any.
    pub fn namespace(&self) -> Option<&'a str> {
        match &self.node().kind {
            NodeKind::Element { namespace, .. } => namespace.as_deref(),
            NodeKind::Text(_) => None,
        }
    }

    /// Value of the attribute with the given local name.
    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        match &self.node().kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    /// Child elements, in document order.
    pub fn children(&self) -> impl Iterator<Item = Element<'a>> + 'a {
        let doc = self.doc;
        self.node()
            .children
            .iter()
            .filter(move |&&i| matches!(doc.nodes[i].kind, NodeKind::Element { .. }))
            .map(move |&index| Element { doc, index })
    }

    /// All descendant elements (excluding `self`), in document order.
    pub fn descendants(&self) -> Vec<Element<'a>> {
        let mut out = Vec::new();
        let mut pending: Vec<usize> = self.node().children.iter().rev().copied().collect();
        while let Some(index) = pending.pop() {
            let node = &self.doc.nodes[index];
            if let NodeKind::Element { .. } = node.kind {
                out.push(Element {
                    doc: self.doc,
                    index,
                });
                pending.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Raw descendant text nodes, in document order.
    pub fn text_nodes(&self) -> Vec<&'a str> {
        let mut out = Vec::new();
        let mut pending: Vec<usize> = self.node().children.iter().rev().copied().collect();
        while let Some(index) = pending.pop() {
            let node = &self.doc.nodes[index];
            match &node.kind {
                NodeKind::Text(text) => out.push(text.as_str()),
                NodeKind::Element { .. } => pending.extend(node.children.iter().rev().copied()),
            }
        }
        out
    }

    /// Descendant text with whitespace runs collapsed to single spaces and
    /// trimmed at both ends.
    pub fn text(&self) -> String {
        self.text_nodes()
            .concat()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}
