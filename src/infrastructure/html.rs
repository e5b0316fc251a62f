//! HTML tree model: html5ever parsing into the document arena and
//! serialization back to bytes.
//!
//! `<template>` contents are kept as ordinary children of the template
//! element, so they are visited and serialized like any other subtree.

use std::borrow::Cow;
use std::io::{self, Read, Write};

use html5ever::serialize::{Serialize, SerializeOpts, Serializer, TraversalScope};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{namespace_url, ns, Attribute, ExpandedName, LocalName, ParseOpts, QualName};
use tracing::{instrument, trace};

use crate::domain::{Attr, Document, NodeData, NodeId};

/// Parse a complete document from a reader.
///
/// Input is decoded as UTF-8 (invalid sequences are replaced); only read
/// failures surface as errors.
#[instrument(level = "debug", skip(reader))]
pub fn parse_document<R: Read>(reader: &mut R) -> io::Result<Document> {
    let mut document = Document::new();
    let root = document.root();
    html5ever::parse_document(DocumentSink::new(&mut document, root), ParseOpts::default())
        .from_utf8()
        .read_from(reader)?;
    Ok(document)
}

/// Parse a complete document from a string.
pub fn parse_str(html: &str) -> Document {
    let mut document = Document::new();
    let root = document.root();
    parse_str_into(&mut document, root, html);
    document
}

/// Parse `html` as a complete document under `root`, an empty document-kind
/// node already allocated in `document`. Returns `root`.
#[instrument(level = "trace", skip(document, html))]
pub fn parse_str_into(document: &mut Document, root: NodeId, html: &str) -> NodeId {
    html5ever::parse_document(DocumentSink::new(document, root), ParseOpts::default()).one(html)
}

/// Serialize `id` including the node itself. Document-kind nodes serialize
/// as their children.
pub fn serialize_node<W: Write>(writer: W, document: &Document, id: NodeId) -> io::Result<()> {
    serialize_with_scope(writer, document, id, TraversalScope::IncludeNode)
}

/// Serialize only the children of `id`.
pub fn serialize_children<W: Write>(writer: W, document: &Document, id: NodeId) -> io::Result<()> {
    serialize_with_scope(writer, document, id, TraversalScope::ChildrenOnly(None))
}

/// Serialize the children of `id` into a string.
pub fn children_to_string(document: &Document, id: NodeId) -> io::Result<String> {
    let mut buf = Vec::new();
    serialize_children(&mut buf, document, id)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Serialize `id` into a string.
pub fn node_to_string(document: &Document, id: NodeId) -> io::Result<String> {
    let mut buf = Vec::new();
    serialize_node(&mut buf, document, id)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn serialize_with_scope<W: Write>(
    writer: W,
    document: &Document,
    id: NodeId,
    traversal_scope: TraversalScope,
) -> io::Result<()> {
    let opts = SerializeOpts {
        traversal_scope,
        ..Default::default()
    };
    html5ever::serialize::serialize(writer, &SerializableNode { document, id }, opts)
}

struct SerializableNode<'a> {
    document: &'a Document,
    id: NodeId,
}

impl Serialize for SerializableNode<'_> {
    fn serialize<S: Serializer>(
        &self,
        serializer: &mut S,
        traversal_scope: TraversalScope,
    ) -> io::Result<()> {
        match traversal_scope {
            TraversalScope::IncludeNode => write_node(self.document, self.id, serializer),
            TraversalScope::ChildrenOnly(_) => {
                for &child in self.document.children(self.id) {
                    write_node(self.document, child, serializer)?;
                }
                Ok(())
            }
        }
    }
}

fn write_node<S: Serializer>(document: &Document, id: NodeId, serializer: &mut S) -> io::Result<()> {
    let node = document.get(id).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "serializing a freed node")
    })?;
    match &node.data {
        NodeData::Document => {
            for &child in node.children() {
                write_node(document, child, serializer)?;
            }
            Ok(())
        }
        NodeData::Element { name, attrs } => {
            serializer.start_elem(
                name.clone(),
                attrs.iter().map(|attr| (&attr.name, attr.value.as_str())),
            )?;
            for &child in node.children() {
                write_node(document, child, serializer)?;
            }
            serializer.end_elem(name.clone())
        }
        NodeData::Doctype { name, .. } => serializer.write_doctype(name),
        NodeData::Text { contents } => serializer.write_text(contents),
        NodeData::Comment { contents } => serializer.write_comment(contents),
        NodeData::ProcessingInstruction { target, data } => {
            serializer.write_processing_instruction(target, data)
        }
    }
}

/// html5ever tree sink writing into a [`Document`] arena under a given root.
struct DocumentSink<'a> {
    document: &'a mut Document,
    root: NodeId,
    quirks_mode: QuirksMode,
    // Returned by `elem_name` for handles that are not elements.
    fallback_name: QualName,
}

impl<'a> DocumentSink<'a> {
    fn new(document: &'a mut Document, root: NodeId) -> Self {
        Self {
            document,
            root,
            quirks_mode: QuirksMode::NoQuirks,
            fallback_name: QualName::new(None, ns!(html), LocalName::from("")),
        }
    }

    fn append_child(&mut self, parent: NodeId, child: NodeOrText<NodeId>) {
        let result = match child {
            NodeOrText::AppendNode(node) => self.document.append(parent, node),
            NodeOrText::AppendText(text) => self.document.append_text(parent, &text),
        };
        if let Err(e) = result {
            trace!(error = %e, "tree sink append ignored");
        }
    }
}

fn convert_attrs(attrs: Vec<Attribute>) -> Vec<Attr> {
    attrs
        .into_iter()
        .map(|attr| Attr {
            name: attr.name,
            value: attr.value.to_string(),
        })
        .collect()
}

impl TreeSink for DocumentSink<'_> {
    type Handle = NodeId;
    type Output = NodeId;

    fn finish(self) -> NodeId {
        trace!(quirks_mode = ?self.quirks_mode, "parse finished");
        self.root
    }

    fn parse_error(&mut self, msg: Cow<'static, str>) {
        trace!(%msg, "html parse error");
    }

    fn get_document(&mut self) -> NodeId {
        self.root
    }

    fn elem_name<'b>(&'b self, target: &'b NodeId) -> ExpandedName<'b> {
        self.document
            .element_name(*target)
            .unwrap_or(&self.fallback_name)
            .expanded()
    }

    fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>, _: ElementFlags) -> NodeId {
        self.document.create_node(NodeData::Element {
            name,
            attrs: convert_attrs(attrs),
        })
    }

    fn create_comment(&mut self, text: StrTendril) -> NodeId {
        self.document.create_node(NodeData::Comment {
            contents: text.to_string(),
        })
    }

    fn create_pi(&mut self, target: StrTendril, data: StrTendril) -> NodeId {
        self.document.create_node(NodeData::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        })
    }

    fn append(&mut self, parent: &NodeId, child: NodeOrText<NodeId>) {
        self.append_child(*parent, child);
    }

    fn append_based_on_parent_node(
        &mut self,
        element: &NodeId,
        prev_element: &NodeId,
        child: NodeOrText<NodeId>,
    ) {
        if self.document.parent(*element).is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append_child(*prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &mut self,
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    ) {
        let doctype = self.document.create_node(NodeData::Doctype {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        });
        self.append_child(self.root, NodeOrText::AppendNode(doctype));
    }

    fn get_template_contents(&mut self, target: &NodeId) -> NodeId {
        *target
    }

    fn same_node(&self, x: &NodeId, y: &NodeId) -> bool {
        x == y
    }

    fn set_quirks_mode(&mut self, mode: QuirksMode) {
        self.quirks_mode = mode;
    }

    fn append_before_sibling(&mut self, sibling: &NodeId, new_node: NodeOrText<NodeId>) {
        let result = match new_node {
            NodeOrText::AppendNode(node) => self.document.insert_before(*sibling, node),
            NodeOrText::AppendText(text) => self.document.insert_text_before(*sibling, &text),
        };
        if let Err(e) = result {
            trace!(error = %e, "tree sink insert ignored");
        }
    }

    fn add_attrs_if_missing(&mut self, target: &NodeId, attrs: Vec<Attribute>) {
        if let Some(NodeData::Element { attrs: existing, .. }) =
            self.document.get_mut(*target).map(|node| &mut node.data)
        {
            for attr in convert_attrs(attrs) {
                if !existing.iter().any(|e| e.name == attr.name) {
                    existing.push(attr);
                }
            }
        }
    }

    fn remove_from_parent(&mut self, target: &NodeId) {
        self.document.detach(*target);
    }

    fn reparent_children(&mut self, node: &NodeId, new_parent: &NodeId) {
        if let Err(e) = self.document.reparent_children(*node, *new_parent) {
            trace!(error = %e, "tree sink reparent ignored");
        }
    }
}
