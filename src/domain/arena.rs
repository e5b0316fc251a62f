use std::collections::BTreeMap;
use std::fmt;

use generational_arena::{Arena, Index};
use html5ever::QualName;
use tracing::instrument;

use crate::domain::error::{DomainError, DomainResult};

/// Stable handle to a node stored in a [`Document`].
pub type NodeId = Index;

/// A single HTML attribute as parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: QualName,
    pub value: String,
}

/// Payload of a tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// Document root (also used for detached containers)
    Document,
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
    /// Element with its tag name and attributes in source order
    Element { name: QualName, attrs: Vec<Attr> },
    Text { contents: String },
    Comment { contents: String },
    ProcessingInstruction { target: String, data: String },
}

impl fmt::Display for NodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeData::Document => write!(f, "#document"),
            NodeData::Doctype { name, .. } => write!(f, "<!DOCTYPE {}>", name),
            NodeData::Element { name, attrs } => {
                write!(f, "<{}", name.local)?;
                for attr in attrs {
                    write!(f, " {}=\"{}\"", attr.name.local, attr.value)?;
                }
                write!(f, ">")
            }
            NodeData::Text { contents } => write!(f, "#text {:?}", contents),
            NodeData::Comment { contents } => write!(f, "<!--{}-->", contents),
            NodeData::ProcessingInstruction { target, data } => {
                write!(f, "<?{} {}>", target, data)
            }
        }
    }
}

/// Tree node in the arena-based document structure.
#[derive(Debug, Clone)]
pub struct Node {
    /// Node payload
    pub data: NodeData,
    /// Index of parent node in the arena, None for roots and detached nodes
    parent: Option<NodeId>,
    /// Indices of child nodes in the arena, in document order
    children: Vec<NodeId>,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena-backed HTML document.
///
/// All structural mutation goes through `Document` methods, which keep each
/// node's `children` list and every child's `parent` back-reference in sync.
/// Freed nodes leave stale generational indices behind; lookups with a stale
/// id return `None` instead of aliasing a newer node.
#[derive(Debug, Clone)]
pub struct Document {
    arena: Arena<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.insert(Node::new(NodeData::Document));
        Self { arena, root }
    }

    /// The document root created with this arena.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes in the arena.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Allocate a detached node.
    #[instrument(level = "trace", skip(self))]
    pub fn create_node(&mut self, data: NodeData) -> NodeId {
        self.arena.insert(Node::new(data))
    }

    /// Allocate a detached document-kind node, used as a temporary parse root
    /// or as a container for moved children.
    pub fn create_container(&mut self) -> NodeId {
        self.create_node(NodeData::Document)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.arena.get_mut(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.contains(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|node| node.parent)
    }

    /// Children of `id`; empty for unknown ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|node| node.children()).unwrap_or(&[])
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.get(id).map(|node| &node.data)
    }

    pub fn element_name(&self, id: NodeId) -> Option<&QualName> {
        match self.data(id) {
            Some(NodeData::Element { name, .. }) => Some(name),
            _ => None,
        }
    }

    /// Local tag name of an element node.
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.element_name(id).map(|name| &*name.local)
    }

    /// Attributes of an element as a key→value mapping.
    ///
    /// Keys are attribute local names as parsed, values are the parsed
    /// (entity-decoded) values. Non-elements yield an empty mapping.
    pub fn attributes(&self, id: NodeId) -> BTreeMap<String, String> {
        match self.data(id) {
            Some(NodeData::Element { attrs, .. }) => attrs
                .iter()
                .map(|attr| (attr.name.local.to_string(), attr.value.clone()))
                .collect(),
            _ => BTreeMap::new(),
        }
    }

    /// Remove `id` from its parent's children. No-op for detached nodes.
    #[instrument(level = "trace", skip(self))]
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.arena.get_mut(id).and_then(|node| node.parent.take()) else {
            return;
        };
        if let Some(parent) = self.arena.get_mut(parent) {
            parent.children.retain(|&child| child != id);
        }
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    #[instrument(level = "trace", skip(self))]
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> DomainResult<()> {
        if !self.contains(parent) || !self.contains(child) {
            return Err(DomainError::NodeNotFound);
        }
        self.detach(child);
        self.link(parent, child, None);
        Ok(())
    }

    /// Insert `child` immediately before `sibling`, detaching it first.
    #[instrument(level = "trace", skip(self))]
    pub fn insert_before(&mut self, sibling: NodeId, child: NodeId) -> DomainResult<()> {
        if !self.contains(child) {
            return Err(DomainError::NodeNotFound);
        }
        let parent = self.parent(sibling).ok_or(DomainError::NotAChild)?;
        self.detach(child);
        let position = self.position(parent, sibling)?;
        self.link(parent, child, Some(position));
        Ok(())
    }

    /// Put `new` in `old`'s place under `parent`; `old` ends up detached.
    #[instrument(level = "trace", skip(self))]
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> DomainResult<()> {
        if !self.contains(new) {
            return Err(DomainError::NodeNotFound);
        }
        if old == new {
            return Ok(());
        }
        self.position(parent, old)?;
        self.detach(new);
        let position = self.position(parent, old)?;
        if let Some(parent_node) = self.arena.get_mut(parent) {
            parent_node.children[position] = new;
        }
        if let Some(old_node) = self.arena.get_mut(old) {
            old_node.parent = None;
        }
        if let Some(new_node) = self.arena.get_mut(new) {
            new_node.parent = Some(parent);
        }
        Ok(())
    }

    /// Move every child of `from` to the end of `to`, preserving order.
    #[instrument(level = "trace", skip(self))]
    pub fn reparent_children(&mut self, from: NodeId, to: NodeId) -> DomainResult<()> {
        if !self.contains(to) {
            return Err(DomainError::NodeNotFound);
        }
        let moved = match self.arena.get_mut(from) {
            Some(node) => std::mem::take(&mut node.children),
            None => return Err(DomainError::NodeNotFound),
        };
        for &child in &moved {
            if let Some(node) = self.arena.get_mut(child) {
                node.parent = Some(to);
            }
        }
        if let Some(target) = self.arena.get_mut(to) {
            target.children.extend(moved);
        }
        Ok(())
    }

    /// Detach `id` and free it together with all of its descendants.
    #[instrument(level = "trace", skip(self))]
    pub fn remove_subtree(&mut self, id: NodeId) {
        self.detach(id);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.arena.remove(current) {
                stack.extend(node.children);
            }
        }
    }

    /// Append text to `parent`, merging with a trailing text child.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> DomainResult<()> {
        if let Some(&last) = self.children(parent).last() {
            if let Some(NodeData::Text { contents }) = self.get_mut(last).map(|n| &mut n.data) {
                contents.push_str(text);
                return Ok(());
            }
        }
        let node = self.create_node(NodeData::Text {
            contents: text.to_string(),
        });
        self.append(parent, node)
    }

    /// Insert text before `sibling`, merging with a preceding text sibling.
    pub fn insert_text_before(&mut self, sibling: NodeId, text: &str) -> DomainResult<()> {
        let parent = self.parent(sibling).ok_or(DomainError::NotAChild)?;
        let position = self.position(parent, sibling)?;
        if position > 0 {
            let previous = self.children(parent)[position - 1];
            if let Some(NodeData::Text { contents }) = self.get_mut(previous).map(|n| &mut n.data) {
                contents.push_str(text);
                return Ok(());
            }
        }
        let node = self.create_node(NodeData::Text {
            contents: text.to_string(),
        });
        self.insert_before(sibling, node)
    }

    /// Pre-order iterator over the subtree rooted at `id`.
    pub fn iter(&self, id: NodeId) -> TreeIterator<'_> {
        TreeIterator::new(self, id)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self, id: NodeId) -> usize {
        if !self.contains(id) {
            return 0;
        }
        1 + self
            .children(id)
            .iter()
            .map(|&child| self.depth(child))
            .max()
            .unwrap_or(0)
    }

    fn position(&self, parent: NodeId, child: NodeId) -> DomainResult<usize> {
        self.get(parent)
            .ok_or(DomainError::NodeNotFound)?
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or(DomainError::NotAChild)
    }

    // Caller guarantees `child` is detached and both ids are live.
    fn link(&mut self, parent: NodeId, child: NodeId, position: Option<usize>) {
        if let Some(parent_node) = self.arena.get_mut(parent) {
            match position {
                Some(position) => parent_node.children.insert(position, child),
                None => parent_node.children.push(child),
            }
        }
        if let Some(child_node) = self.arena.get_mut(child) {
            child_node.parent = Some(parent);
        }
    }
}

pub struct TreeIterator<'a> {
    document: &'a Document,
    stack: Vec<NodeId>,
}

impl<'a> TreeIterator<'a> {
    fn new(document: &'a Document, start: NodeId) -> Self {
        Self {
            document,
            stack: vec![start],
        }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.stack.pop() {
            if let Some(node) = self.document.get(current) {
                // Push children in reverse order for left-to-right traversal
                self.stack.extend(node.children.iter().rev());
                return Some((current, node));
            }
        }
        None
    }
}
