//! Arena-backed node tree.
//!
//! Nodes are owned by the [`Tree`] and addressed by [`NodeId`]. A node's
//! `children` list is the owning edge; `parent` is a plain index used only to
//! walk upward when resolving scope bindings.

use std::collections::HashMap;

use crate::Delimiters;

/// Variable name to string value.
pub type Fields = HashMap<String, String>;

/// Namespace (e.g. `post`) to its field table.
pub type ScopeBindings = HashMap<String, Fields>;

/// Index of a node inside its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Text,
    If,
    For,
    Raw,
    Group,
}

impl NodeKind {
    /// Kind opened by a tag name (`if`, `for`, `raw`).
    pub fn from_open_tag(name: &str) -> Option<Self> {
        match name {
            "if" => Some(NodeKind::If),
            "for" => Some(NodeKind::For),
            "raw" => Some(NodeKind::Raw),
            _ => None,
        }
    }

    /// Kind named by an end tag (`endif`, `endfor`, `endraw`).
    pub fn from_end_tag(name: &str) -> Option<Self> {
        name.strip_prefix("end").and_then(Self::from_open_tag)
    }

    /// The tag name for block kinds; `None` for Root, Text and Group.
    pub fn tag_name(self) -> Option<&'static str> {
        match self {
            NodeKind::If => Some("if"),
            NodeKind::For => Some("for"),
            NodeKind::Raw => Some("raw"),
            NodeKind::Root | NodeKind::Text | NodeKind::Group => None,
        }
    }

    pub fn is_block(self) -> bool {
        self.tag_name().is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    /// Tag content for blocks (`" if page.title "`), literal text for Text.
    pub content: String,
    /// Content of the tag that closed this block, when it came from source.
    pub end_tag: Option<String>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub bindings: Option<ScopeBindings>,
    /// Text flattened from a raw block; never interpreted again.
    pub verbatim: bool,
}

impl Node {
    fn new(kind: NodeKind, content: String, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            content,
            end_tag: None,
            children: Vec::new(),
            parent,
            bindings: None,
            verbatim: false,
        }
    }
}

/// A parsed template. Index 0 is always the root.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    delimiters: Delimiters,
}

impl Tree {
    pub fn new(delimiters: Delimiters) -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Root, String::new(), None)],
            delimiters,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn delimiters(&self) -> Delimiters {
        self.delimiters
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.0].kind
    }

    pub fn content(&self, id: NodeId) -> &str {
        &self.nodes[id.0].content
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Create a node and append it as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, kind: NodeKind, content: impl Into<String>) -> NodeId {
        let id = self.alloc(kind, content.into(), Some(parent));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Create a node attached to `parent` without listing it as a child yet.
    ///
    /// Used to build replacement children before swapping them in with
    /// [`Tree::make_group`].
    pub fn detached(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        self.alloc(kind, String::new(), Some(parent))
    }

    pub fn set_end_tag(&mut self, id: NodeId, end_tag: impl Into<String>) {
        self.nodes[id.0].end_tag = Some(end_tag.into());
    }

    pub fn bind(&mut self, id: NodeId, namespace: impl Into<String>, fields: Fields) {
        self.nodes[id.0]
            .bindings
            .get_or_insert_with(HashMap::new)
            .insert(namespace.into(), fields);
    }

    /// Turn a node into Text with the given content, dropping its children.
    pub fn make_text(&mut self, id: NodeId, content: impl Into<String>) {
        let node = &mut self.nodes[id.0];
        node.kind = NodeKind::Text;
        node.content = content.into();
        node.end_tag = None;
        node.children.clear();
        node.verbatim = false;
    }

    /// Like [`Tree::make_text`], but marks the text as raw-block content.
    pub fn make_verbatim(&mut self, id: NodeId, content: impl Into<String>) {
        self.make_text(id, content);
        self.nodes[id.0].verbatim = true;
    }

    pub fn is_verbatim(&self, id: NodeId) -> bool {
        self.nodes[id.0].verbatim
    }

    /// Turn a node into a Group with the given children.
    pub fn make_group(&mut self, id: NodeId, children: Vec<NodeId>) {
        for &child in &children {
            self.nodes[child.0].parent = Some(id);
        }
        let node = &mut self.nodes[id.0];
        node.kind = NodeKind::Group;
        node.content.clear();
        node.end_tag = None;
        node.children = children;
        node.verbatim = false;
    }

    pub fn set_text(&mut self, id: NodeId, content: String) {
        debug_assert_eq!(self.nodes[id.0].kind, NodeKind::Text);
        self.nodes[id.0].content = content;
    }

    /// Find the nearest table bound for `namespace`, starting at `id` and
    /// walking up through parents. The root never carries bindings.
    pub fn scope(&self, id: NodeId, namespace: &str) -> Option<&Fields> {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = &self.nodes[current.0];
            if let Some(fields) = node.bindings.as_ref().and_then(|b| b.get(namespace)) {
                return Some(fields);
            }
            cursor = node.parent;
        }
        None
    }

    /// Resolve `namespace.field` through scope bindings.
    pub fn lookup(&self, id: NodeId, namespace: &str, field: &str) -> Option<&str> {
        self.scope(id, namespace)
            .and_then(|fields| fields.get(field))
            .map(String::as_str)
    }

    /// Depth-first list of every node reachable from `id`, `id` included.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    fn alloc(&mut self, kind: NodeKind, content: String, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(kind, content, parent));
        id
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new(Delimiters::default())
    }
}
