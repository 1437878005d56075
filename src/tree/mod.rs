//! Document tree produced by the MultiMarkdown parser.
//!
//! The tree is an arena of [`Node`]s addressed by [`NodeId`]:
//! - Parent-pointer / first-child / next-sibling links, no shared ownership
//! - Node kinds are retagged in place (abbreviation spans, cited notes)
//!   so a node keeps its identity across passes
//! - Deep copies allocate fresh ids in the same arena
//!
//! # Example
//!
//! ```
//! use mmd_export::tree::{Node, NodeId, NodeKind, Tree};
//!
//! let mut tree = Tree::new();
//! let para = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
//! tree.add_child(para, Node::with_text(NodeKind::Str, "Hello"));
//! assert_eq!(tree.raw_text(para), "Hello");
//! ```

mod json;
mod link;
mod node;

pub use link::{Attribute, LinkData};
pub use node::{Node, NodeId, NodeKind};

use std::ops::{Index, IndexMut};

use crate::label::{key_from_string, label_from_string, trim_trailing_whitespace};

/// A parsed document in arena form.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    /// All nodes in the tree (index 0 is always the root).
    nodes: Vec<Node>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<NodeId> for Tree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }
}

impl IndexMut<NodeId> for Tree {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }
}

impl Tree {
    /// Create a new empty tree with a root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Root)],
        }
    }

    /// Get the root node ID.
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by ID.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    /// Get a mutable node by ID.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    /// Get the number of nodes, detached ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Allocate a new detached node and return its ID.
    pub fn alloc_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Allocate a node and append it to `parent`.
    pub fn add_child(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = self.alloc_node(node);
        self.append_child(parent, id);
        id
    }

    /// Append a child node to a parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(child_node) = self.nodes.get_mut(child.0 as usize) {
            child_node.parent = Some(parent);
            child_node.next_sibling = None;
        }

        match self.last_child(parent) {
            Some(last) => self[last].next_sibling = Some(child),
            None => {
                if let Some(parent_node) = self.nodes.get_mut(parent.0 as usize) {
                    parent_node.first_child = Some(child);
                }
            }
        }
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self[id].kind
    }

    /// Retag a node in place.
    pub fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self[id].kind = kind;
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self[id].text.as_deref()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.first_child)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.next_sibling)
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last()
    }

    /// Kind of the first child, if any.
    pub fn first_child_kind(&self, id: NodeId) -> Option<NodeKind> {
        self.first_child(id).map(|c| self.kind(c))
    }

    /// Iterate over children of a node.
    pub fn children(&self, parent: NodeId) -> ChildIter<'_> {
        ChildIter {
            tree: self,
            current: self.first_child(parent),
        }
    }

    /// Iterate over siblings starting at `first` (inclusive).
    pub fn siblings_from(&self, first: Option<NodeId>) -> ChildIter<'_> {
        ChildIter {
            tree: self,
            current: first,
        }
    }

    /// Iterate over all attached nodes in depth-first order.
    pub fn iter_dfs(&self) -> DfsIter<'_> {
        DfsIter {
            tree: self,
            stack: vec![NodeId::ROOT],
        }
    }

    /// Move all children of `from` to the end of `to`'s children.
    pub fn move_children(&mut self, from: NodeId, to: NodeId) {
        let Some(first) = self[from].first_child.take() else {
            return;
        };
        let mut cur = Some(first);
        while let Some(id) = cur {
            self[id].parent = Some(to);
            cur = self[id].next_sibling;
        }
        match self.last_child(to) {
            Some(last) => self[last].next_sibling = Some(first),
            None => self[to].first_child = Some(first),
        }
    }

    /// Deep copy of a subtree. The copy is detached and gets fresh ids.
    pub fn copy_subtree(&mut self, id: NodeId) -> NodeId {
        let mut node = self[id].clone();
        node.parent = None;
        node.first_child = None;
        node.next_sibling = None;
        let copy = self.alloc_node(node);

        let children: Vec<NodeId> = self.children(id).collect();
        for child in children {
            let child_copy = self.copy_subtree(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Original text of a node: its own text if present, otherwise the text
    /// of its descendants. Links without text append their label.
    pub fn raw_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.push_raw_text(id, &mut out);
        out
    }

    /// Original text of all children of `id`.
    pub fn raw_text_of_children(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.push_raw_text(child, &mut out);
        }
        out
    }

    /// Original text of the siblings starting at `first`.
    pub fn raw_text_from(&self, first: Option<NodeId>) -> String {
        let mut out = String::new();
        for id in self.siblings_from(first) {
            self.push_raw_text(id, &mut out);
        }
        out
    }

    fn push_raw_text(&self, id: NodeId, out: &mut String) {
        let node = &self[id];
        if let Some(text) = &node.text {
            out.push_str(text);
            return;
        }
        for child in self.children(id) {
            self.push_raw_text(child, out);
        }
        if node.kind == NodeKind::Link
            && let Some(label) = node.link.as_ref().and_then(|l| l.label.as_deref())
        {
            out.push_str(label);
        }
    }

    /// Label form of the children's original text.
    pub fn label_of_children(&self, id: NodeId) -> String {
        label_from_string(&self.raw_text_of_children(id))
    }

    /// Does any descendant of `id` have this kind?
    pub fn contains_kind(&self, id: NodeId, kind: NodeKind) -> bool {
        self.children(id)
            .any(|child| self.kind(child) == kind || self.contains_kind(child, kind))
    }

    /// Number of descendants of `id` with this kind.
    pub fn count_kind(&self, id: NodeId, kind: NodeKind) -> usize {
        self.children(id)
            .map(|child| usize::from(self.kind(child) == kind) + self.count_kind(child, kind))
            .sum()
    }

    /// Does the document contain a node of this kind anywhere?
    pub fn tree_contains_key(&self, kind: NodeKind) -> bool {
        self.contains_kind(NodeId::ROOT, kind)
    }

    // ------------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------------

    /// The first top-level metadata block.
    pub fn metadata(&self) -> Option<NodeId> {
        self.children(NodeId::ROOT)
            .find(|&id| self.kind(id) == NodeKind::Metadata)
    }

    /// The `MetaKey` node whose key form equals that of `key`.
    pub fn metadata_for_key(&self, key: &str) -> Option<NodeId> {
        let wanted = key_from_string(key);
        let metadata = self.metadata()?;
        self.children(metadata)
            .find(|&id| key_from_string(self[id].text()) == wanted)
    }

    /// Value of a metadata key with trailing whitespace trimmed.
    ///
    /// ```
    /// use mmd_export::tree::{Node, NodeId, NodeKind, Tree};
    ///
    /// let mut tree = Tree::new();
    /// let meta = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Metadata));
    /// let key = tree.add_child(meta, Node::with_text(NodeKind::MetaKey, "Base Header Level"));
    /// tree.add_child(key, Node::with_text(NodeKind::MetaValue, "2 \n"));
    ///
    /// assert_eq!(tree.metavalue_for_key("baseheaderlevel").as_deref(), Some("2"));
    /// ```
    pub fn metavalue_for_key(&self, key: &str) -> Option<String> {
        let meta_key = self.metadata_for_key(key)?;
        let value = self.first_child(meta_key)?;
        let mut text = self.raw_text(value);
        trim_trailing_whitespace(&mut text);
        Some(text)
    }

    /// Key forms of all metadata keys, in document order.
    pub fn metadata_keys(&self) -> Vec<String> {
        let Some(metadata) = self.metadata() else {
            return Vec::new();
        };
        self.children(metadata)
            .filter(|&id| self.kind(id) == NodeKind::MetaKey)
            .map(|id| key_from_string(self[id].text()))
            .collect()
    }
}

/// Iterator over sibling nodes.
pub struct ChildIter<'a> {
    tree: &'a Tree,
    current: Option<NodeId>,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = self.tree.next_sibling(current);
        Some(current)
    }
}

/// Depth-first iterator over all attached nodes.
pub struct DfsIter<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for DfsIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;

        // Push children in reverse order so they're visited left-to-right
        let mut children: Vec<NodeId> = self.tree.children(current).collect();
        children.reverse();
        self.stack.extend(children);

        Some(current)
    }
}
