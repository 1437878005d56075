//! JSON boundary for trees handed over by an external parser.
//!
//! Each node is `{"kind": "...", "text": "...", "children": [...], "link": {...}}`
//! with `kind` in snake_case. The document is either a single node or an
//! array of top-level nodes. A top-level `root` node contributes its
//! children directly.

use serde::Deserialize;

use super::{LinkData, Node, NodeId, NodeKind, Tree};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonNode {
    kind: NodeKind,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    children: Vec<JsonNode>,
    #[serde(default)]
    link: Option<LinkData>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonDocument {
    Nodes(Vec<JsonNode>),
    Node(JsonNode),
}

impl Tree {
    /// Build a tree from its JSON form.
    ///
    /// ```
    /// use mmd_export::tree::{NodeKind, Tree};
    ///
    /// let tree = Tree::from_json(r#"[
    ///     {"kind": "para", "children": [{"kind": "str", "text": "Hi"}]}
    /// ]"#).unwrap();
    /// let para = tree.first_child(tree.root()).unwrap();
    /// assert_eq!(tree.kind(para), NodeKind::Para);
    /// ```
    pub fn from_json(json: &str) -> Result<Tree> {
        let document: JsonDocument = serde_json::from_str(json)?;
        let mut tree = Tree::new();

        let top = match document {
            JsonDocument::Nodes(nodes) => nodes,
            JsonDocument::Node(node) if node.kind == NodeKind::Root => {
                if node.text.is_some() || node.link.is_some() {
                    return Err(Error::InvalidTree(
                        "root node cannot carry text or link data".into(),
                    ));
                }
                node.children
            }
            JsonDocument::Node(node) => vec![node],
        };

        for node in top {
            tree.insert_json(NodeId::ROOT, node)?;
        }
        Ok(tree)
    }

    fn insert_json(&mut self, parent: NodeId, json: JsonNode) -> Result<()> {
        if json.kind == NodeKind::Root {
            return Err(Error::InvalidTree("root node below the top level".into()));
        }
        if json.link.is_some() && !json.kind.carries_link() {
            return Err(Error::InvalidTree(format!(
                "{:?} node cannot carry link data",
                json.kind
            )));
        }

        let id = self.add_child(
            parent,
            Node {
                text: json.text,
                link: json.link,
                ..Node::new(json.kind)
            },
        );
        for child in json.children {
            self.insert_json(id, child)?;
        }
        Ok(())
    }
}
