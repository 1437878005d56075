//! Reference definitions and link resolution.
//!
//! A single pass over the tree collects everything a later reference can
//! point at: link reference definitions, footnote and glossary sources, and
//! automatic labels for headings and table captions. Renderers then resolve
//! `[text][label]` style references against these pools.
//!
//! Pools keep definitions in document order. Lookups scan from the end so
//! that the last definition of a label wins.

use tracing::debug;

use crate::abbr::AbbreviationDef;
use crate::label::{clean_string, label_from_string};
use crate::notes::{Note, NoteKind};
use crate::options::Extensions;
use crate::tree::{LinkData, NodeId, NodeKind, Tree};

/// Definitions collected from one document.
#[derive(Debug, Clone, Default)]
pub struct ReferencePools {
    /// Link reference definitions and automatic labels.
    pub links: Vec<LinkData>,
    /// Footnote and glossary definitions not yet referenced.
    pub notes: Vec<Note>,
    /// Abbreviation definitions, in definition order.
    pub abbreviations: Vec<AbbreviationDef>,
}

impl ReferencePools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the link data registered for `label`.
    ///
    /// The label is first compared in its whitespace-collapsed form; unless
    /// `COMPATIBILITY` is set, the label form is tried next. Returns an
    /// independent copy of the pooled definition.
    ///
    /// ```
    /// use mmd_export::refs::ReferencePools;
    /// use mmd_export::tree::LinkData;
    /// use mmd_export::Extensions;
    ///
    /// let mut pools = ReferencePools::new();
    /// pools.links.push(LinkData::new(Some("my-label".into()), Some("/x".into()), None, vec![]));
    ///
    /// let found = pools.extract_link_data("My Label", Extensions::DEFAULT).unwrap();
    /// assert_eq!(found.source.as_deref(), Some("/x"));
    /// assert!(pools.extract_link_data("My Label", Extensions::COMPATIBILITY).is_none());
    /// ```
    pub fn extract_link_data(&self, label: &str, extensions: Extensions) -> Option<LinkData> {
        if label.is_empty() {
            return None;
        }

        let clean = clean_string(label);
        if let Some(found) = self.find_link(&clean) {
            return Some(found.clone());
        }

        if extensions.contains(Extensions::COMPATIBILITY) {
            return None;
        }

        let labelized = label_from_string(label);
        self.find_link(&labelized).cloned()
    }

    fn find_link(&self, label: &str) -> Option<&LinkData> {
        self.links
            .iter()
            .rev()
            .find(|link| link.label.as_deref() == Some(label))
    }

    /// Resolve the link data of a link or image node.
    ///
    /// Nodes with neither label nor source are `[foo][]` style references and
    /// use their own text as the label. A node with a label is looked up in
    /// the pools; a node with only a source is used as is. The tree is left
    /// untouched.
    pub fn resolve_link(&self, tree: &Tree, id: NodeId, extensions: Extensions) -> Resolution {
        let mut data = tree[id].link.clone().unwrap_or_default();

        if data.label.is_none() && data.source.is_none() {
            data.label = Some(tree.raw_text_of_children(id));
        }

        match data.label {
            Some(label) => match self.extract_link_data(&label, extensions) {
                Some(found) => Resolution::Found(found),
                None => Resolution::Missing(label),
            },
            None => Resolution::Found(data),
        }
    }
}

/// Outcome of resolving a link or image node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Link data ready to render.
    Found(LinkData),
    /// No definition matches this label; render the source text literally.
    Missing(String),
}

/// Collect link, note and automatic label definitions from the tree.
///
/// Only the top level and container nodes (heading sections, raw blocks and
/// lists) are searched. The tree is not modified.
pub fn extract_references(tree: &Tree, extensions: Extensions) -> ReferencePools {
    let mut pools = ReferencePools::new();
    collect_references(tree, tree.first_child(NodeId::ROOT), extensions, &mut pools);
    debug!(
        links = pools.links.len(),
        notes = pools.notes.len(),
        "extracted references"
    );
    pools
}

fn collect_references(
    tree: &Tree,
    first: Option<NodeId>,
    extensions: Extensions,
    pools: &mut ReferencePools,
) {
    for id in tree.siblings_from(first) {
        let node = &tree[id];
        match node.kind {
            NodeKind::LinkReference => {
                if let Some(link) = &node.link {
                    pools.links.push(link.clone());
                }
            }
            NodeKind::NoteSource | NodeKind::GlossarySource => {
                let kind = if node.kind == NodeKind::GlossarySource {
                    NoteKind::Glossary
                } else {
                    NoteKind::Footnote
                };
                pools.notes.push(Note::new(node.text.clone(), kind, id));
            }
            kind if kind.is_heading() => {
                if tree.first_child_kind(id) != Some(NodeKind::AutoLabel)
                    && !extensions.contains(Extensions::NO_LABELS)
                    && !extensions.contains(Extensions::COMPATIBILITY)
                {
                    push_autolink(pools, tree.label_of_children(id));
                }
            }
            NodeKind::Table => {
                if let Some(caption) = tree.first_child(id)
                    && tree.kind(caption) == NodeKind::TableCaption
                    && tree.first_child_kind(caption) != Some(NodeKind::TableLabel)
                {
                    push_autolink(pools, tree.label_of_children(caption));
                }
            }
            NodeKind::HeadingSection | NodeKind::Raw | NodeKind::List => {
                collect_references(tree, node.first_child, extensions, pools);
            }
            _ => {}
        }
    }
}

/// Register a label that points at `#label`.
fn push_autolink(pools: &mut ReferencePools, label: String) {
    if label.is_empty() {
        return;
    }
    let source = format!("#{label}");
    pools
        .links
        .push(LinkData::new(Some(label), Some(source), None, Vec::new()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Attribute, Node};

    fn heading(tree: &mut Tree, parent: NodeId, kind: NodeKind, text: &str) -> NodeId {
        let h = tree.add_child(parent, Node::new(kind));
        tree.add_child(h, Node::with_text(NodeKind::Str, text));
        h
    }

    fn reference(tree: &mut Tree, label: &str, source: &str) -> NodeId {
        tree.add_child(
            NodeId::ROOT,
            Node::with_link(
                NodeKind::LinkReference,
                LinkData::new(
                    Some(label.into()),
                    Some(source.into()),
                    Some("Title".into()),
                    vec![Attribute::new("width", "20px")],
                ),
            ),
        )
    }

    #[test]
    fn test_extract_link_references() {
        let mut tree = Tree::new();
        reference(&mut tree, "home", "/index.html");
        let pools = extract_references(&tree, Extensions::DEFAULT);
        assert_eq!(pools.links.len(), 1);
        assert_eq!(pools.links[0].source.as_deref(), Some("/index.html"));
        assert_eq!(pools.links[0].attribute("width"), Some("20px"));
    }

    #[test]
    fn test_heading_autolink() {
        let mut tree = Tree::new();
        heading(&mut tree, NodeId::ROOT, NodeKind::H2, "Getting Started");
        let pools = extract_references(&tree, Extensions::DEFAULT);
        assert_eq!(pools.links.len(), 1);
        assert_eq!(pools.links[0].label.as_deref(), Some("getting-started"));
        assert_eq!(pools.links[0].source.as_deref(), Some("#getting-started"));
    }

    #[test]
    fn test_heading_autolink_disabled() {
        let mut tree = Tree::new();
        heading(&mut tree, NodeId::ROOT, NodeKind::H1, "Intro");
        assert!(extract_references(&tree, Extensions::NO_LABELS).links.is_empty());
        assert!(
            extract_references(&tree, Extensions::COMPATIBILITY)
                .links
                .is_empty()
        );
    }

    #[test]
    fn test_explicit_heading_label_skips_autolink() {
        let mut tree = Tree::new();
        let h = tree.add_child(NodeId::ROOT, Node::new(NodeKind::H1));
        tree.add_child(h, Node::with_text(NodeKind::AutoLabel, "intro"));
        tree.add_child(h, Node::with_text(NodeKind::Str, "Introduction"));
        assert!(extract_references(&tree, Extensions::DEFAULT).links.is_empty());
    }

    #[test]
    fn test_table_caption_autolink() {
        let mut tree = Tree::new();
        let table = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Table));
        let caption = tree.add_child(table, Node::new(NodeKind::TableCaption));
        tree.add_child(caption, Node::with_text(NodeKind::Str, "Prices"));

        let pools = extract_references(&tree, Extensions::DEFAULT);
        assert_eq!(pools.links[0].label.as_deref(), Some("prices"));
    }

    #[test]
    fn test_recurses_into_heading_sections_only() {
        let mut tree = Tree::new();
        let section = tree.add_child(NodeId::ROOT, Node::new(NodeKind::HeadingSection));
        heading(&mut tree, section, NodeKind::H1, "Nested");
        let quote = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Blockquote));
        heading(&mut tree, quote, NodeKind::H1, "Quoted");

        let pools = extract_references(&tree, Extensions::DEFAULT);
        let labels: Vec<_> = pools.links.iter().filter_map(|l| l.label.clone()).collect();
        assert_eq!(labels, vec!["nested"]);
    }

    #[test]
    fn test_note_sources() {
        let mut tree = Tree::new();
        let note = tree.add_child(NodeId::ROOT, Node::with_text(NodeKind::NoteSource, "fn1"));
        let gloss = tree.add_child(
            NodeId::ROOT,
            Node::with_text(NodeKind::GlossarySource, "term"),
        );
        let pools = extract_references(&tree, Extensions::DEFAULT);
        assert_eq!(pools.notes.len(), 2);
        assert_eq!(pools.notes[0].source, note);
        assert_eq!(pools.notes[1].kind, NoteKind::Glossary);
        assert_eq!(pools.notes[1].source, gloss);
    }

    #[test]
    fn test_resolver_clean_then_slug() {
        let mut pools = ReferencePools::new();
        pools.links.push(LinkData::new(
            Some("my-label".into()),
            Some("/m".into()),
            None,
            vec![],
        ));
        pools.links.push(LinkData::new(
            Some("Two  Words".into()),
            Some("/w".into()),
            None,
            vec![],
        ));

        assert_eq!(
            pools
                .extract_link_data("My Label", Extensions::DEFAULT)
                .and_then(|l| l.source),
            Some("/m".into())
        );
        assert!(
            pools
                .extract_link_data("My Label", Extensions::COMPATIBILITY)
                .is_none()
        );
        assert!(pools.extract_link_data("", Extensions::DEFAULT).is_none());
        assert!(pools.extract_link_data("missing", Extensions::DEFAULT).is_none());
    }

    #[test]
    fn test_resolver_returns_independent_copies() {
        let mut tree = Tree::new();
        reference(&mut tree, "home", "/");
        let pools = extract_references(&tree, Extensions::DEFAULT);

        let mut first = pools.extract_link_data("home", Extensions::DEFAULT).unwrap();
        let second = pools.extract_link_data("home", Extensions::DEFAULT).unwrap();
        assert_eq!(first, second);

        first.attr.clear();
        first.source = Some("/changed".into());
        assert_eq!(pools.links[0].source.as_deref(), Some("/"));
        assert_eq!(pools.links[0].attr.len(), 1);
    }

    #[test]
    fn test_last_definition_wins() {
        let mut tree = Tree::new();
        reference(&mut tree, "dup", "/first");
        reference(&mut tree, "dup", "/second");
        let pools = extract_references(&tree, Extensions::DEFAULT);
        let found = pools.extract_link_data("dup", Extensions::DEFAULT).unwrap();
        assert_eq!(found.source.as_deref(), Some("/second"));
    }

    #[test]
    fn test_resolve_link_node() {
        let mut tree = Tree::new();
        reference(&mut tree, "home", "/");
        let pools = extract_references(&tree, Extensions::DEFAULT);

        // [home][]
        let implicit = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Link));
        tree.add_child(implicit, Node::with_text(NodeKind::Str, "home"));
        assert!(matches!(
            pools.resolve_link(&tree, implicit, Extensions::DEFAULT),
            Resolution::Found(link) if link.source.as_deref() == Some("/")
        ));

        // [See][#undefined-label]
        let missing = tree.add_child(
            NodeId::ROOT,
            Node::with_link(NodeKind::Link, LinkData::labeled("#undefined-label")),
        );
        assert_eq!(
            pools.resolve_link(&tree, missing, Extensions::DEFAULT),
            Resolution::Missing("#undefined-label".into())
        );

        // [inline](http://example.com)
        let inline = tree.add_child(
            NodeId::ROOT,
            Node::with_link(
                NodeKind::Link,
                LinkData::new(None, Some("http://example.com".into()), None, vec![]),
            ),
        );
        assert!(matches!(
            pools.resolve_link(&tree, inline, Extensions::DEFAULT),
            Resolution::Found(link) if link.label.is_none()
        ));
    }
}
