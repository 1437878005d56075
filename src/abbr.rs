//! Abbreviation definitions and matching.
//!
//! `*[HTML]: HyperText Markup Language` arrives as an `Abbreviation` node
//! whose text is the short form and whose children are the expansion
//! tokens. Extraction copies each definition out of the tree and retires
//! the original node. Matching then looks for the expansion token sequence
//! in running text and marks the matched siblings so renderers emit the
//! abbreviation once for the whole span.
//!
//! Definitions are tried in definition order; the first one that matches at
//! a given position wins and consumes its nodes. Overlapping expansions are
//! therefore resolved in favour of the earlier definition.

use tracing::debug;

use crate::label::trim_trailing_whitespace;
use crate::tree::{Node, NodeId, NodeKind, Tree};

/// One expansion token: its kind and, for text runs, the literal text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    kind: NodeKind,
    text: Option<String>,
}

impl Token {
    fn matches(&self, node: &Node) -> bool {
        match self.kind {
            NodeKind::Str => node.kind == NodeKind::Str && node.text == self.text,
            kind => node.kind == kind,
        }
    }
}

/// A pooled abbreviation definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbbreviationDef {
    /// Short form, e.g. `HTML`.
    pub name: String,
    /// Expansion text, e.g. `HyperText Markup Language`.
    pub expansion: String,
    tokens: Vec<Token>,
}

impl AbbreviationDef {
    pub fn new(name: impl Into<String>, expansion: impl Into<String>) -> Self {
        let expansion: String = expansion.into();
        let mut tokens = Vec::new();
        for (i, word) in expansion.split(' ').enumerate() {
            if i > 0 {
                tokens.push(Token {
                    kind: NodeKind::Space,
                    text: Some(" ".into()),
                });
            }
            if !word.is_empty() {
                tokens.push(Token {
                    kind: NodeKind::Str,
                    text: Some(word.into()),
                });
            }
        }
        Self {
            name: name.into(),
            expansion,
            tokens,
        }
    }

    fn from_node(tree: &Tree, id: NodeId) -> Self {
        let mut name = tree[id].text().to_string();
        trim_trailing_whitespace(&mut name);

        let mut expansion = tree.raw_text_of_children(id);
        trim_trailing_whitespace(&mut expansion);

        let tokens = tree
            .children(id)
            .filter(|&c| tree.kind(c) != NodeKind::KeyCounter)
            .map(|c| Token {
                kind: tree.kind(c),
                text: tree[c].text.clone(),
            })
            .collect();

        Self {
            name,
            expansion,
            tokens,
        }
    }

    /// Try to match the expansion starting at `start`; returns the last
    /// matched sibling.
    fn match_at(&self, tree: &Tree, start: NodeId) -> Option<NodeId> {
        if self.tokens.is_empty() {
            return None;
        }
        let mut target = Some(start);
        let mut end = start;
        for token in &self.tokens {
            let id = target?;
            if !token.matches(&tree[id]) {
                return None;
            }
            end = id;
            target = tree.next_sibling(id);
        }
        Some(end)
    }

    /// Detached `Abbreviation` node describing this definition.
    fn to_node(&self, tree: &mut Tree) -> NodeId {
        let abbr = tree.alloc_node(Node::with_text(NodeKind::Abbreviation, self.name.clone()));
        for token in &self.tokens {
            let node = Node {
                text: token.text.clone(),
                ..Node::new(token.kind)
            };
            tree.add_child(abbr, node);
        }
        abbr
    }
}

/// Copy abbreviation definitions out of the tree and retire the originals.
///
/// Searches the top level and block containers (heading sections, raw
/// blocks, lists, block quotes). Retired definitions become `KeyCounter`
/// nodes and render as nothing.
pub fn extract_abbreviations(tree: &mut Tree) -> Vec<AbbreviationDef> {
    let mut defs = Vec::new();
    collect_definitions(tree, tree.first_child(NodeId::ROOT), &mut defs);
    debug!(count = defs.len(), "extracted abbreviations");
    defs
}

fn collect_definitions(tree: &mut Tree, first: Option<NodeId>, defs: &mut Vec<AbbreviationDef>) {
    let mut cur = first;
    while let Some(id) = cur {
        match tree.kind(id) {
            NodeKind::Abbreviation => {
                defs.push(AbbreviationDef::from_node(tree, id));
                tree.set_kind(id, NodeKind::KeyCounter);
            }
            NodeKind::HeadingSection
            | NodeKind::Raw
            | NodeKind::List
            | NodeKind::BlockquoteMarker
            | NodeKind::Blockquote => {
                collect_definitions(tree, tree.first_child(id), defs);
            }
            _ => {}
        }
        cur = tree.next_sibling(id);
    }
}

/// Mark every occurrence of a defined expansion in running text.
///
/// A match on a single node retags it `Abbr`; a match over several siblings
/// retags the first `AbbrStart` and the last `AbbrStop`. The first matched
/// node receives an `Abbreviation` child describing the definition. Returns
/// the number of matches.
pub fn find_abbreviations(tree: &mut Tree, defs: &[AbbreviationDef]) -> usize {
    if defs.is_empty() {
        return 0;
    }
    let count = mark_matches(tree, tree.first_child(NodeId::ROOT), defs);
    debug!(count, "matched abbreviations");
    count
}

fn mark_matches(tree: &mut Tree, first: Option<NodeId>, defs: &[AbbreviationDef]) -> usize {
    let mut count = 0;
    let mut cur = first;
    while let Some(id) = cur {
        cur = tree.next_sibling(id);
        match tree.kind(id) {
            NodeKind::Str => {
                let Some((def, end)) = defs
                    .iter()
                    .find_map(|def| def.match_at(tree, id).map(|end| (def, end)))
                else {
                    continue;
                };

                let abbr = def.to_node(tree);
                tree.append_child(id, abbr);
                if end == id {
                    tree.set_kind(id, NodeKind::Abbr);
                } else {
                    tree.set_kind(id, NodeKind::AbbrStart);
                    tree.set_kind(end, NodeKind::AbbrStop);
                }
                count += 1;
                cur = tree.next_sibling(end);
            }
            NodeKind::List
            | NodeKind::OrderedList
            | NodeKind::BulletList
            | NodeKind::ListItem
            | NodeKind::HeadingSection
            | NodeKind::Para
            | NodeKind::Plain
            | NodeKind::Link
            | NodeKind::LinkReference
            | NodeKind::NoteReference
            | NodeKind::NoteSource
            | NodeKind::GlossarySource
            | NodeKind::BlockquoteMarker
            | NodeKind::Blockquote => {
                count += mark_matches(tree, tree.first_child(id), defs);
            }
            _ => {}
        }
    }
    count
}

/// The `Abbreviation` node attached to a matched `Abbr`/`AbbrStart` node.
pub fn definition_of(tree: &Tree, id: NodeId) -> Option<NodeId> {
    tree.children(id)
        .find(|&c| tree.kind(c) == NodeKind::Abbreviation)
}

/// Short form and expansion for a matched node.
pub fn abbreviation_text(tree: &Tree, id: NodeId) -> Option<(String, String)> {
    let def = definition_of(tree, id)?;
    let mut expansion = tree.raw_text_of_children(def);
    trim_trailing_whitespace(&mut expansion);
    Some((tree[def].text().to_string(), expansion))
}

/// The sibling after a matched span, skipping everything through `AbbrStop`.
pub fn span_end(tree: &Tree, start: NodeId) -> NodeId {
    if tree.kind(start) != NodeKind::AbbrStart {
        return start;
    }
    let mut cur = tree.next_sibling(start);
    while let Some(id) = cur {
        if tree.kind(id) == NodeKind::AbbrStop {
            return id;
        }
        cur = tree.next_sibling(id);
    }
    start
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(tree: &mut Tree, parent: NodeId, text: &str) {
        for (i, word) in text.split(' ').enumerate() {
            if i > 0 {
                tree.add_child(parent, Node::with_text(NodeKind::Space, " "));
            }
            tree.add_child(parent, Node::with_text(NodeKind::Str, word));
        }
    }

    fn definition(tree: &mut Tree, name: &str, expansion: &str) -> NodeId {
        let def = tree.add_child(
            NodeId::ROOT,
            Node::with_text(NodeKind::Abbreviation, format!("{name} ")),
        );
        words(tree, def, expansion);
        def
    }

    #[test]
    fn test_extract_retires_definition() {
        let mut tree = Tree::new();
        let def = definition(&mut tree, "HTML", "HyperText Markup Language");
        let defs = extract_abbreviations(&mut tree);

        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "HTML");
        assert_eq!(defs[0].expansion, "HyperText Markup Language");
        assert_eq!(tree.kind(def), NodeKind::KeyCounter);
    }

    #[test]
    fn test_multi_node_match() {
        let mut tree = Tree::new();
        definition(&mut tree, "HTML", "HyperText Markup Language");
        let para = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
        words(&mut tree, para, "Learn HyperText Markup Language today");

        let defs = extract_abbreviations(&mut tree);
        assert_eq!(find_abbreviations(&mut tree, &defs), 1);

        let kinds: Vec<_> = tree.children(para).map(|id| tree.kind(id)).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Str,
                NodeKind::Space,
                NodeKind::AbbrStart,
                NodeKind::Space,
                NodeKind::Str,
                NodeKind::Space,
                NodeKind::AbbrStop,
                NodeKind::Space,
                NodeKind::Str,
            ]
        );

        let start = tree.children(para).nth(2).unwrap();
        let stop = tree.children(para).nth(6).unwrap();
        assert_eq!(span_end(&tree, start), stop);
        assert_eq!(
            abbreviation_text(&tree, start),
            Some(("HTML".into(), "HyperText Markup Language".into()))
        );
    }

    #[test]
    fn test_single_node_match() {
        let mut tree = Tree::new();
        definition(&mut tree, "W3C", "Consortium");
        let para = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
        words(&mut tree, para, "the Consortium");

        let defs = extract_abbreviations(&mut tree);
        find_abbreviations(&mut tree, &defs);
        let last = tree.last_child(para).unwrap();
        assert_eq!(tree.kind(last), NodeKind::Abbr);
        assert_eq!(span_end(&tree, last), last);
    }

    #[test]
    fn test_partial_match_is_ignored() {
        let mut tree = Tree::new();
        definition(&mut tree, "HTML", "HyperText Markup Language");
        let para = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
        words(&mut tree, para, "HyperText Markup");

        let defs = extract_abbreviations(&mut tree);
        assert_eq!(find_abbreviations(&mut tree, &defs), 0);
        assert!(
            tree.children(para)
                .all(|id| matches!(tree.kind(id), NodeKind::Str | NodeKind::Space))
        );
    }

    #[test]
    fn test_first_definition_wins() {
        let mut tree = Tree::new();
        definition(&mut tree, "ML", "Markup Language");
        definition(&mut tree, "M", "Markup");
        let para = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
        words(&mut tree, para, "Markup Language");

        let defs = extract_abbreviations(&mut tree);
        find_abbreviations(&mut tree, &defs);
        let first = tree.first_child(para).unwrap();
        assert_eq!(tree.kind(first), NodeKind::AbbrStart);
        assert_eq!(abbreviation_text(&tree, first).unwrap().0, "ML");
    }

    #[test]
    fn test_matches_inside_lists_and_quotes() {
        let mut tree = Tree::new();
        definition(&mut tree, "CSS", "Stylesheets");
        let quote = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Blockquote));
        let item_list = tree.add_child(quote, Node::new(NodeKind::BulletList));
        let item = tree.add_child(item_list, Node::new(NodeKind::ListItem));
        let plain = tree.add_child(item, Node::new(NodeKind::Plain));
        words(&mut tree, plain, "Stylesheets");

        let defs = extract_abbreviations(&mut tree);
        assert_eq!(find_abbreviations(&mut tree, &defs), 1);
    }

    #[test]
    fn test_constructed_definition() {
        let def = AbbreviationDef::new("NASA", "National Aeronautics");
        let mut tree = Tree::new();
        let para = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
        words(&mut tree, para, "National Aeronautics");
        assert_eq!(find_abbreviations(&mut tree, &[def]), 1);
    }
}
