//! Footnote, glossary and citation numbering.
//!
//! Note definitions start in a reserve pool. The first reference to a
//! definition moves it into the used pool, and its position there (1-based)
//! is its number. Later references to the same label find it in the used
//! pool and get the same number back, so notes are numbered by first use.
//!
//! ```
//! use mmd_export::notes::{Note, NoteEngine, NoteKind};
//! use mmd_export::tree::NodeId;
//!
//! let mut engine = NoteEngine::new(vec![
//!     Note::new(Some("a".into()), NoteKind::Footnote, NodeId(1)),
//!     Note::new(Some("b".into()), NoteKind::Footnote, NodeId(2)),
//! ]);
//! assert_eq!(engine.note_number_for_label("b"), 1);
//! assert_eq!(engine.note_number_for_label("a"), 2);
//! assert_eq!(engine.note_number_for_label("b"), 1);
//! assert_eq!(engine.note_number_for_label("c"), 0);
//! ```

use indexmap::IndexMap;
use tracing::trace;

use crate::label::{clean_string, label_from_string};
use crate::tree::{Node, NodeId, NodeKind, Tree};

/// How a note is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteKind {
    Footnote,
    Glossary,
    /// A footnote definition that has been cited.
    Citation,
}

/// A note definition and where its body lives in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub label: Option<String>,
    pub kind: NoteKind,
    /// `NoteSource`, `GlossarySource` or `CitationSource` node holding the body.
    pub source: NodeId,
}

impl Note {
    pub fn new(label: Option<String>, kind: NoteKind, source: NodeId) -> Self {
        Self {
            label,
            kind,
            source,
        }
    }
}

/// Identity of a used note: its label, or the reference that carried an
/// inline body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NoteKey {
    Label(String),
    Inline(NodeId),
}

/// Per-export numbering state.
#[derive(Debug, Clone, Default)]
pub struct NoteEngine {
    /// Defined but not yet referenced, in document order.
    reserve: Vec<Note>,
    /// Referenced notes in order of first use.
    used: IndexMap<NoteKey, Note>,
    max_footnote_num: usize,
    random_seed: Option<u64>,
}

impl NoteEngine {
    pub fn new(reserve: Vec<Note>) -> Self {
        Self {
            reserve,
            ..Default::default()
        }
    }

    /// Use pseudo-random public numbers derived from `seed`.
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Number for a labeled reference, or 0 when no definition exists.
    ///
    /// The label is matched in whitespace-collapsed form first, then in
    /// label form. A match still in the reserve pool is moved to the used
    /// pool and gets the next number.
    pub fn note_number_for_label(&mut self, label: &str) -> usize {
        if label.is_empty() {
            return 0;
        }

        let clean = clean_string(label);
        if let Some(number) = self.lookup(&clean) {
            return number;
        }

        let labelized = label_from_string(label);
        self.lookup(&labelized).unwrap_or(0)
    }

    fn lookup(&mut self, label: &str) -> Option<usize> {
        let key = NoteKey::Label(label.to_string());
        if let Some(index) = self.used.get_index_of(&key) {
            return Some(index + 1);
        }

        let position = self
            .reserve
            .iter()
            .rposition(|note| note.label.as_deref() == Some(label))?;
        let note = self.reserve.remove(position);
        self.used.insert(key, note);
        trace!(label, number = self.used.len(), "note moved to used pool");
        Some(self.used.len())
    }

    /// Number for a `NoteReference` node.
    ///
    /// A reference whose label has no definition carries its body inline:
    /// the body is moved under a new `NoteSource` node that becomes a used
    /// note. Asking again for the same reference returns the same number.
    pub fn note_number_for_node(&mut self, tree: &mut Tree, reference: NodeId) -> usize {
        if let Some(label) = tree[reference].text.clone() {
            let number = self.note_number_for_label(&label);
            if number != 0 {
                return number;
            }
        }

        let key = NoteKey::Inline(reference);
        if let Some(index) = self.used.get_index_of(&key) {
            return index + 1;
        }

        let source = tree.alloc_node(Node::new(NodeKind::NoteSource));
        tree.move_children(reference, source);
        self.used
            .insert(key, Note::new(None, NoteKind::Footnote, source));
        trace!(number = self.used.len(), "inline note");
        self.used.len()
    }

    /// The used note with this number.
    pub fn note(&self, number: usize) -> Option<&Note> {
        let index = number.checked_sub(1)?;
        self.used.get_index(index).map(|(_, note)| note)
    }

    /// Flag a used note as cited; its source node becomes a `CitationSource`.
    pub fn mark_citation(&mut self, tree: &mut Tree, number: usize) {
        let Some(index) = number.checked_sub(1) else {
            return;
        };
        if let Some((_, note)) = self.used.get_index_mut(index) {
            note.kind = NoteKind::Citation;
            tree.set_kind(note.source, NodeKind::CitationSource);
        }
    }

    /// Position of note `number` among cited notes only.
    pub fn cite_count(&self, number: usize) -> usize {
        self.used
            .values()
            .take(number)
            .filter(|note| note.kind == NoteKind::Citation)
            .count()
    }

    /// Record a rendered reference; true on the first appearance of `number`.
    pub fn register_reference(&mut self, number: usize) -> bool {
        if number > self.max_footnote_num {
            self.max_footnote_num = number;
            true
        } else {
            false
        }
    }

    pub fn max_footnote_num(&self) -> usize {
        self.max_footnote_num
    }

    /// Number shown in anchors and targets for note `number`.
    ///
    /// Sequential unless a random seed is set, in which case the result is
    /// a stable pseudo-random value in `1..=99999`.
    pub fn display_number(&self, number: usize) -> usize {
        match self.random_seed {
            Some(seed) => (splitmix64(seed.wrapping_add(number as u64)) % 99_999) as usize + 1,
            None => number,
        }
    }

    /// Used notes with their numbers, in numbering order.
    pub fn used_notes(&self) -> impl Iterator<Item = (usize, &Note)> {
        self.used.values().enumerate().map(|(i, note)| (i + 1, note))
    }

    pub fn used_len(&self) -> usize {
        self.used.len()
    }

    pub fn reserve_len(&self) -> usize {
        self.reserve.len()
    }

    pub fn has_citations(&self) -> bool {
        self.used.values().any(|note| note.kind == NoteKind::Citation)
    }
}

/// SplitMix64 finalizer; a small deterministic generator for stable output.
pub(crate) fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Sequence generator built on [`splitmix64`].
#[derive(Debug, Clone)]
pub(crate) struct Prng {
    state: u64,
}

impl Prng {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        splitmix64(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn engine(labels: &[&str]) -> NoteEngine {
        NoteEngine::new(
            labels
                .iter()
                .enumerate()
                .map(|(i, l)| Note::new(Some(l.to_string()), NoteKind::Footnote, NodeId(i as u32 + 1)))
                .collect(),
        )
    }

    #[test]
    fn test_first_use_numbering() {
        let mut notes = engine(&["a", "b"]);

        let b = notes.note_number_for_label("b");
        assert_eq!(b, 1);
        assert!(notes.register_reference(b));

        let a = notes.note_number_for_label("a");
        assert_eq!(a, 2);
        assert!(notes.register_reference(a));

        let again = notes.note_number_for_label("b");
        assert_eq!(again, 1);
        assert!(!notes.register_reference(again));
        assert_eq!(notes.max_footnote_num(), 2);
    }

    #[test]
    fn test_unknown_label() {
        let mut notes = engine(&["a"]);
        assert_eq!(notes.note_number_for_label("zzz"), 0);
        assert_eq!(notes.note_number_for_label(""), 0);
        assert_eq!(notes.reserve_len(), 1);
    }

    #[test]
    fn test_label_form_fallback() {
        let mut notes = engine(&["smith-2004"]);
        assert_eq!(notes.note_number_for_label("Smith 2004"), 1);
        assert_eq!(notes.note_number_for_label("smith-2004"), 1);
    }

    #[test]
    fn test_clean_form_match() {
        let mut notes = engine(&["two words"]);
        assert_eq!(notes.note_number_for_label("two\n  words"), 1);
    }

    #[test]
    fn test_duplicate_definition_latest_wins() {
        let mut notes = NoteEngine::new(vec![
            Note::new(Some("x".into()), NoteKind::Footnote, NodeId(1)),
            Note::new(Some("x".into()), NoteKind::Footnote, NodeId(2)),
        ]);
        assert_eq!(notes.note_number_for_label("x"), 1);
        assert_eq!(notes.note(1).unwrap().source, NodeId(2));
    }

    #[test]
    fn test_inline_note_detaches_body() {
        let mut tree = Tree::new();
        let para = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
        let reference = tree.add_child(para, Node::new(NodeKind::NoteReference));
        tree.add_child(reference, Node::with_text(NodeKind::Str, "Inline body"));

        let mut notes = NoteEngine::default();
        let number = notes.note_number_for_node(&mut tree, reference);
        assert_eq!(number, 1);
        assert!(tree.first_child(reference).is_none());

        let source = notes.note(1).unwrap().source;
        assert_eq!(tree.kind(source), NodeKind::NoteSource);
        assert_eq!(tree.raw_text(source), "Inline body");

        assert_eq!(notes.note_number_for_node(&mut tree, reference), 1);
        assert_eq!(notes.used_len(), 1);
    }

    #[test]
    fn test_labeled_reference_node() {
        let mut tree = Tree::new();
        let source = tree.add_child(NodeId::ROOT, Node::with_text(NodeKind::NoteSource, "fn"));
        let reference = tree.add_child(NodeId::ROOT, Node::with_text(NodeKind::NoteReference, "fn"));

        let mut notes = NoteEngine::new(vec![Note::new(Some("fn".into()), NoteKind::Footnote, source)]);
        assert_eq!(notes.note_number_for_node(&mut tree, reference), 1);
        assert_eq!(notes.note(1).unwrap().source, source);
    }

    #[test]
    fn test_citation_counting() {
        let mut tree = Tree::new();
        let ids: Vec<_> = (0..3)
            .map(|_| tree.add_child(NodeId::ROOT, Node::new(NodeKind::NoteSource)))
            .collect();
        let mut notes = NoteEngine::new(vec![
            Note::new(Some("f".into()), NoteKind::Footnote, ids[0]),
            Note::new(Some("c1".into()), NoteKind::Footnote, ids[1]),
            Note::new(Some("c2".into()), NoteKind::Footnote, ids[2]),
        ]);

        assert_eq!(notes.note_number_for_label("f"), 1);
        let c1 = notes.note_number_for_label("c1");
        notes.mark_citation(&mut tree, c1);
        let c2 = notes.note_number_for_label("c2");
        notes.mark_citation(&mut tree, c2);

        assert_eq!(notes.cite_count(c1), 1);
        assert_eq!(notes.cite_count(c2), 2);
        assert_eq!(tree.kind(ids[1]), NodeKind::CitationSource);
        assert_eq!(notes.note(c2).unwrap().kind, NoteKind::Citation);
        assert!(notes.has_citations());
    }

    #[test]
    fn test_display_number() {
        let plain = engine(&[]);
        assert_eq!(plain.display_number(3), 3);

        let random = engine(&[]).with_random_seed(42);
        let first = random.display_number(1);
        assert_eq!(first, random.display_number(1));
        assert!((1..=99_999).contains(&first));
        assert_eq!(
            first,
            engine(&[]).with_random_seed(42).display_number(1)
        );
    }

    proptest! {
        #[test]
        fn prop_numbers_increase_by_first_use(count in 1usize..20) {
            let labels: Vec<String> = (0..count).map(|i| format!("n{i}")).collect();
            let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
            let mut notes = engine(&refs);
            for (i, label) in labels.iter().rev().enumerate() {
                prop_assert_eq!(notes.note_number_for_label(label), i + 1);
            }
        }

        #[test]
        fn prop_reuse_is_stable(order in proptest::collection::vec(0usize..5, 1..40)) {
            let labels = ["a", "b", "c", "d", "e"];
            let mut notes = engine(&labels);
            let mut seen = std::collections::HashMap::new();
            for i in order {
                let number = notes.note_number_for_label(labels[i]);
                let first = *seen.entry(i).or_insert(number);
                prop_assert_eq!(first, number);
            }
        }

        #[test]
        fn prop_pool_conservation(order in proptest::collection::vec(0usize..6, 0..30)) {
            let labels = ["a", "b", "c", "d", "e", "f"];
            let mut notes = engine(&labels);
            for i in order {
                notes.note_number_for_label(labels[i]);
            }
            prop_assert_eq!(notes.reserve_len() + notes.used_len(), labels.len());
        }

        #[test]
        fn prop_display_number_in_range(seed in any::<u64>(), number in 1usize..1000) {
            let notes = NoteEngine::default().with_random_seed(seed);
            let shown = notes.display_number(number);
            prop_assert!((1..=99_999).contains(&shown));
            prop_assert_eq!(shown, notes.display_number(number));
        }
    }
}
