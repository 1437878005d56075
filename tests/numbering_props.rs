//! Properties of note numbering observed through rendered HTML.

use mmd_export::{ExportOptions, Format, Node, NodeId, NodeKind, Tree, export_tree};
use proptest::prelude::*;

const LABELS: [&str; 5] = ["alpha", "beta", "gamma", "delta", "epsilon"];

/// A paragraph referencing `order`, then one definition per label.
fn document(order: &[usize]) -> Tree {
    let mut tree = Tree::new();
    let para = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
    for &i in order {
        tree.add_child(para, Node::with_text(NodeKind::NoteReference, LABELS[i]));
    }
    for label in LABELS {
        let source = tree.add_child(NodeId::ROOT, Node::with_text(NodeKind::NoteSource, label));
        let p = tree.add_child(source, Node::new(NodeKind::Para));
        tree.add_child(p, Node::with_text(NodeKind::Str, format!("body-{label}")));
    }
    tree
}

fn first_use(order: &[usize]) -> Vec<usize> {
    let mut seen = Vec::new();
    for &i in order {
        if !seen.contains(&i) {
            seen.push(i);
        }
    }
    seen
}

proptest! {
    #[test]
    fn prop_endnotes_follow_first_reference(order in prop::collection::vec(0usize..5, 1..20)) {
        let html = export_tree(document(&order), &ExportOptions::new(Format::Html)).unwrap();
        let expected = first_use(&order);

        for (n, &i) in expected.iter().enumerate() {
            let item = format!("<li id=\"fn:{}\">\n<p>body-{}", n + 1, LABELS[i]);
            prop_assert!(html.contains(&item), "missing {item}");
        }
        // Unreferenced definitions are never printed
        for (i, label) in LABELS.iter().enumerate() {
            if !expected.contains(&i) {
                let body = format!("body-{label}");
                prop_assert!(!html.contains(&body));
            }
        }
    }

    #[test]
    fn prop_each_note_anchored_once(order in prop::collection::vec(0usize..5, 1..20)) {
        let html = export_tree(document(&order), &ExportOptions::new(Format::Html)).unwrap();
        for n in 1..=first_use(&order).len() {
            let anchor = format!("id=\"fnref:{n}\"");
            prop_assert_eq!(html.matches(&anchor).count(), 1);
        }
        prop_assert_eq!(html.matches("class=\"footnote\">").count(), order.len());
    }
}
