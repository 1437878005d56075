//! Benchmarks for the export pipeline.
//!
//! Run with: cargo bench

use criterion::{Criterion, criterion_group, criterion_main};

use mmd_export::{ExportOptions, Format, Node, NodeId, NodeKind, Tree, export_tree};

const SECTIONS: usize = 200;

/// A document of headed sections, each citing a footnote and using an
/// abbreviation, with all definitions at the end.
fn sample_tree() -> Tree {
    let mut tree = Tree::new();
    let root = NodeId::ROOT;

    for i in 0..SECTIONS {
        let h = tree.add_child(root, Node::new(NodeKind::H2));
        tree.add_child(h, Node::with_text(NodeKind::Str, format!("Section {i}")));

        let p = tree.add_child(root, Node::new(NodeKind::Para));
        for word in ["The", "quick", "HTML", "fox"] {
            tree.add_child(p, Node::with_text(NodeKind::Str, word));
            tree.add_child(p, Node::with_text(NodeKind::Space, " "));
        }
        tree.add_child(p, Node::with_text(NodeKind::NoteReference, format!("n{i}")));
    }

    for i in 0..SECTIONS {
        let source = tree.add_child(root, Node::with_text(NodeKind::NoteSource, format!("n{i}")));
        let p = tree.add_child(source, Node::new(NodeKind::Para));
        tree.add_child(p, Node::with_text(NodeKind::Str, format!("Note {i}.")));
    }

    let abbr = tree.add_child(root, Node::with_text(NodeKind::Abbreviation, "HTML"));
    tree.add_child(abbr, Node::with_text(NodeKind::Str, "HTML"));
    tree
}

fn bench_export(c: &mut Criterion) {
    let tree = sample_tree();
    for format in [Format::Html, Format::Latex, Format::Odf] {
        let options = ExportOptions::new(format);
        c.bench_function(&format!("export_{format}"), |b| {
            b.iter(|| export_tree(tree.clone(), &options).unwrap());
        });
    }
}

fn bench_json_boundary(c: &mut Criterion) {
    let json = (0..SECTIONS)
        .map(|i| format!(r#"{{"kind": "para", "children": [{{"kind": "str", "text": "Para {i}"}}]}}"#))
        .collect::<Vec<_>>()
        .join(",");
    let json = format!("[{json}]");

    c.bench_function("from_json", |b| {
        b.iter(|| Tree::from_json(&json).unwrap());
    });
}

criterion_group!(benches, bench_export, bench_json_boundary);
criterion_main!(benches);
