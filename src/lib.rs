//! # mmd-export
//!
//! Export engine for MultiMarkdown document trees.
//!
//! A parser hands over a tree of typed nodes; this crate resolves what the
//! tree refers to and renders it:
//!
//! - Link and image references, footnotes, glossary entries and citations
//!   are pooled by label and resolved where they are used
//! - Notes are numbered in order of first reference and emitted once, in
//!   that order, at the end of the document
//! - Abbreviation definitions are matched against running text
//! - Output formats: HTML, LaTeX (article, memoir, beamer), OPML, flat ODF,
//!   RTF, plain text, a table of contents, and CriticMarkup resolution
//!
//! ## Quick Start
//!
//! ```
//! use mmd_export::{ExportOptions, Format, export_json};
//!
//! let json = r#"[
//!     {"kind": "para", "children": [
//!         {"kind": "str", "text": "See"},
//!         {"kind": "note_reference", "text": "a"}
//!     ]},
//!     {"kind": "note_source", "text": "a", "children": [
//!         {"kind": "para", "children": [{"kind": "str", "text": "Note."}]}
//!     ]}
//! ]"#;
//! let html = export_json(json, &ExportOptions::new(Format::Html))?;
//! assert!(html.contains("<div class=\"footnotes\">"));
//! # Ok::<(), mmd_export::Error>(())
//! ```
//!
//! ## Working with Trees
//!
//! Trees can also be built in code and exported with [`export_tree`]:
//!
//! ```
//! use mmd_export::{ExportOptions, Format, Node, NodeId, NodeKind, Tree, export_tree};
//!
//! let mut tree = Tree::new();
//! let heading = tree.add_child(NodeId::ROOT, Node::new(NodeKind::H1));
//! tree.add_child(heading, Node::with_text(NodeKind::Str, "Intro"));
//!
//! let toc = export_tree(tree, &ExportOptions::new(Format::Toc))?;
//! assert_eq!(toc, "* [Intro][intro]\n");
//! # Ok::<(), mmd_export::Error>(())
//! ```

pub mod abbr;
pub mod error;
pub mod export;
pub mod label;
pub mod notes;
pub mod options;
pub mod refs;
pub mod transclude;
pub mod tree;
pub mod util;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::{Error, Result};
pub use export::{export_json, export_tree};
pub use options::{ExportOptions, Extensions, Format};
pub use tree::{Attribute, LinkData, Node, NodeId, NodeKind, Tree};
