//! Rendering a document tree to an output format.
//!
//! # Architecture
//!
//! Every export runs the same pipeline:
//! - Abbreviation definitions are pulled out of the tree and matched
//!   against running text
//! - Link, footnote, glossary and citation definitions are pooled
//! - One renderer walks the tree through a shared [`RenderContext`],
//!   numbering notes as their references are met
//!
//! OPML and the CriticMarkup formats skip the first two steps. The pools,
//! the numbering state and the context live for one export only.
//!
//! # Example
//!
//! ```
//! use mmd_export::{ExportOptions, Format, export_json};
//!
//! let json = r#"[{"kind": "para", "children": [{"kind": "str", "text": "Hi"}]}]"#;
//! let html = export_json(json, &ExportOptions::new(Format::Html))?;
//! assert_eq!(html, "<p>Hi</p>");
//! # Ok::<(), mmd_export::Error>(())
//! ```

use tracing::debug;

use crate::abbr;
use crate::error::{Error, Result};
use crate::label::label_from_string;
use crate::notes::NoteEngine;
use crate::options::{ExportOptions, Extensions, Format};
use crate::refs::{self, ReferencePools};
use crate::tree::Tree;

mod context;
mod critic;
mod html;
mod latex;
mod lyx;
mod odf;
mod opml;
mod rtf;
mod smart;
mod text;
mod toc;

pub(crate) use context::RenderContext;
pub use smart::{Language, Quote};

use critic::{CriticMode, CriticRenderer};
use html::HtmlRenderer;
use latex::{LatexFlavor, LatexRenderer};
use lyx::LyxRenderer;
use odf::OdfRenderer;
use opml::OpmlRenderer;
use rtf::RtfRenderer;
use text::TextRenderer;
use toc::TocRenderer;

/// Render `tree` in the format and with the extensions in `options`.
///
/// Consumes the tree: rendering retags nodes (abbreviation spans, cited
/// notes) and moves inline footnote bodies into notes of their own.
pub fn export_tree(mut tree: Tree, options: &ExportOptions) -> Result<String> {
    if options.format == Format::Mmd {
        return Err(Error::SourceNeedsParser);
    }

    let mut pools = ReferencePools::new();
    if !options.format.skips_extraction() {
        let defs = abbr::extract_abbreviations(&mut tree);
        abbr::find_abbreviations(&mut tree, &defs);
        pools = refs::extract_references(&tree, options.extensions);
        pools.abbreviations = defs;
    }

    let format = match options.format {
        Format::Latex => latex_mode(&tree),
        format => format,
    };

    let mut notes = NoteEngine::new(std::mem::take(&mut pools.notes));
    if options.extensions.contains(Extensions::RANDOM_FOOT) {
        notes = notes.with_random_seed(options.random_seed);
    }

    debug!(%format, extensions = options.extensions.bits(), "rendering");
    let cx = RenderContext::new(&mut tree, &pools, notes, format, options.extensions);
    match format {
        Format::Text => TextRenderer::new(cx).render(),
        Format::Html => HtmlRenderer::new(cx).render(),
        Format::Latex | Format::Memoir | Format::Beamer => {
            LatexRenderer::new(cx, LatexFlavor::for_format(format)).render()
        }
        Format::Opml => OpmlRenderer::new(cx).render(),
        Format::Odf => OdfRenderer::new(cx).render(),
        Format::Rtf => RtfRenderer::new(cx).render(),
        Format::Lyx => LyxRenderer::new(cx).render(),
        Format::Toc => TocRenderer::new(cx).render(),
        Format::CriticAccept => CriticRenderer::new(cx, CriticMode::Accept).render(),
        Format::CriticReject => CriticRenderer::new(cx, CriticMode::Reject).render(),
        Format::CriticHtml => CriticRenderer::new(cx, CriticMode::Highlight).render(),
        Format::Mmd => Err(Error::SourceNeedsParser),
    }
}

/// Parse a JSON document tree and render it.
pub fn export_json(json: &str, options: &ExportOptions) -> Result<String> {
    let tree = Tree::from_json(json)?;
    export_tree(tree, options)
}

/// LaTeX variant named by the `latexmode` metadata key.
fn latex_mode(tree: &Tree) -> Format {
    let mode = tree
        .metavalue_for_key("latexmode")
        .map(|value| label_from_string(&value));
    match mode.as_deref() {
        Some("beamer") => Format::Beamer,
        Some("memoir") => Format::Memoir,
        _ => Format::Latex,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Node, NodeId, NodeKind};

    fn tree_with_mode(mode: &str) -> Tree {
        let mut tree = Tree::new();
        let meta = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Metadata));
        let key = tree.add_child(meta, Node::with_text(NodeKind::MetaKey, "LaTeX Mode"));
        tree.add_child(key, Node::with_text(NodeKind::MetaValue, mode));
        tree
    }

    #[test]
    fn test_latex_mode() {
        assert_eq!(latex_mode(&tree_with_mode("Beamer")), Format::Beamer);
        assert_eq!(latex_mode(&tree_with_mode("memoir ")), Format::Memoir);
        assert_eq!(latex_mode(&tree_with_mode("article")), Format::Latex);
        assert_eq!(latex_mode(&Tree::new()), Format::Latex);
    }

    #[test]
    fn test_mmd_needs_source_text() {
        let result = export_tree(Tree::new(), &ExportOptions::new(Format::Mmd));
        assert!(matches!(result, Err(Error::SourceNeedsParser)));
    }

    #[test]
    fn test_opml_keeps_definitions_in_place() {
        let mut tree = Tree::new();
        let def = tree.add_child(NodeId::ROOT, Node::with_text(NodeKind::Abbreviation, "X"));
        tree.add_child(def, Node::with_text(NodeKind::Str, "Ex"));
        let out = export_tree(tree.clone(), &ExportOptions::new(Format::Opml)).unwrap();
        assert!(out.ends_with("<body>\n</body>\n</opml>"));

        let out = export_tree(tree, &ExportOptions::new(Format::Latex)).unwrap();
        assert_eq!(out, "\\newacro{xex}[X]{Ex}\n");
    }
}
