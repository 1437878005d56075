//! Per-export rendering state shared by all output formats.

use crate::abbr;
use crate::notes::{NoteEngine, Prng};
use crate::options::{Extensions, Format};
use crate::refs::{ReferencePools, Resolution};
use crate::tree::{NodeId, NodeKind, Tree};

use super::smart::Language;

/// Header or data cells while walking a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum CellType {
    Head,
    #[default]
    Data,
}

/// Paragraph style context for ODF output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ParaStyle {
    #[default]
    Standard,
    Quotation,
    Preformatted,
    BulletList,
    OrderedList,
    Footnote,
}

/// Everything a renderer needs besides the node it is looking at.
///
/// Created once per export and dropped with it. The tree is borrowed
/// mutably because rendering a footnote with an inline body moves that
/// body into a note of its own.
pub(crate) struct RenderContext<'a> {
    pub tree: &'a mut Tree,
    pub pools: &'a ReferencePools,
    pub notes: NoteEngine,
    pub extensions: Extensions,
    pub out: String,
    /// Newlines already at the end of `out`.
    pub padded: usize,
    pub base_header_level: usize,
    pub language: Language,
    pub table_alignment: String,
    pub table_column: usize,
    pub cell_type: CellType,
    /// Note whose last paragraph gets the back-link.
    pub footnote_to_print: usize,
    /// Paragraphs left in the note being printed.
    pub footnote_para_counter: usize,
    pub printing_notes: bool,
    pub no_latex_footnote: bool,
    pub latex_footer: Option<String>,
    pub para_style: ParaStyle,
    pub list_needs_end_p: bool,
    pub toc_level: usize,
    /// Set while writing a `mailto:` link.
    pub obfuscate: bool,
    rng: Prng,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        tree: &'a mut Tree,
        pools: &'a ReferencePools,
        notes: NoteEngine,
        format: Format,
        extensions: Extensions,
    ) -> Self {
        let base_header_level = base_header_level(tree, format);
        let language = tree
            .metavalue_for_key("quoteslanguage")
            .map(|name| Language::from_name(&name))
            .unwrap_or_default();

        Self {
            tree,
            pools,
            notes,
            extensions,
            out: String::new(),
            padded: 2,
            base_header_level,
            language,
            table_alignment: String::new(),
            table_column: 0,
            cell_type: CellType::Data,
            footnote_to_print: 0,
            footnote_para_counter: 0,
            printing_notes: false,
            no_latex_footnote: false,
            latex_footer: None,
            para_style: ParaStyle::Standard,
            list_needs_end_p: false,
            toc_level: 0,
            obfuscate: false,
            rng: Prng::new(0x4d4d_4421),
        }
    }

    pub fn into_output(self) -> String {
        self.out
    }

    pub fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    pub fn push_char(&mut self, c: char) {
        self.out.push(c);
    }

    /// Ensure at least `n` newlines end the output.
    pub fn pad(&mut self, n: usize) {
        while self.padded < n {
            self.out.push('\n');
            self.padded += 1;
        }
    }

    pub fn has(&self, extension: Extensions) -> bool {
        self.extensions.contains(extension)
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.tree.kind(id)
    }

    /// Text payload of a node, owned so the tree can be borrowed again.
    pub fn text(&self, id: NodeId) -> String {
        self.tree[id].text().to_string()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.tree.first_child(id)
    }

    /// Next sibling to render after `id`, skipping the interior of an
    /// abbreviation span.
    pub fn next_after(&self, id: NodeId) -> Option<NodeId> {
        self.tree.next_sibling(abbr::span_end(self.tree, id))
    }

    pub fn metavalue(&self, key: &str) -> Option<String> {
        self.tree.metavalue_for_key(key)
    }

    pub fn resolve_link(&self, id: NodeId) -> Resolution {
        self.pools.resolve_link(self.tree, id, self.extensions)
    }

    /// Heading level after applying the base header level.
    pub fn heading_level(&self, kind: NodeKind, max: usize) -> usize {
        let level = kind.heading_level().map_or(1, usize::from);
        (level + self.base_header_level - 1).min(max)
    }

    /// Append `s` escaped for HTML/XML text and attributes.
    ///
    /// While `obfuscate` is set, ASCII characters are written as decimal or
    /// hexadecimal character references chosen pseudo-randomly.
    pub fn push_html(&mut self, s: &str) {
        let mask = self.obfuscate && self.has(Extensions::OBFUSCATE);
        for c in s.chars() {
            match c {
                '&' => self.out.push_str("&amp;"),
                '<' => self.out.push_str("&lt;"),
                '>' => self.out.push_str("&gt;"),
                '"' => self.out.push_str("&quot;"),
                c if mask && c.is_ascii() => {
                    let entity = if self.rng.next_u64() % 2 == 0 {
                        format!("&#{};", c as u32)
                    } else {
                        format!("&#x{:x};", c as u32)
                    };
                    self.out.push_str(&entity);
                }
                c => self.out.push(c),
            }
        }
    }
}

/// Base header level from metadata, by output family.
fn base_header_level(tree: &Tree, format: Format) -> usize {
    let keys: &[&str] = match format {
        Format::Html | Format::CriticHtml => &["baseheaderlevel", "xhtmlheaderlevel", "htmlheaderlevel"],
        Format::Latex | Format::Memoir | Format::Beamer => &["baseheaderlevel", "latexheaderlevel"],
        Format::Odf => &["baseheaderlevel", "odfheaderlevel"],
        _ => &["baseheaderlevel"],
    };
    keys.iter()
        .rev()
        .filter_map(|key| tree.metavalue_for_key(key))
        .find_map(|value| value.trim().parse::<usize>().ok())
        .filter(|&level| level >= 1)
        .unwrap_or(1)
}
