//! LyX document output, with a Beamer variant.
//!
//! LyX files always carry their own header, so there is no snippet mode.
//! The `latexmode` metadata key picks the document class; `beamer` switches
//! level-3 sections to frames the way the LaTeX Beamer output does.
//!
//! Heading, table and figure labels get a short type prefix (`secti:`,
//! `tab:`, `fig:`) so LyX's formatted references can name what they point
//! at. Internal `#label` links are rewritten to the prefixed label before
//! the walk starts.

use std::collections::{HashMap, HashSet};

use crate::abbr;
use crate::error::Result;
use crate::label::{clean_string, label_from_string};
use crate::notes::NoteKind;
use crate::options::Extensions;
use crate::refs::Resolution;
use crate::tree::{LinkData, NodeId, NodeKind};

use super::context::RenderContext;
use super::critic::split_substitution;
use super::html::{citation_key, is_external_citation, split_math};
use super::odf::html_comment;
use super::smart::{Language, Quote};

const DEFAULT_HEADINGS: [&str; 7] = [
    "Part",
    "Chapter",
    "Section",
    "Subsection",
    "Subsubsection",
    "Paragraph",
    "Subparagraph",
];

const PACKAGES: [&str; 6] = ["listings", "natbib", "nomencl", "booktabs", "refstyle", "varioref"];

const NOMENCLATURE: &str = "\n\\begin_layout Standard\n\\begin_inset CommandInset nomencl_print\n\
                            LatexCommand printnomenclature\nset_width \"auto\"\n\n\\end_inset\n\n\\end_layout\n";

const PROTECTED_SPACE: &str = "\n\\begin_inset space ~\n\\end_inset\n";

const LISTING_BREAK: &str = "\n\\end_layout\n\n\\begin_layout Plain Layout\n\n";

/// What a paragraph turns into, given where it sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Standard,
    Quote,
    Enumerate,
    Itemize,
    Definition,
    /// Body of a glossary entry, written as a nomenclature description.
    Glossary,
    /// Bibliography entry body, already inside a layout.
    Bare,
}

pub(crate) struct LyxRenderer<'a> {
    cx: RenderContext<'a>,
    beamer: bool,
    numbered: bool,
    headings: Vec<String>,
    /// Document labels to their prefixed form.
    references: HashMap<String, String>,
    /// Short forms already introduced with their expansion.
    used_abbreviations: HashSet<String>,
    layout: Layout,
    level: usize,
    beamer_bullet: bool,
    definition_hit: bool,
    definition_open: bool,
    protect_spaces: bool,
    in_frame: bool,
    need_fragile: bool,
    in_head: bool,
    need_line: bool,
    table_rows: usize,
    table_row: usize,
    footer_done: bool,
}

impl<'a> LyxRenderer<'a> {
    pub fn new(cx: RenderContext<'a>) -> Self {
        let beamer = cx
            .metavalue("latexmode")
            .is_some_and(|mode| label_from_string(&mode) == "beamer");
        let numbered = cx
            .metavalue("numberheadings")
            .is_none_or(|value| label_from_string(&value) != "no");

        let mut headings: Vec<String> = DEFAULT_HEADINGS.iter().map(|s| s.to_string()).collect();
        if let Some(names) = cx.metavalue("lyxheadings") {
            for (slot, name) in headings.iter_mut().zip(names.split(',')) {
                *slot = clean_string(name).trim().to_string();
            }
        }
        if beamer {
            headings[1] = "Section".to_string();
            headings[2] = "Frame".to_string();
        }

        Self {
            cx,
            beamer,
            numbered,
            headings,
            references: HashMap::new(),
            used_abbreviations: HashSet::new(),
            layout: Layout::Standard,
            level: 0,
            beamer_bullet: false,
            definition_hit: false,
            definition_open: false,
            protect_spaces: false,
            in_frame: false,
            need_fragile: false,
            in_head: false,
            need_line: false,
            table_rows: 0,
            table_row: 0,
            footer_done: false,
        }
    }

    pub fn render(mut self) -> Result<String> {
        self.collect_references();
        self.push_header();
        self.render_children(NodeId::ROOT);
        if !self.footer_done {
            self.render_footer();
        }
        if let Some(bibtex) = self.cx.metavalue("bibtex") {
            self.cx.push(&format!(
                "\n\\begin_layout Standard\n\n\\begin_inset CommandInset bibtex\nLatexCommand bibtex\n\
                 bibfiles \"{bibtex}\"\noptions \"plainnat\"\n\n\\end_inset\n\n\\end_layout\n"
            ));
        }
        self.cx.push("\n\\end_body\n\\end_document\n");
        Ok(self.cx.into_output())
    }

    fn render_children(&mut self, parent: NodeId) {
        let first = self.cx.first_child(parent);
        self.render_from(first);
    }

    fn render_from(&mut self, first: Option<NodeId>) {
        let mut cur = first;
        while let Some(id) = cur {
            self.render_node(id);
            cur = self.cx.next_after(id);
        }
    }

    /// Render into a scratch buffer instead of the output.
    fn capture(&mut self, f: impl FnOnce(&mut Self)) -> String {
        let saved = std::mem::take(&mut self.cx.out);
        f(self);
        std::mem::replace(&mut self.cx.out, saved)
    }

    fn with_layout(&mut self, layout: Layout, f: impl FnOnce(&mut Self)) {
        let saved = std::mem::replace(&mut self.layout, layout);
        f(self);
        self.layout = saved;
    }

    fn render_node(&mut self, id: NodeId) {
        let kind = self.cx.kind(id);
        match kind {
            NodeKind::Root
            | NodeKind::List
            | NodeKind::BlockquoteMarker
            | NodeKind::Raw => self.render_children(id),
            NodeKind::Toc => self.cx.push(
                "\n\\begin_layout Standard\n\\begin_inset CommandInset toc\nLatexCommand tableofcontents\n\n\
                 \\end_inset\n\n\\end_layout\n",
            ),
            NodeKind::HeadingSection => self.render_section(id),
            NodeKind::NoType
            | NodeKind::VerbatimType
            | NodeKind::Metadata
            | NodeKind::MetaKey
            | NodeKind::MetaValue
            | NodeKind::AutoLabel
            | NodeKind::LinkReference
            | NodeKind::NoteSource
            | NodeKind::NoteLabel
            | NodeKind::GlossarySource
            | NodeKind::GlossarySortKey
            | NodeKind::GlossaryLabel
            | NodeKind::CitationSource
            | NodeKind::TableSeparator
            | NodeKind::TableCaption
            | NodeKind::TableLabel
            | NodeKind::CellSpan
            | NodeKind::Abbreviation
            | NodeKind::KeyCounter => {}
            NodeKind::Footer => self.render_footer(),

            NodeKind::Str | NodeKind::AbbrStop => {
                let text = self.cx.text(id);
                self.push_lyx(&text);
            }
            NodeKind::Space => {
                let text = self.cx.text(id);
                if self.protect_spaces {
                    self.cx.push(PROTECTED_SPACE);
                } else if text.starts_with('\n') {
                    self.cx.push(&format!("{text} "));
                } else {
                    self.cx.push(&text);
                }
            }
            NodeKind::Abbr | NodeKind::AbbrStart => self.render_abbreviation(id),

            NodeKind::Plain | NodeKind::Para => self.render_para(id),
            NodeKind::HRule => self.cx.push(
                "\n\\begin_layout Standard\n\n\\begin_inset CommandInset line\nLatexCommand rule\n\
                 offset \"0.5ex\"\nwidth \"100col%\"\nheight \"1pt\"\n\n\\end_inset\n\n\\end_layout\n",
            ),
            NodeKind::HtmlBlock => {
                let text = self.cx.text(id);
                if let Some(raw) = html_comment(&text) {
                    let raw = escape_lyx(raw);
                    self.cx.push(&format!(
                        "\n\\begin_layout Standard\n\\begin_inset ERT\nstatus collapsed\n\n\
                         \\begin_layout Plain Layout\n\n{raw}\n\n\\end_layout\n\n\\end_inset\n\\end_layout\n"
                    ));
                }
            }
            NodeKind::Html => self.render_inline_html(id),
            NodeKind::Verbatim | NodeKind::VerbatimFence => self.render_verbatim(id),
            NodeKind::BulletList => self.render_list(id, Layout::Itemize),
            NodeKind::OrderedList => self.render_list(id, Layout::Enumerate),
            NodeKind::DefList => {
                self.definition_hit = true;
                self.definition_open = false;
                self.render_list(id, Layout::Standard);
                self.definition_open = false;
            }
            NodeKind::Blockquote => self.render_list(id, Layout::Quote),
            NodeKind::ListItem => self.render_list_item(id),
            NodeKind::Term => {
                self.definition_open = false;
                if self.definition_hit {
                    self.cx
                        .push("\n\\begin_layout Labeling\n\\labelwidthstring 00.00.0000\n\n\\series bold\n");
                    self.definition_hit = false;
                } else {
                    self.cx.push(",");
                    self.cx.push(PROTECTED_SPACE);
                }
                let saved = std::mem::replace(&mut self.protect_spaces, true);
                self.render_children(id);
                self.protect_spaces = saved;
            }
            NodeKind::Definition => {
                if !self.definition_hit {
                    self.cx.push("\n\\series default\n");
                }
                self.definition_hit = true;
                self.with_layout(Layout::Definition, |r| r.render_children(id));
            }
            NodeKind::H1
            | NodeKind::H2
            | NodeKind::H3
            | NodeKind::H4
            | NodeKind::H5
            | NodeKind::H6 => self.render_heading(id, kind),

            NodeKind::Apostrophe => self.push_quote(Quote::Apostrophe),
            NodeKind::Ellipsis => self.push_quote(Quote::Ellipsis),
            NodeKind::EmDash => self.push_quote(Quote::EmDash),
            NodeKind::EnDash => self.push_quote(Quote::EnDash),
            NodeKind::SingleQuoted => {
                self.push_quote(Quote::LeftSingle);
                self.render_children(id);
                self.push_quote(Quote::RightSingle);
            }
            NodeKind::DoubleQuoted => {
                self.push_quote(Quote::LeftDouble);
                self.render_children(id);
                self.push_quote(Quote::RightDouble);
            }
            NodeKind::LineBreak => self.cx.push("\n\\begin_inset Newline newline\n\\end_inset\n"),
            NodeKind::MathSpan => self.render_math(id),
            NodeKind::Strong => {
                self.cx.push("\n\\series bold\n");
                self.render_children(id);
                self.cx.push("\n\\series default\n");
            }
            NodeKind::Emph => {
                self.cx.push("\n\\emph on\n");
                self.render_children(id);
                self.cx.push("\n\\emph default\n");
            }
            NodeKind::Code => {
                let text = self.cx.text(id);
                self.cx.push("\n\\family typewriter\n");
                self.push_lyx(&text);
                self.cx.push("\n\\family default\n");
            }
            NodeKind::Superscript | NodeKind::Subscript => {
                let script = if kind == NodeKind::Superscript {
                    "superscript"
                } else {
                    "subscript"
                };
                let text = self.cx.text(id);
                self.cx.push(&format!(
                    "\n\\begin_inset script {script}\n\n\\begin_layout Plain Layout\n{text}\n\\end_layout\n\n\\end_inset\n"
                ));
            }
            NodeKind::Variable => {
                let key = self.cx.text(id);
                match self.cx.metavalue(&key) {
                    Some(value) => self.push_lyx(&value),
                    None => self.cx.push(&format!("[%{key}]")),
                }
            }

            NodeKind::Link => self.render_link(id),
            NodeKind::Image | NodeKind::ImageBlock => self.render_image(id, kind),
            NodeKind::NoteReference => self.render_note_reference(id),
            NodeKind::Citation | NodeKind::NoCitation => self.render_citation(id, kind),
            NodeKind::GlossaryTerm => self.render_glossary_term(id),

            NodeKind::Table => self.render_table(id),
            NodeKind::TableHead => {
                self.need_line = true;
                self.in_head = true;
                self.render_children(id);
                self.in_head = false;
            }
            NodeKind::TableBody => {
                self.need_line = true;
                self.render_children(id);
            }
            NodeKind::TableRow => {
                if self.in_head {
                    self.cx.push("\n<row endhead=\"true\" endfirsthead=\"true\">");
                } else {
                    self.cx.push("\n<row>");
                }
                self.cx.table_column = 0;
                self.render_children(id);
                self.cx.push("\n</row>");
                self.need_line = false;
                self.table_row += 1;
            }
            NodeKind::TableCell => self.render_table_cell(id),

            NodeKind::CriticAddition | NodeKind::CriticHighlight => {
                if kind == NodeKind::CriticHighlight || !self.cx.has(Extensions::CRITIC_REJECT) {
                    let text = self.cx.text(id);
                    self.push_lyx(&text);
                }
            }
            NodeKind::CriticDeletion => {
                if self.cx.has(Extensions::CRITIC_REJECT) {
                    let text = self.cx.text(id);
                    self.push_lyx(&text);
                }
            }
            NodeKind::CriticComment => {}
            NodeKind::CriticSubstitution if self.cx.first_child(id).is_some() => {
                self.render_children(id);
            }
            NodeKind::CriticSubstitution => {
                let text = self.cx.text(id);
                let (old, new) = split_substitution(&text);
                if self.cx.has(Extensions::CRITIC_REJECT) {
                    self.push_lyx(old);
                } else {
                    self.push_lyx(new);
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Document header
    // ------------------------------------------------------------------------

    /// Map heading, table and figure labels to their prefixed form.
    fn collect_references(&mut self) {
        let ids: Vec<NodeId> = self.cx.tree.iter_dfs().collect();
        for id in ids {
            let kind = self.cx.kind(id);
            let entry = if kind.is_heading() {
                let level = self.cx.heading_level(kind, DEFAULT_HEADINGS.len());
                let (label, _) = self.heading_label(id);
                let prefix = ref_prefix(&self.headings[level - 1]);
                Some((label, prefix))
            } else if kind == NodeKind::Table {
                self.child_of_kind(id, NodeKind::TableCaption)
                    .map(|caption| (self.caption_label(caption), "tab".to_string()))
            } else if matches!(kind, NodeKind::Image | NodeKind::ImageBlock) {
                self.cx.tree[id]
                    .link
                    .as_ref()
                    .and_then(|link| link.label.as_deref())
                    .map(|label| (label_from_string(label), "fig".to_string()))
            } else {
                None
            };
            if let Some((label, prefix)) = entry {
                let prefixed = format!("{prefix}:{label}");
                self.references.entry(label).or_insert(prefixed);
            }
        }
    }

    fn push_header(&mut self) {
        let class = self
            .cx
            .metavalue("latexmode")
            .map(|mode| label_from_string(&mode))
            .unwrap_or_else(|| "memoir".to_string());

        let mut out = String::from(
            "#LyX File created by multimarkdown\n\\lyxformat 413\n\\begin_document\n\\begin_header\n",
        );
        out.push_str(&format!("\\textclass {class}\n\\begin_preamble\n"));
        for package in PACKAGES {
            out.push_str(&format!("\\usepackage{{{package}}}\n"));
        }
        for package in self.metalist("packages") {
            out.push_str(&format!("\\usepackage{{{package}}}\n"));
        }
        if self.beamer {
            let theme = self.cx.metavalue("theme").unwrap_or_else(|| "warsaw".to_string());
            out.push_str(&format!("\\usetheme{{{theme}}}\n\\setbeamercovered{{transparent}}\n"));
        }
        if self.cx.metavalue("latexinput").as_deref() == Some("mmd-natbib-plain") {
            out.push_str("\\bibpunct{[}{]}{;}{n}{}{,}\n");
        } else {
            out.push_str("\\bibpunct{(}{)}{,}{a}{,}{,}\n");
        }

        for name in &self.headings {
            let prefix = ref_prefix(name);
            if self.numbered {
                out.push_str(&format!(
                    "\\newref{{{prefix}}}{{refcmd={{{name} \\ref{{#1}} \\vpageref{{#1}}}}}}\n"
                ));
            } else {
                out.push_str(&format!(
                    "\\newref{{{prefix}}}{{refcmd={{``\\nameref{{#1}}'' \\vpageref{{#1}}}}}}\n"
                ));
            }
        }
        out.push_str("\\newref{tab}{refcmd={Table \\ref{#1} \\vpageref{#1}}}\n");
        out.push_str("\\newref{fig}{refcmd={Figure \\ref{#1} \\vpageref{#1}}}\n");
        out.push_str("\\end_preamble\n");

        out.push_str("\\options refpage");
        if self
            .cx
            .metavalue("cleanpdf")
            .is_some_and(|value| label_from_string(&value) == "yes")
        {
            out.push_str(",hidelinks");
        }
        if let Some(options) = self.cx.metavalue("classoptions") {
            out.push_str(&format!(",{options}"));
        }
        out.push('\n');

        out.push_str("\\begin_modules\n");
        for module in self.metalist("modules") {
            out.push_str(&format!("{module}\n"));
        }
        out.push_str("\\end_modules\n");
        out.push_str("\\bibtex_command default\n\\cite_engine natbib_authoryear\n");
        out.push_str("\\end_header\n\\begin_body\n");
        self.cx.push(&out);

        let mut blocks = vec![("title", "Title")];
        if self.beamer {
            blocks.push(("subtitle", "Subtitle"));
        }
        blocks.push(("author", "Author"));
        if self.beamer {
            blocks.push(("affiliation", "Institute"));
        }
        blocks.extend([("date", "Date"), ("abstract", "Abstract")]);
        for (key, layout) in blocks {
            if let Some(value) = self.cx.metavalue(key) {
                self.cx.push(&format!("\n\\begin_layout {layout}\n"));
                self.push_lyx(&value);
                self.cx.push("\n\\end_layout\n");
            }
        }
    }

    /// Comma-separated metadata value, cleaned.
    fn metalist(&self, key: &str) -> Vec<String> {
        self.cx
            .metavalue(key)
            .map(|value| {
                value
                    .split(',')
                    .map(|item| clean_string(item).trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------------

    fn render_para(&mut self, id: NodeId) {
        match self.layout {
            Layout::Definition if !self.definition_open => {
                self.cx.push("\n ");
                self.render_children(id);
                self.cx.push("\n\\end_layout\n");
                self.definition_open = true;
                return;
            }
            Layout::Definition => {
                self.cx.push("\n\n\\begin_deeper\n\n\\begin_layout Standard\n");
                self.render_children(id);
                self.cx.push("\n\\end_layout\n\n\\end_deeper\n");
                return;
            }
            Layout::Quote => self.cx.push("\n\\begin_layout Quote\n"),
            Layout::Enumerate => {
                self.cx.push("\n\\begin_layout Enumerate\n");
                self.push_overlay("<+->");
            }
            Layout::Itemize => {
                self.cx.push("\n\\begin_layout Itemize\n");
                self.push_overlay("+-");
            }
            Layout::Glossary => self.cx.push("\ndescription \""),
            Layout::Bare => {}
            Layout::Standard => self.cx.push("\n\\begin_layout Standard\n"),
        }
        self.render_children(id);
        match self.layout {
            Layout::Glossary => self.cx.push("\"\n"),
            Layout::Bare => {}
            _ => self.cx.push("\n\\end_layout\n"),
        }
    }

    /// Beamer: reveal the list one item at a time.
    fn push_overlay(&mut self, overlay: &str) {
        if self.beamer_bullet {
            self.cx.push(&format!(
                "\n\\begin_inset Argument 1\nstatus open\n\n\\begin_layout Plain Layout\n{overlay}\n\\end_layout\n\n\\end_inset\n"
            ));
            self.beamer_bullet = false;
        }
    }

    /// Lists and block quotes nest with `\begin_deeper`.
    fn render_list(&mut self, id: NodeId, layout: Layout) {
        if self.beamer && matches!(layout, Layout::Itemize | Layout::Enumerate) {
            self.beamer_bullet = true;
        }
        self.level += 1;
        if self.level > 1 {
            self.cx.push("\n\\begin_deeper\n");
        }
        self.with_layout(layout, |r| r.render_children(id));
        self.level -= 1;
        if self.level > 0 {
            self.cx.push("\n\\end_deeper\n");
        }
    }

    fn render_list_item(&mut self, id: NodeId) {
        let blocks = self.item_blocks(id);
        let Some((&first, rest)) = blocks.split_first() else {
            self.cx.push("\n\\begin_layout Itemize\n\\end_layout\n");
            return;
        };
        self.render_node(first);

        // Beamer keeps everything after the first block with the item;
        // otherwise a nested list ends the item's own content.
        let split = if self.beamer {
            rest.len()
        } else {
            rest.iter()
                .position(|&b| {
                    matches!(
                        self.cx.kind(b),
                        NodeKind::BulletList | NodeKind::OrderedList | NodeKind::DefList
                    )
                })
                .unwrap_or(rest.len())
        };
        let (inner, nested) = rest.split_at(split);
        if !inner.is_empty() {
            self.cx.push("\n\\begin_deeper\n");
            self.with_layout(Layout::Standard, |r| {
                for &block in inner {
                    r.render_node(block);
                }
            });
            self.cx.push("\n\\end_deeper\n");
        }
        for &block in nested {
            self.render_node(block);
        }
    }

    /// Blocks of a list item, looking through an anonymous group.
    fn item_blocks(&self, id: NodeId) -> Vec<NodeId> {
        let parent = match self.cx.first_child(id) {
            Some(first) if self.cx.kind(first) == NodeKind::List => first,
            _ => id,
        };
        self.cx.tree.children(parent).collect()
    }

    fn render_verbatim(&mut self, id: NodeId) {
        self.level += 1;
        if self.level > 1 {
            self.cx.push("\n\\begin_deeper\n");
        }
        let language = self
            .child_of_kind(id, NodeKind::VerbatimType)
            .map(|c| self.cx.text(c).trim_end().to_string())
            .filter(|language| !language.is_empty());
        let params = match language {
            Some(language) => format!("basicstyle={{\\footnotesize\\ttfamily}},language={language}"),
            None => "basicstyle={\\footnotesize\\ttfamily}".to_string(),
        };
        let code = self.cx.text(id);
        self.cx.push(&format!(
            "\\begin_layout Standard\n\\begin_inset listings\nlstparams \"{params}\"\ninline false\nstatus collapsed\n"
        ));
        self.cx.push(&listing_lines(&code));
        self.cx.push("\n\\end_inset\n\\end_layout\n");
        self.level -= 1;
        if self.level > 0 {
            self.cx.push("\n\\end_deeper\n");
        }
    }

    /// Label text and the first node to render for a heading.
    fn heading_label(&self, id: NodeId) -> (String, Option<NodeId>) {
        let first = self.cx.first_child(id);
        match first.filter(|&c| self.cx.kind(c) == NodeKind::AutoLabel) {
            Some(label) => (
                label_from_string(self.cx.tree[label].text()),
                self.cx.next_after(label),
            ),
            None => (self.cx.tree.label_of_children(id), first),
        }
    }

    fn render_heading(&mut self, id: NodeId, kind: NodeKind) {
        let level = self.cx.heading_level(kind, DEFAULT_HEADINGS.len());
        let name = self.headings[level - 1].clone();
        let (label, body) = self.heading_label(id);

        if self.beamer {
            self.open_beamer_heading(level);
        } else if self.numbered {
            self.cx.push(&format!("\n\\begin_layout {name}\n"));
        } else {
            self.cx.push(&format!("\n\\begin_layout {name}*\n"));
        }

        self.cx.no_latex_footnote = true;
        self.render_from(body);
        self.cx.push(&format!(
            "\n\\begin_inset CommandInset label\nLatexCommand label\nname \"{}:{label}\"\n\\end_inset\n",
            ref_prefix(&name)
        ));
        self.cx.no_latex_footnote = false;

        if self.beamer {
            self.close_beamer_heading(level);
        } else {
            self.cx.push("\n\\end_layout\n");
        }
    }

    fn open_beamer_heading(&mut self, level: usize) {
        match level {
            1 => self.cx.push("\n\\begin_layout Part\n"),
            2 => self.cx.push("\n\\begin_layout Section\n"),
            3 => {
                let frame = if self.need_fragile { "FragileFrame" } else { "Frame" };
                self.cx.push(&format!(
                    "\n\\begin_layout {frame}\n\\begin_inset Argument 4\nstatus open\n\n\\begin_layout Plain Layout\n"
                ));
                self.in_frame = true;
            }
            4 => self.cx.push(
                "\n\\begin_layout Standard\n\\begin_inset Flex ArticleMode\nstatus open\n\n\n\\begin_layout Plain Layout\n",
            ),
            _ => self.cx.push("\n\\begin_layout Standard\n\\emph on\n"),
        }
    }

    fn close_beamer_heading(&mut self, level: usize) {
        match level {
            1 | 2 => self.cx.push("\n\\end_layout\n"),
            3 => self
                .cx
                .push("\n\\end_layout\n\n\\end_inset\n\n\\end_layout\n\n\\begin_deeper\n"),
            4 => self.cx.push("\n\\end_layout\n\\end_inset\n\\end_layout"),
            _ => self.cx.push("\n\\emph default\n\n\\end_layout"),
        }
    }

    fn render_section(&mut self, id: NodeId) {
        if self.beamer {
            self.close_frame();
            self.need_fragile = self.cx.tree.contains_kind(id, NodeKind::Verbatim)
                || self.cx.tree.contains_kind(id, NodeKind::VerbatimFence);
        }
        self.render_children(id);
    }

    fn close_frame(&mut self) {
        if self.in_frame {
            self.cx.push("\n\\end_deeper\n\\begin_layout Separator\n\\end_layout");
            self.in_frame = false;
        }
    }

    fn render_footer(&mut self) {
        self.footer_done = true;
        let glossary = self.cx.notes.used_notes().any(|(_, note)| note.kind == NoteKind::Glossary);
        let nomenclature = glossary || !self.used_abbreviations.is_empty();

        if self.beamer {
            self.close_frame();
            if nomenclature {
                self.cx.push("\n\\begin_layout BeginFrame\nGlossary\n");
                self.cx.push(NOMENCLATURE);
                self.cx.push("\n\\end_layout\n\n\\begin_layout EndFrame\n\\end_layout");
            }
            if self.cx.notes.has_citations() {
                self.cx.push("\n\\begin_layout BeginFrame\nReferences\n\n\\end_layout");
                self.render_bibliography();
                self.cx.push("\n\\begin_layout EndFrame\n\\end_layout");
            }
            return;
        }

        if nomenclature {
            self.cx.push(NOMENCLATURE);
        }
        self.render_bibliography();
    }

    /// Cited notes, in order of first use.
    fn render_bibliography(&mut self) {
        let cited: Vec<(String, NodeId)> = self
            .cx
            .notes
            .used_notes()
            .filter(|(_, note)| note.kind == NoteKind::Citation)
            .map(|(_, note)| (note.label.clone().unwrap_or_default(), note.source))
            .collect();

        self.cx.printing_notes = true;
        for (label, source) in cited {
            self.cx.push(&format!(
                "\n\\begin_layout Bibliography\n\\begin_inset CommandInset bibitem\nLatexCommand bibitem\n\
                 key \"{label}\"\nlabel \"{label}\"\n\n\\end_inset\n"
            ));
            self.with_layout(Layout::Bare, |r| r.render_children(source));
            self.cx.push("\n\\end_layout\n");
        }
        self.cx.printing_notes = false;
    }

    // ------------------------------------------------------------------------
    // Inline
    // ------------------------------------------------------------------------

    fn push_lyx(&mut self, text: &str) {
        let escaped = escape_lyx(text);
        self.cx.push(&escaped);
    }

    fn push_quote(&mut self, quote: Quote) {
        if !self.cx.has(Extensions::SMART) {
            self.cx.push(quote.ascii());
        } else if quote == Quote::Ellipsis && self.layout == Layout::Glossary {
            self.cx.push("...");
        } else {
            self.cx.push(lyx_quote(quote, self.cx.language));
        }
    }

    /// First use writes the expansion with the short form after it and
    /// adds a nomenclature entry; later uses write the short form.
    fn render_abbreviation(&mut self, id: NodeId) {
        let Some((name, expansion)) = abbr::abbreviation_text(self.cx.tree, id) else {
            let text = self.cx.text(id);
            self.push_lyx(&text);
            return;
        };
        if !self.used_abbreviations.insert(name.clone()) {
            self.push_lyx(&name);
            return;
        }
        self.push_lyx(&expansion);
        self.cx.push(&format!(
            " ({name})\n\\begin_inset CommandInset nomenclature\nLatexCommand nomenclature\n\
             symbol \"{}\"\ndescription \"{}\"\n\\end_inset\n",
            escape_quotes(&name),
            escape_quotes(&expansion)
        ));
    }

    fn render_math(&mut self, id: NodeId) {
        let text = self.cx.text(id);
        let (open, inner, _) = split_math(&text);
        let formula = if open.is_empty() {
            self.cx.push(&text);
            return;
        } else if inner.starts_with("\\begin") {
            inner.to_string()
        } else if text.starts_with('$') {
            text.clone()
        } else if open == "\\(" {
            format!("${inner}$")
        } else {
            format!("\\[{inner}\\]")
        };
        self.cx
            .push(&format!("\n\\begin_inset Formula {formula}\n\\end_inset\n"));
    }

    fn render_inline_html(&mut self, id: NodeId) {
        let text = self.cx.text(id);
        let entity = match text.as_str() {
            "&quot;" => Some("\""),
            "&apos;" => Some("'"),
            "&amp;" => Some("&"),
            "&lt;" => Some("<"),
            "&gt;" => Some(">"),
            _ => None,
        };
        if let Some(c) = entity {
            self.cx.push(c);
        } else if let Some(raw) = html_comment(&text) {
            let raw = escape_lyx(raw);
            self.cx.push(&format!(
                "\n\\begin_inset ERT\nstatus collapsed\n\n\\begin_layout Plain Layout\n\n{raw}\n\n\\end_layout\n\\end_inset\n"
            ));
        }
    }

    fn render_link(&mut self, id: NodeId) {
        let data = match self.cx.resolve_link(id) {
            Resolution::Found(data) => data,
            Resolution::Missing(label) => {
                self.cx.push("[");
                self.render_children(id);
                self.cx.push("]");
                match self.cx.tree[id].text.clone() {
                    Some(text) => self.push_lyx(&text),
                    None => {
                        self.cx.push("[");
                        self.push_lyx(&label);
                        self.cx.push("]");
                    }
                }
                return;
            }
        };

        let text = self.capture(|r| r.render_children(id));
        let raw = self.cx.tree.raw_text_of_children(id).replace('\n', " ");
        let source = data.source.clone().unwrap_or_default();

        if let Some(anchor) = source.strip_prefix('#') {
            let anchor = match (anchor, &data.label) {
                ("", Some(label)) => label_from_string(label),
                (anchor, _) => anchor.to_string(),
            };
            let reference = self.references.get(&anchor).cloned().unwrap_or(anchor);
            if !text.is_empty() {
                self.cx.push(&format!("{text} ("));
            }
            self.cx.push(&format!(
                "\n\\begin_inset CommandInset ref\nLatexCommand formatted\nreference \"{reference}\"\n\n\\end_inset\n"
            ));
            if !text.is_empty() {
                self.cx.push(")");
            }
        } else if raw == source {
            self.cx.push(&format!(
                "\n\\begin_inset CommandInset href\nLatexCommand href\ntarget \"{source}\"\nname \"{text}\"\n\n\\end_inset\n"
            ));
        } else if source.strip_prefix("mailto:") == Some(raw.as_str()) {
            self.cx.push(&format!(
                "\n\\begin_inset CommandInset href\nLatexCommand href\ntarget \"{source}\"\nname \"{text}\"\n\
                 type \"mailto:\"\n\n\\end_inset\n"
            ));
        } else {
            let name = escape_quotes(&self.plain_text(id));
            self.cx.push(&format!(
                "\n\\begin_inset CommandInset href\nLatexCommand href\ntarget \"{source}\"\nname \"{name}\"\n\n\\end_inset\n"
            ));
            if !self.cx.no_latex_footnote {
                self.cx.push(&format!(
                    "\n\\begin_inset Foot\nstatus collapsed\n\n\\begin_layout Plain Layout\n\n\
                     \\begin_inset CommandInset href\nLatexCommand href\n\nname \"{source}\"\ntarget \"{source}\"\n\n\
                     \\end_inset\n\\end_layout\n\n\\end_inset\n"
                ));
            }
        }
    }

    /// Children as plain text, with typography in ASCII.
    fn plain_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.cx.tree.children(id) {
            match self.cx.kind(child) {
                NodeKind::Space => out.push(' '),
                NodeKind::Apostrophe => out.push('\''),
                NodeKind::Ellipsis => out.push_str("..."),
                NodeKind::EnDash => out.push_str("--"),
                NodeKind::EmDash => out.push_str("---"),
                NodeKind::SingleQuoted => out.push_str(&format!("'{}'", self.plain_text(child))),
                NodeKind::DoubleQuoted => out.push_str(&format!("\"{}\"", self.plain_text(child))),
                NodeKind::Abbreviation => {}
                _ => match self.cx.tree.text(child) {
                    Some(text) => out.push_str(text),
                    None => out.push_str(&self.plain_text(child)),
                },
            }
        }
        out
    }

    fn render_image(&mut self, id: NodeId, kind: NodeKind) {
        let data = match self.cx.resolve_link(id) {
            Resolution::Found(data) => data,
            Resolution::Missing(label) => {
                self.cx.push("![");
                self.render_children(id);
                self.cx.push("][");
                self.push_lyx(&label);
                self.cx.push("]");
                return;
            }
        };

        let block = kind == NodeKind::ImageBlock;
        if block {
            self.cx.push(
                "\n\\begin_layout Standard\n\\begin_inset Float figure\nwide false\nsideways false\n\
                 status collapsed\n\n\\begin_layout Plain Layout",
            );
        }
        self.cx.push(&graphics_inset(&data));
        if !block {
            return;
        }

        self.cx.push("\n\n\\end_layout\n");
        if self.cx.first_child(id).is_some() {
            self.cx
                .push("\n\\begin_layout Plain Layout\n\\begin_inset Caption\n\n\\begin_layout Plain Layout\n");
            self.render_children(id);
            self.cx.push("\n\\end_layout\n\n\\end_inset");
            if let Some(label) = &data.label {
                self.cx.push(&format!(
                    "\n\n\\begin_inset CommandInset label\nLatexCommand label\n\nname \"fig:{}\"\n\\end_inset",
                    label_from_string(label)
                ));
            }
            self.cx.push("\n\\end_layout\n");
        }
        self.cx.push("\n\\end_inset\n\n\\end_layout\n");
    }

    // ------------------------------------------------------------------------
    // Notes and citations
    // ------------------------------------------------------------------------

    fn render_note_reference(&mut self, id: NodeId) {
        let number = self.cx.notes.note_number_for_node(self.cx.tree, id);
        let Some(note) = self.cx.notes.note(number).cloned() else {
            return;
        };
        self.cx.notes.register_reference(number);

        if note.kind == NoteKind::Glossary {
            self.cx
                .push("\n\\begin_inset CommandInset nomenclature\nLatexCommand nomenclature");
            self.with_layout(Layout::Glossary, |r| r.render_children(note.source));
            self.cx.push("\n\\end_inset\n");
        } else {
            self.cx.push("\n\\begin_inset Foot\nstatus collapsed\n\n");
            self.with_layout(Layout::Standard, |r| r.render_children(note.source));
            self.cx.push("\n\n\\end_inset\n");
        }
    }

    fn render_glossary_term(&mut self, id: NodeId) {
        if let Some(sort) = self
            .cx
            .tree
            .next_sibling(id)
            .filter(|&s| self.cx.kind(s) == NodeKind::GlossarySortKey)
        {
            let sort = self.cx.text(sort);
            self.cx.push(&format!("\nprefix \"{}\"", escape_quotes(&sort)));
        }
        let term = self.cx.tree.raw_text_of_children(id);
        self.cx
            .push(&format!("\nsymbol \"{}\"", escape_quotes(term.trim_end())));
    }

    fn render_citation(&mut self, id: NodeId, kind: NodeKind) {
        let label = self.cx.tree[id]
            .link
            .as_ref()
            .and_then(|link| link.label.clone())
            .unwrap_or_default();
        let command = if kind == NodeKind::NoCitation {
            "nocite"
        } else {
            "cite"
        };
        let locator = match kind {
            NodeKind::Citation if self.cx.first_child(id).is_some() => {
                Some(self.capture(|r| r.render_children(id)))
            }
            _ => None,
        };

        if is_external_citation(&label) {
            self.push_citation(command, locator.as_deref(), citation_key(&label));
            return;
        }

        let number = self.cx.notes.note_number_for_label(&label);
        if number != 0 {
            self.cx.notes.mark_citation(self.cx.tree, number);
            self.cx.notes.register_reference(number);
            self.push_citation(command, locator.as_deref(), &label);
            return;
        }

        // Not defined here, so left for BibTeX; `key;` asks for a textual cite.
        match label.strip_suffix(';') {
            Some(key) if kind == NodeKind::Citation => {
                self.push_citation("citet", locator.as_deref(), key)
            }
            _ => self.push_citation(command, locator.as_deref(), &label),
        }
    }

    fn push_citation(&mut self, command: &str, locator: Option<&str>, key: &str) {
        self.cx.push(&format!(
            "\n\\begin_inset CommandInset citation\nLatexCommand {command}"
        ));
        if let Some(locator) = locator {
            self.cx.push(&format!("\nafter \"{locator}\""));
        }
        self.cx.push(&format!("\nkey \"{key}\"\n\n\\end_inset\n"));
    }

    // ------------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------------

    fn child_of_kind(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.cx.tree.children(id).find(|&c| self.cx.kind(c) == kind)
    }

    fn caption_label(&self, caption: NodeId) -> String {
        match self.child_of_kind(caption, NodeKind::TableLabel) {
            Some(label) => label_from_string(self.cx.tree[label].text()),
            None => self.cx.tree.label_of_children(caption),
        }
    }

    /// Row count and the widest row's column count.
    fn table_dimensions(&self, id: NodeId) -> (usize, usize) {
        let mut rows = 0;
        let mut columns = 0;
        for section in self.cx.tree.children(id) {
            if !matches!(self.cx.kind(section), NodeKind::TableHead | NodeKind::TableBody) {
                continue;
            }
            for row in self.cx.tree.children(section) {
                rows += 1;
                let width: usize = self
                    .cx
                    .tree
                    .children(row)
                    .map(|cell| self.cell_span(cell))
                    .sum();
                columns = columns.max(width);
            }
        }
        (rows, columns)
    }

    fn cell_span(&self, cell: NodeId) -> usize {
        self.cx
            .first_child(cell)
            .filter(|&c| self.cx.kind(c) == NodeKind::CellSpan)
            .map_or(1, |c| self.cx.tree[c].text().len() + 1)
    }

    fn render_table(&mut self, id: NodeId) {
        let caption = self.child_of_kind(id, NodeKind::TableCaption);
        let (rows, columns) = self.table_dimensions(id);
        self.table_rows = rows;
        self.table_row = 0;
        self.cx.table_alignment = self
            .child_of_kind(id, NodeKind::TableSeparator)
            .map(|sep| self.cx.text(sep).chars().filter(|&c| c != 'h').collect())
            .unwrap_or_default();

        self.cx.push(&format!(
            "\n\\begin_layout Standard\n\\begin_inset Tabular\n\
             <lyxtabular version=\"3\" rows=\"{}\" columns=\"{columns}\">\n\
             <features booktabs=\"true\" tabularvalignment=\"middle\" islongtable=\"true\" longtabularalignment=\"center\">",
            rows + usize::from(caption.is_some())
        ));
        let width = 100 / columns.max(1);
        for column in 0..columns {
            let align = self.alignment(column);
            self.cx.push(&format!(
                "\n<column alignment=\"{align}\" valignment=\"top\" width=\"{width}col%\">"
            ));
        }
        if let Some(caption) = caption {
            self.render_table_caption(caption, columns);
        }
        self.render_children(id);
        self.cx.push("\n</lyxtabular>\n\\end_inset\n\\end_layout\n");
    }

    fn alignment(&self, column: usize) -> &'static str {
        match self.cx.table_alignment.chars().nth(column) {
            Some('c' | 'C') => "center",
            Some('r' | 'R') => "right",
            _ => "left",
        }
    }

    fn render_table_caption(&mut self, caption: NodeId, columns: usize) {
        let label = self.caption_label(caption);
        self.cx.push(
            "\n<row caption=\"true\">\n<cell multicolumn=\"1\" alignment=\"left\" valignment=\"top\" usebox=\"none\">\n\
             \\begin_inset Text\n\n\\begin_layout Plain Layout\n\\begin_inset Caption\n\n\\begin_layout Plain Layout\n",
        );
        self.render_children(caption);
        self.cx.push(&format!(
            "\n\\end_layout\n\n\\end_inset\n\n\\begin_inset CommandInset label\nLatexCommand label\n\n\
             name \"tab:{label}\"\n\\end_inset\n\\end_layout\n\n\\end_inset\n\n</cell>"
        ));
        for _ in 1..columns {
            self.cx.push(
                "\n<cell multicolumn=\"2\" alignment=\"center\" valignment=\"top\" topline=\"true\" \
                 bottomline=\"true\" leftline=\"true\" usebox=\"none\">\n\\begin_inset Text\n\n\
                 \\begin_layout Plain Layout\n\n\\end_layout\n\n\\end_inset\n</cell>",
            );
        }
        self.cx.push("\n</row>");
    }

    fn render_table_cell(&mut self, id: NodeId) {
        let span = self.cell_span(id);
        let align = self.alignment(self.cx.table_column);
        let mut lines = String::new();
        if self.need_line {
            lines.push_str(" topline=\"true\"");
        }
        if self.table_row + 1 >= self.table_rows {
            lines.push_str(" bottomline=\"true\"");
        }

        for part in 1..=span {
            self.cx.push("\n<cell");
            if span > 1 {
                let multicolumn = if part == 1 { 1 } else { 2 };
                self.cx.push(&format!(" multicolumn=\"{multicolumn}\""));
            }
            self.cx.push(&format!(
                " alignment=\"{align}\" valignment=\"top\"{lines} usebox=\"none\">\n\\begin_inset Text\n\n\\begin_layout Plain Layout\n"
            ));
            if part == 1 {
                self.render_children(id);
            }
            self.cx.push("\n\\end_layout\n\n\n\\end_inset\n</cell>");
        }
        self.cx.table_column += span;
    }
}

/// Reference prefix for a section name: its first five letters, lowercased.
fn ref_prefix(name: &str) -> String {
    name.chars().take(5).collect::<String>().to_lowercase()
}

/// LyX markup for a typographic mark in `language`.
fn lyx_quote(quote: Quote, language: Language) -> &'static str {
    use Language::*;
    match quote {
        Quote::LeftSingle => match language {
            Swedish | French => "'",
            German => "‚",
            GermanGuillemets => "›",
            _ => "\n\\begin_inset Quotes els\n\\end_inset\n",
        },
        Quote::RightSingle => match language {
            German => "`",
            GermanGuillemets => "‹",
            _ => "\n\\begin_inset Quotes ers\n\\end_inset\n",
        },
        Quote::Apostrophe => "'",
        Quote::LeftDouble => match language {
            Dutch | German => "„",
            GermanGuillemets => "»",
            French => "«",
            Swedish => "''",
            English => "\n\\begin_inset Quotes eld\n\\end_inset\n",
        },
        Quote::RightDouble => match language {
            Swedish | Dutch => "''",
            German => "``",
            GermanGuillemets => "«",
            French => "»",
            English => "\n\\begin_inset Quotes erd\n\\end_inset\n",
        },
        Quote::EnDash => "--",
        Quote::EmDash => "---",
        Quote::Ellipsis => "\n\\SpecialChar \\ldots{}\n",
    }
}

fn graphics_inset(data: &LinkData) -> String {
    let mut out = format!(
        "\n\\begin_inset Graphics\n\t filename {}\n",
        data.source.as_deref().unwrap_or_default()
    );
    for key in ["width", "height"] {
        let Some(value) = data.dimension(key) else {
            continue;
        };
        match value.strip_suffix('%') {
            Some(percent) => out.push_str(&format!("\tlyxscale {percent}\n\tscale {percent}\n")),
            None => out.push_str(&format!("\t{key} {value}\n")),
        }
    }
    out.push_str("\n\\end_inset\n");
    out
}

/// Escape body text for LyX.
///
/// Backslashes and straight double quotes become insets. A newline gets a
/// trailing space unless one precedes it.
pub(crate) fn escape_lyx(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev = None;
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\n\\backslash\n\n"),
            '"' => out.push_str("\n\\begin_inset Quotes erd\n\\end_inset\n"),
            '\n' if prev == Some(' ') => out.push('\n'),
            '\n' => out.push_str("\n "),
            c => out.push(c),
        }
        prev = Some(c);
    }
    out
}

/// Code block lines, one `Plain Layout` each.
fn listing_lines(code: &str) -> String {
    let code = code.strip_suffix('\n').unwrap_or(code);
    let mut out = String::from("\n\\begin_layout Plain Layout\n\n");
    for c in code.chars() {
        match c {
            '\\' => out.push_str("\n\\backslash\n\n"),
            '\n' => out.push_str(LISTING_BREAK),
            c => out.push(c),
        }
    }
    out.push_str("\n\\end_layout\n");
    out
}

fn escape_quotes(text: &str) -> String {
    text.replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abbr::{extract_abbreviations, find_abbreviations};
    use crate::notes::NoteEngine;
    use crate::options::Format;
    use crate::refs::extract_references;
    use crate::tree::{Attribute, Node, Tree};

    fn render_with(tree: &mut Tree, extensions: Extensions) -> String {
        let defs = extract_abbreviations(tree);
        find_abbreviations(tree, &defs);
        let mut pools = extract_references(tree, extensions);
        pools.abbreviations = defs;
        let notes = NoteEngine::new(pools.notes.clone());
        let cx = RenderContext::new(tree, &pools, notes, Format::Lyx, extensions);
        LyxRenderer::new(cx).render().unwrap()
    }

    fn render(tree: &mut Tree) -> String {
        render_with(tree, Extensions::DEFAULT)
    }

    fn para(tree: &mut Tree, parent: NodeId, text: &str) -> NodeId {
        let p = tree.add_child(parent, Node::new(NodeKind::Para));
        words(tree, p, text);
        p
    }

    fn words(tree: &mut Tree, parent: NodeId, text: &str) {
        for (i, word) in text.split(' ').enumerate() {
            if i > 0 {
                tree.add_child(parent, Node::with_text(NodeKind::Space, " "));
            }
            tree.add_child(parent, Node::with_text(NodeKind::Str, word));
        }
    }

    fn metadata(tree: &mut Tree, pairs: &[(&str, &str)]) {
        let meta = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Metadata));
        for (key, value) in pairs {
            let k = tree.add_child(meta, Node::with_text(NodeKind::MetaKey, *key));
            tree.add_child(k, Node::with_text(NodeKind::MetaValue, *value));
        }
    }

    /// Text between `\begin_body` and the closing lines.
    fn body(out: &str) -> &str {
        let start = out.find("\\begin_body\n").map_or(0, |i| i + "\\begin_body\n".len());
        let end = out.rfind("\n\\end_body\n").unwrap_or(out.len());
        &out[start..end]
    }

    #[test]
    fn test_document_shell() {
        let mut tree = Tree::new();
        para(&mut tree, NodeId::ROOT, "Hello");

        let out = render(&mut tree);
        assert!(out.starts_with(
            "#LyX File created by multimarkdown\n\\lyxformat 413\n\\begin_document\n\\begin_header\n\
             \\textclass memoir\n\\begin_preamble\n\\usepackage{listings}\n"
        ));
        assert!(out.contains("\\newref{secti}{refcmd={Section \\ref{#1} \\vpageref{#1}}}\n"));
        assert!(out.contains(
            "\\end_preamble\n\\options refpage\n\\begin_modules\n\\end_modules\n\\bibtex_command default\n\
             \\cite_engine natbib_authoryear\n\\end_header\n\\begin_body\n"
        ));
        assert!(out.ends_with("\n\\begin_layout Standard\nHello\n\\end_layout\n\n\\end_body\n\\end_document\n"));
    }

    #[test]
    fn test_header_from_metadata() {
        let mut tree = Tree::new();
        metadata(
            &mut tree,
            &[
                ("Title", "On \"Things\""),
                ("LyX Headings", "Book, Part, Chapter"),
                ("Number Headings", "no"),
                ("Packages", "amsmath, graphicx"),
                ("Clean PDF", "yes"),
                ("BibTeX", "refs"),
            ],
        );

        let out = render(&mut tree);
        assert!(out.contains("\\usepackage{varioref}\n\\usepackage{amsmath}\n\\usepackage{graphicx}\n"));
        assert!(out.contains("\\newref{book}{refcmd={``\\nameref{#1}'' \\vpageref{#1}}}\n"));
        assert!(out.contains("\\options refpage,hidelinks\n"));
        assert!(out.contains(
            "\n\\begin_layout Title\nOn \n\\begin_inset Quotes erd\n\\end_inset\nThings\n\
             \\begin_inset Quotes erd\n\\end_inset\n\n\\end_layout\n"
        ));
        assert!(out.ends_with(
            "bibfiles \"refs\"\noptions \"plainnat\"\n\n\\end_inset\n\n\\end_layout\n\n\\end_body\n\\end_document\n"
        ));
    }

    #[test]
    fn test_heading_label_and_reference() {
        let mut tree = Tree::new();
        let h = tree.add_child(NodeId::ROOT, Node::new(NodeKind::H2));
        tree.add_child(h, Node::with_text(NodeKind::Str, "Intro"));
        let p = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
        let link = tree.add_child(
            p,
            Node::with_link(NodeKind::Link, LinkData::new(None, Some("#intro".into()), None, vec![])),
        );
        tree.add_child(link, Node::with_text(NodeKind::Str, "see"));

        assert_eq!(
            body(&render(&mut tree)),
            "\n\\begin_layout Chapter\nIntro\n\\begin_inset CommandInset label\nLatexCommand label\n\
             name \"chapt:intro\"\n\\end_inset\n\n\\end_layout\n\
             \n\\begin_layout Standard\nsee (\n\\begin_inset CommandInset ref\nLatexCommand formatted\n\
             reference \"chapt:intro\"\n\n\\end_inset\n)\n\\end_layout\n"
        );
    }

    #[test]
    fn test_abbreviation_expands_on_first_use() {
        let mut tree = Tree::new();
        let def = tree.add_child(NodeId::ROOT, Node::with_text(NodeKind::Abbreviation, "HTML"));
        words(&mut tree, def, "HyperText Markup Language");
        para(&mut tree, NodeId::ROOT, "Learn HyperText Markup Language today");
        para(&mut tree, NodeId::ROOT, "Use HyperText Markup Language");

        assert_eq!(
            body(&render(&mut tree)),
            format!(
                "\n\\begin_layout Standard\nLearn HyperText Markup Language (HTML)\n\
             \\begin_inset CommandInset nomenclature\nLatexCommand nomenclature\nsymbol \"HTML\"\n\
             description \"HyperText Markup Language\"\n\\end_inset\n today\n\\end_layout\n\
             \n\\begin_layout Standard\nUse HTML\n\\end_layout\n{NOMENCLATURE}"
            )
        );
    }

    #[test]
    fn test_footnote_inset() {
        let mut tree = Tree::new();
        let p = para(&mut tree, NodeId::ROOT, "Text");
        tree.add_child(p, Node::with_text(NodeKind::NoteReference, "n"));
        let source = tree.add_child(NodeId::ROOT, Node::with_text(NodeKind::NoteSource, "n"));
        para(&mut tree, source, "Note body.");

        assert_eq!(
            body(&render(&mut tree)),
            "\n\\begin_layout Standard\nText\n\\begin_inset Foot\nstatus collapsed\n\n\
             \n\\begin_layout Standard\nNote body.\n\\end_layout\n\n\n\\end_inset\n\n\\end_layout\n"
        );
    }

    #[test]
    fn test_glossary_reference_is_nomenclature() {
        let mut tree = Tree::new();
        let p = para(&mut tree, NodeId::ROOT, "See");
        tree.add_child(p, Node::with_text(NodeKind::NoteReference, "term"));
        let source = tree.add_child(NodeId::ROOT, Node::with_text(NodeKind::GlossarySource, "term"));
        let term = tree.add_child(source, Node::new(NodeKind::GlossaryTerm));
        tree.add_child(term, Node::with_text(NodeKind::Str, "Term"));
        para(&mut tree, source, "Meaning.");

        let out = render(&mut tree);
        assert!(out.contains(
            "See\n\\begin_inset CommandInset nomenclature\nLatexCommand nomenclature\nsymbol \"Term\"\n\
             description \"Meaning.\"\n\n\\end_inset\n"
        ));
        assert!(out.contains(NOMENCLATURE));
    }

    #[test]
    fn test_citation_and_bibliography() {
        let mut tree = Tree::new();
        let p = para(&mut tree, NodeId::ROOT, "See");
        let cite = tree.add_child(p, Node::with_link(NodeKind::Citation, LinkData::labeled("doe")));
        tree.add_child(cite, Node::with_text(NodeKind::Str, "p. 4"));
        let source = tree.add_child(NodeId::ROOT, Node::with_text(NodeKind::NoteSource, "doe"));
        para(&mut tree, source, "Doe, 2006.");
        tree.add_child(NodeId::ROOT, Node::new(NodeKind::Footer));

        let out = render(&mut tree);
        assert!(out.contains(
            "See\n\\begin_inset CommandInset citation\nLatexCommand cite\nafter \"p. 4\"\nkey \"doe\"\n\n\\end_inset\n"
        ));
        assert!(out.contains(
            "\n\\begin_layout Bibliography\n\\begin_inset CommandInset bibitem\nLatexCommand bibitem\n\
             key \"doe\"\nlabel \"doe\"\n\n\\end_inset\nDoe, 2006.\n\\end_layout\n"
        ));
    }

    #[test]
    fn test_undefined_citations_are_left_to_bibtex() {
        let mut tree = Tree::new();
        let p = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
        tree.add_child(p, Node::with_link(NodeKind::Citation, LinkData::labeled("smith;")));
        tree.add_child(p, Node::with_link(NodeKind::NoCitation, LinkData::labeled("[#lee]")));

        let out = render(&mut tree);
        assert!(out.contains("LatexCommand citet\nkey \"smith\"\n"));
        assert!(out.contains("LatexCommand nocite\nkey \"lee\"\n"));
        assert!(!out.contains("Bibliography"));
    }

    #[test]
    fn test_verbatim_listing() {
        let mut tree = Tree::new();
        let code = tree.add_child(NodeId::ROOT, Node::with_text(NodeKind::Verbatim, "a \\ b\n\"x\"\n"));
        tree.add_child(code, Node::with_text(NodeKind::VerbatimType, "Perl"));

        assert_eq!(
            body(&render(&mut tree)),
            "\\begin_layout Standard\n\\begin_inset listings\n\
             lstparams \"basicstyle={\\footnotesize\\ttfamily},language=Perl\"\ninline false\nstatus collapsed\n\
             \n\\begin_layout Plain Layout\n\na \n\\backslash\n\n b\n\\end_layout\n\n\\begin_layout Plain Layout\n\n\
             \"x\"\n\\end_layout\n\n\\end_inset\n\\end_layout\n"
        );
    }

    #[test]
    fn test_nested_lists_go_deeper() {
        let mut tree = Tree::new();
        let outer = tree.add_child(NodeId::ROOT, Node::new(NodeKind::BulletList));
        let item = tree.add_child(outer, Node::new(NodeKind::ListItem));
        let plain = tree.add_child(item, Node::new(NodeKind::Plain));
        tree.add_child(plain, Node::with_text(NodeKind::Str, "one"));
        let inner = tree.add_child(item, Node::new(NodeKind::OrderedList));
        let item = tree.add_child(inner, Node::new(NodeKind::ListItem));
        let plain = tree.add_child(item, Node::new(NodeKind::Plain));
        tree.add_child(plain, Node::with_text(NodeKind::Str, "two"));

        assert_eq!(
            body(&render(&mut tree)),
            "\n\\begin_layout Itemize\none\n\\end_layout\n\
             \n\\begin_deeper\n\n\\begin_layout Enumerate\ntwo\n\\end_layout\n\n\\end_deeper\n"
        );
    }

    #[test]
    fn test_definition_list() {
        let mut tree = Tree::new();
        let list = tree.add_child(NodeId::ROOT, Node::new(NodeKind::DefList));
        let term = tree.add_child(list, Node::new(NodeKind::Term));
        words(&mut tree, term, "Apple pie");
        let def = tree.add_child(list, Node::new(NodeKind::Definition));
        para(&mut tree, def, "Fruit.");

        assert_eq!(
            body(&render(&mut tree)),
            "\n\\begin_layout Labeling\n\\labelwidthstring 00.00.0000\n\n\\series bold\n\
             Apple\n\\begin_inset space ~\n\\end_inset\npie\n\\series default\n\n Fruit.\n\\end_layout\n"
        );
    }

    #[test]
    fn test_smart_quotes_by_language() {
        let mut tree = Tree::new();
        let p = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
        let quoted = tree.add_child(p, Node::new(NodeKind::DoubleQuoted));
        tree.add_child(quoted, Node::with_text(NodeKind::Str, "hi"));
        tree.add_child(p, Node::new(NodeKind::Ellipsis));

        assert_eq!(
            body(&render(&mut tree.clone())),
            "\n\\begin_layout Standard\n\n\\begin_inset Quotes eld\n\\end_inset\nhi\n\
             \\begin_inset Quotes erd\n\\end_inset\n\n\\SpecialChar \\ldots{}\n\n\\end_layout\n"
        );
        assert_eq!(
            body(&render_with(&mut tree, Extensions::NONE)),
            "\n\\begin_layout Standard\n\"hi\"...\n\\end_layout\n"
        );
        assert_eq!(lyx_quote(Quote::LeftDouble, Language::French), "«");
        assert_eq!(lyx_quote(Quote::RightSingle, Language::German), "`");
    }

    #[test]
    fn test_links_and_images() {
        let mut tree = Tree::new();
        let p = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
        let link = tree.add_child(
            p,
            Node::with_link(
                NodeKind::Link,
                LinkData::new(None, Some("http://x.org".into()), None, vec![]),
            ),
        );
        tree.add_child(link, Node::with_text(NodeKind::Str, "site"));
        tree.add_child(
            p,
            Node::with_link(
                NodeKind::Image,
                LinkData::new(
                    None,
                    Some("a.png".into()),
                    None,
                    vec![Attribute::new("width", "50%"), Attribute::new("height", "40")],
                ),
            ),
        );

        let out = render(&mut tree);
        assert!(out.contains(
            "\n\\begin_inset CommandInset href\nLatexCommand href\ntarget \"http://x.org\"\nname \"site\"\n\n\\end_inset\n\
             \n\\begin_inset Foot\nstatus collapsed\n\n\\begin_layout Plain Layout\n\n\\begin_inset CommandInset href\n"
        ));
        assert!(out.contains(
            "\n\\begin_inset Graphics\n\t filename a.png\n\tlyxscale 50\n\tscale 50\n\theight 40pt\n\n\\end_inset\n"
        ));
    }

    #[test]
    fn test_table() {
        let mut tree = Tree::new();
        let table = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Table));
        tree.add_child(table, Node::with_text(NodeKind::TableSeparator, "lr"));
        let body_node = tree.add_child(table, Node::new(NodeKind::TableBody));
        let row = tree.add_child(body_node, Node::new(NodeKind::TableRow));
        let cell = tree.add_child(row, Node::new(NodeKind::TableCell));
        tree.add_child(cell, Node::with_text(NodeKind::Str, "a"));
        let cell = tree.add_child(row, Node::new(NodeKind::TableCell));
        tree.add_child(cell, Node::with_text(NodeKind::Str, "b"));

        let out = render(&mut tree);
        assert!(out.contains("<lyxtabular version=\"3\" rows=\"1\" columns=\"2\">"));
        assert!(out.contains(
            "\n<column alignment=\"left\" valignment=\"top\" width=\"50col%\">\
             \n<column alignment=\"right\" valignment=\"top\" width=\"50col%\">"
        ));
        assert!(out.contains(
            "\n<row>\n<cell alignment=\"left\" valignment=\"top\" topline=\"true\" bottomline=\"true\" usebox=\"none\">\
             \n\\begin_inset Text\n\n\\begin_layout Plain Layout\na\n\\end_layout\n\n\n\\end_inset\n</cell>"
        ));
        assert!(out.contains("\n</row>\n</lyxtabular>\n\\end_inset\n\\end_layout\n"));
    }

    #[test]
    fn test_beamer_frames() {
        let mut tree = Tree::new();
        metadata(&mut tree, &[("LaTeX Mode", "beamer")]);
        let section = tree.add_child(NodeId::ROOT, Node::new(NodeKind::HeadingSection));
        let h = tree.add_child(section, Node::new(NodeKind::H3));
        tree.add_child(h, Node::with_text(NodeKind::Str, "Slide"));
        let list = tree.add_child(section, Node::new(NodeKind::BulletList));
        let item = tree.add_child(list, Node::new(NodeKind::ListItem));
        let plain = tree.add_child(item, Node::new(NodeKind::Plain));
        tree.add_child(plain, Node::with_text(NodeKind::Str, "point"));

        let out = render(&mut tree);
        assert!(out.contains("\\textclass beamer\n"));
        assert!(out.contains("\\usetheme{warsaw}\n\\setbeamercovered{transparent}\n"));
        assert_eq!(
            body(&out),
            "\n\\begin_layout Frame\n\\begin_inset Argument 4\nstatus open\n\n\\begin_layout Plain Layout\n\
             Slide\n\\begin_inset CommandInset label\nLatexCommand label\nname \"frame:slide\"\n\\end_inset\n\
             \n\\end_layout\n\n\\end_inset\n\n\\end_layout\n\n\\begin_deeper\n\
             \n\\begin_layout Itemize\n\n\\begin_inset Argument 1\nstatus open\n\n\\begin_layout Plain Layout\n+-\n\
             \\end_layout\n\n\\end_inset\npoint\n\\end_layout\n\
             \n\\end_deeper\n\\begin_layout Separator\n\\end_layout"
        );
    }

    #[test]
    fn test_escape_lyx() {
        assert_eq!(escape_lyx("a\\b"), "a\n\\backslash\n\nb");
        assert_eq!(escape_lyx("one\ntwo"), "one\n two");
        assert_eq!(escape_lyx("one \ntwo"), "one \ntwo");
        assert_eq!(ref_prefix("Subsection"), "subse");
    }
}
