//! Rich Text Format output.
//!
//! A small subset of RTF: paragraphs, headings, character styles, lists,
//! code in a fixed-pitch font, and footnotes as native `\footnote` groups.
//! Tables degrade to tab-separated rows.

use crate::error::Result;
use crate::label::trim_trailing_whitespace;
use crate::options::Extensions;
use crate::refs::Resolution;
use crate::tree::{NodeId, NodeKind};

use super::context::RenderContext;
use super::critic::split_substitution;
use super::html::is_external_citation;
use super::smart::Quote;

const PROLOGUE: &str = "{\\rtf1\\ansi\\deff0\n{\\fonttbl{\\f0\\fswiss Helvetica;}{\\f1\\fmodern Courier New;}}\n";

/// Font size in half-points for heading levels 1 to 6.
const HEADING_SIZES: [u8; 6] = [36, 32, 28, 26, 24, 24];

pub(crate) struct RtfRenderer<'a> {
    cx: RenderContext<'a>,
    /// Counter per nested ordered list.
    ordinals: Vec<Option<usize>>,
}

impl<'a> RtfRenderer<'a> {
    pub fn new(cx: RenderContext<'a>) -> Self {
        Self {
            cx,
            ordinals: Vec::new(),
        }
    }

    pub fn render(mut self) -> Result<String> {
        let snippet = self.cx.has(Extensions::SNIPPET);
        if !snippet {
            self.cx.push(PROLOGUE);
            self.push_info();
        }
        self.render_children(NodeId::ROOT);
        if !snippet {
            self.cx.push("}\n");
        }
        Ok(self.cx.into_output())
    }

    fn render_children(&mut self, parent: NodeId) {
        let mut cur = self.cx.first_child(parent);
        while let Some(id) = cur {
            self.render_node(id);
            cur = self.cx.tree.next_sibling(id);
        }
    }

    /// Document information group from title and author metadata.
    fn push_info(&mut self) {
        let title = self.cx.metavalue("title");
        let author = self.cx.metavalue("author");
        if title.is_none() && author.is_none() {
            return;
        }
        self.cx.push("{\\info");
        if let Some(title) = title {
            self.cx.push("{\\title ");
            self.push_rtf(&title);
            self.cx.push("}");
        }
        if let Some(author) = author {
            self.cx.push("{\\author ");
            self.push_rtf(&author);
            self.cx.push("}");
        }
        self.cx.push("}\n");
    }

    fn render_node(&mut self, id: NodeId) {
        let kind = self.cx.kind(id);
        match kind {
            NodeKind::Root
            | NodeKind::List
            | NodeKind::HeadingSection
            | NodeKind::BlockquoteMarker
            | NodeKind::Raw
            | NodeKind::DefList
            | NodeKind::TableHead
            | NodeKind::TableBody => self.render_children(id),
            NodeKind::NoType
            | NodeKind::Footer
            | NodeKind::Metadata
            | NodeKind::MetaKey
            | NodeKind::MetaValue
            | NodeKind::VerbatimType
            | NodeKind::AutoLabel
            | NodeKind::LinkReference
            | NodeKind::NoteSource
            | NodeKind::NoteLabel
            | NodeKind::GlossarySource
            | NodeKind::GlossarySortKey
            | NodeKind::GlossaryLabel
            | NodeKind::CitationSource
            | NodeKind::TableSeparator
            | NodeKind::TableLabel
            | NodeKind::CellSpan
            | NodeKind::Abbreviation
            | NodeKind::KeyCounter
            | NodeKind::Toc
            | NodeKind::Html
            | NodeKind::HtmlBlock
            | NodeKind::CriticComment => {}

            NodeKind::Str
            | NodeKind::Space
            | NodeKind::Abbr
            | NodeKind::AbbrStart
            | NodeKind::AbbrStop
            | NodeKind::MathSpan => {
                let text = self.cx.text(id);
                self.push_rtf(&text);
            }

            NodeKind::Para | NodeKind::Plain => {
                self.cx.push("\\pard ");
                self.render_children(id);
                self.cx.push("\\par\n");
            }
            NodeKind::HRule => self.cx.push("\\pard\\brdrb\\brdrs\\brdrw10\\brsp20 \\par\n"),
            NodeKind::Verbatim | NodeKind::VerbatimFence => {
                let mut code = self.cx.text(id);
                trim_trailing_whitespace(&mut code);
                self.cx.push("\\pard\\li720{\\f1 ");
                for (i, line) in code.lines().enumerate() {
                    if i > 0 {
                        self.cx.push("\\line\n");
                    }
                    self.push_rtf(line);
                }
                self.cx.push("}\\par\n");
            }
            NodeKind::H1
            | NodeKind::H2
            | NodeKind::H3
            | NodeKind::H4
            | NodeKind::H5
            | NodeKind::H6 => {
                let level = self.cx.heading_level(kind, 6);
                let size = HEADING_SIZES[level - 1];
                self.cx.push(&format!("\\pard\\sb240\\sa120{{\\b\\fs{size} "));
                let first = self.cx.first_child(id);
                let body = match first.filter(|&c| self.cx.kind(c) == NodeKind::AutoLabel) {
                    Some(label) => self.cx.tree.next_sibling(label),
                    None => first,
                };
                let mut cur = body;
                while let Some(child) = cur {
                    self.render_node(child);
                    cur = self.cx.tree.next_sibling(child);
                }
                self.cx.push("}\\par\n");
            }
            NodeKind::BulletList | NodeKind::OrderedList => {
                let ordinal = (kind == NodeKind::OrderedList).then_some(0);
                self.ordinals.push(ordinal);
                self.render_children(id);
                self.ordinals.pop();
            }
            NodeKind::ListItem => self.render_list_item(id),
            NodeKind::Blockquote => {
                self.cx.push("{\\li720 ");
                self.render_children(id);
                self.cx.push("}");
            }
            NodeKind::Term => {
                self.cx.push("\\pard{\\b ");
                self.render_children(id);
                self.cx.push("}\\par\n");
            }
            NodeKind::Definition => {
                self.cx.push("\\pard\\li720 ");
                self.render_children(id);
                self.cx.push("\\par\n");
            }

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
            NodeKind::LineBreak => self.cx.push("\\line\n"),
            NodeKind::Strong => self.group(id, "\\b"),
            NodeKind::Emph => self.group(id, "\\i"),
            NodeKind::Code => self.group_text(id, "\\f1"),
            NodeKind::Superscript => self.group_text(id, "\\super"),
            NodeKind::Subscript => self.group_text(id, "\\sub"),
            NodeKind::Variable => {
                let key = self.cx.text(id);
                let value = self.cx.metavalue(&key).unwrap_or_else(|| format!("[%{key}]"));
                self.push_rtf(&value);
            }

            NodeKind::Link => self.render_link(id),
            NodeKind::Image | NodeKind::ImageBlock => {
                // Images are not embedded; the alternate text stands in.
                self.render_children(id);
            }
            NodeKind::NoteReference => {
                let number = self.cx.notes.note_number_for_node(self.cx.tree, id);
                if let Some(source) = self.cx.notes.note(number).map(|note| note.source) {
                    self.cx.notes.register_reference(number);
                    self.push_footnote(source);
                }
            }
            NodeKind::Citation | NodeKind::NoCitation => self.render_citation(id, kind),
            NodeKind::GlossaryTerm => {
                self.cx.push("{\\b ");
                let term = self.cx.tree.raw_text_of_children(id);
                self.push_rtf(&term);
                self.cx.push(":} ");
            }

            NodeKind::Table => {
                self.render_children(id);
                self.cx.push("\\pard\\par\n");
            }
            NodeKind::TableCaption => {
                self.cx.push("\\pard{\\i ");
                self.render_children(id);
                self.cx.push("}\\par\n");
            }
            NodeKind::TableRow => {
                self.cx.table_column = 0;
                self.cx.push("\\pard ");
                self.render_children(id);
                self.cx.push("\\par\n");
            }
            NodeKind::TableCell => {
                if self.cx.table_column > 0 {
                    self.cx.push("\\tab ");
                }
                self.render_children(id);
                self.cx.table_column += 1;
            }

            NodeKind::CriticAddition | NodeKind::CriticHighlight => {
                if !self.cx.has(Extensions::CRITIC_REJECT) || kind == NodeKind::CriticHighlight {
                    let text = self.cx.text(id);
                    self.push_rtf(&text);
                }
            }
            NodeKind::CriticDeletion => {
                if self.cx.has(Extensions::CRITIC_REJECT) {
                    let text = self.cx.text(id);
                    self.push_rtf(&text);
                }
            }
            NodeKind::CriticSubstitution if self.cx.first_child(id).is_some() => {
                self.render_children(id);
            }
            NodeKind::CriticSubstitution => {
                let text = self.cx.text(id);
                let (old, new) = split_substitution(&text);
                let kept = if self.cx.has(Extensions::CRITIC_REJECT) { old } else { new };
                self.push_rtf(kept);
            }
        }
    }

    fn render_list_item(&mut self, id: NodeId) {
        let marker = match self.ordinals.last_mut() {
            Some(Some(n)) => {
                *n += 1;
                format!("{n}.")
            }
            _ => "\\bullet".to_string(),
        };
        let indent = 360 * self.ordinals.len().max(1);
        self.cx
            .push(&format!("\\pard\\li{indent}\\fi-360 {marker}\\tab "));

        // Item paragraphs run together inside one RTF paragraph.
        let blocks: Vec<NodeId> = self.cx.tree.children(id).collect();
        for block in blocks {
            match self.cx.kind(block) {
                NodeKind::Para | NodeKind::Plain => self.render_children(block),
                NodeKind::List => {
                    let inner: Vec<NodeId> = self.cx.tree.children(block).collect();
                    for node in inner {
                        match self.cx.kind(node) {
                            NodeKind::Para | NodeKind::Plain => self.render_children(node),
                            _ => {
                                self.cx.push("\\par\n");
                                self.render_node(node);
                            }
                        }
                    }
                }
                _ => {
                    self.cx.push("\\par\n");
                    self.render_node(block);
                }
            }
        }
        if !self.cx.out.ends_with("\\par\n") {
            self.cx.push("\\par\n");
        }
    }

    fn render_link(&mut self, id: NodeId) {
        match self.cx.resolve_link(id) {
            Resolution::Found(data) => {
                self.render_children(id);
                if let Some(source) = data.source.filter(|s| !s.starts_with('#')) {
                    self.cx.push(" (");
                    self.push_rtf(&source);
                    self.cx.push(")");
                }
            }
            Resolution::Missing(label) => {
                self.cx.push("[");
                self.render_children(id);
                self.cx.push("][");
                self.push_rtf(&label);
                self.cx.push("]");
            }
        }
    }

    fn render_citation(&mut self, id: NodeId, kind: NodeKind) {
        let label = self.cx.tree[id]
            .link
            .as_ref()
            .and_then(|link| link.label.clone())
            .unwrap_or_default();
        let number = if is_external_citation(&label) {
            0
        } else {
            self.cx.notes.note_number_for_label(&label)
        };
        let Some(source) = self.cx.notes.note(number).map(|note| note.source) else {
            if kind == NodeKind::Citation {
                self.cx.push("[");
                self.push_rtf(&label);
                self.cx.push("]");
            }
            return;
        };

        self.cx.notes.mark_citation(self.cx.tree, number);
        if self.cx.notes.register_reference(number) {
            self.push_footnote(source);
        } else {
            let cite = self.cx.notes.cite_count(number);
            self.cx.push(&format!("{{\\super {cite}}}"));
        }
    }

    /// Native footnote group with the note body as its text.
    fn push_footnote(&mut self, source: NodeId) {
        self.cx.push("{\\super\\chftn}{\\footnote\\pard\\plain{\\super\\chftn} ");
        self.cx.printing_notes = true;
        let blocks: Vec<NodeId> = self.cx.tree.children(source).collect();
        for (i, block) in blocks.into_iter().enumerate() {
            if i > 0 {
                self.cx.push("\\par ");
            }
            match self.cx.kind(block) {
                NodeKind::Para | NodeKind::Plain => self.render_children(block),
                _ => self.render_node(block),
            }
        }
        self.cx.printing_notes = false;
        self.cx.push("}");
    }

    fn push_quote(&mut self, quote: Quote) {
        if self.cx.has(Extensions::SMART) {
            let mark = quote.rtf(self.cx.language);
            self.cx.push(&mark);
        } else {
            self.cx.push(quote.ascii());
        }
    }

    fn group(&mut self, id: NodeId, control: &str) {
        self.cx.push(&format!("{{{control} "));
        self.render_children(id);
        self.cx.push("}");
    }

    fn group_text(&mut self, id: NodeId, control: &str) {
        let text = self.cx.text(id);
        self.cx.push(&format!("{{{control} "));
        self.push_rtf(&text);
        self.cx.push("}");
    }

    /// Escape RTF control characters; non-ASCII becomes `\uN?`.
    fn push_rtf(&mut self, text: &str) {
        for c in text.chars() {
            match c {
                '\\' | '{' | '}' => {
                    self.cx.push_char('\\');
                    self.cx.push_char(c);
                }
                '\n' => self.cx.push_char(' '),
                c if c.is_ascii() => self.cx.push_char(c),
                c => {
                    let mut units = [0u16; 2];
                    for unit in c.encode_utf16(&mut units) {
                        // RTF takes signed 16-bit values.
                        self.cx.push(&format!("\\u{}?", *unit as i16));
                    }
                }
            }
        }
    }
}
