//! Plain text output.
//!
//! Writes the original text of every node with no markup. Blocks are
//! separated by blank lines, list items and table rows by single newlines.

use crate::error::Result;
use crate::options::Extensions;
use crate::tree::{NodeId, NodeKind};

use super::context::RenderContext;
use super::smart::Quote;

pub(crate) struct TextRenderer<'a> {
    cx: RenderContext<'a>,
}

impl<'a> TextRenderer<'a> {
    pub fn new(cx: RenderContext<'a>) -> Self {
        Self { cx }
    }

    pub fn render(mut self) -> Result<String> {
        self.render_children(NodeId::ROOT);
        Ok(self.cx.into_output())
    }

    fn render_children(&mut self, parent: NodeId) {
        let children: Vec<NodeId> = self.cx.tree.children(parent).collect();
        for id in children {
            self.render_node(id);
        }
    }

    fn block(&mut self, id: NodeId, pad: usize) {
        self.cx.pad(pad);
        self.inline(id);
        self.cx.padded = 0;
    }

    /// A node's own text, or its children's.
    fn inline(&mut self, id: NodeId) {
        match self.cx.tree[id].text.clone() {
            Some(text) => self.cx.push(&text),
            None => self.render_children(id),
        }
    }

    fn render_node(&mut self, id: NodeId) {
        match self.cx.kind(id) {
            NodeKind::Metadata => {
                let keys: Vec<NodeId> = self.cx.tree.children(id).collect();
                for key in keys {
                    let name = self.cx.text(key);
                    let value = self
                        .cx
                        .first_child(key)
                        .map(|v| self.cx.tree.raw_text(v))
                        .unwrap_or_default();
                    self.cx.push(&format!("{name}:\t{}", value.trim_end()));
                    self.cx.padded = 0;
                    self.cx.pad(1);
                }
            }

            NodeKind::NoType
            | NodeKind::Footer
            | NodeKind::VerbatimType
            | NodeKind::MetaKey
            | NodeKind::MetaValue
            | NodeKind::AutoLabel
            | NodeKind::LinkReference
            | NodeKind::NoteReference
            | NodeKind::NoteSource
            | NodeKind::NoteLabel
            | NodeKind::GlossarySource
            | NodeKind::GlossaryTerm
            | NodeKind::GlossarySortKey
            | NodeKind::GlossaryLabel
            | NodeKind::CitationSource
            | NodeKind::NoCitation
            | NodeKind::TableSeparator
            | NodeKind::TableLabel
            | NodeKind::CellSpan
            | NodeKind::Abbreviation
            | NodeKind::KeyCounter
            | NodeKind::Toc
            | NodeKind::CriticDeletion
            | NodeKind::CriticComment => {}

            NodeKind::Para
            | NodeKind::H1
            | NodeKind::H2
            | NodeKind::H3
            | NodeKind::H4
            | NodeKind::H5
            | NodeKind::H6
            | NodeKind::Verbatim
            | NodeKind::VerbatimFence
            | NodeKind::HtmlBlock
            | NodeKind::TableCaption
            | NodeKind::ImageBlock => self.block(id, 2),
            NodeKind::Plain | NodeKind::ListItem | NodeKind::Term | NodeKind::Definition => {
                self.block(id, 1)
            }
            NodeKind::HRule => {
                self.cx.pad(2);
                self.cx.push("----");
                self.cx.padded = 0;
            }
            NodeKind::Table
            | NodeKind::BulletList
            | NodeKind::OrderedList
            | NodeKind::Blockquote
            | NodeKind::DefList => {
                self.cx.pad(2);
                self.render_children(id);
            }
            NodeKind::TableRow => {
                self.cx.pad(1);
                self.cx.table_column = 0;
                self.render_children(id);
                self.cx.padded = 0;
            }
            NodeKind::TableCell => {
                if self.cx.table_column > 0 {
                    self.cx.push("\t");
                }
                self.render_children(id);
                self.cx.table_column += 1;
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
            NodeKind::LineBreak => {
                self.cx.push("\n");
            }
            NodeKind::Variable => {
                let key = self.cx.text(id);
                if let Some(value) = self.cx.metavalue(&key) {
                    self.cx.push(&value);
                }
            }
            NodeKind::CriticSubstitution => {
                if self.cx.first_child(id).is_some() {
                    self.render_children(id);
                } else {
                    let text = self.cx.text(id);
                    let (_, new) = super::critic::split_substitution(&text);
                    self.cx.push(new);
                }
            }

            NodeKind::Root
            | NodeKind::List
            | NodeKind::Str
            | NodeKind::Space
            | NodeKind::HeadingSection
            | NodeKind::MathSpan
            | NodeKind::Strong
            | NodeKind::Emph
            | NodeKind::Code
            | NodeKind::Link
            | NodeKind::Image
            | NodeKind::Citation
            | NodeKind::BlockquoteMarker
            | NodeKind::Raw
            | NodeKind::Html
            | NodeKind::TableHead
            | NodeKind::TableBody
            | NodeKind::Superscript
            | NodeKind::Subscript
            | NodeKind::Abbr
            | NodeKind::AbbrStart
            | NodeKind::AbbrStop
            | NodeKind::CriticAddition
            | NodeKind::CriticHighlight => self.inline(id),
        }
    }

    fn push_quote(&mut self, quote: Quote) {
        if self.cx.has(Extensions::SMART) {
            let c = char::from_u32(quote.codepoint(self.cx.language)).unwrap_or('\'');
            self.cx.push_char(c);
        } else {
            self.cx.push(quote.ascii());
        }
    }
}
