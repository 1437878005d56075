//! HTML output.
//!
//! Walks the tree once, writing block and inline markup, then appends the
//! endnotes for every footnote, glossary entry and citation that was
//! referenced. A complete document shell is written when `COMPLETE` is set
//! or when the metadata asks for one.

use crate::abbr;
use crate::error::Result;
use crate::label::{key_from_string, label_from_string};
use crate::notes::NoteKind;
use crate::options::Extensions;
use crate::refs::Resolution;
use crate::tree::{LinkData, NodeId, NodeKind};

use super::context::{CellType, RenderContext};
use super::critic::split_substitution;
use super::smart::Quote;

/// Metadata keys that configure the export and never become `<meta>` tags.
const SILENT_KEYS: &[&str] = &[
    "baseheaderlevel",
    "xhtmlheaderlevel",
    "htmlheaderlevel",
    "latexheaderlevel",
    "odfheaderlevel",
    "quoteslanguage",
];

pub(crate) struct HtmlRenderer<'a> {
    cx: RenderContext<'a>,
}

impl<'a> HtmlRenderer<'a> {
    pub fn new(cx: RenderContext<'a>) -> Self {
        Self { cx }
    }

    /// Render the document, consuming the renderer.
    pub fn render(mut self) -> Result<String> {
        if self.cx.has(Extensions::COMPLETE) {
            self.push_doctype();
        }

        self.render_children(NodeId::ROOT);
        self.render_endnotes();

        if self.cx.has(Extensions::COMPLETE) {
            self.cx.pad(2);
            self.cx.push("</body>\n</html>");
        }
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

    fn push_doctype(&mut self) {
        self.cx.push("<!DOCTYPE html>\n");
        match self.cx.metavalue("lang") {
            Some(lang) => {
                self.cx.push("<html lang=\"");
                self.cx.push_html(&lang);
                self.cx.push("\">\n");
            }
            None => self.cx.push("<html>\n"),
        }
        self.cx.push("<head>\n\t<meta charset=\"utf-8\"/>\n");
    }

    fn close_head(&mut self) {
        if self.cx.has(Extensions::COMPLETE) && !self.cx.has(Extensions::HEAD_CLOSED) {
            self.cx.push("</head>\n<body>\n");
            self.cx.extensions.insert(Extensions::HEAD_CLOSED);
            self.cx.padded = 1;
        }
    }

    fn render_node(&mut self, id: NodeId) {
        let kind = self.cx.kind(id);
        if !matches!(kind, NodeKind::Footer | NodeKind::Metadata) {
            self.close_head();
        }

        match kind {
            NodeKind::Root
            | NodeKind::List
            | NodeKind::HeadingSection
            | NodeKind::BlockquoteMarker
            | NodeKind::Raw => self.render_children(id),
            NodeKind::NoType
            | NodeKind::Footer
            | NodeKind::VerbatimType
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
            | NodeKind::TableLabel
            | NodeKind::CellSpan
            | NodeKind::Abbreviation
            | NodeKind::KeyCounter => {}

            NodeKind::Str | NodeKind::AbbrStop => {
                let text = self.cx.text(id);
                self.cx.push_html(&text);
            }
            NodeKind::Space => {
                let text = self.cx.text(id);
                self.cx.push(&text);
            }
            NodeKind::Abbr | NodeKind::AbbrStart => self.render_abbreviation(id),

            NodeKind::Plain => {
                self.cx.pad(1);
                self.render_children(id);
                self.cx.padded = 0;
            }
            NodeKind::Para => self.render_para(id),
            NodeKind::HRule => {
                self.cx.pad(2);
                self.cx.push("<hr />");
                self.cx.padded = 0;
            }
            NodeKind::HtmlBlock => {
                self.cx.pad(2);
                let text = self.cx.text(id);
                self.cx.push(&text);
                self.cx.padded = 0;
            }
            NodeKind::Verbatim | NodeKind::VerbatimFence => self.render_verbatim(id),
            NodeKind::BulletList => self.render_list(id, "ul"),
            NodeKind::OrderedList => self.render_list(id, "ol"),
            NodeKind::ListItem => {
                self.cx.pad(1);
                self.cx.push("<li>");
                self.cx.padded = 2;
                self.render_children(id);
                self.cx.push("</li>");
                self.cx.padded = 0;
            }
            NodeKind::Metadata => self.render_metadata(id),
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
            NodeKind::LineBreak => self.cx.push("<br/>\n"),
            NodeKind::MathSpan => self.render_math(id),
            NodeKind::Strong => self.wrap(id, "strong"),
            NodeKind::Emph => self.wrap(id, "em"),
            NodeKind::Superscript => self.wrap_text(id, "sup"),
            NodeKind::Subscript => self.wrap_text(id, "sub"),
            NodeKind::Code => self.wrap_text(id, "code"),
            NodeKind::Html => {
                let text = self.cx.text(id);
                self.cx.push(&text);
            }
            NodeKind::Variable => {
                let key = self.cx.text(id);
                match self.cx.metavalue(&key) {
                    Some(value) => self.cx.push_html(&value),
                    None => {
                        self.cx.push("[%");
                        self.cx.push_html(&key);
                        self.cx.push("]");
                    }
                }
            }

            NodeKind::Link => self.render_link(id),
            NodeKind::Image | NodeKind::ImageBlock => self.render_image(id, kind),
            NodeKind::NoteReference => self.render_note_reference(id),
            NodeKind::Citation | NodeKind::NoCitation => self.render_citation(id, kind),
            NodeKind::GlossaryTerm => self.render_glossary_term(id),

            NodeKind::Blockquote => {
                self.cx.pad(2);
                self.cx.push("<blockquote>\n");
                self.cx.padded = 2;
                self.render_children(id);
                self.cx.pad(1);
                self.cx.push("</blockquote>");
                self.cx.padded = 0;
            }
            NodeKind::DefList => {
                self.cx.pad(2);
                self.cx.padded = 1;
                self.cx.push("<dl>\n");
                self.render_children(id);
                self.cx.push("</dl>");
                self.cx.padded = 0;
            }
            NodeKind::Term => {
                self.cx.pad(1);
                self.cx.push("<dt>");
                self.render_children(id);
                self.cx.push("</dt>\n");
                self.cx.padded = 1;
            }
            NodeKind::Definition => {
                self.cx.pad(1);
                self.cx.padded = 1;
                self.cx.push("<dd>");
                self.render_children(id);
                self.cx.push("</dd>\n");
                self.cx.padded = 0;
            }

            NodeKind::Table => {
                self.cx.pad(2);
                self.cx.push("<table>\n");
                self.render_children(id);
                self.cx.push("</table>\n");
                self.cx.padded = 1;
            }
            NodeKind::TableSeparator => self.cx.table_alignment = self.cx.text(id),
            NodeKind::TableCaption => self.render_table_caption(id),
            NodeKind::TableHead => self.render_table_head(id),
            NodeKind::TableBody => {
                self.cx.push("\n<tbody>\n");
                self.render_children(id);
                self.cx.push("</tbody>\n");
            }
            NodeKind::TableRow => {
                self.cx.push("<tr>\n");
                self.cx.table_column = 0;
                self.render_children(id);
                self.cx.push("</tr>\n");
            }
            NodeKind::TableCell => self.render_table_cell(id),

            NodeKind::Toc => self.render_toc(),

            NodeKind::CriticAddition => {
                if !self.cx.has(Extensions::CRITIC_REJECT) {
                    self.critic_span(id, "ins", true);
                }
            }
            NodeKind::CriticDeletion => {
                if !self.cx.has(Extensions::CRITIC_ACCEPT) {
                    self.critic_span(id, "del", true);
                }
            }
            NodeKind::CriticHighlight => self.critic_span(id, "mark", true),
            NodeKind::CriticComment => {
                if !self.critic_resolved() {
                    let text = self.cx.text(id);
                    self.cx.push("<span class=\"critic comment\">");
                    self.cx.push_html(&text);
                    self.cx.push("</span>");
                }
            }
            NodeKind::CriticSubstitution if self.cx.first_child(id).is_some() => {
                self.render_children(id);
            }
            NodeKind::CriticSubstitution => {
                let text = self.cx.text(id);
                let (old, new) = split_substitution(&text);
                if !self.cx.has(Extensions::CRITIC_ACCEPT) {
                    self.tagged(old, "del", !self.critic_resolved());
                }
                if !self.cx.has(Extensions::CRITIC_REJECT) {
                    self.tagged(new, "ins", !self.critic_resolved());
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------------

    fn render_para(&mut self, id: NodeId) {
        self.cx.pad(2);
        self.cx.push("<p>");
        self.render_children(id);
        if self.cx.footnote_para_counter > 0 {
            self.cx.footnote_para_counter -= 1;
            if self.cx.footnote_para_counter == 0 {
                self.push_backlink();
            }
        }
        self.cx.push("</p>");
        self.cx.padded = 0;
    }

    fn push_backlink(&mut self) {
        if self.cx.footnote_to_print == 0 {
            return;
        }
        let target = self.cx.footnote_to_print;
        self.cx.push(&format!(
            " <a href=\"#fnref:{target}\" title=\"return to article\" class=\"reversefootnote\">&#160;&#8617;</a>"
        ));
        self.cx.footnote_to_print = 0;
    }

    fn render_verbatim(&mut self, id: NodeId) {
        self.cx.pad(2);
        let language = self
            .cx
            .tree
            .children(id)
            .find(|&c| self.cx.kind(c) == NodeKind::VerbatimType)
            .map(|c| self.cx.text(c));
        match language {
            Some(language) => {
                self.cx.push("<pre><code class=\"");
                self.cx.push_html(&language);
                self.cx.push("\">");
            }
            None => self.cx.push("<pre><code>"),
        }
        let code = self.cx.text(id);
        self.cx.push_html(&code);
        self.cx.push("</code></pre>");
        self.cx.padded = 0;
    }

    fn render_list(&mut self, id: NodeId, tag: &str) {
        self.cx.pad(2);
        self.cx.push(&format!("<{tag}>"));
        self.cx.padded = 0;
        self.render_children(id);
        self.cx.pad(1);
        self.cx.push(&format!("</{tag}>"));
        self.cx.padded = 0;
    }

    fn render_heading(&mut self, id: NodeId, kind: NodeKind) {
        let level = self.cx.heading_level(kind, 6);
        self.cx.pad(2);

        let first = self.cx.first_child(id);
        let explicit = first.filter(|&c| self.cx.kind(c) == NodeKind::AutoLabel);
        let body = match explicit {
            Some(label) => self.cx.next_after(label),
            None => first,
        };

        match self.heading_id(id) {
            Some(label) => {
                self.cx.push(&format!("<h{level} id=\""));
                self.cx.push_html(&label);
                self.cx.push("\">");
            }
            None => self.cx.push(&format!("<h{level}>")),
        }
        self.render_from(body);
        self.cx.push(&format!("</h{level}>"));
        self.cx.padded = 0;
    }

    /// The `id` a heading is written with, if any.
    fn heading_id(&self, id: NodeId) -> Option<String> {
        if self.cx.has(Extensions::COMPATIBILITY) {
            return None;
        }
        let first = self.cx.first_child(id);
        if let Some(label) = first.filter(|&c| self.cx.kind(c) == NodeKind::AutoLabel) {
            return Some(label_from_string(self.cx.tree[label].text()));
        }
        if self.cx.has(Extensions::NO_LABELS) {
            return None;
        }
        Some(self.cx.tree.label_of_children(id))
    }

    fn render_metadata(&mut self, id: NodeId) {
        if !self.cx.has(Extensions::COMPLETE)
            && !self.cx.has(Extensions::SNIPPET)
            && self.needs_complete_document()
        {
            self.push_doctype();
            self.cx.extensions.insert(Extensions::COMPLETE);
        }

        let keys: Vec<NodeId> = self.cx.tree.children(id).collect();
        for key in keys {
            self.render_meta_key(key);
        }

        if self.cx.has(Extensions::COMPLETE) && !self.cx.has(Extensions::HEAD_CLOSED) {
            self.cx.push("</head>\n<body>\n");
            self.cx.extensions.insert(Extensions::HEAD_CLOSED);
            self.cx.padded = 1;
        }
    }

    /// Any metadata key other than the export settings asks for a full page.
    fn needs_complete_document(&self) -> bool {
        self.cx
            .tree
            .metadata_keys()
            .iter()
            .any(|key| !SILENT_KEYS.contains(&key.as_str()))
    }

    fn render_meta_key(&mut self, key: NodeId) {
        if !self.cx.has(Extensions::COMPLETE) {
            return;
        }
        let name = key_from_string(self.cx.tree[key].text());
        let value = self.cx.metavalue(&name).unwrap_or_default();
        match name.as_str() {
            "title" => {
                self.cx.push("\t<title>");
                self.cx.push_html(&value);
                self.cx.push("</title>\n");
            }
            "css" => {
                self.cx.push("\t<link type=\"text/css\" rel=\"stylesheet\" href=\"");
                self.cx.push_html(&value);
                self.cx.push("\"/>\n");
            }
            "xhtmlheader" | "htmlheader" => {
                self.cx.push(&value);
                self.cx.push("\n");
            }
            "mmdfooter" | "mmdheader" | "lang" | "latexmode" | "transcludebase" => {}
            other if SILENT_KEYS.contains(&other) => {}
            other => {
                self.cx.push(&format!("\t<meta name=\"{other}\" content=\""));
                self.cx.push_html(&value);
                self.cx.push("\"/>\n");
            }
        }
    }

    // ------------------------------------------------------------------------
    // Inline
    // ------------------------------------------------------------------------

    fn push_quote(&mut self, quote: Quote) {
        if self.cx.has(Extensions::SMART) {
            let entity = quote.entity(self.cx.language);
            self.cx.push(&entity);
        } else {
            self.cx.push(quote.ascii());
        }
    }

    fn wrap(&mut self, id: NodeId, tag: &str) {
        self.cx.push(&format!("<{tag}>"));
        self.render_children(id);
        self.cx.push(&format!("</{tag}>"));
    }

    fn wrap_text(&mut self, id: NodeId, tag: &str) {
        let text = self.cx.text(id);
        self.tagged(&text, tag, true);
    }

    fn tagged(&mut self, text: &str, tag: &str, markup: bool) {
        if markup {
            self.cx.push(&format!("<{tag}>"));
        }
        self.cx.push_html(text);
        if markup {
            self.cx.push(&format!("</{tag}>"));
        }
    }

    fn render_math(&mut self, id: NodeId) {
        let text = self.cx.text(id);
        self.cx.push("<span class=\"math\">");
        let (open, inner, close) = split_math(&text);
        self.cx.push(open);
        self.cx.push_html(inner);
        self.cx.push(close);
        self.cx.push("</span>");
    }

    fn render_abbreviation(&mut self, id: NodeId) {
        match abbr::abbreviation_text(self.cx.tree, id) {
            Some((name, expansion)) => {
                self.cx.push("<abbr title=\"");
                self.cx.push_html(&expansion);
                self.cx.push("\">");
                self.cx.push_html(&name);
                self.cx.push("</abbr>");
            }
            None => {
                let text = self.cx.text(id);
                self.cx.push_html(&text);
            }
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
                    Some(text) => self.cx.push_html(&text),
                    None => {
                        self.cx.push("[");
                        self.cx.push_html(&label);
                        self.cx.push("]");
                    }
                }
                return;
            }
        };

        self.cx.push("<a");
        if let Some(source) = &data.source {
            self.cx.obfuscate = data.is_mailto();
            self.cx.push(" href=\"");
            self.cx.push_html(source);
            self.cx.push("\"");
        }
        if let Some(title) = data.title.as_deref().filter(|t| !t.is_empty()) {
            self.cx.push(" title=\"");
            self.cx.push_html(title);
            self.cx.push("\"");
        }
        self.push_attributes(&data);
        self.cx.push(">");
        self.render_children(id);
        self.cx.push("</a>");
        self.cx.obfuscate = false;
    }

    fn push_attributes(&mut self, data: &LinkData) {
        for attr in &data.attr {
            if attr.key == "width" || attr.key == "height" {
                continue;
            }
            self.cx.push(&format!(" {}=\"", attr.key));
            self.cx.push_html(&attr.value);
            self.cx.push("\"");
        }
    }

    fn render_image(&mut self, id: NodeId, kind: NodeKind) {
        let block = kind == NodeKind::ImageBlock;
        if block {
            self.cx.pad(2);
        }

        let data = match self.cx.resolve_link(id) {
            Resolution::Found(data) => data,
            Resolution::Missing(label) => {
                self.cx.push("![");
                self.render_children(id);
                self.cx.push("][");
                self.cx.push_html(&label);
                self.cx.push("]");
                if block {
                    self.cx.padded = 0;
                }
                return;
            }
        };

        if block {
            self.cx.push("<figure>\n");
        }
        self.cx.push("<img");
        if let Some(source) = &data.source {
            self.cx.push(" src=\"");
            self.cx.push_html(source);
            self.cx.push("\"");
        }
        self.cx.push(" alt=\"");
        if self.cx.first_child(id).is_some() {
            let alt = self.cx.tree.raw_text_of_children(id);
            self.cx.push_html(&alt);
        } else if let Some(title) = &data.title {
            self.cx.push_html(title);
        }
        self.cx.push("\"");
        if !self.cx.has(Extensions::COMPATIBILITY)
            && let Some(label) = &data.label
        {
            self.cx.push(" id=\"");
            self.cx.push_html(label);
            self.cx.push("\"");
        }
        if let Some(title) = data.title.as_deref().filter(|t| !t.is_empty()) {
            self.cx.push(" title=\"");
            self.cx.push_html(title);
            self.cx.push("\"");
        }
        let height = data.attribute("height");
        let width = data.attribute("width");
        if height.is_some() || width.is_some() {
            self.cx.push(" style=\"");
            if let Some(height) = height {
                self.cx.push(&format!("height:{height};"));
            }
            if let Some(width) = width {
                self.cx.push(&format!("width:{width};"));
            }
            self.cx.push("\"");
        }
        self.push_attributes(&data);
        self.cx.push(" />");

        if block {
            if self.cx.first_child(id).is_some() {
                self.cx.push("\n<figcaption>");
                self.render_children(id);
                self.cx.push("</figcaption>");
            }
            self.cx.push("</figure>");
            self.cx.padded = 0;
        }
    }

    // ------------------------------------------------------------------------
    // Notes and citations
    // ------------------------------------------------------------------------

    fn render_note_reference(&mut self, id: NodeId) {
        let number = self.cx.notes.note_number_for_node(self.cx.tree, id);
        let Some(note_kind) = self.cx.notes.note(number).map(|note| note.kind) else {
            return;
        };
        let shown = self.cx.notes.display_number(number);
        let first = self.cx.notes.register_reference(number);

        self.cx.push(&format!("<a href=\"#fn:{shown}\""));
        if first {
            self.cx.push(&format!(" id=\"fnref:{shown}\""));
        }
        let class = if note_kind == NoteKind::Glossary {
            "footnote glossary"
        } else {
            "footnote"
        };
        self.cx
            .push(&format!(" title=\"see footnote\" class=\"{class}\">[{number}]"));
        self.cx.push("</a>");
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

        if number == 0 {
            let key = citation_key(&label).to_string();
            if kind == NodeKind::NoCitation {
                self.cx.push("<span class=\"notcited\" id=\"");
                self.cx.push_html(&key);
                self.cx.push("\"/>");
            } else {
                self.cx.push("<span class=\"externalcitation\">[");
                if self.cx.first_child(id).is_some() {
                    self.render_children(id);
                    self.cx.push("][");
                }
                self.cx.push("#");
                self.cx.push_html(&key);
                self.cx.push("]</span>");
            }
            return;
        }

        self.cx.notes.mark_citation(self.cx.tree, number);
        self.cx.notes.register_reference(number);
        let shown = self.cx.notes.display_number(number);

        if kind == NodeKind::NoCitation {
            self.cx.push(&format!("<span class=\"notcited\" id=\"{shown}\">"));
        } else {
            self.cx.push(&format!(
                "<a class=\"citation\" href=\"#fn:{shown}\" title=\"Jump to citation\">["
            ));
            if self.cx.first_child(id).is_some() {
                self.cx.push("<span class=\"locator\">");
                self.render_children(id);
                self.cx.push(&format!("</span>, {number}]"));
            } else {
                self.cx.push(&format!("{number}]"));
            }
        }
        self.cx.push("<span class=\"citekey\" style=\"display:none\">");
        self.cx.push_html(&label);
        self.cx.push("</span>");
        if kind == NodeKind::NoCitation {
            self.cx.push("</span>");
        } else {
            self.cx.push("</a>");
        }
    }

    fn render_glossary_term(&mut self, id: NodeId) {
        let term = self.cx.tree.raw_text_of_children(id);
        self.cx.push("<span class=\"glossary name\">");
        self.cx.push_html(&term);
        self.cx.push("</span>");
        if let Some(sort) = self
            .cx
            .tree
            .next_sibling(id)
            .filter(|&s| self.cx.kind(s) == NodeKind::GlossarySortKey)
        {
            let sort = self.cx.text(sort);
            self.cx.push("<span class=\"glossary sort\" style=\"display:none\">");
            self.cx.push_html(&sort);
            self.cx.push("</span>");
        }
        self.cx.push(": ");
    }

    fn render_endnotes(&mut self) {
        if self.cx.notes.used_len() == 0 {
            return;
        }

        self.cx.pad(2);
        self.cx.push("<div class=\"footnotes\">\n<hr />\n<ol>");
        self.cx.padded = 0;
        self.cx.printing_notes = true;

        // Notes may reference notes not yet used, so the count can grow.
        let mut number = 1;
        while number <= self.cx.notes.used_len() {
            let Some(note) = self.cx.notes.note(number).cloned() else {
                break;
            };
            let shown = self.cx.notes.display_number(number);
            self.cx.pad(1);

            if note.kind == NoteKind::Citation {
                self.cx.push(&format!(
                    "<li id=\"fn:{shown}\" class=\"citation\"><span class=\"citekey\" style=\"display:none\">"
                ));
                self.cx.push_html(note.label.as_deref().unwrap_or_default());
                self.cx.push("</span>");
            } else {
                self.cx.push(&format!("<li id=\"fn:{shown}\">\n"));
            }
            self.cx.padded = 2;

            let paras = self.cx.tree.count_kind(note.source, NodeKind::Para);
            if note.kind == NoteKind::Citation {
                self.cx.footnote_to_print = 0;
                self.cx.footnote_para_counter = 0;
            } else {
                self.cx.footnote_to_print = shown;
                self.cx.footnote_para_counter = paras;
            }

            if paras == 0 {
                self.cx.push("<p>");
                self.render_children(note.source);
                self.push_backlink();
                self.cx.push("</p>");
                self.cx.padded = 0;
            } else {
                self.render_children(note.source);
            }

            self.cx.pad(1);
            self.cx.push("</li>");
            self.cx.padded = 0;
            number += 1;
        }

        self.cx.pad(1);
        self.cx.push("</ol>\n</div>\n");
        self.cx.padded = 1;
        self.cx.printing_notes = false;
    }

    // ------------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------------

    fn render_table_caption(&mut self, id: NodeId) {
        let first = self.cx.first_child(id);
        let explicit = first.filter(|&c| self.cx.kind(c) == NodeKind::TableLabel);
        let label = match explicit {
            Some(label) => label_from_string(self.cx.tree[label].text()),
            None => self.cx.tree.label_of_children(id),
        };
        self.cx.push("<caption id=\"");
        self.cx.push_html(&label);
        self.cx.push("\">");
        self.render_children(id);
        self.cx.push("</caption>\n");
    }

    fn render_table_head(&mut self, id: NodeId) {
        self.cx.push("<colgroup>\n");
        let alignment = self.cx.table_alignment.clone();
        for c in alignment.chars() {
            let col = match c {
                'r' => "<col style=\"text-align:right;\"/>\n",
                'R' => "<col style=\"text-align:right;\" class=\"extended\"/>\n",
                'c' => "<col style=\"text-align:center;\"/>\n",
                'C' => "<col style=\"text-align:center;\" class=\"extended\"/>\n",
                'L' => "<col style=\"text-align:left;\" class=\"extended\"/>\n",
                _ => "<col style=\"text-align:left;\"/>\n",
            };
            self.cx.push(col);
        }
        self.cx.push("</colgroup>\n");

        self.cx.cell_type = CellType::Head;
        self.cx.push("\n<thead>\n");
        self.render_children(id);
        self.cx.push("</thead>\n");
        self.cx.cell_type = CellType::Data;
    }

    fn render_table_cell(&mut self, id: NodeId) {
        let tag = match self.cx.cell_type {
            CellType::Head => "th",
            CellType::Data => "td",
        };
        let align = match self.cx.table_alignment.chars().nth(self.cx.table_column) {
            Some('r' | 'R') => "right",
            Some('c' | 'C') => "center",
            _ => "left",
        };
        self.cx.push(&format!("\t<{tag} style=\"text-align:{align};\""));

        let span = self
            .cx
            .first_child(id)
            .filter(|&c| self.cx.kind(c) == NodeKind::CellSpan)
            .map_or(1, |c| self.cx.tree[c].text().len() + 1);
        if span > 1 {
            self.cx.push(&format!(" colspan=\"{span}\""));
        }
        self.cx.push(">");
        self.cx.padded = 2;
        self.render_children(id);
        self.cx.push(&format!("</{tag}>\n"));
        self.cx.table_column += span;
    }

    // ------------------------------------------------------------------------
    // Table of contents and CriticMarkup
    // ------------------------------------------------------------------------

    fn render_toc(&mut self) {
        let headings = self.collect_headings(NodeId::ROOT);
        self.cx.pad(2);
        self.cx.push("<div class=\"TOC\">\n\n");

        let mut open: Vec<usize> = Vec::new();
        for (level, heading) in headings {
            while open.last().is_some_and(|&top| top > level) {
                self.cx.push("</li>\n</ul>\n");
                open.pop();
            }
            if open.last() == Some(&level) {
                self.cx.push("</li>\n");
            } else {
                self.cx.push("<ul>\n");
                open.push(level);
            }

            let text = self.heading_text(heading);
            match self.heading_id(heading) {
                Some(label) => {
                    self.cx.push("<li><a href=\"#");
                    self.cx.push_html(&label);
                    self.cx.push("\">");
                    self.cx.push_html(&text);
                    self.cx.push("</a>");
                }
                None => {
                    self.cx.push("<li>");
                    self.cx.push_html(&text);
                }
            }
        }
        while open.pop().is_some() {
            self.cx.push("</li>\n</ul>\n");
        }

        self.cx.push("</div>");
        self.cx.padded = 0;
    }

    /// Headings under `parent`, descending into heading sections.
    fn collect_headings(&self, parent: NodeId) -> Vec<(usize, NodeId)> {
        let mut out = Vec::new();
        for id in self.cx.tree.children(parent) {
            let kind = self.cx.kind(id);
            if let Some(level) = kind.heading_level() {
                out.push((usize::from(level), id));
            } else if kind == NodeKind::HeadingSection {
                out.extend(self.collect_headings(id));
            }
        }
        out
    }

    /// Plain text of a heading without its explicit label.
    fn heading_text(&self, id: NodeId) -> String {
        let first = self.cx.first_child(id);
        match first.filter(|&c| self.cx.kind(c) == NodeKind::AutoLabel) {
            Some(label) => self.cx.tree.raw_text_from(self.cx.tree.next_sibling(label)),
            None => self.cx.tree.raw_text_from(first),
        }
    }

    fn critic_resolved(&self) -> bool {
        self.cx.has(Extensions::CRITIC_ACCEPT) || self.cx.has(Extensions::CRITIC_REJECT)
    }

    fn critic_span(&mut self, id: NodeId, tag: &str, markup: bool) {
        let text = self.cx.text(id);
        let markup = markup && !self.critic_resolved();
        self.tagged(&text, tag, markup);
    }
}

/// Labels written as `[#key]` never resolve against local notes.
pub(crate) fn is_external_citation(label: &str) -> bool {
    label.starts_with("[#")
}

/// Citation key without the `[#`..`]` wrapping of external citations.
pub(crate) fn citation_key(label: &str) -> &str {
    let key = label.strip_prefix("[#").unwrap_or(label);
    let key = key.strip_prefix('#').unwrap_or(key);
    key.strip_suffix(']').unwrap_or(key)
}

/// Split a math span into MathJax delimiters and body.
///
/// `$..$` and `\\(..\\)` become inline math, `$$..$$` and `\\[..\\]`
/// display math; anything else passes through unchanged.
pub(crate) fn split_math(text: &str) -> (&'static str, &str, &'static str) {
    let display = text
        .strip_prefix("$$")
        .and_then(|t| t.strip_suffix("$$"))
        .or_else(|| text.strip_prefix("\\\\[").and_then(|t| t.strip_suffix("\\\\]")));
    if let Some(inner) = display {
        return ("\\[", inner, "\\]");
    }
    let inline = text
        .strip_prefix('$')
        .and_then(|t| t.strip_suffix('$'))
        .or_else(|| text.strip_prefix("\\\\(").and_then(|t| t.strip_suffix("\\\\)")));
    match inline {
        Some(inner) => ("\\(", inner, "\\)"),
        None => ("", text, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::NoteEngine;
    use crate::options::Format;
    use crate::refs::extract_references;
    use crate::tree::{Node, Tree};

    fn render(tree: &mut Tree, extensions: Extensions) -> String {
        let pools = extract_references(tree, extensions);
        let notes = NoteEngine::new(pools.notes.clone());
        let cx = RenderContext::new(tree, &pools, notes, Format::Html, extensions);
        HtmlRenderer::new(cx).render().unwrap()
    }

    fn para(tree: &mut Tree, text: &str) -> NodeId {
        let para = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
        tree.add_child(para, Node::with_text(NodeKind::Str, text));
        para
    }

    #[test]
    fn test_paragraph_escaping() {
        let mut tree = Tree::new();
        para(&mut tree, "a < b & c");
        assert_eq!(render(&mut tree, Extensions::DEFAULT), "<p>a &lt; b &amp; c</p>");
    }

    #[test]
    fn test_heading_ids() {
        let mut tree = Tree::new();
        let h = tree.add_child(NodeId::ROOT, Node::new(NodeKind::H2));
        tree.add_child(h, Node::with_text(NodeKind::Str, "My Heading"));
        assert_eq!(
            render(&mut tree.clone(), Extensions::DEFAULT),
            "<h2 id=\"my-heading\">My Heading</h2>"
        );
        assert_eq!(render(&mut tree, Extensions::NO_LABELS), "<h2>My Heading</h2>");
    }

    #[test]
    fn test_explicit_heading_label() {
        let mut tree = Tree::new();
        let h = tree.add_child(NodeId::ROOT, Node::new(NodeKind::H1));
        tree.add_child(h, Node::with_text(NodeKind::AutoLabel, "intro"));
        tree.add_child(h, Node::with_text(NodeKind::Str, "Introduction"));
        assert_eq!(
            render(&mut tree, Extensions::DEFAULT),
            "<h1 id=\"intro\">Introduction</h1>"
        );
    }

    #[test]
    fn test_smart_quotes() {
        let mut tree = Tree::new();
        let p = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
        let q = tree.add_child(p, Node::new(NodeKind::DoubleQuoted));
        tree.add_child(q, Node::with_text(NodeKind::Str, "hi"));
        assert_eq!(render(&mut tree.clone(), Extensions::DEFAULT), "<p>&#8220;hi&#8221;</p>");
        assert_eq!(render(&mut tree, Extensions::NOTES), "<p>\"hi\"</p>");
    }

    #[test]
    fn test_unresolved_link_falls_back_to_brackets() {
        let mut tree = Tree::new();
        let p = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
        let link = tree.add_child(
            p,
            Node::with_link(NodeKind::Link, LinkData::labeled("nowhere")),
        );
        tree.add_child(link, Node::with_text(NodeKind::Str, "text"));
        assert_eq!(render(&mut tree, Extensions::DEFAULT), "<p>[text][nowhere]</p>");
    }

    #[test]
    fn test_reference_link_resolves() {
        let mut tree = Tree::new();
        tree.add_child(
            NodeId::ROOT,
            Node::with_link(
                NodeKind::LinkReference,
                LinkData::new(Some("site".into()), Some("http://x.org".into()), Some("X".into()), vec![]),
            ),
        );
        let p = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
        let link = tree.add_child(p, Node::with_link(NodeKind::Link, LinkData::labeled("Site")));
        tree.add_child(link, Node::with_text(NodeKind::Str, "here"));
        assert_eq!(
            render(&mut tree, Extensions::DEFAULT),
            "<p><a href=\"http://x.org\" title=\"X\">here</a></p>"
        );
    }

    #[test]
    fn test_mailto_is_obfuscated() {
        let mut tree = Tree::new();
        let p = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
        tree.add_child(
            p,
            Node::with_link(
                NodeKind::Link,
                LinkData::new(None, Some("mailto:a@b.c".into()), None, vec![]),
            ),
        );
        let out = render(&mut tree, Extensions::DEFAULT);
        assert!(!out.contains("mailto"));
        assert!(out.starts_with("<p><a href=\"&#"));
    }

    #[test]
    fn test_table_alignment_and_span() {
        let mut tree = Tree::new();
        let table = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Table));
        tree.add_child(table, Node::with_text(NodeKind::TableSeparator, "lr"));
        let head = tree.add_child(table, Node::new(NodeKind::TableHead));
        let row = tree.add_child(head, Node::new(NodeKind::TableRow));
        let cell = tree.add_child(row, Node::new(NodeKind::TableCell));
        tree.add_child(cell, Node::with_text(NodeKind::CellSpan, "|"));
        tree.add_child(cell, Node::with_text(NodeKind::Str, "wide"));
        let body = tree.add_child(table, Node::new(NodeKind::TableBody));
        let row = tree.add_child(body, Node::new(NodeKind::TableRow));
        let cell = tree.add_child(row, Node::new(NodeKind::TableCell));
        tree.add_child(cell, Node::with_text(NodeKind::Str, "a"));
        let cell = tree.add_child(row, Node::new(NodeKind::TableCell));
        tree.add_child(cell, Node::with_text(NodeKind::Str, "b"));

        let out = render(&mut tree, Extensions::DEFAULT);
        assert!(out.contains("<col style=\"text-align:right;\"/>"));
        assert!(out.contains("<th style=\"text-align:left;\" colspan=\"2\">wide</th>"));
        assert!(out.contains("<td style=\"text-align:right;\">b</td>"));
    }

    #[test]
    fn test_math_delimiters() {
        assert_eq!(split_math("$x$"), ("\\(", "x", "\\)"));
        assert_eq!(split_math("$$x$$"), ("\\[", "x", "\\]"));
        assert_eq!(split_math("\\\\[x\\\\]"), ("\\[", "x", "\\]"));
        assert_eq!(split_math("x"), ("", "x", ""));
    }

    #[test]
    fn test_citation_key() {
        assert_eq!(citation_key("[#Doe:2006]"), "Doe:2006");
        assert_eq!(citation_key("Doe:2006"), "Doe:2006");
        assert!(is_external_citation("[#x]"));
        assert!(!is_external_citation("x"));
    }

    #[test]
    fn test_complete_document_from_metadata() {
        let mut tree = Tree::new();
        let meta = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Metadata));
        let key = tree.add_child(meta, Node::with_text(NodeKind::MetaKey, "Title"));
        tree.add_child(key, Node::with_text(NodeKind::MetaValue, "Doc"));
        para(&mut tree, "x");

        let out = render(&mut tree.clone(), Extensions::DEFAULT);
        assert!(out.starts_with("<!DOCTYPE html>\n<html>\n<head>"));
        assert!(out.contains("\t<title>Doc</title>\n</head>\n<body>\n"));
        assert!(out.ends_with("</body>\n</html>"));

        let snippet = render(&mut tree, Extensions::DEFAULT | Extensions::SNIPPET);
        assert_eq!(snippet, "<p>x</p>");
    }
}
