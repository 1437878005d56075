//! OpenDocument text output, as a single flat XML document (`.fodt`).
//!
//! Footnotes and glossary entries are written inline as `text:note`
//! elements where they are referenced; cited sources become endnotes on
//! first use and note references after that.

use quick_xml::escape::escape;

use crate::error::Result;
use crate::label::{key_from_string, label_from_string};
use crate::notes::NoteKind;
use crate::options::Extensions;
use crate::refs::Resolution;
use crate::tree::{NodeId, NodeKind};

use super::context::{CellType, ParaStyle, RenderContext};
use super::critic::split_substitution;
use super::html::{is_external_citation, split_math};
use super::smart::Quote;

/// Metadata keys that configure the export rather than describe the document.
const SKIPPED_KEYS: &[&str] = &[
    "css",
    "xhtmlheader",
    "htmlheader",
    "mmdfooter",
    "mmdheader",
    "baseheaderlevel",
    "odfheaderlevel",
    "htmlheaderlevel",
    "xhtmlheaderlevel",
    "latexheaderlevel",
    "latexinput",
    "latexfooter",
    "latexmode",
    "quoteslanguage",
    "lang",
    "transcludebase",
    "odfheader",
];

const DOCUMENT_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0"
     xmlns:style="urn:oasis:names:tc:opendocument:xmlns:style:1.0"
     xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0"
     xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0"
     xmlns:draw="urn:oasis:names:tc:opendocument:xmlns:drawing:1.0"
     xmlns:fo="urn:oasis:names:tc:opendocument:xmlns:xsl-fo-compatible:1.0"
     xmlns:xlink="http://www.w3.org/1999/xlink"
     xmlns:dc="http://purl.org/dc/elements/1.1/"
     xmlns:meta="urn:oasis:names:tc:opendocument:xmlns:meta:1.0"
     xmlns:number="urn:oasis:names:tc:opendocument:xmlns:datastyle:1.0"
     xmlns:svg="urn:oasis:names:tc:opendocument:xmlns:svg-compatible:1.0"
     xmlns:math="http://www.w3.org/1998/Math/MathML"
     xmlns:ooow="http://openoffice.org/2004/writer"
     xmlns:of="urn:oasis:names:tc:opendocument:xmlns:of:1.2"
     office:version="1.2"
     office:mimetype="application/vnd.oasis.opendocument.text">
<office:font-face-decls>
   <style:font-face style:name="Courier New" svg:font-family="'Courier New'"
                    style:font-adornments="Regular"
                    style:font-family-generic="modern"
                    style:font-pitch="fixed"/>
</office:font-face-decls>
<office:styles>
<style:style style:name="Standard" style:family="paragraph" style:class="text">
      <style:paragraph-properties fo:margin-top="0in" fo:margin-bottom="0.15in"
         fo:text-align="justify" style:justify-single-word="false"/>
   </style:style>
<style:style style:name="Preformatted_20_Text" style:display-name="Preformatted Text"
             style:family="paragraph"
             style:parent-style-name="Standard"
             style:class="html">
   <style:paragraph-properties fo:margin-top="0in" fo:margin-bottom="0in" fo:text-align="start"
                               style:justify-single-word="false"/>
   <style:text-properties style:font-name="Courier New" fo:font-size="11pt"/>
</style:style>
<style:style style:name="Source_20_Text" style:display-name="Source Text"
             style:family="text">
   <style:text-properties style:font-name="Courier New" fo:font-size="11pt"/>
</style:style>
<style:style style:name="List" style:family="paragraph"
             style:parent-style-name="Standard"
             style:class="list">
   <style:paragraph-properties fo:text-align="start" style:justify-single-word="false"/>
</style:style>
<style:style style:name="Quotations" style:family="paragraph"
             style:parent-style-name="Standard"
             style:class="html">
   <style:paragraph-properties fo:margin-left="0.3937in" fo:margin-right="0.3937in" fo:margin-top="0in"
                               fo:margin-bottom="0.1965in"
                               fo:text-align="justify"
                               style:justify-single-word="false"
                               fo:text-indent="0in"
                               style:auto-text-indent="false"/>
</style:style>
<style:style style:name="Table_20_Heading" style:display-name="Table Heading"
             style:family="paragraph"
             style:parent-style-name="Table_20_Contents"
             style:class="extra">
   <style:paragraph-properties fo:text-align="center" style:justify-single-word="false"/>
   <style:text-properties fo:font-weight="bold"/>
</style:style>
<style:style style:name="Horizontal_20_Line" style:display-name="Horizontal Line"
             style:family="paragraph"
             style:parent-style-name="Standard"
             style:class="html">
   <style:paragraph-properties fo:margin-top="0in" fo:margin-bottom="0.1965in"
                               style:border-line-width-bottom="0.0008in 0.0138in 0.0008in"
                               fo:padding="0in"
                               fo:border-left="none"
                               fo:border-right="none"
                               fo:border-top="none"
                               fo:border-bottom="0.0154in double #808080"/>
</style:style>
<style:style style:name="Footnote" style:family="paragraph"
             style:parent-style-name="Standard" style:class="extra">
   <style:paragraph-properties fo:margin-left="0.1965in" fo:margin-right="0in" fo:text-indent="-0.1965in"/>
   <style:text-properties fo:font-size="10pt"/>
</style:style>
<style:style style:name="Glossary" style:family="paragraph"
             style:parent-style-name="Footnote" style:class="extra">
   <style:text-properties fo:font-weight="bold"/>
</style:style>
<style:style style:name="Footnote_20_anchor" style:display-name="Footnote anchor"
             style:family="text">
   <style:text-properties style:text-position="super 58%"/>
</style:style>
<text:notes-configuration text:note-class="footnote" text:default-style-name="Footnote" text:citation-body-style-name="Footnote_20_anchor" style:num-format="a" text:start-value="0" text:footnotes-position="page" text:start-numbering-at="page"/>
<text:notes-configuration text:note-class="endnote" style:num-format="1" text:start-value="0"/>
</office:styles>
<office:automatic-styles>
<style:style style:name="MMD-Italic" style:family="text">
   <style:text-properties fo:font-style="italic" style:font-style-asian="italic"
                          style:font-style-complex="italic"/>
</style:style>
<style:style style:name="MMD-Bold" style:family="text">
   <style:text-properties fo:font-weight="bold" style:font-weight-asian="bold"
                          style:font-weight-complex="bold"/>
</style:style>
<style:style style:name="MMD-Superscript" style:family="text">
   <style:text-properties style:text-position="super 58%"/>
</style:style>
<style:style style:name="MMD-Subscript" style:family="text">
   <style:text-properties style:text-position="sub 58%"/>
</style:style>
<style:style style:name="MMD-Table" style:family="paragraph" style:parent-style-name="Standard">
   <style:paragraph-properties fo:margin-top="0in" fo:margin-bottom="0.05in"/>
</style:style>
<style:style style:name="MMD-Table-Center" style:family="paragraph" style:parent-style-name="MMD-Table">
   <style:paragraph-properties fo:text-align="center" style:justify-single-word="false"/>
</style:style>
<style:style style:name="MMD-Table-Right" style:family="paragraph" style:parent-style-name="MMD-Table">
   <style:paragraph-properties fo:text-align="right" style:justify-single-word="false"/>
</style:style>
<style:style style:name="P1" style:family="paragraph" style:parent-style-name="Standard"
             style:list-style-name="L1"/>
<style:style style:name="P2" style:family="paragraph" style:parent-style-name="Standard"
             style:list-style-name="L2">
   <style:paragraph-properties fo:text-align="start" style:justify-single-word="false"/>
</style:style>
<style:style style:name="fr1" style:family="graphic" style:parent-style-name="Frame">
   <style:graphic-properties style:print-content="false" style:vertical-pos="top"
                             style:vertical-rel="baseline"
                             fo:padding="0in"
                             fo:border="none"
                             style:shadow="none"/>
</style:style>
<text:list-style style:name="L1">
   <text:list-level-style-bullet text:level="1" text:bullet-char="•">
      <style:list-level-properties text:list-level-position-and-space-mode="label-alignment">
         <style:list-level-label-alignment text:label-followed-by="listtab" text:list-tab-stop-position="0.5in" fo:text-indent="-0.25in" fo:margin-left="0.5in"/>
      </style:list-level-properties>
   </text:list-level-style-bullet>
   <text:list-level-style-bullet text:level="2" text:bullet-char="◦">
      <style:list-level-properties text:list-level-position-and-space-mode="label-alignment">
         <style:list-level-label-alignment text:label-followed-by="listtab" text:list-tab-stop-position="0.75in" fo:text-indent="-0.25in" fo:margin-left="0.75in"/>
      </style:list-level-properties>
   </text:list-level-style-bullet>
   <text:list-level-style-bullet text:level="3" text:bullet-char="▪">
      <style:list-level-properties text:list-level-position-and-space-mode="label-alignment">
         <style:list-level-label-alignment text:label-followed-by="listtab" text:list-tab-stop-position="1in" fo:text-indent="-0.25in" fo:margin-left="1in"/>
      </style:list-level-properties>
   </text:list-level-style-bullet>
</text:list-style>
<text:list-style style:name="L2">
   <text:list-level-style-number text:level="1" text:style-name="Standard" style:num-suffix="." style:num-format="1">
      <style:list-level-properties text:list-level-position-and-space-mode="label-alignment">
         <style:list-level-label-alignment text:label-followed-by="listtab" text:list-tab-stop-position="0.5in" fo:text-indent="-0.25in" fo:margin-left="0.5in"/>
      </style:list-level-properties>
   </text:list-level-style-number>
   <text:list-level-style-number text:level="2" text:style-name="Standard" style:num-suffix="." style:num-format="1">
      <style:list-level-properties text:list-level-position-and-space-mode="label-alignment">
         <style:list-level-label-alignment text:label-followed-by="listtab" text:list-tab-stop-position="0.75in" fo:text-indent="-0.25in" fo:margin-left="0.75in"/>
      </style:list-level-properties>
   </text:list-level-style-number>
   <text:list-level-style-number text:level="3" text:style-name="Standard" style:num-suffix="." style:num-format="1">
      <style:list-level-properties text:list-level-position-and-space-mode="label-alignment">
         <style:list-level-label-alignment text:label-followed-by="listtab" text:list-tab-stop-position="1in" fo:text-indent="-0.25in" fo:margin-left="1in"/>
      </style:list-level-properties>
   </text:list-level-style-number>
</text:list-style>
</office:automatic-styles>
"#;

const BODY_OPEN: &str = "<office:body>\n<office:text>\n";
const DOCUMENT_FOOTER: &str = "</office:text>\n</office:body>\n</office:document>";

pub(crate) struct OdfRenderer<'a> {
    cx: RenderContext<'a>,
}

impl<'a> OdfRenderer<'a> {
    pub fn new(cx: RenderContext<'a>) -> Self {
        Self { cx }
    }

    pub fn render(mut self) -> Result<String> {
        self.cx.push(DOCUMENT_HEADER);
        self.render_children(NodeId::ROOT);
        self.open_body();
        self.cx.pad(1);
        self.cx.push(DOCUMENT_FOOTER);
        Ok(self.cx.into_output())
    }

    fn render_children(&mut self, parent: NodeId) {
        let mut cur = self.cx.first_child(parent);
        while let Some(id) = cur {
            self.render_node(id);
            cur = self.cx.tree.next_sibling(id);
        }
    }

    /// Start the text body once, before the first node that is not metadata.
    fn open_body(&mut self) {
        if !self.cx.has(Extensions::HEAD_CLOSED) {
            self.cx.push(BODY_OPEN);
            self.cx.extensions.insert(Extensions::HEAD_CLOSED);
            self.cx.padded = 2;
        }
    }

    fn render_node(&mut self, id: NodeId) {
        let kind = self.cx.kind(id);
        if !matches!(kind, NodeKind::Metadata | NodeKind::Footer) {
            self.open_body();
        }

        match kind {
            NodeKind::Root
            | NodeKind::List
            | NodeKind::HeadingSection
            | NodeKind::BlockquoteMarker
            | NodeKind::DefList
            | NodeKind::Raw
            | NodeKind::Toc => self.render_children(id),
            NodeKind::NoType
            | NodeKind::Footer
            | NodeKind::VerbatimType
            | NodeKind::MetaKey
            | NodeKind::MetaValue
            | NodeKind::AutoLabel
            | NodeKind::LinkReference
            | NodeKind::NoteLabel
            | NodeKind::GlossarySortKey
            | NodeKind::GlossaryLabel
            | NodeKind::TableCaption
            | NodeKind::TableLabel
            | NodeKind::CellSpan
            | NodeKind::Abbreviation
            | NodeKind::KeyCounter => {}

            NodeKind::Str | NodeKind::Abbr | NodeKind::AbbrStart | NodeKind::AbbrStop => {
                let text = self.cx.text(id);
                self.push_odf(&text);
            }
            NodeKind::Space => {
                let text = self.cx.text(id);
                self.cx.push(&text);
            }

            NodeKind::Plain => {
                self.cx.pad(1);
                self.render_children(id);
                self.cx.padded = 0;
            }
            NodeKind::Para => {
                self.cx.pad(2);
                let style = para_style_name(self.cx.para_style);
                self.cx.push(&format!("<text:p text:style-name=\"{style}\">"));
                self.render_children(id);
                self.cx.push("</text:p>\n");
                self.cx.padded = 1;
            }
            NodeKind::HRule => {
                self.cx.pad(2);
                self.cx.push("<text:p text:style-name=\"Horizontal_20_Line\"/>");
                self.cx.padded = 0;
            }
            NodeKind::HtmlBlock => {
                // Raw ODF can be embedded in an HTML comment.
                let text = self.cx.text(id);
                if let Some(raw) = html_comment(&text) {
                    self.cx.pad(2);
                    self.cx.push("<text:p text:style-name=\"Standard\">");
                    self.cx.push(raw);
                    self.cx.push("</text:p>");
                    self.cx.padded = 0;
                }
            }
            NodeKind::Verbatim | NodeKind::VerbatimFence => {
                self.cx.pad(2);
                let style = para_style_name(ParaStyle::Preformatted);
                self.cx.push(&format!("<text:p text:style-name=\"{style}\">"));
                let code = self.cx.text(id);
                self.push_code(code.trim_end_matches('\n'));
                self.cx.push("</text:p>\n");
                self.cx.padded = 1;
            }
            NodeKind::BulletList => self.render_list(id, ParaStyle::BulletList, "L1"),
            NodeKind::OrderedList => self.render_list(id, ParaStyle::OrderedList, "L2"),
            NodeKind::ListItem => self.render_list_item(id),
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
            NodeKind::LineBreak => self.cx.push("<text:line-break/>"),
            NodeKind::MathSpan => {
                let text = self.cx.text(id);
                let (open, inner, close) = split_math(&text);
                self.cx.push("<text:span text:style-name=\"math\">");
                self.cx.push(open);
                self.push_odf(inner);
                self.cx.push(close);
                self.cx.push("</text:span>");
            }
            NodeKind::Strong => self.span(id, "MMD-Bold"),
            NodeKind::Emph => self.span(id, "MMD-Italic"),
            NodeKind::Code => self.span_text(id, "Source_20_Text"),
            NodeKind::Superscript => self.span_text(id, "MMD-Superscript"),
            NodeKind::Subscript => self.span_text(id, "MMD-Subscript"),
            NodeKind::Html => {
                let text = self.cx.text(id);
                if let Some(raw) = html_comment(&text) {
                    self.cx.push(raw);
                }
            }
            NodeKind::Variable => {
                let key = self.cx.text(id);
                match self.cx.metavalue(&key) {
                    Some(value) => self.push_odf(&value),
                    None => {
                        self.cx.push("[%");
                        self.push_odf(&key);
                        self.cx.push("]");
                    }
                }
            }

            NodeKind::Link => self.render_link(id),
            NodeKind::Image | NodeKind::ImageBlock => self.render_image(id, kind),
            NodeKind::NoteReference => self.render_note_reference(id),
            NodeKind::Citation | NodeKind::NoCitation => self.render_citation(id, kind),
            NodeKind::NoteSource | NodeKind::GlossarySource | NodeKind::CitationSource => {
                if self.cx.printing_notes {
                    self.render_children(id);
                }
            }
            NodeKind::GlossaryTerm => {
                let term = self.cx.tree.raw_text_of_children(id);
                self.cx.push("<text:p text:style-name=\"Glossary\">");
                self.push_odf(&term);
                self.cx.push(":</text:p>\n");
            }

            NodeKind::Blockquote => {
                self.cx.pad(2);
                self.cx.padded = 2;
                self.with_para_style(ParaStyle::Quotation, |r| r.render_children(id));
            }
            NodeKind::Term => {
                self.cx.pad(1);
                self.cx.push("<text:p><text:span text:style-name=\"MMD-Bold\">");
                self.render_children(id);
                self.cx.push("</text:span></text:p>\n");
                self.cx.padded = 1;
            }
            NodeKind::Definition => {
                self.cx.pad(1);
                self.cx.padded = 1;
                self.with_para_style(ParaStyle::Quotation, |r| {
                    r.cx.push("<text:p text:style-name=\"Quotations\">");
                    r.render_children(id);
                    r.cx.push("</text:p>\n");
                });
                self.cx.padded = 0;
            }

            NodeKind::Table => self.render_table(id),
            NodeKind::TableSeparator => self.cx.table_alignment = self.cx.text(id),
            NodeKind::TableHead => {
                let columns = self.cx.table_alignment.chars().count();
                for _ in 0..columns {
                    self.cx.push("<table:table-column/>\n");
                }
                self.cx.cell_type = CellType::Head;
                self.render_children(id);
                self.cx.cell_type = CellType::Data;
            }
            NodeKind::TableBody => self.render_children(id),
            NodeKind::TableRow => {
                self.cx.push("<table:table-row>\n");
                self.cx.table_column = 0;
                self.render_children(id);
                self.cx.push("</table:table-row>\n");
            }
            NodeKind::TableCell => self.render_table_cell(id),

            NodeKind::CriticAddition => {
                if !self.cx.has(Extensions::CRITIC_REJECT) {
                    let text = self.cx.text(id);
                    self.push_odf(&text);
                }
            }
            NodeKind::CriticDeletion => {
                if self.cx.has(Extensions::CRITIC_REJECT) {
                    let text = self.cx.text(id);
                    self.push_odf(&text);
                }
            }
            NodeKind::CriticHighlight => {
                let text = self.cx.text(id);
                self.push_odf(&text);
            }
            NodeKind::CriticComment => {}
            NodeKind::CriticSubstitution if self.cx.first_child(id).is_some() => {
                self.render_children(id);
            }
            NodeKind::CriticSubstitution => {
                let text = self.cx.text(id);
                let (old, new) = split_substitution(&text);
                if self.cx.has(Extensions::CRITIC_REJECT) {
                    self.push_odf(old);
                } else {
                    self.push_odf(new);
                }
            }
        }
    }

    fn with_para_style(&mut self, style: ParaStyle, f: impl FnOnce(&mut Self)) {
        let old = std::mem::replace(&mut self.cx.para_style, style);
        f(self);
        self.cx.para_style = old;
    }

    // ------------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------------

    fn render_list(&mut self, id: NodeId, style: ParaStyle, list_style: &str) {
        if self.cx.list_needs_end_p {
            self.cx.push("</text:p>");
            self.cx.list_needs_end_p = false;
        }
        self.cx.pad(2);
        self.cx
            .push(&format!("<text:list text:style-name=\"{list_style}\">"));
        self.cx.padded = 0;
        self.with_para_style(style, |r| r.render_children(id));
        self.cx.pad(1);
        self.cx.push("</text:list>");
        self.cx.padded = 0;
    }

    fn render_list_item(&mut self, id: NodeId) {
        self.cx.pad(1);
        self.cx.push("<text:list-item>\n");

        // Tight items carry bare inline content that still needs a paragraph.
        let style = para_style_name(self.cx.para_style);
        let content = self.item_content(id);
        match content {
            Some(first) if self.cx.kind(first) != NodeKind::Para => {
                self.cx.push(&format!("<text:p text:style-name=\"{style}\">"));
                self.cx.list_needs_end_p = true;
            }
            None => self.cx.push(&format!("<text:p text:style-name=\"{style}\"/>")),
            Some(_) => {}
        }

        self.cx.padded = 2;
        self.render_children(id);
        if self.cx.list_needs_end_p {
            self.cx.push("</text:p>");
            self.cx.list_needs_end_p = false;
        }
        self.cx.push("</text:list-item>\n");
        self.cx.padded = 1;
    }

    /// First block of a list item, looking through an anonymous group.
    fn item_content(&self, id: NodeId) -> Option<NodeId> {
        let first = self.cx.first_child(id)?;
        if self.cx.kind(first) == NodeKind::List {
            self.cx.first_child(first)
        } else {
            Some(first)
        }
    }

    fn render_metadata(&mut self, id: NodeId) {
        self.cx.push("<office:meta>\n");
        let keys: Vec<NodeId> = self.cx.tree.children(id).collect();
        for key in keys {
            let name = key_from_string(self.cx.tree[key].text());
            let mut value = self
                .cx
                .first_child(key)
                .map(|v| self.cx.tree.raw_text(v))
                .unwrap_or_default();
            crate::label::trim_trailing_whitespace(&mut value);
            match name.as_str() {
                "title" => {
                    self.cx.push("<dc:title>");
                    self.push_odf(&value);
                    self.cx.push("</dc:title>\n");
                }
                "keywords" => {
                    self.cx.push("<meta:keyword>");
                    self.push_odf(&value);
                    self.cx.push("</meta:keyword>\n");
                }
                skipped if SKIPPED_KEYS.contains(&skipped) => {}
                _ => {
                    let raw_name = self.cx.text(key);
                    self.cx.push("<meta:user-defined meta:name=\"");
                    self.push_odf(&raw_name);
                    self.cx.push("\">");
                    self.push_odf(&value);
                    self.cx.push("</meta:user-defined>\n");
                }
            }
        }
        self.cx.push("</office:meta>\n");

        if let Some(header) = self.cx.metavalue("odfheader") {
            self.cx.push(&header);
        }
        self.open_body();
    }

    fn render_heading(&mut self, id: NodeId, kind: NodeKind) {
        let level = self.cx.heading_level(kind, 10);
        self.cx.pad(2);

        let first = self.cx.first_child(id);
        let explicit = first.filter(|&c| self.cx.kind(c) == NodeKind::AutoLabel);
        let (label, body) = match explicit {
            Some(label) => (
                label_from_string(self.cx.tree[label].text()),
                self.cx.tree.next_sibling(label),
            ),
            None => (self.cx.tree.label_of_children(id), first),
        };

        self.cx
            .push(&format!("<text:h text:outline-level=\"{level}\">"));
        self.cx.push("<text:bookmark text:name=\"");
        self.push_odf(&label);
        self.cx.push("\"/>");
        let mut cur = body;
        while let Some(child) = cur {
            self.render_node(child);
            cur = self.cx.tree.next_sibling(child);
        }
        self.cx.push("<text:bookmark-end text:name=\"");
        self.push_odf(&label);
        self.cx.push("\"/></text:h>");
        self.cx.padded = 0;
    }

    fn render_table(&mut self, id: NodeId) {
        self.cx.pad(2);
        self.cx.push("<table:table>\n");
        self.render_children(id);
        self.cx.push("</table:table>\n");

        let caption = self
            .cx
            .first_child(id)
            .filter(|&c| self.cx.kind(c) == NodeKind::TableCaption);
        if let Some(caption) = caption {
            let first = self.cx.first_child(caption);
            let label = match first.filter(|&c| self.cx.kind(c) == NodeKind::TableLabel) {
                Some(label) => label_from_string(self.cx.tree[label].text()),
                None => self.cx.tree.label_of_children(caption),
            };
            self.cx.push("<text:p><text:bookmark text:name=\"");
            self.push_odf(&label);
            self.cx.push(
                "\"/>Table <text:sequence text:name=\"Table\" text:formula=\"ooow:Table+1\" \
                 style:num-format=\"1\"> Update Fields to calculate numbers</text:sequence>:",
            );
            self.render_children(caption);
            self.cx.push("<text:bookmark-end text:name=\"");
            self.push_odf(&label);
            self.cx.push("\"/></text:p>\n");
        }
        self.cx.padded = 1;
        self.cx.table_alignment.clear();
    }

    fn render_table_cell(&mut self, id: NodeId) {
        let column = self.cx.table_column;
        self.cx.push("<table:table-cell");
        let span = self
            .cx
            .first_child(id)
            .filter(|&c| self.cx.kind(c) == NodeKind::CellSpan)
            .map_or(1, |c| self.cx.tree[c].text().len() + 1);
        if span > 1 {
            self.cx
                .push(&format!(" table:number-columns-spanned=\"{span}\""));
        }
        let style = match self.cx.cell_type {
            CellType::Head => "Table_20_Heading",
            CellType::Data => match self.cx.table_alignment.chars().nth(column) {
                Some('r' | 'R') => "MMD-Table-Right",
                Some('c' | 'C') => "MMD-Table-Center",
                _ => "MMD-Table",
            },
        };
        self.cx
            .push(&format!(">\n<text:p text:style-name=\"{style}\">"));
        self.cx.padded = 2;
        self.render_children(id);
        self.cx.push("</text:p>\n</table:table-cell>\n");
        self.cx.table_column += span;
    }

    // ------------------------------------------------------------------------
    // Inline
    // ------------------------------------------------------------------------

    fn push_quote(&mut self, quote: Quote) {
        if self.cx.has(Extensions::SMART) {
            let entity = quote.entity(self.cx.language);
            self.cx.push(&entity);
        } else {
            self.push_odf(quote.ascii());
        }
    }

    fn span(&mut self, id: NodeId, style: &str) {
        self.cx
            .push(&format!("<text:span text:style-name=\"{style}\">"));
        self.render_children(id);
        self.cx.push("</text:span>");
    }

    fn span_text(&mut self, id: NodeId, style: &str) {
        let text = self.cx.text(id);
        self.cx
            .push(&format!("<text:span text:style-name=\"{style}\">"));
        self.push_odf(&text);
        self.cx.push("</text:span>");
    }

    fn render_link(&mut self, id: NodeId) {
        let data = match self.cx.resolve_link(id) {
            Resolution::Found(data) => data,
            Resolution::Missing(label) => {
                self.cx.push("[");
                self.render_children(id);
                self.cx.push("]");
                match self.cx.tree[id].text.clone() {
                    Some(text) => self.push_odf(&text),
                    None => {
                        self.cx.push("[");
                        self.push_odf(&label);
                        self.cx.push("]");
                    }
                }
                return;
            }
        };

        self.cx.push("<text:a xlink:type=\"simple\"");
        if let Some(source) = &data.source {
            self.cx.push(" xlink:href=\"");
            self.push_odf(source);
            self.cx.push("\"");
        }
        if let Some(title) = data.title.as_deref().filter(|t| !t.is_empty()) {
            self.cx.push(" office:name=\"");
            self.push_odf(title);
            self.cx.push("\"");
        }
        self.cx.push(">");
        self.render_children(id);
        self.cx.push("</text:a>");
    }

    fn render_image(&mut self, id: NodeId, kind: NodeKind) {
        let block = kind == NodeKind::ImageBlock;
        if block {
            self.cx.pad(2);
            self.cx.push("<text:p>\n");
        }

        let data = match self.cx.resolve_link(id) {
            Resolution::Found(data) => data,
            Resolution::Missing(label) => {
                self.cx.push("![");
                self.render_children(id);
                self.cx.push("][");
                self.push_odf(&label);
                self.cx.push("]");
                if block {
                    self.cx.push("</text:p>\n");
                    self.cx.padded = 1;
                }
                return;
            }
        };

        let width = data.dimension("width");
        let height = data.dimension("height");
        self.cx.push(
            "<draw:frame text:anchor-type=\"as-char\"\ndraw:z-index=\"0\" draw:style-name=\"fr1\" ",
        );
        match &width {
            Some(width) => self.cx.push(&format!("svg:width=\"{width}\"\n")),
            None => self.cx.push("svg:width=\"95%\"\n"),
        }
        self.cx.push(
            ">\n<draw:text-box><text:p><draw:frame text:anchor-type=\"as-char\" draw:z-index=\"1\" ",
        );
        if let (Some(height), Some(width)) = (&height, &width) {
            self.cx
                .push(&format!("svg:height=\"{height}\"\nsvg:width=\"{width}\"\n"));
        }
        if let Some(source) = &data.source {
            self.cx.push("><draw:image xlink:href=\"");
            self.push_odf(source);
            self.cx.push("\"");
        }
        self.cx.push(
            " xlink:type=\"simple\" xlink:show=\"embed\" xlink:actuate=\"onLoad\" \
             draw:filter-name=\"&lt;All formats&gt;\"/>\n</draw:frame></text:p>",
        );

        if block {
            if self.cx.first_child(id).is_some() {
                self.cx.push(
                    "<text:p>Figure <text:sequence text:name=\"Figure\" \
                     text:formula=\"ooow:Figure+1\" style:num-format=\"1\"> Update Fields \
                     to calculate numbers</text:sequence>: ",
                );
                self.render_children(id);
                self.cx.push("</text:p>");
            }
            self.cx.push("</draw:text-box></draw:frame>\n</text:p>\n");
        } else {
            self.cx.push("</draw:text-box></draw:frame>\n");
        }
        self.cx.padded = 1;
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

        let class = match note.kind {
            NoteKind::Glossary => "glossary",
            NoteKind::Footnote | NoteKind::Citation => "footnote",
        };
        self.cx.push(&format!(
            "<text:note text:id=\"\" text:note-class=\"{class}\"><text:note-body>\n"
        ));
        self.note_body(note.source);
        self.cx.push("</text:note-body>\n</text:note>\n");
        self.cx.padded = 1;
    }

    fn note_body(&mut self, source: NodeId) {
        self.cx.padded = 2;
        self.cx.printing_notes = true;
        self.with_para_style(ParaStyle::Footnote, |r| r.render_children(source));
        self.cx.printing_notes = false;
    }

    fn render_citation(&mut self, id: NodeId, kind: NodeKind) {
        let label = self.cx.tree[id]
            .link
            .as_ref()
            .and_then(|link| link.label.clone())
            .unwrap_or_default();

        if is_external_citation(&label) {
            self.push_odf(&label);
        } else {
            let number = self.cx.notes.note_number_for_label(&label);
            let source = self.cx.notes.note(number).map(|note| note.source);
            match source {
                Some(source) => {
                    self.cx.notes.mark_citation(self.cx.tree, number);
                    let cite = self.cx.notes.cite_count(number);
                    if self.cx.notes.register_reference(number) {
                        self.cx.push(&format!(
                            "<text:note text:id=\"cite{cite}\" text:note-class=\"endnote\"><text:note-body>\n"
                        ));
                        self.note_body(source);
                        self.cx.pad(1);
                        self.cx.push("</text:note-body>\n</text:note>\n");
                    } else {
                        self.cx.push(&format!(
                            "<text:span text:style-name=\"Footnote_20_anchor\"><text:note-ref \
                             text:note-class=\"endnote\" text:reference-format=\"text\" \
                             text:ref-name=\"cite{cite}\">{cite}</text:note-ref></text:span>"
                        ));
                    }
                }
                None if kind == NodeKind::NoCitation => self.push_odf(&label),
                None => {
                    self.cx.push("[");
                    if self.cx.first_child(id).is_some() {
                        self.render_children(id);
                        self.cx.push("][");
                    }
                    self.cx.push("#");
                    self.push_odf(&label);
                    self.cx.push("]");
                }
            }
        }

        let next_is_citation = self
            .cx
            .tree
            .next_sibling(id)
            .is_some_and(|next| self.cx.kind(next) == NodeKind::Citation);
        if next_is_citation {
            self.cx.push(" ");
        }
    }

    // ------------------------------------------------------------------------
    // Escaping
    // ------------------------------------------------------------------------

    /// Escape text; four spaces become a tab and a newline after two
    /// trailing spaces becomes a line break.
    fn push_odf(&mut self, text: &str) {
        let escaped = escape(text);
        let mut rest: &str = &escaped;
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix("    ") {
                self.cx.push("<text:tab/>");
                rest = after;
                continue;
            }
            if let Some(after) = rest.strip_prefix("  \n") {
                self.cx.push("  <text:line-break/>");
                rest = after;
                continue;
            }
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                self.cx.push_char(c);
            }
            rest = chars.as_str();
        }
    }

    /// Escape code, keeping each newline as a line break.
    fn push_code(&mut self, text: &str) {
        let escaped = escape(text);
        let escaped = escaped
            .replace('\n', "<text:line-break/>")
            .replace("    ", "<text:tab/>");
        self.cx.push(&escaped);
    }
}

fn para_style_name(style: ParaStyle) -> &'static str {
    match style {
        ParaStyle::Standard => "Standard",
        ParaStyle::Quotation => "Quotations",
        ParaStyle::Preformatted => "Preformatted Text",
        ParaStyle::BulletList => "P1",
        ParaStyle::OrderedList => "P2",
        ParaStyle::Footnote => "Footnote",
    }
}

/// Body of an `<!--..-->` comment, which carries raw output markup.
pub(crate) fn html_comment(text: &str) -> Option<&str> {
    text.trim_end()
        .strip_prefix("<!--")
        .and_then(|t| t.strip_suffix("-->"))
}
