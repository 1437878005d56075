//! LaTeX output, with the Memoir and Beamer variants.
//!
//! The three flavors share one walker. Memoir only changes how indented
//! code blocks are set; Beamer turns level-3 sections into frames, level-4
//! sections into article-mode notes, and reveals list items one at a time.
//!
//! Footnotes are written inline with `\footnote{}`. Cited notes are
//! collected into a `thebibliography` environment when the `Footer` node is
//! reached, or at the end of the document when the tree has no footer.

use crate::abbr;
use crate::error::Result;
use crate::label::{ascii_label_from_string, key_from_string, label_from_string};
use crate::notes::NoteKind;
use crate::options::{Extensions, Format};
use crate::refs::Resolution;
use crate::tree::{LinkData, NodeId, NodeKind};

use super::context::{CellType, RenderContext};
use super::critic::split_substitution;
use super::html::{citation_key, is_external_citation, split_math};
use super::odf::html_comment;
use super::smart::Quote;

/// Sectioning commands by effective heading level.
const HEADINGS: [&str; 7] = [
    "\\part{",
    "\\chapter{",
    "\\section{",
    "\\subsection{",
    "\\subsubsection{",
    "\\paragraph{",
    "\\subparagraph{",
];

/// Keys that never ask for a complete document.
const SNIPPET_KEYS: &[&str] = &[
    "baseheaderlevel",
    "xhtmlheaderlevel",
    "htmlheaderlevel",
    "latexheaderlevel",
    "odfheaderlevel",
    "xhtmlheader",
    "htmlheader",
    "quoteslanguage",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LatexFlavor {
    Latex,
    Memoir,
    Beamer,
}

impl LatexFlavor {
    pub fn for_format(format: Format) -> Self {
        match format {
            Format::Memoir => LatexFlavor::Memoir,
            Format::Beamer => LatexFlavor::Beamer,
            _ => LatexFlavor::Latex,
        }
    }
}

pub(crate) struct LatexRenderer<'a> {
    cx: RenderContext<'a>,
    flavor: LatexFlavor,
    /// Inside a `\footnote{}`, where floats are not allowed.
    in_footnote: bool,
    footer_done: bool,
}

impl<'a> LatexRenderer<'a> {
    pub fn new(cx: RenderContext<'a>, flavor: LatexFlavor) -> Self {
        Self {
            cx,
            flavor,
            in_footnote: false,
            footer_done: false,
        }
    }

    pub fn render(mut self) -> Result<String> {
        let first = self.cx.first_child(NodeId::ROOT);
        if first.is_none_or(|id| self.cx.kind(id) != NodeKind::Metadata) {
            self.push_acronyms();
        }
        self.render_children(NodeId::ROOT);
        if !self.footer_done {
            self.render_footer();
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

    /// Render into a scratch buffer instead of the output.
    fn capture(&mut self, f: impl FnOnce(&mut Self)) -> String {
        let saved = std::mem::take(&mut self.cx.out);
        let padded = self.cx.padded;
        f(self);
        self.cx.padded = padded;
        std::mem::replace(&mut self.cx.out, saved)
    }

    fn render_node(&mut self, id: NodeId) {
        let kind = self.cx.kind(id);
        if self.cx.has(Extensions::COMPLETE)
            && !self.cx.has(Extensions::HEAD_CLOSED)
            && !matches!(kind, NodeKind::Footer | NodeKind::Metadata)
        {
            self.cx.pad(2);
            self.cx.extensions.insert(Extensions::HEAD_CLOSED);
        }

        match kind {
            NodeKind::Root | NodeKind::List | NodeKind::BlockquoteMarker | NodeKind::Raw => {
                self.render_children(id)
            }
            NodeKind::HeadingSection if self.flavor == LatexFlavor::Beamer => {
                self.render_frame(id)
            }
            NodeKind::HeadingSection => self.render_children(id),
            NodeKind::NoType
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
            NodeKind::Footer => self.render_footer(),

            NodeKind::Str | NodeKind::AbbrStop => {
                let text = self.cx.text(id);
                self.push_latex(&text);
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
            NodeKind::Para => {
                self.cx.pad(2);
                self.render_children(id);
                self.cx.padded = 0;
            }
            NodeKind::HRule => {
                self.cx.pad(2);
                self.cx.push("\\begin{center}\\rule{3in}{0.4pt}\\end{center}\n");
                self.cx.padded = 0;
            }
            NodeKind::HtmlBlock => {
                let text = self.cx.text(id);
                if let Some(raw) = html_comment(&text) {
                    self.cx.pad(2);
                    self.cx.push(raw);
                    self.cx.padded = 0;
                }
            }
            NodeKind::Html => {
                let text = self.cx.text(id);
                if let Some(raw) = html_comment(&text) {
                    self.cx.push(raw);
                    self.cx.padded = 0;
                }
            }
            NodeKind::Verbatim | NodeKind::VerbatimFence => self.render_verbatim(id, kind),
            NodeKind::BulletList => self.environment(id, "itemize"),
            NodeKind::OrderedList => self.environment(id, "enumerate"),
            NodeKind::ListItem => {
                self.cx.pad(1);
                match self.flavor {
                    LatexFlavor::Beamer => self.cx.push("\\item<+-> "),
                    _ => self.cx.push("\\item "),
                }
                self.cx.padded = 2;
                self.render_children(id);
                self.cx.push("\n");
                self.cx.padded = 0;
            }
            NodeKind::Blockquote => self.environment(id, "quote"),
            NodeKind::DefList => self.environment(id, "description"),
            NodeKind::Term => {
                self.cx.pad(2);
                self.cx.push("\\item[");
                self.render_children(id);
                self.cx.push("]");
                self.cx.padded = 0;
            }
            NodeKind::Definition => {
                self.cx.pad(2);
                self.cx.padded = 2;
                self.render_children(id);
                self.cx.padded = 0;
            }
            NodeKind::Metadata => self.render_metadata(id),
            NodeKind::H1
            | NodeKind::H2
            | NodeKind::H3
            | NodeKind::H4
            | NodeKind::H5
            | NodeKind::H6 => self.render_heading(id, kind),
            NodeKind::Toc => {
                self.cx.pad(2);
                self.cx.push("\\tableofcontents");
                self.cx.padded = 0;
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
            NodeKind::LineBreak => self.cx.push("\\\\\n"),
            NodeKind::MathSpan => self.render_math(id),
            NodeKind::Strong => self.command(id, "\\textbf{"),
            NodeKind::Emph => self.command(id, "\\emph{"),
            NodeKind::Code => {
                let text = self.cx.text(id);
                self.cx.push("\\texttt{");
                self.push_latex(&text);
                self.cx.push("}");
            }
            NodeKind::Superscript => {
                let text = self.cx.text(id);
                self.cx.push(&format!("\\textsuperscript{{{text}}}"));
            }
            NodeKind::Subscript => {
                let text = self.cx.text(id);
                self.cx.push(&format!("\\textsubscript{{{text}}}"));
            }
            NodeKind::Variable => {
                let key = self.cx.text(id);
                match self.cx.metavalue(&key) {
                    Some(value) => self.push_latex(&value),
                    None => self.cx.push(&format!("[%{key}]")),
                }
            }

            NodeKind::Link => self.render_link(id),
            NodeKind::Image | NodeKind::ImageBlock => self.render_image(id, kind),
            NodeKind::NoteReference => self.render_note_reference(id),
            NodeKind::Citation | NodeKind::NoCitation => self.render_citation(id, kind),
            NodeKind::GlossaryTerm => self.render_glossary_term(id),

            NodeKind::Table => self.render_table(id),
            NodeKind::TableSeparator => self.render_table_separator(id),
            NodeKind::TableCaption => self.render_table_caption(id),
            NodeKind::TableHead => {
                self.cx.cell_type = CellType::Head;
                self.render_children(id);
                self.cx.push("\\midrule\n");
                self.cx.cell_type = CellType::Data;
            }
            NodeKind::TableBody => {
                self.render_children(id);
                let another = self
                    .cx
                    .tree
                    .next_sibling(id)
                    .is_some_and(|next| self.cx.kind(next) == NodeKind::TableBody);
                if another {
                    self.cx.push("\n\\midrule\n");
                } else {
                    self.cx.push("\n\\bottomrule\n");
                }
            }
            NodeKind::TableRow => {
                self.cx.table_column = 0;
                self.render_children(id);
                self.cx.push("\\\\\n");
                self.cx.table_column = 0;
            }
            NodeKind::TableCell => self.render_table_cell(id),

            NodeKind::CriticAddition | NodeKind::CriticHighlight => {
                if kind == NodeKind::CriticHighlight || !self.cx.has(Extensions::CRITIC_REJECT) {
                    let text = self.cx.text(id);
                    self.push_latex(&text);
                }
            }
            NodeKind::CriticDeletion => {
                if self.cx.has(Extensions::CRITIC_REJECT) {
                    let text = self.cx.text(id);
                    self.push_latex(&text);
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
                    self.push_latex(old);
                } else {
                    self.push_latex(new);
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------------

    fn environment(&mut self, id: NodeId, name: &str) {
        self.cx.pad(2);
        self.cx.push(&format!("\\begin{{{name}}}"));
        self.cx.padded = 0;
        self.render_children(id);
        self.cx.pad(1);
        self.cx.push(&format!("\\end{{{name}}}"));
        self.cx.padded = 0;
    }

    fn render_verbatim(&mut self, id: NodeId, kind: NodeKind) {
        self.cx.pad(2);
        let code = self.cx.text(id);

        if self.flavor == LatexFlavor::Memoir && kind == NodeKind::Verbatim {
            self.cx.push("\\begin{adjustwidth}{2.5em}{2.5em}\n\\begin{verbatim}\n\n");
            self.cx.push(&code);
            self.cx.push("\n\\end{verbatim}\n\\end{adjustwidth}");
            self.cx.padded = 0;
            return;
        }

        let language = self
            .cx
            .tree
            .children(id)
            .find(|&c| self.cx.kind(c) == NodeKind::VerbatimType)
            .map(|c| self.cx.text(c).trim_end().to_string())
            .filter(|language| !language.is_empty());
        match language {
            Some(language) => self.cx.push(&format!(
                "\\begin{{lstlisting}}[language={language}]\n{code}\\end{{lstlisting}}"
            )),
            None => self
                .cx
                .push(&format!("\\begin{{verbatim}}\n{code}\\end{{verbatim}}")),
        }
        self.cx.padded = 0;
    }

    fn render_heading(&mut self, id: NodeId, kind: NodeKind) {
        let level = self.cx.heading_level(kind, HEADINGS.len());
        self.cx.pad(2);
        let command = match self.flavor {
            LatexFlavor::Beamer => match level {
                1 => "\\part{",
                2 => "\\section{",
                3 => "\\frametitle{",
                _ => "\\emph{",
            },
            LatexFlavor::Latex | LatexFlavor::Memoir => HEADINGS[level - 1],
        };

        let first = self.cx.first_child(id);
        let explicit = first.filter(|&c| self.cx.kind(c) == NodeKind::AutoLabel);
        let (label, body) = match explicit {
            Some(label) => (
                label_from_string(self.cx.tree[label].text()),
                self.cx.next_after(label),
            ),
            None => (self.cx.tree.label_of_children(id), first),
        };

        // Footnotes are not allowed in moving arguments.
        self.cx.no_latex_footnote = true;
        self.cx.push(command);
        self.render_from(body);
        self.cx.push(&format!("}}\n\\label{{{label}}}"));
        self.cx.no_latex_footnote = false;
        self.cx.padded = 0;
    }

    /// Beamer: level-3 sections are frames, level-4 sections article notes.
    fn render_frame(&mut self, id: NodeId) {
        let Some(heading) = self.cx.first_child(id) else {
            return;
        };
        let kind = self.cx.kind(heading);
        let level = kind
            .is_heading()
            .then(|| self.cx.heading_level(kind, HEADINGS.len()));

        match level {
            Some(3) => {
                self.cx.pad(2);
                self.cx.push("\\begin{frame}");
                if self.cx.tree.contains_kind(id, NodeKind::Verbatim)
                    || self.cx.tree.contains_kind(id, NodeKind::VerbatimFence)
                {
                    self.cx.push("[fragile]");
                }
                self.cx.padded = 0;
                self.render_children(id);
                self.cx.push("\n\n\\end{frame}\n\n");
                self.cx.padded = 2;
            }
            Some(4) => {
                self.cx.pad(1);
                self.cx.push("\\mode<article>{\n");
                self.cx.padded = 0;
                let rest = self.cx.next_after(heading);
                self.render_from(rest);
                self.cx.push("\n\n}\n\n");
                self.cx.padded = 2;
            }
            _ => self.render_children(id),
        }
    }

    fn render_metadata(&mut self, id: NodeId) {
        let start = self.cx.out.len();
        let keys: Vec<NodeId> = self.cx.tree.children(id).collect();
        for key in keys {
            self.render_meta_key(key);
        }
        if self.cx.out.len() > start {
            self.cx.padded = 1;
        }
        if !self.cx.has(Extensions::SNIPPET) && self.needs_complete_document() {
            self.cx.extensions.insert(Extensions::COMPLETE);
        }
        self.push_acronyms();
    }

    fn needs_complete_document(&self) -> bool {
        self.cx
            .tree
            .metadata_keys()
            .iter()
            .any(|key| !SNIPPET_KEYS.contains(&key.as_str()))
    }

    fn render_meta_key(&mut self, key: NodeId) {
        let name = key_from_string(self.cx.tree[key].text());
        if matches!(
            name.as_str(),
            "baseheaderlevel" | "latexheaderlevel" | "quoteslanguage"
        ) || self.cx.has(Extensions::SNIPPET)
        {
            return;
        }

        let value = self
            .cx
            .first_child(key)
            .map(|v| self.cx.tree.raw_text(v))
            .unwrap_or_default()
            .trim_end()
            .to_string();
        match name.as_str() {
            "title" => self.define("mytitle", &value),
            "author" => self.define("myauthor", &value),
            "date" => self.define("mydate", &value),
            "copyright" => self.define("mycopyright", &value),
            "latextitle" => self.cx.push(&format!("\\def\\mytitle{{{value}}}\n")),
            "latexauthor" => self.cx.push(&format!("\\def\\myauthor{{{value}}}\n")),
            "latexinput" => self.cx.push(&format!("\\input{{{value}}}\n")),
            "latexfooter" => self.cx.latex_footer = Some(value),
            "bibtex" => self
                .cx
                .push(&format!("\\def\\bibliocommand{{\\bibliography{{{value}}}}}\n")),
            "css" | "xhtmlheader" | "htmlheader" | "mmdfooter" | "mmdheader" | "lang"
            | "latexmode" | "transcludebase" => {}
            other => self.define(other, &value),
        }
    }

    fn define(&mut self, macro_name: &str, value: &str) {
        self.cx.push("\\def\\");
        self.push_latex(macro_name);
        self.cx.push("{");
        self.push_latex(value);
        self.cx.push("}\n");
    }

    /// `\newacro` for every pooled abbreviation.
    fn push_acronyms(&mut self) {
        let defs = &self.cx.pools.abbreviations;
        if defs.is_empty() {
            return;
        }
        let mut out = String::new();
        for def in defs {
            let key = acronym_key(&def.name, &def.expansion);
            out.push_str(&format!(
                "\\newacro{{{key}}}[{}]{{{}}}\n",
                escape_latex(&def.name),
                escape_latex(def.expansion.trim_end())
            ));
        }
        self.cx.push(&out);
        self.cx.padded = 1;
    }

    fn render_footer(&mut self) {
        self.footer_done = true;
        self.render_bibliography();
        if self.flavor == LatexFlavor::Beamer {
            self.cx.push("\\mode<all>\n");
        }
        if let Some(footer) = self.cx.latex_footer.clone() {
            self.cx.pad(2);
            self.cx.push(&format!("\\input{{{footer}}}\n"));
        }
        if self.cx.has(Extensions::COMPLETE) {
            self.cx.push("\n\\end{document}");
        }
        if self.flavor == LatexFlavor::Beamer {
            self.cx.push("\\mode*\n");
        }
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
        if cited.is_empty() {
            return;
        }

        self.cx.printing_notes = true;
        self.cx.pad(2);
        match self.flavor {
            LatexFlavor::Beamer => {
                self.cx.push(
                    "\\part{Bibliography}\n\\begin{frame}[allowframebreaks]\n\
                     \\frametitle{Bibliography}\n\\def\\newblock{}\n\\begin{thebibliography}{0}\n",
                );
                self.cx.padded = 1;
            }
            LatexFlavor::Latex | LatexFlavor::Memoir => {
                self.cx.push("\\begin{thebibliography}{0}");
                self.cx.padded = 0;
            }
        }

        for (label, source) in cited {
            self.cx.pad(1);
            self.cx.push(&format!("\\bibitem{{{label}}}\n"));
            self.cx.padded = 2;
            self.render_children(source);
            self.cx.pad(1);
            self.cx.padded = 1;
        }

        self.cx.pad(2);
        match self.flavor {
            LatexFlavor::Beamer => self.cx.push("\\end{thebibliography}\n\\end{frame}\n\n"),
            LatexFlavor::Latex | LatexFlavor::Memoir => self.cx.push("\\end{thebibliography}"),
        }
        self.cx.padded = 0;
        self.cx.printing_notes = false;
    }

    // ------------------------------------------------------------------------
    // Inline
    // ------------------------------------------------------------------------

    fn push_latex(&mut self, text: &str) {
        let escaped = escape_latex(text);
        self.cx.push(&escaped);
    }

    fn push_quote(&mut self, quote: Quote) {
        if self.cx.has(Extensions::SMART) {
            self.cx.push(quote.latex(self.cx.language));
        } else {
            self.cx.push(quote.ascii());
        }
    }

    fn command(&mut self, id: NodeId, open: &str) {
        self.cx.push(open);
        self.render_children(id);
        self.cx.push("}");
    }

    fn render_math(&mut self, id: NodeId) {
        let text = self.cx.text(id);
        let (open, inner, _) = split_math(&text);
        if open.is_empty() {
            self.cx.push(&text);
        } else if inner.starts_with("\\begin") {
            self.cx.push(inner);
        } else if text.starts_with('$') {
            self.cx.push(&text);
        } else if open == "\\(" {
            self.cx.push(&format!("${inner}$"));
        } else {
            self.cx.push(&format!("\\[{inner}\\]"));
        }
    }

    fn render_abbreviation(&mut self, id: NodeId) {
        match abbr::abbreviation_text(self.cx.tree, id) {
            Some((name, expansion)) => {
                let key = acronym_key(&name, &expansion);
                self.cx.push(&format!("\\ac{{{key}}}"));
            }
            None => {
                let text = self.cx.text(id);
                self.push_latex(&text);
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
                    Some(text) => self.push_latex(&text),
                    None => {
                        self.cx.push("[");
                        self.push_latex(&label);
                        self.cx.push("]");
                    }
                }
                return;
            }
        };

        let text = self.capture(|r| r.render_children(id));
        let raw = self.cx.tree.raw_text_of_children(id);
        let source = data.source.clone().unwrap_or_default();

        if let Some(anchor) = source.strip_prefix('#') {
            let target = match (anchor, &data.label) {
                ("", Some(label)) => label.clone(),
                (anchor, _) => anchor.to_string(),
            };
            if text.is_empty() {
                self.cx.push(&format!("\\autoref{{{target}}}"));
            } else {
                self.cx.push(&format!("{text} (\\autoref{{{target}}})"));
            }
        } else if raw == source || source.strip_prefix("mailto:") == Some(raw.as_str()) {
            self.cx.push(&format!("\\href{{{source}}}{{{text}}}"));
        } else {
            self.cx.push(&format!("\\href{{{source}}}{{{text}}}"));
            if !self.cx.no_latex_footnote {
                self.cx.push(&format!(
                    "\\footnote{{\\href{{{}}}{{{}}}}}",
                    escape_url(&source),
                    escape_latex(&source)
                ));
            }
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
                self.push_latex(&label);
                self.cx.push("]");
                if block {
                    self.cx.padded = 0;
                }
                return;
            }
        };

        if block {
            self.cx.push("\\begin{figure}[htbp]\n\\centering\n");
        }
        self.cx.push(&format!(
            "\\includegraphics[{}]{{{}}}",
            image_options(&data),
            data.source.as_deref().unwrap_or_default()
        ));

        if block {
            let caption = self.capture(|r| r.render_children(id));
            if !caption.is_empty() {
                self.cx.push(&format!("\n\\caption{{{caption}}}"));
            }
            if let Some(label) = &data.label {
                self.cx
                    .push(&format!("\n\\label{{{}}}", label_from_string(label)));
            }
            self.cx.push("\n\\end{figure}");
            self.cx.padded = 0;
        }
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

        self.cx.padded = 2;
        if note.kind == NoteKind::Glossary {
            let term = self
                .cx
                .tree
                .children(note.source)
                .find(|&c| self.cx.kind(c) == NodeKind::GlossaryTerm)
                .map(|c| self.cx.tree.raw_text_of_children(c))
                .unwrap_or_default();
            let term = term.trim_end().to_string();
            self.cx.push(&format!("\\newglossaryentry{{{term}}}{{"));
            self.render_children(note.source);
            self.cx.push(&format!("}}}}\\glsadd{{{term}}}"));
        } else {
            self.cx.push("\\footnote{");
            self.in_footnote = true;
            self.render_children(note.source);
            self.in_footnote = false;
            self.cx.push("}");
        }
        self.cx.padded = 0;
    }

    fn render_citation(&mut self, id: NodeId, kind: NodeKind) {
        let label = self.cx.tree[id]
            .link
            .as_ref()
            .and_then(|link| link.label.clone())
            .unwrap_or_default();
        let locator = self
            .cx
            .first_child(id)
            .map(|_| self.capture(|r| r.render_children(id)));

        if kind == NodeKind::NoCitation {
            if !is_external_citation(&label) {
                let number = self.cx.notes.note_number_for_label(&label);
                if number != 0 {
                    self.cx.notes.mark_citation(self.cx.tree, number);
                    self.cx.notes.register_reference(number);
                }
            }
            self.cx
                .push(&format!("~\\nocite{{{}}}", citation_key(&label)));
            return;
        }

        if is_external_citation(&label) {
            self.push_citep("~\\citep", locator.as_deref(), citation_key(&label));
            return;
        }

        let number = self.cx.notes.note_number_for_label(&label);
        if number != 0 {
            self.cx.notes.mark_citation(self.cx.tree, number);
            self.cx.notes.register_reference(number);
            self.push_citep("~\\citep", locator.as_deref(), &label);
            return;
        }

        // Not defined here, so left for BibTeX; `key;` asks for a textual cite.
        match label.strip_suffix(';') {
            Some(key) => self.push_citep(" \\citet", locator.as_deref(), key),
            None => self.push_citep("~\\citep", locator.as_deref(), &label),
        }
    }

    fn push_citep(&mut self, command: &str, locator: Option<&str>, key: &str) {
        match locator {
            Some(locator) => self.cx.push(&format!("{command}[{locator}]{{{key}}}")),
            None => self.cx.push(&format!("{command}{{{key}}}")),
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
            self.cx.push("sort={");
            self.push_latex(&sort);
            self.cx.push("},");
        }
        let term = self.cx.tree.raw_text_of_children(id);
        self.cx.push("name={");
        self.push_latex(term.trim_end());
        self.cx.push("},description={");
    }

    // ------------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------------

    fn render_table(&mut self, id: NodeId) {
        self.cx.pad(2);
        if !self.in_footnote {
            self.cx.push("\\begin{table}[htbp]\n");
        }
        self.cx.push(
            "\\begin{minipage}{\\linewidth}\n\\setlength{\\tymax}{0.5\\linewidth}\n\\centering\n\\small\n",
        );
        self.render_children(id);
        self.cx.push("\n\\end{tabulary}\n\\end{minipage}");
        if !self.in_footnote {
            self.cx.push("\n\\end{table}");
        }
        self.cx.padded = 0;
    }

    fn render_table_separator(&mut self, id: NodeId) {
        let alignment: String = self
            .cx
            .text(id)
            .chars()
            .filter(|&c| c != 'h')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        self.cx.push(&format!(
            "\\begin{{tabulary}}{{\\textwidth}}{{@{{}}{alignment}@{{}}}} \\toprule\n"
        ));
        self.cx.table_alignment = alignment;
    }

    fn render_table_caption(&mut self, id: NodeId) {
        let first = self.cx.first_child(id);
        let explicit = first.filter(|&c| self.cx.kind(c) == NodeKind::TableLabel);
        let label = match explicit {
            Some(label) => label_from_string(self.cx.tree[label].text()),
            None => self.cx.tree.label_of_children(id),
        };
        self.cx.push("\\caption{");
        self.render_children(id);
        self.cx.push(&format!("}}\n\\label{{{label}}}\n"));
    }

    fn render_table_cell(&mut self, id: NodeId) {
        self.cx.padded = 2;
        let span = self
            .cx
            .first_child(id)
            .filter(|&c| self.cx.kind(c) == NodeKind::CellSpan)
            .map_or(1, |c| self.cx.tree[c].text().len() + 1);

        if span > 1 {
            let align = self
                .cx
                .table_alignment
                .chars()
                .nth(self.cx.table_column)
                .unwrap_or('l')
                .to_ascii_lowercase();
            self.cx.push(&format!("\\multicolumn{{{span}}}{{{align}}}{{"));
        }
        self.render_children(id);
        if span > 1 {
            self.cx.push("}");
        }
        if self.cx.tree.next_sibling(id).is_some() {
            self.cx.push("&");
        }
        self.cx.table_column += span;
    }
}

/// Identifier for an acronym: both forms, so stripping non-ASCII text is
/// less likely to make two entries collide.
fn acronym_key(name: &str, expansion: &str) -> String {
    format!(
        "{}{}",
        ascii_label_from_string(name),
        ascii_label_from_string(expansion)
    )
}

/// `\includegraphics` options for the image's width and height.
fn image_options(data: &LinkData) -> String {
    let width = data.dimension("width");
    let height = data.dimension("height");
    if width.is_none() && height.is_none() {
        return "keepaspectratio,width=\\textwidth,height=0.75\\textheight".to_string();
    }

    let mut out = String::new();
    if width.is_none() || height.is_none() {
        out.push_str("keepaspectratio,");
    }
    match width {
        Some(width) => out.push_str(&format!("width={},", scaled(&width, "\\textwidth"))),
        None => out.push_str("width=\\textwidth,"),
    }
    match height {
        Some(height) => out.push_str(&format!("height={}", scaled(&height, "\\textheight"))),
        None => out.push_str("height=0.75\\textheight"),
    }
    out
}

/// Percentages become a fraction of `unit`.
fn scaled(value: &str, unit: &str) -> String {
    match value.strip_suffix('%') {
        Some(percent) => {
            let fraction = percent.trim().parse::<f64>().unwrap_or(0.0) / 100.0;
            format!("{fraction:.4}{unit}")
        }
        None => value.to_string(),
    }
}

/// Escape text for LaTeX body text.
pub(crate) fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        let rest = &text[i + c.len_utf8()..];
        match c {
            '{' | '}' | '$' | '%' | '&' | '_' | '#' => {
                out.push('\\');
                out.push(c);
            }
            '^' => out.push_str("\\^{}"),
            '\\' => out.push_str("\\textbackslash{}"),
            '~' => out.push_str("\\ensuremath{\\sim}"),
            '|' => out.push_str("\\textbar{}"),
            '<' => out.push_str("$<$"),
            '>' => out.push_str("$>$"),
            // Only the last slash of a run becomes a breakpoint.
            '/' if rest.starts_with('/') => out.push('/'),
            '/' => out.push_str("\\slash "),
            '\n' if text[..i].ends_with("  ") => out.push_str("\\\\\n"),
            '-' if rest.starts_with('-') => out.push_str("-{}"),
            c => out.push(c),
        }
    }
    out
}

/// Escape a URL for use inside `\href`.
fn escape_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for c in url.chars() {
        match c {
            '$' | '%' | '!' | '&' | '_' | '#' => {
                out.push('\\');
                out.push(c);
            }
            '^' => out.push_str("\\^{}"),
            c => out.push(c),
        }
    }
    out
}
