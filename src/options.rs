//! Export configuration: output formats and extension flags.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Set of processing extensions, stored as a bit mask.
///
/// ```
/// use mmd_export::Extensions;
///
/// let flags = Extensions::DEFAULT | Extensions::COMPLETE;
/// assert!(flags.contains(Extensions::SMART));
/// assert!(!flags.contains(Extensions::SNIPPET));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extensions(u32);

impl Extensions {
    pub const NONE: Extensions = Extensions(0);
    /// Typographic quotes and dashes.
    pub const SMART: Extensions = Extensions(1 << 0);
    /// Footnotes, glossary entries and citations.
    pub const NOTES: Extensions = Extensions(1 << 1);
    /// Mask `mailto:` addresses with character entities.
    pub const OBFUSCATE: Extensions = Extensions(1 << 2);
    /// Do not generate heading or table labels.
    pub const NO_LABELS: Extensions = Extensions(1 << 3);
    /// Markdown.pl compatibility: no slug fallback, no autolabels.
    pub const COMPATIBILITY: Extensions = Extensions(1 << 4);
    /// Emit a complete document rather than a fragment.
    pub const COMPLETE: Extensions = Extensions(1 << 5);
    /// Never emit a document shell, even with metadata present.
    pub const SNIPPET: Extensions = Extensions(1 << 6);
    /// The document head has already been closed.
    pub const HEAD_CLOSED: Extensions = Extensions(1 << 7);
    /// Pseudo-random public footnote numbers.
    pub const RANDOM_FOOT: Extensions = Extensions(1 << 8);
    /// Process markdown inside HTML blocks (parser side).
    pub const PROCESS_HTML: Extensions = Extensions(1 << 9);
    /// Backslash-newline forces a line break (parser side).
    pub const ESCAPED_LINE_BREAKS: Extensions = Extensions(1 << 10);
    pub const CRITIC_ACCEPT: Extensions = Extensions(1 << 11);
    pub const CRITIC_REJECT: Extensions = Extensions(1 << 12);
    /// Group headings with their content in heading sections.
    pub const HEADING_SECTION: Extensions = Extensions(1 << 13);

    pub const DEFAULT: Extensions =
        Extensions(Self::SMART.0 | Self::NOTES.0 | Self::OBFUSCATE.0);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn from_bits(bits: u32) -> Self {
        Extensions(bits)
    }

    pub fn contains(self, other: Extensions) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Extensions) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Extensions) {
        self.0 &= !other.0;
    }

    pub fn set(&mut self, other: Extensions, on: bool) {
        if on {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }
}

impl BitOr for Extensions {
    type Output = Extensions;

    fn bitor(self, rhs: Self) -> Self::Output {
        Extensions(self.0 | rhs.0)
    }
}

impl BitOrAssign for Extensions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Extensions {
    type Output = Extensions;

    fn bitand(self, rhs: Self) -> Self::Output {
        Extensions(self.0 & rhs.0)
    }
}

/// Output format of an export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// Plain text dump.
    Text,
    /// HTML fragment or complete XHTML-flavoured document.
    #[default]
    Html,
    /// LaTeX article body.
    Latex,
    /// LaTeX for the memoir class.
    Memoir,
    /// LaTeX for beamer slides.
    Beamer,
    /// OPML outline.
    Opml,
    /// Flat OpenDocument text (`.fodt`).
    Odf,
    /// Rich Text Format.
    Rtf,
    /// LyX document.
    Lyx,
    /// Table of contents as a nested markdown list.
    Toc,
    /// Source text after transclusion, unrendered.
    Mmd,
    /// CriticMarkup with all changes accepted.
    CriticAccept,
    /// CriticMarkup with all changes rejected.
    CriticReject,
    /// CriticMarkup shown as HTML markup.
    CriticHtml,
}

impl Format {
    /// Parse a format name as given on the command line.
    ///
    /// ```
    /// use mmd_export::Format;
    ///
    /// assert_eq!(Format::from_name("LaTeX").unwrap(), Format::Latex);
    /// assert_eq!(Format::from_name("lyx").unwrap(), Format::Lyx);
    /// assert!(Format::from_name("docx").is_err());
    /// ```
    pub fn from_name(name: &str) -> Result<Format> {
        let format = match name.to_ascii_lowercase().as_str() {
            "text" | "txt" => Format::Text,
            "html" | "xhtml" => Format::Html,
            "latex" | "tex" => Format::Latex,
            "memoir" => Format::Memoir,
            "beamer" => Format::Beamer,
            "opml" => Format::Opml,
            "odf" | "fodt" => Format::Odf,
            "rtf" => Format::Rtf,
            "lyx" => Format::Lyx,
            "toc" => Format::Toc,
            "mmd" | "original" => Format::Mmd,
            "critic-accept" => Format::CriticAccept,
            "critic-reject" => Format::CriticReject,
            "critic-html" => Format::CriticHtml,
            _ => return Err(Error::UnknownFormat(name.to_string())),
        };
        Ok(format)
    }

    /// Extension used for batch-mode output files.
    pub fn file_extension(self) -> &'static str {
        match self {
            Format::Text | Format::Toc | Format::CriticAccept | Format::CriticReject => "txt",
            Format::Html | Format::CriticHtml => "html",
            Format::Latex | Format::Memoir | Format::Beamer => "tex",
            Format::Opml => "opml",
            Format::Odf => "fodt",
            Format::Rtf => "rtf",
            Format::Lyx => "lyx",
            Format::Mmd => "mmd_out",
        }
    }

    /// Batch-mode output path: the input path with its extension replaced.
    pub fn output_path(self, input: &Path) -> PathBuf {
        input.with_extension(self.file_extension())
    }

    /// Formats that skip reference and abbreviation extraction.
    pub fn skips_extraction(self) -> bool {
        matches!(
            self,
            Format::Opml | Format::CriticAccept | Format::CriticReject | Format::CriticHtml
        )
    }

    pub fn is_latex(self) -> bool {
        matches!(self, Format::Latex | Format::Memoir | Format::Beamer)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Text => "text",
            Format::Html => "html",
            Format::Latex => "latex",
            Format::Memoir => "memoir",
            Format::Beamer => "beamer",
            Format::Opml => "opml",
            Format::Odf => "odf",
            Format::Rtf => "rtf",
            Format::Lyx => "lyx",
            Format::Toc => "toc",
            Format::Mmd => "mmd",
            Format::CriticAccept => "critic-accept",
            Format::CriticReject => "critic-reject",
            Format::CriticHtml => "critic-html",
        };
        f.write_str(name)
    }
}

/// Configuration for one export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub format: Format,
    pub extensions: Extensions,
    /// Seed for `RANDOM_FOOT` numbering; the same seed gives the same numbers.
    pub random_seed: u64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: Format::Html,
            extensions: Extensions::DEFAULT,
            random_seed: 0,
        }
    }
}

impl ExportOptions {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_extension(mut self, extension: Extensions) -> Self {
        self.extensions.insert(extension);
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }
}
