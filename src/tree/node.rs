//! Tree node types and kinds.

use serde::{Deserialize, Serialize};

use super::link::LinkData;

/// Unique identifier for a node within a [`Tree`](super::Tree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The root node ID (always 0).
    pub const ROOT: NodeId = NodeId(0);
}

/// Syntactic kind of a node, as produced by the MultiMarkdown parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Synthetic document root.
    Root,
    NoType,
    /// Anonymous grouping of siblings.
    List,
    /// Literal text run.
    Str,
    /// Whitespace between words; text is the original whitespace.
    Space,
    /// Block text without paragraph markup (tight list items).
    Plain,
    Para,
    HRule,
    /// Raw HTML block, passed through by HTML output.
    HtmlBlock,
    /// Code block; text is the code, an optional `VerbatimType` child names the language.
    Verbatim,
    VerbatimFence,
    VerbatimType,
    BulletList,
    OrderedList,
    ListItem,
    /// Document metadata block; children are `MetaKey` nodes.
    Metadata,
    /// Metadata key; text is the key, the first child the `MetaValue`.
    MetaKey,
    MetaValue,
    /// End-of-document marker.
    Footer,
    /// A heading together with the content up to the next heading of equal rank.
    HeadingSection,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    /// Explicit heading label (`[label]` after the heading text).
    AutoLabel,
    Apostrophe,
    Ellipsis,
    EmDash,
    EnDash,
    SingleQuoted,
    DoubleQuoted,
    LineBreak,
    /// Math with its delimiters; text is the whole span.
    MathSpan,
    Strong,
    Emph,
    /// Inline code; text is the code.
    Code,
    /// Link reference definition; carries link data.
    LinkReference,
    /// Inline or reference link; children are the link text.
    Link,
    Image,
    /// Image standing alone in a paragraph (rendered as a figure).
    ImageBlock,
    /// Footnote or glossary reference; text is the label, children an inline body.
    NoteReference,
    /// Footnote definition; text is the label.
    NoteSource,
    NoteLabel,
    /// Glossary definition; text is the label.
    GlossarySource,
    /// Glossary entry name; the first child holds the term.
    GlossaryTerm,
    GlossarySortKey,
    GlossaryLabel,
    /// Citation; link label is the key, children the locator.
    Citation,
    /// Citation that adds a source to the bibliography without a mark.
    NoCitation,
    /// Note definition that has been cited at least once.
    CitationSource,
    /// `[%key]` metadata substitution; text is the key.
    Variable,
    BlockquoteMarker,
    Blockquote,
    /// Unparsed block content awaiting a second parse.
    Raw,
    /// Inline raw HTML.
    Html,
    DefList,
    Term,
    Definition,
    Table,
    TableHead,
    TableBody,
    TableRow,
    TableCell,
    /// Column alignment row; text holds one alignment letter per column.
    TableSeparator,
    TableCaption,
    TableLabel,
    /// Column span marker; text holds one `|` per extra column.
    CellSpan,
    Superscript,
    Subscript,
    /// Abbreviation definition; text is the short form, children the expansion.
    Abbreviation,
    /// A single node matched by an abbreviation.
    Abbr,
    /// First node of a multi-node abbreviation match.
    AbbrStart,
    /// Last node of a multi-node abbreviation match.
    AbbrStop,
    /// Retired definition; renders as nothing.
    KeyCounter,
    /// `{{TOC}}` placeholder.
    Toc,
    CriticAddition,
    CriticDeletion,
    CriticSubstitution,
    CriticComment,
    CriticHighlight,
}

impl NodeKind {
    /// Heading level 1-6 for `H1`..`H6`.
    pub fn heading_level(self) -> Option<u8> {
        match self {
            NodeKind::H1 => Some(1),
            NodeKind::H2 => Some(2),
            NodeKind::H3 => Some(3),
            NodeKind::H4 => Some(4),
            NodeKind::H5 => Some(5),
            NodeKind::H6 => Some(6),
            _ => None,
        }
    }

    pub fn is_heading(self) -> bool {
        self.heading_level().is_some()
    }

    /// Kinds that may carry link data.
    pub fn carries_link(self) -> bool {
        matches!(
            self,
            NodeKind::LinkReference
                | NodeKind::Link
                | NodeKind::Image
                | NodeKind::ImageBlock
                | NodeKind::Citation
                | NodeKind::NoCitation
        )
    }
}

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Text payload (literal text, label, code, key...).
    pub text: Option<String>,
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    pub link: Option<LinkData>,
}

impl Node {
    /// Create a new node with the given kind.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            text: None,
            parent: None,
            first_child: None,
            next_sibling: None,
            link: None,
        }
    }

    /// Create a node with a text payload.
    pub fn with_text(kind: NodeKind, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(kind)
        }
    }

    /// Create a node carrying link data.
    pub fn with_link(kind: NodeKind, link: LinkData) -> Self {
        Self {
            link: Some(link),
            ..Self::new(kind)
        }
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}
