//! Error types for mmd-export operations.

use thiserror::Error;

use crate::options::Format;
use crate::tree::NodeKind;

/// Errors that can occur while loading or exporting a document tree.
///
/// Failed lookups (an undefined link label, an unknown footnote) are not
/// errors: they surface as `None` or as literal fallback text in the output.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid tree: {0}")]
    InvalidTree(String),

    #[error("Unknown output format: {0}")]
    UnknownFormat(String),

    #[error("{format:?} output cannot place a {kind:?} node here")]
    UnexpectedNode { kind: NodeKind, format: Format },

    #[error("Source text needs a MultiMarkdown parser; pass a JSON tree or use --to mmd")]
    SourceNeedsParser,
}

pub type Result<T> = std::result::Result<T, Error>;
