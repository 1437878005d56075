//! `{{file}}` transclusion over raw source text.
//!
//! Transclusion runs before parsing, on the text of the top-level source.
//! Each `{{path}}` marker is replaced by the named file with its metadata
//! block removed. Included files are expanded in turn, so a chapter can pull
//! in its own sections. Markers that cannot be satisfied (a missing file, a
//! file that is already being included) stay in the text as written.
//!
//! Callers skip this step entirely in `COMPATIBILITY` mode.

use std::path::{Path, PathBuf};

use memchr::memmem;
use tracing::{debug, warn};

use crate::label::key_from_string;
use crate::options::Format;
use crate::util::decode_text;

/// Replace every `{{path}}` marker in `source` with the contents of the
/// named file.
///
/// Paths are relative to `base_dir` (or to a `transcludebase` given in the
/// source's metadata) unless absolute. A trailing `.*` is replaced by the
/// extension of `format`; `Format::Mmd` keeps the wildcard. Every file that
/// was read is appended to `manifest`.
///
/// ```no_run
/// use std::path::Path;
/// use mmd_export::Format;
/// use mmd_export::transclude::transclude_source;
///
/// let text = transclude_source("{{chapter1.*}}", Path::new("book"), Format::Html, None);
/// ```
pub fn transclude_source(
    source: &str,
    base_dir: &Path,
    format: Format,
    manifest: Option<&mut Vec<PathBuf>>,
) -> String {
    let mut transcluder = Transcluder {
        format,
        manifest,
        stack: Vec::new(),
    };
    transcluder.expand(source, base_dir)
}

/// Append a `{{file}}` marker for the `mmdfooter` metadata value.
///
/// Lets each chapter share one file of footnotes, citations and
/// abbreviations without the master document including it repeatedly.
pub fn append_mmd_footer(source: &mut String) {
    if let Some(footer) = metadata_value(source, "mmdfooter") {
        source.push_str("\n\n{{");
        source.push_str(&footer);
        source.push_str("}}\n");
    }
}

/// Insert a `{{file}}` marker for the `mmdheader` metadata value after the
/// metadata block.
pub fn prepend_mmd_header(source: &mut String) {
    if let Some(header) = metadata_value(source, "mmdheader") {
        let at = body_offset(source);
        source.insert_str(at, &format!("{{{{{header}}}}}\n\n"));
    }
}

struct Transcluder<'m> {
    format: Format,
    manifest: Option<&'m mut Vec<PathBuf>>,
    /// Files currently being expanded, outermost first.
    stack: Vec<PathBuf>,
}

impl Transcluder<'_> {
    fn expand(&mut self, source: &str, base_dir: &Path) -> String {
        let folder = match metadata_value(source, "transcludebase") {
            Some(base) => base_dir.join(base),
            None => base_dir.to_path_buf(),
        };

        let mut out = String::with_capacity(source.len());
        let mut rest = source;
        while let Some(start) = memmem::find(rest.as_bytes(), b"{{") {
            let inner = &rest[start + 2..];
            let Some(len) = memmem::find(inner.as_bytes(), b"}}") else {
                break;
            };
            let name = &inner[..len];
            if name.is_empty() || name.contains('\n') {
                out.push_str(&rest[..start + 2]);
                rest = inner;
                continue;
            }

            out.push_str(&rest[..start]);
            let marker_end = start + 2 + len + 2;
            match self.include(name, &folder) {
                Some(text) => out.push_str(&text),
                None => out.push_str(&rest[start..marker_end]),
            }
            rest = &rest[marker_end..];
        }
        out.push_str(rest);
        out
    }

    /// Expanded body of the file a marker names, if it can be included.
    fn include(&mut self, name: &str, folder: &Path) -> Option<String> {
        let path = folder.join(self.resolve_wildcard(name));
        if self.stack.contains(&path) {
            warn!(path = %path.display(), "skipping recursive transclusion");
            return None;
        }

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot transclude file");
                return None;
            }
        };
        debug!(path = %path.display(), "transcluding");
        if let Some(manifest) = self.manifest.as_deref_mut() {
            manifest.push(path.clone());
        }

        let text = decode_text(&bytes);
        self.stack.push(path);
        let expanded = self.expand(&text, folder);
        self.stack.pop();
        Some(source_without_metadata(&expanded).to_string())
    }

    fn resolve_wildcard(&self, name: &str) -> String {
        match name.strip_suffix(".*") {
            Some(stem) if self.format != Format::Mmd => {
                format!("{stem}.{}", self.format.file_extension())
            }
            _ => name.to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Source metadata
// ----------------------------------------------------------------------------

/// Split a `Key: value` metadata line.
fn meta_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let mut chars = key.chars();
    let first = chars.next()?;
    if !first.is_alphanumeric()
        || !chars.all(|c| c.is_alphanumeric() || matches!(c, ' ' | '\t' | '_' | '-' | '.'))
        || value.starts_with("//")
    {
        return None;
    }
    Some((key, value))
}

/// Whether `source` opens with a metadata block.
fn has_metadata(source: &str) -> bool {
    source.lines().next().and_then(meta_line).is_some()
}

/// Byte offset of the text after the metadata block.
fn body_offset(source: &str) -> usize {
    if !has_metadata(source) {
        return 0;
    }
    memmem::find(source.as_bytes(), b"\n\n").map_or(source.len(), |at| at + 2)
}

/// Text after the metadata block, if any.
fn source_without_metadata(source: &str) -> &str {
    &source[body_offset(source)..]
}

/// Value of `key` (in key form) in the source's metadata block. Indented
/// continuation lines are joined to the value with newlines.
pub fn metadata_value(source: &str, key: &str) -> Option<String> {
    if !has_metadata(source) {
        return None;
    }

    let mut value: Option<String> = None;
    for line in source.lines() {
        if line.trim().is_empty() {
            break;
        }
        if line.starts_with([' ', '\t']) {
            if let Some(value) = value.as_mut() {
                value.push('\n');
                value.push_str(line.trim());
            }
            continue;
        }
        if value.is_some() {
            break;
        }
        if let Some((name, rest)) = meta_line(line)
            && key_from_string(name) == key
        {
            value = Some(rest.trim().to_string());
        }
    }
    value
}
