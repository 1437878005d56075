//! Label normalization for reference, heading and note lookups.
//!
//! Two normal forms are used when matching a reference against its
//! definition: the *clean* form (whitespace collapsed) and the *label* form
//! (a slug safe for use as an HTML id or LaTeX label).

/// Convert raw text into a label suitable for ids and cross-references.
///
/// Output is lowercase. The first kept character must be an ASCII letter;
/// after that ASCII letters, digits and `. _ - :` are kept, each run of
/// whitespace becomes a single `-`, and everything else is dropped.
/// Non-ASCII characters pass through unchanged.
///
/// # Examples
///
/// ```
/// use mmd_export::label::label_from_string;
///
/// assert_eq!(label_from_string("My Label"), "my-label");
/// assert_eq!(label_from_string("1. Introduction!"), "introduction");
/// assert_eq!(label_from_string("Café au lait"), "café-au-lait");
/// ```
pub fn label_from_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut valid = false;
    let mut pending_space = false;

    for c in text.chars() {
        if !c.is_ascii() {
            if pending_space {
                out.push('-');
                pending_space = false;
            }
            out.push(c);
            valid = true;
        } else if !valid {
            if c.is_ascii_alphabetic() {
                out.push(c.to_ascii_lowercase());
                valid = true;
            }
        } else if c.is_ascii_whitespace() {
            pending_space = true;
        } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ':') {
            if pending_space {
                out.push('-');
                pending_space = false;
            }
            out.push(c.to_ascii_lowercase());
        }
    }

    out
}

/// Label form restricted to ASCII, for outputs that cannot carry other text
/// in identifiers.
pub fn ascii_label_from_string(text: &str) -> String {
    label_from_string(text)
        .chars()
        .filter(char::is_ascii)
        .collect()
}

/// Metadata key form: the label form with whitespace removed, so
/// `Base Header Level` and `baseheaderlevel` name the same key.
///
/// ```
/// use mmd_export::label::key_from_string;
///
/// assert_eq!(key_from_string("Base Header Level"), "baseheaderlevel");
/// assert_eq!(key_from_string("LaTeX Input"), "latexinput");
/// ```
pub fn key_from_string(text: &str) -> String {
    let joined: String = text.split_whitespace().collect();
    label_from_string(&joined)
}

/// Collapse runs of spaces, tabs and newlines into one space.
///
/// Leading whitespace is dropped; a single trailing space is kept when the
/// input ends in whitespace.
///
/// ```
/// use mmd_export::label::clean_string;
///
/// assert_eq!(clean_string("  see\n  also\tthis"), "see also this");
/// ```
pub fn clean_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut block_whitespace = true;

    for c in text.chars() {
        if matches!(c, '\t' | ' ' | '\n' | '\r') {
            if !block_whitespace {
                out.push(' ');
                block_whitespace = true;
            }
        } else {
            out.push(c);
            block_whitespace = false;
        }
    }

    out
}

/// Strip trailing whitespace in place.
pub fn trim_trailing_whitespace(text: &mut String) {
    let len = text.trim_end().len();
    text.truncate(len);
}
