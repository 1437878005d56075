//! Utility functions with platform-specific implementations.

use std::borrow::Cow;

/// Get a time-based seed for `RANDOM_FOOT` numbering.
///
/// On native platforms, uses `SystemTime::now()`.
/// On WASM, uses `js_sys::Date::now()`.
#[cfg(not(target_arch = "wasm32"))]
pub fn time_seed_nanos() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(12345)
}

#[cfg(target_arch = "wasm32")]
pub fn time_seed_nanos() -> u64 {
    // js_sys::Date::now() returns milliseconds as f64
    (js_sys::Date::now() * 1_000_000.0) as u64
}

/// Decode the bytes of a source file.
///
/// A byte order mark selects UTF-8 or UTF-16 and is dropped. Otherwise the
/// bytes are read as UTF-8, and text that is not valid UTF-8 is taken to be
/// Windows-1252, the usual encoding of older hand-written sources.
///
/// ```
/// use mmd_export::util::decode_text;
///
/// assert_eq!(decode_text("caf\u{e9}".as_bytes()), "café");
/// assert_eq!(decode_text(b"caf\xe9"), "café");
/// ```
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    // UTF_8.decode sniffs the BOM, which may switch to UTF-16
    let (result, encoding, malformed) = encoding_rs::UTF_8.decode(bytes);
    if !malformed || encoding != encoding_rs::UTF_8 {
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_borrows() {
        let text = decode_text(b"plain text");
        assert!(matches!(text, Cow::Borrowed("plain text")));
    }

    #[test]
    fn test_decode_strips_bom() {
        assert_eq!(decode_text(b"\xef\xbb\xbfTitle: x"), "Title: x");
    }

    #[test]
    fn test_decode_utf16_with_bom() {
        let bytes = [0xFF, 0xFE, b'h', 0, b'i', 0];
        assert_eq!(decode_text(&bytes), "hi");
    }

    #[test]
    fn test_decode_windows_1252_fallback() {
        // 0x93/0x94 are curly double quotes in Windows-1252
        assert_eq!(decode_text(b"\x93quoted\x94"), "\u{201c}quoted\u{201d}");
    }

    #[test]
    fn test_time_seed_nonzero() {
        assert_ne!(time_seed_nanos(), 0);
    }
}
