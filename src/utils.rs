//! Utility functions for string bounding, sanitization and log previews.
//!
//! This module provides helper functions used throughout the application:
//! - Character-safe truncation for stored fields and log previews
//! - Printable-character sanitization of model output
//! - JSON error detection for spotting truncated model replies

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a byte
/// count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Keep at most `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => s[..cut].to_string(),
    }
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When the model reply is cut off (e.g. by a token limit) parsing fails
/// with an EOF error.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Whether `c` survives sanitization.
///
/// Newline and tab are kept. Other control, format, private-use and
/// separator characters are dropped, as are noncharacters; the ASCII space is
/// the only separator kept.
fn is_printable(c: char) -> bool {
    match c {
        '\n' | '\t' | ' ' => true,
        // soft hyphen, zero-width and bidi marks, word joiners, BOM
        '\u{00AD}'
        | '\u{061C}'
        | '\u{180E}'
        | '\u{200B}'..='\u{200F}'
        | '\u{202A}'..='\u{202E}'
        | '\u{2060}'..='\u{2064}'
        | '\u{2066}'..='\u{206F}'
        | '\u{FEFF}'
        | '\u{FFF9}'..='\u{FFFB}' => false,
        // private use areas
        '\u{E000}'..='\u{F8FF}' | '\u{F0000}'..='\u{10FFFF}' => false,
        // tag characters
        '\u{E0000}'..='\u{E007F}' => false,
        '\u{FDD0}'..='\u{FDEF}' => false,
        c if (c as u32) & 0xFFFE == 0xFFFE => false,
        c => !c.is_control() && !c.is_whitespace(),
    }
}

/// Strip non-printable characters (keeping `\n` and `\t`) and bound the
/// result to `max` characters.
///
/// Idempotent: sanitizing an already sanitized string returns it unchanged.
pub fn sanitize_text(text: &str, max: usize) -> String {
    text.chars().filter(|&c| is_printable(c)).take(max).collect()
}
