//! Input sanitization for untrusted questions.

use serde_json::Value;

/// Longest accepted question, in characters, after trimming.
pub const MAX_QUESTION_CHARS: usize = 300;

const UNSAFE_CHARS: [char; 5] = ['`', '"', '\'', '\\', ';'];

/// Sanitize a raw question value.
///
/// Non-string values yield the empty string, which callers treat as a
/// rejection.
pub fn sanitize_question(raw: &Value) -> String {
    match raw {
        Value::String(text) => sanitize_text(text),
        _ => String::new(),
    }
}

/// Trim, reject (empty result) when longer than [`MAX_QUESTION_CHARS`],
/// then drop every backtick, quote, backslash, and semicolon.
pub fn sanitize_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() > MAX_QUESTION_CHARS {
        return String::new();
    }
    trimmed.chars().filter(|c| !UNSAFE_CHARS.contains(c)).collect()
}
