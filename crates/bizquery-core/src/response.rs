//! Decoding of completion content into a query and explanation.
//!
//! The contract is strict: the content must be a JSON object with a
//! non-empty string `sql`. `explanation` is optional. SQL legality is
//! not checked here.

use serde_json::Value;
use thiserror::Error;

/// A decoded answer. `sql` is trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAnswer {
    pub sql: String,
    pub explanation: String,
}

/// Why the content was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// Not valid JSON; carries the decoder message.
    InvalidJson(String),
    /// Valid JSON but not an object.
    NotAnObject,
    /// `sql` absent, null, or blank.
    MissingSql,
    /// `sql` present but not a string.
    SqlNotText,
    /// `explanation` present but not a string.
    ExplanationNotText,
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidJson(msg) => write!(f, "{msg}"),
            Self::NotAnObject => f.write_str("expected a JSON object"),
            Self::MissingSql => f.write_str("missing or empty \"sql\" field"),
            Self::SqlNotText => f.write_str("\"sql\" field is not a string"),
            Self::ExplanationNotText => f.write_str("\"explanation\" field is not a string"),
        }
    }
}

/// Completion content that broke the contract. The raw content is kept
/// for diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unusable completion content: {reason}")]
pub struct ParseError {
    pub raw: String,
    pub reason: ParseFailure,
}

impl ParseError {
    fn new(raw: &str, reason: ParseFailure) -> Self {
        Self {
            raw: raw.to_string(),
            reason,
        }
    }

    /// Whether the content decoded as JSON but had no usable SQL.
    pub fn is_missing_sql(&self) -> bool {
        matches!(self.reason, ParseFailure::MissingSql | ParseFailure::SqlNotText)
    }
}

/// Decode completion content.
pub fn parse_answer(content: &str) -> Result<ParsedAnswer, ParseError> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| ParseError::new(content, ParseFailure::InvalidJson(e.to_string())))?;
    let Value::Object(object) = value else {
        return Err(ParseError::new(content, ParseFailure::NotAnObject));
    };

    let sql = match object.get("sql") {
        None | Some(Value::Null) => return Err(ParseError::new(content, ParseFailure::MissingSql)),
        Some(Value::String(sql)) => sql.trim(),
        Some(_) => return Err(ParseError::new(content, ParseFailure::SqlNotText)),
    };
    if sql.is_empty() {
        return Err(ParseError::new(content, ParseFailure::MissingSql));
    }

    let explanation = match object.get("explanation") {
        None | Some(Value::Null) => "",
        Some(Value::String(text)) => text.trim(),
        Some(_) => return Err(ParseError::new(content, ParseFailure::ExplanationNotText)),
    };

    Ok(ParsedAnswer {
        sql: sql.to_string(),
        explanation: explanation.to_string(),
    })
}
