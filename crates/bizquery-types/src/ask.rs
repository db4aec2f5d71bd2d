//! Request, outcome, and response types for a single ask.
//!
//! [`AskResult`] is what the pipeline produces: a tagged union of success
//! or a classified failure. [`AskResponse`] is its JSON wire form as sent
//! to HTTP clients and printed by the CLI.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Inbound payload for `POST /api/ask`.
///
/// `question` is kept as a raw JSON value: the sanitizer decides what a
/// usable question is, including rejecting non-string values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AskRequest {
    /// The user's free-text business question (untrusted).
    #[serde(default)]
    pub question: Value,

    /// Optional completion model override.
    #[serde(default)]
    pub model: Option<String>,
}

impl AskRequest {
    /// Create a request for a plain text question using the default model.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: Value::String(question.into()),
            model: None,
        }
    }

    /// Set the model override.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Failure classification shared by the pipeline, HTTP layer, and CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Missing, non-textual, or too-long question.
    InputError,
    /// The completion service stayed overloaded through every attempt.
    ServiceOverloaded,
    /// Any other completion service failure.
    ServiceError,
    /// Completion content was not the expected JSON contract.
    ParseError,
    /// The generated statement is not an allowed read-only query.
    PolicyError,
    /// The store rejected or failed the guarded query.
    DatabaseError,
    /// The request deadline expired.
    Timeout,
    /// The caller went away before the answer was ready.
    Cancelled,
    /// Rejected by the HTTP rate limiter.
    RateLimited,
    /// Unexpected failure caught at the process boundary.
    Internal,
}

impl ErrorKind {
    /// HTTP status code used when this failure is returned over HTTP.
    pub fn http_status(self) -> u16 {
        match self {
            Self::InputError | Self::PolicyError => 400,
            Self::RateLimited => 429,
            Self::Cancelled => 499,
            Self::ServiceError | Self::ParseError | Self::DatabaseError | Self::Internal => 500,
            Self::ServiceOverloaded => 503,
            Self::Timeout => 504,
        }
    }

    /// Whether the failure was caused by the client's input rather than
    /// by a server-side or upstream problem.
    pub fn is_client_error(self) -> bool {
        (400..500).contains(&self.http_status())
    }

    /// Stable string name (matches the serialized form).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InputError => "InputError",
            Self::ServiceOverloaded => "ServiceOverloaded",
            Self::ServiceError => "ServiceError",
            Self::ParseError => "ParseError",
            Self::PolicyError => "PolicyError",
            Self::DatabaseError => "DatabaseError",
            Self::Timeout => "Timeout",
            Self::Cancelled => "Cancelled",
            Self::RateLimited => "RateLimited",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One result row: column name to scalar value, in the store's column order.
///
/// Serializes as a JSON object whose keys appear in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column value.
    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.columns.push((column.into(), value));
    }

    /// Look up a value by column name (first match wins for duplicate names).
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = Row;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a row object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Row, A::Error> {
                let mut row = Row::new();
                while let Some((name, value)) = access.next_entry::<String, Value>()? {
                    row.push(name, value);
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

/// Outcome of one pipeline execution.
///
/// The first failing stage determines the failure; no partial rows are
/// ever attached to a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum AskResult {
    /// The guarded query ran and produced rows.
    Success {
        /// The guarded SQL that was executed.
        sql: String,
        /// Model-provided explanation (may be empty).
        explanation: String,
        /// Result rows in store order.
        rows: Vec<Row>,
    },
    /// A stage failed.
    Failure {
        /// Which class of failure.
        kind: ErrorKind,
        /// User-facing message.
        message: String,
        /// Structured diagnostics (sql, engine message, ...), when available.
        details: Option<Value>,
    },
}

impl AskResult {
    /// Build a failure without details.
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Returns `true` for [`AskResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The failure kind, if this is a failure.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    /// HTTP status for this outcome.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Success { .. } => 200,
            Self::Failure { kind, .. } => kind.http_status(),
        }
    }

    /// Convert into the wire response.
    pub fn into_response(self) -> AskResponse {
        AskResponse::from(self)
    }
}

/// JSON wire shape of an ask response.
///
/// Success: `{"success": true, "sql", "explanation", "rows"}`.
/// Failure: `{"success": false, "error", "kind", "details"?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Row>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<AskResult> for AskResponse {
    fn from(result: AskResult) -> Self {
        match result {
            AskResult::Success {
                sql,
                explanation,
                rows,
            } => Self {
                success: true,
                sql: Some(sql),
                explanation: Some(explanation),
                rows: Some(rows),
                error: None,
                kind: None,
                details: None,
            },
            AskResult::Failure {
                kind,
                message,
                details,
            } => Self {
                success: false,
                sql: None,
                explanation: None,
                rows: None,
                error: Some(message),
                kind: Some(kind),
                details,
            },
        }
    }
}
