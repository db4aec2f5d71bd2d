//! Pipeline failure taxonomy.
//!
//! Each [`AskError`] variant names the stage that failed and carries what
//! that stage knew. [`AskError::kind`] classifies it for the wire,
//! [`AskError::user_message`] is what a client sees, and
//! [`AskError::details`] is the structured diagnostic trail.

use std::fmt;

use bizquery_llm::error::OVERLOADED_MESSAGE;
use bizquery_llm::{CompletionError, Interrupted};
use bizquery_types::ErrorKind;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::executor::ExecError;
use crate::guard::PolicyError;
use crate::response::ParseError;
use crate::sanitize::MAX_QUESTION_CHARS;

/// Stage that was running when a deadline or cancellation hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Completion,
    Execution,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Completion => "completion",
            Self::Execution => "execution",
        })
    }
}

#[derive(Error, Debug)]
pub enum AskError {
    #[error("question missing, not text, or longer than {MAX_QUESTION_CHARS} characters")]
    Input,

    #[error("completion service overloaded after {attempts} attempts")]
    Overloaded { attempts: u32 },

    #[error("completion service error: {0}")]
    Service(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("statement refused: {source}")]
    Policy {
        explanation: String,
        #[source]
        source: PolicyError,
    },

    #[error("query failed: {source}")]
    Database {
        sql: String,
        explanation: String,
        #[source]
        source: ExecError,
    },

    #[error("request deadline exceeded during {stage}")]
    Timeout { stage: Stage },

    #[error("request cancelled during {stage}")]
    Cancelled { stage: Stage },
}

impl From<CompletionError> for AskError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Overloaded { attempts } => Self::Overloaded { attempts },
            CompletionError::Service(msg) => Self::Service(msg),
            CompletionError::Timeout => Self::Timeout {
                stage: Stage::Completion,
            },
            CompletionError::Cancelled => Self::Cancelled {
                stage: Stage::Completion,
            },
        }
    }
}

impl AskError {
    /// Classify an executor failure, keeping the guarded SQL and
    /// explanation for the caller's trail.
    pub fn from_exec(sql: String, explanation: String, err: ExecError) -> Self {
        match err {
            ExecError::Interrupted(Interrupted::Expired) => Self::Timeout {
                stage: Stage::Execution,
            },
            ExecError::Interrupted(Interrupted::Cancelled) => Self::Cancelled {
                stage: Stage::Execution,
            },
            source => Self::Database {
                sql,
                explanation,
                source,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Input => ErrorKind::InputError,
            Self::Overloaded { .. } => ErrorKind::ServiceOverloaded,
            Self::Service(_) => ErrorKind::ServiceError,
            Self::Parse(_) => ErrorKind::ParseError,
            Self::Policy { .. } => ErrorKind::PolicyError,
            Self::Database { .. } => ErrorKind::DatabaseError,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Client-facing message.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Input => "Invalid or too long question.",
            Self::Overloaded { .. } => OVERLOADED_MESSAGE,
            Self::Service(_) => "AI service error. Try again later.",
            Self::Parse(err) if err.is_missing_sql() => "AI did not return SQL.",
            Self::Parse(_) => "AI response not in valid JSON.",
            Self::Policy { .. } => "Only SELECT queries are allowed.",
            Self::Database { .. } => "Database error.",
            Self::Timeout { .. } => "The request took too long. Please try again.",
            Self::Cancelled { .. } => "Request cancelled.",
        }
    }

    /// Structured diagnostics. The raw completion content is only included
    /// when `expose_diagnostics` is set.
    pub fn details(&self, expose_diagnostics: bool) -> Option<Value> {
        match self {
            Self::Input => None,
            Self::Overloaded { attempts } => Some(json!({ "attempts": attempts })),
            Self::Service(upstream) => Some(json!({ "upstream": upstream })),
            Self::Parse(err) => {
                let mut details = Map::new();
                if expose_diagnostics {
                    details.insert("rawResponse".into(), Value::String(err.raw.clone()));
                }
                details.insert("parseError".into(), Value::String(err.reason.to_string()));
                Some(Value::Object(details))
            }
            Self::Policy {
                explanation,
                source,
            } => Some(json!({
                "sql": source.sql,
                "explanation": explanation,
                "reason": source.reason.to_string(),
            })),
            Self::Database {
                sql,
                explanation,
                source,
            } => Some(json!({
                "sql": sql,
                "explanation": explanation,
                "dbError": source.engine_message(),
            })),
            Self::Timeout { stage } | Self::Cancelled { stage } => {
                Some(json!({ "stage": stage.to_string() }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::guard;
    use crate::response::parse_answer;

    #[test]
    fn completion_errors_map_to_kinds() {
        let cases = [
            (CompletionError::Overloaded { attempts: 3 }, ErrorKind::ServiceOverloaded),
            (CompletionError::Service("401".into()), ErrorKind::ServiceError),
            (CompletionError::Timeout, ErrorKind::Timeout),
            (CompletionError::Cancelled, ErrorKind::Cancelled),
        ];
        for (err, kind) in cases {
            assert_eq!(AskError::from(err).kind(), kind);
        }
    }

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(AskError::Input.kind().http_status(), 400);
        assert_eq!(AskError::Overloaded { attempts: 3 }.kind().http_status(), 503);
        assert_eq!(AskError::Service("x".into()).kind().http_status(), 500);
        let parse = AskError::from(parse_answer("nope").unwrap_err());
        assert_eq!(parse.kind().http_status(), 500);
        let policy = AskError::Policy {
            explanation: String::new(),
            source: guard("DROP TABLE sales").unwrap_err(),
        };
        assert_eq!(policy.kind().http_status(), 400);
    }

    #[test]
    fn parse_messages_distinguish_missing_sql() {
        let not_json = AskError::from(parse_answer("nope").unwrap_err());
        assert_eq!(not_json.user_message(), "AI response not in valid JSON.");
        let no_sql = AskError::from(parse_answer(r#"{"explanation":"x"}"#).unwrap_err());
        assert_eq!(no_sql.user_message(), "AI did not return SQL.");
    }

    #[test]
    fn raw_response_only_with_diagnostics() {
        let err = AskError::from(parse_answer("<html>").unwrap_err());
        let hidden = err.details(false).unwrap();
        assert!(hidden.get("rawResponse").is_none());
        assert!(hidden.get("parseError").is_some());
        let shown = err.details(true).unwrap();
        assert_eq!(shown["rawResponse"], "<html>");
    }

    #[test]
    fn policy_details_carry_statement() {
        let err = AskError::Policy {
            explanation: "wipes data".into(),
            source: guard("DELETE FROM sales").unwrap_err(),
        };
        let details = err.details(false).unwrap();
        assert_eq!(details["sql"], "DELETE FROM sales");
        assert_eq!(details["explanation"], "wipes data");
        assert_eq!(details["reason"], "only SELECT statements are allowed");
    }

    #[test]
    fn interrupted_execution_is_not_a_database_error() {
        let err = AskError::from_exec(
            "SELECT 1".into(),
            String::new(),
            ExecError::Interrupted(Interrupted::Expired),
        );
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.details(false).unwrap()["stage"], "execution");

        let err = AskError::from_exec("SELECT 1".into(), String::new(), ExecError::NotSelect);
        assert_eq!(err.kind(), ErrorKind::DatabaseError);
        assert_eq!(err.details(false).unwrap()["sql"], "SELECT 1");
    }
}
