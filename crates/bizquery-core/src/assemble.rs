//! Final stage: fold the pipeline outcome into one [`AskResult`].

use bizquery_types::{AskResult, Row};
use tracing::{error, warn};

use crate::error::AskError;

/// A successful pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Guarded SQL as executed.
    pub sql: String,
    pub explanation: String,
    pub rows: Vec<Row>,
}

/// Map the outcome to the uniform result. The first failing stage wins
/// and no rows accompany a failure.
pub fn assemble(outcome: Result<Answer, AskError>, expose_diagnostics: bool) -> AskResult {
    match outcome {
        Ok(answer) => AskResult::Success {
            sql: answer.sql,
            explanation: answer.explanation,
            rows: answer.rows,
        },
        Err(err) => {
            let kind = err.kind();
            if kind.is_client_error() {
                warn!(kind = %kind, error = %err, "ask failed");
            } else {
                error!(kind = %kind, error = %err, "ask failed");
            }
            AskResult::Failure {
                kind,
                message: err.user_message().to_string(),
                details: err.details(expose_diagnostics),
            }
        }
    }
}
