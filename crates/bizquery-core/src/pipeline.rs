//! The composed question-to-answer pipeline.

use std::sync::Arc;
use std::time::Duration;

use bizquery_llm::{CompletionClient, Deadline, Provider};
use bizquery_types::config::PipelineConfig;
use bizquery_types::{AskRequest, AskResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::assemble::{Answer, assemble};
use crate::error::AskError;
use crate::executor::QueryExecutor;
use crate::guard::guard;
use crate::prompt::build_prompt;
use crate::response::parse_answer;
use crate::sanitize::sanitize_question;

/// Per-request budgets and exposure settings.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Whole-request budget, sanitize through execute.
    pub deadline: Duration,
    /// Include raw completion content in failure details.
    pub expose_diagnostics: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            deadline: Duration::from_secs(config.deadline_secs),
            expose_diagnostics: config.expose_diagnostics,
        }
    }
}

/// Sanitize, prompt, complete, parse, guard, execute, assemble.
///
/// Holds no per-request state; one instance serves concurrent requests.
pub struct AskPipeline {
    completion: CompletionClient<Arc<dyn Provider>>,
    executor: QueryExecutor,
    options: PipelineOptions,
}

impl AskPipeline {
    pub fn new(completion: CompletionClient<Arc<dyn Provider>>, executor: QueryExecutor) -> Self {
        Self {
            completion,
            executor,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Answer with a fresh deadline of `options.deadline`.
    pub async fn ask(&self, request: &AskRequest) -> AskResult {
        self.ask_with_cancel(request, CancellationToken::new()).await
    }

    /// Answer with a fresh deadline, also stopping when `cancel` fires.
    pub async fn ask_with_cancel(&self, request: &AskRequest, cancel: CancellationToken) -> AskResult {
        let deadline = Deadline::after(self.options.deadline).with_cancel(cancel);
        self.ask_with_deadline(request, &deadline).await
    }

    pub async fn ask_with_deadline(&self, request: &AskRequest, deadline: &Deadline) -> AskResult {
        let outcome = self.execute(request, deadline).await;
        assemble(outcome, self.options.expose_diagnostics)
    }

    async fn execute(&self, request: &AskRequest, deadline: &Deadline) -> Result<Answer, AskError> {
        let question = sanitize_question(&request.question);
        if question.trim().is_empty() {
            return Err(AskError::Input);
        }
        info!(chars = question.chars().count(), "question received");
        debug!(question = %question, "sanitized question");

        let prompt = build_prompt(&question);
        debug!(bytes = prompt.len(), "prompt built");

        let content = self
            .completion
            .complete(&prompt, request.model.as_deref(), deadline)
            .await?;
        debug!(content = %content, "raw completion content");

        let parsed = parse_answer(&content)?;
        let guarded = match guard(&parsed.sql) {
            Ok(guarded) => guarded,
            Err(source) => {
                return Err(AskError::Policy {
                    explanation: parsed.explanation,
                    source,
                });
            }
        };
        info!(sql = %guarded, rewrite = ?guarded.rewrite(), "guarded sql");

        match self.executor.run(&guarded, deadline).await {
            Ok(rows) => {
                info!(rows = rows.len(), "query executed");
                Ok(Answer {
                    sql: guarded.into_string(),
                    explanation: parsed.explanation,
                    rows,
                })
            }
            Err(err) => Err(AskError::from_exec(
                guarded.into_string(),
                parsed.explanation,
                err,
            )),
        }
    }
}
