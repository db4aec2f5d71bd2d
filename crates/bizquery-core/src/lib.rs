//! Question-to-answer pipeline for bizquery.
//!
//! Stages, composed strictly in order by [`AskPipeline`]:
//!
//! 1. [`sanitize`] -- clean and bound the raw question
//! 2. [`prompt`] -- render the fixed schema and question into an instruction
//! 3. completion -- [`bizquery_llm::CompletionClient`] with overload retry
//! 4. [`response`] -- decode the completion into `{sql, explanation}`
//! 5. [`guard`] -- read-only policy and mandatory date predicate
//! 6. [`executor`] -- run the guarded SELECT against a read-only store
//! 7. [`assemble`] -- map success or the first failure to an [`AskResult`]
//!
//! Every stage failure is terminal for its request and surfaces as an
//! [`AskResult::Failure`]; nothing on this path panics.
//!
//! [`AskResult`]: bizquery_types::AskResult
//! [`AskResult::Failure`]: bizquery_types::AskResult::Failure

pub mod assemble;
pub mod demo;
pub mod error;
pub mod executor;
pub mod guard;
pub mod pipeline;
pub mod prompt;
pub mod response;
pub mod sanitize;

pub use error::AskError;
pub use executor::{ExecError, QueryExecutor, ReadOnlyDatabase};
pub use guard::{DateRewrite, GuardedSql, PolicyError, guard};
pub use pipeline::{AskPipeline, PipelineOptions};
pub use response::{ParseError, ParsedAnswer, parse_answer};
