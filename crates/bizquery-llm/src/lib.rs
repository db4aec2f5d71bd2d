//! Completion service client for bizquery.
//!
//! This crate wraps an OpenAI-compatible chat completion endpoint behind a
//! small [`Provider`] trait and adds the request-level policy bizquery
//! needs on top of it. It has no dependency on other bizquery crates.
//!
//! # Architecture
//!
//! - [`Provider`] trait: one chat completion per call
//! - [`OpenAiCompatProvider`]: implements it over HTTP, classifying
//!   upstream failures into typed [`ProviderError`] variants
//! - [`CompletionClient`]: prompt in, content out; retries only overload
//!   failures with a fixed delay, bounded by a per-request [`Deadline`]
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use bizquery_llm::{CompletionClient, Deadline, LlmProviderConfig, OpenAiCompatProvider};
//!
//! let provider = OpenAiCompatProvider::new(LlmProviderConfig::openrouter());
//! let client = CompletionClient::new(provider, "openai/gpt-3.5-turbo");
//!
//! let deadline = Deadline::after(std::time::Duration::from_secs(30));
//! let content = client.complete("Say hi as JSON", None, &deadline).await?;
//! ```

pub mod config;
pub mod deadline;
pub mod error;
pub mod openai_compat;
pub mod provider;
pub mod retry;
pub mod types;

pub use config::LlmProviderConfig;
pub use deadline::{Deadline, Interrupted};
pub use error::{CompletionError, ProviderError, Result};
pub use openai_compat::OpenAiCompatProvider;
pub use provider::Provider;
pub use retry::{CompletionClient, RetryConfig};
pub use types::{ChatMessage, ChatRequest, ChatResponse};
