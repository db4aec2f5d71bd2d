//! Error types for bizquery-llm.
//!
//! [`ProviderError`] describes what went wrong on a single call to the
//! completion service. [`CompletionError`] is what the request-level
//! [`CompletionClient`](crate::retry::CompletionClient) reports after its
//! retry policy has run.

use thiserror::Error;

use crate::deadline::Interrupted;

/// Errors from a single chat completion call.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The HTTP request to the provider failed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Authentication with the provider was rejected (HTTP 401/403).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The provider returned a transient rate-limit response (HTTP 429).
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested wait time before retrying, in milliseconds.
        retry_after_ms: u64,
    },

    /// The provider reported it is over capacity (HTTP 503/529 or an
    /// `overloaded` error object).
    #[error("service overloaded: {0}")]
    Overloaded(String),

    /// The requested model does not exist on the provider.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The provider has not been configured (e.g. missing API key).
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// The provider returned a response without usable content.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A single HTTP attempt exceeded its timeout.
    #[error("timeout")]
    Timeout,

    /// An HTTP-level error from reqwest.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    /// Whether this failure means the service is temporarily over capacity.
    ///
    /// Only these failures are retried by
    /// [`CompletionClient`](crate::retry::CompletionClient).
    pub fn is_overload(&self) -> bool {
        matches!(
            self,
            ProviderError::Overloaded(_) | ProviderError::RateLimited { .. }
        )
    }
}

/// A convenience type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Message shown to callers when the service stayed overloaded.
pub const OVERLOADED_MESSAGE: &str =
    "Oops! Our AI is a bit overwhelmed right now. Please try again in a moment.";

/// Outcome of a failed [`CompletionClient::complete`](crate::retry::CompletionClient::complete).
#[derive(Error, Debug)]
pub enum CompletionError {
    /// Every attempt failed with an overload error.
    #[error("{OVERLOADED_MESSAGE}")]
    Overloaded {
        /// Number of attempts made.
        attempts: u32,
    },

    /// A non-overload failure; retrying would not help.
    #[error("completion service error: {0}")]
    Service(String),

    /// The request deadline passed before a response arrived.
    #[error("request deadline exceeded")]
    Timeout,

    /// The caller went away.
    #[error("request cancelled")]
    Cancelled,
}

impl From<Interrupted> for CompletionError {
    fn from(value: Interrupted) -> Self {
        match value {
            Interrupted::Expired => CompletionError::Timeout,
            Interrupted::Cancelled => CompletionError::Cancelled,
        }
    }
}
