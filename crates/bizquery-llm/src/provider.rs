//! The core [`Provider`] trait for chat completions.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatRequest, ChatResponse};

/// A provider that can execute chat completion requests.
///
/// Implementations handle the protocol details for a specific API
/// (authentication, request formatting, error classification). The main
/// implementation is [`OpenAiCompatProvider`](crate::openai_compat::OpenAiCompatProvider).
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns the provider name (e.g. "openrouter").
    fn name(&self) -> &str;

    /// Execute a chat completion request and return the response.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`](crate::error::ProviderError) on network
    /// failure, rejected credentials, overload, or an unusable response.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

#[async_trait]
impl<P: Provider + ?Sized> Provider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        (**self).complete(request).await
    }
}
