//! Request-level completion with overload retry.
//!
//! [`CompletionClient`] turns a prompt into the raw content of the first
//! choice. Only overload failures are retried, with a fixed delay and a
//! bounded number of attempts; everything else fails immediately. Each
//! attempt and each delay is raced against the request [`Deadline`].

use std::time::Duration;

use tracing::{debug, warn};

use crate::deadline::Deadline;
use crate::error::{CompletionError, ProviderError};
use crate::provider::Provider;
use crate::types::{ChatMessage, ChatRequest};

/// Retry settings for overload failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, first call included (default: 3).
    pub max_attempts: u32,
    /// Fixed delay between attempts (default: 3 seconds).
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(3000),
        }
    }
}

/// Sends one single-user-message completion per request.
pub struct CompletionClient<P> {
    provider: P,
    retry: RetryConfig,
    default_model: String,
}

impl<P: Provider> CompletionClient<P> {
    pub fn new(provider: P, default_model: impl Into<String>) -> Self {
        Self {
            provider,
            retry: RetryConfig::default(),
            default_model: default_model.into(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Resolve the model for a request: a non-blank override, else the default.
    pub fn resolve_model<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.default_model)
    }

    /// Send `prompt` as a single user message and return the first choice's
    /// content.
    ///
    /// # Errors
    ///
    /// - [`CompletionError::Overloaded`] after `max_attempts` overload failures
    /// - [`CompletionError::Service`] on the first non-overload failure,
    ///   including a response without content
    /// - [`CompletionError::Timeout`] / [`CompletionError::Cancelled`] when
    ///   the deadline interrupts an attempt or a delay
    pub async fn complete(
        &self,
        prompt: &str,
        model: Option<&str>,
        deadline: &Deadline,
    ) -> Result<String, CompletionError> {
        let model = self.resolve_model(model);
        let request = ChatRequest::new(model, vec![ChatMessage::user(prompt)]);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let outcome = deadline.run(self.provider.complete(&request)).await?;
            let content = outcome.and_then(|response| {
                response.into_content().ok_or_else(|| {
                    ProviderError::InvalidResponse(
                        "no valid response from completion service".into(),
                    )
                })
            });

            match content {
                Ok(content) => {
                    if attempt > 1 {
                        debug!(
                            provider = %self.provider.name(),
                            attempt,
                            "completion succeeded after retry"
                        );
                    }
                    return Ok(content);
                }
                Err(err) if err.is_overload() && attempt < max_attempts => {
                    warn!(
                        provider = %self.provider.name(),
                        attempt,
                        delay_ms = self.retry.delay.as_millis() as u64,
                        error = %err,
                        "completion service overloaded, retrying"
                    );
                    deadline.run(tokio::time::sleep(self.retry.delay)).await?;
                }
                Err(err) if err.is_overload() => {
                    warn!(
                        provider = %self.provider.name(),
                        attempts = attempt,
                        error = %err,
                        "completion service still overloaded, giving up"
                    );
                    return Err(CompletionError::Overloaded { attempts: attempt });
                }
                Err(err) => {
                    warn!(
                        provider = %self.provider.name(),
                        attempt,
                        error = %err,
                        "completion failed"
                    );
                    return Err(CompletionError::Service(err.to_string()));
                }
            }
        }
    }
}

impl<P: std::fmt::Debug> std::fmt::Debug for CompletionClient<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("provider", &self.provider)
            .field("retry", &self.retry)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::types::ChatResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    /// Fails `failures` times with `fail_with`, then answers `content`.
    struct MockProvider {
        fail_count: AtomicU32,
        fail_with: fn() -> ProviderError,
        content: &'static str,
        /// Instant and model of every call.
        calls: Mutex<Vec<(Instant, String)>>,
    }

    impl MockProvider {
        fn new(failures: u32, fail_with: fn() -> ProviderError) -> Self {
            Self {
                fail_count: AtomicU32::new(failures),
                fail_with,
                content: r#"{"sql":"SELECT 1","explanation":"one"}"#,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn answering(content: &'static str) -> Self {
            let mut provider = Self::new(0, overloaded);
            provider.content = content;
            provider
        }

        fn recorded(&self) -> Vec<(Instant, String)> {
            self.calls.lock().unwrap().clone()
        }

        fn calls(&self) -> usize {
            self.recorded().len()
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((Instant::now(), request.model.clone()));
            let remaining = self.fail_count.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_count.fetch_sub(1, Ordering::SeqCst);
                return Err((self.fail_with)());
            }
            Ok(ChatResponse::from_content(&request.model, self.content))
        }
    }

    fn overloaded() -> ProviderError {
        ProviderError::Overloaded("HTTP 529".into())
    }

    fn auth_failed() -> ProviderError {
        ProviderError::AuthFailed("bad key".into())
    }

    #[test]
    fn default_retry_config() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.delay, Duration::from_millis(3000));
    }

    #[test]
    fn resolve_model_prefers_non_blank_override() {
        let client = CompletionClient::new(MockProvider::answering("x"), "default-model");
        assert_eq!(client.resolve_model(None), "default-model");
        assert_eq!(client.resolve_model(Some("  ")), "default-model");
        assert_eq!(client.resolve_model(Some("other/model")), "other/model");
    }

    #[tokio::test(start_paused = true)]
    async fn success_first_try() {
        let client = CompletionClient::new(MockProvider::answering("hello"), "m");
        let out = client.complete("prompt", None, &Deadline::none()).await.unwrap();
        assert_eq!(out, "hello");
        assert_eq!(client.provider().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overload_twice_then_success_waits_fixed_delay() {
        let client = CompletionClient::new(MockProvider::new(2, overloaded), "m");
        let out = client.complete("prompt", None, &Deadline::none()).await;
        assert!(out.is_ok());

        let calls = client.provider().recorded();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].0 - calls[0].0, Duration::from_millis(3000));
        assert_eq!(calls[2].0 - calls[1].0, Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn overload_exhausts_attempts() {
        let client = CompletionClient::new(MockProvider::new(10, overloaded), "m");
        let started = Instant::now();
        let err = client
            .complete("prompt", None, &Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Overloaded { attempts: 3 }));
        assert_eq!(client.provider().calls(), 3);
        // Two delays; no sleep after the last attempt.
        assert_eq!(started.elapsed(), Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_counts_as_overload() {
        let client = CompletionClient::new(
            MockProvider::new(1, || ProviderError::RateLimited { retry_after_ms: 50 }),
            "m",
        );
        assert!(client.complete("p", None, &Deadline::none()).await.is_ok());
        assert_eq!(client.provider().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn non_overload_fails_immediately() {
        let client = CompletionClient::new(MockProvider::new(1, auth_failed), "m");
        let err = client
            .complete("prompt", None, &Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Service(ref m) if m.contains("bad key")));
        assert_eq!(client.provider().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_content_is_service_error() {
        let client = CompletionClient::new(MockProvider::answering(""), "m");
        let err = client
            .complete("prompt", None, &Deadline::none())
            .await
            .unwrap_err();
        assert!(
            matches!(err, CompletionError::Service(ref m) if m.contains("no valid response"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn model_override_is_sent() {
        let client = CompletionClient::new(MockProvider::answering("x"), "default-model");
        client
            .complete("p", Some("anthropic/claude-3-haiku"), &Deadline::none())
            .await
            .unwrap();
        let calls = client.provider().recorded();
        assert_eq!(calls[0].1, "anthropic/claude-3-haiku");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_retry_delay() {
        let client = CompletionClient::new(MockProvider::new(10, overloaded), "m");
        let deadline = Deadline::after(Duration::from_millis(4000));
        let started = Instant::now();
        let err = client.complete("p", None, &deadline).await.unwrap_err();
        assert!(matches!(err, CompletionError::Timeout));
        assert_eq!(client.provider().calls(), 2);
        assert_eq!(started.elapsed(), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start() {
        let client = CompletionClient::new(MockProvider::answering("x"), "m");
        let deadline = Deadline::none();
        deadline.token().cancel();
        let err = client.complete("p", None, &deadline).await.unwrap_err();
        assert!(matches!(err, CompletionError::Cancelled));
        assert_eq!(client.provider().calls(), 0);
    }
}
