//! OpenAI-compatible provider implementation.
//!
//! [`OpenAiCompatProvider`] talks to any endpoint that follows the OpenAI
//! chat completion format (OpenRouter by default). Upstream failures are
//! classified from the HTTP status and the structured error body, never
//! from free-text matching on messages.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::LlmProviderConfig;
use crate::error::{ProviderError, Result};
use crate::provider::Provider;
use crate::types::{ChatRequest, ChatResponse};

/// HTTP statuses that mean "over capacity, try again later".
const OVERLOAD_STATUSES: [u16; 2] = [503, 529];

/// A provider that uses the OpenAI-compatible chat completion API.
pub struct OpenAiCompatProvider {
    config: LlmProviderConfig,
    http: reqwest::Client,
    api_key: Option<String>,
}

impl OpenAiCompatProvider {
    /// Create a provider; the API key is read from `config.api_key_env`
    /// at request time.
    pub fn new(config: LlmProviderConfig) -> Self {
        let http = build_client(&config);
        Self {
            config,
            http,
            api_key: None,
        }
    }

    /// Create a provider with an explicit API key.
    pub fn with_api_key(config: LlmProviderConfig, api_key: String) -> Self {
        let http = build_client(&config);
        Self {
            config,
            http,
            api_key: Some(api_key),
        }
    }

    pub fn config(&self) -> &LlmProviderConfig {
        &self.config
    }

    fn completions_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    /// Resolve the API key: explicit key > environment variable.
    fn resolve_api_key(&self) -> Result<String> {
        if let Some(ref key) = self.api_key {
            return Ok(key.clone());
        }
        std::env::var(&self.config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!("set {} env var", self.config.api_key_env))
            })
    }
}

fn build_client(config: &LlmProviderConfig) -> reqwest::Client {
    let timeout = Duration::from_secs(config.timeout_secs());
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|err| {
            warn!(error = %err, "falling back to default http client");
            reqwest::Client::new()
        })
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Http(err)
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let api_key = self.resolve_api_key()?;
        let url = self.completions_url();

        debug!(
            provider = %self.config.name,
            model = %request.model,
            messages = request.messages.len(),
            "sending chat completion request"
        );

        let mut req = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json");

        for (k, v) in &self.config.headers {
            req = req.header(k.as_str(), v.as_str());
        }

        let response = req.json(request).send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let header_ms = parse_retry_after_header(&response);
        let body = response.text().await.map_err(transport_error)?;

        if !(200..300).contains(&status) {
            let err = classify_failure(status, &body, header_ms, &request.model);
            warn!(
                provider = %self.config.name,
                status,
                error = %err,
                "chat completion failed"
            );
            return Err(err);
        }

        // Some gateways report upstream failures inside a 200 body.
        let value: Value = serde_json::from_str(&body).map_err(|e| {
            ProviderError::InvalidResponse(format!("failed to parse response: {e}"))
        })?;
        if let Some(err) = classify_error_object(&value) {
            warn!(
                provider = %self.config.name,
                error = %err,
                "chat completion returned an error object"
            );
            return Err(err);
        }

        let chat_response: ChatResponse = serde_json::from_value(value).map_err(|e| {
            ProviderError::InvalidResponse(format!("failed to parse response: {e}"))
        })?;

        debug!(
            provider = %self.config.name,
            model = %chat_response.model,
            choices = chat_response.choices.len(),
            "chat completion response received"
        );

        Ok(chat_response)
    }
}

/// Map a non-2xx response to a typed error.
fn classify_failure(status: u16, body: &str, header_ms: Option<u64>, model: &str) -> ProviderError {
    if OVERLOAD_STATUSES.contains(&status) {
        return ProviderError::Overloaded(format!("HTTP {status}"));
    }

    let value: Option<Value> = serde_json::from_str(body).ok();
    if let Some(err) = value.as_ref().and_then(classify_overload_object) {
        return err;
    }

    match status {
        429 => {
            // Quota exhaustion is reported as 429 too, but never clears by waiting.
            if is_quota_exhausted(value.as_ref()) {
                let msg = value
                    .as_ref()
                    .and_then(extract_error_message)
                    .unwrap_or_else(|| "credits exhausted or spending limit reached".into());
                return ProviderError::RequestFailed(msg);
            }
            let retry_after_ms = header_ms
                .or_else(|| value.as_ref().and_then(parse_retry_after_ms))
                .unwrap_or(1000);
            ProviderError::RateLimited { retry_after_ms }
        }
        401 | 403 => ProviderError::AuthFailed(body.to_string()),
        404 => ProviderError::ModelNotFound(format!("model '{model}': {body}")),
        _ => ProviderError::RequestFailed(format!("HTTP {status}: {body}")),
    }
}

/// Inspect an `{"error": {...}}` object carried in a response body.
fn classify_error_object(value: &Value) -> Option<ProviderError> {
    let error = value.get("error")?;
    if let Some(err) = classify_overload_object(value) {
        return Some(err);
    }
    let message = extract_error_message(value).unwrap_or_else(|| error.to_string());
    Some(ProviderError::RequestFailed(message))
}

/// Overload markers: code 503/529, or type/code `overloaded`/`overloaded_error`.
fn classify_overload_object(value: &Value) -> Option<ProviderError> {
    let error = value.get("error")?;
    let numeric_code = error
        .get("code")
        .and_then(|c| c.as_u64().or_else(|| c.as_str().and_then(|s| s.parse().ok())));
    let is_overload_code =
        numeric_code.is_some_and(|c| OVERLOAD_STATUSES.iter().any(|s| u64::from(*s) == c));
    let is_overload_tag = ["type", "code"].iter().any(|field| {
        matches!(
            error.get(*field).and_then(Value::as_str),
            Some("overloaded" | "overloaded_error")
        )
    });
    if is_overload_code || is_overload_tag {
        let message = extract_error_message(value).unwrap_or_else(|| "overloaded".into());
        return Some(ProviderError::Overloaded(message));
    }
    None
}

fn is_quota_exhausted(value: Option<&Value>) -> bool {
    let Some(error) = value.and_then(|v| v.get("error")) else {
        return false;
    };
    let tag_matches = ["type", "code"].iter().any(|field| {
        matches!(
            error.get(*field).and_then(Value::as_str),
            Some("insufficient_quota" | "billing_hard_limit_reached")
        )
    });
    let payment_required = error.get("code").and_then(Value::as_u64) == Some(402);
    tag_matches || payment_required
}

/// Extract a human-readable error message from a JSON error body.
fn extract_error_message(value: &Value) -> Option<String> {
    value.get("error").and_then(|v| {
        v.get("message")
            .and_then(|m| m.as_str())
            .map(String::from)
            .or_else(|| v.as_str().map(String::from))
    })
}

/// Numeric `Retry-After` header value, in milliseconds.
fn parse_retry_after_header(response: &reqwest::Response) -> Option<u64> {
    let header_val = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())?;
    let secs = header_val.trim().parse::<f64>().ok()?;
    Some((secs * 1000.0).max(0.0) as u64)
}

fn parse_retry_after_ms(value: &Value) -> Option<u64> {
    value.get("retry_after_ms").and_then(Value::as_u64).or_else(|| {
        value
            .get("retry_after")
            .and_then(Value::as_f64)
            .map(|secs| (secs * 1000.0) as u64)
    })
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("name", &self.config.name)
            .field("base_url", &self.config.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}
