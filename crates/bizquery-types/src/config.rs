//! Configuration schema types.
//!
//! All structs accept both `snake_case` and `camelCase` field names via
//! `#[serde(alias)]`, and every field has a default so an empty JSON
//! object (`{}`) is a complete configuration. Unknown fields are ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ── Root config ──────────────────────────────────────────────────────────

/// Root configuration for bizquery.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Completion service connection and retry settings.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Relational store settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Per-request pipeline budgets.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

// ── Server ───────────────────────────────────────────────────────────────

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins. Empty means permissive.
    #[serde(default = "default_cors_origins", alias = "corsOrigins")]
    pub cors_origins: Vec<String>,

    /// Per-client rate limit for the ask endpoint.
    #[serde(default, alias = "rateLimit")]
    pub rate_limit: RateLimitConfig,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}
fn default_cors_origins() -> Vec<String> {
    vec!["https://bizquery-ai.vercel.app".into()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Sliding-window rate limit applied per client address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in seconds.
    #[serde(default = "default_window_secs", alias = "windowSecs")]
    pub window_secs: u32,

    /// Requests allowed per client per window. 0 disables the limit.
    #[serde(default = "default_max_requests", alias = "maxRequests")]
    pub max_requests: u32,
}

fn default_window_secs() -> u32 {
    3
}
fn default_max_requests() -> u32 {
    1
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
        }
    }
}

// ── Completion service ───────────────────────────────────────────────────

/// Completion service configuration (any OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Provider name used in logs.
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url", alias = "baseUrl")]
    pub base_url: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env", alias = "apiKeyEnv")]
    pub api_key_env: String,

    /// Model used when the request does not name one.
    #[serde(default = "default_model", alias = "defaultModel")]
    pub default_model: String,

    /// Extra headers sent with every request.
    #[serde(default = "default_headers")]
    pub headers: HashMap<String, String>,

    /// Timeout for a single HTTP attempt, in seconds.
    #[serde(default = "default_timeout_secs", alias = "timeoutSecs")]
    pub timeout_secs: u64,

    /// Total attempts (first call included) when the service is overloaded.
    #[serde(default = "default_max_attempts", alias = "maxAttempts")]
    pub max_attempts: u32,

    /// Fixed delay between overload retries, in milliseconds.
    #[serde(default = "default_retry_delay_ms", alias = "retryDelayMs")]
    pub retry_delay_ms: u64,
}

fn default_provider_name() -> String {
    "openrouter".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "openai/gpt-3.5-turbo".into()
}
fn default_headers() -> HashMap<String, String> {
    HashMap::from([
        ("HTTP-Referer".into(), "https://bizquery-ai.vercel.app".into()),
        ("X-Title".into(), "bizquery-ai".into()),
    ])
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    3000
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            headers: default_headers(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

// ── Database ─────────────────────────────────────────────────────────────

/// Relational store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. Opened read-only by the server.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "bizquery.db".into()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────

/// Per-request pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Whole-request budget in seconds, from sanitize through execute.
    #[serde(default = "default_deadline_secs", alias = "deadlineSecs")]
    pub deadline_secs: u64,

    /// Include raw completion content and engine internals in failure
    /// details. Keep off for untrusted clients.
    #[serde(default, alias = "exposeDiagnostics")]
    pub expose_diagnostics: bool,
}

fn default_deadline_secs() -> u64 {
    90
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
            expose_diagnostics: false,
        }
    }
}
