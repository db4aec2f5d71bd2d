//! Connection settings for an OpenAI-compatible endpoint.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for a single completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    /// Provider name used in logs (e.g. "openrouter").
    pub name: String,

    /// Base URL for the OpenAI-compatible API.
    pub base_url: String,

    /// Environment variable that holds the API key.
    pub api_key_env: String,

    /// Extra HTTP headers to include in every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Per-attempt request timeout in seconds. Defaults to 60.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Default per-attempt timeout when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

impl LlmProviderConfig {
    /// OpenRouter, the default gateway.
    pub fn openrouter() -> Self {
        Self {
            name: "openrouter".into(),
            base_url: "https://openrouter.ai/api/v1".into(),
            api_key_env: "OPENROUTER_API_KEY".into(),
            headers: HashMap::from([
                ("HTTP-Referer".into(), "https://bizquery-ai.vercel.app".into()),
                ("X-Title".into(), "bizquery-ai".into()),
            ]),
            timeout_secs: None,
        }
    }

    /// Effective per-attempt timeout in seconds.
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openrouter_defaults() {
        let config = LlmProviderConfig::openrouter();
        assert_eq!(config.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.api_key_env, "OPENROUTER_API_KEY");
        assert_eq!(config.headers.get("X-Title").map(String::as_str), Some("bizquery-ai"));
        assert_eq!(config.timeout_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn deserialize_minimal() {
        let json = r#"{"name":"local","base_url":"http://localhost:1234/v1","api_key_env":"LOCAL_KEY"}"#;
        let config: LlmProviderConfig = serde_json::from_str(json).unwrap();
        assert!(config.headers.is_empty());
        assert_eq!(config.timeout_secs(), 60);
    }

    #[test]
    fn explicit_timeout_wins() {
        let mut config = LlmProviderConfig::openrouter();
        config.timeout_secs = Some(5);
        assert_eq!(config.timeout_secs(), 5);
    }
}
