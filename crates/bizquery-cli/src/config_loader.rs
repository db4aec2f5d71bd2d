//! Configuration file discovery and loading.
//!
//! The discovery order is:
//! 1. An explicit `--config` path.
//! 2. `BIZQUERY_CONFIG` environment variable.
//! 3. `~/.bizquery/config.json`
//! 4. If none found, built-in defaults (an empty JSON object).
//!
//! JSON keys are normalized from camelCase to snake_case before
//! deserializing. Keys under a `headers` object are HTTP header names and
//! are kept verbatim.

use std::path::{Path, PathBuf};

use anyhow::Context;
use bizquery_types::Config;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "BIZQUERY_CONFIG";

/// Environment variable overriding `server.port`.
pub const PORT_ENV: &str = "PORT";

/// Discover the config file path from the environment override or the
/// home directory. Returns `None` when neither yields a candidate.
pub fn discover_config_path(env_path: Option<String>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(env_path) = env_path.filter(|p| !p.trim().is_empty()) {
        return Some(PathBuf::from(env_path));
    }
    let path = home_dir?.join(".bizquery").join("config.json");
    path.exists().then_some(path)
}

/// Load the configuration, applying environment overrides.
///
/// An explicit `config_override` must exist. A discovered path that has
/// gone missing falls back to defaults with a warning.
pub fn load_config(config_override: Option<&Path>) -> anyhow::Result<Config> {
    let raw = match config_override {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("config file not found: {}", path.display());
            }
            read_normalized(path)?
        }
        None => match discover_config_path(std::env::var(CONFIG_ENV).ok(), dirs::home_dir()) {
            Some(path) if path.exists() => read_normalized(&path)?,
            Some(path) => {
                warn!(path = %path.display(), "config path does not exist, using defaults");
                Value::Object(serde_json::Map::new())
            }
            None => {
                info!("no config file found, using defaults");
                Value::Object(serde_json::Map::new())
            }
        },
    };

    let mut config: Config = serde_json::from_value(raw).context("invalid configuration")?;
    apply_env_overrides(&mut config, std::env::var(PORT_ENV).ok());
    Ok(config)
}

fn read_normalized(path: &Path) -> anyhow::Result<Value> {
    debug!(path = %path.display(), "loading config file");
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(normalize_keys(value))
}

/// Apply `PORT` from the environment. Unparseable values are ignored.
pub fn apply_env_overrides(config: &mut Config, port: Option<String>) {
    let Some(raw) = port else {
        return;
    };
    match raw.trim().parse::<u16>() {
        Ok(port) => config.server.port = port,
        Err(_) => warn!(value = %raw, "ignoring unparseable PORT"),
    }
}

/// Convert camelCase JSON keys to snake_case recursively, leaving the
/// contents of `headers` objects untouched.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, val)| {
                    let key = camel_to_snake(&key);
                    let val = if key == "headers" { val } else { normalize_keys(val) };
                    (key, val)
                })
                .collect(),
        ),
        Value::Array(arr) => Value::Array(arr.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

/// Convert a single camelCase string to snake_case. Acronym runs stay
/// together: `"HTMLParser"` becomes `"html_parser"`.
pub fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut result = String::with_capacity(name.len() + 4);

    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            if prev.is_lowercase() || (prev.is_uppercase() && next.is_some_and(|c| c.is_lowercase())) {
                result.push('_');
            }
        }
        result.extend(ch.to_lowercase());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn camel_to_snake_cases() {
        assert_eq!(camel_to_snake("corsOrigins"), "cors_origins");
        assert_eq!(camel_to_snake("retryDelayMs"), "retry_delay_ms");
        assert_eq!(camel_to_snake("already_snake"), "already_snake");
        assert_eq!(camel_to_snake("HTMLParser"), "html_parser");
        assert_eq!(camel_to_snake("port"), "port");
    }

    #[test]
    fn normalize_recurses_but_keeps_headers() {
        let value = json!({
            "server": {"rateLimit": {"maxRequests": 2}},
            "completion": {"apiKeyEnv": "KEY", "headers": {"X-Title": "app", "HTTP-Referer": "r"}}
        });
        let normalized = normalize_keys(value);
        assert_eq!(normalized["server"]["rate_limit"]["max_requests"], json!(2));
        assert_eq!(normalized["completion"]["api_key_env"], json!("KEY"));
        assert_eq!(normalized["completion"]["headers"]["X-Title"], json!("app"));
        assert_eq!(normalized["completion"]["headers"]["HTTP-Referer"], json!("r"));
    }

    #[test]
    fn env_path_wins_over_home() {
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(home.path().join(".bizquery")).unwrap();
        std::fs::write(home.path().join(".bizquery/config.json"), "{}").unwrap();

        let chosen = discover_config_path(Some("/etc/bq.json".into()), Some(home.path().into()));
        assert_eq!(chosen, Some(PathBuf::from("/etc/bq.json")));

        let chosen = discover_config_path(None, Some(home.path().into()));
        assert_eq!(chosen, Some(home.path().join(".bizquery/config.json")));
    }

    #[test]
    fn missing_home_config_is_none() {
        let home = tempfile::tempdir().unwrap();
        assert_eq!(discover_config_path(None, Some(home.path().into())), None);
        assert_eq!(discover_config_path(Some("  ".into()), None), None);
    }

    #[test]
    fn explicit_file_is_loaded_and_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"database": {"path": "/data/demo.db"}, "pipeline": {"deadlineSecs": 12}}"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.database.path, "/data/demo.db");
        assert_eq!(config.pipeline.deadline_secs, 12);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn port_override() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, Some("8080".into()));
        assert_eq!(config.server.port, 8080);

        apply_env_overrides(&mut config, Some("not-a-port".into()));
        assert_eq!(config.server.port, 8080);

        apply_env_overrides(&mut config, None);
        assert_eq!(config.server.port, 8080);
    }
}
