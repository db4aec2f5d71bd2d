//! Subcommand implementations and shared bootstrap helpers.

pub mod ask;
pub mod guard_cmd;
pub mod serve;
pub mod setup_db;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bizquery_core::{AskPipeline, PipelineOptions, QueryExecutor, ReadOnlyDatabase};
use bizquery_llm::{CompletionClient, LlmProviderConfig, OpenAiCompatProvider, Provider, RetryConfig};
use bizquery_types::Config;
use bizquery_types::config::CompletionConfig;
use tracing::{info, warn};

/// Load config from an optional `--config` path.
pub fn load(config: Option<&str>) -> anyhow::Result<Config> {
    crate::config_loader::load_config(config.map(Path::new))
}

/// Build the completion client described by `config`.
pub fn completion_client(config: &CompletionConfig) -> CompletionClient<Arc<dyn Provider>> {
    let provider_config = LlmProviderConfig {
        name: config.name.clone(),
        base_url: config.base_url.clone(),
        api_key_env: config.api_key_env.clone(),
        headers: config.headers.clone(),
        timeout_secs: Some(config.timeout_secs),
    };
    if std::env::var(&config.api_key_env).map_or(true, |key| key.trim().is_empty()) {
        warn!(
            env = %config.api_key_env,
            "completion API key is not set; questions will fail with a service error"
        );
    }

    let provider: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::new(provider_config));
    CompletionClient::new(provider, config.default_model.clone()).with_retry(RetryConfig {
        max_attempts: config.max_attempts.max(1),
        delay: Duration::from_millis(config.retry_delay_ms),
    })
}

/// Open the configured database read-only and assemble the pipeline.
pub fn build_pipeline(config: &Config) -> anyhow::Result<AskPipeline> {
    let path = Path::new(&config.database.path);
    if !path.exists() {
        anyhow::bail!(
            "database not found: {} (run `bizquery setup-db` to create the demo store)",
            path.display()
        );
    }
    let db = ReadOnlyDatabase::open(path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    info!(
        path = %path.display(),
        model = %config.completion.default_model,
        "pipeline ready"
    );

    let executor = QueryExecutor::new(Arc::new(db));
    Ok(AskPipeline::new(completion_client(&config.completion), executor)
        .with_options(PipelineOptions::from(&config.pipeline)))
}
