//! `bizquery serve` -- serve the ask API until Ctrl+C.

use clap::Args;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use bizquery_services::{ApiState, RateLimiter, build_router};

/// Arguments for the `bizquery serve` subcommand.
#[derive(Args)]
pub struct ServeArgs {
    /// Config file path (overrides auto-discovery).
    #[arg(short, long)]
    pub config: Option<String>,

    /// Bind address (overrides config).
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port (overrides config and PORT).
    #[arg(short, long)]
    pub port: Option<u16>,
}

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = super::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let pipeline = super::build_pipeline(&config)?;
    let limit = &config.server.rate_limit;
    let limiter = RateLimiter::new(limit.window_secs, limit.max_requests);
    let router = build_router(ApiState::new(pipeline, limiter), &config.server.cors_origins);

    let bind = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {bind}: {e}"))?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => warn!(error = %e, "failed to listen for Ctrl+C"),
        }
        signal.cancel();
    });

    bizquery_services::serve(listener, router, shutdown).await?;
    Ok(())
}
