//! `bizquery ask` -- run one question through the pipeline.
//!
//! Prints the JSON response on stdout. Exits 1 when the pipeline reports a
//! failure, so scripts can branch on the status alone.

use std::process::ExitCode;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use bizquery_types::AskRequest;

/// Arguments for the `bizquery ask` subcommand.
#[derive(Args)]
pub struct AskArgs {
    /// The business question.
    pub question: String,

    /// Completion model override.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long)]
    pub config: Option<String>,
}

pub async fn run(args: AskArgs) -> anyhow::Result<ExitCode> {
    let config = super::load(args.config.as_deref())?;
    let pipeline = super::build_pipeline(&config)?;

    let mut request = AskRequest::new(args.question);
    if let Some(model) = args.model {
        request = request.with_model(model);
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted");
            on_signal.cancel();
        }
    });

    let result = pipeline.ask_with_cancel(&request, cancel).await;
    let succeeded = result.is_success();
    println!("{}", serde_json::to_string_pretty(&result.into_response())?);

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
