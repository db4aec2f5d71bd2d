//! `bizquery` -- ask business questions of a SQLite store in plain language.
//!
//! Provides the following subcommands:
//!
//! - `bizquery serve` -- Serve the ask API over HTTP.
//! - `bizquery ask` -- Run one question through the pipeline and print the result.
//! - `bizquery guard` -- Show how a SQL statement is checked and rewritten.
//! - `bizquery setup-db` -- Create the demo database.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;
mod config_loader;

/// bizquery CLI.
#[derive(Parser)]
#[command(name = "bizquery", about = "Ask business questions in plain language", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Serve the ask API over HTTP.
    Serve(commands::serve::ServeArgs),

    /// Ask one question and print the JSON response.
    Ask(commands::ask::AskArgs),

    /// Check and rewrite a SQL statement without calling any service.
    Guard(commands::guard_cmd::GuardArgs),

    /// Create the demo SQLite database.
    SetupDb(commands::setup_db::SetupDbArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let code = match cli.command {
        Commands::Serve(args) => {
            commands::serve::run(args).await?;
            ExitCode::SUCCESS
        }
        Commands::Ask(args) => commands::ask::run(args).await?,
        Commands::Guard(args) => commands::guard_cmd::run(args),
        Commands::SetupDb(args) => {
            commands::setup_db::run(args)?;
            ExitCode::SUCCESS
        }
    };
    Ok(code)
}
