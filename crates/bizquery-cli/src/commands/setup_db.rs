//! `bizquery setup-db` -- create the demo SQLite database.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use rusqlite::Connection;
use tracing::info;

use bizquery_core::demo;

/// Arguments for the `bizquery setup-db` subcommand.
#[derive(Args)]
pub struct SetupDbArgs {
    /// Database file to create (defaults to `database.path` from config).
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Replace an existing file.
    #[arg(long)]
    pub force: bool,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long)]
    pub config: Option<String>,
}

pub fn run(args: SetupDbArgs) -> anyhow::Result<()> {
    let path = match args.path {
        Some(path) => path,
        None => PathBuf::from(super::load(args.config.as_deref())?.database.path),
    };

    if path.exists() {
        if !args.force {
            anyhow::bail!(
                "{} already exists (pass --force to replace it)",
                path.display()
            );
        }
        std::fs::remove_file(&path)
            .with_context(|| format!("failed to remove {}", path.display()))?;
        info!(path = %path.display(), "removed existing database");
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut conn = Connection::open(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    demo::provision(&mut conn).context("failed to provision demo schema")?;

    println!("created demo database at {}", path.display());
    Ok(())
}
