//! `bizquery guard` -- show the read-only check and date rewrite for a
//! statement. Nothing is executed.

use std::process::ExitCode;

use clap::Args;

use bizquery_core::guard;

/// Arguments for the `bizquery guard` subcommand.
#[derive(Args)]
pub struct GuardArgs {
    /// SQL statement to check.
    pub sql: String,

    /// Also print which rewrite was applied.
    #[arg(long)]
    pub explain: bool,
}

pub fn run(args: GuardArgs) -> ExitCode {
    match guard(&args.sql) {
        Ok(guarded) => {
            println!("{guarded}");
            if args.explain {
                eprintln!("rewrite: {:?}", guarded.rewrite());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("refused: {err}");
            ExitCode::FAILURE
        }
    }
}
