mod annotation;
mod cli;
mod commands;
mod model;
mod summary;
mod transcript;
mod util;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

const DEFAULT_LOG_FILTER: &str = "info";

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let command = cli.command.name();
    match dispatch(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(command, error = %err, "command failed");
            for cause in err.chain().skip(1) {
                error!(cause = %cause, "caused by");
            }
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Commands) -> Result<()> {
    debug!(command = command.name(), "dispatching");
    match command {
        Commands::Annotate(args) => commands::annotate::run(args),
        Commands::Summary(args) => commands::summary::run(args),
        Commands::Transcript(args) => commands::transcript::run(args),
    }
}

/// Logs go to stderr so stdout stays clean for JSON output.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
