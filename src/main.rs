//! crewfs command-line entry point.
//!
//! Parses arguments, installs the tracing subscriber, runs the command, and
//! maps errors to exit codes.

mod cli;
mod commands;

use cli::Cli;
use crewfs::exit_codes;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the tracing filter directive.
const LOG_ENV: &str = "CREWFS_LOG";

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing();

    match commands::dispatch(cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            eprintln!("Error [{}]: {}", err.kind(), err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
