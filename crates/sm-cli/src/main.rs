//! # smctl entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sm_cli::diff::{run_diff, DiffArgs};
use sm_cli::validate::{run_validate, ValidateArgs};
use sm_cli::EXIT_ERROR;

/// Student-affairs review workflow tooling.
///
/// Validates workflow configuration and previews the transitions and
/// notices an update would produce.
#[derive(Parser, Debug)]
#[command(name = "smctl", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a workflow configuration (or the built-in one).
    Validate(ValidateArgs),

    /// Show the transitions and notices between two case snapshots.
    Diff(DiffArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Verbosity flags win over RUST_LOG.
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "smctl starting");

    let result = match cli.command {
        Commands::Validate(args) => run_validate(&args),
        Commands::Diff(args) => run_diff(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}
