//! # mgw CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.
//! Uses clap derive macros for argument parsing.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mgw_cli::contact::{run_contact, ContactArgs};
use mgw_cli::optionset::{run_optionset, OptionSetArgs};
use mgw_cli::payload::{run_payload, PayloadArgs};

/// Membership Gateway CLI
///
/// Operator tooling for the gateway: CRM contact lookup, option-set
/// resolution against the live environment, and offline validation of
/// request payloads before they are replayed.
#[derive(Parser, Debug)]
#[command(name = "mgw", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Look up a CRM contact by email or master customer ID.
    Contact(ContactArgs),

    /// Resolve an option-set label to its integer value.
    #[command(name = "option-set")]
    OptionSet(OptionSetArgs),

    /// Validate a JSON request payload file offline.
    Payload(PayloadArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level.
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Contact(args) => run_contact(&args),
        Commands::OptionSet(args) => run_optionset(&args),
        Commands::Payload(args) => run_payload(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
