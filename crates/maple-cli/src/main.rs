//! Maple CLI - manage locally stored policy model bundles.
//!
//! Binds only to the `maple_core::Store` surface; it adds no storage
//! semantics of its own.

mod commands;
mod output;

use clap::Parser;
use maple_core::{MapleError, StoreConfig};
use tracing_subscriber::EnvFilter;

use commands::{dispatch, Cli};

fn main() {
    let cli = Cli::parse();

    // Set up logging (stderr, so table output stays clean)
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(StoreConfig::LOG_LEVEL_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    if let Err(e) = dispatch(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}

/// Exit code for a failed command; store errors keep their distinct codes.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<MapleError>()
        .map(MapleError::exit_code)
        .unwrap_or(1)
}
