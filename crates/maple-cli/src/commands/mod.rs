//! CLI command definitions and dispatch.

mod import;
mod list;
mod paths;
mod prune;
mod rm;
mod show;
mod verify;

use clap::{Parser, Subcommand};
use maple_core::{Store, StorePaths};
use std::path::PathBuf;
use tracing::debug;

/// Maple - local store for robot policy model bundles.
#[derive(Parser)]
#[command(name = "maple", version, about)]
pub struct Cli {
    /// Store root (defaults to $MAPLE_HOME, then ~/.maple)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// List stored bundles
    #[command(visible_alias = "ls")]
    List(list::ListArgs),
    /// Show a bundle's config and layers
    Show(show::ShowArgs),
    /// Import local files as a bundle
    Import(import::ImportArgs),
    /// Remove bundles and reclaim unshared blobs
    #[command(visible_alias = "remove")]
    Rm(rm::RmArgs),
    /// Check blobs and manifests for corruption
    Verify(verify::VerifyArgs),
    /// Delete blobs no bundle references
    Prune(prune::PruneArgs),
    /// Print the resolved store directories
    Paths,
}

/// Dispatch a parsed command line.
pub fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let store = open_store(cli.root)?;
    match cli.command {
        Command::List(args) => list::execute(&store, args),
        Command::Show(args) => show::execute(&store, args),
        Command::Import(args) => import::execute(&store, args),
        Command::Rm(args) => rm::execute(&store, args),
        Command::Verify(args) => verify::execute(&store, args),
        Command::Prune(args) => prune::execute(&store, args),
        Command::Paths => paths::execute(&store),
    }
}

fn open_store(root: Option<PathBuf>) -> anyhow::Result<Store> {
    let paths = match root {
        Some(root) => StorePaths::new(root),
        None => StorePaths::from_env()?,
    };
    debug!("Store root: {}", paths.root().display());
    Ok(Store::open(paths)?)
}
