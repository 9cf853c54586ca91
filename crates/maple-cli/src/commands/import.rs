//! `maple import` command - ingest local files as a bundle.

use anyhow::Context;
use clap::Args;
use maple_core::{MediaType, ModelConfig, Store};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::output::format_bytes;

#[derive(Args)]
pub struct ImportArgs {
    /// Bundle reference (name[:tag])
    pub reference: String,

    /// Model config JSON file
    #[arg(long)]
    pub config: PathBuf,

    /// Weight files, stored as layers in the order given
    #[arg(long = "weights")]
    pub weights: Vec<PathBuf>,

    /// License file
    #[arg(long)]
    pub license: Option<PathBuf>,
}

pub fn execute(store: &Store, args: ImportArgs) -> anyhow::Result<()> {
    let reference = Store::resolve(&args.reference);

    let config_bytes = std::fs::read(&args.config)
        .with_context(|| format!("Failed to read config {}", args.config.display()))?;
    let config = ModelConfig::decode(&config_bytes, &args.config)?;

    let mut layers = Vec::new();
    for path in &args.weights {
        layers.push((MediaType::Weights, open(path)?));
    }
    if let Some(path) = &args.license {
        layers.push((MediaType::License, open(path)?));
    }

    let manifest = store.import_bundle(&reference, &config, layers)?;
    println!(
        "Imported {} ({} layer(s), {})",
        reference,
        manifest.layers.len(),
        format_bytes(manifest.total_size())
    );
    Ok(())
}

fn open(path: &Path) -> anyhow::Result<File> {
    File::open(path).with_context(|| format!("Failed to open {}", path.display()))
}
