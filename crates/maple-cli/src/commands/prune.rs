//! `maple prune` command - reclaim unreferenced blobs.

use clap::Args;
use maple_core::{Store, SweepPolicy};

#[derive(Args)]
pub struct PruneArgs {
    /// Sweep even if some manifests cannot be read
    #[arg(short, long)]
    pub force: bool,
}

pub fn execute(store: &Store, args: PruneArgs) -> anyhow::Result<()> {
    let policy = if args.force {
        SweepPolicy::Force
    } else {
        SweepPolicy::Conservative
    };
    let report = store.prune(policy)?;

    if report.liveness_unproven {
        eprintln!(
            "Warning: {} manifest(s) and {} directory(ies) unreadable, no blobs deleted (retry with --force)",
            report.unreadable.len(),
            report.unlisted.len()
        );
    }
    for (digest, reason) in &report.failed {
        eprintln!("Warning: could not delete blob {}: {}", digest, reason);
    }
    println!(
        "Deleted {} orphan blob(s), {} temp file(s)",
        report.removed.len(),
        report.temp_files_removed.len()
    );
    Ok(())
}
