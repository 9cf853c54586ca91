//! `maple verify` command - integrity check of the whole store.

use clap::Args;
use maple_core::{MapleError, Store};

#[derive(Args)]
pub struct VerifyArgs {
    /// Also list orphan blobs individually
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn execute(store: &Store, args: VerifyArgs) -> anyhow::Result<()> {
    let report = store.verify()?;

    println!(
        "Checked {} blob(s) and {} manifest(s)",
        report.blobs_checked, report.manifests_checked
    );
    for (digest, reason) in &report.corrupt_blobs {
        println!("corrupt blob      {}: {}", digest, reason);
    }
    for (reference, reason) in &report.corrupt_manifests {
        println!("corrupt manifest  {}: {}", reference, reason);
    }
    for path in &report.unlisted {
        println!("unreadable dir    {}", path.display());
    }
    for (reference, digest) in &report.dangling {
        println!("missing blob      {} needs {}", reference, digest);
    }
    if !report.orphans.is_empty() {
        println!(
            "{} orphan blob(s) (reclaim with `maple prune`)",
            report.orphans.len()
        );
        if args.verbose {
            for digest in &report.orphans {
                println!("  {}", digest);
            }
        }
    }
    if !report.stale_temp_files.is_empty() {
        println!("{} stale temp file(s)", report.stale_temp_files.len());
    }

    if !report.is_healthy() {
        let problems = report.corrupt_blobs.len()
            + report.corrupt_manifests.len()
            + report.unlisted.len()
            + report.dangling.len();
        return Err(MapleError::corrupt(
            store.paths().root(),
            format!("{} integrity problem(s) found", problems),
        )
        .into());
    }
    println!("OK");
    Ok(())
}
