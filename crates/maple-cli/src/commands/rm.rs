//! `maple rm` command - remove bundles.

use clap::Args;
use maple_core::{Store, SweepPolicy};

#[derive(Args)]
pub struct RmArgs {
    /// Bundle references to remove (name[:tag])
    #[arg(required = true)]
    pub references: Vec<String>,

    /// Ignore missing references, drop corrupt manifests, and sweep past unreadable ones
    #[arg(short, long)]
    pub force: bool,
}

pub fn execute(store: &Store, args: RmArgs) -> anyhow::Result<()> {
    let policy = if args.force {
        SweepPolicy::Force
    } else {
        SweepPolicy::Conservative
    };

    let mut failures = Vec::new();
    for raw in &args.references {
        let reference = Store::resolve(raw);
        match store.delete_reference(&reference, policy) {
            Ok(report) => {
                if report.target_unreadable {
                    println!("Removed unreadable manifest {}", reference);
                    eprintln!("Warning: its blobs were kept; run `maple prune` to reclaim them");
                    continue;
                }
                println!(
                    "Removed {} ({} blob(s) reclaimed)",
                    reference,
                    report.removed_count()
                );
                if report.liveness_unproven {
                    let mut unreadable: Vec<String> =
                        report.unreadable.iter().map(|r| r.to_string()).collect();
                    unreadable.extend(report.unlisted.iter().map(|p| p.display().to_string()));
                    eprintln!(
                        "Warning: kept {} blob(s); unreadable manifests: {} (run `maple verify`, or retry with --force)",
                        report.retained.len(),
                        unreadable.join(", ")
                    );
                }
                for (digest, reason) in &report.failed {
                    eprintln!("Warning: could not delete blob {}: {}", digest, reason);
                }
            }
            Err(e) if args.force && e.is_not_found() => {
                println!("Nothing to remove for {}", reference);
            }
            Err(e) => failures.push((reference, e)),
        }
    }

    // One error line per failed reference; the last one is returned so its
    // kind sets the exit code.
    let last = failures.pop();
    for (reference, e) in &failures {
        eprintln!("Error: Failed to remove {}: {}", reference, e);
    }
    match last {
        Some((reference, e)) => {
            Err(anyhow::Error::new(e).context(format!("Failed to remove {}", reference)))
        }
        None => Ok(()),
    }
}
