//! `maple list` command - list stored bundles.

use clap::Args;
use maple_core::Store;

use crate::output::{format_ago, format_bytes, new_table};

#[derive(Args)]
pub struct ListArgs {
    /// Only show bundles with this name
    pub name: Option<String>,

    /// Print references only
    #[arg(short, long)]
    pub quiet: bool,
}

pub fn execute(store: &Store, args: ListArgs) -> anyhow::Result<()> {
    let bundles: Vec<_> = store
        .list_bundles()?
        .into_iter()
        .filter(|b| args.name.as_deref().map_or(true, |n| b.reference.name == n))
        .collect();

    if args.quiet {
        for bundle in &bundles {
            println!("{}", bundle.reference);
        }
        return Ok(());
    }

    let now = chrono::Utc::now();
    let mut table = new_table(&["NAME", "SIZE", "MODIFIED"]);
    for b in &bundles {
        let size = match (&b.size, &b.error) {
            (Some(size), _) => format_bytes(*size),
            (None, Some(_)) => "unreadable".to_string(),
            (None, None) => "-".to_string(),
        };
        let modified = b
            .modified
            .as_ref()
            .map(|m| format_ago(m, now))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![b.reference.to_string(), size, modified]);
    }

    println!("{table}");
    Ok(())
}
