//! `maple paths` command.

use maple_core::Store;

pub fn execute(store: &Store) -> anyhow::Result<()> {
    let paths = store.paths();
    println!("root:      {}", paths.root().display());
    println!("blobs:     {}", paths.blobs_dir().display());
    println!("manifests: {}", paths.manifests_dir().display());
    Ok(())
}
