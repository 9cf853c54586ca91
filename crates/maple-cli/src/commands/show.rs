//! `maple show` command - print a bundle's config and layers.

use clap::Args;
use maple_core::Store;

use crate::output::format_bytes;

#[derive(Args)]
pub struct ShowArgs {
    /// Bundle reference (name[:tag])
    pub reference: String,

    /// Print the raw manifest JSON instead
    #[arg(long)]
    pub manifest: bool,
}

pub fn execute(store: &Store, args: ShowArgs) -> anyhow::Result<()> {
    let reference = Store::resolve(&args.reference);
    let manifest = store.load_manifest(&reference)?;

    if args.manifest {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    let config = store.load_config(&reference)?;

    println!("Model:         {}", reference);
    println!("Architecture:  {}", config.architecture);
    if !config.family.is_empty() {
        println!("Family:        {}", config.family);
    }
    println!("Parameters:    {}", config.parameter_size);
    println!("Action dim:    {}", config.action_dim);
    println!("Image size:    {}", config.image_size);
    println!("Size:          {}", format_bytes(manifest.total_size()));
    println!("Environments:  {}", config.environments.join(", "));
    if let Some(repo) = config.hf_repo() {
        println!("Source:        {}", repo);
    }
    if let Some(tag) = config.embodiment_tag() {
        println!("Embodiment:    {}", tag);
    }
    if let Some(data_config) = config.data_config() {
        println!("Data config:   {}", data_config);
    }

    println!();
    println!("Layers:");
    for layer in &manifest.layers {
        println!(
            "  {}  {:>10}  {}",
            layer.digest,
            format_bytes(layer.size),
            layer.media_type
        );
    }
    Ok(())
}
