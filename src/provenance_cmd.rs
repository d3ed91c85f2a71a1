use anyhow::{Context, Result};

use component_atlas_core::models::ComponentProvenance;
use component_atlas_core::provenance;
use component_atlas_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::output;

/// Rebuild the provenance index from every stored component and persist it.
pub async fn rebuild_provenance(config: &Config) -> Result<Vec<ComponentProvenance>> {
    let store = db::open_store(config).await?;
    let components = store.list_components(None).await?;
    let entries = provenance::build_from(&components).to_vec();
    store
        .replace_provenance(&entries)
        .await
        .context("Failed to store provenance index")?;
    Ok(entries)
}

pub async fn run_provenance(config: &Config, json: bool) -> Result<()> {
    let result = rebuild_provenance(config).await;
    output::emit(json, result, |entries| {
        let duplicated: Vec<&ComponentProvenance> =
            entries.iter().filter(|p| p.is_duplicated()).collect();
        println!("provenance");
        println!("  families: {}", entries.len());
        println!("  duplicated: {}", duplicated.len());
        for p in duplicated {
            println!();
            println!(
                "  {} ({}) origin {}  [{}]",
                p.component_name,
                p.component_type,
                p.origin_repository,
                p.signature
            );
            for loc in &p.locations {
                println!(
                    "    {:<32} {:<9} x{}  {}",
                    loc.repository,
                    loc.sync_status.as_str(),
                    loc.usage_count,
                    loc.files.join(", ")
                );
            }
        }
    })
}
