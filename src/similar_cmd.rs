//! `atlas similar`: nearest neighbors of a stored component by vector similarity.
//!
//! Without a configured provider or a stored vector the result is empty, not an error.

use std::sync::Arc;

use anyhow::Result;

use component_atlas_core::models::SimilarComponent;
use component_atlas_core::similarity::SimilarityParams;
use component_atlas_core::store::Store;
use component_atlas_core::AtlasError;

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::output;
use crate::vector_cache::VectorCache;

/// Nearest neighbors of a stored component.
///
/// An embedding backend that is disabled or unreachable gives an empty
/// list, not an error.
pub async fn find_similar(
    config: &Config,
    component_id: &str,
    params: &SimilarityParams,
) -> Result<Vec<SimilarComponent>> {
    params.validate()?;
    let store: Arc<dyn Store> = Arc::new(db::open_store(config).await?);
    let component = store
        .get_component(component_id)
        .await?
        .ok_or_else(|| AtlasError::not_found(format!("component '{}'", component_id)))?;

    let provider = embedding::create_provider(&config.embedding)?;
    let cache = VectorCache::from_config(store, provider, &config.embedding);
    Ok(cache.find_similar(&component, params).await?)
}

pub async fn run_similar(
    config: &Config,
    component_id: &str,
    top_k: Option<usize>,
    min_similarity: Option<f64>,
    json: bool,
) -> Result<()> {
    let mut params = config.similarity.params();
    if let Some(k) = top_k {
        params.top_k = k;
    }
    if let Some(m) = min_similarity {
        params.min_similarity = m;
    }

    let result = find_similar(config, component_id, &params).await;
    output::emit(json, result, |matches| {
        if matches.is_empty() {
            println!("No similar components.");
            return;
        }
        println!("{:>6}  {:<32} {}", "SCORE", "REPOSITORY", "COMPONENT");
        for m in matches {
            println!(
                "{:>6.3}  {:<32} {}",
                m.similarity_score, m.repository, m.component_id
            );
        }
    })
}
