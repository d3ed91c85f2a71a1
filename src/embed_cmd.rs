use std::sync::Arc;

use anyhow::{bail, Result};

use component_atlas_core::models::Component;
use component_atlas_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::vector_cache::VectorCache;

/// Counts reported by a vector maintenance run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbedSummary {
    pub total: usize,
    pub embedded: usize,
    pub failed: usize,
}

/// Push `components` through the cache in provider-sized batches.
pub async fn embed_in_batches(
    cache: &VectorCache,
    components: &[Component],
    batch_size: usize,
) -> EmbedSummary {
    let mut summary = EmbedSummary {
        total: components.len(),
        ..Default::default()
    };
    for batch in components.chunks(batch_size.max(1)) {
        let stored = cache.generate_batch(batch).await;
        summary.embedded += stored;
        summary.failed += batch.len() - stored.min(batch.len());
    }
    summary
}

async fn open_cache(config: &Config) -> Result<(Arc<dyn Store>, VectorCache)> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }
    let provider = embedding::create_provider(&config.embedding)?;
    let store: Arc<dyn Store> = Arc::new(db::open_store(config).await?);
    let cache = VectorCache::from_config(store.clone(), provider, &config.embedding);
    Ok((store, cache))
}

/// Generate vectors for stored components that have none.
pub async fn run_embed_pending(
    config: &Config,
    limit: Option<usize>,
    batch_size_override: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    let (store, cache) = open_cache(config).await?;
    let pending = store.components_without_vectors(limit).await?;

    if dry_run {
        println!("embed pending (dry-run)");
        println!("  components needing vectors: {}", pending.len());
        return Ok(());
    }
    if pending.is_empty() {
        println!("embed pending");
        println!("  all components have vectors");
        return Ok(());
    }

    let summary = embed_in_batches(
        &cache,
        &pending,
        batch_size_override.unwrap_or(config.embedding.batch_size),
    )
    .await;
    println!("embed pending");
    println!("  total pending: {}", summary.total);
    println!("  embedded: {}", summary.embedded);
    println!("  failed: {}", summary.failed);
    Ok(())
}

/// Regenerate every component's vector in place.
pub async fn run_embed_rebuild(config: &Config, batch_size_override: Option<usize>) -> Result<()> {
    let (store, cache) = open_cache(config).await?;
    let all = store.list_components(None).await?;

    if all.is_empty() {
        println!("embed rebuild");
        println!("  no components to embed");
        return Ok(());
    }

    let summary = embed_in_batches(
        &cache,
        &all,
        batch_size_override.unwrap_or(config.embedding.batch_size),
    )
    .await;
    println!("embed rebuild");
    println!("  total components: {}", summary.total);
    println!("  embedded: {}", summary.embedded);
    println!("  failed: {}", summary.failed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use component_atlas_core::embedding::{EmbeddingProvider, EmbeddingRequest, GeneratedEmbedding};
    use component_atlas_core::models::{component_id_for, ComponentType, SyncStatus};
    use component_atlas_core::store::memory::InMemoryStore;
    use std::time::Duration;

    /// Embeds everything except components named `broken`.
    struct PickyProvider;

    #[async_trait]
    impl EmbeddingProvider for PickyProvider {
        fn model_name(&self) -> &str {
            "picky"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn generate(&self, requests: &[EmbeddingRequest]) -> anyhow::Result<Vec<GeneratedEmbedding>> {
            Ok(requests
                .iter()
                .filter(|r| r.name != "broken")
                .map(|r| GeneratedEmbedding {
                    component_id: r.component_id.clone(),
                    vector: vec![1.0, 0.0],
                })
                .collect())
        }
    }

    fn component(name: &str) -> Component {
        let path = format!("src/{}.py", name);
        Component {
            component_id: component_id_for("acme/app", &path),
            name: name.to_string(),
            component_type: ComponentType::Infrastructure,
            repository: "acme/app".to_string(),
            files: vec![path],
            language: "python".to_string(),
            api_signature: String::new(),
            imports: vec![],
            keywords: vec![],
            description: None,
            lines_of_code: 30,
            cyclomatic_complexity: Some(1),
            public_methods: vec![],
            first_seen: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            sync_status: SyncStatus::Unknown,
        }
    }

    #[tokio::test]
    async fn batches_count_embedded_and_failed() {
        let store = Arc::new(InMemoryStore::new());
        let cache = VectorCache::new(store.clone(), Arc::new(PickyProvider), Duration::from_secs(1));
        let components = vec![component("cache"), component("broken"), component("retry")];

        let summary = embed_in_batches(&cache, &components, 2).await;

        assert_eq!(
            summary,
            EmbedSummary {
                total: 3,
                embedded: 2,
                failed: 1
            }
        );
        assert!(store.get_vector(&components[0].component_id).await.unwrap().is_some());
        assert!(store.get_vector(&components[1].component_id).await.unwrap().is_none());
    }
}
