use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use component_atlas::config::{self, Config};
use component_atlas::sqlite_store::SqliteStore;
use component_atlas::vector_cache::VectorCache;
use component_atlas::{db, migrate};
use component_atlas_core::embedding::DisabledProvider;
use component_atlas_core::models::{
    component_id_for, Component, ComponentType, ConsolidationStatus, SyncStatus,
};
use component_atlas_core::provenance;
use component_atlas_core::similarity::SimilarityParams;
use component_atlas_core::store::Store;

fn test_config(tmp: &TempDir) -> Config {
    let path: PathBuf = tmp.path().join("atlas.toml");
    fs::write(
        &path,
        format!(
            "[db]\npath = \"{}/data/atlas.sqlite\"\n",
            tmp.path().display()
        ),
    )
    .unwrap();
    config::load_config(&path).unwrap()
}

async fn open(tmp: &TempDir) -> SqliteStore {
    let cfg = test_config(tmp);
    migrate::run_migrations(&cfg).await.unwrap();
    db::open_store(&cfg).await.unwrap()
}

fn component(repo: &str, path: &str, first_seen: i64) -> Component {
    Component {
        component_id: component_id_for(repo, path),
        name: "retry".to_string(),
        component_type: ComponentType::Infrastructure,
        repository: repo.to_string(),
        files: vec![path.to_string()],
        language: "python".to_string(),
        api_signature: "class RetryPolicy".to_string(),
        imports: vec!["time".to_string()],
        keywords: vec!["retry".to_string()],
        description: Some("Retry helpers.".to_string()),
        lines_of_code: 40,
        cyclomatic_complexity: Some(4),
        public_methods: vec!["RetryPolicy".to_string(), "RetryPolicy.run".to_string()],
        first_seen: Utc.timestamp_opt(first_seen, 0).unwrap(),
        sync_status: SyncStatus::Unknown,
    }
}

#[tokio::test]
async fn components_round_trip() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;
    let c = component("acme/app", "lib/retry.py", 1_700_000_000);

    store
        .replace_repository_components("acme/app", std::slice::from_ref(&c))
        .await
        .unwrap();

    let loaded = store.get_component(&c.component_id).await.unwrap();
    assert_eq!(loaded, Some(c.clone()));
    assert_eq!(store.list_components(Some("acme/app")).await.unwrap(), vec![c]);
    assert!(store.list_components(Some("acme/other")).await.unwrap().is_empty());
}

#[tokio::test]
async fn rescans_keep_earliest_first_seen_and_drop_removed() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;
    let old = component("acme/app", "lib/retry.py", 1_600_000_000);
    let gone = component("acme/app", "lib/old.py", 1_600_000_000);
    store
        .replace_repository_components("acme/app", &[old.clone(), gone.clone()])
        .await
        .unwrap();

    let newer = component("acme/app", "lib/retry.py", 1_700_000_000);
    store
        .replace_repository_components("acme/app", &[newer])
        .await
        .unwrap();

    let loaded = store.get_component(&old.component_id).await.unwrap().unwrap();
    assert_eq!(loaded.first_seen.timestamp(), 1_600_000_000);
    assert!(store.get_component(&gone.component_id).await.unwrap().is_none());
}

#[tokio::test]
async fn vectors_upsert_and_search() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;
    let a = component("acme/a", "lib/retry.py", 1_600_000_000);
    let b = component("acme/b", "lib/retry.py", 1_700_000_000);
    store.replace_repository_components("acme/a", &[a.clone()]).await.unwrap();
    store.replace_repository_components("acme/b", &[b.clone()]).await.unwrap();

    assert_eq!(store.components_without_vectors(None).await.unwrap().len(), 2);

    store.upsert_vector(&a.component_id, &[1.0, 0.0], "m").await.unwrap();
    store.upsert_vector(&b.component_id, &[0.6, 0.8], "m").await.unwrap();
    let info = store.upsert_vector(&b.component_id, &[1.0, 0.1], "m").await.unwrap();
    assert_eq!(info.dimension, 2);

    let stored = store.get_vector(&b.component_id).await.unwrap().unwrap();
    assert_eq!(stored.vector, vec![1.0, 0.1]);
    assert!(store.components_without_vectors(None).await.unwrap().is_empty());

    let hits = store.vector_search(&[1.0, 0.0], &a.component_id, 0.9).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].component_id, b.component_id);
    assert!(hits[0].similarity > 0.99);

    assert_eq!(store.clear_vectors().await.unwrap(), 2);
}

#[tokio::test]
async fn provenance_round_trip() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;
    let a = component("acme/a", "lib/retry.py", 1_600_000_000);
    let b = component("acme/b", "lib/retry.py", 1_700_000_000);

    let entries = provenance::build_from([&a, &b]).to_vec();
    store.replace_provenance(&entries).await.unwrap();

    let loaded = store.list_provenance().await.unwrap();
    assert_eq!(loaded, entries);
    assert_eq!(loaded[0].origin_repository, "acme/a");
    assert_eq!(loaded[0].consolidation_status, ConsolidationStatus::Unconsolidated);
}

#[tokio::test]
async fn disabled_provider_degrades_similarity_to_empty() {
    let tmp = TempDir::new().unwrap();
    let store: Arc<dyn Store> = Arc::new(open(&tmp).await);
    let a = component("acme/a", "lib/retry.py", 1_600_000_000);
    store.replace_repository_components("acme/a", &[a.clone()]).await.unwrap();

    let cache = VectorCache::new(store, Arc::new(DisabledProvider), Duration::from_secs(1));
    let found = cache
        .find_similar(&a, &SimilarityParams::default())
        .await
        .unwrap();
    assert!(found.is_empty());
}
