//! Cache-aside access to component vectors.
//!
//! Resolution order for [`VectorCache::get_or_create_vector`]:
//!
//! 1. in-process memory, keyed by `component_id`;
//! 2. the persistent [`Store`];
//! 3. the [`EmbeddingProvider`], bounded by a timeout. A generated vector
//!    is upserted into the store before it is returned.
//!
//! Any failure resolves to `None`. At most one generation per
//! `component_id` is in flight at a time: concurrent callers for the same
//! key wait on a per-key lock and then read the winner's result from
//! memory. The memory map lives as long as the cache and is never evicted.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use component_atlas_core::embedding::{EmbeddingProvider, EmbeddingRequest};
use component_atlas_core::error::Result as CoreResult;
use component_atlas_core::models::{Component, SimilarComponent};
use component_atlas_core::similarity::{self, SimilarityParams};
use component_atlas_core::store::Store;
use tokio::sync::Mutex;

use crate::config::EmbeddingConfig;

type KeyLock = Arc<Mutex<()>>;

pub struct VectorCache {
    store: Arc<dyn Store>,
    provider: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
    memory: RwLock<HashMap<String, Arc<Vec<f32>>>>,
    in_flight: Mutex<HashMap<String, KeyLock>>,
}

impl VectorCache {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn EmbeddingProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            timeout,
            memory: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Overall generation timeout covers every retry the provider may make.
    pub fn from_config(
        store: Arc<dyn Store>,
        provider: Arc<dyn EmbeddingProvider>,
        config: &EmbeddingConfig,
    ) -> Self {
        let attempts = u64::from(config.max_retries) + 1;
        Self::new(
            store,
            provider,
            Duration::from_secs(config.timeout_secs.max(1) * attempts),
        )
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    fn remembered(&self, component_id: &str) -> Option<Arc<Vec<f32>>> {
        self.memory
            .read()
            .ok()
            .and_then(|m| m.get(component_id).cloned())
    }

    fn remember(&self, component_id: &str, vector: Arc<Vec<f32>>) {
        if let Ok(mut m) = self.memory.write() {
            m.insert(component_id.to_string(), vector);
        }
    }

    async fn key_lock(&self, component_id: &str) -> KeyLock {
        let mut map = self.in_flight.lock().await;
        map.entry(component_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the per-key lock entry once no other caller holds a handle.
    async fn release(&self, component_id: &str, lock: KeyLock) {
        let mut map = self.in_flight.lock().await;
        // One handle in the map, one held here.
        if Arc::strong_count(&lock) == 2 {
            map.remove(component_id);
        }
    }

    /// Return the vector for `component`, generating it if needed.
    pub async fn get_or_create_vector(&self, component: &Component) -> Option<Arc<Vec<f32>>> {
        let id = component.component_id.as_str();
        if let Some(v) = self.remembered(id) {
            return Some(v);
        }

        let lock = self.key_lock(id).await;
        let result = {
            let _guard = lock.lock().await;
            self.resolve_locked(component).await
        };
        self.release(id, lock).await;
        result
    }

    async fn resolve_locked(&self, component: &Component) -> Option<Arc<Vec<f32>>> {
        let id = component.component_id.as_str();
        if let Some(v) = self.remembered(id) {
            return Some(v);
        }

        match self.store.get_vector(id).await {
            Ok(Some(stored)) if !stored.vector.is_empty() => {
                let v = Arc::new(stored.vector);
                self.remember(id, v.clone());
                return Some(v);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(component = %id, error = %e, "vector store lookup failed");
                return None;
            }
        }

        self.generate_and_store(component).await
    }

    /// Force a fresh vector for `component`, overwriting the stored one.
    pub async fn regenerate(&self, component: &Component) -> Option<Arc<Vec<f32>>> {
        let id = component.component_id.as_str();
        let lock = self.key_lock(id).await;
        let result = {
            let _guard = lock.lock().await;
            self.generate_and_store(component).await
        };
        self.release(id, lock).await;
        result
    }

    async fn generate_and_store(&self, component: &Component) -> Option<Arc<Vec<f32>>> {
        let generated = self.generate(std::slice::from_ref(component)).await;
        let (_, vector) = generated
            .into_iter()
            .find(|(id, _)| id == &component.component_id)?;
        self.persist(&component.component_id, vector).await
    }

    /// Call the provider for `components` under the configured timeout.
    ///
    /// Returns `(component_id, vector)` pairs for the vectors that came back.
    async fn generate(&self, components: &[Component]) -> Vec<(String, Vec<f32>)> {
        if components.is_empty() || !self.provider.is_available() {
            return Vec::new();
        }
        let requests: Vec<EmbeddingRequest> = components
            .iter()
            .map(EmbeddingRequest::from_component)
            .collect();

        match tokio::time::timeout(self.timeout, self.provider.generate(&requests)).await {
            Ok(Ok(generated)) => generated
                .into_iter()
                .filter(|g| !g.vector.is_empty())
                .map(|g| (g.component_id, g.vector))
                .collect(),
            Ok(Err(e)) => {
                tracing::warn!(count = requests.len(), error = %e, "embedding generation failed");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    count = requests.len(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "embedding generation timed out"
                );
                Vec::new()
            }
        }
    }

    async fn persist(&self, component_id: &str, vector: Vec<f32>) -> Option<Arc<Vec<f32>>> {
        let vector = Arc::new(vector);
        match self
            .store
            .upsert_vector(component_id, &vector, self.provider.model_name())
            .await
        {
            Ok(_) => self.remember(component_id, vector.clone()),
            Err(e) => {
                tracing::warn!(component = %component_id, error = %e, "failed to store vector");
            }
        }
        Some(vector)
    }

    /// Generate and store vectors for a batch of components in one
    /// provider call. Returns how many vectors were stored.
    ///
    /// Per-key locks are taken in `component_id` order.
    pub async fn generate_batch(&self, components: &[Component]) -> usize {
        let mut ordered: Vec<&Component> = components.iter().collect();
        ordered.sort_by(|a, b| a.component_id.cmp(&b.component_id));
        ordered.dedup_by(|a, b| a.component_id == b.component_id);

        let mut locks = Vec::with_capacity(ordered.len());
        for c in &ordered {
            locks.push((c.component_id.clone(), self.key_lock(&c.component_id).await));
        }

        let stored = {
            let mut guards = Vec::with_capacity(locks.len());
            for (_, lock) in &locks {
                guards.push(lock.lock().await);
            }
            let batch: Vec<Component> = ordered.iter().map(|c| (*c).clone()).collect();
            let mut stored = 0;
            for (id, vector) in self.generate(&batch).await {
                if !batch.iter().any(|c| c.component_id == id) {
                    continue;
                }
                if self.persist(&id, vector).await.is_some() && self.remembered(&id).is_some() {
                    stored += 1;
                }
            }
            stored
        };

        for (id, lock) in locks {
            self.release(&id, lock).await;
        }
        stored
    }

    /// Nearest neighbors of `component`.
    ///
    /// Invalid parameters are reported; a missing vector or a failing
    /// store yields an empty list.
    pub async fn find_similar(
        &self,
        component: &Component,
        params: &SimilarityParams,
    ) -> CoreResult<Vec<SimilarComponent>> {
        params.validate()?;
        let vector = self.get_or_create_vector(component).await;
        let query = vector.as_deref().map(Vec::as_slice);
        match similarity::find_similar(self.store.as_ref(), component, query, params).await {
            Ok(found) => Ok(found),
            Err(e) => {
                tracing::warn!(component = %component.component_id, error = %e, "similarity search failed");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use component_atlas_core::embedding::{DisabledProvider, GeneratedEmbedding};
    use component_atlas_core::models::{component_id_for, ComponentType, SyncStatus};
    use component_atlas_core::store::memory::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn generate(&self, requests: &[EmbeddingRequest]) -> Result<Vec<GeneratedEmbedding>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(requests
                .iter()
                .map(|r| GeneratedEmbedding {
                    component_id: r.component_id.clone(),
                    vector: vec![1.0, r.name.len() as f32],
                })
                .collect())
        }
    }

    fn counting(delay_ms: u64) -> Arc<CountingProvider> {
        Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(delay_ms),
        })
    }

    fn component(name: &str) -> Component {
        Component {
            component_id: component_id_for("org/a", name),
            name: name.to_string(),
            component_type: ComponentType::ApiClient,
            repository: "org/a".into(),
            files: vec![name.to_string()],
            language: "python".into(),
            api_signature: String::new(),
            imports: vec![],
            keywords: vec![],
            description: None,
            lines_of_code: 30,
            cyclomatic_complexity: None,
            public_methods: vec![],
            first_seen: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            sync_status: SyncStatus::Unknown,
        }
    }

    #[tokio::test]
    async fn disabled_provider_yields_no_vector_and_no_matches() {
        let store = Arc::new(InMemoryStore::new());
        let c = component("client.py");
        store
            .replace_repository_components("org/a", &[c.clone()])
            .await
            .unwrap();
        let cache = VectorCache::new(store, Arc::new(DisabledProvider), Duration::from_secs(1));

        assert!(cache.get_or_create_vector(&c).await.is_none());
        let found = cache
            .find_similar(&c, &SimilarityParams::default())
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn generated_vectors_are_stored_then_served_from_cache() {
        let store = Arc::new(InMemoryStore::new());
        let provider = counting(0);
        let cache = VectorCache::new(store.clone(), provider.clone(), Duration::from_secs(1));
        let c = component("client.py");

        let first = cache.get_or_create_vector(&c).await.unwrap();
        let second = cache.get_or_create_vector(&c).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let stored = store.get_vector(&c.component_id).await.unwrap().unwrap();
        assert_eq!(stored.vector, *first);
        assert_eq!(stored.info.model, "counting");
    }

    #[tokio::test]
    async fn stored_vectors_skip_the_provider() {
        let store = Arc::new(InMemoryStore::new());
        let c = component("client.py");
        store
            .upsert_vector(&c.component_id, &[0.5, 0.5], "old")
            .await
            .unwrap();
        let provider = counting(0);
        let cache = VectorCache::new(store, provider.clone(), Duration::from_secs(1));

        let v = cache.get_or_create_vector(&c).await.unwrap();
        assert_eq!(*v, vec![0.5, 0.5]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_share_one_generation() {
        let store = Arc::new(InMemoryStore::new());
        let provider = counting(50);
        let cache = Arc::new(VectorCache::new(store, provider.clone(), Duration::from_secs(5)));
        let c = component("client.py");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let c = c.clone();
            handles.push(tokio::spawn(async move { cache.get_or_create_vector(&c).await }));
        }
        for h in handles {
            assert!(h.await.unwrap().is_some());
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_provider_times_out_to_none() {
        let store = Arc::new(InMemoryStore::new());
        let provider = counting(500);
        let cache = VectorCache::new(store.clone(), provider, Duration::from_millis(20));
        let c = component("client.py");

        assert!(cache.get_or_create_vector(&c).await.is_none());
        assert!(store.get_vector(&c.component_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn regenerate_overwrites_and_batch_fills_missing() {
        let store = Arc::new(InMemoryStore::new());
        let provider = counting(0);
        let cache = VectorCache::new(store.clone(), provider.clone(), Duration::from_secs(1));
        let a = component("a.py");
        let b = component("bb.py");
        store
            .upsert_vector(&a.component_id, &[9.0, 9.0], "old")
            .await
            .unwrap();

        let fresh = cache.regenerate(&a).await.unwrap();
        assert_eq!(*fresh, vec![1.0, 4.0]);
        let stored = store.get_vector(&a.component_id).await.unwrap().unwrap();
        assert_eq!(stored.info.model, "counting");

        assert_eq!(cache.generate_batch(&[b.clone(), b.clone()]).await, 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert!(store.get_vector(&b.component_id).await.unwrap().is_some());
    }

    struct StrayProvider;

    #[async_trait]
    impl EmbeddingProvider for StrayProvider {
        fn model_name(&self) -> &str {
            "stray"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn generate(&self, _requests: &[EmbeddingRequest]) -> Result<Vec<GeneratedEmbedding>> {
            Ok(vec![GeneratedEmbedding {
                component_id: "someone-else".to_string(),
                vector: vec![1.0, 1.0],
            }])
        }
    }

    #[tokio::test]
    async fn vectors_for_other_components_are_not_stored() {
        let store = Arc::new(InMemoryStore::new());
        let cache = VectorCache::new(store.clone(), Arc::new(StrayProvider), Duration::from_secs(1));
        let c = component("client.py");

        assert!(cache.get_or_create_vector(&c).await.is_none());
        assert!(store.get_vector(&c.component_id).await.unwrap().is_none());
        assert!(store.get_vector("someone-else").await.unwrap().is_none());
    }
}
