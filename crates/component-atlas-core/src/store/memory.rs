//! In-memory [`Store`] implementation for testing and embedding.
//!
//! Uses `BTreeMap` behind `std::sync::RwLock`. Vector search is brute-force
//! cosine similarity over all stored vectors.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::embedding::cosine_similarity;
use crate::models::{Component, ComponentProvenance, ComponentVector};

use super::{Store, StoredVector, VectorCandidate};

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    components: RwLock<BTreeMap<String, Component>>,
    vectors: RwLock<BTreeMap<String, StoredVector>>,
    provenance: RwLock<Vec<ComponentProvenance>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl Store for InMemoryStore {
    async fn replace_repository_components(
        &self,
        repository: &str,
        components: &[Component],
    ) -> Result<()> {
        let mut stored = self.components.write().map_err(poisoned)?;
        let previous: BTreeMap<String, Component> = stored
            .iter()
            .filter(|(_, c)| c.repository == repository)
            .map(|(id, c)| (id.clone(), c.clone()))
            .collect();
        stored.retain(|_, c| c.repository != repository);
        for c in components {
            let mut c = c.clone();
            if let Some(old) = previous.get(&c.component_id) {
                c.first_seen = c.first_seen.min(old.first_seen);
            }
            stored.insert(c.component_id.clone(), c);
        }
        Ok(())
    }

    async fn get_component(&self, component_id: &str) -> Result<Option<Component>> {
        let stored = self.components.read().map_err(poisoned)?;
        Ok(stored.get(component_id).cloned())
    }

    async fn list_components(&self, repository: Option<&str>) -> Result<Vec<Component>> {
        let stored = self.components.read().map_err(poisoned)?;
        let mut out: Vec<Component> = stored
            .values()
            .filter(|c| repository.map_or(true, |r| c.repository == r))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.repository
                .cmp(&b.repository)
                .then_with(|| a.primary_file().cmp(b.primary_file()))
        });
        Ok(out)
    }

    async fn get_vector(&self, component_id: &str) -> Result<Option<StoredVector>> {
        let vectors = self.vectors.read().map_err(poisoned)?;
        Ok(vectors.get(component_id).cloned())
    }

    async fn upsert_vector(
        &self,
        component_id: &str,
        vector: &[f32],
        model: &str,
    ) -> Result<ComponentVector> {
        let info = ComponentVector {
            vector_id: component_id.to_string(),
            component_id: component_id.to_string(),
            dimension: vector.len(),
            model: model.to_string(),
            last_updated: Utc::now(),
        };
        let mut vectors = self.vectors.write().map_err(poisoned)?;
        vectors.insert(
            component_id.to_string(),
            StoredVector {
                info: info.clone(),
                vector: vector.to_vec(),
            },
        );
        Ok(info)
    }

    async fn components_without_vectors(&self, limit: Option<usize>) -> Result<Vec<Component>> {
        let all = self.list_components(None).await?;
        let vectors = self.vectors.read().map_err(poisoned)?;
        Ok(all
            .into_iter()
            .filter(|c| !vectors.contains_key(&c.component_id))
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn clear_vectors(&self) -> Result<u64> {
        let mut vectors = self.vectors.write().map_err(poisoned)?;
        let n = vectors.len() as u64;
        vectors.clear();
        Ok(n)
    }

    async fn vector_search(
        &self,
        query_vec: &[f32],
        exclude_component_id: &str,
        min_similarity: f64,
    ) -> Result<Vec<VectorCandidate>> {
        let vectors = self.vectors.read().map_err(poisoned)?;
        let components = self.components.read().map_err(poisoned)?;
        let candidates = vectors
            .values()
            .filter(|sv| sv.info.component_id != exclude_component_id)
            .filter_map(|sv| {
                let component = components.get(&sv.info.component_id)?;
                let similarity = cosine_similarity(query_vec, &sv.vector);
                (similarity >= min_similarity).then(|| VectorCandidate {
                    component_id: component.component_id.clone(),
                    repository: component.repository.clone(),
                    first_seen: component.first_seen,
                    similarity,
                })
            })
            .collect();
        Ok(candidates)
    }

    async fn replace_provenance(&self, entries: &[ComponentProvenance]) -> Result<()> {
        let mut stored = self.provenance.write().map_err(poisoned)?;
        *stored = entries.to_vec();
        Ok(())
    }

    async fn list_provenance(&self) -> Result<Vec<ComponentProvenance>> {
        let stored = self.provenance.read().map_err(poisoned)?;
        Ok(stored.clone())
    }
}
