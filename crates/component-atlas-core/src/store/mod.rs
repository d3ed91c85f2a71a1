//! Storage abstraction for Component Atlas.
//!
//! The [`Store`] trait covers the three persisted collections: components
//! keyed by `component_id`, component vectors (one per component), and the
//! provenance index. Backends are pluggable (SQLite in the app crate,
//! [`memory::InMemoryStore`] for tests and embedding in other hosts).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Component, ComponentProvenance, ComponentVector};

/// A stored embedding together with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredVector {
    pub info: ComponentVector,
    pub vector: Vec<f32>,
}

/// A neighbor candidate produced by [`Store::vector_search`].
///
/// Carries enough component data to rank and tie-break without further
/// round-trips.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorCandidate {
    pub component_id: String,
    pub repository: String,
    pub first_seen: DateTime<Utc>,
    /// Cosine similarity, `1 - cosine_distance`.
    pub similarity: f64,
}

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`replace_repository_components`](Store::replace_repository_components) | Replace a repository's components after a scan |
/// | [`get_component`](Store::get_component) | Fetch one component |
/// | [`list_components`](Store::list_components) | All components, optionally for one repository |
/// | [`get_vector`](Store::get_vector) | Fetch a component's vector |
/// | [`upsert_vector`](Store::upsert_vector) | Insert or replace a component's vector |
/// | [`components_without_vectors`](Store::components_without_vectors) | Components awaiting embedding |
/// | [`clear_vectors`](Store::clear_vectors) | Drop every vector |
/// | [`vector_search`](Store::vector_search) | Cosine nearest neighbors above a floor |
/// | [`replace_provenance`](Store::replace_provenance) | Replace the provenance index |
/// | [`list_provenance`](Store::list_provenance) | Read the provenance index |
#[async_trait]
pub trait Store: Send + Sync {
    /// Replace every component of `repository` with `components`.
    ///
    /// Components that already existed keep the earlier of the stored and
    /// the new `first_seen`.
    async fn replace_repository_components(
        &self,
        repository: &str,
        components: &[Component],
    ) -> Result<()>;

    async fn get_component(&self, component_id: &str) -> Result<Option<Component>>;

    /// Components ordered by repository, then primary file.
    async fn list_components(&self, repository: Option<&str>) -> Result<Vec<Component>>;

    async fn get_vector(&self, component_id: &str) -> Result<Option<StoredVector>>;

    /// Insert or replace the vector for `component_id`, stamping `last_updated`.
    async fn upsert_vector(
        &self,
        component_id: &str,
        vector: &[f32],
        model: &str,
    ) -> Result<ComponentVector>;

    async fn components_without_vectors(&self, limit: Option<usize>) -> Result<Vec<Component>>;

    /// Returns the number of vectors removed.
    async fn clear_vectors(&self) -> Result<u64>;

    /// Vectors of existing components, excluding `exclude_component_id`,
    /// whose similarity to `query_vec` is at least `min_similarity`.
    async fn vector_search(
        &self,
        query_vec: &[f32],
        exclude_component_id: &str,
        min_similarity: f64,
    ) -> Result<Vec<VectorCandidate>>;

    async fn replace_provenance(&self, entries: &[ComponentProvenance]) -> Result<()>;

    async fn list_provenance(&self) -> Result<Vec<ComponentProvenance>>;
}
