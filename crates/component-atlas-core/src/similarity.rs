//! Nearest-neighbor search over component vectors.
//!
//! The algorithm operates through the [`Store`] trait. The caller is
//! responsible for obtaining the query vector (normally through the
//! application's vector cache); a missing vector means no similarity
//! signal is available and yields an empty result.
//!
//! # Ranking
//!
//! 1. Fetch candidates at or above `min_similarity`, excluding the query component.
//! 2. Drop any candidate below the floor or matching the query id (defensive re-check).
//! 3. Sort by similarity (desc), `first_seen` (asc), `component_id` (asc).
//! 4. Truncate to `top_k`.
//!
//! Filtering happens before the cap, so a high floor never hides a valid
//! match behind a lower-scoring one.

use std::cmp::Ordering;

use crate::error::{AtlasError, Result};
use crate::models::{Component, SimilarComponent};
use crate::store::{Store, VectorCandidate};

/// Search tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityParams {
    pub top_k: usize,
    pub min_similarity: f64,
}

impl Default for SimilarityParams {
    fn default() -> Self {
        Self {
            top_k: 10,
            min_similarity: 0.75,
        }
    }
}

impl SimilarityParams {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(AtlasError::invalid_input("top_k must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(AtlasError::invalid_input("min_similarity must be in [0.0, 1.0]"));
        }
        Ok(())
    }
}

/// Find components whose vectors are close to `query_vec`.
///
/// Returns an empty list when `query_vec` is `None`.
pub async fn find_similar<S: Store + ?Sized>(
    store: &S,
    component: &Component,
    query_vec: Option<&[f32]>,
    params: &SimilarityParams,
) -> Result<Vec<SimilarComponent>> {
    params.validate()?;
    let query_vec = match query_vec {
        Some(v) if !v.is_empty() => v,
        _ => return Ok(Vec::new()),
    };

    let candidates = store
        .vector_search(query_vec, &component.component_id, params.min_similarity)
        .await?;

    Ok(rank_candidates(candidates, &component.component_id, params))
}

/// Filter, order, and cap raw candidates.
pub fn rank_candidates(
    candidates: Vec<VectorCandidate>,
    exclude_component_id: &str,
    params: &SimilarityParams,
) -> Vec<SimilarComponent> {
    let mut kept: Vec<VectorCandidate> = candidates
        .into_iter()
        .filter(|c| c.component_id != exclude_component_id)
        .filter(|c| c.similarity >= params.min_similarity)
        .collect();

    kept.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.first_seen.cmp(&b.first_seen))
            .then_with(|| a.component_id.cmp(&b.component_id))
    });
    kept.truncate(params.top_k);

    kept.into_iter()
        .map(|c| SimilarComponent {
            component_id: c.component_id,
            repository: c.repository,
            similarity_score: c.similarity,
        })
        .collect()
}
