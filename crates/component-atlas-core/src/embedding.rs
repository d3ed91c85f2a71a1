//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] capability that all embedding backends
//! implement, the compact [`EmbeddingRequest`] payload sent to them, the
//! [`DisabledProvider`] used when no embedding service is configured, and
//! pure helpers for vector serialization and similarity.
//!
//! Networked providers (component service, OpenAI, Ollama) and local
//! inference live in the `component-atlas` app crate.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Component, ComponentType};

/// Metadata sent to an embedding backend for one component.
///
/// Carries the public surface only, never source text, so payloads stay
/// small and whole files never leave the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingRequest {
    pub component_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    pub api_signature: String,
    pub imports: Vec<String>,
    pub keywords: Vec<String>,
    pub description: Option<String>,
}

impl EmbeddingRequest {
    pub fn from_component(component: &Component) -> Self {
        Self {
            component_id: component.component_id.clone(),
            name: component.name.clone(),
            component_type: component.component_type,
            api_signature: component.api_signature.clone(),
            imports: component.imports.clone(),
            keywords: component.keywords.clone(),
            description: component.description.clone(),
        }
    }

    /// Render the payload as a single text for text-embedding models.
    pub fn to_text(&self) -> String {
        let mut text = format!(
            "{} ({})\n{}",
            self.name,
            self.component_type.as_str(),
            self.api_signature
        );
        if !self.imports.is_empty() {
            text.push_str("\nimports: ");
            text.push_str(&self.imports.join(", "));
        }
        if !self.keywords.is_empty() {
            text.push_str("\nkeywords: ");
            text.push_str(&self.keywords.join(", "));
        }
        if let Some(desc) = &self.description {
            text.push('\n');
            text.push_str(desc);
        }
        text
    }
}

/// One vector returned by a provider.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GeneratedEmbedding {
    pub component_id: String,
    pub vector: Vec<f32>,
}

/// Capability interface for embedding backends.
///
/// Exactly one provider is selected at startup. When no service is
/// configured the [`DisabledProvider`] is selected, so call sites never
/// branch on whether embeddings exist.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// False when the provider can never produce vectors.
    fn is_available(&self) -> bool {
        true
    }
    /// Generate vectors for a batch of components.
    ///
    /// May return fewer entries than requested; callers match results by
    /// `component_id`.
    async fn generate(&self, requests: &[EmbeddingRequest]) -> Result<Vec<GeneratedEmbedding>>;
}

/// A no-op provider for degraded mode: never produces vectors.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    fn is_available(&self) -> bool {
        false
    }
    async fn generate(&self, _requests: &[EmbeddingRequest]) -> Result<Vec<GeneratedEmbedding>> {
        Ok(Vec::new())
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing
/// a BLOB of `vec.len() × 4` bytes.
///
/// # Example
///
/// ```rust
/// use component_atlas_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors
/// of different lengths, and zero vectors. Accumulates in `f64` so the
/// result is identical across runs and backends.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncStatus;
    use chrono::Utc;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn disabled_provider_returns_nothing() {
        let provider = DisabledProvider;
        assert!(!provider.is_available());
        let out = provider.generate(&[]).await.unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn request_carries_metadata_only() {
        let component = Component {
            component_id: "abc".into(),
            name: "cache_layer".into(),
            component_type: ComponentType::Infrastructure,
            repository: "acme/core".into(),
            files: vec!["cache_layer.py".into()],
            language: "python".into(),
            api_signature: "exports: get, set".into(),
            imports: vec!["redis".into()],
            keywords: vec!["cache".into()],
            description: Some("Redis-backed cache.".into()),
            lines_of_code: 120,
            cyclomatic_complexity: None,
            public_methods: vec!["get".into(), "set".into()],
            first_seen: Utc::now(),
            sync_status: SyncStatus::Unknown,
        };
        let req = EmbeddingRequest::from_component(&component);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "infrastructure");
        assert!(json.get("files").is_none());
        let text = req.to_text();
        assert!(text.starts_with("cache_layer (infrastructure)"));
        assert!(text.contains("imports: redis"));
        assert!(text.ends_with("Redis-backed cache."));
    }
}
