//! Networked and local embedding backends.
//!
//! Implements the core [`EmbeddingProvider`] trait for:
//! - **[`ServiceProvider`]**: the component embedding service (`POST {url}/generate`).
//! - **[`OpenAIProvider`]**: the OpenAI embeddings API over a text rendering of the metadata.
//! - **[`OllamaProvider`]**: a local Ollama instance's `/api/embed` endpoint.
//! - **`LocalProvider`**: in-process inference via fastembed (feature `local-embeddings-fastembed`).
//!
//! Every backend receives [`EmbeddingRequest`] metadata only. Source text
//! is never sent.
//!
//! # Provider Selection
//!
//! ```rust,no_run
//! # use component_atlas::config::EmbeddingConfig;
//! # use component_atlas::embedding::create_provider;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let provider = create_provider(&config).unwrap();
//! assert!(!provider.is_available());
//! ```
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, ... (capped at 2^5), at most `max_retries` retries
//! - Each attempt is bounded by `timeout_secs`

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use component_atlas_core::embedding::{
    DisabledProvider, EmbeddingProvider, EmbeddingRequest, GeneratedEmbedding,
};

use crate::config::EmbeddingConfig;

/// Create the [`EmbeddingProvider`] selected by configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"service"` | [`ServiceProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
/// | `"local"` | `LocalProvider` (feature `local-embeddings-fastembed`) |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "service" => Ok(Arc::new(ServiceProvider::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!(
            "Local embedding provider requires --features local-embeddings-fastembed"
        ),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Settings shared by the HTTP backends.
struct HttpSettings {
    client: reqwest::Client,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl HttpSettings {
    fn from_config(config: &EmbeddingConfig, label: &str) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for {} provider", label))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for {} provider", label))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            model,
            dims,
            max_retries: config.max_retries,
        })
    }

    /// POST `body` to `url`, retrying transient failures.
    async fn post_json(
        &self,
        label: &str,
        url: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(url)
                .header("Content-Type", "application/json")
                .json(body);
            if let Some(token) = bearer {
                request = request.header("Authorization", format!("Bearer {}", token));
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json()
                            .await
                            .with_context(|| format!("{} returned a non-JSON body", label));
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::debug!(%status, attempt, "{} transient error", label);
                        last_err = Some(anyhow::anyhow!("{} error {}: {}", label, status, body_text));
                        continue;
                    }

                    bail!("{} error {}: {}", label, status, body_text);
                }
                Err(e) => {
                    tracing::debug!(error = %e, attempt, "{} request failed", label);
                    last_err = Some(anyhow::anyhow!("{} request to {} failed: {}", label, url, e));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} failed after retries", label)))
    }
}

/// Keep only vectors that belong to a request and have the expected size.
fn checked(
    requests: &[EmbeddingRequest],
    dims: usize,
    generated: Vec<GeneratedEmbedding>,
) -> Vec<GeneratedEmbedding> {
    generated
        .into_iter()
        .filter(|g| {
            let known = requests.iter().any(|r| r.component_id == g.component_id);
            let sized = g.vector.len() == dims;
            if !(known && sized) {
                tracing::warn!(
                    component = %g.component_id,
                    len = g.vector.len(),
                    expected = dims,
                    "discarding malformed embedding"
                );
            }
            known && sized
        })
        .collect()
}

/// Pair positional vectors with the requests they were generated for.
fn zip_with_requests(requests: &[EmbeddingRequest], vectors: Vec<Vec<f32>>) -> Vec<GeneratedEmbedding> {
    requests
        .iter()
        .zip(vectors)
        .map(|(r, vector)| GeneratedEmbedding {
            component_id: r.component_id.clone(),
            vector,
        })
        .collect()
}

fn json_floats(values: &[serde_json::Value]) -> Result<Vec<f32>> {
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow::anyhow!("Invalid embedding: non-numeric element {}", v))
        })
        .collect()
}

// ============ Component Embedding Service ============

/// Client for the component embedding service.
///
/// Request: `POST {url}/generate` with `{"components": [EmbeddingRequest, ...]}`.
/// Response: `{"embeddings": [{"component_id": "...", "vector": [...]}, ...]}`.
pub struct ServiceProvider {
    http: HttpSettings,
    url: String,
}

impl ServiceProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.url required for service provider"))?;
        Ok(Self {
            http: HttpSettings::from_config(config, "service")?,
            url: url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Deserialize)]
struct ServiceResponse {
    embeddings: Vec<GeneratedEmbedding>,
}

fn parse_service_response(json: serde_json::Value) -> Result<Vec<GeneratedEmbedding>> {
    let parsed: ServiceResponse =
        serde_json::from_value(json).context("Invalid embedding service response")?;
    Ok(parsed.embeddings)
}

#[async_trait]
impl EmbeddingProvider for ServiceProvider {
    fn model_name(&self) -> &str {
        &self.http.model
    }
    fn dims(&self) -> usize {
        self.http.dims
    }
    async fn generate(&self, requests: &[EmbeddingRequest]) -> Result<Vec<GeneratedEmbedding>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({ "components": requests });
        let json = self
            .http
            .post_json(
                "Embedding service",
                &format!("{}/generate", self.url),
                None,
                &body,
            )
            .await?;
        Ok(checked(requests, self.http.dims, parse_service_response(json)?))
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIProvider {
    http: HttpSettings,
    api_key: String,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let http = HttpSettings::from_config(config, "OpenAI")?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self { http, api_key })
    }
}

/// Extract `data[].embedding` ordered by `data[].index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, json_floats(embedding)?));
    }
    indexed.sort_by_key(|(i, _)| *i);

    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.http.model
    }
    fn dims(&self) -> usize {
        self.http.dims
    }
    async fn generate(&self, requests: &[EmbeddingRequest]) -> Result<Vec<GeneratedEmbedding>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = requests.iter().map(EmbeddingRequest::to_text).collect();
        let body = serde_json::json!({
            "model": self.http.model,
            "input": texts,
        });
        let json = self
            .http
            .post_json(
                "OpenAI API",
                "https://api.openai.com/v1/embeddings",
                Some(&self.api_key),
                &body,
            )
            .await?;
        let vectors = parse_openai_response(&json)?;
        Ok(checked(requests, self.http.dims, zip_with_requests(requests, vectors)))
    }
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance (default `http://localhost:11434`).
pub struct OllamaProvider {
    http: HttpSettings,
    url: String,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        Ok(Self {
            http: HttpSettings::from_config(config, "Ollama")?,
            url: url.trim_end_matches('/').to_string(),
        })
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|embedding| {
            let values = embedding
                .as_array()
                .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: embedding is not an array"))?;
            json_floats(values)
        })
        .collect()
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.http.model
    }
    fn dims(&self) -> usize {
        self.http.dims
    }
    async fn generate(&self, requests: &[EmbeddingRequest]) -> Result<Vec<GeneratedEmbedding>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = requests.iter().map(EmbeddingRequest::to_text).collect();
        let body = serde_json::json!({
            "model": self.http.model,
            "input": texts,
        });
        let json = self
            .http
            .post_json("Ollama API", &format!("{}/api/embed", self.url), None, &body)
            .await?;
        let vectors = parse_ollama_response(&json)?;
        Ok(checked(requests, self.http.dims, zip_with_requests(requests, vectors)))
    }
}

// ============ Local Provider (fastembed) ============

/// In-process embedding via fastembed. Models are downloaded on first use.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalProvider {
    model_name: String,
    dims: usize,
    batch_size: usize,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
        config_to_fastembed_model(&model_name)?;
        let dims = config.dims.unwrap_or(384);
        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, nomic-embed-text-v1.5",
            other
        ),
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn generate(&self, requests: &[EmbeddingRequest]) -> Result<Vec<GeneratedEmbedding>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let model = config_to_fastembed_model(&self.model_name)?;
        let texts: Vec<String> = requests.iter().map(EmbeddingRequest::to_text).collect();
        let batch_size = self.batch_size;

        let vectors = tokio::task::spawn_blocking(move || {
            let mut embedder = fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(model).with_show_download_progress(false),
            )
            .map_err(|e| anyhow::anyhow!("Failed to initialize local embedding model: {}", e))?;
            embedder
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))
        })
        .await??;

        Ok(checked(requests, self.dims, zip_with_requests(requests, vectors)))
    }
}
