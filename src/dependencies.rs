//! Dependency-graph sources for scoring and planning.
//!
//! With `[dependencies] url` set, consumers and derivatives come from the
//! HTTP service; otherwise from the `[repositories.*]` tables. Lookups that
//! fail are downgraded to "no known consumers" by
//! [`resolve_dependencies`](component_atlas_core::dependency::resolve_dependencies).

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use component_atlas_core::dependency::{DependencyGraph, RepositoryDependencies};

use crate::config::Config;

/// `GET {url}/dependencies/{repository}` returning `{consumers, derivatives}`.
pub struct HttpDependencyGraph {
    client: reqwest::Client,
    url: String,
}

impl HttpDependencyGraph {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DependencyGraph for HttpDependencyGraph {
    async fn get_dependencies(&self, repository: &str) -> Result<RepositoryDependencies> {
        let endpoint = format!("{}/dependencies/{}", self.url, repository);
        let resp = self
            .client
            .get(&endpoint)
            .send()
            .await
            .with_context(|| format!("dependency service unreachable: {}", endpoint))?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(RepositoryDependencies::default());
        }
        if !status.is_success() {
            bail!("dependency service error ({}) for {}", status, repository);
        }
        Ok(resp.json::<RepositoryDependencies>().await?)
    }
}

/// The graph configured for this run.
pub fn dependency_graph(config: &Config) -> Result<Box<dyn DependencyGraph>> {
    match config.dependencies.url.as_deref() {
        Some(url) => Ok(Box::new(HttpDependencyGraph::new(
            url,
            Duration::from_secs(config.dependencies.timeout_secs),
        )?)),
        None => Ok(Box::new(config.static_dependency_graph())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use component_atlas_core::dependency::resolve_dependencies;

    #[tokio::test]
    async fn unreachable_service_means_no_consumers() {
        // Nothing listens on port 9 (discard) in the test environment.
        let graph = HttpDependencyGraph::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let repos = vec!["acme/platform".to_string()];
        let deps = resolve_dependencies(&graph, &repos).await;
        assert_eq!(deps["acme/platform"], RepositoryDependencies::default());
    }
}
