//! Repository dependency data consumed by scoring and planning.
//!
//! The [`DependencyGraph`] trait abstracts an external dependency-graph
//! service. Its absence, or any failure, is treated as "no known consumers":
//! [`resolve_dependencies`] never fails.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Who depends on a repository, and which repositories derive from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDependencies {
    #[serde(default)]
    pub consumers: Vec<String>,
    #[serde(default)]
    pub derivatives: Vec<String>,
}

impl RepositoryDependencies {
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Degree of the repository in the consumer/derivative graph.
    pub fn degree(&self) -> usize {
        self.consumers.len() + self.derivatives.len()
    }
}

#[async_trait]
pub trait DependencyGraph: Send + Sync {
    async fn get_dependencies(&self, repository: &str) -> Result<RepositoryDependencies>;
}

/// Used when no dependency data source is configured.
pub struct NoDependencyGraph;

#[async_trait]
impl DependencyGraph for NoDependencyGraph {
    async fn get_dependencies(&self, _repository: &str) -> Result<RepositoryDependencies> {
        Ok(RepositoryDependencies::default())
    }
}

/// Dependency data supplied up-front (e.g. from configuration).
#[derive(Debug, Clone, Default)]
pub struct StaticDependencyGraph {
    entries: HashMap<String, RepositoryDependencies>,
}

impl StaticDependencyGraph {
    pub fn new(entries: HashMap<String, RepositoryDependencies>) -> Self {
        Self { entries }
    }

    pub fn insert(&mut self, repository: impl Into<String>, deps: RepositoryDependencies) {
        self.entries.insert(repository.into(), deps);
    }
}

#[async_trait]
impl DependencyGraph for StaticDependencyGraph {
    async fn get_dependencies(&self, repository: &str) -> Result<RepositoryDependencies> {
        Ok(self.entries.get(repository).cloned().unwrap_or_default())
    }
}

/// Look up dependencies for each repository, degrading failures to empty.
pub async fn resolve_dependencies<G: DependencyGraph + ?Sized>(
    graph: &G,
    repositories: &[String],
) -> BTreeMap<String, RepositoryDependencies> {
    let mut out = BTreeMap::new();
    for repo in repositories {
        let deps = match graph.get_dependencies(repo).await {
            Ok(mut d) => {
                d.consumers.sort();
                d.consumers.dedup();
                d.derivatives.sort();
                d.derivatives.dedup();
                d
            }
            Err(e) => {
                tracing::warn!(repository = %repo, error = %e, "dependency lookup failed; assuming no consumers");
                RepositoryDependencies::default()
            }
        };
        out.insert(repo.clone(), deps);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingGraph;

    #[async_trait]
    impl DependencyGraph for FailingGraph {
        async fn get_dependencies(&self, _repository: &str) -> Result<RepositoryDependencies> {
            anyhow::bail!("service unreachable")
        }
    }

    #[tokio::test]
    async fn failures_degrade_to_no_consumers() {
        let repos = vec!["a".to_string(), "b".to_string()];
        let resolved = resolve_dependencies(&FailingGraph, &repos).await;
        assert_eq!(resolved.len(), 2);
        assert!(resolved.values().all(|d| d.degree() == 0));
    }

    #[tokio::test]
    async fn static_graph_normalizes_entries() {
        let mut graph = StaticDependencyGraph::default();
        graph.insert(
            "core",
            RepositoryDependencies {
                consumers: vec!["y".into(), "x".into(), "y".into()],
                derivatives: vec![],
            },
        );
        let resolved = resolve_dependencies(&graph, &["core".to_string()]).await;
        assert_eq!(resolved["core"].consumers, vec!["x", "y"]);
        let unknown = resolve_dependencies(&graph, &["other".to_string()]).await;
        assert_eq!(unknown["other"], RepositoryDependencies::default());
    }
}
