use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use component_atlas_core::dependency::{RepositoryDependencies, StaticDependencyGraph};
use component_atlas_core::error::validate_repository;
use component_atlas_core::models::RepositoryProfile;
use component_atlas_core::similarity::SimilarityParams;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub dependencies: DependenciesConfig,
    #[serde(default)]
    pub repositories: BTreeMap<String, RepositoryConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde(default = "default_min_lines")]
    pub min_lines: usize,
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
    #[serde(default = "default_max_public_methods")]
    pub max_public_methods: usize,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_lines: default_min_lines(),
            max_keywords: default_max_keywords(),
            max_public_methods: default_max_public_methods(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_min_lines() -> usize {
    20
}
fn default_max_keywords() -> usize {
    component_atlas_core::models::MAX_KEYWORDS
}
fn default_max_public_methods() -> usize {
    component_atlas_core::models::MAX_PUBLIC_METHODS
}
fn default_max_file_bytes() -> u64 {
    1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the `service` and `ollama` providers.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 32,
            max_retries: 2,
            timeout_secs: 10,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    10
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimilarityConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
        }
    }
}

fn default_top_k() -> usize {
    10
}
fn default_min_similarity() -> f64 {
    0.75
}

impl SimilarityConfig {
    pub fn params(&self) -> SimilarityParams {
        SimilarityParams {
            top_k: self.top_k,
            min_similarity: self.min_similarity,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DependenciesConfig {
    /// Dependency-graph service. When unset, `[repositories.*]` data is used.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_dependency_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DependenciesConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_dependency_timeout_secs(),
        }
    }
}

fn default_dependency_timeout_secs() -> u64 {
    5
}

/// One tracked repository.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RepositoryConfig {
    /// Local checkout. Repositories without a root can be scored but not scanned.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub problem_domain: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub consumers: Vec<String>,
    #[serde(default)]
    pub derivatives: Vec<String>,
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recent_commits: Option<u32>,
}

impl Config {
    pub fn repository_names(&self) -> Vec<String> {
        self.repositories.keys().cloned().collect()
    }

    /// Profile for `name`; unknown repositories get an empty profile.
    pub fn repository_profile(&self, name: &str) -> RepositoryProfile {
        match self.repositories.get(name) {
            Some(r) => RepositoryProfile {
                name: name.to_string(),
                problem_domain: r.problem_domain.clone(),
                description: r.description.clone(),
                last_activity: r.last_activity,
                recent_commits: r.recent_commits,
            },
            None => RepositoryProfile::named(name),
        }
    }

    pub fn static_dependency_graph(&self) -> StaticDependencyGraph {
        let mut graph = StaticDependencyGraph::default();
        for (name, r) in &self.repositories {
            graph.insert(
                name.clone(),
                RepositoryDependencies {
                    consumers: r.consumers.clone(),
                    derivatives: r.derivatives.clone(),
                },
            );
        }
        graph
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate scan
    if config.scan.min_lines == 0 {
        anyhow::bail!("scan.min_lines must be > 0");
    }

    // Validate similarity
    if config.similarity.top_k < 1 {
        anyhow::bail!("similarity.top_k must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.similarity.min_similarity) {
        anyhow::bail!("similarity.min_similarity must be in [0.0, 1.0]");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "service" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, service, openai, ollama, or local.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
    }

    if config.embedding.provider == "service" && config.embedding.url.is_none() {
        anyhow::bail!("embedding.url must be specified when provider is 'service'");
    }

    // Validate repositories
    for name in config.repositories.keys() {
        validate_repository(name)
            .with_context(|| format!("repositories.\"{}\" is not a valid repository name", name))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse("[db]\npath = \"./data/atlas.sqlite\"\n").unwrap();
        assert_eq!(config.scan.min_lines, 20);
        assert_eq!(config.similarity.top_k, 10);
        assert_eq!(config.similarity.min_similarity, 0.75);
        assert!(!config.embedding.is_enabled());
        assert!(config.repositories.is_empty());
    }

    #[test]
    fn repositories_build_profiles_and_graph() {
        let config = parse(
            r#"
[db]
path = "x.sqlite"

[repositories."acme/platform"]
problem_domain = "shared infrastructure"
consumers = ["acme/web", "acme/api"]
last_activity = "2026-01-31T00:00:00Z"
recent_commits = 12
"#,
        )
        .unwrap();
        let profile = config.repository_profile("acme/platform");
        assert_eq!(profile.problem_domain.as_deref(), Some("shared infrastructure"));
        assert_eq!(profile.recent_commits, Some(12));
        assert!(profile.last_activity.is_some());
        assert_eq!(config.repository_profile("other").name, "other");
        assert_eq!(config.repository_names(), vec!["acme/platform"]);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(parse("[db]\npath = \"x\"\n[scan]\nmin_lines = 0\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[similarity]\nmin_similarity = 1.5\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[similarity]\ntop_k = 0\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"magic\"\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse(
            "[db]\npath = \"x\"\n[embedding]\nprovider = \"service\"\nmodel = \"m\"\ndims = 8\n"
        )
        .is_err());
        assert!(parse("[db]\npath = \"x\"\n[repositories.\"bad name\"]\n").is_err());
    }
}
