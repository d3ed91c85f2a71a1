//! Core data models used throughout Component Atlas.
//!
//! These types describe detected components, their embeddings, the
//! cross-repository provenance of component families, and the repository
//! profiles that canonical-location scoring reads.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AtlasError;

/// Upper bound on `Component::keywords`.
pub const MAX_KEYWORDS: usize = 20;
/// Upper bound on `Component::public_methods`.
pub const MAX_PUBLIC_METHODS: usize = 20;

/// Length of the hex `component_id`.
const COMPONENT_ID_LEN: usize = 16;

/// Category a component is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    ApiClient,
    Infrastructure,
    BusinessLogic,
    DeploymentPattern,
}

impl ComponentType {
    pub const ALL: [ComponentType; 4] = [
        ComponentType::ApiClient,
        ComponentType::Infrastructure,
        ComponentType::BusinessLogic,
        ComponentType::DeploymentPattern,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComponentType::ApiClient => "api_client",
            ComponentType::Infrastructure => "infrastructure",
            ComponentType::BusinessLogic => "business_logic",
            ComponentType::DeploymentPattern => "deployment_pattern",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentType {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AtlasError::invalid_input(format!("unknown component type '{}'", s)))
    }
}

/// Relationship of one component instance to its family's origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Original,
    Diverged,
    #[default]
    Unknown,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Original => "original",
            SyncStatus::Diverged => "diverged",
            SyncStatus::Unknown => "unknown",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(SyncStatus::Original),
            "diverged" => Ok(SyncStatus::Diverged),
            "unknown" => Ok(SyncStatus::Unknown),
            other => Err(AtlasError::invalid_input(format!(
                "unknown sync status '{}'",
                other
            ))),
        }
    }
}

/// Progress of consolidating a component family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationStatus {
    #[default]
    Unconsolidated,
    Planned,
    InProgress,
    Consolidated,
}

impl ConsolidationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsolidationStatus::Unconsolidated => "unconsolidated",
            ConsolidationStatus::Planned => "planned",
            ConsolidationStatus::InProgress => "in_progress",
            ConsolidationStatus::Consolidated => "consolidated",
        }
    }
}

impl FromStr for ConsolidationStatus {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unconsolidated" => Ok(ConsolidationStatus::Unconsolidated),
            "planned" => Ok(ConsolidationStatus::Planned),
            "in_progress" => Ok(ConsolidationStatus::InProgress),
            "consolidated" => Ok(ConsolidationStatus::Consolidated),
            other => Err(AtlasError::invalid_input(format!(
                "unknown consolidation status '{}'",
                other
            ))),
        }
    }
}

/// One detected structural unit inside a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Stable identifier derived from `(repository, primary file path)`.
    pub component_id: String,
    pub name: String,
    pub component_type: ComponentType,
    /// `owner/name` of the containing repository.
    pub repository: String,
    /// Repository-relative paths; the first entry is the primary file.
    pub files: Vec<String>,
    pub language: String,
    /// Free-text summary of the public surface.
    pub api_signature: String,
    /// Imported modules, sorted and deduplicated.
    pub imports: Vec<String>,
    /// Indicative keywords, sorted, at most [`MAX_KEYWORDS`].
    pub keywords: Vec<String>,
    pub description: Option<String>,
    pub lines_of_code: u32,
    pub cyclomatic_complexity: Option<u32>,
    /// Public symbol names, at most [`MAX_PUBLIC_METHODS`].
    pub public_methods: Vec<String>,
    pub first_seen: DateTime<Utc>,
    pub sync_status: SyncStatus,
}

impl Component {
    /// Repository-relative path of the primary file.
    pub fn primary_file(&self) -> &str {
        self.files.first().map(String::as_str).unwrap_or_default()
    }
}

/// Derive the component identifier for a file in a repository.
///
/// Pure function of its inputs: re-scanning the same file yields the same id.
pub fn component_id_for(repository: &str, primary_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(repository.as_bytes());
    hasher.update(b"\0");
    hasher.update(primary_path.replace('\\', "/").as_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(COMPONENT_ID_LEN);
    id
}

/// Metadata about the embedding stored for a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentVector {
    /// Equal to `component_id` by convention.
    pub vector_id: String,
    pub component_id: String,
    pub dimension: usize,
    pub model: String,
    pub last_updated: DateTime<Utc>,
}

/// One occurrence of a component family inside a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentLocation {
    pub repository: String,
    pub files: Vec<String>,
    pub sync_status: SyncStatus,
    pub usage_count: u32,
}

/// Cross-repository identity of a component family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentProvenance {
    /// Representative component (the origin instance).
    pub component_id: String,
    pub signature: String,
    pub component_name: String,
    pub component_type: ComponentType,
    pub origin_repository: String,
    pub first_seen: DateTime<Utc>,
    /// Origin location first, then the remaining locations by `first_seen`.
    pub locations: Vec<ComponentLocation>,
    pub consolidation_status: ConsolidationStatus,
}

impl ComponentProvenance {
    /// True when the family exists in more than one place.
    pub fn is_duplicated(&self) -> bool {
        self.locations.len() > 1
    }

    /// Repositories holding a copy, in location order, each once.
    pub fn repositories(&self) -> Vec<&str> {
        let mut repos: Vec<&str> = Vec::new();
        for l in &self.locations {
            if !repos.contains(&l.repository.as_str()) {
                repos.push(l.repository.as_str());
            }
        }
        repos
    }
}

/// A neighbor returned by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarComponent {
    pub component_id: String,
    pub repository: String,
    pub similarity_score: f64,
}

/// What is known about a repository when judging it as a canonical home.
///
/// Every field except `name` is optional; missing data lowers confidence
/// rather than failing the scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryProfile {
    pub name: String,
    #[serde(default)]
    pub problem_domain: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
    /// Commits over the last 90 days.
    #[serde(default)]
    pub recent_commits: Option<u32>,
}

impl RepositoryProfile {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A proposed move of a component into its canonical location.
///
/// Immutable once created; persisted by an external knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationRecommendation {
    pub recommendation_id: String,
    pub timestamp: DateTime<Utc>,
    pub component_id: String,
    pub from_repository: String,
    pub to_repository: String,
    pub priority: Priority,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub reasoning: String,
    pub benefits: Vec<String>,
    pub risks: Vec<String>,
    pub estimated_effort_hours: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_id_is_stable_and_path_sensitive() {
        let a = component_id_for("acme/api", "src/client.py");
        assert_eq!(a, component_id_for("acme/api", "src/client.py"));
        assert_eq!(a.len(), 16);
        assert_ne!(a, component_id_for("acme/api", "src/other.py"));
        assert_ne!(a, component_id_for("acme/web", "src/client.py"));
    }

    #[test]
    fn component_id_normalizes_separators() {
        assert_eq!(
            component_id_for("r", "src\\client.py"),
            component_id_for("r", "src/client.py")
        );
    }

    #[test]
    fn enums_round_trip_through_strings() {
        for t in ComponentType::ALL {
            assert_eq!(t.as_str().parse::<ComponentType>().unwrap(), t);
        }
        assert_eq!("diverged".parse::<SyncStatus>().unwrap(), SyncStatus::Diverged);
        assert_eq!(
            "in_progress".parse::<ConsolidationStatus>().unwrap(),
            ConsolidationStatus::InProgress
        );
        assert!("mystery".parse::<ComponentType>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&ComponentType::DeploymentPattern).unwrap();
        assert_eq!(json, "\"deployment_pattern\"");
    }
}
