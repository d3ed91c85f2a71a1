//! Canonical-location scoring.
//!
//! Each candidate repository is scored as the canonical home for a
//! component using six factors, each normalized to `[0, 1]`, combined by a
//! fixed weighted sum:
//!
//! | Factor | Weight | Signal |
//! |--------|--------|--------|
//! | repository purpose | 0.30 | described as shared infrastructure/library, and has >2 consumers |
//! | usage count | 0.30 | consumers that would use the component if centralized |
//! | dependency centrality | 0.20 | degree in the consumer/derivative graph, relative to the best candidate |
//! | maintenance activity | 0.10 | recency relative to the most recent candidate, and commit frequency |
//! | component complexity | 0.05 | LOC/complexity blend, scaled toward well-maintained repositories |
//! | first implementation | 0.05 | 1.0 for the family origin, 0.5 otherwise |
//!
//! Weights are held as integer basis points so that they sum to exactly
//! 1.0. Scoring reads no clock and no randomness: identical inputs give
//! bit-identical scores.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::dependency::RepositoryDependencies;
use crate::error::{validate_repository, AtlasError, Result};
use crate::models::{Component, RepositoryProfile};

const BASIS_POINTS_TOTAL: u32 = 10_000;

/// Consumer count above which a repository counts as widely used.
const PURPOSE_CONSUMER_THRESHOLD: usize = 2;
/// Consumer count at which the usage factor saturates.
const USAGE_SATURATION: f64 = 5.0;
/// Days behind the most recent candidate at which recency reaches zero.
const RECENCY_HORIZON_DAYS: f64 = 365.0;
/// Commits per 90 days at which frequency saturates.
const COMMIT_SATURATION: f64 = 30.0;
const LOC_SATURATION: f64 = 500.0;
const COMPLEXITY_SATURATION: f64 = 20.0;
const NEUTRAL_FIRST_IMPLEMENTATION: f64 = 0.5;
/// Number of factors named in the reasoning string.
const REASONING_TOP_FACTORS: usize = 3;

/// Terms that mark a repository as shared infrastructure or a library.
const SHARED_PURPOSE_TERMS: &[&str] = &[
    "infrastructure",
    "library",
    "shared",
    "platform",
    "common",
    "sdk",
    "toolkit",
    "framework",
    "utilities",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Factor {
    RepositoryPurpose,
    UsageCount,
    DependencyCentrality,
    MaintenanceActivity,
    ComponentComplexity,
    FirstImplementation,
}

impl Factor {
    pub const ALL: [Factor; 6] = [
        Factor::RepositoryPurpose,
        Factor::UsageCount,
        Factor::DependencyCentrality,
        Factor::MaintenanceActivity,
        Factor::ComponentComplexity,
        Factor::FirstImplementation,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Factor::RepositoryPurpose => "repository_purpose",
            Factor::UsageCount => "usage_count",
            Factor::DependencyCentrality => "dependency_centrality",
            Factor::MaintenanceActivity => "maintenance_activity",
            Factor::ComponentComplexity => "component_complexity",
            Factor::FirstImplementation => "first_implementation",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Factor::RepositoryPurpose => "repository purpose",
            Factor::UsageCount => "usage count",
            Factor::DependencyCentrality => "dependency centrality",
            Factor::MaintenanceActivity => "maintenance activity",
            Factor::ComponentComplexity => "component complexity",
            Factor::FirstImplementation => "first implementation",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Factor weights in basis points (1/10 000).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CentralityWeights {
    basis_points: [u32; 6],
}

impl Default for CentralityWeights {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl CentralityWeights {
    pub const STANDARD: CentralityWeights = CentralityWeights {
        basis_points: [3_000, 3_000, 2_000, 1_000, 500, 500],
    };

    pub fn basis_points(&self, factor: Factor) -> u32 {
        self.basis_points[factor.index()]
    }

    pub fn weight(&self, factor: Factor) -> f64 {
        self.basis_points(factor) as f64 / BASIS_POINTS_TOTAL as f64
    }

    pub fn total_basis_points(&self) -> u32 {
        self.basis_points.iter().sum()
    }

    /// Sum of the weights as a float. Exactly `1.0` for valid weights.
    pub fn sum(&self) -> f64 {
        self.total_basis_points() as f64 / BASIS_POINTS_TOTAL as f64
    }

    /// Fails unless the weights sum to exactly 1.0.
    pub fn assert_normalized(&self) -> Result<()> {
        if self.total_basis_points() != BASIS_POINTS_TOTAL {
            return Err(AtlasError::invalid_input(format!(
                "centrality weights sum to {} basis points, expected {}",
                self.total_basis_points(),
                BASIS_POINTS_TOTAL
            )));
        }
        Ok(())
    }

    pub fn as_map(&self) -> BTreeMap<String, f64> {
        Factor::ALL
            .iter()
            .map(|f| (f.key().to_string(), self.weight(*f)))
            .collect()
    }
}

/// Extra inputs for scoring.
#[derive(Debug, Clone, Default)]
pub struct CentralityContext {
    /// Dependency data per repository; missing entries mean no consumers.
    pub dependencies: BTreeMap<String, RepositoryDependencies>,
    /// Origin repository of the component family, when known.
    pub origin_repository: Option<String>,
}

/// Score and explanation for one candidate repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalScore {
    pub repository: String,
    /// 1-based position in the ranking.
    pub rank: usize,
    pub score: f64,
    pub factors: BTreeMap<String, f64>,
    pub weights: BTreeMap<String, f64>,
    pub reasoning: String,
}

/// Ranked scores for all candidates of one component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CentralityReport {
    pub component_id: String,
    pub ranked: Vec<CanonicalScore>,
}

impl CentralityReport {
    pub fn best(&self) -> Option<&CanonicalScore> {
        self.ranked.first()
    }

    pub fn get(&self, repository: &str) -> Option<&CanonicalScore> {
        self.ranked.iter().find(|s| s.repository == repository)
    }

    pub fn by_repository(&self) -> BTreeMap<&str, &CanonicalScore> {
        self.ranked
            .iter()
            .map(|s| (s.repository.as_str(), s))
            .collect()
    }
}

/// Score every candidate repository with the standard weights.
pub fn score(
    component: &Component,
    candidates: &[RepositoryProfile],
    ctx: &CentralityContext,
) -> Result<CentralityReport> {
    score_with_weights(component, candidates, ctx, &CentralityWeights::STANDARD)
}

pub fn score_with_weights(
    component: &Component,
    candidates: &[RepositoryProfile],
    ctx: &CentralityContext,
    weights: &CentralityWeights,
) -> Result<CentralityReport> {
    weights.assert_normalized()?;
    if candidates.is_empty() {
        return Err(AtlasError::EmptyCandidates);
    }

    let mut seen = BTreeSet::new();
    let mut unique: Vec<&RepositoryProfile> = Vec::with_capacity(candidates.len());
    for profile in candidates {
        validate_repository(&profile.name)?;
        if seen.insert(profile.name.as_str()) {
            unique.push(profile);
        }
    }

    let no_deps = RepositoryDependencies::default();
    let deps_of = |repo: &str| ctx.dependencies.get(repo).unwrap_or(&no_deps);

    let max_degree = unique
        .iter()
        .map(|p| deps_of(&p.name).degree())
        .max()
        .unwrap_or(0);
    let newest_activity = unique.iter().filter_map(|p| p.last_activity).max();

    let mut scored: Vec<CanonicalScore> = unique
        .iter()
        .map(|profile| {
            let deps = deps_of(&profile.name);
            let mut values = [0.0f64; 6];
            let mut notes: [String; 6] = Default::default();

            let shared = describes_shared_code(profile);
            let consumers = deps.consumer_count();
            let widely_used = consumers > PURPOSE_CONSUMER_THRESHOLD;
            values[Factor::RepositoryPurpose.index()] = match (shared, widely_used) {
                (true, true) => 1.0,
                (true, false) => 0.5,
                (false, true) => 0.25,
                (false, false) => 0.0,
            };
            notes[Factor::RepositoryPurpose.index()] = match (shared, widely_used) {
                (true, true) => format!("shared code repository with {} consumers", consumers),
                (true, false) => "described as shared code".to_string(),
                (false, true) => format!("{} consumers", consumers),
                (false, false) => "no shared-code purpose".to_string(),
            };

            values[Factor::UsageCount.index()] = (consumers as f64 / USAGE_SATURATION).min(1.0);
            notes[Factor::UsageCount.index()] = format!("{} known consumers", consumers);

            values[Factor::DependencyCentrality.index()] = if max_degree == 0 {
                0.0
            } else {
                deps.degree() as f64 / max_degree as f64
            };
            notes[Factor::DependencyCentrality.index()] =
                format!("graph degree {} of max {}", deps.degree(), max_degree);

            let maintenance = maintenance_activity(profile, newest_activity);
            values[Factor::MaintenanceActivity.index()] = maintenance;
            notes[Factor::MaintenanceActivity.index()] = match profile.recent_commits {
                Some(n) => format!("{} commits in 90 days", n),
                None => "activity relative to most recent candidate".to_string(),
            };

            let blend = complexity_blend(component);
            values[Factor::ComponentComplexity.index()] = blend * (0.5 + 0.5 * maintenance);
            notes[Factor::ComponentComplexity.index()] = format!(
                "{} lines, complexity {}",
                component.lines_of_code,
                component
                    .cyclomatic_complexity
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            );

            let is_origin = ctx.origin_repository.as_deref() == Some(profile.name.as_str());
            values[Factor::FirstImplementation.index()] = if is_origin {
                1.0
            } else {
                NEUTRAL_FIRST_IMPLEMENTATION
            };
            notes[Factor::FirstImplementation.index()] = if is_origin {
                "origin of the component family".to_string()
            } else {
                "neutral".to_string()
            };

            let weighted_bp: f64 = Factor::ALL
                .iter()
                .map(|f| weights.basis_points(*f) as f64 * values[f.index()])
                .sum();
            let total = weighted_bp / BASIS_POINTS_TOTAL as f64;

            CanonicalScore {
                repository: profile.name.clone(),
                rank: 0,
                score: total,
                factors: Factor::ALL
                    .iter()
                    .map(|f| (f.key().to_string(), values[f.index()]))
                    .collect(),
                weights: weights.as_map(),
                reasoning: reasoning(&profile.name, total, &values, &notes, weights),
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.repository.cmp(&b.repository))
    });
    for (i, s) in scored.iter_mut().enumerate() {
        s.rank = i + 1;
    }

    Ok(CentralityReport {
        component_id: component.component_id.clone(),
        ranked: scored,
    })
}

fn describes_shared_code(profile: &RepositoryProfile) -> bool {
    let text = format!(
        "{} {}",
        profile.problem_domain.as_deref().unwrap_or_default(),
        profile.description.as_deref().unwrap_or_default()
    )
    .to_lowercase();
    SHARED_PURPOSE_TERMS.iter().any(|t| text.contains(t))
}

fn maintenance_activity(
    profile: &RepositoryProfile,
    newest: Option<chrono::DateTime<chrono::Utc>>,
) -> f64 {
    let recency = match (profile.last_activity, newest) {
        (Some(own), Some(newest)) => {
            let days_behind = (newest - own).num_days().max(0) as f64;
            Some(1.0 - (days_behind / RECENCY_HORIZON_DAYS).min(1.0))
        }
        _ => None,
    };
    let frequency = profile
        .recent_commits
        .map(|n| (n as f64 / COMMIT_SATURATION).min(1.0));

    match (recency, frequency) {
        (Some(r), Some(f)) => (r + f) / 2.0,
        (Some(r), None) => r,
        (None, Some(f)) => f,
        (None, None) => 0.0,
    }
}

fn complexity_blend(component: &Component) -> f64 {
    let loc = (component.lines_of_code as f64 / LOC_SATURATION).min(1.0);
    match component.cyclomatic_complexity {
        Some(cc) => (loc + (cc as f64 / COMPLEXITY_SATURATION).min(1.0)) / 2.0,
        None => loc,
    }
}

fn reasoning(
    repository: &str,
    total: f64,
    values: &[f64; 6],
    notes: &[String; 6],
    weights: &CentralityWeights,
) -> String {
    let mut contributions: Vec<(Factor, f64)> = Factor::ALL
        .iter()
        .map(|f| (*f, weights.weight(*f) * values[f.index()]))
        .filter(|(_, c)| *c > 0.0)
        .collect();
    contributions.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    if contributions.is_empty() {
        return format!("{} scores {:.3}; no factor contributed", repository, total);
    }

    let top: Vec<String> = contributions
        .iter()
        .take(REASONING_TOP_FACTORS)
        .map(|(f, c)| format!("{} +{:.3} ({})", f.label(), c, notes[f.index()]))
        .collect();
    format!(
        "{} scores {:.3}; top factors: {}",
        repository,
        total,
        top.join(", ")
    )
}
