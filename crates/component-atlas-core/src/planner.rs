//! Consolidation planning.
//!
//! [`plan`] turns a `(component, from, to)` triple into a fixed four-phase
//! migration plan. It is a pure function of its inputs and the known
//! repository set. Impact data from the dependency graph can be merged in
//! afterwards with [`ConsolidationPlan::with_impact`]; a plan is complete
//! without it.
//!
//! [`recommend`] condenses a plan plus centrality scores into an immutable
//! [`ConsolidationRecommendation`].

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::centrality::CentralityReport;
use crate::dependency::RepositoryDependencies;
use crate::error::{validate_repository, AtlasError, Result};
use crate::models::{ConsolidationRecommendation, Priority};

pub const PHASE_ANALYZE: &str = "Analyze & Prepare";
pub const PHASE_MERGE: &str = "Merge & Standardize";
pub const PHASE_UPDATE_CONSUMERS: &str = "Update Consumers";
pub const PHASE_MONITOR: &str = "Monitor & Verify";

/// Inclusive range of estimated hours, rendered as `"min-max"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffortRange {
    pub min_hours: u32,
    pub max_hours: u32,
}

impl EffortRange {
    pub const fn new(min_hours: u32, max_hours: u32) -> Self {
        Self {
            min_hours,
            max_hours,
        }
    }

    /// Upper midpoint, used as a single-number estimate.
    pub fn midpoint(&self) -> u32 {
        (self.min_hours + self.max_hours + 1) / 2
    }
}

impl std::ops::Add for EffortRange {
    type Output = EffortRange;

    fn add(self, rhs: Self) -> Self {
        EffortRange::new(self.min_hours + rhs.min_hours, self.max_hours + rhs.max_hours)
    }
}

impl fmt::Display for EffortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min_hours, self.max_hours)
    }
}

impl Serialize for EffortRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanPhase {
    pub name: String,
    pub description: String,
    pub tasks: Vec<String>,
    pub effort_hours: EffortRange,
    /// Only populated for the consumer-update phase.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub affected_consumers: Vec<String>,
}

/// Dependency-graph view of who a consolidation touches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactAnalysis {
    pub consumers: Vec<String>,
    pub derivatives: Vec<String>,
    pub risk_level: Priority,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidationPlan {
    pub component_name: String,
    pub from_repository: String,
    pub to_repository: String,
    pub phases: Vec<PlanPhase>,
    pub total_effort_hours: EffortRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<ImpactAnalysis>,
}

impl ConsolidationPlan {
    pub fn phase(&self, name: &str) -> Option<&PlanPhase> {
        self.phases.iter().find(|p| p.name == name)
    }

    pub fn affected_consumers(&self) -> &[String] {
        self.phase(PHASE_UPDATE_CONSUMERS)
            .map(|p| p.affected_consumers.as_slice())
            .unwrap_or_default()
    }

    /// Attach dependency data for the source repository.
    pub fn with_impact(mut self, deps: &RepositoryDependencies) -> Self {
        let consumers: Vec<String> = deps
            .consumers
            .iter()
            .filter(|c| **c != self.to_repository)
            .cloned()
            .collect();
        let risk_level = match consumers.len() + deps.derivatives.len() {
            0 => Priority::Low,
            1..=3 => Priority::Medium,
            _ => Priority::High,
        };
        self.impact = Some(ImpactAnalysis {
            consumers,
            derivatives: deps.derivatives.clone(),
            risk_level,
        });
        self
    }
}

/// Build the four-phase plan for moving `component_name` from `from_repo`
/// into `to_repo`.
///
/// `known_repositories` is the current repository set; every member other
/// than `to_repo` is listed as a potentially affected consumer.
pub fn plan(
    component_name: &str,
    from_repo: &str,
    to_repo: &str,
    known_repositories: &[String],
) -> Result<ConsolidationPlan> {
    let name = component_name.trim();
    if name.is_empty() {
        return Err(AtlasError::invalid_input("component name must not be empty"));
    }
    validate_repository(from_repo)?;
    validate_repository(to_repo)?;
    if from_repo == to_repo {
        return Err(AtlasError::invalid_input(
            "source and target repository must differ",
        ));
    }

    let mut consumers: BTreeSet<&str> = known_repositories
        .iter()
        .map(String::as_str)
        .filter(|r| *r != to_repo)
        .collect();
    consumers.insert(from_repo);
    let consumers: Vec<String> = consumers.into_iter().map(str::to_string).collect();
    let n = consumers.len() as u32;

    let mut update_tasks = vec![
        format!("Publish {} from {} as a versioned dependency", name, to_repo),
        format!("Replace local copies of {} with the shared version", name),
    ];
    update_tasks.extend(
        consumers
            .iter()
            .map(|c| format!("Migrate {} to {}'s {}", c, to_repo, name)),
    );
    update_tasks.push(format!("Remove the duplicate from {}", from_repo));

    let phases = vec![
        PlanPhase {
            name: PHASE_ANALYZE.to_string(),
            description: format!(
                "Compare the {} implementations in {} and {} and agree on the target API",
                name, from_repo, to_repo
            ),
            tasks: vec![
                format!("Diff {} between {} and {}", name, from_repo, to_repo),
                "Inventory callers and public API differences".to_string(),
                "Confirm test coverage of both implementations".to_string(),
                "Agree on ownership with the target repository maintainers".to_string(),
            ],
            effort_hours: EffortRange::new(2, 4),
            affected_consumers: Vec::new(),
        },
        PlanPhase {
            name: PHASE_MERGE.to_string(),
            description: format!("Fold divergent behavior of {} into {}", name, to_repo),
            tasks: vec![
                format!("Port behavior unique to {} into {}", from_repo, to_repo),
                "Unify naming, configuration, and error handling".to_string(),
                "Merge and extend the test suites".to_string(),
                "Document the consolidated API and migration notes".to_string(),
            ],
            effort_hours: EffortRange::new(4, 8),
            affected_consumers: Vec::new(),
        },
        PlanPhase {
            name: PHASE_UPDATE_CONSUMERS.to_string(),
            description: format!(
                "Point every consumer of {} at the canonical copy in {}",
                name, to_repo
            ),
            tasks: update_tasks,
            effort_hours: EffortRange::new(1 + n, 2 + 2 * n),
            affected_consumers: consumers,
        },
        PlanPhase {
            name: PHASE_MONITOR.to_string(),
            description: "Watch for regressions and confirm the duplicates are gone".to_string(),
            tasks: vec![
                "Monitor error rates and builds in migrated repositories".to_string(),
                "Re-scan repositories to confirm a single location remains".to_string(),
                "Close out the consolidation and update provenance".to_string(),
            ],
            effort_hours: EffortRange::new(1, 2),
            affected_consumers: Vec::new(),
        },
    ];

    let total = phases
        .iter()
        .map(|p| p.effort_hours)
        .fold(EffortRange::new(0, 0), |acc, e| acc + e);

    Ok(ConsolidationPlan {
        component_name: name.to_string(),
        from_repository: from_repo.to_string(),
        to_repository: to_repo.to_string(),
        phases,
        total_effort_hours: total,
        impact: None,
    })
}

/// Produce a recommendation from a plan and, when available, the
/// centrality scores for the component.
pub fn recommend(
    plan: &ConsolidationPlan,
    component_id: &str,
    scores: Option<&CentralityReport>,
    timestamp: DateTime<Utc>,
) -> ConsolidationRecommendation {
    let target = scores.and_then(|r| r.get(&plan.to_repository));
    let target_is_best = scores
        .and_then(|r| r.best())
        .is_some_and(|b| b.repository == plan.to_repository);

    let confidence = match target {
        Some(t) if target_is_best => 0.5 + 0.5 * t.score,
        Some(t) => 0.5 * t.score,
        None => 0.5,
    }
    .clamp(0.0, 1.0);

    let consumers = plan.affected_consumers().len();
    let priority = if consumers >= 3 && confidence >= 0.6 {
        Priority::High
    } else if consumers >= 1 {
        Priority::Medium
    } else {
        Priority::Low
    };

    let reasoning = match (target, scores.and_then(|r| r.best())) {
        (Some(t), _) if target_is_best => {
            format!("{} is the top-ranked canonical location. {}", plan.to_repository, t.reasoning)
        }
        (Some(t), Some(best)) => format!(
            "{} ranks #{}; {} ranks higher. {}",
            plan.to_repository, t.rank, best.repository, t.reasoning
        ),
        _ => format!(
            "No centrality scores available for {}; recommendation based on the plan alone",
            plan.to_repository
        ),
    };

    let mut benefits = vec![
        format!("Single source of truth for {}", plan.component_name),
        "Fixes and improvements land once".to_string(),
    ];
    if consumers > 0 {
        benefits.push(format!(
            "{} consumer repositories share one implementation",
            consumers
        ));
    }

    let mut risks = vec![format!(
        "Behavior differences between {} and {} may surface during merge",
        plan.from_repository, plan.to_repository
    )];
    if consumers > 0 {
        risks.push(format!("{} consumers must migrate", consumers));
    }
    if let Some(impact) = &plan.impact {
        if !impact.derivatives.is_empty() {
            risks.push(format!(
                "Derived repositories may diverge further: {}",
                impact.derivatives.join(", ")
            ));
        }
    }

    ConsolidationRecommendation {
        recommendation_id: uuid::Uuid::new_v4().to_string(),
        timestamp,
        component_id: component_id.to_string(),
        from_repository: plan.from_repository.clone(),
        to_repository: plan.to_repository.clone(),
        priority,
        confidence,
        reasoning,
        benefits,
        risks,
        estimated_effort_hours: plan.total_effort_hours.midpoint(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::centrality::{self, CentralityContext};
    use crate::models::{Component, ComponentType, RepositoryProfile, SyncStatus};
    use chrono::TimeZone;

    fn repos(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn always_four_phases_with_tasks_and_ranges() {
        let p = plan("X", "repoA", "repoB", &[]).unwrap();
        let names: Vec<_> = p.phases.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec![PHASE_ANALYZE, PHASE_MERGE, PHASE_UPDATE_CONSUMERS, PHASE_MONITOR]
        );
        for phase in &p.phases {
            assert!(!phase.tasks.is_empty());
            assert!(phase.effort_hours.to_string().contains('-'));
        }
    }

    #[test]
    fn update_consumers_lists_every_repo_except_target() {
        let p = plan("X", "a", "b", &repos(&["c", "b", "a", "d"])).unwrap();
        assert_eq!(p.affected_consumers(), &["a", "c", "d"]);
    }

    #[test]
    fn plan_is_deterministic() {
        let known = repos(&["x", "y", "z"]);
        assert_eq!(
            plan("Retry", "x", "y", &known).unwrap(),
            plan("Retry", "x", "y", &known).unwrap()
        );
    }

    #[test]
    fn effort_serializes_as_range_string() {
        let p = plan("X", "a", "b", &[]).unwrap();
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["phases"][0]["effort_hours"], "2-4");
        assert!(json.get("impact").is_none());
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(plan("", "a", "b", &[]).is_err());
        assert!(matches!(
            plan("X", "", "b", &[]),
            Err(AtlasError::InvalidRepository(_))
        ));
        assert!(plan("X", "a", "a", &[]).is_err());
    }

    #[test]
    fn impact_is_optional_and_merged() {
        let deps = RepositoryDependencies {
            consumers: vec!["b".into(), "c".into()],
            derivatives: vec!["d".into()],
        };
        let p = plan("X", "a", "b", &[]).unwrap().with_impact(&deps);
        let impact = p.impact.unwrap();
        assert_eq!(impact.consumers, vec!["c"]);
        assert_eq!(impact.risk_level, Priority::Medium);
    }

    #[test]
    fn recommendation_follows_scores() {
        let component = Component {
            component_id: "c1".into(),
            name: "X".into(),
            component_type: ComponentType::Infrastructure,
            repository: "a".into(),
            files: vec!["x.py".into()],
            language: "python".into(),
            api_signature: String::new(),
            imports: vec![],
            keywords: vec![],
            description: None,
            lines_of_code: 100,
            cyclomatic_complexity: None,
            public_methods: vec![],
            first_seen: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            sync_status: SyncStatus::Unknown,
        };
        let mut platform = RepositoryProfile::named("b");
        platform.problem_domain = Some("platform library".into());
        let report = centrality::score(
            &component,
            &[RepositoryProfile::named("a"), platform],
            &CentralityContext::default(),
        )
        .unwrap();

        let p = plan("X", "a", "b", &repos(&["a", "b", "c", "d"])).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap();
        let rec = recommend(&p, "c1", Some(&report), now);

        assert_eq!(rec.timestamp, now);
        assert_eq!(rec.to_repository, "b");
        assert!(rec.confidence > 0.5 && rec.confidence <= 1.0);
        assert!(rec.reasoning.starts_with("b is the top-ranked"));
        assert_eq!(rec.estimated_effort_hours, p.total_effort_hours.midpoint());
        assert!(!rec.benefits.is_empty());
        assert!(!rec.recommendation_id.is_empty());

        let without = recommend(&p, "c1", None, now);
        assert_eq!(without.confidence, 0.5);
    }
}
