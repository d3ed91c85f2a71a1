//! `atlas plan`: a consolidation plan plus a scored recommendation.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;

use component_atlas_core::models::{Component, ConsolidationRecommendation};
use component_atlas_core::planner::{self, ConsolidationPlan};
use component_atlas_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::dependencies;
use crate::output;
use crate::score_cmd;

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub plan: ConsolidationPlan,
    pub recommendation: ConsolidationRecommendation,
}

/// Resolve `component` as a stored id, or as a component name in `from_repo`.
async fn lookup(store: &dyn Store, component: &str, from_repo: &str) -> Result<Option<Component>> {
    if let Some(c) = store.get_component(component).await? {
        return Ok(Some(c));
    }
    let in_repo = store.list_components(Some(from_repo)).await?;
    Ok(in_repo.into_iter().find(|c| c.name == component))
}

pub async fn plan_consolidation(
    config: &Config,
    component: &str,
    from_repo: &str,
    to_repo: &str,
) -> Result<PlanResponse> {
    let store = db::open_store(config).await?;
    let found = lookup(&store, component, from_repo).await?;
    let (name, component_id) = match &found {
        Some(c) => (c.name.clone(), c.component_id.clone()),
        None => (component.to_string(), component.to_string()),
    };

    let mut known = config.repository_names();
    for c in store.list_components(None).await? {
        if !known.contains(&c.repository) {
            known.push(c.repository);
        }
    }

    let plan = planner::plan(&name, from_repo, to_repo, &known)?;

    let graph = dependencies::dependency_graph(config)?;
    let deps = component_atlas_core::dependency::resolve_dependencies(
        graph.as_ref(),
        &[from_repo.to_string()],
    )
    .await;
    let plan = match deps.get(from_repo) {
        Some(d) => plan.with_impact(d),
        None => plan,
    };

    let scores = match &found {
        Some(c) => {
            let candidates = vec![from_repo.to_string(), to_repo.to_string()];
            match score_cmd::score_component(config, &c.component_id, Some(candidates)).await {
                Ok(report) => Some(report),
                Err(e) => {
                    tracing::warn!(component = %c.component_id, error = %e, "scoring failed; planning without scores");
                    None
                }
            }
        }
        None => None,
    };

    let recommendation = planner::recommend(&plan, &component_id, scores.as_ref(), Utc::now());
    Ok(PlanResponse {
        plan,
        recommendation,
    })
}

pub async fn run_plan(
    config: &Config,
    component: &str,
    from_repo: &str,
    to_repo: &str,
    json: bool,
) -> Result<()> {
    let result = plan_consolidation(config, component, from_repo, to_repo).await;
    output::emit(json, result, |resp| {
        let plan = &resp.plan;
        let rec = &resp.recommendation;
        println!(
            "plan {}: {} -> {}",
            plan.component_name, plan.from_repository, plan.to_repository
        );
        for (i, phase) in plan.phases.iter().enumerate() {
            println!();
            println!("  {}. {} ({} h)", i + 1, phase.name, phase.effort_hours);
            println!("     {}", phase.description);
            for task in &phase.tasks {
                println!("     - {}", task);
            }
            if !phase.affected_consumers.is_empty() {
                println!("     consumers: {}", phase.affected_consumers.join(", "));
            }
        }
        println!();
        println!("  total effort: {} h", plan.total_effort_hours);
        if let Some(impact) = &plan.impact {
            println!(
                "  impact: {} consumers, {} derivatives",
                impact.consumers.len(),
                impact.derivatives.len()
            );
        }
        println!();
        println!(
            "  recommendation: priority {}, confidence {:.2}",
            rec.priority.as_str(),
            rec.confidence
        );
        println!("  {}", rec.reasoning);
    })
}
