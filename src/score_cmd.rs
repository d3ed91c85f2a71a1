//! `atlas score`: rank candidate repositories as the canonical home of a component.

use std::collections::BTreeSet;

use anyhow::Result;

use component_atlas_core::centrality::{self, CentralityContext, CentralityReport, Factor};
use component_atlas_core::dependency::resolve_dependencies;
use component_atlas_core::models::{Component, RepositoryProfile};
use component_atlas_core::provenance;
use component_atlas_core::store::Store;
use component_atlas_core::AtlasError;

use crate::config::Config;
use crate::db;
use crate::dependencies;
use crate::output;

/// Default candidates: every repository holding a copy of the component's
/// family, or every configured repository when it has no copies elsewhere.
pub fn default_candidates(
    config: &Config,
    component: &Component,
    all_components: &[Component],
) -> Vec<String> {
    let index = provenance::build_from(all_components);
    let mut repos: BTreeSet<String> = index
        .family_of(component)
        .map(|p| p.locations.iter().map(|l| l.repository.clone()).collect())
        .unwrap_or_default();
    if repos.len() < 2 {
        repos.extend(config.repository_names());
        repos.insert(component.repository.clone());
    }
    repos.into_iter().collect()
}

pub async fn score_component(
    config: &Config,
    component_id: &str,
    candidates: Option<Vec<String>>,
) -> Result<CentralityReport> {
    let store = db::open_store(config).await?;
    let component = store
        .get_component(component_id)
        .await?
        .ok_or_else(|| AtlasError::not_found(format!("component '{}'", component_id)))?;
    let all = store.list_components(None).await?;

    let candidates = match candidates {
        Some(c) => c,
        None => default_candidates(config, &component, &all),
    };
    let profiles: Vec<RepositoryProfile> = candidates
        .iter()
        .map(|name| config.repository_profile(name))
        .collect();

    let graph = dependencies::dependency_graph(config)?;
    let ctx = CentralityContext {
        dependencies: resolve_dependencies(graph.as_ref(), &candidates).await,
        origin_repository: provenance::build_from(&all)
            .family_of(&component)
            .map(|p| p.origin_repository.clone()),
    };

    Ok(centrality::score(&component, &profiles, &ctx)?)
}

pub async fn run_score(
    config: &Config,
    component_id: &str,
    candidates: Option<Vec<String>>,
    json: bool,
) -> Result<()> {
    let result = score_component(config, component_id, candidates).await;
    output::emit(json, result, |report| {
        println!("score {}", report.component_id);
        for s in &report.ranked {
            println!("  {}. {:<32} {:.3}", s.rank, s.repository, s.score);
            for f in Factor::ALL {
                let value = s.factors.get(f.key()).copied().unwrap_or_default();
                println!("       {:<22} {:.2}", f.label(), value);
            }
            println!("       {}", s.reasoning);
        }
    })
}
