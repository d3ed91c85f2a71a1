//! `atlas scan`: detect components in configured repositories and persist them.
//!
//! `all` scans every repository with a `root`, each on its own blocking
//! task. Results are reported in repository-name order regardless of which
//! scan finishes first.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::task::JoinSet;

use component_atlas_core::models::{Component, ComponentType};
use component_atlas_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::progress::{ProgressMode, ScanProgressReporter};
use crate::scanner::{self, ScanOptions};

/// Repositories selected by `target`, as `(name, root)` pairs.
pub fn scan_targets(config: &Config, target: &str) -> Result<Vec<(String, PathBuf)>> {
    if target == "all" {
        let targets: Vec<(String, PathBuf)> = config
            .repositories
            .iter()
            .filter_map(|(name, r)| r.root.clone().map(|root| (name.clone(), root)))
            .collect();
        if targets.is_empty() {
            bail!("No repositories with a `root` are configured.");
        }
        return Ok(targets);
    }

    match config.repositories.get(target) {
        Some(r) => match &r.root {
            Some(root) => Ok(vec![(target.to_string(), root.clone())]),
            None => bail!("Repository '{}' has no `root` configured", target),
        },
        None => bail!(
            "Unknown repository: '{}'. Configured: {}",
            target,
            config.repository_names().join(", ")
        ),
    }
}

/// Scan each target concurrently, keyed by repository name.
///
/// A repository that fails to scan is logged and left out. Errors only when
/// no repository could be scanned.
pub async fn scan_repositories(
    targets: Vec<(String, PathBuf)>,
    options: ScanOptions,
    progress: Arc<dyn ScanProgressReporter>,
) -> Result<BTreeMap<String, Vec<Component>>> {
    let options = Arc::new(options);
    let mut tasks = JoinSet::new();
    for (name, root) in targets {
        let options = Arc::clone(&options);
        let progress = Arc::clone(&progress);
        tasks.spawn_blocking(move || {
            let result = scanner::scan_with_progress(&root, &name, &options, progress.as_ref());
            (name, result)
        });
    }

    let mut out = BTreeMap::new();
    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, Ok(components))) => {
                out.insert(name, components);
            }
            Ok((name, Err(e))) => {
                tracing::warn!(repository = %name, error = %e, "scan failed, skipping repository");
                failures.push(format!("{}: {:#}", name, e));
            }
            Err(e) => {
                tracing::warn!(error = %e, "scan task panicked");
                failures.push(format!("scan task panicked: {}", e));
            }
        }
    }

    if out.is_empty() && !failures.is_empty() {
        bail!("Failed to scan: {}", failures.join("; "));
    }
    Ok(out)
}

pub async fn run_scan(
    config: &Config,
    target: &str,
    dry_run: bool,
    progress: ProgressMode,
) -> Result<()> {
    let targets = scan_targets(config, target)?;
    let reporter: Arc<dyn ScanProgressReporter> = progress.reporter().into();
    let scanned = scan_repositories(targets, ScanOptions::from(&config.scan), reporter).await?;

    if dry_run {
        for (repo, components) in &scanned {
            println!("scan {} (dry-run)", repo);
            print_breakdown(components);
        }
        return Ok(());
    }

    let store = db::open_store(config).await?;
    for (repo, components) in &scanned {
        store
            .replace_repository_components(repo, components)
            .await
            .with_context(|| format!("Failed to store components for {}", repo))?;
        println!("scan {}", repo);
        print_breakdown(components);
    }
    println!("ok");

    store.pool().close().await;
    Ok(())
}

fn print_breakdown(components: &[Component]) {
    println!("  components: {}", components.len());
    for t in ComponentType::ALL {
        let n = components.iter().filter(|c| c.component_type == t).count();
        if n > 0 {
            println!("    {:<20} {}", t.as_str(), n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use tempfile::TempDir;

    const RETRY_PY: &str = "import time\n\n\nclass RetryPolicy:\n    def run(self, fn):\n        for _ in range(3):\n            try:\n                return fn()\n            except Exception:\n                time.sleep(0.1)\n        return None\n";

    #[tokio::test]
    async fn one_failing_repository_keeps_the_others() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("good");
        std::fs::create_dir_all(good.join("lib")).unwrap();
        std::fs::write(good.join("lib/retry.py"), RETRY_PY).unwrap();

        let targets = vec![
            ("acme/good".to_string(), good),
            ("acme/gone".to_string(), tmp.path().join("missing")),
        ];
        let options = ScanOptions {
            min_lines: 5,
            ..ScanOptions::default()
        };
        let scanned = scan_repositories(targets, options, Arc::new(NoProgress))
            .await
            .unwrap();

        assert_eq!(scanned.keys().collect::<Vec<_>>(), vec!["acme/good"]);
        assert_eq!(scanned["acme/good"].len(), 1);
    }

    #[tokio::test]
    async fn all_repositories_failing_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let targets = vec![("acme/gone".to_string(), tmp.path().join("missing"))];
        let err = scan_repositories(targets, ScanOptions::default(), Arc::new(NoProgress))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("acme/gone"));
    }
}
