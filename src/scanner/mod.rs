//! Repository scanner.
//!
//! Walks a repository checkout and turns every recognizable file into a
//! [`Component`]. Candidate files are analyzed in parallel with rayon; the
//! result is sorted by primary file so repeated scans of an unchanged tree
//! are identical.
//!
//! A file becomes a component when:
//! - its path matches a deployment pattern (Dockerfile, compose, terraform, manifests), or
//! - it is Python, JavaScript, TypeScript, or Rust source that classifies by
//!   path or by body keywords, parses cleanly, and has at least
//!   `min_lines` non-blank lines.

pub mod classify;
pub mod extract;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Result};
use chrono::{DateTime, TimeZone, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use walkdir::{DirEntry, WalkDir};

use component_atlas_core::error::validate_repository;
use component_atlas_core::models::{component_id_for, Component, ComponentType, SyncStatus};

use crate::config::ScanConfig;
use crate::progress::{NoProgress, ScanProgressEvent, ScanProgressReporter};
use extract::SourceLanguage;

/// A file containing this text is tagged as the original copy of its family.
pub const ORIGINAL_MARKER: &str = "component-atlas: original";

const SKIP_DIRS: &[&str] = &[
    ".git",
    "target",
    "node_modules",
    "venv",
    ".venv",
    "dist",
    "build",
    "__pycache__",
];

/// Stems that name their parent directory rather than themselves.
const INDEX_STEMS: &[&str] = &["index", "__init__", "mod", "lib", "main"];

const PROGRESS_EVERY: u64 = 50;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub min_lines: usize,
    pub max_keywords: usize,
    pub max_public_methods: usize,
    pub exclude_globs: Vec<String>,
    pub follow_symlinks: bool,
    pub max_file_bytes: u64,
}

impl From<&ScanConfig> for ScanOptions {
    fn from(cfg: &ScanConfig) -> Self {
        ScanOptions {
            min_lines: cfg.min_lines,
            max_keywords: cfg.max_keywords,
            max_public_methods: cfg.max_public_methods,
            exclude_globs: cfg.exclude_globs.clone(),
            follow_symlinks: cfg.follow_symlinks,
            max_file_bytes: cfg.max_file_bytes,
        }
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions::from(&ScanConfig::default())
    }
}

/// Scan `root` as repository `repository`.
pub fn scan(root: &Path, repository: &str, options: &ScanOptions) -> Result<Vec<Component>> {
    scan_with_progress(root, repository, options, &NoProgress)
}

pub fn scan_with_progress(
    root: &Path,
    repository: &str,
    options: &ScanOptions,
    progress: &dyn ScanProgressReporter,
) -> Result<Vec<Component>> {
    validate_repository(repository)?;
    if !root.is_dir() {
        bail!("Repository root does not exist: {}", root.display());
    }

    progress.report(ScanProgressEvent::Discovering {
        repository: repository.to_string(),
    });
    let files = discover(root, options)?;
    tracing::debug!(repository, candidates = files.len(), "discovered candidate files");

    let total = files.len() as u64;
    let done = AtomicU64::new(0);

    let mut components: Vec<Component> = files
        .par_iter()
        .filter_map(|(path, rel)| {
            let component = analyze_file(path, rel, repository, options);
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            if n % PROGRESS_EVERY == 0 || n == total {
                progress.report(ScanProgressEvent::Extracting {
                    repository: repository.to_string(),
                    n,
                    total,
                });
            }
            component
        })
        .collect();

    components.sort_by(|a, b| a.primary_file().cmp(b.primary_file()));

    tracing::info!(repository, components = components.len(), "scan complete");
    progress.report(ScanProgressEvent::Done {
        repository: repository.to_string(),
        components: components.len() as u64,
    });
    Ok(components)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIP_DIRS.contains(&name))
}

/// Candidate files as `(absolute path, repository-relative '/' path)`, sorted.
fn discover(root: &Path, options: &ScanOptions) -> Result<Vec<(PathBuf, String)>> {
    let exclude_set = build_globset(&options.exclude_globs)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(options.follow_symlinks)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel) {
            continue;
        }
        if SourceLanguage::from_path(path).is_none() && !classify::is_deployment_path(&rel) {
            continue;
        }
        files.push((path.to_path_buf(), rel));
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Analyze one file. `None` means the file is not a component.
pub fn analyze_file(
    path: &Path,
    rel: &str,
    repository: &str,
    options: &ScanOptions,
) -> Option<Component> {
    let metadata = std::fs::metadata(path).ok()?;
    if metadata.len() > options.max_file_bytes {
        tracing::debug!(path = rel, bytes = metadata.len(), "skipping oversized file");
        return None;
    }
    let source = std::fs::read_to_string(path).ok()?;

    let lines_of_code = source.lines().filter(|l| !l.trim().is_empty()).count();
    if lines_of_code < options.min_lines {
        return None;
    }

    let first_seen = modified_secs(&metadata);
    let sync_status = if source.contains(ORIGINAL_MARKER) {
        SyncStatus::Original
    } else {
        SyncStatus::Unknown
    };
    let idents = classify::identifiers(&source);

    let mut component = Component {
        component_id: component_id_for(repository, rel),
        name: component_name(rel),
        component_type: ComponentType::DeploymentPattern,
        repository: repository.to_string(),
        files: vec![rel.to_string()],
        language: String::new(),
        api_signature: String::new(),
        imports: Vec::new(),
        keywords: Vec::new(),
        description: None,
        lines_of_code: lines_of_code as u32,
        cyclomatic_complexity: None,
        public_methods: Vec::new(),
        first_seen,
        sync_status,
    };

    if classify::is_deployment_path(rel) {
        component.language = deployment_language(rel).to_string();
        component.imports = base_images(&source);
        component.api_signature = component.imports.join(", ");
        component.keywords = keywords(
            classify::deployment_keyword_hits(&idents),
            rel,
            options.max_keywords,
        );
        return Some(component);
    }

    let language = SourceLanguage::from_path(path)?;
    component.component_type =
        classify::classify_path(rel).or_else(|| classify::classify_keywords(&idents))?;

    let extracted = match extract::extract(&source, language) {
        Ok(extracted) => extracted,
        Err(e) => {
            tracing::debug!(path = rel, error = %e, "skipping unparsable file");
            return None;
        }
    };

    component.language = language.name().to_string();
    component.public_methods = extracted.public_methods;
    component.public_methods.truncate(options.max_public_methods);
    component.api_signature = extracted
        .api_signature
        .into_iter()
        .take(options.max_public_methods)
        .collect::<Vec<_>>()
        .join("\n");
    component.imports = extracted.imports;
    component.description = extracted.description;
    component.cyclomatic_complexity = Some(extracted.complexity);
    component.keywords = keywords(classify::all_keyword_hits(&idents), rel, options.max_keywords);

    Some(component)
}

fn modified_secs(metadata: &std::fs::Metadata) -> DateTime<Utc> {
    let secs = metadata
        .modified()
        .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

fn file_stem(rel: &str) -> &str {
    let file = rel.rsplit('/').next().unwrap_or(rel);
    match file.find('.') {
        Some(0) | None => file,
        Some(i) => &file[..i],
    }
}

/// File stem, or the parent directory for index-style files.
pub fn component_name(rel: &str) -> String {
    let stem = file_stem(rel);
    if INDEX_STEMS.contains(&stem) {
        let mut parts = rel.rsplit('/');
        parts.next();
        if let Some(parent) = parts.next() {
            return parent.to_string();
        }
    }
    stem.to_string()
}

/// Indicator hits plus path-stem tokens, sorted, deduplicated, capped.
fn keywords(hits: BTreeSet<&'static str>, rel: &str, max: usize) -> Vec<String> {
    let mut all: BTreeSet<String> = hits.into_iter().map(str::to_string).collect();
    all.extend(
        component_name(rel)
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| t.len() >= 3)
            .map(str::to_lowercase),
    );
    all.into_iter().take(max).collect()
}

fn deployment_language(rel: &str) -> &'static str {
    let lower = rel.to_ascii_lowercase();
    if lower.ends_with(".tf") || lower.ends_with(".tfvars") {
        "terraform"
    } else if lower.ends_with(".yml") || lower.ends_with(".yaml") {
        "yaml"
    } else if lower.contains("dockerfile") {
        "dockerfile"
    } else {
        "text"
    }
}

/// `FROM` images of a Dockerfile; empty for other artifacts.
fn base_images(source: &str) -> Vec<String> {
    let images: BTreeSet<String> = source
        .lines()
        .filter_map(|line| {
            let mut words = line.split_whitespace();
            match words.next() {
                Some(w) if w.eq_ignore_ascii_case("from") => words
                    .find(|w| !w.starts_with("--"))
                    .map(str::to_string),
                _ => None,
            }
        })
        .collect();
    images.into_iter().collect()
}
