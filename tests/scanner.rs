use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use component_atlas::scanner::{self, ScanOptions, ORIGINAL_MARKER};
use component_atlas_core::models::{ComponentType, SyncStatus};
use component_atlas_core::provenance;
use component_atlas_core::signature::signature;

const RETRY_PY: &str = r#""""Retry helpers shared by services."""
import time
import logging

logger = logging.getLogger(__name__)


class RetryPolicy:
    def __init__(self, attempts=3):
        self.attempts = attempts

    def run(self, fn):
        for attempt in range(self.attempts):
            try:
                return fn()
            except Exception:
                logger.warning("attempt %s failed", attempt)
                time.sleep(0.1)
        return None


def with_retry(fn, attempts=3):
    return RetryPolicy(attempts).run(fn)
"#;

const DOCKERFILE: &str = "FROM python:3.12-slim\n\
WORKDIR /app\n\
COPY requirements.txt .\n\
RUN pip install -r requirements.txt\n\
COPY . .\n\
EXPOSE 8000\n\
CMD [\"python\", \"-m\", \"app\"]\n";

fn options() -> ScanOptions {
    ScanOptions {
        min_lines: 5,
        ..ScanOptions::default()
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn set_mtime(root: &Path, rel: &str, secs: u64) {
    let file = fs::File::options().write(true).open(root.join(rel)).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

/// `n` lines of ordinary Python plus `extra` appended.
fn filler(n: usize, extra: &str) -> String {
    let mut s = String::new();
    for i in 0..n {
        s.push_str(&format!("value_{} = {}\n", i, i));
    }
    s.push_str(extra);
    s
}

#[test]
fn scanning_twice_is_identical() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "lib/retry.py", RETRY_PY);
    write(tmp.path(), "Dockerfile", DOCKERFILE);

    let first = scanner::scan(tmp.path(), "acme/app", &options()).unwrap();
    let second = scanner::scan(tmp.path(), "acme/app", &options()).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    let sigs: Vec<String> = first.iter().map(signature).collect();
    let sigs_again: Vec<String> = second.iter().map(signature).collect();
    assert_eq!(sigs, sigs_again);
}

#[test]
fn python_component_is_extracted() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "lib/retry.py", RETRY_PY);

    let components = scanner::scan(tmp.path(), "acme/app", &options()).unwrap();
    assert_eq!(components.len(), 1);
    let c = &components[0];
    assert_eq!(c.name, "retry");
    assert_eq!(c.component_type, ComponentType::Infrastructure);
    assert_eq!(c.language, "python");
    assert_eq!(c.files, vec!["lib/retry.py"]);
    assert_eq!(
        c.public_methods,
        vec!["RetryPolicy", "RetryPolicy.run", "with_retry"]
    );
    assert_eq!(c.imports, vec!["logging", "time"]);
    assert_eq!(
        c.description.as_deref(),
        Some("Retry helpers shared by services.")
    );
    assert_eq!(c.sync_status, SyncStatus::Unknown);
    assert!(c.keywords.contains(&"retry".to_string()));
    let mut sorted = c.keywords.clone();
    sorted.sort();
    assert_eq!(c.keywords, sorted);
}

#[test]
fn keyword_fallback_needs_two_distinct_indicators() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "src/widget.py", &filler(8, "cache = {}\ncache_size = cache\n"));
    write(tmp.path(), "src/gadget.py", &filler(8, "cache = {}\nretry = 3\n"));

    let components = scanner::scan(tmp.path(), "acme/app", &options()).unwrap();
    let names: Vec<&str> = components.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["gadget"]);
    assert_eq!(components[0].component_type, ComponentType::Infrastructure);
}

#[test]
fn deployment_artifacts_are_components() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "Dockerfile", DOCKERFILE);

    let components = scanner::scan(tmp.path(), "acme/app", &options()).unwrap();
    assert_eq!(components.len(), 1);
    let c = &components[0];
    assert_eq!(c.component_type, ComponentType::DeploymentPattern);
    assert_eq!(c.language, "dockerfile");
    assert_eq!(c.imports, vec!["python:3.12-slim"]);
    assert!(c.keywords.contains(&"python".to_string()));
}

#[test]
fn small_broken_and_excluded_files_are_skipped() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "lib/retry.py", RETRY_PY);
    write(tmp.path(), "lib/cache.py", "import redis\ncache = redis.Redis()\n");
    write(tmp.path(), "lib/auth.py", &")))) ]]]] ))))\n".repeat(10));
    write(tmp.path(), "node_modules/pkg/api_client.js", &filler(10, ""));
    write(tmp.path(), "vendor/retry_utils.py", RETRY_PY);

    let opts = ScanOptions {
        exclude_globs: vec!["vendor/**".to_string()],
        ..options()
    };
    let components = scanner::scan(tmp.path(), "acme/app", &opts).unwrap();
    let files: Vec<&str> = components.iter().map(|c| c.primary_file()).collect();
    assert_eq!(files, vec!["lib/retry.py"]);
}

#[test]
fn malformed_repository_is_rejected() {
    let tmp = TempDir::new().unwrap();
    assert!(scanner::scan(tmp.path(), "not a repo", &options()).is_err());
    assert!(scanner::scan(&tmp.path().join("missing"), "acme/app", &options()).is_err());
}

#[test]
fn copies_across_repositories_share_a_family() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    write(a.path(), "lib/retry.py", RETRY_PY);
    write(b.path(), "shared/retry.py", RETRY_PY);
    set_mtime(a.path(), "lib/retry.py", 1_600_000_000);
    set_mtime(b.path(), "shared/retry.py", 1_700_000_000);

    let mut by_repo = BTreeMap::new();
    by_repo.insert(
        "acme/billing".to_string(),
        scanner::scan(b.path(), "acme/billing", &options()).unwrap(),
    );
    by_repo.insert(
        "acme/legacy".to_string(),
        scanner::scan(a.path(), "acme/legacy", &options()).unwrap(),
    );
    assert_eq!(
        signature(&by_repo["acme/billing"][0]),
        signature(&by_repo["acme/legacy"][0])
    );
    assert_ne!(
        by_repo["acme/billing"][0].component_id,
        by_repo["acme/legacy"][0].component_id
    );

    let index = provenance::build(&by_repo);
    assert_eq!(index.len(), 1);
    let family = index.iter().next().unwrap();
    assert!(family.is_duplicated());
    assert_eq!(family.origin_repository, "acme/legacy");
    assert_eq!(family.first_seen.timestamp(), 1_600_000_000);
    assert_eq!(family.repositories(), vec!["acme/legacy", "acme/billing"]);
}

#[test]
fn original_marker_overrides_age() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    write(a.path(), "lib/retry.py", RETRY_PY);
    write(
        b.path(),
        "lib/retry.py",
        &format!("# {}\n{}", ORIGINAL_MARKER, RETRY_PY),
    );
    set_mtime(a.path(), "lib/retry.py", 1_600_000_000);
    set_mtime(b.path(), "lib/retry.py", 1_700_000_000);

    let legacy = scanner::scan(a.path(), "acme/legacy", &options()).unwrap();
    let platform = scanner::scan(b.path(), "acme/platform", &options()).unwrap();
    assert_eq!(platform[0].sync_status, SyncStatus::Original);

    let index = provenance::build_from(legacy.iter().chain(platform.iter()));
    let family = index.family_of(&legacy[0]).unwrap();
    assert_eq!(family.origin_repository, "acme/platform");
}

#[test]
fn deeply_nested_file_does_not_abort_the_scan() {
    let tmp = TempDir::new().unwrap();
    let mut functions = String::new();
    for i in 0..30 {
        functions.push_str(&format!("export function request{}(url) {{ return url; }}\n", i));
    }
    let depth = 100_000;
    let nested = format!(
        "{}export const data = {}0{};\n",
        functions,
        "[".repeat(depth),
        "]".repeat(depth)
    );
    write(tmp.path(), "src/http_client.js", &functions);
    write(tmp.path(), "src/api_client.js", &nested);

    let components = scanner::scan(tmp.path(), "acme/web", &ScanOptions::default()).unwrap();
    let files: Vec<&str> = components.iter().map(|c| c.primary_file()).collect();
    assert!(files.contains(&"src/http_client.js"), "files={:?}", files);
    assert!(components
        .iter()
        .all(|c| c.component_type == ComponentType::ApiClient));
}
