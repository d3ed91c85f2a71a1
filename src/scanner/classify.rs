//! Component-type classification.
//!
//! Two passes:
//! 1. the repository-relative path against a fixed pattern table, file-name
//!    patterns before directory patterns, deployment artifacts first;
//! 2. for source files with no path match, distinct indicator keywords in
//!    the file body. A type needs at least [`MIN_KEYWORD_HITS`] distinct
//!    hits; the type with the most hits wins, ties going to the earlier
//!    type in [`ComponentType::ALL`].

use std::collections::{BTreeSet, HashSet};

use component_atlas_core::models::ComponentType;
use once_cell::sync::Lazy;
use regex::Regex;

pub const MIN_KEYWORD_HITS: usize = 2;

const SOURCE_EXT: &str = r"\.(?:py|pyi|js|jsx|mjs|cjs|ts|tsx|rs)$";

static DEPLOYMENT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)(?:^|/)dockerfile(?:\.[^/]+)?$",
        r"(?i)(?:^|/)[^/]+\.dockerfile$",
        r"(?i)(?:^|/)(?:docker-)?compose(?:\.[^/]+)?\.ya?ml$",
        r"(?i)(?:^|/)[^/]+\.(?:tf|tfvars)$",
        r"(?i)(?:^|/)(?:k8s|kubernetes|helm|charts|manifests|deploy|deployment)/(?:[^/]+/)*[^/]+\.ya?ml$",
        r"(?i)(?:^|/)\.github/workflows/[^/]+\.ya?ml$",
        r"(?i)(?:^|/)(?:\.gitlab-ci\.yml|jenkinsfile|procfile|serverless\.ya?ml)$",
    ])
});

fn token_pattern(tokens: &str) -> String {
    format!(r"(?i)(?:^|[/_\-])(?:{})s?(?:[_\-][^/]*)?{}", tokens, SOURCE_EXT)
}

fn dir_pattern(dirs: &str) -> String {
    format!(r"(?i)(?:^|/)(?:{})/(?:[^/]+/)*[^/]+{}", dirs, SOURCE_EXT)
}

static FILE_PATTERNS: Lazy<Vec<(ComponentType, Regex)>> = Lazy::new(|| {
    vec![
        (
            ComponentType::ApiClient,
            token_pattern("client|api|sdk|gateway|connector|adapter"),
        ),
        (
            ComponentType::Infrastructure,
            token_pattern(
                "logger|logging|config|settings|cache|retry|auth|middleware|database|db|queue|metrics|monitoring|telemetry|util|utils|helpers?",
            ),
        ),
        (
            ComponentType::BusinessLogic,
            token_pattern(
                "service|handler|processor|engine|workflow|manager|calculator|validator|rules?|policy|billing|pricing",
            ),
        ),
    ]
    .into_iter()
    .filter_map(|(t, p)| Regex::new(&p).ok().map(|re| (t, re)))
    .collect()
});

static DIR_PATTERNS: Lazy<Vec<(ComponentType, Regex)>> = Lazy::new(|| {
    vec![
        (
            ComponentType::ApiClient,
            dir_pattern("clients?|apis?|sdk|integrations"),
        ),
        (
            ComponentType::Infrastructure,
            dir_pattern("infra|infrastructure|middleware|utils?|common|shared|platform"),
        ),
        (
            ComponentType::BusinessLogic,
            dir_pattern("services|domain|business|handlers|usecases"),
        ),
    ]
    .into_iter()
    .filter_map(|(t, p)| Regex::new(&p).ok().map(|re| (t, re)))
    .collect()
});

/// Indicator keywords per type, matched against whole identifiers.
const KEYWORDS: &[(ComponentType, &[&str])] = &[
    (
        ComponentType::ApiClient,
        &[
            "requests", "httpx", "aiohttp", "axios", "fetch", "reqwest", "endpoint", "base_url",
            "baseurl", "api_key", "apikey", "status_code", "headers", "http_client", "graphql",
        ],
    ),
    (
        ComponentType::Infrastructure,
        &[
            "logging", "logger", "cache", "retry", "backoff", "middleware", "metrics", "redis",
            "database", "connection_pool", "tracing", "config", "settings", "queue", "ttl",
        ],
    ),
    (
        ComponentType::BusinessLogic,
        &[
            "invoice", "order", "customer", "payment", "pricing", "discount", "account",
            "subscription", "billing", "inventory", "checkout", "cart", "refund", "tax",
        ],
    ),
];

/// Keywords that tag deployment artifacts.
const DEPLOYMENT_KEYWORDS: &[&str] = &[
    "docker", "kubernetes", "helm", "terraform", "aws", "gcp", "azure", "nginx", "postgres",
    "redis", "python", "node", "alpine", "ubuntu", "deployment", "service", "ingress",
    "container", "volume", "github", "actions",
];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

/// Lowercased identifiers appearing in `text`.
pub fn identifiers(text: &str) -> HashSet<String> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| w.chars().next().is_some_and(|c| !c.is_ascii_digit()))
        .map(str::to_lowercase)
        .collect()
}

pub fn is_deployment_path(rel_path: &str) -> bool {
    DEPLOYMENT_PATTERNS.iter().any(|re| re.is_match(rel_path))
}

/// Classify by path alone.
pub fn classify_path(rel_path: &str) -> Option<ComponentType> {
    if is_deployment_path(rel_path) {
        return Some(ComponentType::DeploymentPattern);
    }
    FILE_PATTERNS
        .iter()
        .chain(DIR_PATTERNS.iter())
        .find(|(_, re)| re.is_match(rel_path))
        .map(|(t, _)| *t)
}

/// Distinct indicator keywords of `component_type` present in `idents`.
pub fn keyword_hits(component_type: ComponentType, idents: &HashSet<String>) -> BTreeSet<&'static str> {
    KEYWORDS
        .iter()
        .filter(|(t, _)| *t == component_type)
        .flat_map(|(_, words)| words.iter())
        .filter(|w| idents.contains(**w))
        .copied()
        .collect()
}

/// Classify by body keywords; `None` unless some type reaches the threshold.
pub fn classify_keywords(idents: &HashSet<String>) -> Option<ComponentType> {
    let mut best: Option<(ComponentType, usize)> = None;
    for (t, _) in KEYWORDS {
        let hits = keyword_hits(*t, idents).len();
        if hits < MIN_KEYWORD_HITS {
            continue;
        }
        if best.map_or(true, |(_, n)| hits > n) {
            best = Some((*t, hits));
        }
    }
    best.map(|(t, _)| t)
}

/// Every indicator keyword present, across all types.
pub fn all_keyword_hits(idents: &HashSet<String>) -> BTreeSet<&'static str> {
    KEYWORDS
        .iter()
        .flat_map(|(_, words)| words.iter())
        .filter(|w| idents.contains(**w))
        .copied()
        .collect()
}

pub fn deployment_keyword_hits(idents: &HashSet<String>) -> BTreeSet<&'static str> {
    DEPLOYMENT_KEYWORDS
        .iter()
        .filter(|w| idents.contains(**w))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_paths_win() {
        for p in [
            "Dockerfile",
            "docker/api.Dockerfile",
            "docker-compose.yml",
            "infra/main.tf",
            "k8s/base/deployment.yaml",
            ".github/workflows/ci.yml",
        ] {
            assert_eq!(classify_path(p), Some(ComponentType::DeploymentPattern), "{p}");
        }
    }

    #[test]
    fn file_tokens_classify_source() {
        assert_eq!(classify_path("src/http_client.py"), Some(ComponentType::ApiClient));
        assert_eq!(classify_path("lib/retry-policy.ts"), Some(ComponentType::Infrastructure));
        assert_eq!(classify_path("app/order_service.rs"), Some(ComponentType::BusinessLogic));
        assert_eq!(classify_path("shared/strings.py"), Some(ComponentType::Infrastructure));
    }

    #[test]
    fn unrelated_paths_do_not_match() {
        assert_eq!(classify_path("widget.py"), None);
        assert_eq!(classify_path("src/feedback.py"), None);
        assert_eq!(classify_path("README.md"), None);
    }

    #[test]
    fn every_pattern_compiles() {
        assert_eq!(DEPLOYMENT_PATTERNS.len(), 7);
        assert_eq!(FILE_PATTERNS.len(), 3);
        assert_eq!(DIR_PATTERNS.len(), 3);
    }

    #[test]
    fn keyword_fallback_needs_two_distinct_hits() {
        let one = identifiers("x = cache\ny = cache\nz = cache");
        assert_eq!(classify_keywords(&one), None);
        let two = identifiers("x = cache\ny = retry(x)");
        assert_eq!(classify_keywords(&two), Some(ComponentType::Infrastructure));
    }

    #[test]
    fn keyword_ties_prefer_earlier_type() {
        let idents = identifiers("requests endpoint invoice customer");
        assert_eq!(classify_keywords(&idents), Some(ComponentType::ApiClient));
    }
}
