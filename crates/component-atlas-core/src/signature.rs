//! Structural content signatures.
//!
//! A signature is a SHA-256 digest over a component's normalized metadata,
//! truncated to [`SIGNATURE_LEN`] hex characters. Components with equal
//! signatures are treated as one logical component regardless of the
//! repository they were found in.
//!
//! # Normalization
//!
//! ```text
//! name:<lowercased name>
//! type:<component type>
//! methods:<sorted, deduplicated public methods joined by ','>
//! imports:<sorted, deduplicated imports joined by ','>
//! keywords:<sorted, deduplicated, lowercased keywords joined by ','>
//! ```
//!
//! Repository, file paths, timestamps, and sync status are excluded so the
//! same code copied into two repositories produces the same signature.

use sha2::{Digest, Sha256};

use crate::models::Component;

/// Length of a signature in hex characters.
pub const SIGNATURE_LEN: usize = 24;

/// Compute the signature of a component.
pub fn signature(component: &Component) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_form(component).as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(SIGNATURE_LEN);
    digest
}

/// The order-independent text the signature is computed over.
pub fn canonical_form(component: &Component) -> String {
    let methods = sorted_unique(component.public_methods.iter().map(|m| m.trim().to_string()));
    let imports = sorted_unique(component.imports.iter().map(|i| i.trim().to_string()));
    let keywords = sorted_unique(component.keywords.iter().map(|k| k.trim().to_lowercase()));

    format!(
        "name:{}\ntype:{}\nmethods:{}\nimports:{}\nkeywords:{}",
        component.name.trim().to_lowercase(),
        component.component_type.as_str(),
        methods.join(","),
        imports.join(","),
        keywords.join(","),
    )
}

fn sorted_unique(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut v: Vec<String> = items.filter(|s| !s.is_empty()).collect();
    v.sort();
    v.dedup();
    v
}

/// Check that a string has the shape of a signature.
pub fn is_well_formed(sig: &str) -> bool {
    sig.len() == SIGNATURE_LEN && sig.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComponentType, SyncStatus};
    use chrono::{TimeZone, Utc};

    fn component(repo: &str) -> Component {
        Component {
            component_id: crate::models::component_id_for(repo, "src/payments_client.py"),
            name: "payments_client".into(),
            component_type: ComponentType::ApiClient,
            repository: repo.into(),
            files: vec!["src/payments_client.py".into()],
            language: "python".into(),
            api_signature: "exports: PaymentsClient".into(),
            imports: vec!["requests".into(), "json".into()],
            keywords: vec!["requests".into(), "endpoint".into()],
            description: None,
            lines_of_code: 80,
            cyclomatic_complexity: Some(4),
            public_methods: vec!["PaymentsClient".into(), "PaymentsClient.charge".into()],
            first_seen: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            sync_status: SyncStatus::Unknown,
        }
    }

    #[test]
    fn same_content_in_different_repositories_matches() {
        assert_eq!(signature(&component("acme/a")), signature(&component("acme/b")));
    }

    #[test]
    fn ordering_and_case_do_not_matter() {
        let a = component("r");
        let mut b = component("r");
        b.name = "Payments_Client".into();
        b.imports.reverse();
        b.public_methods.reverse();
        b.keywords = vec!["ENDPOINT".into(), "requests".into(), "requests".into()];
        assert_eq!(signature(&a), signature(&b));
    }

    #[test]
    fn public_surface_changes_the_signature() {
        let a = component("r");
        let mut b = component("r");
        b.public_methods.push("PaymentsClient.refund".into());
        assert_ne!(signature(&a), signature(&b));

        let mut c = component("r");
        c.component_type = ComponentType::Infrastructure;
        assert_ne!(signature(&a), signature(&c));
    }

    #[test]
    fn signature_has_fixed_length() {
        let sig = signature(&component("r"));
        assert!(is_well_formed(&sig));
        assert!(!is_well_formed("xyz"));
    }
}
