//! Provenance index builder.
//!
//! Groups every scanned component by [`signature`](crate::signature::signature)
//! and emits one [`ComponentProvenance`] per family. The index is always
//! rebuilt in full from the current component set.
//!
//! Origin selection, in order:
//! 1. instances tagged [`SyncStatus::Original`] by the scanner, if any;
//! 2. otherwise all instances.
//!
//! Among the chosen set the earliest `first_seen` wins, ties broken by
//! repository then `component_id`. Each member becomes one location; the
//! origin's is `original`, the rest `diverged` unless tagged `original`.

use std::collections::BTreeMap;

use crate::error::validate_repository;
use crate::models::{
    Component, ComponentLocation, ComponentProvenance, ConsolidationStatus, SyncStatus,
};
use crate::signature::signature;

/// Provenance entries keyed by representative `component_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvenanceIndex {
    entries: BTreeMap<String, ComponentProvenance>,
}

impl ProvenanceIndex {
    pub fn get(&self, component_id: &str) -> Option<&ComponentProvenance> {
        self.entries.get(component_id)
    }

    pub fn by_signature(&self, sig: &str) -> Option<&ComponentProvenance> {
        self.entries.values().find(|p| p.signature == sig)
    }

    /// Family containing `component`, matched by signature.
    pub fn family_of(&self, component: &Component) -> Option<&ComponentProvenance> {
        self.by_signature(&signature(component))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentProvenance> {
        self.entries.values()
    }

    /// Families present in more than one location.
    pub fn duplicates(&self) -> Vec<&ComponentProvenance> {
        self.entries.values().filter(|p| p.is_duplicated()).collect()
    }

    pub fn into_entries(self) -> BTreeMap<String, ComponentProvenance> {
        self.entries
    }

    pub fn to_vec(&self) -> Vec<ComponentProvenance> {
        self.entries.values().cloned().collect()
    }
}

impl From<Vec<ComponentProvenance>> for ProvenanceIndex {
    fn from(entries: Vec<ComponentProvenance>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|p| (p.component_id.clone(), p))
                .collect(),
        }
    }
}

/// Build the index from components grouped by repository.
pub fn build(components_by_repository: &BTreeMap<String, Vec<Component>>) -> ProvenanceIndex {
    let all: Vec<&Component> = components_by_repository.values().flatten().collect();
    build_from(all)
}

/// Build the index from a flat component list.
///
/// Components with a malformed repository identifier are logged and left
/// out.
pub fn build_from<'a>(components: impl IntoIterator<Item = &'a Component>) -> ProvenanceIndex {
    let mut families: BTreeMap<String, Vec<&Component>> = BTreeMap::new();
    for component in components {
        if let Err(e) = validate_repository(&component.repository) {
            tracing::warn!(component = %component.component_id, error = %e, "skipping component");
            continue;
        }
        families
            .entry(signature(component))
            .or_default()
            .push(component);
    }

    let mut entries = BTreeMap::new();
    for (sig, members) in families {
        let entry = family_provenance(sig, members);
        if entry.is_duplicated() {
            tracing::info!(
                component = %entry.component_name,
                signature = %entry.signature,
                origin = %entry.origin_repository,
                repositories = ?entry.repositories(),
                "duplicate component family detected"
            );
        }
        entries.insert(entry.component_id.clone(), entry);
    }
    ProvenanceIndex { entries }
}

fn family_provenance(sig: String, mut members: Vec<&Component>) -> ComponentProvenance {
    members.sort_by(|a, b| {
        a.first_seen
            .cmp(&b.first_seen)
            .then_with(|| a.repository.cmp(&b.repository))
            .then_with(|| a.component_id.cmp(&b.component_id))
    });

    // `members` is non-empty: every family was created by a push.
    let origin: &Component = members
        .iter()
        .copied()
        .find(|c| c.sync_status == SyncStatus::Original)
        .unwrap_or(members[0]);

    // One location per member: the origin first, then the rest in
    // `first_seen` order.
    let mut ordered: Vec<&Component> = Vec::with_capacity(members.len());
    ordered.push(origin);
    ordered.extend(
        members
            .iter()
            .copied()
            .filter(|c| c.component_id != origin.component_id),
    );
    let locations: Vec<ComponentLocation> = ordered
        .iter()
        .map(|c| {
            let is_origin = c.component_id == origin.component_id;
            let sync_status = if is_origin || c.sync_status == SyncStatus::Original {
                SyncStatus::Original
            } else {
                SyncStatus::Diverged
            };
            ComponentLocation {
                repository: c.repository.clone(),
                files: c.files.clone(),
                sync_status,
                usage_count: 1,
            }
        })
        .collect();

    ComponentProvenance {
        component_id: origin.component_id.clone(),
        signature: sig,
        component_name: origin.name.clone(),
        component_type: origin.component_type,
        origin_repository: origin.repository.clone(),
        first_seen: members[0].first_seen,
        locations,
        consolidation_status: ConsolidationStatus::Unconsolidated,
    }
}
