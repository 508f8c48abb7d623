//! Route a PR's changed paths into the per-category stores.
//!
//! Paths are classified, grouped by category, assigned an owner and merged
//! into the category's store with one read-modify-write per store.
//! Discarded paths are logged and skipped; paths whose owner cannot be
//! derived are rejected and reported, never stored.

use std::collections::BTreeMap;

use hubsync_core::{
    classify, derive_owner, Category, ChangeDescriptor, Classification, DiscardReason, HubConfig,
    OwnerKey, StoreKind,
};

use crate::error::StoreError;
use crate::store::open_store;

/// Which store receives model-output changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelOutputTarget {
    #[default]
    ModelOutput,
    Ensemble,
}

impl ModelOutputTarget {
    fn store_kind(self) -> StoreKind {
        match self {
            ModelOutputTarget::ModelOutput => StoreKind::ModelOutput,
            ModelOutputTarget::Ensemble => StoreKind::Ensemble,
        }
    }
}

/// A path that could not be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub descriptor: ChangeDescriptor,
    pub reason: String,
}

/// Outcome of one ingestion.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Newly stored descriptors per store (0 when everything was known).
    pub stored: BTreeMap<StoreKind, usize>,
    pub discarded: Vec<(String, DiscardReason)>,
    pub rejected: Vec<Rejected>,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Split a whitespace-separated change list as handed over by the CI job.
pub fn split_changes(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_owned).collect()
}

/// Classify `paths` and merge every tracked one into its store.
///
/// Fails with `EmptyChanges` for an empty list and with `StoreNotFound` if a
/// receiving store was never initialized. Every receiving store is checked
/// before the first write, so a missing store leaves all stores untouched.
pub fn ingest(
    config: &HubConfig,
    paths: &[String],
    model_output: ModelOutputTarget,
) -> Result<IngestReport, StoreError> {
    if paths.iter().all(|p| p.trim().is_empty()) {
        return Err(StoreError::EmptyChanges);
    }

    let mut report = IngestReport::default();
    let mut grouped: BTreeMap<StoreKind, Vec<(OwnerKey, ChangeDescriptor)>> = BTreeMap::new();

    for path in paths.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        let category = match classify(path) {
            Classification::Tracked(category) => category,
            Classification::Discard(reason) => {
                tracing::warn!(path, ?reason, "discarding untracked path");
                report.discarded.push((path.to_owned(), reason));
                continue;
            }
        };

        let descriptor = ChangeDescriptor::from(path);
        match derive_owner(category, &descriptor) {
            Ok(owner) => {
                let kind = match category {
                    Category::ModelOutput => model_output.store_kind(),
                    other => other.default_store(),
                };
                grouped.entry(kind).or_default().push((owner, descriptor));
            }
            Err(err) => {
                tracing::warn!(path, error = %err, "rejecting path without owner");
                report.rejected.push(Rejected {
                    descriptor,
                    reason: err.to_string(),
                });
            }
        }
    }

    let targets: Vec<_> = grouped
        .into_iter()
        .map(|(kind, entries)| (kind, open_store(config, kind), entries))
        .collect();
    if let Some((_, store, _)) = targets.iter().find(|(_, store, _)| !store.path().exists()) {
        return Err(StoreError::StoreNotFound {
            path: store.path().to_path_buf(),
        });
    }

    for (kind, store, entries) in targets {
        tracing::info!(store = %kind, count = entries.len(), "storing changes");
        let added = store.merge_entries(&entries)?;
        report.stored.insert(kind, added);
    }

    Ok(report)
}

/// Merge evaluation results into the evaluation store.
///
/// Evaluation files live outside the classified hub folders, so every
/// non-blank path is stored as given in the store's single bucket.
pub fn ingest_evaluation(config: &HubConfig, paths: &[String]) -> Result<IngestReport, StoreError> {
    let entries: Vec<(OwnerKey, ChangeDescriptor)> = paths
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| (OwnerKey::Flat, ChangeDescriptor::from(p)))
        .collect();
    if entries.is_empty() {
        return Err(StoreError::EmptyChanges);
    }

    tracing::info!(store = %StoreKind::Evaluation, count = entries.len(), "storing changes");
    let added = open_store(config, StoreKind::Evaluation).merge_entries(&entries)?;
    let mut report = IngestReport::default();
    report.stored.insert(StoreKind::Evaluation, added);
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
