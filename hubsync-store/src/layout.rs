//! On-disk shapes of the change stores.
//!
//! ```text
//! model output   { "<team>": [ { "model": "<model>", "changes": [..] } ] }
//! target data    { "<target>": { "changes": [..] } }
//! flat           { "changes": [..] }
//! ```
//!
//! Every `changes` list has set semantics: [`StoreLayout::insert`] only
//! appends descriptors that are not already present for that owner.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use hubsync_core::{ChangeDescriptor, OwnerKey};

/// Shape of one kind of store document.
pub trait StoreLayout {
    /// Persisted document. `Default` is the empty mapping.
    type State: Default + Serialize + DeserializeOwned + PartialEq + Debug;

    /// Human-readable layout name, used in errors.
    const NAME: &'static str;

    /// Whether `owner` can be stored in this layout.
    fn accepts(owner: &OwnerKey) -> bool;

    /// Union `descriptors` into `owner`'s record, creating it when absent.
    /// Returns how many descriptors were new.
    fn insert(state: &mut Self::State, owner: &OwnerKey, descriptors: &[ChangeDescriptor]) -> usize;

    /// Every `(owner, descriptor)` pair held by `state`, in document order.
    fn entries(state: &Self::State) -> Vec<(OwnerKey, ChangeDescriptor)>;
}

fn union_into(changes: &mut Vec<ChangeDescriptor>, incoming: &[ChangeDescriptor]) -> usize {
    let mut added = 0;
    for d in incoming {
        if !changes.contains(d) {
            changes.push(d.clone());
            added += 1;
        }
    }
    added
}

// ---------------------------------------------------------------------------
// Model output
// ---------------------------------------------------------------------------

/// One model's pending changes inside a team entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub model: String,
    #[serde(default)]
    pub changes: Vec<ChangeDescriptor>,
}

/// `team → [ModelRecord]`
pub type ModelOutputState = BTreeMap<String, Vec<ModelRecord>>;

/// Model output (and ensemble) stores, keyed by team then model.
#[derive(Debug, Clone, Copy)]
pub struct ModelOutputLayout;

impl StoreLayout for ModelOutputLayout {
    type State = ModelOutputState;
    const NAME: &'static str = "model-output";

    fn accepts(owner: &OwnerKey) -> bool {
        matches!(owner, OwnerKey::TeamModel { .. })
    }

    fn insert(state: &mut Self::State, owner: &OwnerKey, descriptors: &[ChangeDescriptor]) -> usize {
        let OwnerKey::TeamModel { team, model } = owner else {
            return 0;
        };
        if descriptors.is_empty() {
            return 0;
        }
        let records = state.entry(team.clone()).or_default();
        match records.iter_mut().find(|r| &r.model == model) {
            Some(record) => union_into(&mut record.changes, descriptors),
            None => {
                let mut record = ModelRecord {
                    model: model.clone(),
                    changes: Vec::new(),
                };
                let added = union_into(&mut record.changes, descriptors);
                records.push(record);
                added
            }
        }
    }

    fn entries(state: &Self::State) -> Vec<(OwnerKey, ChangeDescriptor)> {
        state
            .iter()
            .flat_map(|(team, records)| {
                records.iter().flat_map(move |r| {
                    r.changes
                        .iter()
                        .map(move |d| (OwnerKey::team_model(team.as_str(), r.model.as_str()), d.clone()))
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Target data
// ---------------------------------------------------------------------------

/// One target's pending changes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetRecord {
    #[serde(default)]
    pub changes: Vec<ChangeDescriptor>,
}

/// `target → TargetRecord`
pub type TargetState = BTreeMap<String, TargetRecord>;

/// Target-data store, keyed by normalised target name.
#[derive(Debug, Clone, Copy)]
pub struct TargetLayout;

impl StoreLayout for TargetLayout {
    type State = TargetState;
    const NAME: &'static str = "target";

    fn accepts(owner: &OwnerKey) -> bool {
        matches!(owner, OwnerKey::Target { .. })
    }

    fn insert(state: &mut Self::State, owner: &OwnerKey, descriptors: &[ChangeDescriptor]) -> usize {
        let OwnerKey::Target { name } = owner else {
            return 0;
        };
        if descriptors.is_empty() {
            return 0;
        }
        union_into(&mut state.entry(name.clone()).or_default().changes, descriptors)
    }

    fn entries(state: &Self::State) -> Vec<(OwnerKey, ChangeDescriptor)> {
        state
            .iter()
            .flat_map(|(name, record)| {
                record
                    .changes
                    .iter()
                    .map(move |d| (OwnerKey::target(name.as_str()), d.clone()))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Flat
// ---------------------------------------------------------------------------

/// Single-bucket document. Empty serializes as `{}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlatState {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<ChangeDescriptor>,
}

/// Metadata, evaluation and staging-manifest stores.
#[derive(Debug, Clone, Copy)]
pub struct FlatLayout;

impl StoreLayout for FlatLayout {
    type State = FlatState;
    const NAME: &'static str = "flat";

    fn accepts(owner: &OwnerKey) -> bool {
        matches!(owner, OwnerKey::Flat)
    }

    fn insert(state: &mut Self::State, owner: &OwnerKey, descriptors: &[ChangeDescriptor]) -> usize {
        if !Self::accepts(owner) {
            return 0;
        }
        union_into(&mut state.changes, descriptors)
    }

    fn entries(state: &Self::State) -> Vec<(OwnerKey, ChangeDescriptor)> {
        state
            .changes
            .iter()
            .map(|d| (OwnerKey::Flat, d.clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
