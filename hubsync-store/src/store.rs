//! JSON-backed change store.
//!
//! A [`ChangeStore`] is one JSON document holding pending change
//! descriptors grouped by owner. All mutations are whole-file
//! read-modify-write cycles replaced atomically (see [`crate::atomic`]).
//!
//! # Lifecycle
//!
//! ```text
//! clear / init  →  merge … merge  →  read_all  →  reseed(failed) | clear
//! ```
//!
//! Merging into a store that was never initialized is an error: only
//! [`ChangeStore::clear`] and [`ChangeStore::init`] create the file.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use hubsync_core::{ChangeDescriptor, HubConfig, OwnerKey, StoreKind};

use crate::atomic;
use crate::error::{io_err, StoreError};
use crate::layout::{FlatLayout, ModelOutputLayout, StoreLayout, TargetLayout};

// ---------------------------------------------------------------------------
// ChangeStore
// ---------------------------------------------------------------------------

/// Persistent `owner → changes` mapping of layout `L`.
#[derive(Debug, Clone)]
pub struct ChangeStore<L> {
    path: PathBuf,
    _layout: PhantomData<L>,
}

impl<L: StoreLayout> ChangeStore<L> {
    /// Handle to the store document at `path`. No I/O.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _layout: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the complete persisted mapping.
    ///
    /// Returns `StoreNotFound` if the file is absent and `Corrupt` if it does
    /// not parse as this layout.
    pub fn read_all(&self) -> Result<L::State, StoreError> {
        if !self.path.exists() {
            return Err(StoreError::StoreNotFound {
                path: self.path.clone(),
            });
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))?;
        serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Union `descriptors` into `owner`'s record.
    ///
    /// Returns the number of newly stored descriptors. When nothing is new the
    /// file is left untouched.
    pub fn merge(&self, owner: &OwnerKey, descriptors: &[ChangeDescriptor]) -> Result<usize, StoreError> {
        self.check_owner(owner)?;
        let mut state = self.read_all()?;
        let added = L::insert(&mut state, owner, descriptors);
        self.commit(&state, added)?;
        Ok(added)
    }

    /// Merge many `(owner, descriptor)` pairs in a single read-modify-write.
    ///
    /// Every owner is validated before the store is read, so a bad owner
    /// leaves the file untouched.
    pub fn merge_entries(&self, entries: &[(OwnerKey, ChangeDescriptor)]) -> Result<usize, StoreError> {
        for (owner, _) in entries {
            self.check_owner(owner)?;
        }
        let mut state = self.read_all()?;
        let added = entries
            .iter()
            .map(|(owner, d)| L::insert(&mut state, owner, std::slice::from_ref(d)))
            .sum();
        self.commit(&state, added)?;
        Ok(added)
    }

    /// Every pending `(owner, descriptor)` pair, sorted by descriptor.
    pub fn pending(&self) -> Result<Vec<(OwnerKey, ChangeDescriptor)>, StoreError> {
        let mut entries = L::entries(&self.read_all()?);
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(entries)
    }

    /// Atomically replace the persisted state with the empty mapping.
    /// Creates the store if it does not exist.
    pub fn clear(&self) -> Result<(), StoreError> {
        atomic::write_json(&self.path, &L::State::default())?;
        tracing::info!(store = %self.path.display(), "store cleared");
        Ok(())
    }

    /// Create the store empty if it does not exist yet.
    ///
    /// Returns `true` if the file was created.
    pub fn init(&self) -> Result<bool, StoreError> {
        if self.path.exists() {
            return Ok(false);
        }
        self.clear()?;
        Ok(true)
    }

    /// Replace the persisted state with exactly the pairs of `subset`.
    ///
    /// Observably equivalent to [`clear`](Self::clear) followed by a merge of
    /// every pair, but written in one atomic replacement.
    pub fn reseed(&self, subset: &L::State) -> Result<(), StoreError> {
        self.reseed_entries(&L::entries(subset))
    }

    /// [`reseed`](Self::reseed) from a flat list of pairs.
    pub fn reseed_entries(&self, entries: &[(OwnerKey, ChangeDescriptor)]) -> Result<(), StoreError> {
        for (owner, _) in entries {
            self.check_owner(owner)?;
        }
        let mut state = L::State::default();
        for (owner, d) in entries {
            L::insert(&mut state, owner, std::slice::from_ref(d));
        }
        atomic::write_json(&self.path, &state)?;
        tracing::info!(
            store = %self.path.display(),
            retained = entries.len(),
            "store reseeded"
        );
        Ok(())
    }

    fn check_owner(&self, owner: &OwnerKey) -> Result<(), StoreError> {
        let reason = if !L::accepts(owner) {
            "owner kind does not match store layout"
        } else if has_blank_part(owner) {
            "owner has an empty component"
        } else {
            return Ok(());
        };
        Err(StoreError::InvalidOwner {
            owner: owner.to_string(),
            store: L::NAME,
            reason: reason.to_string(),
        })
    }

    fn commit(&self, state: &L::State, added: usize) -> Result<(), StoreError> {
        if added == 0 {
            tracing::debug!(store = %self.path.display(), "merge unchanged");
            return Ok(());
        }
        atomic::write_json(&self.path, state)?;
        tracing::info!(store = %self.path.display(), added, "merged changes");
        Ok(())
    }
}

fn has_blank_part(owner: &OwnerKey) -> bool {
    match owner {
        OwnerKey::TeamModel { team, model } => team.trim().is_empty() || model.trim().is_empty(),
        OwnerKey::Target { name } => name.trim().is_empty(),
        OwnerKey::Flat => false,
    }
}

// ---------------------------------------------------------------------------
// Layout-erased access
// ---------------------------------------------------------------------------

/// Object-safe view of a change store, for callers that select the store at
/// runtime (by [`StoreKind`]).
pub trait TrackedStore {
    fn path(&self) -> &Path;
    fn init(&self) -> Result<bool, StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
    fn pending(&self) -> Result<Vec<(OwnerKey, ChangeDescriptor)>, StoreError>;
    fn merge_entries(&self, entries: &[(OwnerKey, ChangeDescriptor)]) -> Result<usize, StoreError>;
    fn reseed_entries(&self, entries: &[(OwnerKey, ChangeDescriptor)]) -> Result<(), StoreError>;
    /// Raw persisted document, for display.
    fn snapshot(&self) -> Result<serde_json::Value, StoreError>;
}

impl<L: StoreLayout> TrackedStore for ChangeStore<L> {
    fn path(&self) -> &Path {
        ChangeStore::path(self)
    }

    fn init(&self) -> Result<bool, StoreError> {
        ChangeStore::init(self)
    }

    fn clear(&self) -> Result<(), StoreError> {
        ChangeStore::clear(self)
    }

    fn pending(&self) -> Result<Vec<(OwnerKey, ChangeDescriptor)>, StoreError> {
        ChangeStore::pending(self)
    }

    fn merge_entries(&self, entries: &[(OwnerKey, ChangeDescriptor)]) -> Result<usize, StoreError> {
        ChangeStore::merge_entries(self, entries)
    }

    fn reseed_entries(&self, entries: &[(OwnerKey, ChangeDescriptor)]) -> Result<(), StoreError> {
        ChangeStore::reseed_entries(self, entries)
    }

    fn snapshot(&self) -> Result<serde_json::Value, StoreError> {
        Ok(serde_json::to_value(self.read_all()?)?)
    }
}

/// Open the store of `kind` as configured in `config`.
pub fn open_store(config: &HubConfig, kind: StoreKind) -> Box<dyn TrackedStore> {
    let path = config.store_path(kind);
    match kind {
        StoreKind::ModelOutput | StoreKind::Ensemble => {
            Box::new(ChangeStore::<ModelOutputLayout>::at(path))
        }
        StoreKind::TargetData => Box::new(ChangeStore::<TargetLayout>::at(path)),
        StoreKind::ModelMetadata | StoreKind::Evaluation => {
            Box::new(ChangeStore::<FlatLayout>::at(path))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{FlatState, ModelOutputState};
    use tempfile::TempDir;

    fn d(s: &str) -> ChangeDescriptor {
        ChangeDescriptor::from(s)
    }

    fn model_store(tmp: &TempDir) -> ChangeStore<ModelOutputLayout> {
        ChangeStore::at(tmp.path().join("changes_db.json"))
    }

    #[test]
    fn merge_into_missing_store_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = model_store(&tmp);
        let err = store
            .merge(&OwnerKey::team_model("t", "m"), &[d("x")])
            .unwrap_err();
        assert!(matches!(err, StoreError::StoreNotFound { .. }), "got: {err}");
        assert!(!store.exists(), "merge must not create the store");
    }

    #[test]
    fn second_identical_merge_does_not_rewrite_file() {
        let tmp = TempDir::new().unwrap();
        let store = model_store(&tmp);
        store.clear().unwrap();
        let owner = OwnerKey::team_model("t", "m");

        assert_eq!(store.merge(&owner, &[d("x")]).unwrap(), 1);
        let before = std::fs::read(store.path()).unwrap();
        assert_eq!(store.merge(&owner, &[d("x")]).unwrap(), 0);
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn wrong_owner_kind_is_rejected_before_reading() {
        let tmp = TempDir::new().unwrap();
        let store: ChangeStore<FlatLayout> = ChangeStore::at(tmp.path().join("missing.json"));
        let err = store.merge(&OwnerKey::target("t"), &[d("x")]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOwner { .. }), "got: {err}");
    }

    #[test]
    fn blank_owner_components_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = model_store(&tmp);
        store.clear().unwrap();
        let before = std::fs::read(store.path()).unwrap();

        for owner in [OwnerKey::team_model("", "m"), OwnerKey::team_model("t", "  ")] {
            let err = store.merge(&owner, &[d("x.csv")]).unwrap_err();
            assert!(matches!(err, StoreError::InvalidOwner { .. }), "got: {err}");
        }
        let err = store
            .reseed_entries(&[(OwnerKey::team_model("", "m"), d("x.csv"))])
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidOwner { .. }), "got: {err}");
        assert_eq!(std::fs::read(store.path()).unwrap(), before);

        let targets: ChangeStore<TargetLayout> = ChangeStore::at(tmp.path().join("target_db.json"));
        targets.clear().unwrap();
        let err = targets.merge(&OwnerKey::target(""), &[d("x.csv")]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOwner { .. }), "got: {err}");
        assert!(targets.pending().unwrap().is_empty());
    }

    #[test]
    fn bad_owner_in_batch_leaves_file_untouched() {
        let tmp = TempDir::new().unwrap();
        let store = model_store(&tmp);
        store.clear().unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let err = store
            .merge_entries(&[
                (OwnerKey::team_model("t", "m"), d("x")),
                (OwnerKey::Flat, d("y")),
            ])
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidOwner { .. }));
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn corrupt_store_is_reported_with_path() {
        let tmp = TempDir::new().unwrap();
        let store = model_store(&tmp);
        std::fs::write(store.path(), "{ not json").unwrap();

        let err = store.read_all().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }), "got: {err}");
        assert!(err.to_string().contains("changes_db.json"));
    }

    #[test]
    fn wrong_shape_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let store = model_store(&tmp);
        std::fs::write(store.path(), r#"{"team": {"changes": []}}"#).unwrap();
        assert!(matches!(store.read_all(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn pending_is_sorted_by_descriptor() {
        let tmp = TempDir::new().unwrap();
        let store = model_store(&tmp);
        store.clear().unwrap();
        store
            .merge(&OwnerKey::team_model("z", "m"), &[d("model-output/z-m/b.csv")])
            .unwrap();
        store
            .merge(&OwnerKey::team_model("a", "m"), &[d("model-output/a-m/c.csv")])
            .unwrap();
        store
            .merge(&OwnerKey::team_model("z", "m"), &[d("model-output/z-m/a.csv")])
            .unwrap();

        let order: Vec<String> = store.pending().unwrap().into_iter().map(|(_, d)| d.0).collect();
        assert_eq!(
            order,
            vec![
                "model-output/a-m/c.csv",
                "model-output/z-m/a.csv",
                "model-output/z-m/b.csv",
            ]
        );
    }

    #[test]
    fn init_does_not_touch_existing_store() {
        let tmp = TempDir::new().unwrap();
        let store: ChangeStore<FlatLayout> = ChangeStore::at(tmp.path().join("metadata_db.json"));
        assert!(store.init().unwrap());
        store.merge(&OwnerKey::Flat, &[d("model-metadata/a-b.yml")]).unwrap();
        assert!(!store.init().unwrap());
        assert_eq!(store.read_all().unwrap().changes, vec![d("model-metadata/a-b.yml")]);
    }

    #[test]
    fn reseed_replaces_previous_content() {
        let tmp = TempDir::new().unwrap();
        let store = model_store(&tmp);
        store.clear().unwrap();
        store
            .merge(&OwnerKey::team_model("t", "m"), &[d("old.csv")])
            .unwrap();

        let mut subset = ModelOutputState::default();
        ModelOutputLayout::insert(&mut subset, &OwnerKey::team_model("u", "n"), &[d("new.csv")]);
        store.reseed(&subset).unwrap();

        assert_eq!(store.read_all().unwrap(), subset);
    }

    #[test]
    fn open_store_selects_layout_by_kind() {
        let tmp = TempDir::new().unwrap();
        let cfg = HubConfig::with_hub_path(tmp.path());
        let metadata = open_store(&cfg, StoreKind::ModelMetadata);
        metadata.init().unwrap();
        metadata
            .merge_entries(&[(OwnerKey::Flat, d("model-metadata/a-b.yml"))])
            .unwrap();

        let raw: FlatState =
            serde_json::from_str(&std::fs::read_to_string(metadata.path()).unwrap()).unwrap();
        assert_eq!(raw.changes, vec![d("model-metadata/a-b.yml")]);

        let target = open_store(&cfg, StoreKind::TargetData);
        let err = target.merge_entries(&[(OwnerKey::Flat, d("x"))]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOwner { .. }));
    }
}
