//! Store layout and webhook configuration.
//!
//! Every store is addressed through an explicit [`HubConfig`] instead of the
//! process working directory. All fields default, so an absent or partial
//! YAML file still yields a usable configuration:
//!
//! ```yaml
//! hub_path: ./repo
//! store_dir: .github/data-storage
//! stores:
//!   model_output: changes_db.json
//! staging:
//!   max_records: 25000
//! ```

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::DEFAULT_ALLOWED_FOLDERS;
use crate::error::CoreError;
use crate::types::StoreKind;

/// File name of each store, relative to [`HubConfig::store_dir`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreFiles {
    pub model_output: String,
    pub model_metadata: String,
    pub target_data: String,
    pub ensemble: String,
    pub evaluation: String,
}

impl Default for StoreFiles {
    fn default() -> Self {
        Self {
            model_output: "changes_db.json".to_string(),
            model_metadata: "metadata_db.json".to_string(),
            target_data: "target_db.json".to_string(),
            ensemble: "ensemble_db.json".to_string(),
            evaluation: "evaluation_db.json".to_string(),
        }
    }
}

impl StoreFiles {
    pub fn file_name(&self, kind: StoreKind) -> &str {
        match kind {
            StoreKind::ModelOutput => &self.model_output,
            StoreKind::ModelMetadata => &self.model_metadata,
            StoreKind::TargetData => &self.target_data,
            StoreKind::Ensemble => &self.ensemble,
            StoreKind::Evaluation => &self.evaluation,
        }
    }
}

/// Local staging area for size-bounded uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Staging directory, relative to the hub path.
    pub dir: PathBuf,
    /// Manifest file name inside the staging directory.
    pub manifest: String,
    /// Maximum data records per staged part (header excluded).
    pub max_records: usize,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".github").join("tmp"),
            manifest: "changes.json".to_string(),
            max_records: 25_000,
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Checkout root of the hub repository.
    pub hub_path: PathBuf,
    /// Store directory, relative to `hub_path`.
    pub store_dir: PathBuf,
    pub stores: StoreFiles,
    pub staging: StagingConfig,
    /// Folders a submission may touch.
    pub allowed_folders: Vec<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            hub_path: PathBuf::from("./repo"),
            store_dir: PathBuf::from(".github").join("data-storage"),
            stores: StoreFiles::default(),
            staging: StagingConfig::default(),
            allowed_folders: DEFAULT_ALLOWED_FOLDERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl HubConfig {
    /// Load configuration from a YAML file.
    ///
    /// Returns `CoreError::Io` if the file cannot be read,
    /// `CoreError::Parse` (with path) if it is malformed and
    /// `CoreError::InvalidConfig` if the staging directory is not a plain
    /// path inside the hub.
    pub fn load_at(path: &Path) -> Result<Self, CoreError> {
        let contents = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&contents).map_err(|source| CoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if !is_inside_hub(&config.staging.dir) {
            return Err(CoreError::InvalidConfig {
                path: path.to_path_buf(),
                reason: format!(
                    "staging.dir '{}' must be a relative path inside the hub",
                    config.staging.dir.display()
                ),
            });
        }
        Ok(config)
    }

    /// Default configuration rooted at `hub_path`.
    pub fn with_hub_path(hub_path: impl Into<PathBuf>) -> Self {
        Self {
            hub_path: hub_path.into(),
            ..Self::default()
        }
    }

    /// `<hub_path>/<store_dir>`
    pub fn store_root(&self) -> PathBuf {
        self.hub_path.join(&self.store_dir)
    }

    /// `<hub_path>/<store_dir>/<file>` for `kind`. Pure, no I/O.
    pub fn store_path(&self, kind: StoreKind) -> PathBuf {
        self.store_root().join(self.stores.file_name(kind))
    }

    /// `<hub_path>/<staging.dir>`
    pub fn staging_dir(&self) -> PathBuf {
        self.hub_path.join(&self.staging.dir)
    }

    /// `<hub_path>/<staging.dir>/<staging.manifest>`
    pub fn manifest_path(&self) -> PathBuf {
        self.staging_dir().join(&self.staging.manifest)
    }
}

/// Staged parts are addressed by hub-relative descriptors, so the staging
/// dir must not leave the hub.
fn is_inside_hub(dir: &Path) -> bool {
    dir.components().any(|c| matches!(c, Component::Normal(_)))
        && dir
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Webhook endpoint settings supplied by the CI job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    /// Base URL; channel segments are appended to it.
    pub base_url: String,
    pub secret: String,
    pub disease: String,
}

impl WebhookConfig {
    /// Build from optional parts. A missing or empty URL or secret means
    /// "nothing to deliver" and yields `None`.
    pub fn from_parts(
        base_url: Option<String>,
        secret: Option<String>,
        disease: Option<String>,
    ) -> Option<Self> {
        let base_url = base_url.filter(|s| !s.trim().is_empty())?;
        let secret = secret.filter(|s| !s.is_empty())?;
        Some(Self {
            base_url,
            secret,
            disease: disease.unwrap_or_default(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_store_paths_live_under_hub() {
        let cfg = HubConfig::with_hub_path("/hub");
        assert_eq!(
            cfg.store_path(StoreKind::ModelOutput),
            PathBuf::from("/hub/.github/data-storage/changes_db.json")
        );
        assert_eq!(
            cfg.store_path(StoreKind::TargetData),
            PathBuf::from("/hub/.github/data-storage/target_db.json")
        );
        assert_eq!(cfg.manifest_path(), PathBuf::from("/hub/.github/tmp/changes.json"));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hubsync.yaml");
        std::fs::write(&path, "hub_path: /srv/hub\nstores:\n  model_output: projections_db.json\n")
            .unwrap();

        let cfg = HubConfig::load_at(&path).unwrap();
        assert_eq!(cfg.hub_path, PathBuf::from("/srv/hub"));
        assert_eq!(cfg.stores.model_output, "projections_db.json");
        assert_eq!(cfg.stores.model_metadata, "metadata_db.json");
        assert_eq!(cfg.staging.max_records, 25_000);
    }

    #[test]
    fn malformed_yaml_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.yaml");
        std::fs::write(&path, "stores: [unclosed").unwrap();

        let err = HubConfig::load_at(&path).unwrap_err();
        assert!(matches!(err, CoreError::Parse { .. }), "got: {err}");
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn staging_dir_must_stay_inside_hub() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hubsync.yaml");
        for dir in ["/var/tmp/stage", "../outside", "."] {
            std::fs::write(&path, format!("staging:\n  dir: {dir}\n")).unwrap();
            let err = HubConfig::load_at(&path).unwrap_err();
            assert!(matches!(err, CoreError::InvalidConfig { .. }), "{dir}: {err}");
        }

        std::fs::write(&path, "staging:\n  dir: ./.github/stage\n").unwrap();
        let cfg = HubConfig::load_at(&path).unwrap();
        assert_eq!(cfg.staging.dir, PathBuf::from("./.github/stage"));
    }

    #[test]
    fn webhook_requires_url_and_secret() {
        assert!(WebhookConfig::from_parts(None, Some("s".into()), None).is_none());
        assert!(WebhookConfig::from_parts(Some("http://x/".into()), None, None).is_none());
        assert!(WebhookConfig::from_parts(Some(" ".into()), Some("s".into()), None).is_none());

        let cfg = WebhookConfig::from_parts(
            Some("http://x/".into()),
            Some("s".into()),
            Some("flu".into()),
        )
        .unwrap();
        assert_eq!(cfg.disease, "flu");
    }
}
