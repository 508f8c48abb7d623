//! Changed-path classification.
//!
//! [`classify`] maps a raw path reported by the CI job to the category whose
//! store tracks it. Rules are checked in order; the first match wins.
//! [`derive_owner`] then extracts the owner key a tracked descriptor is
//! grouped under.

use std::path::Path;

use crate::error::CoreError;
use crate::types::{Category, ChangeDescriptor, OwnerKey};

/// Marker for rolling snapshot files under `target-data`. They are rewritten
/// in place on every import, so they are never tracked as changes.
const ROLLING_SNAPSHOT_MARKER: &str = "latest-";

/// Folders a submission PR may touch by default.
pub const DEFAULT_ALLOWED_FOLDERS: &[&str] = &["model-metadata/", "model-output/"];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Why a path was not tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// A `target-data` rolling snapshot (`latest-*`).
    RollingSnapshot,
    /// Outside every tracked folder.
    Unrecognized,
}

/// Result of classifying one changed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Tracked(Category),
    Discard(DiscardReason),
}

impl Classification {
    pub fn category(self) -> Option<Category> {
        match self {
            Classification::Tracked(category) => Some(category),
            Classification::Discard(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Classify a changed path. Pure and total over any input.
pub fn classify(path: &str) -> Classification {
    if path.starts_with(Category::ModelOutput.prefix()) {
        return Classification::Tracked(Category::ModelOutput);
    }
    if path.starts_with(Category::ModelMetadata.prefix()) {
        return Classification::Tracked(Category::ModelMetadata);
    }
    if path.starts_with(Category::TargetData.prefix()) {
        if path.contains(ROLLING_SNAPSHOT_MARKER) {
            return Classification::Discard(DiscardReason::RollingSnapshot);
        }
        return Classification::Tracked(Category::TargetData);
    }
    Classification::Discard(DiscardReason::Unrecognized)
}

/// Derive the owner key of `descriptor` under `category`'s grouping rules.
///
/// - model output: parent directory `<team>-<model>[-…]`
/// - target data: last `-` token of the file stem, `_` replaced by spaces
/// - metadata: the flat bucket
pub fn derive_owner(category: Category, descriptor: &ChangeDescriptor) -> Result<OwnerKey, CoreError> {
    match category {
        Category::ModelOutput => team_model_owner(descriptor),
        Category::TargetData => target_owner(descriptor),
        Category::ModelMetadata => Ok(OwnerKey::Flat),
    }
}

/// Paths that fall outside every folder in `allowed`, in input order.
pub fn paths_outside<'a, S: AsRef<str>>(paths: &'a [S], allowed: &[S]) -> Vec<&'a str> {
    paths
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| !p.is_empty())
        .filter(|p| !allowed.iter().any(|folder| p.starts_with(folder.as_ref())))
        .collect()
}

// ---------------------------------------------------------------------------
// Owner derivation
// ---------------------------------------------------------------------------

fn team_model_owner(descriptor: &ChangeDescriptor) -> Result<OwnerKey, CoreError> {
    let path = Path::new(descriptor.as_str());
    let parent = path
        .parent()
        .filter(|p| p.parent().is_some_and(|pp| !pp.as_os_str().is_empty()))
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            CoreError::invalid_owner(descriptor.as_str(), "no <team>-<model> directory")
        })?;

    let mut tokens = parent.split('-');
    let team = tokens.next().unwrap_or_default();
    let model = tokens.next().unwrap_or_default();
    if team.is_empty() {
        return Err(CoreError::invalid_owner(descriptor.as_str(), "empty team"));
    }
    if model.is_empty() {
        return Err(CoreError::invalid_owner(descriptor.as_str(), "empty model"));
    }
    Ok(OwnerKey::team_model(team, model))
}

fn target_owner(descriptor: &ChangeDescriptor) -> Result<OwnerKey, CoreError> {
    let stem = Path::new(descriptor.as_str())
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let name = stem.rsplit('-').next().unwrap_or_default().replace('_', " ");
    if name.trim().is_empty() {
        return Err(CoreError::invalid_owner(descriptor.as_str(), "empty target name"));
    }
    Ok(OwnerKey::target(name))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> ChangeDescriptor {
        ChangeDescriptor::from(s)
    }

    #[test]
    fn empty_string_is_discarded() {
        assert_eq!(classify(""), Classification::Discard(DiscardReason::Unrecognized));
    }

    #[test]
    fn team_model_ignores_extra_tokens() {
        let owner = derive_owner(
            Category::ModelOutput,
            &d("model-output/ISI-CovTest-v2/2024-10-16-ISI-CovTest.csv"),
        )
        .unwrap();
        assert_eq!(owner, OwnerKey::team_model("ISI", "CovTest"));
    }

    #[test]
    fn file_directly_under_model_output_has_no_owner() {
        let err = derive_owner(Category::ModelOutput, &d("model-output/README.md")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOwner { .. }), "got: {err}");
    }

    #[test]
    fn empty_team_is_rejected() {
        let err = derive_owner(Category::ModelOutput, &d("model-output/-modelB/x.csv")).unwrap_err();
        assert!(err.to_string().contains("empty team"), "got: {err}");
    }

    #[test]
    fn directory_without_dash_is_rejected() {
        let err = derive_owner(Category::ModelOutput, &d("model-output/teamA/x.csv")).unwrap_err();
        assert!(err.to_string().contains("empty model"), "got: {err}");
    }

    #[test]
    fn target_without_dash_uses_whole_stem() {
        let owner = derive_owner(Category::TargetData, &d("target-data/ILI_incidence.csv")).unwrap();
        assert_eq!(owner, OwnerKey::target("ILI incidence"));
    }

    #[test]
    fn paths_outside_reports_only_foreign_paths() {
        let paths = vec![
            "model-output/a-b/x.csv".to_string(),
            "README.md".to_string(),
            "model-metadata/a-b.yml".to_string(),
            ".github/workflows/ci.yml".to_string(),
        ];
        let allowed: Vec<String> = DEFAULT_ALLOWED_FOLDERS.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            paths_outside(&paths, &allowed),
            vec!["README.md", ".github/workflows/ci.yml"]
        );
    }
}
