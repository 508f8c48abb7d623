//! Domain types for change tracking.
//!
//! Descriptors are relative path strings as reported by the CI job; they are
//! never resolved against the filesystem here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// One submitted artifact, identified by its path relative to the hub root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeDescriptor(pub String);

impl ChangeDescriptor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ChangeDescriptor {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChangeDescriptor {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl AsRef<str> for ChangeDescriptor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Tracked category of a changed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    ModelOutput,
    ModelMetadata,
    TargetData,
}

impl Category {
    /// Leading path segment that selects this category.
    pub fn prefix(self) -> &'static str {
        match self {
            Category::ModelOutput => "model-output",
            Category::ModelMetadata => "model-metadata",
            Category::TargetData => "target-data",
        }
    }

    /// Store that accumulates this category by default.
    pub fn default_store(self) -> StoreKind {
        match self {
            Category::ModelOutput => StoreKind::ModelOutput,
            Category::ModelMetadata => StoreKind::ModelMetadata,
            Category::TargetData => StoreKind::TargetData,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Key under which descriptors are grouped inside a store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OwnerKey {
    /// Model-output owner, parsed from a `<team>-<model>` directory.
    TeamModel { team: String, model: String },
    /// Target-data owner, the normalised target name.
    Target { name: String },
    /// The single bucket of a flat store.
    Flat,
}

impl OwnerKey {
    /// Name of the single bucket in flat stores.
    pub const FLAT_KEY: &'static str = "changes";

    pub fn team_model(team: impl Into<String>, model: impl Into<String>) -> Self {
        Self::TeamModel {
            team: team.into(),
            model: model.into(),
        }
    }

    pub fn target(name: impl Into<String>) -> Self {
        Self::Target { name: name.into() }
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerKey::TeamModel { team, model } => write!(f, "{team}/{model}"),
            OwnerKey::Target { name } => f.write_str(name),
            OwnerKey::Flat => f.write_str(Self::FLAT_KEY),
        }
    }
}

/// Remote endpoint category a payload is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Forecast,
    Target,
    Metadata,
    Evaluation,
}

impl Channel {
    /// Path segment appended to the webhook base URL.
    pub fn path_segment(self) -> &'static str {
        match self {
            Channel::Forecast => "forecast/",
            Channel::Target => "truth/",
            Channel::Metadata => "model-metadata/",
            Channel::Evaluation => "evaluation/",
        }
    }

    /// Store whose pending changes are delivered on this channel.
    pub fn default_store(self) -> StoreKind {
        match self {
            Channel::Forecast => StoreKind::ModelOutput,
            Channel::Target => StoreKind::TargetData,
            Channel::Metadata => StoreKind::ModelMetadata,
            Channel::Evaluation => StoreKind::Evaluation,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Forecast => write!(f, "forecast"),
            Channel::Target => write!(f, "target"),
            Channel::Metadata => write!(f, "metadata"),
            Channel::Evaluation => write!(f, "evaluation"),
        }
    }
}

impl FromStr for Channel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "forecast" => Ok(Channel::Forecast),
            "target" | "truth" => Ok(Channel::Target),
            "metadata" | "model-metadata" => Ok(Channel::Metadata),
            "evaluation" | "scoring" => Ok(Channel::Evaluation),
            other => Err(CoreError::Unknown {
                what: "channel",
                value: other.to_owned(),
            }),
        }
    }
}

/// Physical store file, one per category plus auxiliary domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKind {
    ModelOutput,
    ModelMetadata,
    TargetData,
    Ensemble,
    Evaluation,
}

impl StoreKind {
    pub fn all() -> &'static [StoreKind] {
        &[
            StoreKind::ModelOutput,
            StoreKind::ModelMetadata,
            StoreKind::TargetData,
            StoreKind::Ensemble,
            StoreKind::Evaluation,
        ]
    }

    /// Category whose owner rules this store follows.
    pub fn category(self) -> Category {
        match self {
            StoreKind::ModelOutput | StoreKind::Ensemble => Category::ModelOutput,
            StoreKind::ModelMetadata | StoreKind::Evaluation => Category::ModelMetadata,
            StoreKind::TargetData => Category::TargetData,
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::ModelOutput => write!(f, "model-output"),
            StoreKind::ModelMetadata => write!(f, "model-metadata"),
            StoreKind::TargetData => write!(f, "target"),
            StoreKind::Ensemble => write!(f, "ensemble"),
            StoreKind::Evaluation => write!(f, "evaluation"),
        }
    }
}

impl FromStr for StoreKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "model-output" => Ok(StoreKind::ModelOutput),
            "model-metadata" => Ok(StoreKind::ModelMetadata),
            "target" | "target-data" => Ok(StoreKind::TargetData),
            "ensemble" => Ok(StoreKind::Ensemble),
            "evaluation" => Ok(StoreKind::Evaluation),
            other => Err(CoreError::Unknown {
                what: "storage type",
                value: other.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
