//! Error types for hubsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No owner key can be derived from a descriptor.
    #[error("invalid owner for '{descriptor}': {reason}")]
    InvalidOwner { descriptor: String, reason: String },

    /// A store kind or channel name did not match any known value.
    #[error("unknown {what} '{value}'")]
    Unknown { what: &'static str, value: String },

    /// I/O failure while reading configuration.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration parsed but holds an unusable value.
    #[error("invalid config at {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    /// Configuration YAML failed to parse.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl CoreError {
    pub(crate) fn invalid_owner(descriptor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOwner {
            descriptor: descriptor.into(),
            reason: reason.into(),
        }
    }
}
