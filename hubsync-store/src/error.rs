//! Error types for hubsync-store.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from store operations.
///
/// Every variant is fatal to the current run: nothing here is recovered
/// locally.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store file has never been initialized.
    #[error("store not found at {path}; initialize it with `hubsync init`")]
    StoreNotFound { path: PathBuf },

    /// An owner key could not be derived, or does not fit the store layout.
    #[error("invalid owner '{owner}' for {store} store: {reason}")]
    InvalidOwner {
        owner: String,
        store: &'static str,
        reason: String,
    },

    /// The persisted document is not a valid store of this layout.
    #[error("corrupt store at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The change list handed to ingestion contained no paths.
    #[error("empty change list")]
    EmptyChanges,

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (write path).
    #[error("store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
