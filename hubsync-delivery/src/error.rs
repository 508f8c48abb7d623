//! Error types for hubsync-delivery.
//!
//! Only local failures are errors here. Anything that goes wrong on the
//! wire is an [`Outcome`](crate::response::Outcome) value instead.

use thiserror::Error;

use hubsync_core::{Channel, OwnerKey};
use hubsync_store::StoreError;

/// Errors that abort a delivery cycle before the store is mutated, or while
/// writing it back.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Reading or rewriting a store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A pending entry's owner cannot be expressed on the target channel.
    #[error("owner '{owner}' cannot be delivered on the {channel} channel")]
    ChannelMismatch { channel: Channel, owner: OwnerKey },

    /// Payload serialization failed.
    #[error("payload JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
