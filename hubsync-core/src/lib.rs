//! hubsync core library: domain types, path classification, configuration.
//!
//! - [`types`]: descriptors, categories, owner keys, channels, store kinds
//! - [`classify`]: changed-path classification and owner derivation
//! - [`config`]: store layout and webhook settings
//! - [`error`]: [`CoreError`]

pub mod classify;
pub mod config;
pub mod error;
pub mod types;

pub use classify::{classify, derive_owner, paths_outside, Classification, DiscardReason};
pub use config::{HubConfig, StagingConfig, StoreFiles, WebhookConfig};
pub use error::CoreError;
pub use types::{Category, Channel, ChangeDescriptor, OwnerKey, StoreKind};
