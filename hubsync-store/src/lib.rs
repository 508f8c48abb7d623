//! # hubsync-store
//!
//! JSON-backed change stores with atomic whole-file writes.
//!
//! [`ingest`] routes a PR's changed paths into the per-category stores;
//! [`ChangeStore`] exposes merge / read / clear / reseed on one store;
//! [`Staging`] splits large files into bounded parts for upload.

mod atomic;
pub mod error;
pub mod ingest;
pub mod layout;
pub mod staging;
pub mod store;

pub use error::StoreError;
pub use ingest::{ingest, ingest_evaluation, split_changes, IngestReport, ModelOutputTarget, Rejected};
pub use layout::{
    FlatLayout, FlatState, ModelOutputLayout, ModelOutputState, ModelRecord, StoreLayout,
    TargetLayout, TargetRecord, TargetState,
};
pub use staging::Staging;
pub use store::{open_store, ChangeStore, TrackedStore};
