//! # hubsync-delivery
//!
//! Delivers pending changes to the hub's webhook endpoints and reconciles
//! the stores with what the endpoint reported.
//!
//! - [`SignedDeliveryClient`] posts one HMAC-signed payload per call
//! - [`interpret`] turns a reply into an [`Outcome`]
//! - [`ReconciliationLoop`] runs one read-deliver-reseed cycle
//! - [`upload_staged`] delivers staged parts and cleans up after them

pub mod client;
pub mod error;
pub mod payload;
pub mod reconcile;
pub mod response;
pub mod signature;
pub mod staged;

pub use client::{Deliver, DeliveryOutcome, SignedDeliveryClient};
pub use error::DeliveryError;
pub use payload::{ForecastRecord, Payload, PayloadBody, TargetRecord};
pub use reconcile::{settle, CycleReport, DeliveryMode, ReconciliationLoop, SettleAction};
pub use response::{
    interpret, interpret_outcome, FailedIngestions, Outcome, RunResult, RunStatus,
};
pub use signature::{sign, verify, SIGNATURE_HEADER};
pub use staged::upload_staged;
