//! Reconciliation cycle: read a store, deliver it, write back what failed.
//!
//! ```text
//! pending()  →  batches  →  send / interpret  →  reseed(retained)
//! ```
//!
//! Store errors abort the cycle. A failure while reading or building
//! payloads leaves the store untouched; delivery failures never abort,
//! they only decide what is retained. Retention is pessimistic: unless the
//! endpoint names the failed items, the whole batch and every unsent batch
//! stay in the store.

use std::collections::BTreeSet;

use hubsync_core::{derive_owner, ChangeDescriptor, Channel, OwnerKey, StoreKind};
use hubsync_store::TrackedStore;

use crate::client::Deliver;
use crate::error::DeliveryError;
use crate::payload::{Payload, PayloadBody};
use crate::response::{interpret_outcome, FailedIngestions, Outcome, RunResult, RunStatus};

/// How pending entries are split into requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Everything in one request.
    Batch,
    /// One request per descriptor, so failures are attributable.
    PerDescriptor,
}

impl DeliveryMode {
    pub fn for_channel(channel: Channel) -> Self {
        match channel {
            Channel::Evaluation => DeliveryMode::PerDescriptor,
            Channel::Forecast | Channel::Target | Channel::Metadata => DeliveryMode::Batch,
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub result: RunResult,
    pub delivered: Vec<ChangeDescriptor>,
    pub retained: Vec<(OwnerKey, ChangeDescriptor)>,
    pub requests: usize,
}

impl CycleReport {
    pub(crate) fn nothing_pending() -> Self {
        Self {
            result: RunResult::success("Nothing to deliver"),
            delivered: Vec::new(),
            retained: Vec::new(),
            requests: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Batch delivery (shared with the staged upload)
// ---------------------------------------------------------------------------

pub(crate) struct Batch {
    pub entries: Vec<(OwnerKey, ChangeDescriptor)>,
    pub body: Vec<u8>,
}

/// Send `batches` in order and sort every entry into delivered or retained.
pub(crate) fn deliver_batches(
    client: &dyn Deliver,
    channel: Channel,
    batches: Vec<Batch>,
) -> CycleReport {
    let total: usize = batches.iter().map(|b| b.entries.len()).sum();
    let mut delivered = Vec::new();
    let mut retained = Vec::new();
    let mut failure: Option<String> = None;
    let mut listed = false;
    let mut last_message = String::new();
    let mut requests = 0;

    let mut batches = batches.into_iter();
    for batch in batches.by_ref() {
        requests += 1;
        let outcome = interpret_outcome(client.send(channel, &batch.body));
        tracing::info!(
            %channel,
            items = batch.entries.len(),
            outcome = outcome.kind(),
            "batch delivered"
        );

        match outcome {
            Outcome::Accepted { message } => {
                delivered.extend(batch.entries.into_iter().map(|(_, d)| d));
                last_message = message;
            }
            Outcome::PartialIngestion { message, failed } => {
                let failed: BTreeSet<&ChangeDescriptor> = failed.iter().collect();
                tracing::warn!(%channel, failed = failed.len(), %message, "partial ingestion");
                for (owner, d) in batch.entries {
                    if failed.contains(&d) {
                        retained.push((owner, d));
                    } else {
                        delivered.push(d);
                    }
                }
                failure.get_or_insert(message);
                listed = true;
            }
            other => {
                tracing::warn!(
                    %channel,
                    outcome = other.kind(),
                    message = other.message(),
                    "delivery failed, retaining batch and stopping"
                );
                retained.extend(batch.entries);
                failure.get_or_insert_with(|| other.message().to_owned());
                break;
            }
        }
    }
    for unsent in batches {
        retained.extend(unsent.entries);
    }

    let result = match failure {
        None => RunResult::success(last_message),
        Some(message) => {
            let failed = if !listed && retained.len() == total {
                FailedIngestions::NotAvailable
            } else {
                FailedIngestions::Items(retained.iter().map(|(_, d)| d.clone()).collect())
            };
            RunResult::error(message, failed)
        }
    };

    CycleReport {
        result,
        delivered,
        retained,
        requests,
    }
}

// ---------------------------------------------------------------------------
// ReconciliationLoop
// ---------------------------------------------------------------------------

/// One read-deliver-reseed pass over a store.
pub struct ReconciliationLoop<'a> {
    store: &'a dyn TrackedStore,
    client: &'a dyn Deliver,
    channel: Channel,
    disease: String,
    mode: DeliveryMode,
}

impl<'a> ReconciliationLoop<'a> {
    pub fn new(
        store: &'a dyn TrackedStore,
        client: &'a dyn Deliver,
        channel: Channel,
        disease: impl Into<String>,
    ) -> Self {
        Self {
            store,
            client,
            channel,
            disease: disease.into(),
            mode: DeliveryMode::for_channel(channel),
        }
    }

    pub fn with_mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Run the cycle. The store ends up holding exactly `report.retained`.
    pub fn run(&self) -> Result<CycleReport, DeliveryError> {
        let pending = self.store.pending()?;
        if pending.is_empty() {
            tracing::info!(store = %self.store.path().display(), "nothing pending");
            return Ok(CycleReport::nothing_pending());
        }

        let groups: Vec<Vec<(OwnerKey, ChangeDescriptor)>> = match self.mode {
            DeliveryMode::Batch => vec![pending],
            DeliveryMode::PerDescriptor => pending.into_iter().map(|e| vec![e]).collect(),
        };
        let batches = groups
            .into_iter()
            .map(|entries| self.batch(entries))
            .collect::<Result<Vec<_>, _>>()?;

        let report = deliver_batches(self.client, self.channel, batches);
        self.store.reseed_entries(&report.retained)?;
        tracing::info!(
            channel = %self.channel,
            delivered = report.delivered.len(),
            retained = report.retained.len(),
            status = %report.result.status,
            "cycle complete"
        );
        Ok(report)
    }

    fn batch(&self, entries: Vec<(OwnerKey, ChangeDescriptor)>) -> Result<Batch, DeliveryError> {
        let body = PayloadBody::for_channel(self.channel, &entries)?;
        let body = Payload::new(self.disease.clone(), body).to_bytes()?;
        Ok(Batch { entries, body })
    }
}

// ---------------------------------------------------------------------------
// Settle after an external delivery step
// ---------------------------------------------------------------------------

/// What [`settle`] did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleAction {
    Cleared,
    /// Cleared and re-stored this many listed failures.
    Reseeded(usize),
    /// Left untouched: nothing is known to be ingested.
    Retained,
}

/// Bring a store in line with a run result produced elsewhere.
///
/// Success clears the store. An error listing failed descriptors reduces the
/// store to those (owners are derived again from the paths). An error with
/// `"NA"`, or a skipped run, leaves the store as it is.
pub fn settle(
    store: &dyn TrackedStore,
    kind: StoreKind,
    result: &RunResult,
) -> Result<SettleAction, DeliveryError> {
    match (result.status, result.failed_items()) {
        (RunStatus::Success, _) => {
            store.clear()?;
            Ok(SettleAction::Cleared)
        }
        (RunStatus::Error, Some(items)) => {
            let category = kind.category();
            let mut entries = Vec::with_capacity(items.len());
            for d in items {
                match derive_owner(category, d) {
                    Ok(owner) => entries.push((owner, d.clone())),
                    Err(err) => tracing::warn!(path = %d, error = %err, "dropping failed path"),
                }
            }
            store.reseed_entries(&entries)?;
            Ok(SettleAction::Reseeded(entries.len()))
        }
        (RunStatus::Error, None) | (RunStatus::Invalid, _) => {
            tracing::info!(
                store = %store.path().display(),
                status = %result.status,
                "store left untouched"
            );
            Ok(SettleAction::Retained)
        }
    }
}
