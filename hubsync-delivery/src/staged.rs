//! Staged upload: deliver the parts listed in the staging manifest, one per
//! request, and delete each part once the endpoint acknowledged it.

use hubsync_core::{Channel, OwnerKey};
use hubsync_store::Staging;

use crate::client::Deliver;
use crate::error::DeliveryError;
use crate::payload::{Payload, PayloadBody};
use crate::reconcile::{deliver_batches, Batch, CycleReport};

/// Upload every staged part on the evaluation channel.
///
/// Acknowledged parts are removed from disk and from the manifest; the
/// manifest and staging directory go away once nothing is left.
pub fn upload_staged(
    staging: &Staging,
    client: &dyn Deliver,
    disease: &str,
) -> Result<CycleReport, DeliveryError> {
    let parts = staging.parts()?;
    if parts.is_empty() {
        tracing::info!(dir = %staging.dir().display(), "no staged parts");
        return Ok(CycleReport::nothing_pending());
    }

    let mut batches = Vec::with_capacity(parts.len());
    for part in parts {
        let body = PayloadBody::Changes(vec![part.clone()]);
        batches.push(Batch {
            entries: vec![(OwnerKey::Flat, part)],
            body: Payload::new(disease, body).to_bytes()?,
        });
    }

    let report = deliver_batches(client, Channel::Evaluation, batches);
    let remaining: Vec<_> = report.retained.iter().map(|(_, d)| d.clone()).collect();
    let emptied = staging.settle(&report.delivered, &remaining)?;
    tracing::info!(
        uploaded = report.delivered.len(),
        remaining = remaining.len(),
        emptied,
        "staged upload finished"
    );
    Ok(report)
}
