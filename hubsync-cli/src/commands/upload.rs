//! `hubsync upload`: deliver staged parts and clean up after them.

use anyhow::{Context, Result};
use clap::Args;

use hubsync_core::HubConfig;
use hubsync_delivery::{upload_staged, RunResult, SignedDeliveryClient};
use hubsync_store::Staging;

use super::{emit_run_result, WebhookArgs};

/// Arguments for `hubsync upload`.
#[derive(Args, Debug)]
pub struct UploadArgs {
    #[command(flatten)]
    pub webhook: WebhookArgs,
}

impl UploadArgs {
    pub fn run(self, config: &HubConfig) -> Result<()> {
        let Some(webhook) = self.webhook.config() else {
            tracing::warn!("webhook URL or secret missing, skipping upload");
            return emit_run_result(&RunResult::invalid());
        };

        let staging = Staging::from_config(config);
        let client = SignedDeliveryClient::from_config(&webhook);
        let report =
            upload_staged(&staging, &client, &webhook.disease).context("staged upload failed")?;

        eprintln!(
            "{} part(s) uploaded, {} left in staging",
            report.delivered.len(),
            report.retained.len()
        );
        emit_run_result(&report.result)
    }
}
