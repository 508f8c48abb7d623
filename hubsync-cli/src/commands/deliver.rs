//! `hubsync deliver`: one reconciliation cycle for a store.

use anyhow::{Context, Result};
use clap::Args;

use hubsync_core::{Channel, HubConfig, StoreKind};
use hubsync_delivery::{DeliveryMode, ReconciliationLoop, RunResult, SignedDeliveryClient};
use hubsync_store::open_store;

use super::{emit_run_result, WebhookArgs};

/// Arguments for `hubsync deliver`.
#[derive(Args, Debug)]
pub struct DeliverArgs {
    /// Endpoint: forecast, target, metadata or evaluation.
    #[arg(long)]
    pub channel: Channel,

    /// Store to read from; the channel's own store when omitted.
    #[arg(long, value_name = "KIND")]
    pub storage_type: Option<StoreKind>,

    /// Send one request per change instead of one per store.
    #[arg(long)]
    pub per_change: bool,

    #[command(flatten)]
    pub webhook: WebhookArgs,
}

impl DeliverArgs {
    pub fn run(self, config: &HubConfig) -> Result<()> {
        let Some(webhook) = self.webhook.config() else {
            tracing::warn!("webhook URL or secret missing, skipping delivery");
            return emit_run_result(&RunResult::invalid());
        };

        let kind = self.storage_type.unwrap_or_else(|| self.channel.default_store());
        let store = open_store(config, kind);
        let client = SignedDeliveryClient::from_config(&webhook);

        let mut cycle =
            ReconciliationLoop::new(store.as_ref(), &client, self.channel, webhook.disease.clone());
        if self.per_change {
            cycle = cycle.with_mode(DeliveryMode::PerDescriptor);
        }
        let report = cycle
            .run()
            .with_context(|| format!("delivery of {kind} store failed"))?;

        eprintln!(
            "{} delivered, {} retained, {} request(s)",
            report.delivered.len(),
            report.retained.len(),
            report.requests
        );
        emit_run_result(&report.result)
    }
}
