//! `hubsync clear`: settle a store after an external delivery step.

use anyhow::{Context, Result};
use clap::Args;

use hubsync_core::{HubConfig, StoreKind};
use hubsync_delivery::{settle, RunResult, SettleAction};
use hubsync_store::open_store;

/// Arguments for `hubsync clear`.
#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Store to settle: model-output, model-metadata, target, ensemble, evaluation.
    #[arg(long, value_name = "KIND")]
    pub storage_type: StoreKind,

    /// Run result JSON of the delivery step.
    #[arg(long, env = "not_ingested", value_name = "JSON")]
    pub run_results: String,
}

impl ClearArgs {
    pub fn run(self, config: &HubConfig) -> Result<()> {
        let raw = &self.run_results;
        let result = serde_json::from_str::<RunResult>(raw)
            .with_context(|| format!("invalid run result: {raw}"))?;

        let store = open_store(config, self.storage_type);
        let action = settle(store.as_ref(), self.storage_type, &result)
            .with_context(|| format!("failed to settle {} store", self.storage_type))?;

        match action {
            SettleAction::Cleared => println!("✓ {} store cleared", self.storage_type),
            SettleAction::Reseeded(n) => {
                println!("✓ {} store reset to {n} failed change(s)", self.storage_type)
            }
            SettleAction::Retained => println!(
                "· {} store kept ({} result, nothing confirmed)",
                self.storage_type, result.status
            ),
        }
        Ok(())
    }
}
