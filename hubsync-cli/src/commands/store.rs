//! `hubsync store`: route a PR's changed paths into the change stores.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use hubsync_core::HubConfig;
use hubsync_store::{ingest, ingest_evaluation, ModelOutputTarget};

use super::ChangesArgs;

/// Arguments for `hubsync store`.
#[derive(Args, Debug)]
pub struct StoreArgs {
    #[command(flatten)]
    pub changes: ChangesArgs,

    /// Store model-output changes in the ensemble store instead.
    #[arg(long)]
    pub ensemble: bool,

    /// Store the paths as evaluation results, without classification.
    #[arg(long, conflicts_with = "ensemble")]
    pub evaluation: bool,
}

impl StoreArgs {
    pub fn run(self, config: &HubConfig) -> Result<()> {
        let paths = self.changes.collect();
        let report = if self.evaluation {
            ingest_evaluation(config, &paths)
        } else if self.ensemble {
            ingest(config, &paths, ModelOutputTarget::Ensemble)
        } else {
            ingest(config, &paths, ModelOutputTarget::ModelOutput)
        }
        .context("failed to store changes")?;

        for (kind, added) in &report.stored {
            println!("✓ {kind}: {added} new");
        }
        for (path, reason) in &report.discarded {
            println!("  ·  {path} ({reason:?})");
        }
        for rejected in &report.rejected {
            println!("  {}  {}: {}", "✗".red(), rejected.descriptor, rejected.reason);
        }

        if !report.is_clean() {
            bail!("{} path(s) rejected", report.rejected.len());
        }
        Ok(())
    }
}
