//! `hubsync stage`: split files into bounded parts for upload.

use anyhow::{bail, Context, Result};
use clap::Args;

use hubsync_core::{ChangeDescriptor, HubConfig};
use hubsync_store::Staging;

use super::ChangesArgs;

/// Arguments for `hubsync stage`.
#[derive(Args, Debug)]
pub struct StageArgs {
    #[command(flatten)]
    pub changes: ChangesArgs,
}

impl StageArgs {
    pub fn run(self, config: &HubConfig) -> Result<()> {
        let files: Vec<ChangeDescriptor> = self
            .changes
            .collect()
            .into_iter()
            .map(ChangeDescriptor::from)
            .collect();
        if files.is_empty() {
            bail!("no files to stage");
        }

        let staging = Staging::from_config(config);
        let parts = staging.stage(&files).context("staging failed")?;

        println!(
            "✓ Staged {} part(s) under {}",
            parts.len(),
            staging.dir().display()
        );
        for part in &parts {
            println!("  ✎  {part}");
        }
        Ok(())
    }
}
