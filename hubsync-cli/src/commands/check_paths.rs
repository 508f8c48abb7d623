//! `hubsync check-paths`: submission guard.

use anyhow::{bail, Result};
use clap::Args;

use hubsync_core::{paths_outside, HubConfig};

use super::ChangesArgs;

/// Arguments for `hubsync check-paths`.
#[derive(Args, Debug)]
pub struct CheckPathsArgs {
    #[command(flatten)]
    pub changes: ChangesArgs,
}

impl CheckPathsArgs {
    pub fn run(self, config: &HubConfig) -> Result<()> {
        let paths = self.changes.collect();
        let outside = paths_outside(&paths, &config.allowed_folders);
        if !outside.is_empty() {
            for path in &outside {
                println!("  ✗  {path}");
            }
            bail!("{} path(s) outside the allowed folders", outside.len());
        }
        println!("✓ All {} path(s) are within the allowed folders.", paths.len());
        Ok(())
    }
}
