//! `hubsync init [--storage-type <kind>]`

use anyhow::{Context, Result};
use clap::Args;

use hubsync_core::{HubConfig, StoreKind};
use hubsync_store::open_store;

/// Create empty store files.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Only this store; every store when omitted.
    #[arg(long, value_name = "KIND")]
    pub storage_type: Option<StoreKind>,
}

impl InitArgs {
    pub fn run(self, config: &HubConfig) -> Result<()> {
        let kinds: Vec<StoreKind> = match self.storage_type {
            Some(kind) => vec![kind],
            None => StoreKind::all().to_vec(),
        };

        for kind in kinds {
            let store = open_store(config, kind);
            let created = store
                .init()
                .with_context(|| format!("failed to init {kind} store"))?;
            if created {
                println!("✓ Created {}", store.path().display());
            } else {
                println!("· {} already exists", store.path().display());
            }
        }
        Ok(())
    }
}
