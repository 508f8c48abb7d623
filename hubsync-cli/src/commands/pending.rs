//! `hubsync pending`: what is waiting to be delivered.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use hubsync_core::{HubConfig, StoreKind};
use hubsync_store::open_store;

/// Arguments for `hubsync pending`.
#[derive(Args, Debug)]
pub struct PendingArgs {
    /// Only this store; every store when omitted.
    #[arg(long, value_name = "KIND")]
    pub storage_type: Option<StoreKind>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StoreSummary {
    store: String,
    initialized: bool,
    changes: Vec<PendingChange>,
}

#[derive(Debug, Serialize, Tabled)]
struct PendingChange {
    #[tabled(rename = "owner")]
    owner: String,
    #[tabled(rename = "change")]
    change: String,
}

impl PendingArgs {
    pub fn run(self, config: &HubConfig) -> Result<()> {
        let kinds: Vec<StoreKind> = match self.storage_type {
            Some(kind) => vec![kind],
            None => StoreKind::all().to_vec(),
        };

        let mut summaries = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let store = open_store(config, kind);
            if !store.path().exists() {
                summaries.push(StoreSummary {
                    store: kind.to_string(),
                    initialized: false,
                    changes: Vec::new(),
                });
                continue;
            }
            let changes = store
                .pending()
                .with_context(|| format!("failed to read {kind} store"))?
                .into_iter()
                .map(|(owner, d)| PendingChange {
                    owner: owner.to_string(),
                    change: d.0,
                })
                .collect();
            summaries.push(StoreSummary {
                store: kind.to_string(),
                initialized: true,
                changes,
            });
        }

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summaries).context("failed to serialize pending JSON")?
            );
            return Ok(());
        }
        print_tables(summaries);
        Ok(())
    }
}

fn print_tables(summaries: Vec<StoreSummary>) {
    for summary in summaries {
        let heading = summary.store.to_uppercase().bold();
        if !summary.initialized {
            println!("{heading} {}", "not initialized".bright_black());
            continue;
        }
        if summary.changes.is_empty() {
            println!("{heading} {}", "nothing pending".green());
            continue;
        }
        println!("{heading} {}", format!("{} pending", summary.changes.len()).yellow());
        let mut table = Table::new(summary.changes);
        table.with(Style::rounded());
        println!("{table}");
    }
}
