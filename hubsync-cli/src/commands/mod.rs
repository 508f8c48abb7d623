//! Subcommands and the arguments they share.

pub mod check_paths;
pub mod clear;
pub mod deliver;
pub mod init;
pub mod pending;
pub mod stage;
pub mod store;
pub mod upload;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use hubsync_core::{HubConfig, WebhookConfig};
use hubsync_delivery::RunResult;

/// Flags accepted by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// YAML configuration file; built-in defaults apply when omitted.
    #[arg(long, global = true, env = "HUBSYNC_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Hub checkout root, overriding the configured one.
    #[arg(long, global = true, value_name = "DIR")]
    pub hub_path: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn load(&self) -> Result<HubConfig> {
        let mut config = match &self.config {
            Some(path) => HubConfig::load_at(path)
                .with_context(|| format!("failed to load config '{}'", path.display()))?,
            None => HubConfig::default(),
        };
        if let Some(hub_path) = &self.hub_path {
            config.hub_path = hub_path.clone();
        }
        Ok(config)
    }
}

/// Webhook settings, normally injected by the CI job's environment.
#[derive(Args, Debug)]
pub struct WebhookArgs {
    /// Base URL of the ingestion webhook.
    #[arg(long, env = "webhook_url")]
    pub webhook_url: Option<String>,

    /// Shared secret used to sign payloads.
    #[arg(long, env = "webhook_secret", hide_env_values = true)]
    pub webhook_secret: Option<String>,

    /// Disease name sent with every payload.
    #[arg(long, env = "disease_name")]
    pub disease: Option<String>,
}

impl WebhookArgs {
    pub fn config(&self) -> Option<WebhookConfig> {
        WebhookConfig::from_parts(
            self.webhook_url.clone(),
            self.webhook_secret.clone(),
            self.disease.clone(),
        )
    }
}

/// Changed paths given positionally and/or as one whitespace-separated list.
#[derive(Args, Debug)]
pub struct ChangesArgs {
    /// Changed paths, relative to the hub root.
    pub paths: Vec<String>,

    /// Whitespace-separated list of changed paths.
    #[arg(long, value_name = "LIST")]
    pub changes: Option<String>,
}

impl ChangesArgs {
    pub fn collect(&self) -> Vec<String> {
        let mut all = self.paths.clone();
        if let Some(raw) = &self.changes {
            all.extend(hubsync_store::split_changes(raw));
        }
        all
    }
}

/// Print `result` as JSON and append `run_results=<json>` to the file named
/// by `GITHUB_OUTPUT`, when set.
pub fn emit_run_result(result: &RunResult) -> Result<()> {
    let json = serde_json::to_string(result).context("failed to serialize run result")?;
    println!("{json}");

    let Some(path) = std::env::var_os("GITHUB_OUTPUT") else {
        return Ok(());
    };
    let path = PathBuf::from(path);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("cannot open GITHUB_OUTPUT '{}'", path.display()))?;
    writeln!(file, "run_results={json}")
        .with_context(|| format!("cannot write GITHUB_OUTPUT '{}'", path.display()))?;
    Ok(())
}
