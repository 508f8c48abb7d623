//! hubsync: track forecast-hub submissions and deliver them to the
//! ingestion webhooks.
//!
//! # Usage
//!
//! ```text
//! hubsync store [paths…] [--changes "a b c"] [--ensemble]
//! hubsync clear --storage-type <kind> [--run-results <json>]
//! hubsync init [--storage-type <kind>]
//! hubsync deliver --channel <forecast|target|metadata|evaluation>
//! hubsync stage [paths…] [--changes "a b"]
//! hubsync upload
//! hubsync pending [--storage-type <kind>] [--json]
//! hubsync check-paths [paths…] [--changes "a b"]
//! ```
//!
//! Global flags: `--config <yaml>`, `--hub-path <dir>`.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    check_paths::CheckPathsArgs, clear::ClearArgs, deliver::DeliverArgs, init::InitArgs,
    pending::PendingArgs, stage::StageArgs, store::StoreArgs, upload::UploadArgs, GlobalArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "hubsync",
    version,
    about = "Track hub submissions and reconcile them with the ingestion webhooks",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify changed paths and merge them into the change stores.
    Store(StoreArgs),

    /// Settle a store against the run result of a delivery step.
    Clear(ClearArgs),

    /// Create empty store files that do not exist yet.
    Init(InitArgs),

    /// Deliver one store's pending changes and keep what failed.
    Deliver(DeliverArgs),

    /// Split files into bounded parts under the staging directory.
    Stage(StageArgs),

    /// Upload staged parts and remove the acknowledged ones.
    Upload(UploadArgs),

    /// List pending changes.
    Pending(PendingArgs),

    /// Fail when a changed path lies outside the allowed folders.
    CheckPaths(CheckPathsArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.global.load()?;
    match cli.command {
        Commands::Store(args) => args.run(&config),
        Commands::Clear(args) => args.run(&config),
        Commands::Init(args) => args.run(&config),
        Commands::Deliver(args) => args.run(&config),
        Commands::Stage(args) => args.run(&config),
        Commands::Upload(args) => args.run(&config),
        Commands::Pending(args) => args.run(&config),
        Commands::CheckPaths(args) => args.run(&config),
    }
}

/// Log to stderr so stdout carries only command output.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
