//! ignition: resumable deployments of EVM contract modules
//!
//! ## Commands
//!
//! - **deploy**: Run a module against a JSON-RPC node, resuming any recorded progress
//! - **status**: Show the recorded state of a deployment
//! - **batches**: Show the batches a module would execute in
//! - **wipe**: Forget a future so that the next run starts it again
//! - **reconcile**: Check a module against a recorded deployment without sending anything
//!
//! ## Example Usage
//!
//! ```bash
//! # Deploy to a local node
//! ignition deploy ./modules/token.json --parameters ./params.json
//!
//! # Inspect the result
//! ignition status chain-31337
//!
//! # Retry a failed call
//! ignition wipe chain-31337 Token#Token.mint
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use ignition_deploy::project::Project;

mod ignition_cli;

use ignition_cli::{
    batches::BatchesCmd, deploy::DeployCmd, reconcile::ReconcileCmd, status::StatusCmd,
    wipe::WipeCmd,
};

#[derive(Parser)]
#[command(
    name = "ignition",
    author,
    version,
    about = "Resumable deployments of EVM contract modules",
    long_about = "Deploys modules of interdependent contract futures, journaling every step \
                  so that interrupted deployments resume where they stopped."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON-RPC endpoint of the target network
    #[arg(long, global = true, default_value = "http://127.0.0.1:8545")]
    rpc_url: String,

    /// Directory holding one subdirectory per deployment
    #[arg(long, global = true)]
    deployments_dir: Option<PathBuf>,

    /// Directory of compiled contract artifacts
    #[arg(long, global = true)]
    artifacts: Option<PathBuf>,

    /// Execution config file (default: $IGNITION_HOME/config.json if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a module, resuming an existing deployment
    Deploy(DeployCmd),

    /// Show the recorded state of a deployment
    Status(StatusCmd),

    /// Show the execution batches of a module
    Batches(BatchesCmd),

    /// Clear the execution state of a future
    Wipe(WipeCmd),

    /// Check a module against a recorded deployment
    Reconcile(ReconcileCmd),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Deploy(_) => "deploy",
            Commands::Status(_) => "status",
            Commands::Batches(_) => "batches",
            Commands::Wipe(_) => "wipe",
            Commands::Reconcile(_) => "reconcile",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        command,
        rpc_url,
        deployments_dir,
        artifacts,
        config,
        json,
        log_level,
    } = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let project = Project::new(deployments_dir, artifacts, config);
    debug!(command = command.name(), root = %project.deployments_root.display(), "Starting");

    match command {
        Commands::Deploy(cmd) => cmd.execute(&project, &rpc_url, json).await,
        Commands::Status(cmd) => cmd.execute(&project, json),
        Commands::Batches(cmd) => cmd.execute(&project, json),
        Commands::Wipe(cmd) => cmd.execute(&project, json),
        Commands::Reconcile(cmd) => cmd.execute(&project, &rpc_url, json).await,
    }
}
