use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use ignition_core::resolve::ResolveContext;
use ignition_core::{
    load_deployment_state, reconcile, BasicStrategy, DirectoryArtifactResolver, ReconcileContext,
};
use ignition_deploy::project::{load_module, load_parameters, Project};
use ignition_transport::{EthRpc, HttpRpcClient};

use super::output::print_json;
use super::{existing_deployment, parse_sender};

#[derive(Parser, Debug)]
pub struct ReconcileCmd {
    /// Module definition (JSON)
    module: PathBuf,

    /// Recorded deployment to check against (default: chain-<chain id>)
    #[arg(long)]
    deployment_id: Option<String>,

    /// Module parameters (JSON object keyed by module id)
    #[arg(long)]
    parameters: Option<PathBuf>,

    /// Default sender (default: the node's first account)
    #[arg(long)]
    from: Option<String>,

    /// Strategy the next run would use
    #[arg(long, default_value = BasicStrategy::NAME)]
    strategy: String,
}

impl ReconcileCmd {
    pub async fn execute(&self, project: &Project, rpc_url: &str, json_output: bool) -> Result<()> {
        let module = load_module(&self.module)?;
        let parameters = load_parameters(self.parameters.as_deref())?;

        let rpc = HttpRpcClient::new(rpc_url);
        let chain_id = rpc
            .chain_id()
            .await
            .with_context(|| format!("Failed to reach {}", rpc_url))?;
        let accounts = rpc.accounts().await?;
        let default_sender = parse_sender(self.from.as_deref())?
            .or_else(|| accounts.first().copied())
            .ok_or_else(|| anyhow!("The network has no accounts; pass --from"))?;

        let dir = project.deployment_dir(self.deployment_id.as_deref(), chain_id);
        let id = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let loader = existing_deployment(&dir, &id)?;
        let state = load_deployment_state(loader.as_ref())?;
        let resolver = DirectoryArtifactResolver::new(&project.artifacts_dir);

        let result = reconcile(
            &module,
            &ReconcileContext {
                deployment: &state,
                resolve: ResolveContext::new(&parameters, &accounts, default_sender),
                resolver: &resolver,
                loader: loader.as_ref(),
                strategy: &self.strategy,
            },
        );

        if json_output {
            print_json(&result)?;
        } else if result.is_ok() {
            println!("\x1b[32m✓ {} matches deployment {}\x1b[0m", module.id, id);
        } else {
            println!("\x1b[31m✗ {} no longer matches deployment {}\x1b[0m\n", module.id, id);
            for failure in &result.failures {
                println!("  {}: {}", failure.future_id, failure.failure);
            }
        }
        if !json_output {
            for missing in &result.missing_execution_states {
                println!(
                    "  \x1b[33mwarning\x1b[0m: {} is recorded but no longer part of the module",
                    missing
                );
            }
        }

        if result.is_ok() {
            Ok(())
        } else {
            Err(anyhow!("{} futures failed reconciliation", result.failures.len()))
        }
    }
}
