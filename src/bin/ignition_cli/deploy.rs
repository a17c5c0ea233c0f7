use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::info;

use ignition_core::{deploy, strategy_by_name, BasicStrategy, DeployConfig, DirectoryArtifactResolver};
use ignition_deploy::project::{load_module, load_parameters, Project};
use ignition_store::{DeploymentLoader, EphemeralDeploymentLoader, FileDeploymentLoader};
use ignition_transport::{EthRpc, HttpRpcClient, MockChain};

use super::output::{format_deployment_result, print_json};
use super::parse_sender;

#[derive(Parser, Debug)]
pub struct DeployCmd {
    /// Module definition (JSON)
    module: PathBuf,

    /// Module parameters (JSON object keyed by module id)
    #[arg(long)]
    parameters: Option<PathBuf>,

    /// Deployment to create or resume (default: chain-<chain id>)
    #[arg(long)]
    deployment_id: Option<String>,

    /// Default sender (default: the node's first account)
    #[arg(long)]
    from: Option<String>,

    /// Execution strategy for new futures
    #[arg(long, default_value = BasicStrategy::NAME)]
    strategy: String,

    /// Confirmations required before a transaction counts as final
    #[arg(long)]
    confirmations: Option<u64>,

    /// Run against an in-memory chain and keep nothing on disk
    #[arg(long)]
    dry_run: bool,
}

impl DeployCmd {
    pub async fn execute(&self, project: &Project, rpc_url: &str, json_output: bool) -> Result<()> {
        let module = load_module(&self.module)?;
        let parameters = load_parameters(self.parameters.as_deref())?;
        let mut execution = project.execution_config()?;
        if let Some(confirmations) = self.confirmations {
            execution.required_confirmations = Some(confirmations);
        }

        let rpc: Arc<dyn EthRpc> = if self.dry_run {
            Arc::new(MockChain::default())
        } else {
            Arc::new(HttpRpcClient::new(rpc_url))
        };
        let chain_id = rpc
            .chain_id()
            .await
            .with_context(|| format!("Failed to reach {}", rpc_url))?;

        let dir = project.deployment_dir(self.deployment_id.as_deref(), chain_id);
        let loader: Arc<dyn DeploymentLoader> = if self.dry_run {
            Arc::new(EphemeralDeploymentLoader::new())
        } else {
            Arc::new(FileDeploymentLoader::new(&dir))
        };
        let resolver = Arc::new(DirectoryArtifactResolver::new(&project.artifacts_dir));
        info!(
            module = %module.id,
            chain_id,
            deployment = %dir.display(),
            dry_run = self.dry_run,
            "Starting deployment"
        );

        let config = DeployConfig {
            execution,
            parameters,
            default_sender: parse_sender(self.from.as_deref())?,
            strategy: strategy_by_name(&self.strategy)?,
        };
        let result = deploy(&module, rpc, resolver, loader, config).await?;

        let deployment = self
            .deployment_id
            .clone()
            .unwrap_or_else(|| ignition_store::paths::default_deployment_id(chain_id));
        if json_output {
            print_json(&result)?;
        } else {
            print!("{}", format_deployment_result(&result, &deployment));
        }

        if result.is_success() {
            Ok(())
        } else {
            Err(anyhow!("Deployment {} did not complete", deployment))
        }
    }
}
