use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use ignition_core::{compute_batches, load_deployment_state, DeploymentState};
use ignition_deploy::project::{load_module, Project};

use super::existing_deployment;
use super::output::{format_batches, print_json};

#[derive(Parser, Debug)]
pub struct BatchesCmd {
    /// Module definition (JSON)
    module: PathBuf,

    /// Leave out futures this deployment has already completed
    #[arg(long)]
    deployment_id: Option<String>,
}

impl BatchesCmd {
    pub fn execute(&self, project: &Project, json_output: bool) -> Result<()> {
        let module = load_module(&self.module)?;
        let state = match &self.deployment_id {
            Some(id) => {
                let dir = ignition_store::paths::deployment_dir(&project.deployments_root, id);
                let loader = existing_deployment(&dir, id)?;
                load_deployment_state(loader.as_ref())?
            }
            None => DeploymentState::default(),
        };
        let batches = compute_batches(&module, &state);

        if json_output {
            print_json(&serde_json::json!({
                "module": module.id,
                "batches": batches,
            }))?;
        } else {
            print!("{}", format_batches(&batches));
        }
        Ok(())
    }
}
