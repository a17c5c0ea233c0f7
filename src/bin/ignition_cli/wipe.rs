use anyhow::Result;
use clap::Parser;

use ignition_core::{wipe, DeploymentStateCell};
use ignition_deploy::project::Project;

use super::existing_deployment;
use super::output::print_json;

#[derive(Parser, Debug)]
pub struct WipeCmd {
    /// Deployment holding the future
    deployment_id: String,

    /// Future to clear, e.g. `Token#Token.mint`
    future_id: String,
}

impl WipeCmd {
    pub fn execute(&self, project: &Project, json_output: bool) -> Result<()> {
        let dir = ignition_store::paths::deployment_dir(&project.deployments_root, &self.deployment_id);
        let loader = existing_deployment(&dir, &self.deployment_id)?;
        let mut cell = DeploymentStateCell::load(loader)?;
        wipe(&mut cell, &self.future_id)?;

        if json_output {
            print_json(&serde_json::json!({
                "success": true,
                "deploymentId": self.deployment_id,
                "futureId": self.future_id,
            }))?;
        } else {
            println!("{} state has been cleared", self.future_id);
        }
        Ok(())
    }
}
