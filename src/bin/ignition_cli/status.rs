use anyhow::Result;
use clap::Parser;

use ignition_core::{load_deployment_state, status};
use ignition_deploy::project::Project;

use super::existing_deployment;
use super::output::print_json;

#[derive(Parser, Debug)]
pub struct StatusCmd {
    /// Deployment to inspect (default: list deployments)
    deployment_id: Option<String>,
}

impl StatusCmd {
    pub fn execute(&self, project: &Project, json_output: bool) -> Result<()> {
        let Some(id) = &self.deployment_id else {
            let ids = project.deployment_ids()?;
            if json_output {
                print_json(&serde_json::json!({ "deployments": ids }))?;
            } else if ids.is_empty() {
                println!("No deployments found in {}", project.deployments_root.display());
            } else {
                for id in ids {
                    println!("{}", id);
                }
            }
            return Ok(());
        };

        let dir = ignition_store::paths::deployment_dir(&project.deployments_root, id);
        let loader = existing_deployment(&dir, id)?;
        let state = load_deployment_state(loader.as_ref())?;
        let report = status(&state);

        if json_output {
            print_json(&report)?;
        } else {
            print!("{}", report.render());
        }
        Ok(())
    }
}
