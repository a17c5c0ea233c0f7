//! CLI subcommand implementations for ignition

pub mod batches;
pub mod deploy;
pub mod output;
pub mod reconcile;
pub mod status;
pub mod wipe;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use ignition_store::FileDeploymentLoader;
use ignition_types::address::parse_address;
use ignition_types::Address;

/// Loader for a deployment that must already exist.
pub fn existing_deployment(dir: &Path, deployment_id: &str) -> Result<Arc<FileDeploymentLoader>> {
    let loader = FileDeploymentLoader::new(dir);
    if !loader.exists() {
        bail!("Deployment {} not found in {}", deployment_id, dir.display());
    }
    Ok(Arc::new(loader))
}

pub fn parse_sender(from: Option<&str>) -> Result<Option<Address>> {
    from.map(|s| parse_address(s).ok_or_else(|| anyhow!("Invalid sender address '{}'", s)))
        .transpose()
}
