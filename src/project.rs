//! Locating configuration, modules, parameters and deployment directories.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignition_core::module::definition::load_module_definition;
use ignition_core::{ExecutionConfig, IgnitionModule, ModuleCache, ModuleParameters};
use ignition_store::paths::{default_deployment_id, deployment_dir, DEFAULT_DEPLOYMENTS_DIR};
use ignition_types::env_utils::{env_var, prefixed};

/// User-level directory holding `config.json`.
pub fn ignition_home() -> PathBuf {
    env_var::<String>(&prefixed("HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".ignition")
        })
}

/// Where deployments live for one invocation.
#[derive(Debug, Clone)]
pub struct Project {
    pub deployments_root: PathBuf,
    pub artifacts_dir: PathBuf,
    pub config_path: Option<PathBuf>,
}

impl Project {
    pub fn new(deployments_root: Option<PathBuf>, artifacts_dir: Option<PathBuf>, config: Option<PathBuf>) -> Self {
        let home_config = ignition_home().join("config.json");
        Self {
            deployments_root: deployments_root.unwrap_or_else(|| PathBuf::from(DEFAULT_DEPLOYMENTS_DIR)),
            artifacts_dir: artifacts_dir.unwrap_or_else(|| PathBuf::from("artifacts")),
            config_path: config.or_else(|| home_config.exists().then_some(home_config)),
        }
    }

    pub fn execution_config(&self) -> Result<ExecutionConfig> {
        ExecutionConfig::load(self.config_path.as_deref())
    }

    /// Directory of a named deployment, or of the chain's default one.
    pub fn deployment_dir(&self, deployment_id: Option<&str>, chain_id: u64) -> PathBuf {
        match deployment_id {
            Some(id) => deployment_dir(&self.deployments_root, id),
            None => deployment_dir(&self.deployments_root, &default_deployment_id(chain_id)),
        }
    }

    /// Deployment ids that have a directory under the deployments root.
    pub fn deployment_ids(&self) -> Result<Vec<String>> {
        if !self.deployments_root.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        let entries = std::fs::read_dir(&self.deployments_root)
            .with_context(|| format!("Failed to read {}", self.deployments_root.display()))?;
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Build a module from its JSON definition.
pub fn load_module(path: &Path) -> Result<IgnitionModule> {
    let definition = load_module_definition(path)?;
    let mut cache = ModuleCache::new();
    definition
        .build(&mut cache)
        .with_context(|| format!("Failed to build module {}", path.display()))
}

/// Read `{ "<module id>": { "<name>": value } }` parameters, if a file is given.
pub fn load_parameters(path: Option<&Path>) -> Result<ModuleParameters> {
    let Some(path) = path else {
        return Ok(ModuleParameters::new());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read parameters {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse parameters {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deployment_dirs() {
        let project = Project::new(Some(PathBuf::from("/tmp/deployments")), None, None);
        assert_eq!(
            project.deployment_dir(None, 31337),
            PathBuf::from("/tmp/deployments/chain-31337")
        );
        assert_eq!(
            project.deployment_dir(Some("staging"), 31337),
            PathBuf::from("/tmp/deployments/staging")
        );
        assert_eq!(project.artifacts_dir, PathBuf::from("artifacts"));
    }

    #[test]
    fn test_deployment_ids() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let project = Project::new(Some(dir.path().join("deployments")), None, None);
        assert!(project.deployment_ids()?.is_empty());

        std::fs::create_dir_all(dir.path().join("deployments/chain-1"))?;
        std::fs::create_dir_all(dir.path().join("deployments/chain-31337"))?;
        assert_eq!(project.deployment_ids()?, vec!["chain-1", "chain-31337"]);
        Ok(())
    }

    #[test]
    fn test_load_parameters() -> Result<()> {
        assert!(load_parameters(None)?.is_empty());

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("params.json");
        std::fs::write(&path, r#"{"Token": {"supply": 5}, "$global": {"owner": 1}}"#)?;
        let params = load_parameters(Some(&path))?;
        assert_eq!(params["Token"]["supply"], json!(5));
        assert_eq!(params["$global"]["owner"], json!(1));

        std::fs::write(&path, "[1, 2]")?;
        assert!(load_parameters(Some(&path)).is_err());
        Ok(())
    }

    #[test]
    fn test_load_module() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("token.json");
        std::fs::write(
            &path,
            json!({
                "id": "Token",
                "futures": [
                    {"type": "contract", "contract": "Token", "args": [1000]},
                    {"type": "call", "contract": "Token", "function": "mint", "args": [{"account": 1}]}
                ]
            })
            .to_string(),
        )?;
        let module = load_module(&path)?;
        assert_eq!(module.id, "Token");
        assert!(module.futures.contains_key("Token#Token"));
        assert!(module.futures.contains_key("Token#Token.mint"));
        Ok(())
    }
}
