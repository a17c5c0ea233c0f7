//! Path utilities for the deployment directory layout.
//!
//! ```text
//! <deployments root>/<deployment id>/
//!     journal.jsonl
//!     deployed_addresses.json
//!     artifacts/<future id>.json
//!     artifacts/<future id>.dbg.json
//!     build-info/<build info id>.json
//! ```

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

/// Directory holding every deployment, relative to the project root.
pub const DEFAULT_DEPLOYMENTS_DIR: &str = "ignition/deployments";

/// Default deployment id for a chain.
pub fn default_deployment_id(chain_id: u64) -> String {
    format!("chain-{}", chain_id)
}

pub fn deployment_dir(deployments_root: &Path, deployment_id: &str) -> PathBuf {
    deployments_root.join(deployment_id)
}

pub fn journal_path(deployment_dir: &Path) -> PathBuf {
    deployment_dir.join("journal.jsonl")
}

pub fn deployed_addresses_path(deployment_dir: &Path) -> PathBuf {
    deployment_dir.join("deployed_addresses.json")
}

/// Future ids are `Module#Local`; `#` is valid in file names on every
/// platform we target, `/` and `:` are not.
fn file_stem(future_id: &str) -> String {
    future_id.replace(['/', '\\', ':'], "_")
}

pub fn artifact_path(deployment_dir: &Path, future_id: &str) -> PathBuf {
    deployment_dir
        .join("artifacts")
        .join(format!("{}.json", file_stem(future_id)))
}

pub fn debug_file_path(deployment_dir: &Path, future_id: &str) -> PathBuf {
    deployment_dir
        .join("artifacts")
        .join(format!("{}.dbg.json", file_stem(future_id)))
}

pub fn build_info_path(deployment_dir: &Path, build_info_id: &str) -> PathBuf {
    deployment_dir
        .join("build-info")
        .join(format!("{}.json", file_stem(build_info_id)))
}

/// Ensure all parent directories exist for a path.
pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow!("Failed to create directory {}: {}", parent.display(), e))?;
    }
    Ok(())
}

/// Write a file atomically (write to .tmp, then rename).
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|s| s.to_str()).unwrap_or("tmp")
    ));
    std::fs::write(&tmp_path, contents)
        .map_err(|e| anyhow!("Failed to write temp file {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        anyhow!(
            "Failed to rename {} to {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })?;
    Ok(())
}

/// Write a JSON file atomically. Deployment files are meant to be read and
/// committed by people, so they are pretty-printed.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut json =
        serde_json::to_vec_pretty(value).map_err(|e| anyhow!("Failed to serialize JSON: {}", e))?;
    json.push(b'\n');
    atomic_write(path, &json)
}

/// Read and parse a JSON file, `None` when it does not exist.
pub fn read_json_if_exists<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;
    let value = serde_json::from_str(&json)
        .map_err(|e| anyhow!("Failed to parse {}: {}", path.display(), e))?;
    Ok(Some(value))
}
