//! Deployment loaders.
//!
//! A loader owns everything persisted for one deployment: the journal, the
//! artifact each future was initialised with, optional build info, and the
//! future id -> deployed address index. [`FileDeploymentLoader`] keeps these
//! in a directory; [`EphemeralDeploymentLoader`] keeps them in memory.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use ethers_core::types::Address;
use ignition_types::{Artifact, BuildInfo, JournalMessage};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::journal::{FileJournal, MemoryJournal};
use crate::paths::{
    artifact_path, atomic_write_json, build_info_path, debug_file_path, deployed_addresses_path,
    journal_path, read_json_if_exists,
};

/// Storage for one deployment.
pub trait DeploymentLoader: Send + Sync {
    /// Append a message to the journal. Returns once it is durable.
    fn record_to_journal(&self, message: &JournalMessage) -> Result<()>;

    /// Every journal message, in the order recorded.
    fn read_journal(&self) -> Result<Vec<JournalMessage>>;

    fn store_artifact(&self, future_id: &str, artifact: &Artifact) -> Result<()>;

    fn load_artifact(&self, future_id: &str) -> Result<Artifact>;

    fn store_build_info(&self, future_id: &str, build_info: &BuildInfo) -> Result<()>;

    fn load_build_info(&self, future_id: &str) -> Result<Option<BuildInfo>>;

    fn record_deployed_address(&self, future_id: &str, address: Address) -> Result<()>;

    fn remove_deployed_address(&self, future_id: &str) -> Result<()>;

    fn deployed_addresses(&self) -> Result<BTreeMap<String, Address>>;

    /// Where the deployment lives on disk, if anywhere.
    fn deployment_dir(&self) -> Option<&Path> {
        None
    }
}

/// Points an artifact at its build info file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: String,
}

// =============================================================================
// File-backed loader
// =============================================================================

pub struct FileDeploymentLoader {
    dir: PathBuf,
    journal: FileJournal,
    addresses_lock: Mutex<()>,
}

impl FileDeploymentLoader {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref().to_path_buf();
        Self {
            journal: FileJournal::new(journal_path(&dir)),
            dir,
            addresses_lock: Mutex::new(()),
        }
    }

    /// True when a journal already exists, i.e. this resumes a deployment.
    pub fn exists(&self) -> bool {
        self.journal.path().exists()
    }

    fn write_addresses(&self, addresses: &BTreeMap<String, Address>) -> Result<()> {
        let as_strings: BTreeMap<&String, String> = addresses
            .iter()
            .map(|(k, v)| (k, format!("{:#x}", v)))
            .collect();
        atomic_write_json(&deployed_addresses_path(&self.dir), &as_strings)
    }
}

impl DeploymentLoader for FileDeploymentLoader {
    fn record_to_journal(&self, message: &JournalMessage) -> Result<()> {
        self.journal.record(message)
    }

    fn read_journal(&self) -> Result<Vec<JournalMessage>> {
        self.journal.read_all()
    }

    fn store_artifact(&self, future_id: &str, artifact: &Artifact) -> Result<()> {
        atomic_write_json(&artifact_path(&self.dir, future_id), artifact)
    }

    fn load_artifact(&self, future_id: &str) -> Result<Artifact> {
        let path = artifact_path(&self.dir, future_id);
        read_json_if_exists(&path)?
            .ok_or_else(|| anyhow!("No stored artifact for {} at {}", future_id, path.display()))
    }

    fn store_build_info(&self, future_id: &str, build_info: &BuildInfo) -> Result<()> {
        let info_path = build_info_path(&self.dir, &build_info.id);
        if !info_path.exists() {
            atomic_write_json(&info_path, build_info)?;
        }
        atomic_write_json(
            &debug_file_path(&self.dir, future_id),
            &DebugFile {
                build_info: build_info.id.clone(),
            },
        )
    }

    fn load_build_info(&self, future_id: &str) -> Result<Option<BuildInfo>> {
        let Some(debug) =
            read_json_if_exists::<DebugFile>(&debug_file_path(&self.dir, future_id))?
        else {
            return Ok(None);
        };
        read_json_if_exists(&build_info_path(&self.dir, &debug.build_info))
    }

    fn record_deployed_address(&self, future_id: &str, address: Address) -> Result<()> {
        let _guard = self.addresses_lock.lock();
        let mut addresses = self.deployed_addresses()?;
        addresses.insert(future_id.to_string(), address);
        self.write_addresses(&addresses)
    }

    fn remove_deployed_address(&self, future_id: &str) -> Result<()> {
        let _guard = self.addresses_lock.lock();
        let mut addresses = self.deployed_addresses()?;
        if addresses.remove(future_id).is_some() {
            self.write_addresses(&addresses)?;
        }
        Ok(())
    }

    fn deployed_addresses(&self) -> Result<BTreeMap<String, Address>> {
        let raw: BTreeMap<String, String> =
            read_json_if_exists(&deployed_addresses_path(&self.dir))?.unwrap_or_default();
        raw.into_iter()
            .map(|(id, addr)| {
                ignition_types::address::parse_address(&addr)
                    .map(|a| (id.clone(), a))
                    .ok_or_else(|| anyhow!("Invalid deployed address for {}: {}", id, addr))
            })
            .collect()
    }

    fn deployment_dir(&self) -> Option<&Path> {
        Some(&self.dir)
    }
}

// =============================================================================
// In-memory loader
// =============================================================================

/// Loader that forgets everything when dropped.
#[derive(Default)]
pub struct EphemeralDeploymentLoader {
    journal: MemoryJournal,
    artifacts: RwLock<HashMap<String, Artifact>>,
    build_infos: RwLock<HashMap<String, BuildInfo>>,
    addresses: RwLock<BTreeMap<String, Address>>,
}

impl EphemeralDeploymentLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeploymentLoader for EphemeralDeploymentLoader {
    fn record_to_journal(&self, message: &JournalMessage) -> Result<()> {
        self.journal.record(message);
        Ok(())
    }

    fn read_journal(&self) -> Result<Vec<JournalMessage>> {
        Ok(self.journal.read_all())
    }

    fn store_artifact(&self, future_id: &str, artifact: &Artifact) -> Result<()> {
        self.artifacts
            .write()
            .insert(future_id.to_string(), artifact.clone());
        Ok(())
    }

    fn load_artifact(&self, future_id: &str) -> Result<Artifact> {
        self.artifacts
            .read()
            .get(future_id)
            .cloned()
            .ok_or_else(|| anyhow!("No stored artifact for {}", future_id))
    }

    fn store_build_info(&self, future_id: &str, build_info: &BuildInfo) -> Result<()> {
        self.build_infos
            .write()
            .insert(future_id.to_string(), build_info.clone());
        Ok(())
    }

    fn load_build_info(&self, future_id: &str) -> Result<Option<BuildInfo>> {
        Ok(self.build_infos.read().get(future_id).cloned())
    }

    fn record_deployed_address(&self, future_id: &str, address: Address) -> Result<()> {
        self.addresses.write().insert(future_id.to_string(), address);
        Ok(())
    }

    fn remove_deployed_address(&self, future_id: &str) -> Result<()> {
        self.addresses.write().remove(future_id);
        Ok(())
    }

    fn deployed_addresses(&self) -> Result<BTreeMap<String, Address>> {
        Ok(self.addresses.read().clone())
    }
}
