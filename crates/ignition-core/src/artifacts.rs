//! Artifact resolution.
//!
//! Artifacts are looked up by contract name when a future's execution state
//! is initialised and during validation, never mid-execution.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use ignition_types::{Artifact, BuildInfo};
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::debug;

pub trait ArtifactResolver: Send + Sync {
    /// Artifact for a contract name, plain (`Token`) or fully qualified
    /// (`contracts/Token.sol:Token`).
    fn load_artifact(&self, contract_name: &str) -> Result<Artifact>;

    /// Compiler metadata for the artifact, when available.
    fn build_info(&self, contract_name: &str) -> Result<Option<BuildInfo>>;
}

// =============================================================================
// Directory resolver
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: String,
}

/// Reads artifacts from a toolchain output directory laid out as
/// `<root>/<source path>/<ContractName>.json`, with an optional
/// `<ContractName>.dbg.json` pointing at the build info file.
pub struct DirectoryArtifactResolver {
    root: PathBuf,
    index: RwLock<Option<HashMap<String, Vec<PathBuf>>>>,
}

impl DirectoryArtifactResolver {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            index: RwLock::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn build_index(&self) -> Result<HashMap<String, Vec<PathBuf>>> {
        let mut index: HashMap<String, Vec<PathBuf>> = HashMap::new();
        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            let entries = std::fs::read_dir(&dir)
                .with_context(|| format!("Failed to read artifacts dir {}", dir.display()))?;
            for entry in entries {
                let path = entry
                    .with_context(|| format!("Failed to read entry in {}", dir.display()))?
                    .path();
                if path.is_dir() {
                    if path.file_name().is_some_and(|n| n == "build-info") {
                        continue;
                    }
                    stack.push(path);
                    continue;
                }
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if name.ends_with(".dbg.json") {
                    continue;
                }
                if let Some(stem) = name.strip_suffix(".json") {
                    index.entry(stem.to_string()).or_default().push(path.clone());
                }
            }
        }
        debug!(root = %self.root.display(), contracts = index.len(), "Indexed artifacts");
        Ok(index)
    }

    fn artifact_path(&self, contract_name: &str) -> Result<PathBuf> {
        if let Some((source, name)) = contract_name.rsplit_once(':') {
            let path = self.root.join(source).join(format!("{}.json", name));
            if !path.exists() {
                bail!("Artifact for contract {} not found at {}", contract_name, path.display());
            }
            return Ok(path);
        }

        if self.index.read().is_none() {
            let built = self.build_index()?;
            *self.index.write() = Some(built);
        }
        let guard = self.index.read();
        let candidates = guard
            .as_ref()
            .and_then(|idx| idx.get(contract_name))
            .cloned()
            .unwrap_or_default();
        match candidates.as_slice() {
            [] => bail!(
                "Artifact for contract {} not found in {}",
                contract_name,
                self.root.display()
            ),
            [one] => Ok(one.clone()),
            many => bail!(
                "There are multiple artifacts for contract {}, use a fully qualified name: {}",
                contract_name,
                many.iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

impl ArtifactResolver for DirectoryArtifactResolver {
    fn load_artifact(&self, contract_name: &str) -> Result<Artifact> {
        let path = self.artifact_path(contract_name)?;
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))
    }

    fn build_info(&self, contract_name: &str) -> Result<Option<BuildInfo>> {
        let path = self.artifact_path(contract_name)?;
        let dbg_path = path.with_extension("dbg.json");
        if !dbg_path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&dbg_path)
            .with_context(|| format!("Failed to read {}", dbg_path.display()))?;
        let debug: DebugFile = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse {}", dbg_path.display()))?;
        let parent = dbg_path
            .parent()
            .ok_or_else(|| anyhow!("Artifact path {} has no parent", dbg_path.display()))?;
        let info_path = parent.join(&debug.build_info);
        if !info_path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&info_path)
            .with_context(|| format!("Failed to read build info {}", info_path.display()))?;
        serde_json::from_str(&json)
            .map(Some)
            .with_context(|| format!("Failed to parse build info {}", info_path.display()))
    }
}

// =============================================================================
// In-memory resolver
// =============================================================================

#[derive(Default)]
pub struct MemoryArtifactResolver {
    artifacts: RwLock<HashMap<String, Artifact>>,
    build_infos: RwLock<HashMap<String, BuildInfo>>,
}

impl MemoryArtifactResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifacts(artifacts: impl IntoIterator<Item = Artifact>) -> Self {
        let resolver = Self::new();
        for artifact in artifacts {
            resolver.add(artifact);
        }
        resolver
    }

    /// Register under both the plain and the fully qualified name.
    pub fn add(&self, artifact: Artifact) {
        let mut artifacts = self.artifacts.write();
        artifacts.insert(artifact.fully_qualified_name(), artifact.clone());
        artifacts.insert(artifact.contract_name.clone(), artifact);
    }

    pub fn add_build_info(&self, contract_name: &str, info: BuildInfo) {
        self.build_infos
            .write()
            .insert(contract_name.to_string(), info);
    }
}

impl ArtifactResolver for MemoryArtifactResolver {
    fn load_artifact(&self, contract_name: &str) -> Result<Artifact> {
        self.artifacts
            .read()
            .get(contract_name)
            .cloned()
            .ok_or_else(|| anyhow!("Artifact for contract {} not found", contract_name))
    }

    fn build_info(&self, contract_name: &str) -> Result<Option<BuildInfo>> {
        Ok(self.build_infos.read().get(contract_name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(path: &Path, value: &serde_json::Value) -> Result<()> {
        std::fs::create_dir_all(path.parent().unwrap())?;
        std::fs::write(path, serde_json::to_string(value)?)?;
        Ok(())
    }

    fn artifact_json(name: &str, source: &str) -> serde_json::Value {
        json!({
            "contractName": name,
            "sourceName": source,
            "abi": [],
            "bytecode": "0x6080",
            "deployedBytecode": "0x6080",
            "linkReferences": {}
        })
    }

    #[test]
    fn test_directory_resolver_finds_by_name_and_fqn() -> Result<()> {
        let temp = TempDir::new()?;
        let root = temp.path();
        write(
            &root.join("contracts/Token.sol/Token.json"),
            &artifact_json("Token", "contracts/Token.sol"),
        )?;
        write(
            &root.join("contracts/Token.sol/Token.dbg.json"),
            &json!({"buildInfo": "../../build-info/abc.json"}),
        )?;
        write(
            &root.join("build-info/abc.json"),
            &json!({"id": "abc", "solcVersion": "0.8.24", "input": {}, "output": {}}),
        )?;

        let resolver = DirectoryArtifactResolver::new(root);
        assert_eq!(resolver.load_artifact("Token")?.contract_name, "Token");
        assert_eq!(
            resolver
                .load_artifact("contracts/Token.sol:Token")?
                .source_name,
            "contracts/Token.sol"
        );
        let info = resolver.build_info("Token")?.expect("build info");
        assert_eq!(info.id, "abc");
        assert!(resolver.load_artifact("Missing").is_err());
        Ok(())
    }

    #[test]
    fn test_directory_resolver_rejects_ambiguous_names() -> Result<()> {
        let temp = TempDir::new()?;
        write(
            &temp.path().join("a/Token.sol/Token.json"),
            &artifact_json("Token", "a/Token.sol"),
        )?;
        write(
            &temp.path().join("b/Token.sol/Token.json"),
            &artifact_json("Token", "b/Token.sol"),
        )?;
        let resolver = DirectoryArtifactResolver::new(temp.path());
        let err = resolver.load_artifact("Token").unwrap_err();
        assert!(err.to_string().contains("multiple artifacts"));
        Ok(())
    }

    #[test]
    fn test_memory_resolver() -> Result<()> {
        let artifact: Artifact = serde_json::from_value(artifact_json("Token", "c/Token.sol"))?;
        let resolver = MemoryArtifactResolver::with_artifacts([artifact]);
        assert!(resolver.load_artifact("Token").is_ok());
        assert!(resolver.load_artifact("c/Token.sol:Token").is_ok());
        assert!(resolver.build_info("Token")?.is_none());
        Ok(())
    }
}
