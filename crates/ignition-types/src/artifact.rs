//! Compiled contract artifacts.
//!
//! The JSON shape follows the artifacts emitted by common Solidity toolchains
//! (`contractName`, `sourceName`, `abi`, `bytecode`, `linkReferences`), so
//! artifacts can be dropped into a deployment directory unmodified.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Position of one library placeholder inside the creation bytecode (bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReference {
    pub start: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    #[serde(default)]
    pub source_name: String,
    pub abi: Value,
    /// Creation bytecode, `0x`-prefixed hex, possibly with link placeholders.
    pub bytecode: String,
    #[serde(default)]
    pub deployed_bytecode: String,
    /// source name -> library name -> placeholder positions
    #[serde(default)]
    pub link_references: BTreeMap<String, BTreeMap<String, Vec<LinkReference>>>,
}

impl Artifact {
    /// Names of every library this artifact must be linked against,
    /// as `(source_name, library_name)`.
    pub fn required_libraries(&self) -> Vec<(String, String)> {
        self.link_references
            .iter()
            .flat_map(|(source, libs)| {
                libs.keys()
                    .map(move |lib| (source.clone(), lib.clone()))
            })
            .collect()
    }

    pub fn fully_qualified_name(&self) -> String {
        if self.source_name.is_empty() {
            self.contract_name.clone()
        } else {
            format!("{}:{}", self.source_name, self.contract_name)
        }
    }
}

/// Compiler input/output metadata kept alongside an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub id: String,
    #[serde(default)]
    pub solc_version: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub output: Value,
}
