#![allow(dead_code)]
//! Shared fixtures for integration tests.
//!
//! Artifacts are written in the toolchain layout
//! (`<root>/contracts/<Name>.sol/<Name>.json`) so that the directory
//! resolver used by the CLI finds them.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

pub fn token_artifact(name: &str, bytecode: &str) -> Value {
    json!({
        "contractName": name,
        "sourceName": format!("contracts/{}.sol", name),
        "abi": [
            {"type": "constructor", "stateMutability": "nonpayable",
             "inputs": [{"name": "supply", "type": "uint256"}]},
            {"type": "function", "name": "mint", "stateMutability": "nonpayable",
             "inputs": [{"name": "to", "type": "address"}], "outputs": []}
        ],
        "bytecode": bytecode,
        "deployedBytecode": "0x",
        "linkReferences": {}
    })
}

/// Write `Token` and `Vault` artifacts and return the artifacts root.
pub fn write_artifacts(root: &Path) -> PathBuf {
    let artifacts = root.join("artifacts");
    for (name, bytecode) in [("Token", "0x6080aa"), ("Vault", "0x6080bb")] {
        let dir = artifacts.join(format!("contracts/{}.sol", name));
        fs::create_dir_all(&dir).expect("create artifact dir");
        fs::write(
            dir.join(format!("{}.json", name)),
            serde_json::to_string_pretty(&token_artifact(name, bytecode)).unwrap(),
        )
        .expect("write artifact");
    }
    artifacts
}

pub fn token_module_json() -> Value {
    json!({
        "id": "Token",
        "futures": [
            {"type": "contract", "contract": "Token",
             "args": [{"parameter": "supply", "default": 1000}]},
            {"type": "call", "contract": "Token", "function": "mint",
             "args": [{"account": 1}]}
        ],
        "results": {"token": "Token"}
    })
}

pub fn write_json(path: &Path, value: &Value) -> PathBuf {
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).expect("write json");
    path.to_path_buf()
}
