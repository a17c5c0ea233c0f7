#![allow(deprecated)]
//! Integration tests for the ignition CLI

mod common;

use std::path::Path;
use std::sync::Arc;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

use ignition_deploy::core::DirectoryArtifactResolver;
use ignition_deploy::project::{load_module, Project};
use ignition_deploy::store::FileDeploymentLoader;
use ignition_deploy::transport::MockChain;
use ignition_deploy::{deploy, DeployConfig};

use common::{token_module_json, write_artifacts, write_json};

fn ignition_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ignition").expect("binary not found");
    cmd.current_dir(dir)
        .env_remove("RUST_LOG")
        .env("IGNITION_HOME", dir.join("home"))
        .arg("--deployments-dir")
        .arg(dir.join("deployments"));
    cmd
}

/// Record a finished deployment under `<dir>/deployments/chain-31337`.
async fn recorded_deployment(dir: &Path) {
    let artifacts = write_artifacts(dir);
    let module = load_module(&write_json(&dir.join("token.json"), &token_module_json())).unwrap();
    let project = Project::new(Some(dir.join("deployments")), Some(artifacts.clone()), None);
    let result = deploy(
        &module,
        Arc::new(MockChain::default()),
        Arc::new(DirectoryArtifactResolver::new(artifacts)),
        Arc::new(FileDeploymentLoader::new(project.deployment_dir(None, 31337))),
        DeployConfig::default(),
    )
    .await
    .unwrap();
    assert!(result.is_success());
}

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().unwrap();
    ignition_cmd(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("batches"))
        .stdout(predicate::str::contains("wipe"))
        .stdout(predicate::str::contains("reconcile"));
}

#[test]
fn test_status_without_deployments() {
    let temp = TempDir::new().unwrap();
    ignition_cmd(temp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No deployments found"));
}

#[test]
fn test_status_of_unknown_deployment_fails() {
    let temp = TempDir::new().unwrap();
    ignition_cmd(temp.path())
        .args(["status", "chain-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Deployment chain-1 not found"));
}

#[test]
fn test_batches_of_module() {
    let temp = TempDir::new().unwrap();
    let module = write_json(&temp.path().join("token.json"), &token_module_json());
    ignition_cmd(temp.path())
        .arg("batches")
        .arg(&module)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Batch #1\n  Token#Token\nBatch #2\n  Token#Token.mint\n",
        ));

    let output = ignition_cmd(temp.path())
        .arg("--json")
        .arg("batches")
        .arg(&module)
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["module"], "Token");
    assert_eq!(json["batches"], json!([["Token#Token"], ["Token#Token.mint"]]));
}

#[test]
fn test_batches_rejects_invalid_module() {
    let temp = TempDir::new().unwrap();
    let module = write_json(&temp.path().join("bad.json"), &json!({"id": "Bad", "unknown": 1}));
    ignition_cmd(temp.path())
        .arg("batches")
        .arg(&module)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse module"));
}

#[test]
fn test_dry_run_deploy() {
    let temp = TempDir::new().unwrap();
    let artifacts = write_artifacts(temp.path());
    let module = write_json(&temp.path().join("token.json"), &token_module_json());

    ignition_cmd(temp.path())
        .arg("--artifacts")
        .arg(&artifacts)
        .arg("deploy")
        .arg(&module)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Deployment chain-31337 complete"))
        .stdout(predicate::str::contains("Token#Token - 0x"));

    let output = ignition_cmd(temp.path())
        .arg("--artifacts")
        .arg(&artifacts)
        .arg("--json")
        .arg("deploy")
        .arg(&module)
        .arg("--dry-run")
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["type"], "SUCCESS");
    assert!(json["contracts"]["Token#Token"].is_string());
    assert!(!temp.path().join("deployments").exists());
}

#[test]
fn test_dry_run_reports_validation_errors() {
    let temp = TempDir::new().unwrap();
    let artifacts = write_artifacts(temp.path());
    let module = write_json(
        &temp.path().join("token.json"),
        &json!({
            "id": "Token",
            "futures": [{"type": "contract", "contract": "Token", "args": [{"parameter": "supply"}]}]
        }),
    );

    ignition_cmd(temp.path())
        .arg("--artifacts")
        .arg(&artifacts)
        .arg("deploy")
        .arg(&module)
        .arg("--dry-run")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Module validation failed"))
        .stdout(predicate::str::contains("supply"));

    let params = write_json(&temp.path().join("params.json"), &json!({"Token": {"supply": 7}}));
    ignition_cmd(temp.path())
        .arg("--artifacts")
        .arg(&artifacts)
        .arg("deploy")
        .arg(&module)
        .arg("--parameters")
        .arg(&params)
        .arg("--dry-run")
        .assert()
        .success();
}

#[tokio::test]
async fn test_status_and_wipe_of_recorded_deployment() {
    let temp = TempDir::new().unwrap();
    recorded_deployment(temp.path()).await;

    ignition_cmd(temp.path())
        .args(["status", "chain-31337"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deployment on chain 31337"))
        .stdout(predicate::str::contains("2 SUCCESS"));

    let output = ignition_cmd(temp.path())
        .args(["--json", "status", "chain-31337"])
        .output()
        .unwrap();
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["chainId"], 31337);
    assert_eq!(report["futures"].as_array().unwrap().len(), 2);

    // The token has a started dependent, so it cannot be wiped.
    ignition_cmd(temp.path())
        .args(["wipe", "chain-31337", "Token#Token"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("dependent futures"));

    ignition_cmd(temp.path())
        .args(["wipe", "chain-31337", "Token#Token.mint"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Token#Token.mint state has been cleared"));

    ignition_cmd(temp.path())
        .arg("batches")
        .arg(temp.path().join("token.json"))
        .args(["--deployment-id", "chain-31337"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Batch #1\n  Token#Token.mint\n"));
}

#[test]
fn test_wipe_of_unknown_deployment_fails() {
    let temp = TempDir::new().unwrap();
    ignition_cmd(temp.path())
        .args(["wipe", "chain-5", "Token#Token"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}
