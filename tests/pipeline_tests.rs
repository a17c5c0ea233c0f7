//! End-to-end runs of the deployment pipeline against the in-memory chain,
//! with artifacts and deployments on disk the way the CLI lays them out.

mod common;

use std::sync::Arc;

use ignition_deploy::core::abi::encode_revert_reason;
use ignition_deploy::core::{
    load_deployment_state, status, wipe, DeploymentStateCell, DirectoryArtifactResolver,
};
use ignition_deploy::project::{load_module, Project};
use ignition_deploy::store::{DeploymentLoader, FileDeploymentLoader};
use ignition_deploy::transport::MockChain;
use ignition_deploy::types::{ExecutionStatus, JournalMessage};
use ignition_deploy::{deploy, DeployConfig, DeploymentResult};

use common::{token_module_json, write_artifacts, write_json};

struct Fixture {
    _dir: tempfile::TempDir,
    project: Project,
    module_path: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = write_artifacts(dir.path());
    let module_path = write_json(&dir.path().join("token.json"), &token_module_json());
    let project = Project::new(Some(dir.path().join("deployments")), Some(artifacts), None);
    Fixture {
        _dir: dir,
        project,
        module_path,
    }
}

async fn run(fx: &Fixture, chain: &Arc<MockChain>) -> DeploymentResult {
    let module = load_module(&fx.module_path).unwrap();
    let loader = Arc::new(FileDeploymentLoader::new(fx.project.deployment_dir(None, 31337)));
    let resolver = Arc::new(DirectoryArtifactResolver::new(&fx.project.artifacts_dir));
    deploy(&module, chain.clone(), resolver, loader, DeployConfig::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_deployment_is_written_to_disk() {
    let fx = fixture();
    let chain = Arc::new(MockChain::default());
    let result = run(&fx, &chain).await;
    assert!(result.is_success(), "{result:?}");

    let dir = fx.project.deployment_dir(None, 31337);
    assert!(dir.join("journal.jsonl").exists());
    assert!(dir.join("deployed_addresses.json").exists());
    assert!(dir.join("artifacts/Token#Token.json").exists());

    let loader = FileDeploymentLoader::new(&dir);
    let journal = loader.read_journal().unwrap();
    assert_eq!(journal[0], JournalMessage::DeploymentInitialize { chain_id: 31337 });
    assert!(loader.deployed_addresses().unwrap().contains_key("Token#Token"));

    let report = status(&load_deployment_state(&loader).unwrap());
    assert!(report.is_complete());
    assert_eq!(report.futures.len(), 2);
    assert_eq!(fx.project.deployment_ids().unwrap(), vec!["chain-31337"]);
}

#[tokio::test]
async fn test_rerun_sends_nothing() {
    let fx = fixture();
    let chain = Arc::new(MockChain::default());
    assert!(run(&fx, &chain).await.is_success());
    let sent = chain.sent_transactions().len();

    let again = run(&fx, &chain).await;
    assert!(again.is_success());
    assert_eq!(chain.sent_transactions().len(), sent);

    let loader = FileDeploymentLoader::new(fx.project.deployment_dir(None, 31337));
    let runs = loader
        .read_journal()
        .unwrap()
        .iter()
        .filter(|m| matches!(m, JournalMessage::RunStart { .. }))
        .count();
    assert_eq!(runs, 2);
}

#[tokio::test]
async fn test_wipe_and_retry_failed_call() {
    let fx = fixture();
    let chain = Arc::new(MockChain::default());
    chain.revert_when(|tx| tx.to.is_some(), encode_revert_reason("not yet"));
    let result = run(&fx, &chain).await;
    assert!(matches!(result, DeploymentResult::ExecutionError { .. }), "{result:?}");

    let loader: Arc<dyn DeploymentLoader> =
        Arc::new(FileDeploymentLoader::new(fx.project.deployment_dir(None, 31337)));
    let mut cell = DeploymentStateCell::load(loader.clone()).unwrap();
    assert_eq!(
        cell.state().status_of("Token#Token.mint"),
        Some(ExecutionStatus::Failed)
    );
    assert!(matches!(
        run(&fx, &chain).await,
        DeploymentResult::PreviousRunError { .. }
    ));

    wipe(&mut cell, "Token#Token.mint").unwrap();
    let result = run(&fx, &chain).await;
    let DeploymentResult::ExecutionError { failed, successful, .. } = result else {
        panic!("expected the retried call to fail again, got {result:?}");
    };
    assert_eq!(successful, vec!["Token#Token".to_string()]);
    assert!(failed[0].error.contains("not yet"));
}
