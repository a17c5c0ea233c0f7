//! The deployment pipeline.
//!
//! `deploy` validates a module, loads and reconciles the recorded deployment,
//! refuses to continue over unresolved failures of earlier runs, runs the
//! execution engine, and condenses the final state into a [`DeploymentResult`].

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::anyhow;
use ethers_core::types::{Address, H256};
use ignition_store::DeploymentLoader;
use ignition_transport::EthRpc;
use ignition_types::{ExecutionResult, ExecutionStatus, FutureId, JournalMessage};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::artifacts::ArtifactResolver;
use crate::config::ExecutionConfig;
use crate::engine::ExecutionEngine;
use crate::errors::IgnitionError;
use crate::module::{IgnitionModule, ModuleParameters};
use crate::processor::ProcessorContext;
use crate::reconciler::{reconcile, ReconcileContext, ReconciliationFailure};
use crate::reducer::{DeploymentState, DeploymentStateCell};
use crate::resolve::ResolveContext;
use crate::status::last_transaction_hash;
use crate::strategy::{BasicStrategy, ExecutionStrategy};
use crate::validation::validate_module;

#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub execution: ExecutionConfig,
    pub parameters: ModuleParameters,
    /// Sender for futures that do not name one. Defaults to the first account.
    pub default_sender: Option<Address>,
    /// Strategy that executes the module's futures.
    pub strategy: Arc<dyn ExecutionStrategy>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionConfig::default(),
            parameters: ModuleParameters::new(),
            default_sender: None,
            strategy: Arc::new(BasicStrategy),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedOutFuture {
    pub future_id: FutureId,
    /// Hash of the last transaction sent before giving up.
    pub tx_hash: Option<H256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeldFuture {
    pub future_id: FutureId,
    pub held_id: u32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFuture {
    pub future_id: FutureId,
    pub error: String,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentResult {
    #[serde(rename_all = "camelCase")]
    Success {
        /// Every future that resolved to a contract address.
        contracts: BTreeMap<FutureId, Address>,
        /// The module's named results.
        results: BTreeMap<String, Value>,
    },
    #[serde(rename_all = "camelCase")]
    ValidationError {
        errors: BTreeMap<FutureId, Vec<String>>,
    },
    #[serde(rename_all = "camelCase")]
    ReconciliationError {
        failures: Vec<ReconciliationFailure>,
        missing_execution_states: Vec<FutureId>,
    },
    #[serde(rename_all = "camelCase")]
    ExecutionError {
        started: Vec<FutureId>,
        timed_out: Vec<TimedOutFuture>,
        held: Vec<HeldFuture>,
        failed: Vec<FailedFuture>,
        successful: Vec<FutureId>,
    },
    #[serde(rename_all = "camelCase")]
    PreviousRunError {
        errors: BTreeMap<FutureId, Vec<String>>,
    },
}

impl DeploymentResult {
    pub fn is_success(&self) -> bool {
        matches!(self, DeploymentResult::Success { .. })
    }
}

pub async fn deploy(
    module: &IgnitionModule,
    rpc: Arc<dyn EthRpc>,
    resolver: Arc<dyn ArtifactResolver>,
    loader: Arc<dyn DeploymentLoader>,
    config: DeployConfig,
) -> Result<DeploymentResult, IgnitionError> {
    let chain_id = rpc.chain_id().await?;
    let accounts = rpc.accounts().await?;
    let default_sender = match config.default_sender.or_else(|| accounts.first().copied()) {
        Some(sender) => sender,
        None => return Err(anyhow!("The network has no accounts and no default sender was configured").into()),
    };
    info!(module = %module.id, chain_id, futures = module.futures.len(), "Deploying module");

    let errors = validate_module(module, resolver.as_ref(), &config.parameters, &accounts);
    if !errors.is_empty() {
        warn!(futures = errors.len(), "Module validation failed");
        return Ok(DeploymentResult::ValidationError { errors });
    }

    let mut cell = DeploymentStateCell::load(loader.clone())?;
    if let Some(stored) = cell.state().chain_id {
        if stored != chain_id {
            return Err(IgnitionError::ChainIdMismatch {
                stored,
                current: chain_id,
            });
        }
    }

    let strategy = config.strategy.clone();

    let reconciliation = {
        let ctx = ReconcileContext {
            deployment: cell.state(),
            resolve: ResolveContext::new(&config.parameters, &accounts, default_sender),
            resolver: resolver.as_ref(),
            loader: loader.as_ref(),
            strategy: strategy.name(),
        };
        reconcile(module, &ctx)
    };
    for id in &reconciliation.missing_execution_states {
        warn!(future = %id, "Recorded future is no longer part of the module");
    }
    if !reconciliation.is_ok() {
        return Ok(DeploymentResult::ReconciliationError {
            failures: reconciliation.failures,
            missing_execution_states: reconciliation.missing_execution_states,
        });
    }

    let previous = previous_run_errors(module, cell.state());
    if !previous.is_empty() {
        return Ok(DeploymentResult::PreviousRunError { errors: previous });
    }

    if cell.state().chain_id.is_none() {
        cell.apply(JournalMessage::DeploymentInitialize { chain_id })?;
    }
    cell.apply(JournalMessage::RunStart { chain_id })?;

    let engine = ExecutionEngine::new(rpc, resolver, strategy, config.execution.clone());
    let context = ProcessorContext {
        parameters: config.parameters,
        accounts,
        default_sender,
        required_confirmations: config.execution.confirmations_for(chain_id),
    };
    engine.execute(module, &mut cell, context).await?;

    let result = deployment_result(module, cell.state());
    match &result {
        DeploymentResult::Success { contracts, .. } => {
            info!(module = %module.id, contracts = contracts.len(), "Deployment complete")
        }
        _ => warn!(module = %module.id, "Deployment did not complete"),
    }
    Ok(result)
}

/// Failures recorded by earlier runs that must be wiped before retrying.
fn previous_run_errors(module: &IgnitionModule, state: &DeploymentState) -> BTreeMap<FutureId, Vec<String>> {
    let mut errors = BTreeMap::new();
    for id in module.futures.keys() {
        let Some(exec) = state.get(id) else { continue };
        let message = match (&exec.status, &exec.result) {
            (ExecutionStatus::Failed, Some(result)) => format!(
                "The previous run of {} failed ({}). Wipe it before running again",
                id, result
            ),
            (ExecutionStatus::Held, Some(result)) => format!(
                "The previous run of {} was held ({}). Wipe it before running again",
                id, result
            ),
            _ => continue,
        };
        errors.insert(id.clone(), vec![message]);
    }
    errors
}

fn deployment_result(module: &IgnitionModule, state: &DeploymentState) -> DeploymentResult {
    let all_done = module
        .futures
        .keys()
        .all(|id| state.status_of(id) == Some(ExecutionStatus::Success));

    if all_done {
        let contracts = module
            .futures
            .keys()
            .filter_map(|id| state.get(id).and_then(|s| s.success_address()).map(|a| (id.clone(), a)))
            .collect();
        let results = module
            .results
            .iter()
            .filter_map(|(key, id)| {
                state
                    .get(id)
                    .and_then(|s| s.result.as_ref())
                    .and_then(ExecutionResult::success_output)
                    .map(|output| (key.clone(), output.as_json()))
            })
            .collect();
        return DeploymentResult::Success { contracts, results };
    }

    let mut started = Vec::new();
    let mut timed_out = Vec::new();
    let mut held = Vec::new();
    let mut failed = Vec::new();
    let mut successful = Vec::new();
    for id in module.futures.keys() {
        let Some(exec) = state.get(id) else { continue };
        match exec.status {
            ExecutionStatus::Started => started.push(id.clone()),
            ExecutionStatus::Success => successful.push(id.clone()),
            ExecutionStatus::Timeout => timed_out.push(TimedOutFuture {
                future_id: id.clone(),
                tx_hash: last_transaction_hash(&exec.network_interactions),
            }),
            ExecutionStatus::Held => {
                let (held_id, reason) = match &exec.result {
                    Some(ExecutionResult::Held { held_id, reason }) => (*held_id, reason.clone()),
                    _ => (0, String::new()),
                };
                held.push(HeldFuture {
                    future_id: id.clone(),
                    held_id,
                    reason,
                });
            }
            ExecutionStatus::Failed => failed.push(FailedFuture {
                future_id: id.clone(),
                error: exec
                    .result
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "Failed without a recorded result".to_string()),
            }),
        }
    }
    DeploymentResult::ExecutionError {
        started,
        timed_out,
        held,
        failed,
        successful,
    }
}
