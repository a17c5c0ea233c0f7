//! The future processor.
//!
//! [`FutureProcessor::tick`] moves one future as far as it can go without
//! waiting for the chain: it initialises the execution state, replays the
//! strategy against the journaled interactions, and then sends, queries or
//! monitors whatever interaction is next. Every step is journaled through the
//! [`DeploymentStateCell`] before the next one is decided.
//!
//! Per-future failures (reverts, RPC errors, decode errors) end up in the
//! journal as a failed result. A refused fee-bump replacement is not one of
//! them: the transactions already sent may still land. Only nonce conflicts,
//! storage errors and invariant violations escape as `Err`.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use ethers_core::types::{Address, H256};
use ignition_transport::{BlockTag, EthRpc, TransactionRequest};
use ignition_types::{
    Artifact, ExecutionDetails, ExecutionResult, ExecutionState, ExecutionStatus, FutureId,
    JournalMessage, NetworkInteraction, NetworkInteractionRequest, OnchainInteraction,
    StaticCallInteraction, Transaction,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::artifacts::ArtifactResolver;
use crate::config::ExecutionConfig;
use crate::errors::{IgnitionError, StrategyError};
use crate::module::{Future, FutureParams, ModuleParameters};
use crate::nonce::NonceManager;
use crate::reducer::DeploymentStateCell;
use crate::resolve::{build_execution_details, ResolveContext};
use crate::strategy::{strategy_by_name, ExecutionStrategy, InteractionOutcome, StrategyStep};
use crate::validation::future_artifact;

/// Where a future stands after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    Completed(ExecutionStatus),
    /// Waiting on the chain; tick again after the next block.
    Pending,
}

/// Result of replaying a strategy over the recorded interactions.
enum Replay {
    Done(ExecutionResult),
    /// The strategy asks for an interaction that is not recorded yet.
    Start(NetworkInteractionRequest),
    /// A recorded interaction that still needs the network.
    Continue(NetworkInteraction),
    /// The strategy asked for something other than what was recorded.
    Diverged(String),
}

/// Whether a network step journaled something new.
enum Progress {
    Advanced,
    Waiting,
}

/// Everything the processor resolves futures against.
pub struct ProcessorContext {
    pub parameters: ModuleParameters,
    pub accounts: Vec<Address>,
    pub default_sender: Address,
    pub required_confirmations: u64,
}

pub struct FutureProcessor {
    rpc: Arc<dyn EthRpc>,
    resolver: Arc<dyn ArtifactResolver>,
    strategy: Arc<dyn ExecutionStrategy>,
    nonce_manager: NonceManager,
    config: ExecutionConfig,
    context: ProcessorContext,
    /// When the latest transaction of each interaction was sent in this run.
    send_times: HashMap<(FutureId, u32), Instant>,
    /// Replacement transactions the node refused, per interaction.
    rejected_replacements: HashMap<(FutureId, u32), usize>,
    artifacts: HashMap<FutureId, Artifact>,
}

impl FutureProcessor {
    pub fn new(
        rpc: Arc<dyn EthRpc>,
        resolver: Arc<dyn ArtifactResolver>,
        strategy: Arc<dyn ExecutionStrategy>,
        nonce_manager: NonceManager,
        config: ExecutionConfig,
        context: ProcessorContext,
    ) -> Self {
        Self {
            rpc,
            resolver,
            strategy,
            nonce_manager,
            config,
            context,
            send_times: HashMap::new(),
            rejected_replacements: HashMap::new(),
            artifacts: HashMap::new(),
        }
    }

    pub async fn tick(
        &mut self,
        future: &Future,
        cell: &mut DeploymentStateCell,
    ) -> Result<TickResult, IgnitionError> {
        if cell.state().get(&future.id).is_none() {
            self.initialize(future, cell)?;
        }

        loop {
            let exec = cell
                .state()
                .get(&future.id)
                .cloned()
                .ok_or_else(|| IgnitionError::invariant(format!("{} has no execution state", future.id)))?;
            if exec.status.is_terminal() {
                return Ok(TickResult::Completed(exec.status));
            }

            let artifact = match self.strategy_artifact(&exec, cell) {
                Ok(artifact) => artifact,
                Err(e) => {
                    self.fail(cell, &exec.id, ExecutionResult::StrategyError { message: format!("{:#}", e) })?;
                    continue;
                }
            };

            let replay = match self
                .strategy_for(&exec)
                .and_then(|strategy| replay_strategy(strategy.as_ref(), &exec, artifact.as_ref()))
            {
                Ok(replay) => replay,
                Err(e) => {
                    self.fail(cell, &exec.id, ExecutionResult::StrategyError { message: e.to_string() })?;
                    continue;
                }
            };

            match replay {
                Replay::Diverged(message) => return Err(IgnitionError::Invariant(message)),
                Replay::Done(result) => {
                    match &result {
                        ExecutionResult::Success { .. } => info!(future = %exec.id, "Future succeeded"),
                        other => warn!(future = %exec.id, "Future failed: {}", other),
                    }
                    cell.apply(JournalMessage::ExecutionResult {
                        future_id: exec.id.clone(),
                        result,
                    })?;
                }
                Replay::Start(request) => {
                    cell.apply(JournalMessage::StartNetworkInteraction {
                        future_id: exec.id.clone(),
                        interaction: request,
                    })?;
                }
                Replay::Continue(NetworkInteraction::StaticCall(call)) => {
                    self.query_static_call(&exec, &call, cell).await?;
                }
                Replay::Continue(NetworkInteraction::Onchain(onchain)) => {
                    let progress = if onchain.nonce.is_none() || onchain.should_be_resent {
                        self.send_transaction(&exec, &onchain, artifact.as_ref(), cell)
                            .await?
                    } else {
                        self.monitor(&exec, &onchain, cell).await?
                    };
                    if let Progress::Waiting = progress {
                        return Ok(TickResult::Pending);
                    }
                }
            }
        }
    }

    // =========================================================================
    // Initialisation
    // =========================================================================

    fn initialize(&mut self, future: &Future, cell: &mut DeploymentStateCell) -> Result<(), IgnitionError> {
        let loader = cell.loader().clone();
        if let FutureParams::Deployment { contract_name, artifact, .. }
        | FutureParams::ContractAt { contract_name, artifact, .. } = &future.params
        {
            let resolved = future_artifact(future, self.resolver.as_ref())
                .with_context(|| format!("Failed to load the artifact of {}", future.id))?;
            loader.store_artifact(&future.id, &resolved)?;
            if artifact.is_none() {
                if let Some(info) = self.resolver.build_info(contract_name)? {
                    loader.store_build_info(&future.id, &info)?;
                }
            }
            self.artifacts.insert(future.id.clone(), resolved);
        }

        let ctx = ResolveContext::new(
            &self.context.parameters,
            &self.context.accounts,
            self.context.default_sender,
        );
        let details = build_execution_details(future, &ctx, cell.state(), loader.as_ref())?;
        debug!(future = %future.id, kind = %future.kind, "Initialising execution state");
        cell.apply(JournalMessage::InitializeExecutionState {
            future_id: future.id.clone(),
            future_kind: future.kind,
            strategy: self.strategy.name().to_string(),
            dependencies: future.dependencies.clone(),
            details,
        })
    }

    /// The artifact a future's strategy encodes against, if it needs one.
    fn strategy_artifact(
        &mut self,
        exec: &ExecutionState,
        cell: &DeploymentStateCell,
    ) -> anyhow::Result<Option<Artifact>> {
        let key = match &exec.details {
            ExecutionDetails::Deployment(_) | ExecutionDetails::ContractAt(_) => exec.id.clone(),
            ExecutionDetails::Call(c) => c.artifact_id.clone(),
            ExecutionDetails::StaticCall(c) => c.artifact_id.clone(),
            ExecutionDetails::ReadEventArgument(_) | ExecutionDetails::SendData(_) => return Ok(None),
        };
        if let Some(artifact) = self.artifacts.get(&key) {
            return Ok(Some(artifact.clone()));
        }
        let artifact = cell
            .loader()
            .load_artifact(&key)
            .with_context(|| format!("Failed to load the stored artifact of {}", key))?;
        self.artifacts.insert(key, artifact.clone());
        Ok(Some(artifact))
    }

    fn failed(
        &self,
        cell: &mut DeploymentStateCell,
        future_id: &str,
        result: ExecutionResult,
    ) -> Result<Progress, IgnitionError> {
        self.fail(cell, future_id, result)?;
        Ok(Progress::Advanced)
    }

    fn fail(
        &self,
        cell: &mut DeploymentStateCell,
        future_id: &str,
        result: ExecutionResult,
    ) -> Result<(), IgnitionError> {
        warn!(future = %future_id, "Future failed: {}", result);
        cell.apply(JournalMessage::ExecutionResult {
            future_id: future_id.to_string(),
            result,
        })
    }

    // =========================================================================
    // Network steps
    // =========================================================================

    async fn query_static_call(
        &self,
        exec: &ExecutionState,
        call: &StaticCallInteraction,
        cell: &mut DeploymentStateCell,
    ) -> Result<(), IgnitionError> {
        let request = TransactionRequest {
            from: call.from,
            to: Some(call.to),
            data: call.data.clone(),
            value: call.value,
            ..Default::default()
        };
        match self.rpc.call(&request, BlockTag::Latest).await {
            Ok(result) => cell.apply(JournalMessage::StaticCallComplete {
                future_id: exec.id.clone(),
                interaction_id: call.id,
                result,
            }),
            Err(e) => self.fail(cell, &exec.id, ExecutionResult::NetworkError { message: e.to_string() }),
        }
    }

    async fn send_transaction(
        &mut self,
        exec: &ExecutionState,
        onchain: &OnchainInteraction,
        artifact: Option<&Artifact>,
        cell: &mut DeploymentStateCell,
    ) -> Result<Progress, IgnitionError> {
        let replacing = !onchain.transactions.is_empty();
        if replacing {
            // An earlier transaction may have landed since the fees were bumped.
            if let Some(progress) = self.check_receipts(exec, onchain, cell).await? {
                return Ok(progress);
            }
        }

        let mut request = TransactionRequest {
            from: onchain.from,
            to: onchain.to,
            data: onchain.data.clone(),
            value: onchain.value,
            ..Default::default()
        };

        if !replacing {
            let simulation = match self.rpc.call(&request, BlockTag::Pending).await {
                Ok(raw) => raw,
                Err(e) => return self.failed(cell, &exec.id, ExecutionResult::NetworkError { message: e.to_string() }),
            };
            match self.strategy_for(exec).and_then(|s| s.on_simulation(&simulation, artifact)) {
                Ok(None) => {}
                Ok(Some(result)) => return self.failed(cell, &exec.id, result),
                Err(e) => {
                    return self.failed(cell, &exec.id, ExecutionResult::StrategyError { message: e.to_string() })
                }
            }
        }

        let network_fees = match self.rpc.network_fees().await {
            Ok(fees) => fees,
            Err(e) if replacing => return self.replacement_rejected(exec, onchain, cell, &e.to_string()),
            Err(e) => return self.failed(cell, &exec.id, ExecutionResult::NetworkError { message: e.to_string() }),
        };
        let fees = match onchain.last_transaction() {
            Some(last) => last
                .fees
                .bumped(self.config.fee_bump_percent)
                .max_with(&network_fees),
            None => network_fees,
        };

        let (nonce, allocated) = match onchain.nonce {
            Some(nonce) => (nonce, false),
            None => (self.nonce_manager.get_next_nonce(onchain.from).await?, true),
        };
        request.nonce = Some(nonce);
        request.fees = Some(fees);

        let sent = match self.rpc.estimate_gas(&request).await {
            Ok(gas) => {
                request.gas = Some(gas);
                self.rpc.send_transaction(&request).await
            }
            Err(e) => Err(e),
        };
        let hash: H256 = match sent {
            Ok(hash) => hash,
            Err(e) if replacing => return self.replacement_rejected(exec, onchain, cell, &e.to_string()),
            Err(e) => {
                if allocated {
                    self.nonce_manager.revert(onchain.from, nonce);
                }
                return self.failed(cell, &exec.id, ExecutionResult::NetworkError { message: e.to_string() });
            }
        };

        info!(
            future = %exec.id,
            nonce,
            hash = %format!("{:#x}", hash),
            resend = replacing,
            "Sent transaction"
        );
        cell.apply(JournalMessage::SendTransaction {
            future_id: exec.id.clone(),
            interaction_id: onchain.id,
            nonce,
            transaction: Transaction {
                hash,
                fees,
                receipt: None,
            },
        })?;
        self.send_times
            .insert((exec.id.clone(), onchain.id), Instant::now());
        Ok(Progress::Advanced)
    }

    /// The transactions already sent stay in play when their replacement is
    /// refused. Refusals count against the fee-bump budget.
    fn replacement_rejected(
        &mut self,
        exec: &ExecutionState,
        onchain: &OnchainInteraction,
        cell: &mut DeploymentStateCell,
        error: &str,
    ) -> Result<Progress, IgnitionError> {
        let rejected = {
            let count = self
                .rejected_replacements
                .entry((exec.id.clone(), onchain.id))
                .or_insert(0);
            *count += 1;
            *count
        };
        if onchain.transactions.len() + rejected > self.config.effective_max_fee_bumps() {
            warn!(
                future = %exec.id,
                error,
                "Replacement transaction was refused and no fee bumps are left"
            );
            cell.apply(JournalMessage::InteractionTimeout {
                future_id: exec.id.clone(),
                interaction_id: onchain.id,
            })?;
            return Ok(Progress::Advanced);
        }
        warn!(
            future = %exec.id,
            error,
            "Replacement transaction was refused, waiting on the previous one"
        );
        Ok(Progress::Waiting)
    }

    async fn monitor(
        &mut self,
        exec: &ExecutionState,
        onchain: &OnchainInteraction,
        cell: &mut DeploymentStateCell,
    ) -> Result<Progress, IgnitionError> {
        if let Some(progress) = self.check_receipts(exec, onchain, cell).await? {
            return Ok(progress);
        }

        // Transactions from an earlier run are timed from the first look.
        let sent_at = *self
            .send_times
            .entry((exec.id.clone(), onchain.id))
            .or_insert_with(Instant::now);
        if sent_at.elapsed() < self.config.time_before_bumping_fees() {
            return Ok(Progress::Waiting);
        }

        if onchain.transactions.len() > self.config.effective_max_fee_bumps() {
            warn!(
                future = %exec.id,
                transactions = onchain.transactions.len(),
                "Transaction was not confirmed after the maximum number of fee bumps"
            );
            cell.apply(JournalMessage::InteractionTimeout {
                future_id: exec.id.clone(),
                interaction_id: onchain.id,
            })?;
        } else {
            warn!(
                future = %exec.id,
                attempt = onchain.transactions.len(),
                "Transaction is not confirmed yet, bumping fees"
            );
            cell.apply(JournalMessage::BumpFees {
                future_id: exec.id.clone(),
                interaction_id: onchain.id,
            })?;
        }
        Ok(Progress::Advanced)
    }

    /// Journal the confirmation of whichever sent transaction landed. `None`
    /// when none of them has a receipt yet.
    async fn check_receipts(
        &mut self,
        exec: &ExecutionState,
        onchain: &OnchainInteraction,
        cell: &mut DeploymentStateCell,
    ) -> Result<Option<Progress>, IgnitionError> {
        let latest = match self.rpc.latest_block().await {
            Ok(block) => block.number,
            Err(e) => {
                debug!(future = %exec.id, "Failed to fetch the latest block: {}", e);
                return Ok(Some(Progress::Waiting));
            }
        };

        // Newest first: a replacement is the likeliest to have landed.
        for tx in onchain.transactions.iter().rev() {
            match self.rpc.get_receipt(tx.hash).await {
                Ok(Some(receipt)) => {
                    let confirmations = latest.saturating_sub(receipt.block_number) + 1;
                    if confirmations < self.context.required_confirmations {
                        debug!(
                            future = %exec.id,
                            confirmations,
                            required = self.context.required_confirmations,
                            "Waiting for confirmations"
                        );
                        return Ok(Some(Progress::Waiting));
                    }
                    debug!(future = %exec.id, hash = %format!("{:#x}", tx.hash), "Transaction confirmed");
                    cell.apply(JournalMessage::ConfirmTransaction {
                        future_id: exec.id.clone(),
                        interaction_id: onchain.id,
                        hash: tx.hash,
                        receipt,
                    })?;
                    let key = (exec.id.clone(), onchain.id);
                    self.send_times.remove(&key);
                    self.rejected_replacements.remove(&key);
                    return Ok(Some(Progress::Advanced));
                }
                Ok(None) => {}
                Err(e) => debug!(future = %exec.id, "Failed to fetch receipt: {}", e),
            }
        }
        Ok(None)
    }

    /// The injected strategy when the future was started with it, otherwise
    /// the built-in strategy of that name.
    fn strategy_for(&self, exec: &ExecutionState) -> Result<Arc<dyn ExecutionStrategy>, StrategyError> {
        if exec.strategy == self.strategy.name() {
            Ok(self.strategy.clone())
        } else {
            strategy_by_name(&exec.strategy)
        }
    }
}

/// Drive a fresh procedure through every completed interaction.
fn replay_strategy(
    strategy: &dyn ExecutionStrategy,
    exec: &ExecutionState,
    artifact: Option<&Artifact>,
) -> Result<Replay, StrategyError> {
    let mut procedure = strategy.procedure(exec, artifact)?;
    let mut outcome = None;
    let mut recorded = exec.network_interactions.iter();
    loop {
        let request = match procedure.resume(outcome.take())? {
            StrategyStep::Done(result) => return Ok(Replay::Done(result)),
            StrategyStep::Request(request) => request,
        };
        let Some(interaction) = recorded.next() else {
            return Ok(Replay::Start(request));
        };
        if !request.matches(interaction) {
            return Ok(Replay::Diverged(format!(
                "Future {} requested interaction {} which does not match the recorded one",
                exec.id,
                request.id()
            )));
        }
        match InteractionOutcome::from_interaction(interaction) {
            Some(done) => outcome = Some(done),
            None => return Ok(Replay::Continue(interaction.clone())),
        }
    }
}
