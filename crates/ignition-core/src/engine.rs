//! The execution engine.
//!
//! One control task drives a whole run. It first synchronises nonces with
//! the chain, then executes the batches in order: every future of a batch is
//! ticked once per pass, in id order, and between passes the engine waits
//! for a new block (or for the fee-bump interval, whichever comes first).
//! A batch ends when all of its futures are terminal; the run stops before
//! the next batch if any of them did not succeed.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ethers_core::types::Address;
use ignition_transport::EthRpc;
use ignition_types::{ExecutionStatus, FutureId};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::artifacts::ArtifactResolver;
use crate::batcher::compute_batches;
use crate::config::ExecutionConfig;
use crate::errors::IgnitionError;
use crate::module::IgnitionModule;
use crate::nonce::{nonce_sync_messages, NonceManager};
use crate::processor::{FutureProcessor, ProcessorContext, TickResult};
use crate::reducer::DeploymentStateCell;
use crate::resolve::{resolve_sender, ResolveContext};
use crate::strategy::ExecutionStrategy;

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// Batches computed at the start of the run.
    pub batches: Vec<Vec<FutureId>>,
    /// Final status of every future ticked in this run.
    pub statuses: BTreeMap<FutureId, ExecutionStatus>,
    /// Index of the batch after which the run stopped because of a failure.
    pub halted_after: Option<usize>,
}

pub struct ExecutionEngine {
    rpc: Arc<dyn EthRpc>,
    resolver: Arc<dyn ArtifactResolver>,
    strategy: Arc<dyn ExecutionStrategy>,
    config: ExecutionConfig,
}

impl ExecutionEngine {
    pub fn new(
        rpc: Arc<dyn EthRpc>,
        resolver: Arc<dyn ArtifactResolver>,
        strategy: Arc<dyn ExecutionStrategy>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            rpc,
            resolver,
            strategy,
            config,
        }
    }

    pub async fn execute(
        &self,
        module: &IgnitionModule,
        cell: &mut DeploymentStateCell,
        context: ProcessorContext,
    ) -> Result<ExecutionSummary, IgnitionError> {
        let senders = self.pending_senders(module, cell, &context)?;
        let sync = nonce_sync_messages(
            self.rpc.as_ref(),
            cell.state(),
            &senders,
            context.required_confirmations,
        )
        .await?;
        for message in sync {
            cell.apply(message)?;
        }

        let batches = compute_batches(module, cell.state());
        info!(
            module = %module.id,
            batches = batches.len(),
            futures = batches.iter().map(Vec::len).sum::<usize>(),
            "Starting execution"
        );

        let nonce_manager = NonceManager::new(self.rpc.clone(), cell.state());
        let mut processor = FutureProcessor::new(
            self.rpc.clone(),
            self.resolver.clone(),
            self.strategy.clone(),
            nonce_manager,
            self.config.clone(),
            context,
        );

        let mut summary = ExecutionSummary {
            batches: batches.clone(),
            ..Default::default()
        };
        for (index, batch) in batches.iter().enumerate() {
            info!(batch = index, futures = ?batch, "Executing batch");
            let statuses = self.execute_batch(module, batch, cell, &mut processor).await?;
            let halted = statuses.values().any(|s| *s != ExecutionStatus::Success);
            summary.statuses.extend(statuses);
            if halted {
                warn!(batch = index, "Batch did not fully succeed, not starting further batches");
                summary.halted_after = Some(index);
                break;
            }
        }
        Ok(summary)
    }

    async fn execute_batch(
        &self,
        module: &IgnitionModule,
        batch: &[FutureId],
        cell: &mut DeploymentStateCell,
        processor: &mut FutureProcessor,
    ) -> Result<BTreeMap<FutureId, ExecutionStatus>, IgnitionError> {
        let mut pending = Vec::with_capacity(batch.len());
        for id in batch {
            let future = module
                .future(id)
                .ok_or_else(|| IgnitionError::invariant(format!("Batched future {} is not in the module", id)))?;
            pending.push(future);
        }

        let mut statuses = BTreeMap::new();
        loop {
            let block = self.rpc.latest_block().await.ok().map(|b| b.number);
            let mut still_pending = Vec::new();
            for future in pending {
                match processor.tick(future, cell).await? {
                    TickResult::Completed(status) => {
                        debug!(future = %future.id, %status, "Future completed");
                        statuses.insert(future.id.clone(), status);
                    }
                    TickResult::Pending => still_pending.push(future),
                }
            }
            pending = still_pending;
            if pending.is_empty() {
                return Ok(statuses);
            }
            self.wait_for_progress(block).await;
        }
    }

    /// Sleep until a block newer than `seen` arrives, or until the fee-bump
    /// interval has passed.
    async fn wait_for_progress(&self, seen: Option<u64>) {
        let deadline = Instant::now() + self.config.time_before_bumping_fees();
        loop {
            tokio::time::sleep(self.config.block_polling_interval()).await;
            match self.rpc.latest_block().await {
                Ok(block) if seen.map_or(true, |n| block.number > n) => return,
                Ok(_) => {}
                Err(e) => debug!("Failed to poll the latest block: {}", e),
            }
            if Instant::now() >= deadline {
                return;
            }
        }
    }

    /// Senders of futures that may still send transactions in this run.
    fn pending_senders(
        &self,
        module: &IgnitionModule,
        cell: &DeploymentStateCell,
        context: &ProcessorContext,
    ) -> Result<BTreeSet<Address>, IgnitionError> {
        let ctx = ResolveContext::new(&context.parameters, &context.accounts, context.default_sender);
        let mut senders = BTreeSet::new();
        for future in module.futures.values() {
            if !future.sends_transactions()
                || cell.state().status_of(&future.id) == Some(ExecutionStatus::Success)
            {
                continue;
            }
            if let Some(from) = future.params.from() {
                senders.insert(resolve_sender(from, &ctx)?);
            }
        }
        Ok(senders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::encode_revert_reason;
    use crate::artifacts::MemoryArtifactResolver;
    use crate::errors::NonceError;
    use crate::module::{build_module, FutureOptions, ModuleParameters};
    use crate::reducer::DeploymentState;
    use crate::strategy::BasicStrategy;
    use ignition_store::EphemeralDeploymentLoader;
    use ignition_transport::MockChain;
    use ignition_types::{Artifact, JournalMessage, NetworkInteraction};
    use serde_json::json;

    fn artifact(name: &str, bytecode: &str) -> Artifact {
        serde_json::from_value(json!({
            "contractName": name,
            "sourceName": format!("contracts/{}.sol", name),
            "abi": [],
            "bytecode": bytecode,
            "deployedBytecode": "0x",
            "linkReferences": {}
        }))
        .unwrap()
    }

    fn engine(chain: &Arc<MockChain>, config: ExecutionConfig) -> ExecutionEngine {
        ExecutionEngine::new(
            chain.clone(),
            Arc::new(MemoryArtifactResolver::with_artifacts([
                artifact("A", "0xaa"),
                artifact("B", "0xbb"),
                artifact("C", "0xcc"),
            ])),
            Arc::new(BasicStrategy),
            config,
        )
    }

    fn context(chain: &MockChain) -> ProcessorContext {
        ProcessorContext {
            parameters: ModuleParameters::new(),
            accounts: chain.accounts_list(),
            default_sender: chain.account(0),
            required_confirmations: 1,
        }
    }

    fn new_cell() -> DeploymentStateCell {
        DeploymentStateCell::new(
            DeploymentState::default(),
            Arc::new(EphemeralDeploymentLoader::new()),
        )
    }

    fn a_then_b() -> IgnitionModule {
        build_module("M", |m| {
            let a = m.contract("A", vec![], FutureOptions::default())?;
            m.contract("B", vec![], FutureOptions { after: vec![a], ..Default::default() })?;
            m.contract("C", vec![], FutureOptions::default())?;
            Ok(())
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_runs_every_batch() -> Result<(), IgnitionError> {
        let chain = Arc::new(MockChain::default());
        let module = a_then_b();
        let mut cell = new_cell();
        let summary = engine(&chain, ExecutionConfig::default())
            .execute(&module, &mut cell, context(&chain))
            .await?;
        assert_eq!(
            summary.batches,
            vec![
                vec!["M#A".to_string(), "M#C".to_string()],
                vec!["M#B".to_string()]
            ]
        );
        assert!(summary.statuses.values().all(|s| *s == ExecutionStatus::Success));
        assert_eq!(summary.halted_after, None);

        let nonces: Vec<u64> = chain.sent_transactions().iter().map(|t| t.nonce).collect();
        assert_eq!(nonces, vec![0, 1, 2]);

        // A second run has nothing left to do.
        let summary = engine(&chain, ExecutionConfig::default())
            .execute(&module, &mut cell, context(&chain))
            .await?;
        assert!(summary.batches.is_empty());
        assert_eq!(chain.sent_transactions().len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_failure_stops_later_batches() -> Result<(), IgnitionError> {
        let chain = Arc::new(MockChain::default());
        chain.revert_when(
            |tx| tx.to.is_none() && tx.data.as_ref() == [0xaa],
            encode_revert_reason("A is broken"),
        );
        let module = a_then_b();
        let mut cell = new_cell();
        let summary = engine(&chain, ExecutionConfig::default())
            .execute(&module, &mut cell, context(&chain))
            .await?;
        assert_eq!(summary.statuses["M#A"], ExecutionStatus::Failed);
        assert_eq!(summary.statuses["M#C"], ExecutionStatus::Success);
        assert!(!summary.statuses.contains_key("M#B"));
        assert_eq!(summary.halted_after, Some(0));
        assert!(cell.state().get("M#B").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_foreign_pending_transaction_is_fatal() {
        let chain = Arc::new(MockChain::default());
        chain.set_auto_mine(false);
        chain.inject_external_pending(chain.account(0));
        let mut cell = new_cell();
        let err = engine(&chain, ExecutionConfig::default())
            .execute(&a_then_b(), &mut cell, context(&chain))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IgnitionError::Nonce(NonceError::PendingTransactions { count: 1, .. })
        ));
        assert!(chain.sent_transactions().is_empty());
        assert!(cell.state().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_resume_after_drop() -> Result<(), IgnitionError> {
        let chain = Arc::new(MockChain::default());
        chain.set_auto_mine(false);
        let config = ExecutionConfig {
            time_before_bumping_fees_ms: 1_000,
            max_fee_bumps: 1,
            ..Default::default()
        };
        let module = build_module("M", |m| {
            m.contract("A", vec![], FutureOptions::default())?;
            Ok(())
        })
        .unwrap();
        let mut cell = new_cell();

        let summary = engine(&chain, config.clone())
            .execute(&module, &mut cell, context(&chain))
            .await?;
        assert_eq!(summary.statuses["M#A"], ExecutionStatus::Timeout);
        let sent = chain.sent_transactions();
        assert_eq!(sent.len(), 2);

        // The node forgets the transaction; the next run resends it.
        assert!(chain.drop_transaction(sent[1].hash));
        chain.set_auto_mine(true);
        cell.apply(JournalMessage::RunStart { chain_id: 31337 })?;
        let summary = engine(&chain, config)
            .execute(&module, &mut cell, context(&chain))
            .await?;
        assert_eq!(summary.statuses["M#A"], ExecutionStatus::Success);

        let Some(NetworkInteraction::Onchain(onchain)) =
            cell.state().get("M#A").and_then(|s| s.last_interaction())
        else {
            panic!("expected an on-chain interaction");
        };
        assert_eq!(onchain.nonce, Some(0));
        assert_eq!(onchain.transactions.len(), 1);
        Ok(())
    }
}
