//! Deployment state and the journal reducer.
//!
//! [`reduce`] is a pure function from a state and one journal message to the
//! next state. It never touches the network, and applying a message twice in
//! a row leaves the state as applying it once. Loading a deployment folds
//! every journal message over an empty state.
//!
//! [`DeploymentStateCell`] is the only path that mutates a live state: it
//! reduces, appends the message to the journal, then commits.

use std::collections::BTreeMap;
use std::sync::Arc;

use ignition_store::DeploymentLoader;
use ignition_types::{
    ExecutionResult, ExecutionState, ExecutionStatus, FutureId, JournalMessage,
    NetworkInteraction, OnchainInteraction,
};
use serde::Serialize;
use tracing::debug;

use crate::errors::{IgnitionError, ReducerError};

/// Everything known about a deployment, derived from its journal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentState {
    pub chain_id: Option<u64>,
    pub execution_states: BTreeMap<FutureId, ExecutionState>,
}

impl DeploymentState {
    pub fn get(&self, future_id: &str) -> Option<&ExecutionState> {
        self.execution_states.get(future_id)
    }

    pub fn status_of(&self, future_id: &str) -> Option<ExecutionStatus> {
        self.get(future_id).map(|s| s.status)
    }

    pub fn is_empty(&self) -> bool {
        self.execution_states.is_empty()
    }
}

// =============================================================================
// Reducer
// =============================================================================

fn state_mut<'a>(
    state: &'a mut DeploymentState,
    future_id: &str,
    message: &JournalMessage,
) -> Result<&'a mut ExecutionState, ReducerError> {
    state
        .execution_states
        .get_mut(future_id)
        .ok_or_else(|| ReducerError::UnknownFuture {
            future_id: future_id.to_string(),
            message_type: message.type_name(),
        })
}

fn onchain_mut<'a>(
    exec: &'a mut ExecutionState,
    interaction_id: u32,
) -> Result<&'a mut OnchainInteraction, ReducerError> {
    let future_id = exec.id.clone();
    match exec.interaction_mut(interaction_id) {
        Some(NetworkInteraction::Onchain(o)) => Ok(o),
        Some(NetworkInteraction::StaticCall(_)) => Err(ReducerError::Invariant(format!(
            "Interaction {} of {} is a static call, not an on-chain interaction",
            interaction_id, future_id
        ))),
        None => Err(ReducerError::UnknownInteraction {
            future_id,
            interaction_id,
        }),
    }
}

/// Apply one message.
pub fn reduce(
    mut state: DeploymentState,
    message: &JournalMessage,
) -> Result<DeploymentState, ReducerError> {
    match message {
        JournalMessage::RunStart { .. } => {
            for exec in state.execution_states.values_mut() {
                if exec.status == ExecutionStatus::Timeout {
                    exec.status = ExecutionStatus::Started;
                }
            }
        }

        JournalMessage::DeploymentInitialize { chain_id } => {
            state.chain_id = Some(*chain_id);
        }

        JournalMessage::InitializeExecutionState {
            future_id,
            future_kind,
            strategy,
            dependencies,
            details,
        } => {
            if future_kind.execution_state_kind() != details.kind() {
                return Err(ReducerError::Invariant(format!(
                    "Future {} of kind {} was initialised with {:?} details",
                    future_id,
                    future_kind,
                    details.kind()
                )));
            }
            state
                .execution_states
                .entry(future_id.clone())
                .or_insert_with(|| ExecutionState {
                    id: future_id.clone(),
                    future_kind: *future_kind,
                    strategy: strategy.clone(),
                    status: ExecutionStatus::Started,
                    dependencies: dependencies.clone(),
                    network_interactions: Vec::new(),
                    details: details.clone(),
                    result: None,
                });
        }

        JournalMessage::StartNetworkInteraction {
            future_id,
            interaction,
        } => {
            let exec = state_mut(&mut state, future_id, message)?;
            if exec.interaction(interaction.id()).is_none() {
                exec.network_interactions.push(interaction.to_interaction());
            }
        }

        JournalMessage::SendTransaction {
            future_id,
            interaction_id,
            nonce,
            transaction,
        } => {
            let exec = state_mut(&mut state, future_id, message)?;
            let onchain = onchain_mut(exec, *interaction_id)?;
            match onchain.nonce {
                Some(existing) if existing != *nonce => {
                    return Err(ReducerError::Invariant(format!(
                        "Transaction {:#x} of {} uses nonce {} but the interaction has nonce {}",
                        transaction.hash, future_id, nonce, existing
                    )));
                }
                _ => onchain.nonce = Some(*nonce),
            }
            if !onchain
                .transactions
                .iter()
                .any(|tx| tx.hash == transaction.hash)
            {
                onchain.transactions.push(transaction.clone());
            }
            onchain.should_be_resent = false;
        }

        JournalMessage::ConfirmTransaction {
            future_id,
            interaction_id,
            hash,
            receipt,
        } => {
            let exec = state_mut(&mut state, future_id, message)?;
            let onchain = onchain_mut(exec, *interaction_id)?;
            let Some(tx) = onchain.transactions.iter_mut().find(|tx| tx.hash == *hash) else {
                return Err(ReducerError::UnknownTransaction {
                    future_id: future_id.clone(),
                    hash: *hash,
                });
            };
            tx.receipt = Some(receipt.clone());
            onchain.transactions.retain(|tx| tx.hash == *hash);
            onchain.should_be_resent = false;
        }

        JournalMessage::StaticCallComplete {
            future_id,
            interaction_id,
            result,
        } => {
            let exec = state_mut(&mut state, future_id, message)?;
            match exec.interaction_mut(*interaction_id) {
                Some(NetworkInteraction::StaticCall(call)) => call.result = Some(result.clone()),
                Some(NetworkInteraction::Onchain(_)) => {
                    return Err(ReducerError::Invariant(format!(
                        "Interaction {} of {} is not a static call",
                        interaction_id, future_id
                    )))
                }
                None => {
                    return Err(ReducerError::UnknownInteraction {
                        future_id: future_id.clone(),
                        interaction_id: *interaction_id,
                    })
                }
            }
        }

        JournalMessage::BumpFees {
            future_id,
            interaction_id,
        } => {
            let exec = state_mut(&mut state, future_id, message)?;
            onchain_mut(exec, *interaction_id)?.should_be_resent = true;
        }

        JournalMessage::InteractionTimeout {
            future_id,
            interaction_id,
        } => {
            let exec = state_mut(&mut state, future_id, message)?;
            onchain_mut(exec, *interaction_id)?;
            exec.status = ExecutionStatus::Timeout;
        }

        JournalMessage::ResetAfterInterference {
            future_id,
            interaction_id,
            ..
        } => {
            let exec = state_mut(&mut state, future_id, message)?;
            let onchain = onchain_mut(exec, *interaction_id)?;
            onchain.nonce = None;
            onchain.transactions.clear();
            onchain.should_be_resent = false;
        }

        JournalMessage::ExecutionResult { future_id, result } => {
            let exec = state_mut(&mut state, future_id, message)?;
            exec.status = result.status();
            exec.result = Some(result.clone());
        }

        JournalMessage::Wipe { future_id } => {
            state.execution_states.remove(future_id);
        }
    }
    Ok(state)
}

/// Fold `messages` over an empty state.
pub fn replay<'a>(
    messages: impl IntoIterator<Item = &'a JournalMessage>,
) -> Result<DeploymentState, ReducerError> {
    messages
        .into_iter()
        .try_fold(DeploymentState::default(), |state, message| reduce(state, message))
}

pub fn load_deployment_state(loader: &dyn DeploymentLoader) -> Result<DeploymentState, IgnitionError> {
    let messages = loader.read_journal()?;
    Ok(replay(&messages)?)
}

// =============================================================================
// Live state
// =============================================================================

/// Owns the live deployment state and its loader.
pub struct DeploymentStateCell {
    state: DeploymentState,
    loader: Arc<dyn DeploymentLoader>,
}

impl DeploymentStateCell {
    pub fn new(state: DeploymentState, loader: Arc<dyn DeploymentLoader>) -> Self {
        Self { state, loader }
    }

    /// Replay the loader's journal.
    pub fn load(loader: Arc<dyn DeploymentLoader>) -> Result<Self, IgnitionError> {
        let state = load_deployment_state(loader.as_ref())?;
        Ok(Self::new(state, loader))
    }

    pub fn state(&self) -> &DeploymentState {
        &self.state
    }

    pub fn loader(&self) -> &Arc<dyn DeploymentLoader> {
        &self.loader
    }

    pub fn into_state(self) -> DeploymentState {
        self.state
    }

    /// Record `message` durably and apply it.
    pub fn apply(&mut self, message: JournalMessage) -> Result<(), IgnitionError> {
        let next = reduce(self.state.clone(), &message)?;
        self.loader.record_to_journal(&message)?;
        debug!(
            message = message.type_name(),
            future = message.future_id().unwrap_or("-"),
            "Journaled message"
        );
        self.state = next;

        match &message {
            JournalMessage::ExecutionResult {
                future_id,
                result: ExecutionResult::Success { output },
            } => {
                if let Some(address) = output.address() {
                    self.loader.record_deployed_address(future_id, address)?;
                }
            }
            JournalMessage::Wipe { future_id } => {
                self.loader.remove_deployed_address(future_id)?;
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_core::types::{Address, Bytes, H256, U256};
    use ignition_store::EphemeralDeploymentLoader;
    use ignition_types::{
        ExecutionDetails, FutureKind, InterferenceReason, NetworkFees, NetworkInteractionRequest,
        ReceiptStatus, SendDataDetails, SuccessOutput, Transaction, TransactionReceipt,
    };
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn init(future_id: &str) -> JournalMessage {
        JournalMessage::InitializeExecutionState {
            future_id: future_id.to_string(),
            future_kind: FutureKind::SendData,
            strategy: "basic".to_string(),
            dependencies: BTreeSet::new(),
            details: ExecutionDetails::SendData(SendDataDetails {
                to: Address::from_low_u64_be(2),
                data: Bytes::new(),
                value: U256::one(),
                from: Address::from_low_u64_be(1),
            }),
        }
    }

    fn start(future_id: &str) -> JournalMessage {
        JournalMessage::StartNetworkInteraction {
            future_id: future_id.to_string(),
            interaction: NetworkInteractionRequest::Onchain {
                id: 1,
                to: Some(Address::from_low_u64_be(2)),
                data: Bytes::new(),
                value: U256::one(),
                from: Address::from_low_u64_be(1),
            },
        }
    }

    fn send(future_id: &str, hash: u64, nonce: u64) -> JournalMessage {
        JournalMessage::SendTransaction {
            future_id: future_id.to_string(),
            interaction_id: 1,
            nonce,
            transaction: Transaction {
                hash: H256::from_low_u64_be(hash),
                fees: NetworkFees::Legacy {
                    gas_price: U256::from(hash),
                },
                receipt: None,
            },
        }
    }

    fn confirm(future_id: &str, hash: u64) -> JournalMessage {
        JournalMessage::ConfirmTransaction {
            future_id: future_id.to_string(),
            interaction_id: 1,
            hash: H256::from_low_u64_be(hash),
            receipt: TransactionReceipt {
                block_hash: H256::from_low_u64_be(99),
                block_number: 3,
                status: ReceiptStatus::Success,
                contract_address: None,
                logs: vec![],
            },
        }
    }

    fn success(future_id: &str) -> JournalMessage {
        JournalMessage::ExecutionResult {
            future_id: future_id.to_string(),
            result: ExecutionResult::Success {
                output: SuccessOutput::SendData,
            },
        }
    }

    #[test]
    fn test_full_lifecycle() -> Result<(), ReducerError> {
        let journal = vec![
            JournalMessage::DeploymentInitialize { chain_id: 31337 },
            init("M#A"),
            start("M#A"),
            send("M#A", 10, 0),
            JournalMessage::BumpFees {
                future_id: "M#A".to_string(),
                interaction_id: 1,
            },
            send("M#A", 11, 0),
            confirm("M#A", 11),
            success("M#A"),
        ];
        let state = replay(&journal)?;
        assert_eq!(state.chain_id, Some(31337));
        let exec = state.get("M#A").unwrap();
        assert_eq!(exec.status, ExecutionStatus::Success);
        let NetworkInteraction::Onchain(onchain) = &exec.network_interactions[0] else {
            panic!("expected on-chain interaction");
        };
        assert_eq!(onchain.nonce, Some(0));
        assert_eq!(onchain.transactions.len(), 1);
        assert_eq!(onchain.transactions[0].hash, H256::from_low_u64_be(11));
        assert!(!onchain.should_be_resent);
        Ok(())
    }

    #[test]
    fn test_nonce_mismatch_is_invariant_violation() -> Result<(), ReducerError> {
        let state = replay(&[init("M#A"), start("M#A"), send("M#A", 1, 4)])?;
        let err = reduce(state, &send("M#A", 2, 5)).unwrap_err();
        assert!(matches!(err, ReducerError::Invariant(_)));
        Ok(())
    }

    #[test]
    fn test_unknown_future_and_transaction() -> Result<(), ReducerError> {
        let err = reduce(DeploymentState::default(), &start("M#X")).unwrap_err();
        assert_eq!(
            err,
            ReducerError::UnknownFuture {
                future_id: "M#X".to_string(),
                message_type: "start-network-interaction"
            }
        );
        let state = replay(&[init("M#A"), start("M#A"), send("M#A", 1, 0)])?;
        assert!(matches!(
            reduce(state, &confirm("M#A", 2)),
            Err(ReducerError::UnknownTransaction { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_timeout_reset_and_run_start() -> Result<(), ReducerError> {
        let state = replay(&[
            init("M#A"),
            start("M#A"),
            send("M#A", 1, 0),
            JournalMessage::InteractionTimeout {
                future_id: "M#A".to_string(),
                interaction_id: 1,
            },
        ])?;
        assert_eq!(state.status_of("M#A"), Some(ExecutionStatus::Timeout));

        let state = reduce(state, &JournalMessage::RunStart { chain_id: 31337 })?;
        assert_eq!(state.status_of("M#A"), Some(ExecutionStatus::Started));

        let state = reduce(
            state,
            &JournalMessage::ResetAfterInterference {
                future_id: "M#A".to_string(),
                interaction_id: 1,
                reason: InterferenceReason::Dropped,
            },
        )?;
        let NetworkInteraction::Onchain(o) = &state.get("M#A").unwrap().network_interactions[0]
        else {
            panic!("expected on-chain interaction");
        };
        assert!(o.nonce.is_none());
        assert!(o.transactions.is_empty());
        Ok(())
    }

    #[test]
    fn test_wipe_removes_state() -> Result<(), ReducerError> {
        let state = replay(&[init("M#A"), JournalMessage::Wipe {
            future_id: "M#A".to_string(),
        }])?;
        assert!(state.is_empty());
        Ok(())
    }

    #[test]
    fn test_cell_records_then_applies() -> Result<(), IgnitionError> {
        let loader: Arc<dyn DeploymentLoader> = Arc::new(EphemeralDeploymentLoader::new());
        let mut cell = DeploymentStateCell::load(loader.clone())?;
        cell.apply(init("M#A"))?;
        cell.apply(JournalMessage::ExecutionResult {
            future_id: "M#A".to_string(),
            result: ExecutionResult::Success {
                output: SuccessOutput::ContractAt {
                    address: Address::from_low_u64_be(5),
                },
            },
        })?;
        assert_eq!(loader.read_journal()?.len(), 2);
        assert_eq!(
            loader.deployed_addresses()?.get("M#A"),
            Some(&Address::from_low_u64_be(5))
        );

        // A message the reducer rejects is never journaled.
        assert!(cell.apply(start("M#Missing")).is_err());
        assert_eq!(loader.read_journal()?.len(), 2);

        let reloaded = DeploymentStateCell::load(loader)?;
        assert_eq!(reloaded.state(), cell.state());
        Ok(())
    }

    // =========================================================================
    // Properties
    // =========================================================================

    fn arbitrary_message(op: u8, future: u8, aux: u8) -> JournalMessage {
        let id = format!("M#F{}", future % 3);
        let hash = u64::from(aux % 4) + 1;
        match op % 10 {
            0 => init(&id),
            1 => start(&id),
            2 => send(&id, hash, u64::from(future % 3)),
            3 => confirm(&id, hash),
            4 => JournalMessage::BumpFees {
                future_id: id,
                interaction_id: 1,
            },
            5 => JournalMessage::InteractionTimeout {
                future_id: id,
                interaction_id: 1,
            },
            6 => JournalMessage::ResetAfterInterference {
                future_id: id,
                interaction_id: 1,
                reason: InterferenceReason::ReplacedByUser,
            },
            7 => success(&id),
            8 => JournalMessage::RunStart { chain_id: 1 },
            _ => JournalMessage::Wipe { future_id: id },
        }
    }

    /// Messages the reducer accepts, in order.
    fn valid_journal(ops: &[(u8, u8, u8)]) -> Vec<JournalMessage> {
        let mut state = DeploymentState::default();
        let mut journal = Vec::new();
        for &(op, future, aux) in ops {
            let message = arbitrary_message(op, future, aux);
            if let Ok(next) = reduce(state.clone(), &message) {
                state = next;
                journal.push(message);
            }
        }
        journal
    }

    proptest! {
        #[test]
        fn prop_reduce_is_idempotent(ops in proptest::collection::vec((0u8..10, 0u8..3, 0u8..4), 0..40)) {
            let mut state = DeploymentState::default();
            for message in valid_journal(&ops) {
                let once = reduce(state.clone(), &message).unwrap();
                let twice = reduce(once.clone(), &message).unwrap();
                prop_assert_eq!(&once, &twice);
                state = once;
            }
        }

        #[test]
        fn prop_replay_is_deterministic(ops in proptest::collection::vec((0u8..10, 0u8..3, 0u8..4), 0..40)) {
            let journal = valid_journal(&ops);
            let first = replay(&journal).unwrap();
            let second = replay(&journal).unwrap();
            prop_assert_eq!(&first, &second);

            let mut incremental = DeploymentState::default();
            for message in &journal {
                incremental = reduce(incremental, message).unwrap();
            }
            prop_assert_eq!(&first, &incremental);
        }
    }
}
