//! Nonce allocation and synchronisation.
//!
//! [`NonceManager`] hands out nonces per sender for one run. It is anchored
//! on the in-flight interactions of previous runs and checks every
//! allocation against the node's pending transaction count, so another
//! agent sending from the same account is detected instead of raced.
//!
//! [`nonce_sync_messages`] runs once before execution and reconciles
//! in-flight interactions with the chain: interactions whose transactions
//! vanished are reset, and foreign pending transactions abort the run.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use ethers_core::types::{Address, H256};
use ignition_transport::{BlockTag, EthRpc};
use ignition_types::address::address_to_string;
use ignition_types::{ExecutionStatus, FutureId, InterferenceReason, JournalMessage};
use tracing::{debug, warn};

use crate::errors::NonceError;
use crate::reducer::DeploymentState;

pub struct NonceManager {
    rpc: Arc<dyn EthRpc>,
    max_used: HashMap<Address, u64>,
}

/// Highest nonce per sender among interactions that were sent but not confirmed.
pub fn in_flight_nonces(state: &DeploymentState) -> HashMap<Address, u64> {
    let mut out: HashMap<Address, u64> = HashMap::new();
    for exec in state.execution_states.values() {
        for onchain in exec.pending_onchain() {
            if let Some(nonce) = onchain.nonce {
                let entry = out.entry(onchain.from).or_insert(nonce);
                *entry = (*entry).max(nonce);
            }
        }
    }
    out
}

impl NonceManager {
    pub fn new(rpc: Arc<dyn EthRpc>, state: &DeploymentState) -> Self {
        Self {
            rpc,
            max_used: in_flight_nonces(state),
        }
    }

    /// Next nonce for `sender`. Fails if the node's pending count disagrees
    /// with what this run has handed out.
    pub async fn get_next_nonce(&mut self, sender: Address) -> Result<u64, NonceError> {
        let pending = self
            .rpc
            .transaction_count(sender, BlockTag::Pending)
            .await?;
        let expected = match self.max_used.get(&sender) {
            Some(max) => max + 1,
            None => pending,
        };
        if expected != pending {
            return Err(NonceError::InvalidNonce {
                sender: address_to_string(&sender),
                expected,
                pending,
            });
        }
        self.max_used.insert(sender, expected);
        debug!(sender = %address_to_string(&sender), nonce = expected, "Allocated nonce");
        Ok(expected)
    }

    /// Give back a nonce whose transaction was never accepted by the node.
    pub fn revert(&mut self, sender: Address, nonce: u64) {
        if self.max_used.get(&sender) == Some(&nonce) {
            match nonce.checked_sub(1) {
                Some(previous) => {
                    self.max_used.insert(sender, previous);
                }
                None => {
                    self.max_used.remove(&sender);
                }
            }
        }
    }
}

struct InFlight {
    future_id: FutureId,
    interaction_id: u32,
    nonce: u64,
    hashes: Vec<H256>,
}

fn in_flight_by_sender(state: &DeploymentState) -> BTreeMap<Address, Vec<InFlight>> {
    let mut out: BTreeMap<Address, Vec<InFlight>> = BTreeMap::new();
    for exec in state.execution_states.values() {
        if exec.status != ExecutionStatus::Started {
            continue;
        }
        for onchain in exec.pending_onchain() {
            let Some(nonce) = onchain.nonce else { continue };
            out.entry(onchain.from).or_default().push(InFlight {
                future_id: exec.id.clone(),
                interaction_id: onchain.id,
                nonce,
                hashes: onchain.transactions.iter().map(|t| t.hash).collect(),
            });
        }
    }
    for list in out.values_mut() {
        list.sort_by_key(|i| i.nonce);
    }
    out
}

/// Messages that bring in-flight interactions in line with the chain.
///
/// `senders` are the accounts that un-started futures will send from; they
/// are checked for foreign pending transactions too.
pub async fn nonce_sync_messages(
    rpc: &dyn EthRpc,
    state: &DeploymentState,
    senders: &BTreeSet<Address>,
    required_confirmations: u64,
) -> Result<Vec<JournalMessage>, NonceError> {
    let latest_block = rpc.latest_block().await?;
    let safe_block = latest_block
        .number
        .saturating_sub(required_confirmations.saturating_sub(1));

    let in_flight = in_flight_by_sender(state);
    let all_senders: BTreeSet<Address> = senders
        .iter()
        .copied()
        .chain(in_flight.keys().copied())
        .collect();

    let mut messages = Vec::new();
    for sender in all_senders {
        let safe_count = rpc
            .transaction_count(sender, BlockTag::Number(safe_block))
            .await?;
        let pending_count = rpc.transaction_count(sender, BlockTag::Pending).await?;
        let latest_count = rpc.transaction_count(sender, BlockTag::Latest).await?;
        let sender_str = address_to_string(&sender);

        let Some(interactions) = in_flight.get(&sender) else {
            if pending_count != latest_count {
                return Err(NonceError::PendingTransactions {
                    sender: sender_str,
                    count: pending_count.saturating_sub(latest_count),
                });
            }
            if latest_count != safe_count {
                return Err(NonceError::WaitingForConfirmations {
                    sender: sender_str,
                    required: required_confirmations,
                });
            }
            continue;
        };

        for interaction in interactions {
            let mut known = false;
            for hash in &interaction.hashes {
                if rpc.get_transaction(*hash).await?.is_some() {
                    known = true;
                    break;
                }
            }
            if known {
                continue;
            }

            if interaction.nonce < latest_count {
                if interaction.nonce < safe_count {
                    warn!(
                        future = %interaction.future_id,
                        nonce = interaction.nonce,
                        "Transaction was replaced by another one sent from {}", sender_str
                    );
                    messages.push(JournalMessage::ResetAfterInterference {
                        future_id: interaction.future_id.clone(),
                        interaction_id: interaction.interaction_id,
                        reason: InterferenceReason::ReplacedByUser,
                    });
                } else {
                    return Err(NonceError::WaitingForNonce {
                        sender: sender_str,
                        nonce: interaction.nonce,
                        required: required_confirmations,
                    });
                }
            } else if interaction.nonce < pending_count {
                return Err(NonceError::WaitingForNonce {
                    sender: sender_str,
                    nonce: interaction.nonce,
                    required: required_confirmations,
                });
            } else {
                warn!(
                    future = %interaction.future_id,
                    nonce = interaction.nonce,
                    "Transaction was dropped from the mempool and will be resent"
                );
                messages.push(JournalMessage::ResetAfterInterference {
                    future_id: interaction.future_id.clone(),
                    interaction_id: interaction.interaction_id,
                    reason: InterferenceReason::Dropped,
                });
            }
        }
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::replay;
    use ethers_core::types::{Bytes, U256};
    use ignition_transport::{MockChain, TransactionRequest};
    use ignition_types::{
        ExecutionDetails, FutureKind, NetworkFees, NetworkInteractionRequest, SendDataDetails,
        Transaction,
    };

    fn in_flight_state(from: Address, nonce: u64, hash: H256) -> DeploymentState {
        let id = "M#send".to_string();
        replay(&[
            JournalMessage::InitializeExecutionState {
                future_id: id.clone(),
                future_kind: FutureKind::SendData,
                strategy: "basic".to_string(),
                dependencies: BTreeSet::new(),
                details: ExecutionDetails::SendData(SendDataDetails {
                    to: from,
                    data: Bytes::new(),
                    value: U256::zero(),
                    from,
                }),
            },
            JournalMessage::StartNetworkInteraction {
                future_id: id.clone(),
                interaction: NetworkInteractionRequest::Onchain {
                    id: 1,
                    to: Some(from),
                    data: Bytes::new(),
                    value: U256::zero(),
                    from,
                },
            },
            JournalMessage::SendTransaction {
                future_id: id,
                interaction_id: 1,
                nonce,
                transaction: Transaction {
                    hash,
                    fees: NetworkFees::Legacy {
                        gas_price: U256::one(),
                    },
                    receipt: None,
                },
            },
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_nonces_are_sequential_without_gaps() -> Result<(), NonceError> {
        let chain = Arc::new(MockChain::default());
        chain.set_auto_mine(false);
        let sender = chain.account(0);
        let mut manager = NonceManager::new(chain.clone(), &DeploymentState::default());
        let mut nonces = Vec::new();
        for _ in 0..4 {
            let nonce = manager.get_next_nonce(sender).await?;
            chain
                .send_transaction(&TransactionRequest {
                    from: sender,
                    to: Some(sender),
                    nonce: Some(nonce),
                    ..Default::default()
                })
                .await?;
            nonces.push(nonce);
        }
        assert_eq!(nonces, vec![0, 1, 2, 3]);
        Ok(())
    }

    #[tokio::test]
    async fn test_foreign_transaction_is_detected() {
        let chain = Arc::new(MockChain::default());
        chain.set_auto_mine(false);
        let sender = chain.account(0);
        let mut manager = NonceManager::new(chain.clone(), &DeploymentState::default());
        assert_eq!(manager.get_next_nonce(sender).await.unwrap(), 0);
        chain.inject_external_pending(sender);
        chain.inject_external_pending(sender);
        let err = manager.get_next_nonce(sender).await.unwrap_err();
        assert!(matches!(err, NonceError::InvalidNonce { expected: 1, pending: 2, .. }));
    }

    #[tokio::test]
    async fn test_revert_returns_nonce() -> Result<(), NonceError> {
        let chain = Arc::new(MockChain::default());
        let sender = chain.account(0);
        let mut manager = NonceManager::new(chain.clone(), &DeploymentState::default());
        let nonce = manager.get_next_nonce(sender).await?;
        manager.revert(sender, nonce);
        assert_eq!(manager.get_next_nonce(sender).await?, nonce);
        Ok(())
    }

    #[tokio::test]
    async fn test_sync_rejects_foreign_pending_transactions() {
        let chain = MockChain::default();
        chain.set_auto_mine(false);
        let sender = chain.account(0);
        chain.inject_external_pending(sender);
        let err = nonce_sync_messages(
            &chain,
            &DeploymentState::default(),
            &BTreeSet::from([sender]),
            1,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("pending transactions"), "{err}");
    }

    #[tokio::test]
    async fn test_sync_resets_dropped_and_replaced() -> Result<(), NonceError> {
        let chain = MockChain::default();
        chain.set_auto_mine(false);
        let sender = chain.account(0);

        // Dropped: the node forgot our transaction.
        let hash = chain
            .send_transaction(&TransactionRequest {
                from: sender,
                to: Some(sender),
                ..Default::default()
            })
            .await?;
        let state = in_flight_state(sender, 0, hash);
        assert!(nonce_sync_messages(&chain, &state, &BTreeSet::new(), 1)
            .await?
            .is_empty());
        chain.drop_transaction(hash);
        let messages = nonce_sync_messages(&chain, &state, &BTreeSet::new(), 1).await?;
        assert!(matches!(
            messages.as_slice(),
            [JournalMessage::ResetAfterInterference {
                reason: InterferenceReason::Dropped,
                ..
            }]
        ));

        // Replaced: another transaction at our nonce was mined.
        let hash = chain
            .send_transaction(&TransactionRequest {
                from: sender,
                to: Some(sender),
                ..Default::default()
            })
            .await?;
        chain.replace_with_external(hash);
        let state = in_flight_state(sender, 0, hash);
        let messages = nonce_sync_messages(&chain, &state, &BTreeSet::new(), 1).await?;
        assert!(matches!(
            messages.as_slice(),
            [JournalMessage::ResetAfterInterference {
                reason: InterferenceReason::ReplacedByUser,
                ..
            }]
        ));

        // Not deep enough yet.
        let err = nonce_sync_messages(&chain, &state, &BTreeSet::new(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, NonceError::WaitingForNonce { nonce: 0, .. }));
        Ok(())
    }

    #[test]
    fn test_in_flight_nonces_only_counts_unconfirmed() {
        let sender = Address::from_low_u64_be(1);
        let state = in_flight_state(sender, 7, H256::from_low_u64_be(1));
        assert_eq!(in_flight_nonces(&state).get(&sender), Some(&7));
    }
}
