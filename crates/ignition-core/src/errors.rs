//! Error types for the execution engine.
//!
//! Per-future failures (reverts, RPC errors while sending, decode failures)
//! are not errors at this level: they are journaled as an
//! [`ExecutionResult`](ignition_types::ExecutionResult) and the run carries on.
//! The types here are for conditions that abort a run.

use ethers_core::types::H256;
use ignition_transport::RpcError;
use thiserror::Error;

/// Nonce allocation and synchronisation failures. Always fatal for the run.
#[derive(Debug, Error)]
pub enum NonceError {
    #[error(
        "Account {sender} has {count} pending transactions that were not sent by this deployment. \
         Wait for them to be confirmed or replaced before running again"
    )]
    PendingTransactions { sender: String, count: u64 },

    #[error(
        "Account {sender} has transactions that are not yet {required} blocks deep. \
         Wait for them to be confirmed before running again"
    )]
    WaitingForConfirmations { sender: String, required: u64 },

    #[error(
        "The transaction with nonce {nonce} from {sender} was replaced by another transaction \
         that is not yet {required} blocks deep. Wait for it to be confirmed before running again"
    )]
    WaitingForNonce {
        sender: String,
        nonce: u64,
        required: u64,
    },

    #[error(
        "The next nonce for {sender} should be {expected}, but the network reports {pending}. \
         Another process may be sending transactions from this account"
    )]
    InvalidNonce {
        sender: String,
        expected: u64,
        pending: u64,
    },

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// A journal message that cannot be applied to the current state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReducerError {
    #[error("{message_type} refers to unknown future {future_id}")]
    UnknownFuture {
        future_id: String,
        message_type: &'static str,
    },

    #[error("Future {future_id} has no network interaction {interaction_id}")]
    UnknownInteraction { future_id: String, interaction_id: u32 },

    #[error("Future {future_id} has no transaction {hash:#x}")]
    UnknownTransaction { future_id: String, hash: H256 },

    #[error("Invalid journal: {0}")]
    Invariant(String),
}

/// Failures inside an execution strategy. Journaled as a failed result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error("ABI error: {0}")]
    Abi(String),

    #[error("Failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error("Unexpected interaction outcome: {0}")]
    UnexpectedOutcome(String),

    #[error("Unknown execution strategy '{0}'")]
    UnknownStrategy(String),
}

/// Fatal errors that stop a run.
#[derive(Debug, Error)]
pub enum IgnitionError {
    #[error(transparent)]
    Nonce(#[from] NonceError),

    #[error(transparent)]
    Reducer(#[from] ReducerError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(
        "The deployment was created for chain {stored}, but the connected network has chain id {current}"
    )]
    ChainIdMismatch { stored: u64, current: u64 },

    #[error("Internal invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IgnitionError {
    pub fn invariant(message: impl Into<String>) -> Self {
        IgnitionError::Invariant(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_transactions_message() {
        let err = IgnitionError::from(NonceError::PendingTransactions {
            sender: "0xabc".to_string(),
            count: 2,
        });
        let msg = err.to_string();
        assert!(msg.contains("pending transactions"), "{msg}");
        assert!(msg.contains("0xabc"));
    }

    #[test]
    fn test_reducer_error_formats_hash() {
        let err = ReducerError::UnknownTransaction {
            future_id: "M#A".to_string(),
            hash: H256::from_low_u64_be(1),
        };
        assert!(err
            .to_string()
            .ends_with("0x0000000000000000000000000000000000000000000000000000000000000001"));
    }

    #[test]
    fn test_anyhow_converts_to_other() {
        let err: IgnitionError = anyhow::anyhow!("disk full").into();
        assert_eq!(err.to_string(), "disk full");
    }
}
