//! Shared types for the ignition deployment workspace.
//!
//! This crate provides the data model every other crate in the workspace
//! speaks, breaking circular dependency chains between the transport, the
//! deployment store and the execution engine.
//!
//! ## Execution Types
//!
//! The [`execution`] module contains the durable per-future records:
//! - [`ExecutionState`](execution::ExecutionState) - progress of one future
//! - [`NetworkInteraction`](execution::NetworkInteraction) - on-chain or static-call step
//! - [`Transaction`](execution::Transaction) - one sent transaction and its receipt
//!
//! ## Journal Types
//!
//! The [`journal`] module contains [`JournalMessage`](journal::JournalMessage),
//! the append-only record from which all deployment state is derived.

pub mod address;
pub mod artifact;
pub mod encoding;
pub mod env_utils;
pub mod execution;
pub mod journal;

// Re-export commonly used types at crate root
pub use artifact::{Artifact, BuildInfo, LinkReference};
pub use execution::{
    CallDetails, ContractAtDetails, DeploymentDetails, EvmExecutionError, ExecutionDetails,
    ExecutionResult, ExecutionState, ExecutionStateKind, ExecutionStatus, FutureId, FutureKind,
    NameOrIndex, NetworkFees, NetworkInteraction, NetworkInteractionRequest, OnchainInteraction,
    RawCallResult, ReadEventArgumentDetails, ReceiptLog, ReceiptStatus, SendDataDetails,
    StaticCallDetails, StaticCallInteraction, SuccessOutput, Transaction, TransactionReceipt,
};
pub use journal::{InterferenceReason, JournalMessage};

pub use ethers_core::types::{Address, Bytes, H256, U256};

use std::time::Duration;

/// Configuration for retry behavior on network operations.
#[derive(Debug, Copy, Clone)]
pub struct RetryConfig {
    /// Number of retry attempts.
    pub retries: usize,
    /// Initial backoff duration between retries.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
}

impl RetryConfig {
    /// Create a new RetryConfig with the specified parameters.
    pub fn new(retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }

    /// Backoff before the given (zero-based) retry attempt, doubling up to `max_backoff`.
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16) as u32).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 4,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_millis(5000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_saturates() {
        let retry = RetryConfig::new(5, 100, 700);
        assert_eq!(retry.backoff_for(0), Duration::from_millis(100));
        assert_eq!(retry.backoff_for(1), Duration::from_millis(200));
        assert_eq!(retry.backoff_for(2), Duration::from_millis(400));
        assert_eq!(retry.backoff_for(3), Duration::from_millis(700));
        assert_eq!(retry.backoff_for(60), Duration::from_millis(700));
    }
}
