//! Journal messages.
//!
//! The journal is the only durable record of a deployment. Each message is a
//! self-describing JSON object tagged by `"type"`; a message names at most one
//! future, so any message can be replayed knowing only the state of that future.

use std::collections::BTreeSet;

use ethers_core::types::H256;
use serde::{Deserialize, Serialize};

use crate::execution::{
    ExecutionDetails, ExecutionResult, FutureId, FutureKind, NetworkInteractionRequest,
    RawCallResult, Transaction, TransactionReceipt,
};

/// Why a sent interaction was reset by nonce synchronisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterferenceReason {
    /// Another transaction confirmed at the interaction's nonce.
    ReplacedByUser,
    /// The node no longer knows any of the interaction's transactions.
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum JournalMessage {
    /// Start of an invocation against an existing or new deployment.
    #[serde(rename_all = "camelCase")]
    RunStart { chain_id: u64 },

    /// First message of a fresh deployment.
    #[serde(rename_all = "camelCase")]
    DeploymentInitialize { chain_id: u64 },

    #[serde(rename_all = "camelCase")]
    InitializeExecutionState {
        future_id: FutureId,
        future_kind: FutureKind,
        strategy: String,
        dependencies: BTreeSet<FutureId>,
        details: ExecutionDetails,
    },

    #[serde(rename_all = "camelCase")]
    StartNetworkInteraction {
        future_id: FutureId,
        interaction: NetworkInteractionRequest,
    },

    /// A transaction was sent. The first one for an interaction fixes its nonce.
    #[serde(rename_all = "camelCase")]
    SendTransaction {
        future_id: FutureId,
        interaction_id: u32,
        nonce: u64,
        transaction: Transaction,
    },

    #[serde(rename_all = "camelCase")]
    ConfirmTransaction {
        future_id: FutureId,
        interaction_id: u32,
        hash: H256,
        receipt: TransactionReceipt,
    },

    #[serde(rename_all = "camelCase")]
    StaticCallComplete {
        future_id: FutureId,
        interaction_id: u32,
        result: RawCallResult,
    },

    /// The pending transaction should be replaced with higher fees.
    #[serde(rename_all = "camelCase")]
    BumpFees {
        future_id: FutureId,
        interaction_id: u32,
    },

    #[serde(rename_all = "camelCase")]
    InteractionTimeout {
        future_id: FutureId,
        interaction_id: u32,
    },

    #[serde(rename_all = "camelCase")]
    ResetAfterInterference {
        future_id: FutureId,
        interaction_id: u32,
        reason: InterferenceReason,
    },

    #[serde(rename_all = "camelCase")]
    ExecutionResult {
        future_id: FutureId,
        result: ExecutionResult,
    },

    /// Forget a future so that it runs again from scratch.
    #[serde(rename_all = "camelCase")]
    Wipe { future_id: FutureId },
}

impl JournalMessage {
    /// The future this message applies to, if any.
    pub fn future_id(&self) -> Option<&str> {
        match self {
            JournalMessage::RunStart { .. } | JournalMessage::DeploymentInitialize { .. } => None,
            JournalMessage::InitializeExecutionState { future_id, .. }
            | JournalMessage::StartNetworkInteraction { future_id, .. }
            | JournalMessage::SendTransaction { future_id, .. }
            | JournalMessage::ConfirmTransaction { future_id, .. }
            | JournalMessage::StaticCallComplete { future_id, .. }
            | JournalMessage::BumpFees { future_id, .. }
            | JournalMessage::InteractionTimeout { future_id, .. }
            | JournalMessage::ResetAfterInterference { future_id, .. }
            | JournalMessage::ExecutionResult { future_id, .. }
            | JournalMessage::Wipe { future_id } => Some(future_id),
        }
    }

    /// Short name used in logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            JournalMessage::RunStart { .. } => "run-start",
            JournalMessage::DeploymentInitialize { .. } => "deployment-initialize",
            JournalMessage::InitializeExecutionState { .. } => "initialize-execution-state",
            JournalMessage::StartNetworkInteraction { .. } => "start-network-interaction",
            JournalMessage::SendTransaction { .. } => "send-transaction",
            JournalMessage::ConfirmTransaction { .. } => "confirm-transaction",
            JournalMessage::StaticCallComplete { .. } => "static-call-complete",
            JournalMessage::BumpFees { .. } => "bump-fees",
            JournalMessage::InteractionTimeout { .. } => "interaction-timeout",
            JournalMessage::ResetAfterInterference { .. } => "reset-after-interference",
            JournalMessage::ExecutionResult { .. } => "execution-result",
            JournalMessage::Wipe { .. } => "wipe",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::NetworkFees;
    use ethers_core::types::U256;
    use serde_json::json;

    #[test]
    fn test_message_wire_shape() {
        let msg = JournalMessage::SendTransaction {
            future_id: "M#A".to_string(),
            interaction_id: 1,
            nonce: 3,
            transaction: Transaction {
                hash: H256::from_low_u64_be(9),
                fees: NetworkFees::Legacy {
                    gas_price: U256::from(1),
                },
                receipt: None,
            },
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "send-transaction");
        assert_eq!(value["futureId"], "M#A");
        assert_eq!(value["interactionId"], 1);
        assert_eq!(value["transaction"]["fees"]["type"], "legacy");
        assert_eq!(msg.future_id(), Some("M#A"));
        assert_eq!(msg.type_name(), "send-transaction");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = serde_json::from_value::<JournalMessage>(json!({
            "type": "teleport-contract",
            "futureId": "M#A"
        }));
        assert!(err.is_err());
    }

    #[test]
    fn test_unknown_future_kind_is_rejected() {
        let err = serde_json::from_value::<JournalMessage>(json!({
            "type": "initialize-execution-state",
            "futureId": "M#A",
            "futureKind": "QUANTUM_DEPLOYMENT",
            "strategy": "basic",
            "dependencies": [],
            "details": {"kind": "SEND_DATA", "to": "0x0000000000000000000000000000000000000001",
                        "data": "0x", "value": "0x0",
                        "from": "0x0000000000000000000000000000000000000002"}
        }));
        assert!(err.is_err());
    }

    #[test]
    fn test_run_start_has_no_future() {
        let msg: JournalMessage =
            serde_json::from_value(json!({"type": "run-start", "chainId": 31337})).unwrap();
        assert_eq!(msg, JournalMessage::RunStart { chain_id: 31337 });
        assert!(msg.future_id().is_none());
    }
}
