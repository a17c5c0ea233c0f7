//! Execution state records.
//!
//! An [`ExecutionState`] is the durable record of one future's progress. It is
//! created by the first journal message that mentions the future and is only
//! ever changed by the reducer applying further messages. Everything here is
//! plain data with serde support so the journal can round-trip it.

use std::collections::BTreeSet;
use std::fmt;

use ethers_core::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::address_to_string;

/// Fully qualified future id, `"<ModuleId>#<LocalId>"`.
pub type FutureId = String;

// =============================================================================
// Kinds and statuses
// =============================================================================

/// The declared kind of a future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FutureKind {
    NamedArtifactContractDeployment,
    ContractDeployment,
    NamedArtifactLibraryDeployment,
    LibraryDeployment,
    ContractCall,
    StaticCall,
    NamedArtifactContractAt,
    ContractAt,
    ReadEventArgument,
    SendData,
}

impl FutureKind {
    /// The execution state shape used to track futures of this kind.
    pub fn execution_state_kind(self) -> ExecutionStateKind {
        match self {
            FutureKind::NamedArtifactContractDeployment
            | FutureKind::ContractDeployment
            | FutureKind::NamedArtifactLibraryDeployment
            | FutureKind::LibraryDeployment => ExecutionStateKind::Deployment,
            FutureKind::ContractCall => ExecutionStateKind::Call,
            FutureKind::StaticCall => ExecutionStateKind::StaticCall,
            FutureKind::NamedArtifactContractAt | FutureKind::ContractAt => {
                ExecutionStateKind::ContractAt
            }
            FutureKind::ReadEventArgument => ExecutionStateKind::ReadEventArgument,
            FutureKind::SendData => ExecutionStateKind::SendData,
        }
    }

    /// True for kinds whose success output is a contract address.
    pub fn produces_address(self) -> bool {
        matches!(
            self.execution_state_kind(),
            ExecutionStateKind::Deployment | ExecutionStateKind::ContractAt
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FutureKind::NamedArtifactContractDeployment => "NAMED_ARTIFACT_CONTRACT_DEPLOYMENT",
            FutureKind::ContractDeployment => "CONTRACT_DEPLOYMENT",
            FutureKind::NamedArtifactLibraryDeployment => "NAMED_ARTIFACT_LIBRARY_DEPLOYMENT",
            FutureKind::LibraryDeployment => "LIBRARY_DEPLOYMENT",
            FutureKind::ContractCall => "CONTRACT_CALL",
            FutureKind::StaticCall => "STATIC_CALL",
            FutureKind::NamedArtifactContractAt => "NAMED_ARTIFACT_CONTRACT_AT",
            FutureKind::ContractAt => "CONTRACT_AT",
            FutureKind::ReadEventArgument => "READ_EVENT_ARGUMENT",
            FutureKind::SendData => "SEND_DATA",
        }
    }
}

impl fmt::Display for FutureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of the kind-specific part of an execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStateKind {
    Deployment,
    Call,
    StaticCall,
    ContractAt,
    ReadEventArgument,
    SendData,
}

/// Status of an execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Started,
    Success,
    Failed,
    Timeout,
    Held,
}

impl ExecutionStatus {
    /// A future in a terminal status needs no more ticks in the current run.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Started)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Started => "STARTED",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Timeout => "TIMEOUT",
            ExecutionStatus::Held => "HELD",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Transactions
// =============================================================================

/// Fee parameters of a sent transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NetworkFees {
    #[serde(rename_all = "camelCase")]
    Legacy { gas_price: U256 },
    #[serde(rename_all = "camelCase")]
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

impl NetworkFees {
    /// Scale every fee component by `percent / 100`.
    pub fn bumped(&self, percent: u64) -> NetworkFees {
        let scale = |v: U256| v.saturating_mul(U256::from(percent)) / U256::from(100u64);
        match *self {
            NetworkFees::Legacy { gas_price } => NetworkFees::Legacy {
                gas_price: scale(gas_price),
            },
            NetworkFees::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => NetworkFees::Eip1559 {
                max_fee_per_gas: scale(max_fee_per_gas),
                max_priority_fee_per_gas: scale(max_priority_fee_per_gas),
            },
        }
    }

    /// Component-wise maximum. When the variants differ the network's fees win.
    pub fn max_with(&self, network: &NetworkFees) -> NetworkFees {
        match (*self, *network) {
            (NetworkFees::Legacy { gas_price: a }, NetworkFees::Legacy { gas_price: b }) => {
                NetworkFees::Legacy {
                    gas_price: a.max(b),
                }
            }
            (
                NetworkFees::Eip1559 {
                    max_fee_per_gas: a_max,
                    max_priority_fee_per_gas: a_prio,
                },
                NetworkFees::Eip1559 {
                    max_fee_per_gas: b_max,
                    max_priority_fee_per_gas: b_prio,
                },
            ) => NetworkFees::Eip1559 {
                max_fee_per_gas: a_max.max(b_max),
                max_priority_fee_per_gas: a_prio.max(b_prio),
            },
            (_, other) => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLog {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub block_hash: H256,
    pub block_number: u64,
    pub status: ReceiptStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub logs: Vec<ReceiptLog>,
}

/// One transaction sent for an on-chain interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: H256,
    pub fees: NetworkFees,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<TransactionReceipt>,
}

// =============================================================================
// Network interactions
// =============================================================================

/// An interaction that needs a signed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnchainInteraction {
    pub id: u32,
    /// Absent for contract creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
    pub from: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub should_be_resent: bool,
}

impl OnchainInteraction {
    /// The transaction that has a receipt, if any.
    pub fn confirmed_transaction(&self) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.receipt.is_some())
    }

    pub fn last_transaction(&self) -> Option<&Transaction> {
        self.transactions.last()
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed_transaction().is_some()
    }
}

/// Outcome of an `eth_call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCallResult {
    pub return_data: Bytes,
    pub success: bool,
}

/// A local read performed with `eth_call`; no transaction is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticCallInteraction {
    pub id: u32,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub from: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RawCallResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkInteraction {
    Onchain(OnchainInteraction),
    StaticCall(StaticCallInteraction),
}

impl NetworkInteraction {
    pub fn id(&self) -> u32 {
        match self {
            NetworkInteraction::Onchain(i) => i.id,
            NetworkInteraction::StaticCall(i) => i.id,
        }
    }

    /// Whether the interaction has everything the strategy needs to continue.
    pub fn is_complete(&self) -> bool {
        match self {
            NetworkInteraction::Onchain(i) => i.is_confirmed(),
            NetworkInteraction::StaticCall(i) => i.result.is_some(),
        }
    }
}

/// What a strategy asks the processor to do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkInteractionRequest {
    Onchain {
        id: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<Address>,
        data: Bytes,
        value: U256,
        from: Address,
    },
    StaticCall {
        id: u32,
        to: Address,
        data: Bytes,
        value: U256,
        from: Address,
    },
}

impl NetworkInteractionRequest {
    pub fn id(&self) -> u32 {
        match self {
            NetworkInteractionRequest::Onchain { id, .. } => *id,
            NetworkInteractionRequest::StaticCall { id, .. } => *id,
        }
    }

    /// Fresh interaction record for this request, with nothing sent yet.
    pub fn to_interaction(&self) -> NetworkInteraction {
        match self.clone() {
            NetworkInteractionRequest::Onchain {
                id,
                to,
                data,
                value,
                from,
            } => NetworkInteraction::Onchain(OnchainInteraction {
                id,
                to,
                data,
                value,
                from,
                nonce: None,
                transactions: Vec::new(),
                should_be_resent: false,
            }),
            NetworkInteractionRequest::StaticCall {
                id,
                to,
                data,
                value,
                from,
            } => NetworkInteraction::StaticCall(StaticCallInteraction {
                id,
                to,
                data,
                value,
                from,
                result: None,
            }),
        }
    }

    /// True when a recorded interaction was produced by this same request.
    pub fn matches(&self, recorded: &NetworkInteraction) -> bool {
        match (self, recorded) {
            (
                NetworkInteractionRequest::Onchain {
                    id,
                    to,
                    data,
                    value,
                    from,
                },
                NetworkInteraction::Onchain(r),
            ) => *id == r.id && *to == r.to && *data == r.data && *value == r.value && *from == r.from,
            (
                NetworkInteractionRequest::StaticCall {
                    id,
                    to,
                    data,
                    value,
                    from,
                },
                NetworkInteraction::StaticCall(r),
            ) => *id == r.id && *to == r.to && *data == r.data && *value == r.value && *from == r.from,
            _ => false,
        }
    }
}

// =============================================================================
// Results
// =============================================================================

/// A decoded revert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvmExecutionError {
    RevertWithoutReason,
    RevertWithReason {
        message: String,
    },
    RevertWithPanicCode {
        code: U256,
        name: String,
    },
    RevertWithCustomError {
        name: String,
        args: Value,
    },
    RevertWithUnknownCustomError {
        signature: String,
        data: Bytes,
    },
    RevertWithInvalidData {
        data: Bytes,
    },
}

impl fmt::Display for EvmExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvmExecutionError::RevertWithoutReason => {
                write!(f, "Transaction reverted without a reason")
            }
            EvmExecutionError::RevertWithReason { message } => {
                write!(f, "Reverted with reason \"{}\"", message)
            }
            EvmExecutionError::RevertWithPanicCode { code, name } => {
                write!(f, "Reverted with panic code {:#x} ({})", code, name)
            }
            EvmExecutionError::RevertWithCustomError { name, args } => {
                write!(f, "Reverted with custom error {}({})", name, args)
            }
            EvmExecutionError::RevertWithUnknownCustomError { signature, data } => write!(
                f,
                "Reverted with unknown custom error (signature {}, data {})",
                signature, data
            ),
            EvmExecutionError::RevertWithInvalidData { data } => {
                write!(f, "Reverted with invalid return data {}", data)
            }
        }
    }
}

/// The value a successful future produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuccessOutput {
    Deployment { address: Address },
    Call,
    StaticCall { value: Value },
    ContractAt { address: Address },
    ReadEventArgument { value: Value },
    SendData,
}

impl SuccessOutput {
    pub fn address(&self) -> Option<Address> {
        match self {
            SuccessOutput::Deployment { address } | SuccessOutput::ContractAt { address } => {
                Some(*address)
            }
            _ => None,
        }
    }

    /// The value other futures see when they reference this one.
    pub fn as_json(&self) -> Value {
        match self {
            SuccessOutput::Deployment { address } | SuccessOutput::ContractAt { address } => {
                Value::String(address_to_string(address))
            }
            SuccessOutput::StaticCall { value } | SuccessOutput::ReadEventArgument { value } => {
                value.clone()
            }
            SuccessOutput::Call | SuccessOutput::SendData => Value::Null,
        }
    }
}

/// Terminal outcome of a future.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionResult {
    Success { output: SuccessOutput },
    RevertedTransaction { tx_hash: H256 },
    SimulationError { error: EvmExecutionError },
    StaticCallError { error: EvmExecutionError },
    StrategyError { message: String },
    NetworkError { message: String },
    Held { held_id: u32, reason: String },
}

impl ExecutionResult {
    pub fn status(&self) -> ExecutionStatus {
        match self {
            ExecutionResult::Success { .. } => ExecutionStatus::Success,
            ExecutionResult::Held { .. } => ExecutionStatus::Held,
            _ => ExecutionStatus::Failed,
        }
    }

    pub fn success_output(&self) -> Option<&SuccessOutput> {
        match self {
            ExecutionResult::Success { output } => Some(output),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionResult::Success { .. } => write!(f, "Success"),
            ExecutionResult::RevertedTransaction { tx_hash } => {
                write!(f, "Transaction {:#x} reverted", tx_hash)
            }
            ExecutionResult::SimulationError { error } => {
                write!(f, "Simulating the transaction failed: {}", error)
            }
            ExecutionResult::StaticCallError { error } => {
                write!(f, "Static call failed: {}", error)
            }
            ExecutionResult::StrategyError { message } => write!(f, "{}", message),
            ExecutionResult::NetworkError { message } => write!(f, "Network error: {}", message),
            ExecutionResult::Held { held_id, reason } => {
                write!(f, "Held ({}): {}", held_id, reason)
            }
        }
    }
}

// =============================================================================
// Kind-specific details
// =============================================================================

/// Selects a static call output or event argument by name or position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameOrIndex {
    Index(usize),
    Name(String),
}

impl Default for NameOrIndex {
    fn default() -> Self {
        NameOrIndex::Index(0)
    }
}

impl fmt::Display for NameOrIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameOrIndex::Index(i) => write!(f, "{}", i),
            NameOrIndex::Name(n) => f.write_str(n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentDetails {
    pub contract_name: String,
    pub constructor_args: Vec<Value>,
    #[serde(default)]
    pub libraries: std::collections::BTreeMap<String, Address>,
    pub value: U256,
    pub from: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallDetails {
    /// Future whose artifact holds the ABI.
    pub artifact_id: FutureId,
    pub contract_address: Address,
    pub function_name: String,
    pub args: Vec<Value>,
    pub value: U256,
    pub from: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticCallDetails {
    pub artifact_id: FutureId,
    pub contract_address: Address,
    pub function_name: String,
    pub args: Vec<Value>,
    pub name_or_index: NameOrIndex,
    pub from: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAtDetails {
    pub contract_name: String,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadEventArgumentDetails {
    pub artifact_id: FutureId,
    pub event_name: String,
    pub event_index: usize,
    pub name_or_index: NameOrIndex,
    pub emitter_address: Address,
    pub tx_to_read_from: H256,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendDataDetails {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub from: Address,
}

/// Fully resolved inputs of a future. No references remain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionDetails {
    Deployment(DeploymentDetails),
    Call(CallDetails),
    StaticCall(StaticCallDetails),
    ContractAt(ContractAtDetails),
    ReadEventArgument(ReadEventArgumentDetails),
    SendData(SendDataDetails),
}

impl ExecutionDetails {
    pub fn kind(&self) -> ExecutionStateKind {
        match self {
            ExecutionDetails::Deployment(_) => ExecutionStateKind::Deployment,
            ExecutionDetails::Call(_) => ExecutionStateKind::Call,
            ExecutionDetails::StaticCall(_) => ExecutionStateKind::StaticCall,
            ExecutionDetails::ContractAt(_) => ExecutionStateKind::ContractAt,
            ExecutionDetails::ReadEventArgument(_) => ExecutionStateKind::ReadEventArgument,
            ExecutionDetails::SendData(_) => ExecutionStateKind::SendData,
        }
    }

    /// Sender, for kinds that send or simulate from an account.
    pub fn from(&self) -> Option<Address> {
        match self {
            ExecutionDetails::Deployment(d) => Some(d.from),
            ExecutionDetails::Call(d) => Some(d.from),
            ExecutionDetails::StaticCall(d) => Some(d.from),
            ExecutionDetails::SendData(d) => Some(d.from),
            ExecutionDetails::ContractAt(_) | ExecutionDetails::ReadEventArgument(_) => None,
        }
    }
}

// =============================================================================
// Execution state
// =============================================================================

/// Durable progress record of one future.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    pub id: FutureId,
    pub future_kind: FutureKind,
    pub strategy: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub dependencies: BTreeSet<FutureId>,
    #[serde(default)]
    pub network_interactions: Vec<NetworkInteraction>,
    pub details: ExecutionDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionResult>,
}

impl ExecutionState {
    pub fn kind(&self) -> ExecutionStateKind {
        self.details.kind()
    }

    pub fn interaction(&self, id: u32) -> Option<&NetworkInteraction> {
        self.network_interactions.iter().find(|i| i.id() == id)
    }

    pub fn interaction_mut(&mut self, id: u32) -> Option<&mut NetworkInteraction> {
        self.network_interactions.iter_mut().find(|i| i.id() == id)
    }

    /// The most recent interaction, which is the only one that can be in flight.
    pub fn last_interaction(&self) -> Option<&NetworkInteraction> {
        self.network_interactions.last()
    }

    /// On-chain interactions that have been sent but not confirmed.
    pub fn pending_onchain(&self) -> impl Iterator<Item = &OnchainInteraction> {
        self.network_interactions.iter().filter_map(|i| match i {
            NetworkInteraction::Onchain(o) if o.nonce.is_some() && !o.is_confirmed() => Some(o),
            _ => None,
        })
    }

    /// Highest nonce recorded for `sender` in this state.
    pub fn max_nonce_for(&self, sender: Address) -> Option<u64> {
        self.network_interactions
            .iter()
            .filter_map(|i| match i {
                NetworkInteraction::Onchain(o) if o.from == sender => o.nonce,
                _ => None,
            })
            .max()
    }

    /// The address this future resolved to, once successful.
    pub fn success_address(&self) -> Option<Address> {
        self.result
            .as_ref()
            .and_then(ExecutionResult::success_output)
            .and_then(SuccessOutput::address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn test_fees_bump_and_max() {
        let fees = NetworkFees::Eip1559 {
            max_fee_per_gas: U256::from(100),
            max_priority_fee_per_gas: U256::from(10),
        };
        let bumped = fees.bumped(110);
        assert_eq!(
            bumped,
            NetworkFees::Eip1559 {
                max_fee_per_gas: U256::from(110),
                max_priority_fee_per_gas: U256::from(11),
            }
        );
        let network = NetworkFees::Eip1559 {
            max_fee_per_gas: U256::from(200),
            max_priority_fee_per_gas: U256::from(5),
        };
        assert_eq!(
            bumped.max_with(&network),
            NetworkFees::Eip1559 {
                max_fee_per_gas: U256::from(200),
                max_priority_fee_per_gas: U256::from(11),
            }
        );
        let legacy = NetworkFees::Legacy {
            gas_price: U256::from(7),
        };
        assert_eq!(bumped.max_with(&legacy), legacy);
    }

    #[test]
    fn test_status_terminality() {
        assert!(!ExecutionStatus::Started.is_terminal());
        for s in [
            ExecutionStatus::Success,
            ExecutionStatus::Failed,
            ExecutionStatus::Timeout,
            ExecutionStatus::Held,
        ] {
            assert!(s.is_terminal());
        }
    }

    #[test]
    fn test_future_kind_serde_and_shape() {
        let json = serde_json::to_string(&FutureKind::NamedArtifactContractAt).unwrap();
        assert_eq!(json, "\"NAMED_ARTIFACT_CONTRACT_AT\"");
        assert_eq!(
            FutureKind::LibraryDeployment.execution_state_kind(),
            ExecutionStateKind::Deployment
        );
        assert!(FutureKind::ContractAt.produces_address());
        assert!(!FutureKind::StaticCall.produces_address());
    }

    #[test]
    fn test_request_matches_recorded_interaction() {
        let request = NetworkInteractionRequest::Onchain {
            id: 1,
            to: None,
            data: Bytes::from(vec![1, 2, 3]),
            value: U256::zero(),
            from: addr(1),
        };
        let mut recorded = request.to_interaction();
        assert!(request.matches(&recorded));
        if let NetworkInteraction::Onchain(o) = &mut recorded {
            o.value = U256::one();
        }
        assert!(!request.matches(&recorded));
    }

    #[test]
    fn test_execution_state_json_shape() {
        let state = ExecutionState {
            id: "Mod#Token".to_string(),
            future_kind: FutureKind::NamedArtifactContractDeployment,
            strategy: "basic".to_string(),
            status: ExecutionStatus::Started,
            dependencies: BTreeSet::new(),
            network_interactions: vec![],
            details: ExecutionDetails::Deployment(DeploymentDetails {
                contract_name: "Token".to_string(),
                constructor_args: vec![json!(1)],
                libraries: Default::default(),
                value: U256::zero(),
                from: addr(1),
            }),
            result: None,
        };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["details"]["kind"], "DEPLOYMENT");
        assert_eq!(value["futureKind"], "NAMED_ARTIFACT_CONTRACT_DEPLOYMENT");
        let back: ExecutionState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_name_or_index_untagged() {
        let n: NameOrIndex = serde_json::from_value(json!(2)).unwrap();
        assert_eq!(n, NameOrIndex::Index(2));
        let n: NameOrIndex = serde_json::from_value(json!("owner")).unwrap();
        assert_eq!(n, NameOrIndex::Name("owner".to_string()));
    }

    #[test]
    fn test_result_status_and_messages() {
        let held = ExecutionResult::Held {
            held_id: 1,
            reason: "multisig".to_string(),
        };
        assert_eq!(held.status(), ExecutionStatus::Held);
        let reverted = ExecutionResult::SimulationError {
            error: EvmExecutionError::RevertWithReason {
                message: "nope".to_string(),
            },
        };
        assert_eq!(reverted.status(), ExecutionStatus::Failed);
        assert_eq!(
            reverted.to_string(),
            "Simulating the transaction failed: Reverted with reason \"nope\""
        );
    }
}
