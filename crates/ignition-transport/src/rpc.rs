//! The JSON-RPC surface the deployment engine needs.
//!
//! Everything is request/response; the engine polls rather than subscribes.

use async_trait::async_trait;
use ethers_core::types::{Address, Bytes, H256, U256};
use ignition_types::{NetworkFees, RawCallResult, TransactionReceipt};
use serde_json::Value;
use thiserror::Error;

/// Block selector for `eth_getTransactionCount` and `eth_call`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Pending,
    Number(u64),
}

impl BlockTag {
    pub fn to_param(self) -> Value {
        match self {
            BlockTag::Latest => Value::String("latest".to_string()),
            BlockTag::Pending => Value::String("pending".to_string()),
            BlockTag::Number(n) => Value::String(format!("0x{:x}", n)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub hash: H256,
    pub base_fee_per_gas: Option<U256>,
}

/// An unsigned transaction for `eth_sendTransaction`, `eth_call` and
/// `eth_estimateGas`. The node holds the sender's keys.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
    pub nonce: Option<u64>,
    pub gas: Option<U256>,
    pub fees: Option<NetworkFees>,
}

impl TransactionRequest {
    /// JSON-RPC transaction object.
    pub fn to_param(&self) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert("from".into(), Value::String(format!("{:#x}", self.from)));
        if let Some(to) = self.to {
            obj.insert("to".into(), Value::String(format!("{:#x}", to)));
        }
        obj.insert("data".into(), Value::String(self.data.to_string()));
        obj.insert("value".into(), Value::String(format!("{:#x}", self.value)));
        if let Some(nonce) = self.nonce {
            obj.insert("nonce".into(), Value::String(format!("0x{:x}", nonce)));
        }
        if let Some(gas) = self.gas {
            obj.insert("gas".into(), Value::String(format!("{:#x}", gas)));
        }
        match self.fees {
            Some(NetworkFees::Legacy { gas_price }) => {
                obj.insert("gasPrice".into(), Value::String(format!("{:#x}", gas_price)));
            }
            Some(NetworkFees::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            }) => {
                obj.insert(
                    "maxFeePerGas".into(),
                    Value::String(format!("{:#x}", max_fee_per_gas)),
                );
                obj.insert(
                    "maxPriorityFeePerGas".into(),
                    Value::String(format!("{:#x}", max_priority_fee_per_gas)),
                );
            }
            None => {}
        }
        Value::Object(obj)
    }
}

/// A transaction as the node reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcTransaction {
    pub hash: H256,
    pub from: Address,
    pub nonce: u64,
    pub fees: NetworkFees,
    pub block_number: Option<u64>,
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error calling {method}: {message}")]
    Transport { method: String, message: String },

    #[error("{method} failed with code {code}: {message}")]
    JsonRpc {
        method: String,
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("invalid response to {method}: {message}")]
    InvalidResponse { method: String, message: String },
}

impl RpcError {
    pub fn invalid(method: &str, message: impl Into<String>) -> Self {
        RpcError::InvalidResponse {
            method: method.to_string(),
            message: message.into(),
        }
    }

    /// Transport failures are worth retrying; node-side errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RpcError::Transport { .. })
    }
}

/// JSON-RPC client used by the engine.
#[async_trait]
pub trait EthRpc: Send + Sync {
    async fn chain_id(&self) -> Result<u64, RpcError>;

    /// Accounts the node can sign for.
    async fn accounts(&self) -> Result<Vec<Address>, RpcError>;

    async fn latest_block(&self) -> Result<Block, RpcError>;

    async fn transaction_count(&self, address: Address, tag: BlockTag) -> Result<u64, RpcError>;

    /// Suggested fees for a new transaction.
    async fn network_fees(&self) -> Result<NetworkFees, RpcError>;

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<U256, RpcError>;

    /// `eth_call`. A revert is a successful RPC with `success == false`.
    async fn call(&self, tx: &TransactionRequest, tag: BlockTag) -> Result<RawCallResult, RpcError>;

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<H256, RpcError>;

    async fn get_transaction(&self, hash: H256) -> Result<Option<RpcTransaction>, RpcError>;

    async fn get_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>, RpcError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_param_shape() {
        let req = TransactionRequest {
            from: Address::from_low_u64_be(1),
            to: None,
            data: Bytes::from(vec![0x60, 0x80]),
            value: U256::from(16),
            nonce: Some(2),
            gas: None,
            fees: Some(NetworkFees::Legacy {
                gas_price: U256::from(255),
            }),
        };
        let param = req.to_param();
        assert_eq!(param["from"], "0x0000000000000000000000000000000000000001");
        assert!(param.get("to").is_none());
        assert_eq!(param["data"], "0x6080");
        assert_eq!(param["value"], "0x10");
        assert_eq!(param["nonce"], "0x2");
        assert_eq!(param["gasPrice"], "0xff");
    }

    #[test]
    fn test_block_tag_params() {
        assert_eq!(BlockTag::Latest.to_param(), "latest");
        assert_eq!(BlockTag::Pending.to_param(), "pending");
        assert_eq!(BlockTag::Number(16).to_param(), "0x10");
    }
}
