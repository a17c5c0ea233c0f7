//! Blocking JSON-RPC 2.0 client over HTTP.
//!
//! Requests go through a shared `ureq::Agent`; the async [`EthRpc`] methods
//! move each request onto the blocking thread pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers_core::types::{Address, Bytes, H256, U256, U64};
use ignition_types::env_utils::{env_duration_secs, prefixed};
use ignition_types::{
    NetworkFees, RawCallResult, ReceiptLog, ReceiptStatus, RetryConfig, TransactionReceipt,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::rpc::{Block, BlockTag, EthRpc, RpcError, RpcTransaction, TransactionRequest};

/// Priority fee used when the node does not implement `eth_maxPriorityFeePerGas`.
const FALLBACK_PRIORITY_FEE_WEI: u64 = 1_000_000_000;

struct Inner {
    endpoint: String,
    agent: ureq::Agent,
    retry: RetryConfig,
    next_id: AtomicU64,
}

/// JSON-RPC client for a single endpoint.
#[derive(Clone)]
pub struct HttpRpcClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for HttpRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRpcClient")
            .field("endpoint", &self.inner.endpoint)
            .finish()
    }
}

impl HttpRpcClient {
    /// Default request timeout in seconds (can be overridden by env).
    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    /// Default connect timeout in seconds (can be overridden by env).
    const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

    fn default_timeouts() -> (Duration, Duration) {
        (
            env_duration_secs(
                &prefixed("RPC_TIMEOUT_SECS"),
                Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            ),
            env_duration_secs(
                &prefixed("RPC_CONNECT_TIMEOUT_SECS"),
                Duration::from_secs(Self::DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
        )
    }

    /// Client with timeouts from the environment and default retries.
    pub fn new(endpoint: &str) -> Self {
        let (timeout, connect_timeout) = Self::default_timeouts();
        Self::with_config(endpoint, timeout, connect_timeout, RetryConfig::default())
    }

    pub fn with_config(
        endpoint: &str,
        timeout: Duration,
        connect_timeout: Duration,
        retry: RetryConfig,
    ) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .timeout_connect(connect_timeout)
            .build();
        Self {
            inner: Arc::new(Inner {
                endpoint: endpoint.to_string(),
                agent,
                retry,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Perform one JSON-RPC request, retrying transport failures when allowed.
    pub fn request_blocking(
        &self,
        method: &str,
        params: Value,
        retryable: bool,
    ) -> Result<Value, RpcError> {
        let attempts = if retryable { self.inner.retry.retries + 1 } else { 1 };
        let mut last_err = None;
        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = self.inner.retry.backoff_for(attempt - 1);
                warn!(method, attempt, ?backoff, "retrying JSON-RPC request");
                std::thread::sleep(backoff);
            }
            match self.request_once(method, &params) {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() => last_err = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| RpcError::Transport {
            method: method.to_string(),
            message: "no attempts made".to_string(),
        }))
    }

    fn request_once(&self, method: &str, params: &Value) -> Result<Value, RpcError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "JSON-RPC request");

        let response = match self
            .inner
            .agent
            .post(&self.inner.endpoint)
            .set("Content-Type", "application/json")
            .send_json(&body)
        {
            Ok(resp) => resp,
            // Some nodes answer JSON-RPC errors with a non-200 status.
            Err(ureq::Error::Status(_, resp)) => resp,
            Err(e) => {
                return Err(RpcError::Transport {
                    method: method.to_string(),
                    message: e.to_string(),
                })
            }
        };
        let response: Value = response.into_json().map_err(|e| RpcError::Transport {
            method: method.to_string(),
            message: format!("Failed to parse response body: {}", e),
        })?;
        parse_envelope(method, response)
    }

    async fn request<T: DeserializeOwned + Send + 'static>(
        &self,
        method: &'static str,
        params: Value,
        retryable: bool,
    ) -> Result<T, RpcError> {
        let client = self.clone();
        let value = tokio::task::spawn_blocking(move || {
            client.request_blocking(method, params, retryable)
        })
        .await
        .map_err(|e| RpcError::Transport {
            method: method.to_string(),
            message: format!("request task failed: {}", e),
        })??;
        serde_json::from_value(value).map_err(|e| RpcError::invalid(method, e.to_string()))
    }
}

/// Split a JSON-RPC response into its result or a typed error.
fn parse_envelope(method: &str, response: Value) -> Result<Value, RpcError> {
    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        return Err(RpcError::JsonRpc {
            method: method.to_string(),
            code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
            data: error.get("data").cloned(),
        });
    }
    response
        .get("result")
        .cloned()
        .ok_or_else(|| RpcError::invalid(method, "missing result"))
}

/// Extract revert data from a JSON-RPC error's `data` field.
///
/// Nodes disagree on the shape: a bare hex string, `{"data": "0x.."}` or
/// `{"result": "0x.."}`.
fn revert_data(data: &Option<Value>) -> Option<Bytes> {
    let data = data.as_ref()?;
    let hex = match data {
        Value::String(s) => Some(s.as_str()),
        Value::Object(obj) => obj
            .get("data")
            .or_else(|| obj.get("result"))
            .and_then(Value::as_str),
        _ => None,
    }?;
    ignition_types::encoding::parse_hex_bytes(hex, "revert data")
        .ok()
        .map(Bytes::from)
}

fn is_revert(code: i64, message: &str) -> bool {
    code == 3 || message.to_lowercase().contains("revert")
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBlock {
    number: U64,
    hash: H256,
    #[serde(default)]
    base_fee_per_gas: Option<U256>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTransaction {
    hash: H256,
    from: Address,
    nonce: U256,
    #[serde(default)]
    gas_price: Option<U256>,
    #[serde(default)]
    max_fee_per_gas: Option<U256>,
    #[serde(default)]
    max_priority_fee_per_gas: Option<U256>,
    #[serde(default)]
    block_number: Option<U64>,
}

impl WireTransaction {
    fn into_rpc(self) -> RpcTransaction {
        let fees = match (self.max_fee_per_gas, self.max_priority_fee_per_gas) {
            (Some(max_fee_per_gas), Some(max_priority_fee_per_gas)) => NetworkFees::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            },
            _ => NetworkFees::Legacy {
                gas_price: self.gas_price.unwrap_or_default(),
            },
        };
        RpcTransaction {
            hash: self.hash,
            from: self.from,
            nonce: self.nonce.low_u64(),
            fees,
            block_number: self.block_number.map(|n| n.as_u64()),
        }
    }
}

#[derive(Deserialize)]
struct WireLog {
    address: Address,
    topics: Vec<H256>,
    data: Bytes,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReceipt {
    block_hash: H256,
    block_number: U64,
    #[serde(default)]
    status: Option<U64>,
    #[serde(default)]
    contract_address: Option<Address>,
    #[serde(default)]
    logs: Vec<WireLog>,
}

impl WireReceipt {
    fn into_receipt(self) -> TransactionReceipt {
        let status = match self.status {
            Some(s) if s.is_zero() => ReceiptStatus::Failure,
            _ => ReceiptStatus::Success,
        };
        TransactionReceipt {
            block_hash: self.block_hash,
            block_number: self.block_number.as_u64(),
            status,
            contract_address: self.contract_address,
            logs: self
                .logs
                .into_iter()
                .map(|l| ReceiptLog {
                    address: l.address,
                    topics: l.topics,
                    data: l.data,
                })
                .collect(),
        }
    }
}

// =============================================================================
// EthRpc
// =============================================================================

#[async_trait]
impl EthRpc for HttpRpcClient {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        let id: U64 = self.request("eth_chainId", json!([]), true).await?;
        Ok(id.as_u64())
    }

    async fn accounts(&self) -> Result<Vec<Address>, RpcError> {
        self.request("eth_accounts", json!([]), true).await
    }

    async fn latest_block(&self) -> Result<Block, RpcError> {
        let block: Option<WireBlock> = self
            .request("eth_getBlockByNumber", json!(["latest", false]), true)
            .await?;
        let block = block.ok_or_else(|| RpcError::invalid("eth_getBlockByNumber", "no latest block"))?;
        Ok(Block {
            number: block.number.as_u64(),
            hash: block.hash,
            base_fee_per_gas: block.base_fee_per_gas,
        })
    }

    async fn transaction_count(&self, address: Address, tag: BlockTag) -> Result<u64, RpcError> {
        let count: U256 = self
            .request(
                "eth_getTransactionCount",
                json!([format!("{:#x}", address), tag.to_param()]),
                true,
            )
            .await?;
        Ok(count.low_u64())
    }

    async fn network_fees(&self) -> Result<NetworkFees, RpcError> {
        let block = self.latest_block().await?;
        match block.base_fee_per_gas {
            Some(base_fee) => {
                let priority: U256 = match self
                    .request("eth_maxPriorityFeePerGas", json!([]), true)
                    .await
                {
                    Ok(p) => p,
                    Err(RpcError::JsonRpc { .. }) => U256::from(FALLBACK_PRIORITY_FEE_WEI),
                    Err(e) => return Err(e),
                };
                Ok(NetworkFees::Eip1559 {
                    max_fee_per_gas: base_fee.saturating_mul(U256::from(2)).saturating_add(priority),
                    max_priority_fee_per_gas: priority,
                })
            }
            None => {
                let gas_price: U256 = self.request("eth_gasPrice", json!([]), true).await?;
                Ok(NetworkFees::Legacy { gas_price })
            }
        }
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<U256, RpcError> {
        let mut param = tx.to_param();
        if let Value::Object(obj) = &mut param {
            obj.remove("gas");
        }
        self.request("eth_estimateGas", json!([param]), true).await
    }

    async fn call(&self, tx: &TransactionRequest, tag: BlockTag) -> Result<RawCallResult, RpcError> {
        match self
            .request::<Bytes>("eth_call", json!([tx.to_param(), tag.to_param()]), true)
            .await
        {
            Ok(return_data) => Ok(RawCallResult {
                return_data,
                success: true,
            }),
            Err(RpcError::JsonRpc {
                code,
                message,
                data,
                method,
            }) => {
                if is_revert(code, &message) {
                    Ok(RawCallResult {
                        return_data: revert_data(&data).unwrap_or_default(),
                        success: false,
                    })
                } else {
                    Err(RpcError::JsonRpc {
                        method,
                        code,
                        message,
                        data,
                    })
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<H256, RpcError> {
        // Never retried: a duplicate send could race the first one.
        self.request("eth_sendTransaction", json!([tx.to_param()]), false)
            .await
    }

    async fn get_transaction(&self, hash: H256) -> Result<Option<RpcTransaction>, RpcError> {
        let tx: Option<WireTransaction> = self
            .request(
                "eth_getTransactionByHash",
                json!([format!("{:#x}", hash)]),
                true,
            )
            .await?;
        Ok(tx.map(WireTransaction::into_rpc))
    }

    async fn get_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>, RpcError> {
        let receipt: Option<WireReceipt> = self
            .request(
                "eth_getTransactionReceipt",
                json!([format!("{:#x}", hash)]),
                true,
            )
            .await?;
        Ok(receipt.map(WireReceipt::into_receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_envelope_result_and_error() {
        let ok = parse_envelope("eth_chainId", json!({"jsonrpc": "2.0", "id": 1, "result": "0x7a69"}))
            .unwrap();
        assert_eq!(ok, json!("0x7a69"));

        let err = parse_envelope(
            "eth_call",
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": 3, "message": "execution reverted", "data": "0x08c379a0"}}),
        )
        .unwrap_err();
        match err {
            RpcError::JsonRpc { code, data, .. } => {
                assert_eq!(code, 3);
                assert_eq!(revert_data(&data).unwrap().to_vec(), vec![0x08, 0xc3, 0x79, 0xa0]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_revert_data_shapes() {
        assert_eq!(
            revert_data(&Some(json!({"data": "0x01"}))).unwrap().to_vec(),
            vec![1]
        );
        assert!(revert_data(&Some(json!(42))).is_none());
        assert!(revert_data(&None).is_none());
        assert!(is_revert(-32000, "VM Exception while processing transaction: revert"));
        assert!(!is_revert(-32000, "nonce too low"));
    }

    #[test]
    fn test_wire_receipt_conversion() {
        let wire: WireReceipt = serde_json::from_value(json!({
            "blockHash": format!("{:#x}", H256::from_low_u64_be(5)),
            "blockNumber": "0x10",
            "status": "0x0",
            "contractAddress": null,
            "logs": []
        }))
        .unwrap();
        let receipt = wire.into_receipt();
        assert_eq!(receipt.block_number, 16);
        assert_eq!(receipt.status, ReceiptStatus::Failure);
    }

    #[test]
    fn test_wire_transaction_fee_shape() {
        let wire: WireTransaction = serde_json::from_value(json!({
            "hash": format!("{:#x}", H256::from_low_u64_be(1)),
            "from": "0x0000000000000000000000000000000000000001",
            "nonce": "0x3",
            "maxFeePerGas": "0x10",
            "maxPriorityFeePerGas": "0x1",
            "blockNumber": null
        }))
        .unwrap();
        let tx = wire.into_rpc();
        assert_eq!(tx.nonce, 3);
        assert!(matches!(tx.fees, NetworkFees::Eip1559 { .. }));
        assert!(tx.block_number.is_none());
    }

    #[test]
    fn test_client_debug_shows_endpoint() {
        let client = HttpRpcClient::new("http://127.0.0.1:8545");
        assert_eq!(client.endpoint(), "http://127.0.0.1:8545");
        assert!(format!("{:?}", client).contains("127.0.0.1:8545"));
    }
}
