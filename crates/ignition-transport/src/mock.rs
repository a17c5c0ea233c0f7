//! In-memory chain for tests and dry runs.
//!
//! `MockChain` keeps a mempool and a list of mined transactions and answers
//! the [`EthRpc`] calls from them. By default every sent transaction is mined
//! into its own block; turn auto-mining off to leave transactions pending and
//! exercise fee bumping, timeouts and interference handling.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use ethers_core::types::{Address, Bytes, H256, U256};
use ethers_core::utils::{get_contract_address, keccak256};
use ignition_types::{NetworkFees, RawCallResult, ReceiptLog, ReceiptStatus, TransactionReceipt};
use parking_lot::Mutex;

use crate::rpc::{Block, BlockTag, EthRpc, RpcError, RpcTransaction, TransactionRequest};

type Predicate = Box<dyn Fn(&TransactionRequest) -> bool + Send + Sync>;

const GWEI: u64 = 1_000_000_000;

struct RevertRule {
    matches: Predicate,
    data: Bytes,
}

struct LogRule {
    to: Option<Address>,
    topics: Vec<H256>,
    data: Bytes,
}

#[derive(Clone)]
struct ChainTx {
    hash: H256,
    request: TransactionRequest,
    nonce: u64,
    fees: NetworkFees,
}

struct MinedTx {
    tx: ChainTx,
    receipt: TransactionReceipt,
}

/// One transaction that went through `send_transaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTransaction {
    pub from: Address,
    pub nonce: u64,
    pub hash: H256,
    pub fees: NetworkFees,
}

struct ChainState {
    chain_id: u64,
    accounts: Vec<Address>,
    block_number: u64,
    base_fee: Option<U256>,
    priority_fee: U256,
    gas_price: U256,
    auto_mine: bool,
    counter: u64,
    mempool: Vec<ChainTx>,
    mined: Vec<MinedTx>,
    sent: Vec<SentTransaction>,
    revert_rules: Vec<RevertRule>,
    call_results: HashMap<(Address, Bytes), Bytes>,
    log_rules: Vec<LogRule>,
    failures: HashMap<String, u32>,
}

impl ChainState {
    fn mined_count(&self, address: Address, up_to_block: Option<u64>) -> u64 {
        self.mined
            .iter()
            .filter(|m| m.tx.request.from == address)
            .filter(|m| up_to_block.map_or(true, |b| m.receipt.block_number <= b))
            .count() as u64
    }

    fn pending_count(&self, address: Address) -> u64 {
        let latest = self.mined_count(address, None);
        self.mempool
            .iter()
            .filter(|t| t.request.from == address)
            .map(|t| t.nonce + 1)
            .max()
            .map_or(latest, |n| n.max(latest))
    }

    fn revert_data(&self, tx: &TransactionRequest) -> Option<Bytes> {
        self.revert_rules
            .iter()
            .find(|r| (r.matches)(tx))
            .map(|r| r.data.clone())
    }

    fn next_hash(&mut self, from: Address, nonce: u64) -> H256 {
        self.counter += 1;
        let mut preimage = from.as_bytes().to_vec();
        preimage.extend_from_slice(&nonce.to_be_bytes());
        preimage.extend_from_slice(&self.counter.to_be_bytes());
        H256::from(keccak256(preimage))
    }

    fn take_failure(&mut self, method: &str) -> Result<(), RpcError> {
        if let Some(remaining) = self.failures.get_mut(method) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RpcError::Transport {
                    method: method.to_string(),
                    message: "injected failure".to_string(),
                });
            }
        }
        Ok(())
    }

    fn block_hash(number: u64) -> H256 {
        H256::from(keccak256(number.to_be_bytes()))
    }

    fn mine(&mut self) -> u64 {
        self.block_number += 1;
        let block_number = self.block_number;
        let block_hash = Self::block_hash(block_number);
        loop {
            let next = self.mempool.iter().position(|t| {
                t.nonce == self.mined_count(t.request.from, None)
            });
            let Some(idx) = next else { break };
            let tx = self.mempool.remove(idx);
            let reverted = self.revert_data(&tx.request).is_some();
            let contract_address = if tx.request.to.is_none() && !reverted {
                Some(get_contract_address(tx.request.from, tx.nonce))
            } else {
                None
            };
            let emitter = tx.request.to.or(contract_address);
            let logs = if reverted {
                Vec::new()
            } else {
                self.log_rules
                    .iter()
                    .filter(|r| r.to == tx.request.to)
                    .filter_map(|r| {
                        emitter.map(|address| ReceiptLog {
                            address,
                            topics: r.topics.clone(),
                            data: r.data.clone(),
                        })
                    })
                    .collect()
            };
            let receipt = TransactionReceipt {
                block_hash,
                block_number,
                status: if reverted {
                    ReceiptStatus::Failure
                } else {
                    ReceiptStatus::Success
                },
                contract_address,
                logs,
            };
            self.mined.push(MinedTx { tx, receipt });
        }
        block_number
    }

    fn current_fees(&self) -> NetworkFees {
        match self.base_fee {
            Some(base) => NetworkFees::Eip1559 {
                max_fee_per_gas: base * U256::from(2) + self.priority_fee,
                max_priority_fee_per_gas: self.priority_fee,
            },
            None => NetworkFees::Legacy {
                gas_price: self.gas_price,
            },
        }
    }
}

/// Deterministic in-memory chain implementing [`EthRpc`].
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new(31337)
    }
}

impl MockChain {
    pub fn new(chain_id: u64) -> Self {
        let accounts = (0..5u64)
            .map(|i| Address::from_low_u64_be(0xA11CE0 + i))
            .collect();
        Self {
            state: Mutex::new(ChainState {
                chain_id,
                accounts,
                block_number: 0,
                base_fee: Some(U256::from(GWEI)),
                priority_fee: U256::from(GWEI),
                gas_price: U256::from(GWEI),
                auto_mine: true,
                counter: 0,
                mempool: Vec::new(),
                mined: Vec::new(),
                sent: Vec::new(),
                revert_rules: Vec::new(),
                call_results: HashMap::new(),
                log_rules: Vec::new(),
                failures: HashMap::new(),
            }),
        }
    }

    pub fn account(&self, index: usize) -> Address {
        self.state.lock().accounts[index]
    }

    pub fn accounts_list(&self) -> Vec<Address> {
        self.state.lock().accounts.clone()
    }

    pub fn set_auto_mine(&self, enabled: bool) {
        self.state.lock().auto_mine = enabled;
    }

    /// Switch to pre-London fee reporting.
    pub fn set_legacy_gas_price(&self, gas_price: U256) {
        let mut state = self.state.lock();
        state.base_fee = None;
        state.gas_price = gas_price;
    }

    pub fn set_base_fee(&self, base_fee: U256) {
        self.state.lock().base_fee = Some(base_fee);
    }

    /// Mine every minable pending transaction into a new block.
    pub fn mine_block(&self) -> u64 {
        self.state.lock().mine()
    }

    pub fn mine_blocks(&self, count: u64) -> u64 {
        let mut state = self.state.lock();
        let mut last = state.block_number;
        for _ in 0..count {
            last = state.mine();
        }
        last
    }

    pub fn block_number(&self) -> u64 {
        self.state.lock().block_number
    }

    /// Transactions matching `matches` revert with `data`, both when simulated
    /// and when mined.
    pub fn revert_when<F>(&self, matches: F, data: Bytes)
    where
        F: Fn(&TransactionRequest) -> bool + Send + Sync + 'static,
    {
        self.state.lock().revert_rules.push(RevertRule {
            matches: Box::new(matches),
            data,
        });
    }

    /// Fixed return data for `eth_call` with exactly this target and calldata.
    pub fn set_call_result(&self, to: Address, calldata: Bytes, return_data: Bytes) {
        self.state
            .lock()
            .call_results
            .insert((to, calldata), return_data);
    }

    /// Emit a log from every successful transaction sent to `to`
    /// (`None` for deployments, where the new contract is the emitter).
    pub fn emit_log(&self, to: Option<Address>, topics: Vec<H256>, data: Bytes) {
        self.state.lock().log_rules.push(LogRule { to, topics, data });
    }

    /// Make the next `times` calls of `method` fail with a transport error.
    pub fn fail_next(&self, method: &str, times: u32) {
        self.state.lock().failures.insert(method.to_string(), times);
    }

    /// Queue a transaction from `from` that did not come through this client.
    pub fn inject_external_pending(&self, from: Address) -> H256 {
        let mut state = self.state.lock();
        let nonce = state.pending_count(from);
        let hash = state.next_hash(from, nonce);
        let fees = state.current_fees();
        state.mempool.push(ChainTx {
            hash,
            request: TransactionRequest {
                from,
                to: Some(from),
                ..Default::default()
            },
            nonce,
            fees,
        });
        hash
    }

    /// Replace the pending transaction `hash` by a different one at the same
    /// nonce and mine it, as a user sending from their wallet would.
    pub fn replace_with_external(&self, hash: H256) -> Option<H256> {
        let mut state = self.state.lock();
        let idx = state.mempool.iter().position(|t| t.hash == hash)?;
        let original = state.mempool.remove(idx);
        let replacement_hash = state.next_hash(original.request.from, original.nonce);
        state.mempool.push(ChainTx {
            hash: replacement_hash,
            request: TransactionRequest {
                from: original.request.from,
                to: Some(original.request.from),
                ..Default::default()
            },
            nonce: original.nonce,
            fees: original.fees.bumped(200),
        });
        state.mine();
        Some(replacement_hash)
    }

    /// Forget a pending transaction, as a node evicting it from its mempool.
    pub fn drop_transaction(&self, hash: H256) -> bool {
        let mut state = self.state.lock();
        let before = state.mempool.len();
        state.mempool.retain(|t| t.hash != hash);
        before != state.mempool.len()
    }

    /// Every transaction sent through [`EthRpc::send_transaction`], in order.
    pub fn sent_transactions(&self) -> Vec<SentTransaction> {
        self.state.lock().sent.clone()
    }

    pub fn pending_hashes(&self) -> HashSet<H256> {
        self.state.lock().mempool.iter().map(|t| t.hash).collect()
    }
}

#[async_trait]
impl EthRpc for MockChain {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        let mut state = self.state.lock();
        state.take_failure("eth_chainId")?;
        Ok(state.chain_id)
    }

    async fn accounts(&self) -> Result<Vec<Address>, RpcError> {
        let mut state = self.state.lock();
        state.take_failure("eth_accounts")?;
        Ok(state.accounts.clone())
    }

    async fn latest_block(&self) -> Result<Block, RpcError> {
        let mut state = self.state.lock();
        state.take_failure("eth_getBlockByNumber")?;
        Ok(Block {
            number: state.block_number,
            hash: ChainState::block_hash(state.block_number),
            base_fee_per_gas: state.base_fee,
        })
    }

    async fn transaction_count(&self, address: Address, tag: BlockTag) -> Result<u64, RpcError> {
        let mut state = self.state.lock();
        state.take_failure("eth_getTransactionCount")?;
        Ok(match tag {
            BlockTag::Latest => state.mined_count(address, None),
            BlockTag::Pending => state.pending_count(address),
            BlockTag::Number(n) => state.mined_count(address, Some(n)),
        })
    }

    async fn network_fees(&self) -> Result<NetworkFees, RpcError> {
        let mut state = self.state.lock();
        state.take_failure("eth_gasPrice")?;
        Ok(state.current_fees())
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<U256, RpcError> {
        let mut state = self.state.lock();
        state.take_failure("eth_estimateGas")?;
        if let Some(data) = state.revert_data(tx) {
            return Err(RpcError::JsonRpc {
                method: "eth_estimateGas".to_string(),
                code: 3,
                message: "execution reverted".to_string(),
                data: Some(serde_json::Value::String(data.to_string())),
            });
        }
        Ok(U256::from(21_000 + 16 * tx.data.len() as u64))
    }

    async fn call(&self, tx: &TransactionRequest, _tag: BlockTag) -> Result<RawCallResult, RpcError> {
        let mut state = self.state.lock();
        state.take_failure("eth_call")?;
        if let Some(data) = state.revert_data(tx) {
            return Ok(RawCallResult {
                return_data: data,
                success: false,
            });
        }
        let return_data = tx
            .to
            .and_then(|to| state.call_results.get(&(to, tx.data.clone())).cloned())
            .unwrap_or_default();
        Ok(RawCallResult {
            return_data,
            success: true,
        })
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<H256, RpcError> {
        let mut state = self.state.lock();
        state.take_failure("eth_sendTransaction")?;
        let latest = state.mined_count(tx.from, None);
        let nonce = tx.nonce.unwrap_or_else(|| state.pending_count(tx.from));
        if nonce < latest {
            return Err(RpcError::JsonRpc {
                method: "eth_sendTransaction".to_string(),
                code: -32000,
                message: format!("nonce too low: next nonce {}, tx nonce {}", latest, nonce),
                data: None,
            });
        }
        let fees = tx.fees.unwrap_or_else(|| state.current_fees());
        if let Some(idx) = state
            .mempool
            .iter()
            .position(|t| t.request.from == tx.from && t.nonce == nonce)
        {
            let existing = state.mempool[idx].fees;
            if existing.max_with(&fees) != fees || existing == fees {
                return Err(RpcError::JsonRpc {
                    method: "eth_sendTransaction".to_string(),
                    code: -32000,
                    message: "replacement transaction underpriced".to_string(),
                    data: None,
                });
            }
            state.mempool.remove(idx);
        }
        let hash = state.next_hash(tx.from, nonce);
        let mut request = tx.clone();
        request.nonce = Some(nonce);
        request.fees = Some(fees);
        state.mempool.push(ChainTx {
            hash,
            request,
            nonce,
            fees,
        });
        state.sent.push(SentTransaction {
            from: tx.from,
            nonce,
            hash,
            fees,
        });
        if state.auto_mine {
            state.mine();
        }
        Ok(hash)
    }

    async fn get_transaction(&self, hash: H256) -> Result<Option<RpcTransaction>, RpcError> {
        let mut state = self.state.lock();
        state.take_failure("eth_getTransactionByHash")?;
        if let Some(t) = state.mempool.iter().find(|t| t.hash == hash) {
            return Ok(Some(RpcTransaction {
                hash,
                from: t.request.from,
                nonce: t.nonce,
                fees: t.fees,
                block_number: None,
            }));
        }
        Ok(state.mined.iter().find(|m| m.tx.hash == hash).map(|m| RpcTransaction {
            hash,
            from: m.tx.request.from,
            nonce: m.tx.nonce,
            fees: m.tx.fees,
            block_number: Some(m.receipt.block_number),
        }))
    }

    async fn get_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>, RpcError> {
        let mut state = self.state.lock();
        state.take_failure("eth_getTransactionReceipt")?;
        Ok(state
            .mined
            .iter()
            .find(|m| m.tx.hash == hash)
            .map(|m| m.receipt.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deploy_request(from: Address) -> TransactionRequest {
        TransactionRequest {
            from,
            data: Bytes::from(vec![0x60, 0x80]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_auto_mine_deploys_contract() {
        let chain = MockChain::default();
        let from = chain.account(0);
        let hash = chain.send_transaction(&deploy_request(from)).await.unwrap();
        let receipt = chain.get_receipt(hash).await.unwrap().unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Success);
        assert_eq!(receipt.contract_address, Some(get_contract_address(from, 0u64)));
        assert_eq!(receipt.block_number, 1);
        assert_eq!(chain.transaction_count(from, BlockTag::Latest).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_pending_and_latest_counts_diverge_without_mining() {
        let chain = MockChain::default();
        chain.set_auto_mine(false);
        let from = chain.account(1);
        let hash = chain.inject_external_pending(from);
        assert_eq!(chain.transaction_count(from, BlockTag::Latest).await.unwrap(), 0);
        assert_eq!(chain.transaction_count(from, BlockTag::Pending).await.unwrap(), 1);
        assert!(chain.get_receipt(hash).await.unwrap().is_none());
        chain.mine_block();
        assert_eq!(chain.transaction_count(from, BlockTag::Latest).await.unwrap(), 1);
        assert!(chain.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_replacement_requires_higher_fees() {
        let chain = MockChain::default();
        chain.set_auto_mine(false);
        let from = chain.account(0);
        let fees = NetworkFees::Legacy {
            gas_price: U256::from(100),
        };
        let mut req = deploy_request(from);
        req.nonce = Some(0);
        req.fees = Some(fees);
        let first = chain.send_transaction(&req).await.unwrap();
        assert!(chain.send_transaction(&req).await.is_err());

        req.fees = Some(fees.bumped(110));
        let second = chain.send_transaction(&req).await.unwrap();
        assert!(chain.get_transaction(first).await.unwrap().is_none());
        assert!(chain.get_transaction(second).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_revert_rule_applies_to_call_and_receipt() {
        let chain = MockChain::default();
        let from = chain.account(0);
        let target = Address::from_low_u64_be(77);
        chain.revert_when(move |tx| tx.to == Some(target), Bytes::from(vec![0xde, 0xad]));
        let req = TransactionRequest {
            from,
            to: Some(target),
            ..Default::default()
        };
        let result = chain.call(&req, BlockTag::Latest).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.return_data.to_vec(), vec![0xde, 0xad]);
        assert!(chain.estimate_gas(&req).await.is_err());

        let hash = chain.send_transaction(&req).await.unwrap();
        let receipt = chain.get_receipt(hash).await.unwrap().unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Failure);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let chain = MockChain::default();
        chain.fail_next("eth_chainId", 1);
        assert!(chain.chain_id().await.is_err());
        assert_eq!(chain.chain_id().await.unwrap(), 31337);
    }

    #[tokio::test]
    async fn test_replace_with_external_mines_other_tx() {
        let chain = MockChain::default();
        chain.set_auto_mine(false);
        let from = chain.account(0);
        let hash = chain.send_transaction(&deploy_request(from)).await.unwrap();
        let replacement = chain.replace_with_external(hash).unwrap();
        assert!(chain.get_transaction(hash).await.unwrap().is_none());
        assert!(chain.get_receipt(replacement).await.unwrap().is_some());
        assert_eq!(chain.transaction_count(from, BlockTag::Latest).await.unwrap(), 1);
    }
}
