//! JSON-RPC transport for ignition deployments.
//!
//! This crate provides:
//! - [`rpc`]: the [`EthRpc`] trait the engine is written against
//! - [`http`]: [`HttpRpcClient`], a ureq-backed JSON-RPC 2.0 client
//! - [`mock`]: [`MockChain`], an in-memory chain for tests and dry runs
//! - [`network`]: chain names and confirmation defaults
//!
//! # Example
//!
//! ```no_run
//! use ignition_transport::{EthRpc, HttpRpcClient};
//!
//! # async fn run() -> Result<(), ignition_transport::RpcError> {
//! let client = HttpRpcClient::new("http://127.0.0.1:8545");
//! let chain_id = client.chain_id().await?;
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod mock;
pub mod network;
pub mod rpc;

// Re-export main types for convenience
pub use http::HttpRpcClient;
pub use mock::{MockChain, SentTransaction};
pub use rpc::{Block, BlockTag, EthRpc, RpcError, RpcTransaction, TransactionRequest};
