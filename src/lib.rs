//! Ignition Deploy
//!
//! Resumable, journaled deployments of interdependent EVM contract futures.
//!
//! The work happens in the workspace crates, re-exported here:
//!
//! - [`types`]: execution states, journal messages and artifacts
//! - [`transport`]: the JSON-RPC client and an in-memory chain
//! - [`store`]: journal and deployment directory storage
//! - [`core`]: modules, the execution engine, reconciliation and `deploy`
//!
//! [`project`] resolves the files the `ignition` binary works with.

pub mod project;

pub use ignition_core as core;
pub use ignition_store as store;
pub use ignition_transport as transport;
pub use ignition_types as types;

pub use ignition_core::{deploy, DeployConfig, DeploymentResult, IgnitionError, IgnitionModule};
