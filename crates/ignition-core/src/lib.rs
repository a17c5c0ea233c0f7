//! Ignition Core
//!
//! Execution engine for journaled, resumable deployments.
//!
//! A deployment is described as an [`IgnitionModule`]: a graph of futures
//! (contract deployments, calls, static calls, existing-contract references,
//! event reads and raw sends). Running it turns each future into journaled
//! progress against a live chain, so that an interrupted run resumes exactly
//! where it stopped.
//!
//! # Pipeline
//!
//! 1. [`validation`] checks the module against artifacts, parameters and accounts
//! 2. [`reducer`] replays the journal into a [`DeploymentState`]
//! 3. [`reconciler`] refuses to resume if recorded inputs have changed
//! 4. [`batcher`] groups pending futures into dependency-ordered batches
//! 5. [`engine`] drives each batch through the [`processor`], which asks the
//!    [`strategy`] what to do next and allocates nonces via [`nonce`]
//!
//! [`deploy()`] runs the whole pipeline.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ignition_core::{build_module, deploy, DeployConfig, FutureOptions};
//!
//! let module = build_module("Token", |m| {
//!     let token = m.contract("Token", vec![serde_json::json!(1000).into()], FutureOptions::default())?;
//!     m.result("token", &token);
//!     Ok(())
//! })?;
//! let result = deploy(&module, rpc, resolver, loader, DeployConfig::default()).await?;
//! ```

#![allow(clippy::result_large_err)]
#![allow(clippy::too_many_arguments)]

pub mod abi;
pub mod artifacts;
pub mod batcher;
pub mod config;
pub mod deploy;
pub mod engine;
pub mod errors;
pub mod module;
pub mod nonce;
pub mod processor;
pub mod reconciler;
pub mod reducer;
pub mod resolve;
pub mod status;
pub mod strategy;
pub mod validation;
pub mod wipe;

// Re-export the main entry points
pub use artifacts::{ArtifactResolver, DirectoryArtifactResolver, MemoryArtifactResolver};
pub use batcher::compute_batches;
pub use config::ExecutionConfig;
pub use deploy::{deploy, DeployConfig, DeploymentResult};
pub use engine::{ExecutionEngine, ExecutionSummary};
pub use errors::{IgnitionError, NonceError, ReducerError, StrategyError};
pub use module::{build_module, FutureOptions, IgnitionModule, ModuleBuilder, ModuleCache, ModuleParameters};
pub use reconciler::{reconcile, ReconcileContext, ReconciliationFailure, ReconciliationResult};
pub use reducer::{load_deployment_state, DeploymentState, DeploymentStateCell};
pub use status::{status, StatusReport};
pub use strategy::{strategy_by_name, BasicStrategy, ExecutionStrategy};
pub use validation::{validate_module, ValidationErrors};
pub use wipe::wipe;
