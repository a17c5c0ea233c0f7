//! Deployment storage.
//!
//! This crate provides:
//! - [`paths`]: the on-disk layout of a deployment directory
//! - [`journal`]: the append-only JSON-lines journal
//! - [`loader`]: the [`DeploymentLoader`] trait with file-backed and
//!   in-memory implementations

pub mod journal;
pub mod loader;
pub mod paths;

pub use journal::{FileJournal, MemoryJournal};
pub use loader::{DeploymentLoader, EphemeralDeploymentLoader, FileDeploymentLoader};
