//! Deployment status reports.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use ethers_core::types::{Address, H256};
use ignition_types::address::address_to_string;
use ignition_types::{ExecutionResult, ExecutionStatus, FutureId, FutureKind, NetworkInteraction};
use serde::Serialize;
use serde_json::Value;

use crate::reducer::DeploymentState;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FutureStatus {
    pub future_id: FutureId,
    pub kind: FutureKind,
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Decoded value of static calls and event reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transaction: Option<H256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub chain_id: Option<u64>,
    pub generated_at: DateTime<Utc>,
    pub futures: Vec<FutureStatus>,
}

/// Hash of the most recent transaction sent for a state, if any.
pub fn last_transaction_hash(interactions: &[NetworkInteraction]) -> Option<H256> {
    interactions.iter().rev().find_map(|i| match i {
        NetworkInteraction::Onchain(o) => o.last_transaction().map(|tx| tx.hash),
        NetworkInteraction::StaticCall(_) => None,
    })
}

pub fn status(state: &DeploymentState) -> StatusReport {
    let futures = state
        .execution_states
        .values()
        .map(|exec| {
            let output = exec.result.as_ref().and_then(ExecutionResult::success_output);
            let value = output
                .filter(|o| o.address().is_none())
                .map(|o| o.as_json())
                .filter(|v| !v.is_null());
            let error = match &exec.result {
                Some(ExecutionResult::Success { .. }) | None => None,
                Some(other) => Some(other.to_string()),
            };
            FutureStatus {
                future_id: exec.id.clone(),
                kind: exec.future_kind,
                status: exec.status,
                address: exec.success_address(),
                value,
                last_transaction: last_transaction_hash(&exec.network_interactions),
                error,
            }
        })
        .collect();
    StatusReport {
        chain_id: state.chain_id,
        generated_at: Utc::now(),
        futures,
    }
}

impl StatusReport {
    /// Number of futures per status name.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for f in &self.futures {
            *counts.entry(f.status.to_string()).or_insert(0) += 1;
        }
        counts
    }

    pub fn is_complete(&self) -> bool {
        self.futures.iter().all(|f| f.status == ExecutionStatus::Success)
    }

    /// Human-readable rendering.
    pub fn render(&self) -> String {
        let mut out = String::new();
        match self.chain_id {
            Some(id) => {
                let _ = writeln!(out, "Deployment on chain {}", id);
            }
            None => {
                let _ = writeln!(out, "Deployment (not initialised)");
            }
        }
        if self.futures.is_empty() {
            let _ = writeln!(out, "No futures have been executed");
            return out;
        }
        let width = self.futures.iter().map(|f| f.future_id.len()).max().unwrap_or(0);
        for f in &self.futures {
            let _ = write!(out, "  {:<width$}  {:<7}", f.future_id, f.status.to_string(), width = width);
            if let Some(address) = f.address {
                let _ = write!(out, "  {}", address_to_string(&address));
            }
            if let Some(value) = &f.value {
                let _ = write!(out, "  = {}", value);
            }
            if let Some(error) = &f.error {
                let _ = write!(out, "  {}", error);
            }
            out.push('\n');
        }
        let summary: Vec<String> = self
            .counts()
            .into_iter()
            .map(|(status, n)| format!("{} {}", n, status))
            .collect();
        let _ = writeln!(out, "{}", summary.join(", "));
        out
    }
}
