//! Output formatting for the ignition CLI
//!
//! Every command prints either human-readable text or, with `--json`,
//! a single pretty-printed JSON document.

use anyhow::{Context, Result};
use serde::Serialize;

use ignition_core::DeploymentResult;
use ignition_types::address::address_to_string;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("serialize output")?
    );
    Ok(())
}

pub fn format_deployment_result(result: &DeploymentResult, deployment: &str) -> String {
    let mut out = String::new();
    match result {
        DeploymentResult::Success { contracts, results } => {
            out.push_str(&format!(
                "\x1b[32m✓ Deployment {} complete\x1b[0m\n",
                deployment
            ));
            if !contracts.is_empty() {
                out.push_str("\n\x1b[1mDeployed Addresses:\x1b[0m\n");
                for (id, address) in contracts {
                    out.push_str(&format!("  {} - {}\n", id, address_to_string(address)));
                }
            }
            if !results.is_empty() {
                out.push_str("\n\x1b[1mResults:\x1b[0m\n");
                for (key, value) in results {
                    out.push_str(&format!("  {} = {}\n", key, value));
                }
            }
        }
        DeploymentResult::ValidationError { errors } => {
            out.push_str("\x1b[31m✗ Module validation failed\x1b[0m\n\n");
            for (id, messages) in errors {
                out.push_str(&format!("  {}:\n", id));
                for message in messages {
                    out.push_str(&format!("    - {}\n", message));
                }
            }
        }
        DeploymentResult::ReconciliationError {
            failures,
            missing_execution_states,
        } => {
            out.push_str(&format!(
                "\x1b[31m✗ The module no longer matches deployment {}\x1b[0m\n\n",
                deployment
            ));
            for failure in failures {
                out.push_str(&format!("  {}: {}\n", failure.future_id, failure.failure));
            }
            for id in missing_execution_states {
                out.push_str(&format!(
                    "  \x1b[33mwarning\x1b[0m: {} is recorded but no longer part of the module\n",
                    id
                ));
            }
        }
        DeploymentResult::ExecutionError {
            started,
            timed_out,
            held,
            failed,
            successful,
        } => {
            out.push_str(&format!(
                "\x1b[31m✗ Deployment {} did not complete\x1b[0m\n\n",
                deployment
            ));
            for f in failed {
                out.push_str(&format!("  FAILED   {}: {}\n", f.future_id, f.error));
            }
            for t in timed_out {
                match t.tx_hash {
                    Some(hash) => out.push_str(&format!(
                        "  TIMEOUT  {}: transaction {:#x} was not confirmed\n",
                        t.future_id, hash
                    )),
                    None => out.push_str(&format!("  TIMEOUT  {}\n", t.future_id)),
                }
            }
            for h in held {
                out.push_str(&format!(
                    "  HELD     {}: {} ({})\n",
                    h.future_id, h.reason, h.held_id
                ));
            }
            for id in started {
                out.push_str(&format!("  STARTED  {}\n", id));
            }
            out.push_str(&format!("\n{} futures succeeded\n", successful.len()));
        }
        DeploymentResult::PreviousRunError { errors } => {
            out.push_str("\x1b[31m✗ Earlier runs left futures that must be wiped first\x1b[0m\n\n");
            for (id, messages) in errors {
                for message in messages {
                    out.push_str(&format!("  {}: {}\n", id, message));
                }
            }
        }
    }
    out
}

pub fn format_batches(batches: &[Vec<String>]) -> String {
    if batches.is_empty() {
        return "Nothing to execute\n".to_string();
    }
    let mut out = String::new();
    for (i, batch) in batches.iter().enumerate() {
        out.push_str(&format!("Batch #{}\n", i + 1));
        for id in batch {
            out.push_str(&format!("  {}\n", id));
        }
    }
    out
}
