//! Kind-specific field reconciliation.

use ethers_core::types::{Address, Bytes};
use ignition_types::{ExecutionDetails, ExecutionState, ExecutionStatus};

use super::helpers::{compare, compare_address, compare_arguments, compare_libraries, resolved, FieldCheck};
use super::ReconcileContext;
use crate::module::{Future, FutureParams, Sender};
use crate::resolve::{
    future_address, resolve_address, resolve_arguments, resolve_libraries, resolve_sender, resolve_value,
};
use crate::validation::future_artifact;

pub(super) fn reconcile_fields(future: &Future, exec: &ExecutionState, ctx: &ReconcileContext<'_>) -> FieldCheck {
    let id = future.id.as_str();
    let state = ctx.deployment;
    let rc = &ctx.resolve;

    match (&future.params, &exec.details) {
        (
            FutureParams::Deployment {
                contract_name,
                constructor_args,
                libraries,
                value,
                from,
                ..
            },
            ExecutionDetails::Deployment(details),
        ) => {
            compare("Contract name", &details.contract_name, contract_name)?;
            if exec.status != ExecutionStatus::Success {
                reconcile_bytecode(future, ctx)?;
            }
            let args = resolved("Constructor arguments", resolve_arguments(id, constructor_args, rc, state))?;
            compare_arguments(&details.constructor_args, &args)?;
            let libraries = resolved("Libraries", resolve_libraries(id, libraries, state))?;
            compare_libraries(&details.libraries, &libraries)?;
            compare("Value", &details.value, &resolved("Value", resolve_value(id, value, rc, state))?)?;
            reconcile_sender(*from, details.from, ctx)
        }
        (
            FutureParams::Call {
                contract,
                function_name,
                args,
                value,
                from,
            },
            ExecutionDetails::Call(details),
        ) => {
            let address = resolved("Contract address", future_address(id, contract, state))?;
            compare_address("Contract address", &details.contract_address, &address)?;
            compare("Function name", &details.function_name, function_name)?;
            let args = resolved("Arguments", resolve_arguments(id, args, rc, state))?;
            compare_arguments(&details.args, &args)?;
            compare("Value", &details.value, &resolved("Value", resolve_value(id, value, rc, state))?)?;
            reconcile_sender(*from, details.from, ctx)
        }
        (
            FutureParams::StaticCall {
                contract,
                function_name,
                args,
                name_or_index,
                from,
            },
            ExecutionDetails::StaticCall(details),
        ) => {
            let address = resolved("Contract address", future_address(id, contract, state))?;
            compare_address("Contract address", &details.contract_address, &address)?;
            compare("Function name", &details.function_name, function_name)?;
            let args = resolved("Arguments", resolve_arguments(id, args, rc, state))?;
            compare_arguments(&details.args, &args)?;
            compare("Output name or index", &details.name_or_index, name_or_index)?;
            reconcile_sender(*from, details.from, ctx)
        }
        (
            FutureParams::ContractAt {
                contract_name,
                address,
                ..
            },
            ExecutionDetails::ContractAt(details),
        ) => {
            compare("Contract name", &details.contract_name, contract_name)?;
            let address = resolved("Address", resolve_address(id, address, rc, state))?;
            compare_address("Address", &details.address, &address)
        }
        (
            FutureParams::ReadEventArgument {
                emitter,
                event_name,
                event_index,
                name_or_index,
                ..
            },
            ExecutionDetails::ReadEventArgument(details),
        ) => {
            compare("Event name", &details.event_name, event_name)?;
            compare("Event index", &details.event_index, event_index)?;
            compare("Argument name or index", &details.name_or_index, name_or_index)?;
            let emitter = resolved("Emitter", future_address(id, emitter, state))?;
            compare_address("Emitter", &details.emitter_address, &emitter)
        }
        (
            FutureParams::SendData {
                to,
                data,
                value,
                from,
            },
            ExecutionDetails::SendData(details),
        ) => {
            let to = resolved("To address", resolve_address(id, to, rc, state))?;
            compare_address("To address", &details.to, &to)?;
            let data = data.clone().unwrap_or_else(Bytes::new);
            compare("Data", &details.data, &data)?;
            compare("Value", &details.value, &resolved("Value", resolve_value(id, value, rc, state))?)?;
            reconcile_sender(*from, details.from, ctx)
        }
        (_, details) => Err(format!(
            "Recorded inputs are for a {:?} future, which does not match kind {}",
            details.kind(),
            future.kind
        )),
    }
}

/// A future without an explicit sender keeps whichever account it started
/// with while that account is still available. Otherwise the sender is
/// resolved again and must match.
fn reconcile_sender(
    from: Option<Sender>,
    stored: Address,
    ctx: &ReconcileContext<'_>,
) -> FieldCheck {
    if from.is_none() && ctx.resolve.accounts.contains(&stored) {
        return Ok(());
    }
    let current = resolved("From account", resolve_sender(from, &ctx.resolve))?;
    compare_address("From account", &stored, &current)
}

fn reconcile_bytecode(future: &Future, ctx: &ReconcileContext<'_>) -> FieldCheck {
    let stored = ctx
        .loader
        .load_artifact(&future.id)
        .map_err(|e| format!("Stored artifact could not be loaded: {}", e))?;
    let current = future_artifact(future, ctx.resolver)
        .map_err(|e| format!("Artifact could not be loaded: {}", e))?;
    if stored.bytecode.eq_ignore_ascii_case(&current.bytecode) {
        Ok(())
    } else {
        Err("Artifact bytecodes have been changed".to_string())
    }
}
