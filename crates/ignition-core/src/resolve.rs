//! Resolution of future parameters into concrete execution inputs.
//!
//! Runs when a future's execution state is initialised, and again in the
//! reconciler to compare a module against recorded inputs. Every reference
//! (other futures, module parameters, accounts) is replaced by its value.

use std::collections::BTreeMap;

use ethers_core::types::{Address, Bytes, H256, U256};
use ignition_store::DeploymentLoader;
use ignition_types::address::{address_to_string, parse_address};
use ignition_types::encoding::json_to_u256;
use ignition_types::{
    CallDetails, ContractAtDetails, DeploymentDetails, ExecutionDetails, ExecutionStatus,
    FutureId, NetworkInteraction, ReadEventArgumentDetails, SendDataDetails, StaticCallDetails,
};
use serde_json::Value;

use crate::abi::decode_event_argument;
use crate::errors::IgnitionError;
use crate::module::{ArgumentValue, Future, FutureParams, ModuleParameters, Sender, GLOBAL_PARAMETERS};
use crate::reducer::DeploymentState;

/// Runtime values references resolve against.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub parameters: &'a ModuleParameters,
    pub accounts: &'a [Address],
    /// Sender for futures that do not name one.
    pub default_sender: Address,
}

impl<'a> ResolveContext<'a> {
    pub fn new(parameters: &'a ModuleParameters, accounts: &'a [Address], default_sender: Address) -> Self {
        Self {
            parameters,
            accounts,
            default_sender,
        }
    }

    pub fn account(&self, index: usize) -> Result<Address, IgnitionError> {
        self.accounts.get(index).copied().ok_or_else(|| {
            anyhow::anyhow!(
                "Account index {} is out of range, the network has {} accounts",
                index,
                self.accounts.len()
            )
            .into()
        })
    }

    /// Value of a module parameter: the module's own, then the global one,
    /// then the declared default.
    pub fn parameter(&self, module_id: &str, name: &str, default: Option<&Value>) -> Option<Value> {
        self.parameters
            .get(module_id)
            .and_then(|p| p.get(name))
            .or_else(|| self.parameters.get(GLOBAL_PARAMETERS).and_then(|p| p.get(name)))
            .or(default)
            .cloned()
    }
}

fn not_ready(future_id: &str, dependency: &str) -> IgnitionError {
    IgnitionError::invariant(format!(
        "Future {} was resolved before its dependency {} succeeded",
        future_id, dependency
    ))
}

/// Resolve an argument to plain JSON.
pub fn resolve_argument(
    future_id: &str,
    arg: &ArgumentValue,
    ctx: &ResolveContext<'_>,
    state: &DeploymentState,
) -> Result<Value, IgnitionError> {
    match arg {
        ArgumentValue::Literal(v) => Ok(v.clone()),
        ArgumentValue::Future(dep) => state
            .execution_states
            .get(dep)
            .filter(|s| s.status == ExecutionStatus::Success)
            .and_then(|s| s.result.as_ref())
            .and_then(|r| r.success_output())
            .map(|output| output.as_json())
            .ok_or_else(|| not_ready(future_id, dep)),
        ArgumentValue::Parameter(p) => ctx
            .parameter(&p.module_id, &p.name, p.default.as_ref())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Missing parameter {} of module {} required by {}",
                    p.name,
                    p.module_id,
                    future_id
                )
                .into()
            }),
        ArgumentValue::Account(i) => ctx.account(*i).map(|a| Value::String(address_to_string(&a))),
        ArgumentValue::Array(items) => items
            .iter()
            .map(|item| resolve_argument(future_id, item, ctx, state))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        ArgumentValue::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k.clone(), resolve_argument(future_id, v, ctx, state)?);
            }
            Ok(Value::Object(out))
        }
    }
}

pub fn resolve_arguments(
    future_id: &str,
    args: &[ArgumentValue],
    ctx: &ResolveContext<'_>,
    state: &DeploymentState,
) -> Result<Vec<Value>, IgnitionError> {
    args.iter()
        .map(|a| resolve_argument(future_id, a, ctx, state))
        .collect()
}

pub fn resolve_value(
    future_id: &str,
    arg: &ArgumentValue,
    ctx: &ResolveContext<'_>,
    state: &DeploymentState,
) -> Result<U256, IgnitionError> {
    let value = resolve_argument(future_id, arg, ctx, state)?;
    json_to_u256(&value).ok_or_else(|| {
        anyhow::anyhow!("Value {} of future {} is not a valid amount", value, future_id).into()
    })
}

pub fn resolve_address(
    future_id: &str,
    arg: &ArgumentValue,
    ctx: &ResolveContext<'_>,
    state: &DeploymentState,
) -> Result<Address, IgnitionError> {
    let value = resolve_argument(future_id, arg, ctx, state)?;
    value.as_str().and_then(parse_address).ok_or_else(|| {
        anyhow::anyhow!("{} is not a valid address for future {}", value, future_id).into()
    })
}

pub fn resolve_sender(from: Option<Sender>, ctx: &ResolveContext<'_>) -> Result<Address, IgnitionError> {
    match from {
        Some(Sender::Account(i)) => ctx.account(i),
        Some(Sender::Address(a)) => Ok(a),
        None => Ok(ctx.default_sender),
    }
}

/// Address a contract-producing future resolved to.
pub fn future_address(
    future_id: &str,
    dependency: &FutureId,
    state: &DeploymentState,
) -> Result<Address, IgnitionError> {
    state
        .execution_states
        .get(dependency)
        .and_then(|s| s.success_address())
        .ok_or_else(|| not_ready(future_id, dependency))
}

/// Library name -> deployed library address.
pub fn resolve_libraries(
    future_id: &str,
    libraries: &BTreeMap<String, FutureId>,
    state: &DeploymentState,
) -> Result<BTreeMap<String, Address>, IgnitionError> {
    libraries
        .iter()
        .map(|(name, lib)| Ok((name.clone(), future_address(future_id, lib, state)?)))
        .collect()
}

/// Hash of the confirmed transaction of a future that sent one.
fn confirmed_transaction(
    future_id: &str,
    source: &FutureId,
    state: &DeploymentState,
) -> Result<(H256, Vec<ignition_types::ReceiptLog>), IgnitionError> {
    let source_state = state
        .execution_states
        .get(source)
        .ok_or_else(|| not_ready(future_id, source))?;
    source_state
        .network_interactions
        .iter()
        .rev()
        .find_map(|i| match i {
            NetworkInteraction::Onchain(o) => o.confirmed_transaction().and_then(|tx| {
                tx.receipt.as_ref().map(|r| (tx.hash, r.logs.clone()))
            }),
            NetworkInteraction::StaticCall(_) => None,
        })
        .ok_or_else(|| {
            IgnitionError::invariant(format!(
                "Future {} reads an event from {}, which has no confirmed transaction",
                future_id, source
            ))
        })
}

/// Fully resolved inputs for `future`, recorded in its first journal message.
pub fn build_execution_details(
    future: &Future,
    ctx: &ResolveContext<'_>,
    state: &DeploymentState,
    loader: &dyn DeploymentLoader,
) -> Result<ExecutionDetails, IgnitionError> {
    let id = future.id.as_str();
    let details = match &future.params {
        FutureParams::Deployment {
            contract_name,
            constructor_args,
            libraries,
            value,
            from,
            ..
        } => ExecutionDetails::Deployment(DeploymentDetails {
            contract_name: contract_name.clone(),
            constructor_args: resolve_arguments(id, constructor_args, ctx, state)?,
            libraries: resolve_libraries(id, libraries, state)?,
            value: resolve_value(id, value, ctx, state)?,
            from: resolve_sender(*from, ctx)?,
        }),
        FutureParams::Call {
            contract,
            function_name,
            args,
            value,
            from,
        } => ExecutionDetails::Call(CallDetails {
            artifact_id: contract.clone(),
            contract_address: future_address(id, contract, state)?,
            function_name: function_name.clone(),
            args: resolve_arguments(id, args, ctx, state)?,
            value: resolve_value(id, value, ctx, state)?,
            from: resolve_sender(*from, ctx)?,
        }),
        FutureParams::StaticCall {
            contract,
            function_name,
            args,
            name_or_index,
            from,
        } => ExecutionDetails::StaticCall(StaticCallDetails {
            artifact_id: contract.clone(),
            contract_address: future_address(id, contract, state)?,
            function_name: function_name.clone(),
            args: resolve_arguments(id, args, ctx, state)?,
            name_or_index: name_or_index.clone(),
            from: resolve_sender(*from, ctx)?,
        }),
        FutureParams::ContractAt {
            contract_name,
            address,
            ..
        } => ExecutionDetails::ContractAt(ContractAtDetails {
            contract_name: contract_name.clone(),
            address: resolve_address(id, address, ctx, state)?,
        }),
        FutureParams::ReadEventArgument {
            future: source,
            emitter,
            event_name,
            event_index,
            name_or_index,
        } => {
            let emitter_address = future_address(id, emitter, state)?;
            let (tx_hash, logs) = confirmed_transaction(id, source, state)?;
            let artifact = loader.load_artifact(emitter)?;
            let result = decode_event_argument(
                &artifact,
                event_name,
                *event_index,
                name_or_index,
                emitter_address,
                &logs,
            )
            .map_err(|e| anyhow::anyhow!("Failed to read event argument for {}: {}", id, e))?;
            ExecutionDetails::ReadEventArgument(ReadEventArgumentDetails {
                artifact_id: emitter.clone(),
                event_name: event_name.clone(),
                event_index: *event_index,
                name_or_index: name_or_index.clone(),
                emitter_address,
                tx_to_read_from: tx_hash,
                result,
            })
        }
        FutureParams::SendData {
            to,
            data,
            value,
            from,
        } => ExecutionDetails::SendData(SendDataDetails {
            to: resolve_address(id, to, ctx, state)?,
            data: data.clone().unwrap_or_else(Bytes::new),
            value: resolve_value(id, value, ctx, state)?,
            from: resolve_sender(*from, ctx)?,
        }),
    };
    Ok(details)
}
