//! The future graph.
//!
//! An [`IgnitionModule`] is an immutable DAG of [`Future`]s. Each future has a
//! stable id (`"<ModuleId>#<LocalId>"`), a [`FutureKind`], the ids it depends
//! on, and kind-specific parameters whose values may still reference other
//! futures, module parameters or accounts. Those references are resolved only
//! when the future starts executing (see [`crate::resolve`]).
//!
//! Modules are built with [`ModuleBuilder`](builder::ModuleBuilder), from a
//! JSON [`definition`], and shared through a [`ModuleCache`](cache::ModuleCache).

pub mod builder;
pub mod cache;
pub mod definition;

use std::collections::{BTreeMap, BTreeSet};

use ethers_core::types::{Address, Bytes};
use ignition_types::{Artifact, FutureId, FutureKind, NameOrIndex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use builder::{build_module, FutureOptions, ModuleBuilder, ReadEventOptions};
pub use cache::ModuleCache;

/// Module parameters: module id -> parameter name -> value.
/// Parameters under [`GLOBAL_PARAMETERS`] apply to every module.
pub type ModuleParameters = BTreeMap<String, BTreeMap<String, Value>>;

pub const GLOBAL_PARAMETERS: &str = "$global";

/// A value that may still reference runtime data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ArgumentValue {
    Literal(Value),
    /// Result of another future: an address for deployments and contract-at,
    /// the decoded value for static calls and event reads.
    Future(FutureId),
    Parameter(ModuleParameter),
    Account(usize),
    Array(Vec<ArgumentValue>),
    Object(BTreeMap<String, ArgumentValue>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleParameter {
    pub module_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ArgumentValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        ArgumentValue::Literal(value.into())
    }

    /// Futures referenced anywhere inside this value.
    pub fn collect_futures(&self, out: &mut BTreeSet<FutureId>) {
        match self {
            ArgumentValue::Future(id) => {
                out.insert(id.clone());
            }
            ArgumentValue::Array(items) => items.iter().for_each(|v| v.collect_futures(out)),
            ArgumentValue::Object(map) => map.values().for_each(|v| v.collect_futures(out)),
            ArgumentValue::Literal(_) | ArgumentValue::Parameter(_) | ArgumentValue::Account(_) => {}
        }
    }

    /// Module parameters referenced anywhere inside this value.
    pub fn collect_parameters<'a>(&'a self, out: &mut Vec<&'a ModuleParameter>) {
        match self {
            ArgumentValue::Parameter(p) => out.push(p),
            ArgumentValue::Array(items) => items.iter().for_each(|v| v.collect_parameters(out)),
            ArgumentValue::Object(map) => map.values().for_each(|v| v.collect_parameters(out)),
            ArgumentValue::Literal(_) | ArgumentValue::Future(_) | ArgumentValue::Account(_) => {}
        }
    }

    /// Account indexes referenced anywhere inside this value.
    pub fn collect_accounts(&self, out: &mut Vec<usize>) {
        match self {
            ArgumentValue::Account(i) => out.push(*i),
            ArgumentValue::Array(items) => items.iter().for_each(|v| v.collect_accounts(out)),
            ArgumentValue::Object(map) => map.values().for_each(|v| v.collect_accounts(out)),
            ArgumentValue::Literal(_) | ArgumentValue::Future(_) | ArgumentValue::Parameter(_) => {}
        }
    }
}

impl From<Value> for ArgumentValue {
    fn from(value: Value) -> Self {
        ArgumentValue::Literal(value)
    }
}

/// Who signs a future's transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Sender {
    Account(usize),
    Address(Address),
}

/// Kind-specific parameters of a future.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FutureParams {
    /// Contract and library deployments.
    #[serde(rename_all = "camelCase")]
    Deployment {
        contract_name: String,
        /// Present when the artifact was given inline instead of by name.
        artifact: Option<Artifact>,
        constructor_args: Vec<ArgumentValue>,
        /// library name -> deployment future
        libraries: BTreeMap<String, FutureId>,
        value: ArgumentValue,
        from: Option<Sender>,
    },
    #[serde(rename_all = "camelCase")]
    Call {
        contract: FutureId,
        function_name: String,
        args: Vec<ArgumentValue>,
        value: ArgumentValue,
        from: Option<Sender>,
    },
    #[serde(rename_all = "camelCase")]
    StaticCall {
        contract: FutureId,
        function_name: String,
        args: Vec<ArgumentValue>,
        name_or_index: NameOrIndex,
        from: Option<Sender>,
    },
    #[serde(rename_all = "camelCase")]
    ContractAt {
        contract_name: String,
        artifact: Option<Artifact>,
        address: ArgumentValue,
    },
    #[serde(rename_all = "camelCase")]
    ReadEventArgument {
        /// Future whose confirmed transaction holds the event.
        future: FutureId,
        /// Contract future that emitted the event.
        emitter: FutureId,
        event_name: String,
        event_index: usize,
        name_or_index: NameOrIndex,
    },
    #[serde(rename_all = "camelCase")]
    SendData {
        to: ArgumentValue,
        data: Option<Bytes>,
        value: ArgumentValue,
        from: Option<Sender>,
    },
}

impl FutureParams {
    /// The sender, for futures that send or simulate transactions.
    pub fn from(&self) -> Option<Option<Sender>> {
        match self {
            FutureParams::Deployment { from, .. }
            | FutureParams::Call { from, .. }
            | FutureParams::StaticCall { from, .. }
            | FutureParams::SendData { from, .. } => Some(*from),
            FutureParams::ContractAt { .. } | FutureParams::ReadEventArgument { .. } => None,
        }
    }

    /// Every argument-like value, for dependency and parameter discovery.
    pub fn argument_values(&self) -> Vec<&ArgumentValue> {
        match self {
            FutureParams::Deployment {
                constructor_args,
                value,
                ..
            } => constructor_args.iter().chain(std::iter::once(value)).collect(),
            FutureParams::Call { args, value, .. } => {
                args.iter().chain(std::iter::once(value)).collect()
            }
            FutureParams::StaticCall { args, .. } => args.iter().collect(),
            FutureParams::ContractAt { address, .. } => vec![address],
            FutureParams::ReadEventArgument { .. } => Vec::new(),
            FutureParams::SendData { to, value, .. } => vec![to, value],
        }
    }

    /// Contract name for futures that are, or act on, a named contract.
    pub fn contract_name(&self) -> Option<&str> {
        match self {
            FutureParams::Deployment { contract_name, .. }
            | FutureParams::ContractAt { contract_name, .. } => Some(contract_name),
            _ => None,
        }
    }
}

/// A node of the future graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Future {
    pub id: FutureId,
    pub kind: FutureKind,
    pub module_id: String,
    pub dependencies: BTreeSet<FutureId>,
    pub params: FutureParams,
}

impl Future {
    /// True for futures whose execution sends transactions.
    pub fn sends_transactions(&self) -> bool {
        matches!(
            self.params,
            FutureParams::Deployment { .. } | FutureParams::Call { .. } | FutureParams::SendData { .. }
        )
    }

    /// The part of the id after `#`.
    pub fn local_id(&self) -> &str {
        local_id(&self.id)
    }
}

pub fn local_id(future_id: &str) -> &str {
    future_id
        .split_once('#')
        .map_or(future_id, |(_, local)| local)
}

/// An immutable, fully built module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnitionModule {
    pub id: String,
    /// Every future, including those of submodules, keyed by id.
    pub futures: BTreeMap<FutureId, Future>,
    /// Ids of submodules used by this module.
    pub submodules: BTreeSet<String>,
    /// Named results exposed by the module: key -> future id.
    pub results: BTreeMap<String, FutureId>,
}

impl IgnitionModule {
    pub fn future(&self, id: &str) -> Option<&Future> {
        self.futures.get(id)
    }

    /// Futures that belong to `module_id` itself, not to its submodules.
    pub fn own_futures<'a>(&'a self, module_id: &'a str) -> impl Iterator<Item = &'a Future> + 'a {
        self.futures.values().filter(move |f| f.module_id == module_id)
    }

    /// Futures that depend directly on `id`.
    pub fn dependents_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Future> + 'a {
        self.futures
            .values()
            .filter(move |f| f.dependencies.contains(id))
    }
}
