//! Static checks run before anything is journaled.
//!
//! Validation never touches the network. Errors are collected for every
//! future instead of stopping at the first one, so a user can fix a module
//! in one pass.

use std::collections::BTreeMap;

use ethers_core::types::{Address, U256};
use ignition_types::encoding::json_to_u256;
use ignition_types::{Artifact, FutureId, NameOrIndex};
use tracing::debug;

use crate::abi::{
    constructor_input_count, constructor_is_payable, find_event, find_function, function_signature,
    is_payable, is_read_only, parse_abi,
};
use crate::artifacts::ArtifactResolver;
use crate::module::{ArgumentValue, Future, FutureParams, IgnitionModule, ModuleParameters, Sender, GLOBAL_PARAMETERS};

/// Future id -> problems found with it.
pub type ValidationErrors = BTreeMap<FutureId, Vec<String>>;

struct Validator<'a> {
    module: &'a IgnitionModule,
    resolver: &'a dyn ArtifactResolver,
    parameters: &'a ModuleParameters,
    accounts: &'a [Address],
    errors: ValidationErrors,
}

pub fn validate_module(
    module: &IgnitionModule,
    resolver: &dyn ArtifactResolver,
    parameters: &ModuleParameters,
    accounts: &[Address],
) -> ValidationErrors {
    let mut validator = Validator {
        module,
        resolver,
        parameters,
        accounts,
        errors: ValidationErrors::new(),
    };
    for future in module.futures.values() {
        validator.check_future(future);
    }
    debug!(
        module = %module.id,
        futures = module.futures.len(),
        invalid = validator.errors.len(),
        "Validated module"
    );
    validator.errors
}

/// The artifact of a deployment or contract-at future, inline or by name.
pub fn future_artifact(future: &Future, resolver: &dyn ArtifactResolver) -> anyhow::Result<Artifact> {
    match &future.params {
        FutureParams::Deployment {
            contract_name,
            artifact,
            ..
        }
        | FutureParams::ContractAt {
            contract_name,
            artifact,
            ..
        } => match artifact {
            Some(artifact) => Ok(artifact.clone()),
            None => resolver.load_artifact(contract_name),
        },
        _ => anyhow::bail!("Future {} does not refer to a contract artifact", future.id),
    }
}

fn literal_value(value: &ArgumentValue) -> Option<U256> {
    match value {
        ArgumentValue::Literal(v) => json_to_u256(v),
        _ => None,
    }
}

impl Validator<'_> {
    fn error(&mut self, future: &Future, message: String) {
        self.errors.entry(future.id.clone()).or_default().push(message);
    }

    fn check_future(&mut self, future: &Future) {
        self.check_references(future);
        match &future.params {
            FutureParams::Deployment {
                contract_name,
                constructor_args,
                libraries,
                value,
                ..
            } => {
                let Some(artifact) = self.artifact_of(future) else { return };
                let abi = match parse_abi(&artifact) {
                    Ok(abi) => abi,
                    Err(e) => return self.error(future, e.to_string()),
                };
                let expected = constructor_input_count(&abi);
                if expected != constructor_args.len() {
                    self.error(
                        future,
                        format!(
                            "The constructor of the contract {} expects {} arguments but {} were given",
                            contract_name,
                            expected,
                            constructor_args.len()
                        ),
                    );
                }
                if literal_value(value).is_some_and(|v| !v.is_zero())
                    && !constructor_is_payable(&artifact)
                {
                    self.error(
                        future,
                        format!(
                            "The constructor of the contract {} is not payable, but a value was sent",
                            contract_name
                        ),
                    );
                }
                let required = artifact.required_libraries();
                for (source, lib) in &required {
                    let qualified = format!("{}:{}", source, lib);
                    if !libraries.contains_key(lib) && !libraries.contains_key(&qualified) {
                        self.error(
                            future,
                            format!("Missing library {} for contract {}", qualified, contract_name),
                        );
                    }
                }
                for name in libraries.keys() {
                    let needed = required
                        .iter()
                        .any(|(source, lib)| lib == name || &format!("{}:{}", source, lib) == name);
                    if !needed {
                        self.error(
                            future,
                            format!(
                                "Library {} is not needed by the contract {}",
                                name, contract_name
                            ),
                        );
                    }
                }
            }
            FutureParams::Call {
                contract,
                function_name,
                args,
                value,
                ..
            } => {
                let Some(artifact) = self.contract_artifact(future, contract) else { return };
                let Ok(abi) = parse_abi(&artifact) else { return };
                let function = match find_function(&abi, &artifact.contract_name, function_name) {
                    Ok(f) => f,
                    Err(e) => return self.error(future, e.to_string()),
                };
                if is_read_only(function) {
                    self.error(
                        future,
                        format!(
                            "Function {} in contract {} is not mutable, use a static call instead",
                            function_name, artifact.contract_name
                        ),
                    );
                }
                if function.inputs.len() != args.len() {
                    self.error(
                        future,
                        format!(
                            "Function {} expects {} arguments but {} were given",
                            function_signature(function),
                            function.inputs.len(),
                            args.len()
                        ),
                    );
                }
                if literal_value(value).is_some_and(|v| !v.is_zero()) && !is_payable(function) {
                    self.error(
                        future,
                        format!(
                            "Function {} in contract {} is not payable, but a value was sent",
                            function_name, artifact.contract_name
                        ),
                    );
                }
            }
            FutureParams::StaticCall {
                contract,
                function_name,
                args,
                name_or_index,
                ..
            } => {
                let Some(artifact) = self.contract_artifact(future, contract) else { return };
                let Ok(abi) = parse_abi(&artifact) else { return };
                let function = match find_function(&abi, &artifact.contract_name, function_name) {
                    Ok(f) => f,
                    Err(e) => return self.error(future, e.to_string()),
                };
                if !is_read_only(function) {
                    self.error(
                        future,
                        format!(
                            "Function {} in contract {} is not 'pure' or 'view' and cannot be statically called",
                            function_name, artifact.contract_name
                        ),
                    );
                }
                if function.inputs.len() != args.len() {
                    self.error(
                        future,
                        format!(
                            "Function {} expects {} arguments but {} were given",
                            function_signature(function),
                            function.inputs.len(),
                            args.len()
                        ),
                    );
                }
                let has_output = match name_or_index {
                    NameOrIndex::Index(i) => *i < function.outputs.len(),
                    NameOrIndex::Name(name) => function.outputs.iter().any(|p| &p.name == name),
                };
                if !has_output {
                    self.error(
                        future,
                        format!(
                            "Function {} has no output {}",
                            function_signature(function),
                            name_or_index
                        ),
                    );
                }
            }
            FutureParams::ContractAt { .. } => {
                if let Some(artifact) = self.artifact_of(future) {
                    if let Err(e) = parse_abi(&artifact) {
                        self.error(future, e.to_string());
                    }
                }
            }
            FutureParams::ReadEventArgument {
                emitter,
                event_name,
                name_or_index,
                ..
            } => {
                let Some(artifact) = self.contract_artifact(future, emitter) else { return };
                let Ok(abi) = parse_abi(&artifact) else { return };
                let event = match find_event(&abi, &artifact.contract_name, event_name) {
                    Ok(e) => e,
                    Err(e) => return self.error(future, e.to_string()),
                };
                let has_arg = match name_or_index {
                    NameOrIndex::Index(i) => *i < event.inputs.len(),
                    NameOrIndex::Name(name) => event.inputs.iter().any(|p| &p.name == name),
                };
                if !has_arg {
                    self.error(
                        future,
                        format!("Event {} has no argument {}", event_name, name_or_index),
                    );
                }
            }
            FutureParams::SendData { .. } => {}
        }
    }

    fn artifact_of(&mut self, future: &Future) -> Option<Artifact> {
        match future_artifact(future, self.resolver) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                self.error(future, format!("{:#}", e));
                None
            }
        }
    }

    /// Artifact of the contract future `contract` that `future` acts on.
    fn contract_artifact(&mut self, future: &Future, contract: &FutureId) -> Option<Artifact> {
        let Some(target) = self.module.future(contract) else {
            self.error(future, format!("Unknown contract future {}", contract));
            return None;
        };
        if !target.kind.produces_address() {
            self.error(
                future,
                format!("Future {} does not produce a contract", contract),
            );
            return None;
        }
        // Problems with the target's own artifact are reported on the target.
        future_artifact(target, self.resolver).ok()
    }

    fn check_references(&mut self, future: &Future) {
        let mut parameters = Vec::new();
        let mut accounts = Vec::new();
        for value in future.params.argument_values() {
            value.collect_parameters(&mut parameters);
            value.collect_accounts(&mut accounts);
        }
        if let Some(Some(Sender::Account(i))) = future.params.from() {
            accounts.push(i);
        }

        let mut messages = Vec::new();
        for p in parameters {
            let provided = self
                .parameters
                .get(&p.module_id)
                .is_some_and(|m| m.contains_key(&p.name))
                || self
                    .parameters
                    .get(GLOBAL_PARAMETERS)
                    .is_some_and(|m| m.contains_key(&p.name));
            if !provided && p.default.is_none() {
                messages.push(format!(
                    "Module parameter '{}' requires a value but was given none",
                    p.name
                ));
            }
        }
        for i in accounts {
            if i >= self.accounts.len() {
                messages.push(format!(
                    "Account index {} is out of range, the network has {} accounts",
                    i,
                    self.accounts.len()
                ));
            }
        }
        for message in messages {
            self.error(future, message);
        }
    }
}
