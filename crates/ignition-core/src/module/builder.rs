//! Programmatic module construction.
//!
//! ```
//! use ignition_core::module::{build_module, FutureOptions};
//! use serde_json::json;
//!
//! let module = build_module("Token", |m| {
//!     let token = m.contract("Token", vec![json!(1_000).into()], FutureOptions::default())?;
//!     m.call(&token, "mint", vec![m.get_account(1), json!(5).into()], FutureOptions::default())?;
//!     m.result("token", &token);
//!     Ok(())
//! })
//! .unwrap();
//! assert!(module.futures.contains_key("Token#Token.mint"));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{anyhow, bail, Result};
use ethers_core::types::Bytes;
use ignition_types::{Artifact, FutureId, FutureKind, NameOrIndex};
use serde_json::Value;

use super::{
    local_id, ArgumentValue, Future, FutureParams, IgnitionModule, ModuleParameter, Sender,
};

/// Options shared by the future constructors. Fields that do not apply to a
/// future kind are ignored.
#[derive(Debug, Clone, Default)]
pub struct FutureOptions {
    /// Local id override. Required when the default id would collide.
    pub id: Option<String>,
    pub from: Option<Sender>,
    pub value: Option<ArgumentValue>,
    /// Extra dependencies that are not implied by arguments.
    pub after: Vec<FutureId>,
    /// library name -> library deployment future
    pub libraries: BTreeMap<String, FutureId>,
}

impl FutureOptions {
    pub fn with_id(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadEventOptions {
    pub id: Option<String>,
    /// Contract that emitted the event. Defaults to the future itself for
    /// deployments and to the called contract for calls.
    pub emitter: Option<FutureId>,
    /// Which matching event of the transaction to read.
    pub event_index: usize,
}

/// Identifiers must be usable as file names and inside future ids.
fn is_valid_identifier(id: &str) -> bool {
    let mut chars = id.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Builder for one module. Obtain one through [`build_module`] or
/// [`ModuleCache::build`](super::ModuleCache::build).
pub struct ModuleBuilder {
    module_id: String,
    futures: BTreeMap<FutureId, Future>,
    submodules: BTreeSet<String>,
    results: BTreeMap<String, FutureId>,
}

/// Build a module from a closure.
pub fn build_module<F>(module_id: &str, define: F) -> Result<IgnitionModule>
where
    F: FnOnce(&mut ModuleBuilder) -> Result<()>,
{
    let mut builder = ModuleBuilder::new(module_id)?;
    define(&mut builder)?;
    Ok(builder.build())
}

impl ModuleBuilder {
    pub fn new(module_id: &str) -> Result<Self> {
        if !is_valid_identifier(module_id) {
            bail!("Invalid module id '{}'", module_id);
        }
        Ok(Self {
            module_id: module_id.to_string(),
            futures: BTreeMap::new(),
            submodules: BTreeSet::new(),
            results: BTreeMap::new(),
        })
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn build(self) -> IgnitionModule {
        IgnitionModule {
            id: self.module_id,
            futures: self.futures,
            submodules: self.submodules,
            results: self.results,
        }
    }

    // =========================================================================
    // Runtime values
    // =========================================================================

    pub fn get_parameter(&self, name: &str, default: Option<Value>) -> ArgumentValue {
        ArgumentValue::Parameter(ModuleParameter {
            module_id: self.module_id.clone(),
            name: name.to_string(),
            default,
        })
    }

    pub fn get_account(&self, index: usize) -> ArgumentValue {
        ArgumentValue::Account(index)
    }

    pub fn account(&self, index: usize) -> Sender {
        Sender::Account(index)
    }

    // =========================================================================
    // Futures
    // =========================================================================

    /// Deploy a contract whose artifact is resolved by name.
    pub fn contract(
        &mut self,
        contract_name: &str,
        args: Vec<ArgumentValue>,
        opts: FutureOptions,
    ) -> Result<FutureId> {
        self.deployment(
            FutureKind::NamedArtifactContractDeployment,
            contract_name,
            None,
            args,
            opts,
        )
    }

    /// Deploy a contract from an inline artifact.
    pub fn contract_from_artifact(
        &mut self,
        contract_name: &str,
        artifact: Artifact,
        args: Vec<ArgumentValue>,
        opts: FutureOptions,
    ) -> Result<FutureId> {
        self.deployment(
            FutureKind::ContractDeployment,
            contract_name,
            Some(artifact),
            args,
            opts,
        )
    }

    pub fn library(&mut self, library_name: &str, opts: FutureOptions) -> Result<FutureId> {
        self.deployment(
            FutureKind::NamedArtifactLibraryDeployment,
            library_name,
            None,
            Vec::new(),
            opts,
        )
    }

    pub fn library_from_artifact(
        &mut self,
        library_name: &str,
        artifact: Artifact,
        opts: FutureOptions,
    ) -> Result<FutureId> {
        self.deployment(
            FutureKind::LibraryDeployment,
            library_name,
            Some(artifact),
            Vec::new(),
            opts,
        )
    }

    fn deployment(
        &mut self,
        kind: FutureKind,
        contract_name: &str,
        artifact: Option<Artifact>,
        args: Vec<ArgumentValue>,
        opts: FutureOptions,
    ) -> Result<FutureId> {
        let default_local = contract_name
            .rsplit_once(':')
            .map_or(contract_name, |(_, name)| name);
        let id = self.future_id(opts.id.as_deref(), default_local)?;
        let value = opts.value.unwrap_or_else(|| ArgumentValue::literal(0));
        let mut dependencies = self.argument_dependencies(args.iter().chain([&value]));
        dependencies.extend(opts.libraries.values().cloned());
        self.add_dependencies(&mut dependencies, &opts.after)?;
        self.insert(Future {
            id: id.clone(),
            kind,
            module_id: self.module_id.clone(),
            dependencies,
            params: FutureParams::Deployment {
                contract_name: contract_name.to_string(),
                artifact,
                constructor_args: args,
                libraries: opts.libraries,
                value,
                from: opts.from,
            },
        })?;
        Ok(id)
    }

    pub fn call(
        &mut self,
        contract: &FutureId,
        function_name: &str,
        args: Vec<ArgumentValue>,
        opts: FutureOptions,
    ) -> Result<FutureId> {
        let default_local = format!("{}.{}", self.contract_label(contract)?, function_name);
        let id = self.future_id(opts.id.as_deref(), &default_local)?;
        let value = opts.value.unwrap_or_else(|| ArgumentValue::literal(0));
        let mut dependencies = self.argument_dependencies(args.iter().chain([&value]));
        dependencies.insert(contract.clone());
        self.add_dependencies(&mut dependencies, &opts.after)?;
        self.insert(Future {
            id: id.clone(),
            kind: FutureKind::ContractCall,
            module_id: self.module_id.clone(),
            dependencies,
            params: FutureParams::Call {
                contract: contract.clone(),
                function_name: function_name.to_string(),
                args,
                value,
                from: opts.from,
            },
        })?;
        Ok(id)
    }

    pub fn static_call(
        &mut self,
        contract: &FutureId,
        function_name: &str,
        args: Vec<ArgumentValue>,
        name_or_index: NameOrIndex,
        opts: FutureOptions,
    ) -> Result<FutureId> {
        let default_local = format!("{}.{}", self.contract_label(contract)?, function_name);
        let id = self.future_id(opts.id.as_deref(), &default_local)?;
        let mut dependencies = self.argument_dependencies(args.iter());
        dependencies.insert(contract.clone());
        self.add_dependencies(&mut dependencies, &opts.after)?;
        self.insert(Future {
            id: id.clone(),
            kind: FutureKind::StaticCall,
            module_id: self.module_id.clone(),
            dependencies,
            params: FutureParams::StaticCall {
                contract: contract.clone(),
                function_name: function_name.to_string(),
                args,
                name_or_index,
                from: opts.from,
            },
        })?;
        Ok(id)
    }

    /// Reference an existing contract by address.
    pub fn contract_at(
        &mut self,
        contract_name: &str,
        address: ArgumentValue,
        opts: FutureOptions,
    ) -> Result<FutureId> {
        self.contract_at_inner(
            FutureKind::NamedArtifactContractAt,
            contract_name,
            None,
            address,
            opts,
        )
    }

    pub fn contract_at_from_artifact(
        &mut self,
        contract_name: &str,
        artifact: Artifact,
        address: ArgumentValue,
        opts: FutureOptions,
    ) -> Result<FutureId> {
        self.contract_at_inner(
            FutureKind::ContractAt,
            contract_name,
            Some(artifact),
            address,
            opts,
        )
    }

    fn contract_at_inner(
        &mut self,
        kind: FutureKind,
        contract_name: &str,
        artifact: Option<Artifact>,
        address: ArgumentValue,
        opts: FutureOptions,
    ) -> Result<FutureId> {
        let default_local = contract_name
            .rsplit_once(':')
            .map_or(contract_name, |(_, name)| name);
        let id = self.future_id(opts.id.as_deref(), default_local)?;
        let mut dependencies = self.argument_dependencies([&address]);
        self.add_dependencies(&mut dependencies, &opts.after)?;
        self.insert(Future {
            id: id.clone(),
            kind,
            module_id: self.module_id.clone(),
            dependencies,
            params: FutureParams::ContractAt {
                contract_name: contract_name.to_string(),
                artifact,
                address,
            },
        })?;
        Ok(id)
    }

    /// Read an argument of an event emitted by `future`'s transaction.
    pub fn read_event_argument(
        &mut self,
        future: &FutureId,
        event_name: &str,
        argument: NameOrIndex,
        opts: ReadEventOptions,
    ) -> Result<FutureId> {
        let source = self
            .futures
            .get(future)
            .ok_or_else(|| anyhow!("Unknown future {} in module {}", future, self.module_id))?;
        let emitter = match (&opts.emitter, &source.params) {
            (Some(emitter), _) => emitter.clone(),
            (None, FutureParams::Deployment { .. }) => future.clone(),
            (None, FutureParams::Call { contract, .. }) => contract.clone(),
            (None, _) => bail!(
                "Cannot infer the emitter of event {} from future {}; pass it explicitly",
                event_name,
                future
            ),
        };
        let default_local = format!(
            "{}.{}.{}.{}",
            self.contract_label(&emitter)?,
            event_name,
            argument,
            opts.event_index
        );
        let id = self.future_id(opts.id.as_deref(), &default_local)?;
        let dependencies = BTreeSet::from([future.clone(), emitter.clone()]);
        self.insert(Future {
            id: id.clone(),
            kind: FutureKind::ReadEventArgument,
            module_id: self.module_id.clone(),
            dependencies,
            params: FutureParams::ReadEventArgument {
                future: future.clone(),
                emitter,
                event_name: event_name.to_string(),
                event_index: opts.event_index,
                name_or_index: argument,
            },
        })?;
        Ok(id)
    }

    /// Send a raw transaction. The local id is mandatory.
    pub fn send(
        &mut self,
        id: &str,
        to: ArgumentValue,
        value: ArgumentValue,
        data: Option<Bytes>,
        opts: FutureOptions,
    ) -> Result<FutureId> {
        let id = self.future_id(Some(id), id)?;
        let mut dependencies = self.argument_dependencies([&to, &value]);
        self.add_dependencies(&mut dependencies, &opts.after)?;
        self.insert(Future {
            id: id.clone(),
            kind: FutureKind::SendData,
            module_id: self.module_id.clone(),
            dependencies,
            params: FutureParams::SendData {
                to,
                data,
                value,
                from: opts.from,
            },
        })?;
        Ok(id)
    }

    // =========================================================================
    // Composition
    // =========================================================================

    /// Include a submodule. Its futures join this module's graph unchanged
    /// and its results are returned for use as arguments.
    pub fn use_module(&mut self, submodule: &IgnitionModule) -> Result<BTreeMap<String, FutureId>> {
        if submodule.id == self.module_id {
            bail!("Module {} cannot use itself", self.module_id);
        }
        for (id, future) in &submodule.futures {
            match self.futures.get(id) {
                Some(existing) if existing != future => bail!(
                    "Future {} from submodule {} conflicts with an existing future",
                    id,
                    submodule.id
                ),
                Some(_) => {}
                None => {
                    self.futures.insert(id.clone(), future.clone());
                }
            }
        }
        self.submodules.insert(submodule.id.clone());
        self.submodules.extend(submodule.submodules.iter().cloned());
        Ok(submodule.results.clone())
    }

    /// Every future of a used submodule, for depending on the module as a whole.
    pub fn module_futures(&self, submodule_id: &str) -> Vec<FutureId> {
        self.futures
            .values()
            .filter(|f| f.module_id == submodule_id)
            .map(|f| f.id.clone())
            .collect()
    }

    pub fn result(&mut self, key: &str, future: &FutureId) {
        self.results.insert(key.to_string(), future.clone());
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn future_id(&self, user_id: Option<&str>, default_local: &str) -> Result<FutureId> {
        let local = match user_id {
            Some(id) => {
                if !is_valid_identifier(id) {
                    bail!("Invalid id '{}' in module {}", id, self.module_id);
                }
                id.to_string()
            }
            None => default_local.to_string(),
        };
        Ok(format!("{}#{}", self.module_id, local))
    }

    /// Name used for a contract future inside generated ids. Contracts from
    /// submodules are prefixed with their module id.
    fn contract_label(&self, contract: &FutureId) -> Result<String> {
        let future = self.futures.get(contract).ok_or_else(|| {
            anyhow!("Unknown future {} in module {}", contract, self.module_id)
        })?;
        if !future.kind.produces_address() {
            bail!(
                "Future {} is a {} and cannot be used as a contract",
                contract,
                future.kind
            );
        }
        let local = local_id(contract);
        if future.module_id == self.module_id {
            Ok(local.to_string())
        } else {
            Ok(format!("{}~{}", future.module_id, local))
        }
    }

    fn argument_dependencies<'a>(
        &self,
        values: impl IntoIterator<Item = &'a ArgumentValue>,
    ) -> BTreeSet<FutureId> {
        let mut out = BTreeSet::new();
        for value in values {
            value.collect_futures(&mut out);
        }
        out
    }

    fn add_dependencies(&self, deps: &mut BTreeSet<FutureId>, after: &[FutureId]) -> Result<()> {
        for dep in deps.iter().chain(after) {
            if !self.futures.contains_key(dep) {
                bail!("Unknown future {} in module {}", dep, self.module_id);
            }
        }
        deps.extend(after.iter().cloned());
        Ok(())
    }

    fn insert(&mut self, future: Future) -> Result<()> {
        if self.futures.contains_key(&future.id) {
            bail!(
                "Duplicated id {} found in module {}, ensure the id passed is unique",
                future.id,
                self.module_id
            );
        }
        self.futures.insert(future.id.clone(), future);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_ids() -> Result<()> {
        let module = build_module("M", |m| {
            let token = m.contract("Token", vec![], FutureOptions::default())?;
            m.call(&token, "mint", vec![json!(1).into()], FutureOptions::default())?;
            m.static_call(&token, "owner", vec![], NameOrIndex::default(), FutureOptions::with_id("getOwner"))?;
            m.read_event_argument(&token, "Minted", NameOrIndex::Name("to".into()), ReadEventOptions::default())?;
            m.send("fund", ArgumentValue::Future(token.clone()), json!(5).into(), None, FutureOptions::default())?;
            Ok(())
        })?;
        let ids: Vec<&String> = module.futures.keys().collect();
        assert_eq!(
            ids,
            vec![
                "M#Token",
                "M#Token.Minted.to.0",
                "M#Token.mint",
                "M#fund",
                "M#getOwner",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let err = build_module("M", |m| {
            m.contract("Token", vec![], FutureOptions::default())?;
            m.contract("Token", vec![], FutureOptions::default())?;
            Ok(())
        })
        .unwrap_err();
        assert!(err.to_string().contains("Duplicated id M#Token"), "{err}");
    }

    #[test]
    fn test_dependencies_from_arguments_libraries_and_after() -> Result<()> {
        let module = build_module("M", |m| {
            let lib = m.library("Math", FutureOptions::default())?;
            let a = m.contract("A", vec![], FutureOptions::default())?;
            let b = m.contract(
                "B",
                vec![ArgumentValue::Future(a.clone())],
                FutureOptions {
                    libraries: BTreeMap::from([("Math".to_string(), lib.clone())]),
                    ..Default::default()
                },
            )?;
            m.contract("C", vec![], FutureOptions { after: vec![b], ..Default::default() })?;
            Ok(())
        })?;
        assert_eq!(
            module.futures["M#B"].dependencies,
            BTreeSet::from(["M#A".to_string(), "M#Math".to_string()])
        );
        assert_eq!(
            module.futures["M#C"].dependencies,
            BTreeSet::from(["M#B".to_string()])
        );
        Ok(())
    }

    #[test]
    fn test_unknown_dependency_is_rejected() {
        let err = build_module("M", |m| {
            m.call(&"M#Nope".to_string(), "f", vec![], FutureOptions::default())?;
            Ok(())
        })
        .unwrap_err();
        assert!(err.to_string().contains("Unknown future M#Nope"));
    }

    #[test]
    fn test_use_module_merges_and_labels_ids() -> Result<()> {
        let sub = build_module("Sub", |m| {
            let t = m.contract("Token", vec![], FutureOptions::default())?;
            m.result("token", &t);
            Ok(())
        })?;
        let module = build_module("Main", |m| {
            let results = m.use_module(&sub)?;
            let token = results["token"].clone();
            m.call(&token, "init", vec![], FutureOptions::default())?;
            assert_eq!(m.module_futures("Sub"), vec!["Sub#Token".to_string()]);
            Ok(())
        })?;
        assert!(module.futures.contains_key("Sub#Token"));
        assert!(module.futures.contains_key("Main#Sub~Token.init"));
        assert!(module.submodules.contains("Sub"));
        Ok(())
    }

    #[test]
    fn test_invalid_ids() {
        assert!(ModuleBuilder::new("bad id").is_err());
        assert!(build_module("M", |m| {
            m.contract("Token", vec![], FutureOptions::with_id("1abc"))?;
            Ok(())
        })
        .is_err());
    }
}
