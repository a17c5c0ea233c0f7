//! JSON module definitions.
//!
//! The CLI reads modules from JSON so that deployments can be declared
//! without writing Rust:
//!
//! ```json
//! {
//!   "id": "Token",
//!   "futures": [
//!     { "type": "contract", "contract": "Token",
//!       "args": [{ "parameter": "supply", "default": 1000 }] },
//!     { "type": "call", "contract": "Token", "function": "mint",
//!       "args": [{ "account": 1 }, 5] }
//!   ],
//!   "results": { "token": "Token" }
//! }
//! ```
//!
//! Inside arguments, single-key objects are references: `{"future": id}`,
//! `{"parameter": name, "default": v}` and `{"account": index}`. A future id
//! without `#` names a future of the module being defined.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use ethers_core::types::Bytes;
use ignition_types::address::parse_address;
use ignition_types::encoding::parse_hex_bytes;
use ignition_types::{FutureId, NameOrIndex};
use serde::Deserialize;
use serde_json::Value;

use super::builder::{FutureOptions, ModuleBuilder, ReadEventOptions};
use super::cache::ModuleCache;
use super::{ArgumentValue, IgnitionModule, Sender};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModuleDefinition {
    pub id: String,
    /// Modules built first and merged into this one.
    #[serde(default)]
    pub submodules: Vec<ModuleDefinition>,
    #[serde(default)]
    pub futures: Vec<FutureDefinition>,
    /// result key -> future id
    #[serde(default)]
    pub results: BTreeMap<String, String>,
}

/// Options common to every transaction-sending future.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonOptions {
    pub id: Option<String>,
    /// Account index or address.
    pub from: Option<Value>,
    pub value: Option<Value>,
    #[serde(default)]
    pub after: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FutureDefinition {
    #[serde(rename_all = "camelCase")]
    Contract {
        contract: String,
        #[serde(default)]
        args: Vec<Value>,
        /// library name -> library future
        #[serde(default)]
        libraries: BTreeMap<String, String>,
        #[serde(flatten)]
        options: CommonOptions,
    },
    #[serde(rename_all = "camelCase")]
    Library {
        contract: String,
        #[serde(default)]
        libraries: BTreeMap<String, String>,
        #[serde(flatten)]
        options: CommonOptions,
    },
    #[serde(rename_all = "camelCase")]
    Call {
        contract: String,
        function: String,
        #[serde(default)]
        args: Vec<Value>,
        #[serde(flatten)]
        options: CommonOptions,
    },
    #[serde(rename_all = "camelCase")]
    StaticCall {
        contract: String,
        function: String,
        #[serde(default)]
        args: Vec<Value>,
        #[serde(default)]
        output: NameOrIndex,
        #[serde(flatten)]
        options: CommonOptions,
    },
    #[serde(rename_all = "camelCase")]
    ContractAt {
        contract: String,
        address: Value,
        #[serde(flatten)]
        options: CommonOptions,
    },
    #[serde(rename_all = "camelCase")]
    ReadEventArgument {
        future: String,
        event: String,
        argument: NameOrIndex,
        emitter: Option<String>,
        #[serde(default)]
        event_index: usize,
        id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Send {
        id: String,
        to: Value,
        data: Option<String>,
        from: Option<Value>,
        value: Option<Value>,
        #[serde(default)]
        after: Vec<String>,
    },
}

/// Read a module definition from a JSON file.
pub fn load_module_definition(path: &Path) -> Result<ModuleDefinition> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read module {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse module {}", path.display()))
}

impl ModuleDefinition {
    /// Build the module, and its submodules, through `cache`.
    pub fn build(&self, cache: &mut ModuleCache) -> Result<IgnitionModule> {
        let mut submodules = Vec::with_capacity(self.submodules.len());
        for sub in &self.submodules {
            submodules.push(sub.build(cache)?);
        }
        let module = cache.build(&self.id, |m, _| {
            for sub in &submodules {
                m.use_module(sub)?;
            }
            for future in &self.futures {
                add_future(m, future)?;
            }
            for (key, id) in &self.results {
                let id = qualify(m, id);
                m.result(key, &id);
            }
            Ok(())
        })?;
        for (key, id) in &module.results {
            if !module.futures.contains_key(id) {
                bail!("Result {} of module {} refers to unknown future {}", key, module.id, id);
            }
        }
        Ok(module)
    }
}

fn qualify(m: &ModuleBuilder, id: &str) -> FutureId {
    if id.contains('#') {
        id.to_string()
    } else {
        format!("{}#{}", m.module_id(), id)
    }
}

fn add_future(m: &mut ModuleBuilder, future: &FutureDefinition) -> Result<FutureId> {
    match future {
        FutureDefinition::Contract {
            contract,
            args,
            libraries,
            options,
        } => {
            let args = parse_arguments(m, args)?;
            let opts = future_options(m, options, libraries)?;
            m.contract(contract, args, opts)
        }
        FutureDefinition::Library {
            contract,
            libraries,
            options,
        } => {
            let opts = future_options(m, options, libraries)?;
            m.library(contract, opts)
        }
        FutureDefinition::Call {
            contract,
            function,
            args,
            options,
        } => {
            let args = parse_arguments(m, args)?;
            let opts = future_options(m, options, &BTreeMap::new())?;
            let contract = qualify(m, contract);
            m.call(&contract, function, args, opts)
        }
        FutureDefinition::StaticCall {
            contract,
            function,
            args,
            output,
            options,
        } => {
            let args = parse_arguments(m, args)?;
            let opts = future_options(m, options, &BTreeMap::new())?;
            let contract = qualify(m, contract);
            m.static_call(&contract, function, args, output.clone(), opts)
        }
        FutureDefinition::ContractAt {
            contract,
            address,
            options,
        } => {
            let address = parse_argument(m, address)?;
            let opts = future_options(m, options, &BTreeMap::new())?;
            m.contract_at(contract, address, opts)
        }
        FutureDefinition::ReadEventArgument {
            future,
            event,
            argument,
            emitter,
            event_index,
            id,
        } => {
            let future = qualify(m, future);
            let opts = ReadEventOptions {
                id: id.clone(),
                emitter: emitter.as_deref().map(|e| qualify(m, e)),
                event_index: *event_index,
            };
            m.read_event_argument(&future, event, argument.clone(), opts)
        }
        FutureDefinition::Send {
            id,
            to,
            data,
            from,
            value,
            after,
        } => {
            let to = parse_argument(m, to)?;
            let value = match value {
                Some(v) => parse_argument(m, v)?,
                None => ArgumentValue::literal(0),
            };
            let data = data
                .as_deref()
                .map(|d| parse_hex_bytes(d, "send data").map(Bytes::from))
                .transpose()?;
            let opts = FutureOptions {
                from: from.as_ref().map(parse_sender).transpose()?,
                after: after.iter().map(|a| qualify(m, a)).collect(),
                ..Default::default()
            };
            m.send(id, to, value, data, opts)
        }
    }
}

fn future_options(
    m: &ModuleBuilder,
    options: &CommonOptions,
    libraries: &BTreeMap<String, String>,
) -> Result<FutureOptions> {
    Ok(FutureOptions {
        id: options.id.clone(),
        from: options.from.as_ref().map(parse_sender).transpose()?,
        value: options
            .value
            .as_ref()
            .map(|v| parse_argument(m, v))
            .transpose()?,
        after: options.after.iter().map(|a| qualify(m, a)).collect(),
        libraries: libraries
            .iter()
            .map(|(name, id)| (name.clone(), qualify(m, id)))
            .collect(),
    })
}

fn parse_sender(value: &Value) -> Result<Sender> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(|i| Sender::Account(i as usize))
            .ok_or_else(|| anyhow!("Invalid account index {}", n)),
        Value::String(s) => parse_address(s)
            .map(Sender::Address)
            .ok_or_else(|| anyhow!("Invalid sender address {}", s)),
        Value::Object(map) => match map.get("account").and_then(Value::as_u64) {
            Some(i) => Ok(Sender::Account(i as usize)),
            None => bail!("Invalid sender {}", value),
        },
        other => bail!("Invalid sender {}", other),
    }
}

fn parse_arguments(m: &ModuleBuilder, values: &[Value]) -> Result<Vec<ArgumentValue>> {
    values.iter().map(|v| parse_argument(m, v)).collect()
}

/// Turn definition JSON into an argument, recognising reference objects.
pub fn parse_argument(m: &ModuleBuilder, value: &Value) -> Result<ArgumentValue> {
    match value {
        Value::Array(items) => Ok(ArgumentValue::Array(parse_arguments(m, items)?)),
        Value::Object(map) => {
            if let Some(future) = map.get("future") {
                let id = future
                    .as_str()
                    .ok_or_else(|| anyhow!("Future reference must be a string: {}", value))?;
                return Ok(ArgumentValue::Future(qualify(m, id)));
            }
            if let Some(name) = map.get("parameter") {
                let name = name
                    .as_str()
                    .ok_or_else(|| anyhow!("Parameter name must be a string: {}", value))?;
                return Ok(m.get_parameter(name, map.get("default").cloned()));
            }
            if let Some(index) = map.get("account") {
                let index = index
                    .as_u64()
                    .ok_or_else(|| anyhow!("Account index must be a number: {}", value))?;
                return Ok(m.get_account(index as usize));
            }
            let mut out = BTreeMap::new();
            for (k, v) in map {
                out.insert(k.clone(), parse_argument(m, v)?);
            }
            Ok(ArgumentValue::Object(out))
        }
        other => Ok(ArgumentValue::Literal(other.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::FutureParams;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn definition(value: Value) -> ModuleDefinition {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_build_from_json() -> Result<()> {
        let def = definition(json!({
            "id": "Token",
            "futures": [
                {"type": "library", "contract": "Math"},
                {"type": "contract", "contract": "Token",
                 "args": [{"parameter": "supply", "default": 1000}],
                 "libraries": {"Math": "Math"}, "from": 1},
                {"type": "call", "contract": "Token", "function": "mint",
                 "args": [{"account": 2}, 5], "value": "0x10"},
                {"type": "staticCall", "contract": "Token", "function": "balanceOf",
                 "args": [{"account": 2}], "output": "balance"},
                {"type": "readEventArgument", "future": "Token.mint", "event": "Minted",
                 "argument": 0},
                {"type": "send", "id": "fund", "to": {"future": "Token"}, "value": 7,
                 "data": "0x01"}
            ],
            "results": {"token": "Token"}
        }));
        let module = def.build(&mut ModuleCache::new())?;
        assert_eq!(module.futures.len(), 6);
        assert_eq!(module.results["token"], "Token#Token");
        let token = &module.futures["Token#Token"];
        assert_eq!(token.dependencies, BTreeSet::from(["Token#Math".to_string()]));
        match &token.params {
            FutureParams::Deployment { from, constructor_args, .. } => {
                assert_eq!(*from, Some(Sender::Account(1)));
                assert!(matches!(constructor_args[0], ArgumentValue::Parameter(_)));
            }
            other => panic!("unexpected params {:?}", other),
        }
        assert!(module.futures.contains_key("Token#Token.Minted.0.0"));
        assert_eq!(
            module.futures["Token#fund"].dependencies,
            BTreeSet::from(["Token#Token".to_string()])
        );
        Ok(())
    }

    #[test]
    fn test_submodules_and_qualified_references() -> Result<()> {
        let def = definition(json!({
            "id": "Main",
            "submodules": [{
                "id": "Sub",
                "futures": [{"type": "contract", "contract": "Vault"}],
                "results": {"vault": "Vault"}
            }],
            "futures": [
                {"type": "call", "contract": "Sub#Vault", "function": "open"}
            ]
        }));
        let module = def.build(&mut ModuleCache::new())?;
        assert!(module.futures.contains_key("Main#Sub~Vault.open"));
        Ok(())
    }

    #[test]
    fn test_unknown_future_type_is_rejected() {
        let err = serde_json::from_value::<ModuleDefinition>(json!({
            "id": "M",
            "futures": [{"type": "selfDestruct", "contract": "X"}]
        }));
        assert!(err.is_err());
    }

    #[test]
    fn test_unknown_result_target() {
        let def = definition(json!({"id": "M", "results": {"x": "Nope"}}));
        assert!(def.build(&mut ModuleCache::new()).is_err());
    }
}
