//! Explicit cache of built modules.
//!
//! A submodule used from several places must resolve to one set of futures.
//! The cache is passed through construction; building an id a second time
//! returns the first module, and a second build with a different definition
//! is an error.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use sha2::{Digest, Sha256};

use super::builder::ModuleBuilder;
use super::IgnitionModule;

#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: HashMap<String, (String, IgnitionModule)>,
}

/// SHA-256 over the serialized module, hex encoded.
pub fn module_fingerprint(module: &IgnitionModule) -> Result<String> {
    let bytes = serde_json::to_vec(module)
        .map_err(|e| anyhow!("Failed to serialize module {}: {}", module.id, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn get(&self, module_id: &str) -> Option<&IgnitionModule> {
        self.modules.get(module_id).map(|(_, m)| m)
    }

    /// Build `module_id` once. The closure receives the cache so it can
    /// build its own submodules through it.
    pub fn build<F>(&mut self, module_id: &str, define: F) -> Result<IgnitionModule>
    where
        F: FnOnce(&mut ModuleBuilder, &mut ModuleCache) -> Result<()>,
    {
        let mut builder = ModuleBuilder::new(module_id)?;
        define(&mut builder, self)?;
        self.insert(builder.build())
    }

    /// Add a module built elsewhere, for example from a JSON definition.
    pub fn insert(&mut self, module: IgnitionModule) -> Result<IgnitionModule> {
        let fingerprint = module_fingerprint(&module)?;
        if let Some((existing, cached)) = self.modules.get(&module.id) {
            if *existing != fingerprint {
                bail!(
                    "Module id {} is already used by a module with a different definition",
                    module.id
                );
            }
            return Ok(cached.clone());
        }
        self.modules
            .insert(module.id.clone(), (fingerprint, module.clone()));
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::FutureOptions;
    use serde_json::json;

    #[test]
    fn test_same_definition_is_shared() -> Result<()> {
        let mut cache = ModuleCache::new();
        let first = cache.build("Token", |m, _| {
            m.contract("Token", vec![], FutureOptions::default())?;
            Ok(())
        })?;
        let second = cache.build("Token", |m, _| {
            m.contract("Token", vec![], FutureOptions::default())?;
            Ok(())
        })?;
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        Ok(())
    }

    #[test]
    fn test_reused_id_with_different_definition_fails() -> Result<()> {
        let mut cache = ModuleCache::new();
        cache.build("Token", |m, _| {
            m.contract("Token", vec![json!(1).into()], FutureOptions::default())?;
            Ok(())
        })?;
        let err = cache
            .build("Token", |m, _| {
                m.contract("Token", vec![json!(2).into()], FutureOptions::default())?;
                Ok(())
            })
            .unwrap_err();
        assert!(err.to_string().contains("different definition"), "{err}");
        Ok(())
    }

    #[test]
    fn test_nested_build_through_cache() -> Result<()> {
        let mut cache = ModuleCache::new();
        let main = cache.build("Main", |m, cache| {
            let sub = cache.build("Sub", |s, _| {
                let t = s.contract("Token", vec![], FutureOptions::default())?;
                s.result("token", &t);
                Ok(())
            })?;
            let results = m.use_module(&sub)?;
            m.call(&results["token"], "init", vec![], FutureOptions::default())?;
            Ok(())
        })?;
        assert!(cache.get("Sub").is_some());
        assert_eq!(main.futures.len(), 2);
        Ok(())
    }
}
