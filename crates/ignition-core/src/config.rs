//! Execution configuration.
//!
//! Values come from, in increasing precedence: compiled defaults, an optional
//! JSON config file, then `IGNITION_*` environment variables.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use ignition_transport::network::default_required_confirmations;
use ignition_types::env_utils::{env_var, prefixed};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionConfig {
    /// How often to poll for a new block while futures are pending.
    pub block_polling_interval_ms: u64,
    /// How long a transaction may stay unconfirmed before its fees are bumped.
    pub time_before_bumping_fees_ms: u64,
    /// Replacement transactions allowed per interaction before timing out.
    pub max_fee_bumps: u32,
    /// Fee multiplier applied on each bump, in percent.
    pub fee_bump_percent: u64,
    /// Blocks a receipt must be buried under. `None` picks by chain.
    pub required_confirmations: Option<u64>,
    pub disable_fee_bumping: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            block_polling_interval_ms: 200,
            time_before_bumping_fees_ms: 3 * 60 * 1000,
            max_fee_bumps: 4,
            fee_bump_percent: 110,
            required_confirmations: None,
            disable_fee_bumping: false,
        }
    }
}

impl ExecutionConfig {
    /// Load from a JSON file (if given) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str(&json)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_var(&prefixed("BLOCK_POLLING_INTERVAL_MS")) {
            self.block_polling_interval_ms = v;
        }
        if let Some(v) = env_var(&prefixed("TIME_BEFORE_BUMPING_FEES_MS")) {
            self.time_before_bumping_fees_ms = v;
        }
        if let Some(v) = env_var(&prefixed("MAX_FEE_BUMPS")) {
            self.max_fee_bumps = v;
        }
        if let Some(v) = env_var(&prefixed("FEE_BUMP_PERCENT")) {
            self.fee_bump_percent = v;
        }
        if let Some(v) = env_var(&prefixed("REQUIRED_CONFIRMATIONS")) {
            self.required_confirmations = Some(v);
        }
        if let Some(v) = env_var(&prefixed("DISABLE_FEE_BUMPING")) {
            self.disable_fee_bumping = v;
        }
        self
    }

    pub fn block_polling_interval(&self) -> Duration {
        Duration::from_millis(self.block_polling_interval_ms)
    }

    pub fn time_before_bumping_fees(&self) -> Duration {
        Duration::from_millis(self.time_before_bumping_fees_ms)
    }

    pub fn confirmations_for(&self, chain_id: u64) -> u64 {
        self.required_confirmations
            .unwrap_or_else(|| default_required_confirmations(chain_id))
            .max(1)
    }

    /// Bumps allowed, taking `disable_fee_bumping` into account.
    pub fn effective_max_fee_bumps(&self) -> usize {
        if self.disable_fee_bumping {
            0
        } else {
            self.max_fee_bumps as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ExecutionConfig::default();
        assert_eq!(config.block_polling_interval(), Duration::from_millis(200));
        assert_eq!(config.time_before_bumping_fees(), Duration::from_secs(180));
        assert_eq!(config.max_fee_bumps, 4);
        assert_eq!(config.confirmations_for(31337), 1);
        assert_eq!(config.confirmations_for(1), 5);
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("ignition.json");
        std::fs::write(&path, r#"{"maxFeeBumps": 2, "requiredConfirmations": 3}"#)?;
        let config = ExecutionConfig::load(Some(&path))?;
        assert_eq!(config.max_fee_bumps, 2);
        assert_eq!(config.confirmations_for(31337), 3);
        assert_eq!(config.fee_bump_percent, 110);
        Ok(())
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("IGNITION_FEE_BUMP_PERCENT", "125");
        let config = ExecutionConfig::default().with_env_overrides();
        assert_eq!(config.fee_bump_percent, 125);
        std::env::remove_var("IGNITION_FEE_BUMP_PERCENT");
    }

    #[test]
    fn test_disabled_bumping_allows_none() {
        let config = ExecutionConfig {
            disable_fee_bumping: true,
            ..Default::default()
        };
        assert_eq!(config.effective_max_fee_bumps(), 0);
    }
}
