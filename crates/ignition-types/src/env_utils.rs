//! Environment variable parsing.
//!
//! Every tunable in the workspace reads through these helpers so that a
//! malformed value falls back to the compiled default instead of aborting a
//! deployment halfway through.
//!
//! ```
//! use ignition_types::env_utils::{env_duration_ms, env_var_or};
//! use std::time::Duration;
//!
//! let bumps: u32 = env_var_or("IGNITION_DOC_MAX_FEE_BUMPS", 4);
//! let poll = env_duration_ms("IGNITION_DOC_POLL_MS", Duration::from_millis(200));
//! assert_eq!(bumps, 4);
//! assert_eq!(poll, Duration::from_millis(200));
//! ```

use std::str::FromStr;
use std::time::Duration;

/// Prefix shared by every variable the deployment engine reads.
pub const ENV_PREFIX: &str = "IGNITION_";

/// Parse an environment variable, returning `None` when unset, empty or unparsable.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
}

/// Parse an environment variable, falling back to `default`.
pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// `true` when the variable is set to 1/true/yes/on (case-insensitive).
pub fn env_bool(key: &str) -> bool {
    env_bool_or(key, false)
}

/// Like [`env_bool`], but an unset variable yields `default`.
pub fn env_bool_or(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => is_truthy(&v),
        Err(_) => default,
    }
}

/// Read a string variable, falling back to `default`.
pub fn env_string_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Comma-separated list; blank entries are dropped.
pub fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Milliseconds variable as a [`Duration`].
pub fn env_duration_ms(key: &str, default: Duration) -> Duration {
    env_var::<u64>(key)
        .map(Duration::from_millis)
        .unwrap_or(default)
}

/// Seconds variable as a [`Duration`].
pub fn env_duration_secs(key: &str, default: Duration) -> Duration {
    env_var::<u64>(key)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

/// Prepend [`ENV_PREFIX`] to a bare name (`"RPC_URL"` -> `"IGNITION_RPC_URL"`).
pub fn prefixed(name: &str) -> String {
    format!("{}{}", ENV_PREFIX, name)
}
