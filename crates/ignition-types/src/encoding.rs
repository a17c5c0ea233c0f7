//! Encoding utilities for hex and JSON numbers.
//!
//! Provides shared encoding/decoding functions used across workspace crates.
//! These eliminate repetitive error handling patterns.

use anyhow::{anyhow, Result};
use ethers_core::types::U256;
use serde_json::Value;

// =============================================================================
// Hex Parsing
// =============================================================================

/// Strip a leading `0x`/`0X` if present.
pub fn strip_0x(hex_str: &str) -> &str {
    hex_str
        .strip_prefix("0x")
        .or_else(|| hex_str.strip_prefix("0X"))
        .unwrap_or(hex_str)
}

/// Parse a hex string to raw bytes.
///
/// # Arguments
/// * `hex_str` - Hex string (with or without 0x prefix)
/// * `context` - Description for error messages (e.g., "bytecode", "calldata")
pub fn parse_hex_bytes(hex_str: &str, context: &str) -> Result<Vec<u8>> {
    let hex_str = strip_0x(hex_str.trim());
    hex::decode(hex_str).map_err(|e| anyhow!("Invalid {} hex '{}': {}", context, hex_str, e))
}

/// Encode bytes as a `0x`-prefixed lowercase hex string.
pub fn hex_encode(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse a JSON-RPC quantity (`"0x1a"`) into a u64.
pub fn parse_quantity_u64(value: &str, context: &str) -> Result<u64> {
    u64::from_str_radix(strip_0x(value), 16)
        .map_err(|e| anyhow!("Invalid {} quantity '{}': {}", context, value, e))
}

/// Parse a JSON-RPC quantity (`"0x1a"`) into a U256.
pub fn parse_quantity_u256(value: &str, context: &str) -> Result<U256> {
    U256::from_str_radix(strip_0x(value), 16)
        .map_err(|e| anyhow!("Invalid {} quantity '{}': {}", context, value, e))
}

/// Format a u64 as a JSON-RPC quantity.
pub fn to_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

/// Format a U256 as a JSON-RPC quantity.
pub fn u256_to_quantity(value: U256) -> String {
    format!("0x{:x}", value)
}

// =============================================================================
// JSON Numbers
// =============================================================================

/// Interpret a JSON value as an unsigned 256-bit integer.
///
/// Accepts non-negative integers, decimal strings and `0x` hex strings.
pub fn json_to_u256(value: &Value) -> Option<U256> {
    match value {
        Value::Number(n) => n.as_u64().map(U256::from),
        Value::String(s) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix("0x") {
                U256::from_str_radix(hex, 16).ok()
            } else if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
                U256::from_dec_str(s).ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Represent a U256 as JSON: a number when it fits in u64, a decimal string otherwise.
pub fn u256_to_json(value: U256) -> Value {
    if value <= U256::from(u64::MAX) {
        Value::from(value.as_u64())
    } else {
        Value::String(value.to_string())
    }
}

/// Canonical form of a JSON value for equality checks.
///
/// Integer-valued numbers and integer strings collapse to one representation,
/// and hex strings are lowercased, so `3`, `"3"` and `"0x3"` compare equal.
pub fn canonical_json(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(canonical_json).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonical_json(v)))
                .collect(),
        ),
        Value::Number(_) | Value::String(_) => match json_to_u256(value) {
            Some(n) => Value::String(n.to_string()),
            None => match value {
                Value::String(s) if s.starts_with("0x") => Value::String(s.to_lowercase()),
                other => other.clone(),
            },
        },
        other => other.clone(),
    }
}
