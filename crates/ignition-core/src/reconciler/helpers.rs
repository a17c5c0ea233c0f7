use std::collections::BTreeMap;
use std::fmt::Display;

use ethers_core::types::Address;
use ignition_types::address::address_to_string;
use ignition_types::encoding::canonical_json;
use serde_json::Value;

use crate::errors::IgnitionError;

/// Outcome of a single field comparison: `Err` holds the failure message.
pub(super) type FieldCheck = Result<(), String>;

pub(super) fn compare<T: PartialEq + Display>(field: &str, stored: &T, current: &T) -> FieldCheck {
    if stored == current {
        Ok(())
    } else {
        Err(format!("{} has been changed from {} to {}", field, stored, current))
    }
}

pub(super) fn compare_address(field: &str, stored: &Address, current: &Address) -> FieldCheck {
    if stored == current {
        Ok(())
    } else {
        Err(format!(
            "{} has been changed from {} to {}",
            field,
            address_to_string(stored),
            address_to_string(current)
        ))
    }
}

/// Arguments compare in canonical form: `3` and `"3"` are the same argument.
pub(super) fn compare_arguments(stored: &[Value], current: &[Value]) -> FieldCheck {
    if stored.len() != current.len() {
        return Err(format!(
            "Argument count has been changed from {} to {}",
            stored.len(),
            current.len()
        ));
    }
    for (index, (old, new)) in stored.iter().zip(current).enumerate() {
        if canonical_json(old) != canonical_json(new) {
            return Err(format!(
                "Argument at index {} has been changed from {} to {}",
                index, old, new
            ));
        }
    }
    Ok(())
}

pub(super) fn compare_libraries(
    stored: &BTreeMap<String, Address>,
    current: &BTreeMap<String, Address>,
) -> FieldCheck {
    for (name, address) in current {
        match stored.get(name) {
            None => return Err(format!("Library {} has been added", name)),
            Some(old) => compare_address(&format!("Library {}'s address", name), old, address)?,
        }
    }
    if let Some(name) = stored.keys().find(|name| !current.contains_key(*name)) {
        return Err(format!("Library {} has been removed", name));
    }
    Ok(())
}

/// Resolution failures while reconciling are reported against the field.
pub(super) fn resolved<T>(field: &str, result: Result<T, IgnitionError>) -> Result<T, String> {
    result.map_err(|e| format!("{} could not be resolved: {}", field, e))
}
