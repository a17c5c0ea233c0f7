//! Address normalization utilities.
//!
//! This module is the canonical source for address normalization in the workspace.
//! Other crates should import from here rather than defining their own logic.
//!
//! EVM addresses are 20-byte values, but they arrive in different formats:
//! - Checksummed: "0xAbC0000000000000000000000000000000000001"
//! - Lowercase: "0xabc0000000000000000000000000000000000001"
//! - Without prefix or zero padding: "abc"
//!
//! Journals and reconciliation messages always use the lowercase full form.

use ethers_core::types::Address;

/// The zero address, used as the `to` of nothing and never as a valid sender.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Normalize an address to lowercase with 0x prefix and full 40 hex characters.
///
/// # Examples
///
/// ```
/// use ignition_types::address::normalize_address;
///
/// assert_eq!(
///     normalize_address("0xABC"),
///     "0x0000000000000000000000000000000000000abc"
/// );
/// ```
pub fn normalize_address(addr: &str) -> String {
    let addr = addr.trim();
    let hex = addr
        .strip_prefix("0x")
        .or_else(|| addr.strip_prefix("0X"))
        .unwrap_or(addr)
        .to_lowercase();
    if hex.len() < 40 {
        format!("0x{:0>40}", hex)
    } else {
        format!("0x{}", &hex[..40])
    }
}

/// Parse a string into an [`Address`], returning None if it is not valid hex.
///
/// Unlike [`normalize_address`] this rejects inputs longer than 20 bytes
/// instead of truncating them.
pub fn parse_address(addr: &str) -> Option<Address> {
    let trimmed = addr.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if hex.is_empty() || hex.len() > 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    normalize_address(hex).parse::<Address>().ok()
}

/// Returns true if the string is a full-length (40 hex digit) address.
pub fn is_address(addr: &str) -> bool {
    let trimmed = addr.trim();
    let hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// Convert an [`Address`] to its normalized full-form string.
///
/// `Address`'s `Display` impl abbreviates the middle of the address, so this
/// is the form to use in journals, error messages and comparisons.
pub fn address_to_string(addr: &Address) -> String {
    format!("{:#x}", addr)
}

/// Case-insensitive address equality on string forms.
pub fn same_address(a: &str, b: &str) -> bool {
    normalize_address(a) == normalize_address(b)
}
