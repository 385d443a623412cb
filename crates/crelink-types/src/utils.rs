//! Formatting and parsing helpers.
//!
//! Hex prefix management, id truncation for logs, unit conversion between
//! human-readable token amounts and base units, and strict address parsing.

use crate::validation::ValidationError;
use alloy_primitives::{Address, U256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Truncates a hex string or id for display purposes.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
/// Counts characters, not bytes, so arbitrary user ids are safe.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((end, _)) => format!("{}..", &id[..end]),
		None => id.to_string(),
	}
}

/// Adds "0x" prefix to a hex string if it doesn't already have one.
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.to_lowercase().starts_with("0x") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}

/// Removes "0x" or "0X" prefix from a hex string if present.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

/// Current unix time in seconds.
pub fn current_timestamp() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}

/// Parses a 20-byte hex address, accepting any letter case.
pub fn parse_address(value: &str) -> Result<Address, ValidationError> {
	let digits = without_0x_prefix(value.trim());
	if digits.len() != 40 {
		return Err(ValidationError::InvalidAddress(value.to_string()));
	}
	let bytes = hex::decode(digits).map_err(|_| ValidationError::InvalidAddress(value.to_string()))?;
	Ok(Address::from_slice(&bytes))
}

/// Formats a base-unit amount with `decimals` places, trimming trailing zeros.
///
/// `format_units(1_500_000_000_000_000_000, 18)` yields `"1.5"`.
pub fn format_units(amount: U256, decimals: u8) -> String {
	let raw = amount.to_string();
	if decimals == 0 {
		return raw;
	}
	let places = decimals as usize;
	let padded = format!("{:0>width$}", raw, width = places + 1);
	let (integer, fraction) = padded.split_at(padded.len() - places);
	let fraction = fraction.trim_end_matches('0');
	if fraction.is_empty() {
		format!("{}.0", integer)
	} else {
		format!("{}.{}", integer, fraction)
	}
}

/// Parses a human-readable decimal amount into base units.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256, ValidationError> {
	let amount = amount.trim();
	let invalid = || ValidationError::InvalidAmount(amount.to_string());
	if !amount.chars().any(|c| c.is_ascii_digit()) || amount.starts_with('-') {
		return Err(invalid());
	}

	let (integer, fraction) = match amount.split_once('.') {
		Some((i, f)) => (i, f),
		None => (amount, ""),
	};
	if fraction.len() > decimals as usize {
		return Err(ValidationError::InvalidAmount(format!(
			"{} has more than {} decimal places",
			amount, decimals
		)));
	}
	if !integer.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
		return Err(invalid());
	}

	let digits = format!(
		"{}{:0<width$}",
		if integer.is_empty() { "0" } else { integer },
		fraction,
		width = decimals as usize
	);
	U256::from_str_radix(&digits, 10).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_prefix_helpers() {
		assert_eq!(with_0x_prefix("abc"), "0xabc");
		assert_eq!(with_0x_prefix("0xabc"), "0xabc");
		assert_eq!(without_0x_prefix("0Xabc"), "abc");
		assert_eq!(without_0x_prefix("abc"), "abc");
	}

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("short"), "short");
		assert_eq!(truncate_id("0x1234567890"), "0x123456..");
		assert_eq!(truncate_id("12345678"), "12345678");
	}

	#[test]
	fn test_truncate_id_multibyte() {
		assert_eq!(truncate_id("aéééé"), "aéééé");
		assert_eq!(truncate_id("aéééééééé"), "aééééééé..");
		assert_eq!(truncate_id("🦀🦀🦀🦀🦀🦀🦀🦀🦀"), "🦀🦀🦀🦀🦀🦀🦀🦀..");
	}

	#[test]
	fn test_parse_address() {
		let addr = parse_address("0x5fbdb2315678afecb367f032d93f642f64180aa3").unwrap();
		assert_eq!(
			format!("{:?}", addr).to_lowercase(),
			"0x5fbdb2315678afecb367f032d93f642f64180aa3"
		);
		assert!(parse_address("0x1234").is_err());
		assert!(parse_address("0xzzzzb2315678afecb367f032d93f642f64180aa3").is_err());
	}

	#[test]
	fn test_format_units() {
		let one_and_half = U256::from(1_500_000_000_000_000_000u128);
		assert_eq!(format_units(one_and_half, 18), "1.5");
		assert_eq!(format_units(U256::from(1u64), 6), "0.000001");
		assert_eq!(format_units(U256::from(2_000_000u64), 6), "2.0");
		assert_eq!(format_units(U256::from(42u64), 0), "42");
	}

	#[test]
	fn test_parse_units() {
		assert_eq!(
			parse_units("1.5", 18).unwrap(),
			U256::from(1_500_000_000_000_000_000u128)
		);
		assert_eq!(parse_units(".25", 2).unwrap(), U256::from(25u64));
		assert_eq!(parse_units("3", 6).unwrap(), U256::from(3_000_000u64));
		assert!(parse_units("1.1234567", 6).is_err());
		assert!(parse_units("-1", 6).is_err());
		assert!(parse_units("abc", 6).is_err());
	}

	#[test]
	fn test_parse_units_requires_digits() {
		assert!(parse_units(".", 6).is_err());
		assert!(parse_units("", 6).is_err());
		assert!(parse_units("  ", 6).is_err());
		assert_eq!(parse_units("0.", 6).unwrap(), U256::ZERO);
		assert_eq!(parse_units("5.", 0).unwrap(), U256::from(5u64));
	}
}
