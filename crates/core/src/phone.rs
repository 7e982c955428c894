//! Phone number normalization and profile identity.

use crate::error::{Error, Result};

const MIN_DIGITS: usize = 10;
const MAX_DIGITS: usize = 15;

/// Strips formatting and returns the bare digit string of a phone number.
///
/// Accepts the usual separators (`+`, spaces, dashes, dots, parentheses);
/// anything else is rejected rather than silently dropped.
pub fn normalize_phone(raw: &str) -> Result<String> {
	let trimmed = raw.trim();
	let mut digits = String::with_capacity(trimmed.len());
	for ch in trimmed.chars() {
		match ch {
			'0'..='9' => digits.push(ch),
			'+' | ' ' | '-' | '.' | '(' | ')' => {}
			_ => return Err(Error::InvalidPhone(raw.to_string())),
		}
	}

	if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
		return Err(Error::InvalidPhone(raw.to_string()));
	}
	Ok(digits)
}

/// Stable profile tag for `phone` within one deployed instance.
///
/// The tag names the browser profile directory, so two deployments sharing a
/// profiles root never reuse each other's sessions.
pub fn profile_tag(instance_id: &str, phone: &str) -> String {
	format!("{instance_id}_{phone}")
}
