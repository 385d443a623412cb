//! Chain switch context and audit records.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a logical wallet session, such as one connected dApp tab.
///
/// Each session carries its own selected chain. The default session stands
/// for the wallet-wide selection shown in the UI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
	pub const DEFAULT: &'static str = "default";

	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn is_default(&self) -> bool {
		self.0 == Self::DEFAULT
	}
}

impl Default for SessionId {
	fn default() -> Self {
		Self(Self::DEFAULT.to_string())
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for SessionId {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

/// Context accompanying a switch request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSwitchContext {
	#[serde(default)]
	pub session: SessionId,
	/// dApp origin that triggered the switch; remembered for detection.
	#[serde(default)]
	pub origin: Option<String>,
	/// Contract the pending transaction targets; remembered for detection.
	#[serde(default)]
	pub contract_address: Option<Address>,
	#[serde(default)]
	pub dapp_initiated: bool,
}

impl ChainSwitchContext {
	pub fn for_session(session: SessionId) -> Self {
		Self {
			session,
			..Default::default()
		}
	}

	pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
		self.origin = Some(origin.into());
		self
	}

	pub fn with_contract(mut self, contract: Address) -> Self {
		self.contract_address = Some(contract);
		self
	}

	pub fn dapp_initiated(mut self, initiated: bool) -> Self {
		self.dapp_initiated = initiated;
		self
	}
}

/// Outcome of one switch attempt. Appended to history, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSwitchResult {
	pub session: SessionId,
	pub previous_chain_id: u64,
	/// Requested target chain.
	pub chain_id: u64,
	pub success: bool,
	#[serde(default)]
	pub error: Option<String>,
	pub timestamp: u64,
	pub dapp_initiated: bool,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_session() {
		let session = SessionId::default();
		assert!(session.is_default());
		assert_eq!(session.to_string(), "default");
		assert!(!SessionId::from("tab-1").is_default());
	}

	#[test]
	fn test_context_builder() {
		let contract = Address::repeat_byte(9);
		let ctx = ChainSwitchContext::for_session("tab-1".into())
			.with_origin("https://app.example")
			.with_contract(contract)
			.dapp_initiated(true);
		assert_eq!(ctx.origin.as_deref(), Some("https://app.example"));
		assert_eq!(ctx.contract_address, Some(contract));
		assert!(ctx.dapp_initiated);
	}
}
