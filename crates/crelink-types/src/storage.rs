//! Storage namespaces for persisted engine state.

use std::fmt;
use std::str::FromStr;

/// Namespaces under which persisted state is stored.
///
/// Keys are built as `<namespace>:<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Bridge transfers by id.
	BridgeTransactions,
	/// Bridge transfer ids by account address.
	BridgeAccounts,
	/// Optimization profiles by chain id.
	Optimization,
	/// RPC cache snapshots by chain id.
	RpcCache,
	/// Transactions submitted by the orchestrator, by hash.
	PendingTransactions,
}

impl StorageKey {
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::BridgeTransactions => "bridge_transactions",
			StorageKey::BridgeAccounts => "bridge_accounts",
			StorageKey::Optimization => "optimization",
			StorageKey::RpcCache => "rpc_cache",
			StorageKey::PendingTransactions => "pending_transactions",
		}
	}

	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::BridgeTransactions,
			Self::BridgeAccounts,
			Self::Optimization,
			Self::RpcCache,
			Self::PendingTransactions,
		]
		.into_iter()
	}
}

impl fmt::Display for StorageKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all().find(|key| key.as_str() == s).ok_or(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_namespace_round_trip() {
		for key in StorageKey::all() {
			assert_eq!(key.as_str().parse::<StorageKey>(), Ok(key));
		}
		assert!("orders".parse::<StorageKey>().is_err());
	}
}
