//! Wallet engine for the CreLink chain engine.
//!
//! Wires the provider, gas, switch, transaction and bridge layers into one
//! [`WalletEngine`] and exposes it to the wallet's UI and message layer,
//! either through typed methods or through the serde-tagged
//! [`WalletRequest`] dispatcher.

pub mod builder;
pub mod engine;
pub mod handlers;
pub mod signer;

#[cfg(test)]
pub(crate) mod test_support;

pub use builder::{BuilderError, WalletBuilder};
pub use engine::tokens::TokenRegistry;
pub use engine::WalletEngine;
pub use handlers::{WalletRequest, WalletResponse};
pub use signer::WatchOnlySigner;

use crelink_bridge::BridgeError;
use crelink_delivery::TransactionError;
use crelink_gas::GasError;
use crelink_provider::ProviderError;
use crelink_storage::StorageError;
use crelink_types::ValidationError;
use thiserror::Error;

/// Errors surfaced by the wallet engine.
#[derive(Debug, Error)]
pub enum WalletError {
	#[error("Provider error: {0}")]
	Provider(#[from] ProviderError),
	#[error("Gas error: {0}")]
	Gas(#[from] GasError),
	#[error("Transaction error: {0}")]
	Transaction(#[from] TransactionError),
	#[error("Bridge error: {0}")]
	Bridge(#[from] BridgeError),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	#[error("Validation error: {0}")]
	Validation(#[from] ValidationError),
	#[error("Chain {0} is not supported")]
	UnsupportedChain(u64),
	/// A switch was attempted and refused.
	#[error("Switch to chain {chain_id} failed: {reason}")]
	SwitchFailed { chain_id: u64, reason: String },
	#[error("Serialization error: {0}")]
	Serialization(String),
}

impl From<serde_json::Error> for WalletError {
	fn from(err: serde_json::Error) -> Self {
		WalletError::Serialization(err.to_string())
	}
}
