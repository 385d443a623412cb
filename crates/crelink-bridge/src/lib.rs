//! Bridge module for the CreLink chain engine.
//!
//! Cross-chain transfers are handled by bridge providers, each serving a
//! set of chain pairs. The [`BridgeOrchestrator`] picks the provider for a
//! pair, gates token transfers on ERC-20 allowance, records every transfer
//! and follows it through the status state machine until it completes,
//! fails or is cancelled.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use crelink_delivery::{TransactionError, TransactionOrchestrator};
use crelink_gas::{GasError, GasPolicyEngine};
use crelink_provider::{ProviderError, ProviderFactory};
use crelink_storage::StorageError;
use crelink_types::{
	BridgeAsset, BridgeQuote, BridgeRequest, BridgeStatus, BridgeStatusUpdate, BridgeTransaction,
	BridgeTransfer, ChainPair, ConfigSchema, ImplementationRegistry, ValidationError,
};
use std::sync::Arc;
use thiserror::Error;

pub mod common;
pub mod orchestrator;
pub mod state;

pub mod implementations {
	pub mod arbitrum;
	pub mod lock_mint;
}

#[cfg(test)]
pub(crate) mod test_support;

pub use orchestrator::BridgeOrchestrator;
pub use state::can_transition;

/// Errors that can occur during bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
	#[error("Provider error: {0}")]
	Provider(#[from] ProviderError),
	#[error("Transaction error: {0}")]
	Transaction(#[from] TransactionError),
	#[error("Gas error: {0}")]
	Gas(#[from] GasError),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	#[error("Validation error: {0}")]
	Validation(#[from] ValidationError),
	#[error("Chain pair {0} is not supported")]
	UnsupportedChainPair(ChainPair),
	#[error("Token {token} is not supported on {pair}")]
	UnsupportedToken { token: Address, pair: ChainPair },
	/// The sender must approve `spender` for at least `required` first.
	#[error("Insufficient allowance for {spender}: {current} < {required}")]
	InsufficientAllowance {
		spender: Address,
		required: U256,
		current: U256,
	},
	#[error("Amount out of range: {0}")]
	AmountOutOfRange(String),
	#[error("Bridge transaction {0} not found")]
	NotFound(String),
	#[error("Cannot {action} bridge transaction {id} in status {status}")]
	InvalidState {
		id: String,
		status: BridgeStatus,
		action: &'static str,
	},
	#[error("Bridge transaction {0} expired before submission")]
	Expired(String),
	#[error("Relayer error: {0}")]
	Relayer(String),
	/// A source-chain receipt is missing, reverted or lacks the expected event.
	#[error("Receipt error: {0}")]
	Receipt(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
	#[error("{0} is not supported")]
	NotSupported(String),
}

/// Shared services bridge providers are built from.
#[derive(Clone)]
pub struct BridgeContext {
	pub providers: Arc<ProviderFactory>,
	pub gas: Arc<GasPolicyEngine>,
	pub transactions: Arc<TransactionOrchestrator>,
}

/// A bridge serving one or more ordered chain pairs.
///
/// Providers submit source-chain transactions through the transaction
/// orchestrator and never sign anything themselves.
#[async_trait]
pub trait BridgeProvider: Send + Sync {
	/// Name used in configuration and stored on every transfer.
	fn name(&self) -> &str;

	fn supported_pairs(&self) -> &[ChainPair];

	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	fn supports(&self, pair: ChainPair) -> bool {
		self.supported_pairs().contains(&pair)
	}

	async fn get_supported_assets(&self, pair: ChainPair) -> Result<Vec<BridgeAsset>, BridgeError>;

	/// Contract the sender must approve before moving `token`, or `None`
	/// when the transfer needs no approval.
	async fn spender(&self, pair: ChainPair, token: Address) -> Result<Option<Address>, BridgeError>;

	/// Balance of `owner` in `token`; `Address::ZERO` is the native currency.
	async fn get_token_balance(
		&self,
		chain_id: u64,
		token: Address,
		owner: Address,
	) -> Result<U256, BridgeError>;

	/// Allowance `owner` granted to this bridge on the source chain.
	async fn get_allowance(
		&self,
		pair: ChainPair,
		token: Address,
		owner: Address,
	) -> Result<U256, BridgeError>;

	/// Approves the bridge to move `amount` of `token`; returns the approval
	/// transaction hash.
	async fn approve_token(
		&self,
		pair: ChainPair,
		token: Address,
		owner: Address,
		amount: U256,
	) -> Result<B256, BridgeError>;

	async fn estimate_bridge_fee(&self, request: &BridgeRequest) -> Result<BridgeQuote, BridgeError>;

	/// Builds the local record for a transfer. Nothing is sent yet.
	async fn create_transaction(&self, request: &BridgeRequest) -> Result<BridgeTransaction, BridgeError>;

	/// Submits the source-chain leg.
	///
	/// The returned transfer id comes from the bridge's own event and
	/// differs from the transaction hash.
	async fn bridge_asset(&self, tx: &BridgeTransaction) -> Result<BridgeTransfer, BridgeError>;

	async fn get_transaction_status(
		&self,
		tx: &BridgeTransaction,
	) -> Result<BridgeStatusUpdate, BridgeError>;

	/// Transfers the bridge itself knows about for `account`.
	async fn get_transaction_history(
		&self,
		_account: Address,
	) -> Result<Vec<BridgeTransaction>, BridgeError> {
		Ok(Vec::new())
	}

	/// Asks the off-chain relayer to complete the destination leg.
	async fn request_relay(&self, _tx: &BridgeTransaction) -> Result<(), BridgeError> {
		Ok(())
	}

	/// Claims a withdrawal on the destination chain once it is claimable.
	async fn execute_withdrawal(&self, _tx: &BridgeTransaction) -> Result<B256, BridgeError> {
		Err(BridgeError::NotSupported(format!(
			"Withdrawal execution on {}",
			self.name()
		)))
	}
}

/// Factory signature every bridge implementation provides.
pub type BridgeFactory =
	fn(&toml::Value, &BridgeContext) -> Result<Box<dyn BridgeProvider>, BridgeError>;

/// Registry trait for bridge implementations.
pub trait BridgeRegistry: ImplementationRegistry<Factory = BridgeFactory> {}

/// All bridge implementations as (name, factory) pairs.
pub fn get_all_implementations() -> Vec<(&'static str, BridgeFactory)> {
	use implementations::{arbitrum, lock_mint};

	vec![
		(arbitrum::Registry::NAME, arbitrum::Registry::factory()),
		(lock_mint::Registry::NAME, lock_mint::Registry::factory()),
	]
}

/// Configuration schema of a bridge implementation, by name.
pub fn config_schema(name: &str) -> Option<Box<dyn ConfigSchema>> {
	use implementations::{arbitrum, lock_mint};

	match name {
		arbitrum::Registry::NAME => Some(Box::new(arbitrum::ArbitrumSchema)),
		lock_mint::Registry::NAME => Some(Box::new(lock_mint::LockMintSchema)),
		_ => None,
	}
}
