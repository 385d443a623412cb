//! Transaction delivery module for the CreLink chain engine.
//!
//! The engine never holds private keys. Transactions are assembled here,
//! handed to an external [`SignerInterface`] for signing, broadcast through
//! the chain's provider and then tracked until they are mined, replaced or
//! time out.

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use crelink_gas::GasError;
use crelink_provider::ProviderError;
use crelink_types::{Transaction, TransactionStatus};
use serde_json::Value;
use thiserror::Error;

pub mod builder;
pub mod orchestrator;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use builder::TransactionBuilder;
pub use orchestrator::TransactionOrchestrator;

/// Errors reported by the external signer.
#[derive(Debug, Error)]
pub enum SignerError {
	/// The user declined the signature request.
	#[error("Signature rejected: {0}")]
	Rejected(String),
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// No account is unlocked or selected.
	#[error("Signer unavailable")]
	Unavailable,
}

/// Errors that can occur while building, sending or replacing transactions.
#[derive(Debug, Error)]
pub enum TransactionError {
	#[error("Provider error: {0}")]
	Provider(#[from] ProviderError),
	#[error("Gas error: {0}")]
	Gas(#[from] GasError),
	#[error("Signer error: {0}")]
	Signer(#[from] SignerError),
	/// The transaction cannot be assembled from the given fields.
	#[error("Invalid transaction: {0}")]
	Invalid(String),
	#[error("Transaction {0} not found")]
	NotFound(B256),
	/// Only pending transactions can be sped up or cancelled.
	#[error("Transaction {hash} is {status:?} and cannot be replaced")]
	NotReplaceable {
		hash: B256,
		status: TransactionStatus,
	},
}

/// The signing capability of the wallet controller.
///
/// Implementations prompt the user or talk to a keyring; the engine only
/// sees signed output.
#[async_trait]
pub trait SignerInterface: Send + Sync {
	/// The selected account.
	async fn address(&self) -> Result<Address, SignerError>;

	/// Signs `tx` and returns the RLP-encoded signed envelope.
	async fn sign_transaction(&self, tx: &Transaction) -> Result<Bytes, SignerError>;

	/// EIP-191 personal signature over `message`.
	async fn sign_message(&self, message: &[u8]) -> Result<Bytes, SignerError>;

	/// EIP-712 signature over a typed-data document.
	async fn sign_typed_data(&self, typed_data: &Value) -> Result<Bytes, SignerError>;
}
