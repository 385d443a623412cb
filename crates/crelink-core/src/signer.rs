//! Signer used when no wallet controller is attached.

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use crelink_delivery::{SignerError, SignerInterface};
use crelink_types::Transaction;
use serde_json::Value;

/// Knows the selected account but cannot sign.
///
/// Read-only front-ends such as the CLI use it so that queries needing a
/// sender address work while every signature request fails with
/// [`SignerError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct WatchOnlySigner {
	account: Option<Address>,
}

impl WatchOnlySigner {
	pub fn new(account: Option<Address>) -> Self {
		Self { account }
	}
}

#[async_trait]
impl SignerInterface for WatchOnlySigner {
	async fn address(&self) -> Result<Address, SignerError> {
		self.account.ok_or(SignerError::Unavailable)
	}

	async fn sign_transaction(&self, _tx: &Transaction) -> Result<Bytes, SignerError> {
		Err(SignerError::Unavailable)
	}

	async fn sign_message(&self, _message: &[u8]) -> Result<Bytes, SignerError> {
		Err(SignerError::Unavailable)
	}

	async fn sign_typed_data(&self, _typed_data: &Value) -> Result<Bytes, SignerError> {
		Err(SignerError::Unavailable)
	}
}
