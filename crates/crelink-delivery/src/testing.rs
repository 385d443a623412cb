//! In-process signer for tests.
//!
//! Signed output is deterministic: the "raw transaction" is the JSON
//! encoding of the transaction, so distinct transactions hash differently.

use crate::{SignerError, SignerInterface};
use alloy_primitives::{keccak256, Address, Bytes};
use async_trait::async_trait;
use crelink_types::Transaction;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub struct MockSigner {
	address: Address,
	reject: AtomicBool,
	signed: AtomicUsize,
}

impl MockSigner {
	pub fn new(address: Address) -> Self {
		Self {
			address,
			reject: AtomicBool::new(false),
			signed: AtomicUsize::new(0),
		}
	}

	/// Makes every following request fail as if the user declined it.
	pub fn set_reject(&self, reject: bool) {
		self.reject.store(reject, Ordering::SeqCst);
	}

	/// Number of transactions signed so far.
	pub fn signed(&self) -> usize {
		self.signed.load(Ordering::SeqCst)
	}

	fn check(&self) -> Result<(), SignerError> {
		if self.reject.load(Ordering::SeqCst) {
			return Err(SignerError::Rejected("user denied signature".into()));
		}
		Ok(())
	}

	fn signature(&self, digest: &[u8]) -> Bytes {
		let mut out = Vec::with_capacity(65);
		out.extend_from_slice(keccak256(digest).as_slice());
		out.extend_from_slice(keccak256(self.address.as_slice()).as_slice());
		out.push(27);
		out.into()
	}
}

#[async_trait]
impl SignerInterface for MockSigner {
	async fn address(&self) -> Result<Address, SignerError> {
		Ok(self.address)
	}

	async fn sign_transaction(&self, tx: &Transaction) -> Result<Bytes, SignerError> {
		self.check()?;
		let raw = serde_json::to_vec(tx).map_err(|e| SignerError::SigningFailed(e.to_string()))?;
		self.signed.fetch_add(1, Ordering::SeqCst);
		Ok(raw.into())
	}

	async fn sign_message(&self, message: &[u8]) -> Result<Bytes, SignerError> {
		self.check()?;
		Ok(self.signature(message))
	}

	async fn sign_typed_data(&self, typed_data: &Value) -> Result<Bytes, SignerError> {
		self.check()?;
		let encoded =
			serde_json::to_vec(typed_data).map_err(|e| SignerError::SigningFailed(e.to_string()))?;
		Ok(self.signature(&encoded))
	}
}
