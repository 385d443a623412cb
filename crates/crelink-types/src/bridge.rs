//! Bridge transfer types.
//!
//! A [`BridgeTransaction`] is created by the bridge orchestrator when a
//! transfer is requested and advances through [`BridgeStatus`] as the
//! source leg is submitted, relayed and finalized on the destination chain.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a cross-chain transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BridgeStatus {
	/// Recorded locally, source transaction not yet sent.
	Created,
	/// Source-chain transaction broadcast.
	Submitted,
	/// Source leg confirmed, waiting for the destination leg.
	Relaying,
	/// Withdrawal proven; the user must execute the claim.
	Claimable,
	Completed,
	Failed,
	Cancelled,
}

impl BridgeStatus {
	/// Terminal statuses never change again.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			BridgeStatus::Completed | BridgeStatus::Failed | BridgeStatus::Cancelled
		)
	}
}

impl fmt::Display for BridgeStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			BridgeStatus::Created => "created",
			BridgeStatus::Submitted => "submitted",
			BridgeStatus::Relaying => "relaying",
			BridgeStatus::Claimable => "claimable",
			BridgeStatus::Completed => "completed",
			BridgeStatus::Failed => "failed",
			BridgeStatus::Cancelled => "cancelled",
		};
		f.write_str(name)
	}
}

/// Status codes for long-running withdrawals such as a rollup challenge
/// period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WithdrawalStatus {
	NotFound,
	Pending,
	Claimable,
	Completed,
	Failed,
}

impl From<WithdrawalStatus> for BridgeStatus {
	fn from(status: WithdrawalStatus) -> Self {
		match status {
			WithdrawalStatus::NotFound => BridgeStatus::Submitted,
			WithdrawalStatus::Pending => BridgeStatus::Relaying,
			WithdrawalStatus::Claimable => BridgeStatus::Claimable,
			WithdrawalStatus::Completed => BridgeStatus::Completed,
			WithdrawalStatus::Failed => BridgeStatus::Failed,
		}
	}
}

/// A cross-chain transfer tracked by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeTransaction {
	pub id: String,
	/// Name of the bridge provider that owns this transfer.
	pub provider: String,
	pub source_chain_id: u64,
	pub target_chain_id: u64,
	/// `Address::ZERO` denotes the native currency.
	pub source_token: Address,
	pub target_token: Address,
	pub sender: Address,
	pub recipient: Address,
	pub amount: U256,
	pub status: BridgeStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source_tx_hash: Option<B256>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub target_tx_hash: Option<B256>,
	/// Provider-specific transfer id taken from the source-chain event.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transfer_id: Option<String>,
	pub fee: U256,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	pub created_at: u64,
	pub updated_at: u64,
	pub expires_at: u64,
}

impl BridgeTransaction {
	pub fn chain_pair(&self) -> ChainPair {
		ChainPair::new(self.source_chain_id, self.target_chain_id)
	}

	pub fn is_native(&self) -> bool {
		self.source_token == Address::ZERO
	}

	/// Whether an unsubmitted transfer outlived its expiry.
	pub fn is_expired(&self, now: u64) -> bool {
		self.status == BridgeStatus::Created && now >= self.expires_at
	}
}

/// Ordered pair of chains a bridge provider serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainPair {
	pub source: u64,
	pub target: u64,
}

impl ChainPair {
	pub fn new(source: u64, target: u64) -> Self {
		Self { source, target }
	}

	pub fn reversed(&self) -> Self {
		Self::new(self.target, self.source)
	}
}

impl fmt::Display for ChainPair {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}-{}", self.source, self.target)
	}
}

/// A transfer request coming from the wallet surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRequest {
	pub source_chain_id: u64,
	pub target_chain_id: u64,
	/// `Address::ZERO` for the native currency.
	pub token: Address,
	pub amount: U256,
	pub sender: Address,
	/// Defaults to the sender.
	#[serde(default)]
	pub recipient: Option<Address>,
}

impl BridgeRequest {
	pub fn chain_pair(&self) -> ChainPair {
		ChainPair::new(self.source_chain_id, self.target_chain_id)
	}

	pub fn is_native(&self) -> bool {
		self.token == Address::ZERO
	}

	pub fn recipient(&self) -> Address {
		self.recipient.unwrap_or(self.sender)
	}
}

/// A token a bridge provider can move between its chain pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeAsset {
	pub symbol: String,
	pub decimals: u8,
	pub source_token: Address,
	pub target_token: Address,
	#[serde(default)]
	pub min_amount: U256,
	#[serde(default)]
	pub max_amount: Option<U256>,
}

impl BridgeAsset {
	pub fn is_native(&self) -> bool {
		self.source_token == Address::ZERO
	}
}

/// Fee quote from one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeQuote {
	pub provider: String,
	pub chain_pair: ChainPair,
	pub token: Address,
	pub amount: U256,
	/// Fee charged by the bridge, in source token units.
	pub bridge_fee: U256,
	/// Estimated source-chain gas cost, in native wei.
	pub gas_fee: U256,
	/// Expected time until completion.
	pub estimated_seconds: u64,
}

impl BridgeQuote {
	pub fn total_fee(&self) -> U256 {
		self.bridge_fee + self.gas_fee
	}
}

/// Result of submitting the source leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeTransfer {
	/// Provider-specific transfer id; differs from the tx hash.
	pub transfer_id: String,
	pub source_tx_hash: B256,
}

/// Live status reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStatusUpdate {
	pub status: BridgeStatus,
	#[serde(default)]
	pub target_tx_hash: Option<B256>,
	#[serde(default)]
	pub error: Option<String>,
}

impl BridgeStatusUpdate {
	pub fn status(status: BridgeStatus) -> Self {
		Self {
			status,
			target_tx_hash: None,
			error: None,
		}
	}
}
