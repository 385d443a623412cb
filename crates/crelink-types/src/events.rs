//! Event types for inter-component communication.
//!
//! Each component publishes its own event enum on a typed
//! [`EventBus`](crate::EventBus). Observers subscribe to the bus of the
//! component they care about and filter by variant.

use crate::bridge::BridgeStatus;
use crate::rpc::{RpcBlock, TransactionReceipt};
use crate::switch::{ChainSwitchResult, SessionId};
use crate::transaction::TransactionStatus;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Events emitted by a chain provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProviderEvent {
	Connect {
		chain_id: u64,
	},
	Disconnect {
		chain_id: u64,
	},
	Error {
		chain_id: u64,
		error: String,
	},
	/// A new block, fired once per height in ascending order.
	Block {
		chain_id: u64,
		block: Box<RpcBlock>,
	},
	TransactionSubmitted {
		chain_id: u64,
		tx_hash: B256,
	},
	TransactionConfirmed {
		chain_id: u64,
		tx_hash: B256,
		receipt: Box<TransactionReceipt>,
	},
	/// Monitoring hit its ceiling without a receipt.
	TransactionTimeout {
		chain_id: u64,
		tx_hash: B256,
	},
}

/// Tag used to filter provider events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderEventKind {
	Connect,
	Disconnect,
	Error,
	Block,
	Transaction,
}

impl ProviderEvent {
	pub fn kind(&self) -> ProviderEventKind {
		match self {
			ProviderEvent::Connect { .. } => ProviderEventKind::Connect,
			ProviderEvent::Disconnect { .. } => ProviderEventKind::Disconnect,
			ProviderEvent::Error { .. } => ProviderEventKind::Error,
			ProviderEvent::Block { .. } => ProviderEventKind::Block,
			ProviderEvent::TransactionSubmitted { .. }
			| ProviderEvent::TransactionConfirmed { .. }
			| ProviderEvent::TransactionTimeout { .. } => ProviderEventKind::Transaction,
		}
	}

	pub fn chain_id(&self) -> u64 {
		match self {
			ProviderEvent::Connect { chain_id }
			| ProviderEvent::Disconnect { chain_id }
			| ProviderEvent::Error { chain_id, .. }
			| ProviderEvent::Block { chain_id, .. }
			| ProviderEvent::TransactionSubmitted { chain_id, .. }
			| ProviderEvent::TransactionConfirmed { chain_id, .. }
			| ProviderEvent::TransactionTimeout { chain_id, .. } => *chain_id,
		}
	}
}

/// Events emitted by the transaction orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransactionEvent {
	Submitted {
		chain_id: u64,
		tx_hash: B256,
		nonce: u64,
	},
	StatusChanged {
		chain_id: u64,
		tx_hash: B256,
		status: TransactionStatus,
	},
	/// A speed-up or cancel replaced an earlier transaction at the same nonce.
	Replaced {
		chain_id: u64,
		original: B256,
		replacement: B256,
	},
}

/// Events emitted by the chain switch engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SwitchEvent {
	ChainChanged {
		session: SessionId,
		previous_chain_id: u64,
		chain_id: u64,
	},
	/// A switch attempt failed; the result is also in history.
	SwitchFailed { result: ChainSwitchResult },
}

/// Events emitted by the bridge orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BridgeEvent {
	/// The sender must approve `spender` before the transfer can proceed.
	AllowanceNeeded {
		chain_id: u64,
		token: Address,
		owner: Address,
		spender: Address,
		required: U256,
		current: U256,
	},
	Created {
		id: String,
		provider: String,
	},
	StatusChanged {
		id: String,
		previous: BridgeStatus,
		status: BridgeStatus,
	},
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_provider_event_kind() {
		let event = ProviderEvent::TransactionTimeout {
			chain_id: 1,
			tx_hash: B256::ZERO,
		};
		assert_eq!(event.kind(), ProviderEventKind::Transaction);
		assert_eq!(event.chain_id(), 1);
		assert_eq!(
			ProviderEvent::Connect { chain_id: 5 }.kind(),
			ProviderEventKind::Connect
		);
	}
}
