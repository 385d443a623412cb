//! Transaction data model.
//!
//! A [`Transaction`] carries exactly one fee model by construction: the
//! [`FeeFields`] enum is either legacy (`gasPrice`) or EIP-1559
//! (`maxFeePerGas` + `maxPriorityFeePerGas`), and the envelope type is
//! derived from it rather than stored alongside.

use crate::rpc::quantity;
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transaction envelope type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
	/// Type 0 transaction priced by `gasPrice`.
	Legacy,
	/// Type 2 transaction priced by base fee plus tip.
	Eip1559,
}

impl TxType {
	/// Numeric EIP-2718 type byte.
	pub fn as_u8(&self) -> u8 {
		match self {
			TxType::Legacy => 0,
			TxType::Eip1559 => 2,
		}
	}
}

/// Fee fields of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, rename_all = "camelCase")]
pub enum FeeFields {
	#[serde(rename_all = "camelCase")]
	Eip1559 {
		max_fee_per_gas: U256,
		max_priority_fee_per_gas: U256,
	},
	#[serde(rename_all = "camelCase")]
	Legacy { gas_price: U256 },
}

impl FeeFields {
	pub fn tx_type(&self) -> TxType {
		match self {
			FeeFields::Legacy { .. } => TxType::Legacy,
			FeeFields::Eip1559 { .. } => TxType::Eip1559,
		}
	}

	/// Highest price per gas this transaction may pay.
	pub fn max_price_per_gas(&self) -> U256 {
		match self {
			FeeFields::Legacy { gas_price } => *gas_price,
			FeeFields::Eip1559 {
				max_fee_per_gas, ..
			} => *max_fee_per_gas,
		}
	}

	/// Multiplies every fee field by `bps / 10_000`, rounding up so that a
	/// bump is never smaller than requested.
	pub fn scale_bps(&self, bps: u64) -> FeeFields {
		let scale = |value: U256| {
			let numerator = value * U256::from(bps);
			let denominator = U256::from(10_000u64);
			numerator.div_ceil(denominator)
		};
		match self {
			FeeFields::Legacy { gas_price } => FeeFields::Legacy {
				gas_price: scale(*gas_price),
			},
			FeeFields::Eip1559 {
				max_fee_per_gas,
				max_priority_fee_per_gas,
			} => FeeFields::Eip1559 {
				max_fee_per_gas: scale(*max_fee_per_gas),
				max_priority_fee_per_gas: scale(*max_priority_fee_per_gas),
			},
		}
	}
}

/// A fully specified, unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
	pub from: Address,
	/// `None` for contract creation.
	pub to: Option<Address>,
	pub value: U256,
	pub data: Bytes,
	pub nonce: u64,
	pub chain_id: u64,
	pub gas_limit: U256,
	#[serde(flatten)]
	pub fees: FeeFields,
}

impl Transaction {
	pub fn tx_type(&self) -> TxType {
		self.fees.tx_type()
	}

	/// Worst-case cost in wei: `gas_limit * max price + value`.
	pub fn max_cost(&self) -> U256 {
		self.gas_limit * self.fees.max_price_per_gas() + self.value
	}

	/// The JSON-RPC request object for this transaction.
	pub fn to_request(&self) -> TransactionRequest {
		let mut request = TransactionRequest {
			from: Some(self.from),
			to: self.to,
			value: Some(self.value),
			data: Some(self.data.clone()),
			nonce: Some(self.nonce),
			chain_id: Some(self.chain_id),
			gas: Some(self.gas_limit),
			tx_type: Some(self.tx_type().as_u8() as u64),
			..Default::default()
		};
		match self.fees {
			FeeFields::Legacy { gas_price } => request.gas_price = Some(gas_price),
			FeeFields::Eip1559 {
				max_fee_per_gas,
				max_priority_fee_per_gas,
			} => {
				request.max_fee_per_gas = Some(max_fee_per_gas);
				request.max_priority_fee_per_gas = Some(max_priority_fee_per_gas);
			},
		}
		request
	}
}

/// Partial transaction used for `eth_call` and `eth_estimateGas`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub from: Option<Address>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub to: Option<Address>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub value: Option<U256>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<Bytes>,
	#[serde(default, skip_serializing_if = "Option::is_none", with = "quantity::opt")]
	pub nonce: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none", with = "quantity::opt")]
	pub chain_id: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub gas: Option<U256>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub gas_price: Option<U256>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_fee_per_gas: Option<U256>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_priority_fee_per_gas: Option<U256>,
	#[serde(
		default,
		rename = "type",
		skip_serializing_if = "Option::is_none",
		with = "quantity::opt"
	)]
	pub tx_type: Option<u64>,
}

impl TransactionRequest {
	/// A read-only call to `to` with the given calldata.
	pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
		Self {
			to: Some(to),
			data: Some(data.into()),
			..Default::default()
		}
	}

	pub fn from(mut self, from: Address) -> Self {
		self.from = Some(from);
		self
	}

	pub fn value(mut self, value: U256) -> Self {
		self.value = Some(value);
		self
	}

	/// JSON encoding used as an RPC parameter.
	pub fn to_json(&self) -> Value {
		serde_json::to_value(self).unwrap_or(Value::Null)
	}
}

/// A transaction signed by the external signer, ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
	pub transaction: Transaction,
	/// RLP-encoded signed envelope.
	pub raw: Bytes,
}

/// Lifecycle of a transaction submitted by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
	Pending,
	Confirmed,
	Failed,
	/// Superseded by a speed-up or cancel at the same nonce.
	Replaced,
	/// Not mined before the monitoring ceiling.
	TimedOut,
}

/// Bookkeeping for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransaction {
	pub hash: B256,
	pub transaction: Transaction,
	pub status: TransactionStatus,
	pub submitted_at: u64,
	#[serde(default)]
	pub block_number: Option<u64>,
	#[serde(default)]
	pub replaced_by: Option<B256>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn legacy_tx() -> Transaction {
		Transaction {
			from: Address::repeat_byte(1),
			to: Some(Address::repeat_byte(2)),
			value: U256::from(5u64),
			data: Bytes::new(),
			nonce: 7,
			chain_id: 1000,
			gas_limit: U256::from(21_000u64),
			fees: FeeFields::Legacy {
				gas_price: U256::from(2_000_000_000u64),
			},
		}
	}

	#[test]
	fn test_fee_fields_define_type() {
		let tx = legacy_tx();
		assert_eq!(tx.tx_type(), TxType::Legacy);
		let request = tx.to_request();
		assert_eq!(request.gas_price, Some(U256::from(2_000_000_000u64)));
		assert!(request.max_fee_per_gas.is_none());
		assert_eq!(request.tx_type, Some(0));
	}

	#[test]
	fn test_serialization_flattens_fees() {
		let value = serde_json::to_value(legacy_tx()).unwrap();
		assert_eq!(value["gasPrice"], json!("0x77359400"));
		assert!(value.get("maxFeePerGas").is_none());

		let back: Transaction = serde_json::from_value(value).unwrap();
		assert_eq!(back, legacy_tx());
	}

	#[test]
	fn test_scale_rounds_up() {
		let fees = FeeFields::Eip1559 {
			max_fee_per_gas: U256::from(101u64),
			max_priority_fee_per_gas: U256::from(10u64),
		};
		assert_eq!(
			fees.scale_bps(11_000),
			FeeFields::Eip1559 {
				max_fee_per_gas: U256::from(112u64),
				max_priority_fee_per_gas: U256::from(11u64),
			}
		);
	}

	#[test]
	fn test_request_json_uses_hex_quantities() {
		let json = legacy_tx().to_request().to_json();
		assert_eq!(json["nonce"], json!("0x7"));
		assert_eq!(json["chainId"], json!("0x3e8"));
		assert_eq!(json["type"], json!("0x0"));
	}

	#[test]
	fn test_max_cost() {
		let tx = legacy_tx();
		assert_eq!(
			tx.max_cost(),
			U256::from(21_000u64 * 2_000_000_000u64 + 5)
		);
	}
}
