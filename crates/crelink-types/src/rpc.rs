//! JSON-RPC wire types.
//!
//! Field names and encodings follow the Ethereum JSON-RPC specification
//! exactly (camelCase keys, `0x`-prefixed hex quantities) so that payloads
//! from third-party nodes decode without adapters.

use crate::validation::ValidationError;
use crate::utils::without_0x_prefix;
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Parses a JSON-RPC quantity (`0x`-prefixed hex) into a `u64`.
pub fn parse_quantity(value: &str) -> Result<u64, ValidationError> {
	let digits = without_0x_prefix(value);
	if digits.is_empty() {
		return Err(ValidationError::InvalidHex(value.to_string()));
	}
	u64::from_str_radix(digits, 16).map_err(|_| ValidationError::InvalidHex(value.to_string()))
}

/// Serde adapter for `u64` quantities encoded as hex strings.
///
/// Deserialization also accepts plain JSON numbers, which some nodes return.
pub mod quantity {
	use super::*;

	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Str(String),
		Num(u64),
	}

	pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&format!("{:#x}", value))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
		match Raw::deserialize(deserializer)? {
			Raw::Str(s) => parse_quantity(&s).map_err(serde::de::Error::custom),
			Raw::Num(n) => Ok(n),
		}
	}

	/// Optional variant; `null` and missing keys map to `None`.
	pub mod opt {
		use super::*;

		pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
			match value {
				Some(v) => serializer.serialize_str(&format!("{:#x}", v)),
				None => serializer.serialize_none(),
			}
		}

		pub fn deserialize<'de, D: Deserializer<'de>>(
			deserializer: D,
		) -> Result<Option<u64>, D::Error> {
			match Option::<Raw>::deserialize(deserializer)? {
				Some(Raw::Str(s)) => parse_quantity(&s).map(Some).map_err(serde::de::Error::custom),
				Some(Raw::Num(n)) => Ok(Some(n)),
				None => Ok(None),
			}
		}
	}
}

/// Block selector accepted by state-reading methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlockTag {
	#[default]
	Latest,
	Pending,
	Earliest,
	Safe,
	Finalized,
	Number(u64),
}

impl BlockTag {
	/// JSON encoding used as an RPC parameter.
	pub fn to_json(&self) -> Value {
		Value::String(self.to_string())
	}
}

impl std::fmt::Display for BlockTag {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			BlockTag::Latest => write!(f, "latest"),
			BlockTag::Pending => write!(f, "pending"),
			BlockTag::Earliest => write!(f, "earliest"),
			BlockTag::Safe => write!(f, "safe"),
			BlockTag::Finalized => write!(f, "finalized"),
			BlockTag::Number(n) => write!(f, "{:#x}", n),
		}
	}
}

impl Serialize for BlockTag {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_string())
	}
}

/// Block header plus transaction hashes as returned by `eth_getBlockBy*`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
	/// `None` for the pending block.
	#[serde(default, with = "quantity::opt")]
	pub number: Option<u64>,
	#[serde(default)]
	pub hash: Option<B256>,
	pub parent_hash: B256,
	#[serde(with = "quantity")]
	pub timestamp: u64,
	pub gas_limit: U256,
	pub gas_used: U256,
	/// Present only on chains with an EIP-1559 fee market.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub base_fee_per_gas: Option<U256>,
	#[serde(default)]
	pub miner: Option<Address>,
	/// Hashes, or full objects when requested with `true`.
	#[serde(default)]
	pub transactions: Vec<Value>,
}

/// Transaction object as returned by `eth_getTransactionByHash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
	pub hash: B256,
	#[serde(with = "quantity")]
	pub nonce: u64,
	pub from: Address,
	#[serde(default)]
	pub to: Option<Address>,
	pub value: U256,
	pub gas: U256,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub gas_price: Option<U256>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_fee_per_gas: Option<U256>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_priority_fee_per_gas: Option<U256>,
	#[serde(default)]
	pub input: Bytes,
	#[serde(default, with = "quantity::opt")]
	pub block_number: Option<u64>,
	#[serde(default, with = "quantity::opt")]
	pub chain_id: Option<u64>,
	#[serde(default, rename = "type", with = "quantity::opt")]
	pub tx_type: Option<u64>,
}

/// Event log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
	pub address: Address,
	pub topics: Vec<B256>,
	#[serde(default)]
	pub data: Bytes,
	#[serde(default, with = "quantity::opt")]
	pub block_number: Option<u64>,
	#[serde(default)]
	pub transaction_hash: Option<B256>,
	#[serde(default, with = "quantity::opt")]
	pub log_index: Option<u64>,
}

/// Receipt returned by `eth_getTransactionReceipt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
	pub transaction_hash: B256,
	#[serde(default, with = "quantity::opt")]
	pub block_number: Option<u64>,
	#[serde(default)]
	pub block_hash: Option<B256>,
	pub from: Address,
	#[serde(default)]
	pub to: Option<Address>,
	pub gas_used: U256,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub effective_gas_price: Option<U256>,
	/// `1` for success, `0` for revert. Pre-Byzantium receipts omit it.
	#[serde(default, with = "quantity::opt")]
	pub status: Option<u64>,
	#[serde(default)]
	pub contract_address: Option<Address>,
	#[serde(default)]
	pub logs: Vec<Log>,
}

impl TransactionReceipt {
	/// Whether execution succeeded. Receipts without a status count as success.
	pub fn success(&self) -> bool {
		self.status.map(|s| s == 1).unwrap_or(true)
	}

	/// Logs emitted by `address` whose first topic equals `signature`.
	pub fn logs_matching<'a>(
		&'a self,
		address: Address,
		signature: B256,
	) -> impl Iterator<Item = &'a Log> + 'a {
		self.logs.iter().filter(move |log| {
			log.address == address && log.topics.first() == Some(&signature)
		})
	}
}

/// Result of `eth_feeHistory`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeHistory {
	#[serde(with = "quantity")]
	pub oldest_block: u64,
	/// One entry per block plus the next block's projected base fee.
	pub base_fee_per_gas: Vec<U256>,
	#[serde(default)]
	pub gas_used_ratio: Vec<f64>,
	/// `reward[block][percentile]`, absent when no percentiles were requested.
	#[serde(default)]
	pub reward: Option<Vec<Vec<U256>>>,
}

impl FeeHistory {
	/// Base fee projected for the next block (last entry of the array).
	pub fn next_base_fee(&self) -> Option<U256> {
		self.base_fee_per_gas.last().copied()
	}
}

/// Result of a JSON-RPC call decoded according to its method family.
///
/// Methods the engine does not know keep their raw JSON in [`RpcResponse::Raw`].
#[derive(Debug, Clone, PartialEq)]
pub enum RpcResponse {
	Quantity(U256),
	Data(Bytes),
	Hash(B256),
	Block(Option<Box<RpcBlock>>),
	Transaction(Option<Box<RpcTransaction>>),
	Receipt(Option<Box<TransactionReceipt>>),
	FeeHistory(Box<FeeHistory>),
	Logs(Vec<Log>),
	Raw(Value),
}

impl RpcResponse {
	/// Decodes `value` using the result shape of `method`.
	pub fn decode(method: &str, value: Value) -> Result<Self, serde_json::Error> {
		Ok(match method {
			"eth_blockNumber"
			| "eth_chainId"
			| "eth_gasPrice"
			| "eth_maxPriorityFeePerGas"
			| "eth_getBalance"
			| "eth_getTransactionCount"
			| "eth_estimateGas"
			| "eth_blobBaseFee" => RpcResponse::Quantity(serde_json::from_value(value)?),
			"eth_call" | "eth_getCode" | "eth_getStorageAt" => {
				RpcResponse::Data(serde_json::from_value(value)?)
			},
			"eth_sendRawTransaction" | "eth_sendTransaction" => {
				RpcResponse::Hash(serde_json::from_value(value)?)
			},
			"eth_getBlockByNumber" | "eth_getBlockByHash" => {
				RpcResponse::Block(serde_json::from_value(value)?)
			},
			"eth_getTransactionByHash" => RpcResponse::Transaction(serde_json::from_value(value)?),
			"eth_getTransactionReceipt" => RpcResponse::Receipt(serde_json::from_value(value)?),
			"eth_feeHistory" => RpcResponse::FeeHistory(serde_json::from_value(value)?),
			"eth_getLogs" => RpcResponse::Logs(serde_json::from_value(value)?),
			_ => RpcResponse::Raw(value),
		})
	}
}
