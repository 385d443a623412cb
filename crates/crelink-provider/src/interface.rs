//! The provider capability interface.
//!
//! Implementors supply the lifecycle methods and raw [`send`]; every typed
//! accessor is a default method built on `send`, so a decorator that
//! overrides `send` changes the behavior of all of them at once.
//!
//! [`send`]: ProviderInterface::send

use crate::contracts;
use crate::ProviderError;
use alloy_dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use crelink_types::{
	BlockTag, EventBus, FeeHistory, Log, ProviderEvent, RpcBlock, RpcResponse, RpcTransaction,
	TransactionReceipt, TransactionRequest,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Connection state of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderState {
	#[default]
	Disconnected,
	Connecting,
	Connected,
	Error,
}

impl fmt::Display for ProviderState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ProviderState::Disconnected => "disconnected",
			ProviderState::Connecting => "connecting",
			ProviderState::Connected => "connected",
			ProviderState::Error => "error",
		};
		f.write_str(name)
	}
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, ProviderError> {
	serde_json::from_value(value)
		.map_err(|e| ProviderError::Decode(format!("{} returned an unexpected shape: {}", method, e)))
}

/// A JSON-RPC connection to one chain.
#[async_trait]
pub trait ProviderInterface: Send + Sync {
	fn chain_id(&self) -> u64;

	fn state(&self) -> ProviderState;

	/// Event bus carrying connect, disconnect, error, block and transaction events.
	fn events(&self) -> EventBus<ProviderEvent>;

	/// Connects and starts background work such as block polling.
	async fn initialize(&self) -> Result<(), ProviderError>;

	async fn connect(&self) -> Result<(), ProviderError>;

	async fn disconnect(&self) -> Result<(), ProviderError>;

	async fn reconnect(&self) -> Result<(), ProviderError> {
		self.disconnect().await?;
		self.connect().await
	}

	/// Sends a raw JSON-RPC request, connecting first if needed.
	async fn send(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

	/// Sends a request and decodes the result by method family.
	async fn request(&self, method: &str, params: Value) -> Result<RpcResponse, ProviderError> {
		let value = self.send(method, params).await?;
		Ok(RpcResponse::decode(method, value)?)
	}

	async fn get_balance(&self, address: Address, block: BlockTag) -> Result<U256, ProviderError> {
		let value = self
			.send("eth_getBalance", json!([address, block.to_json()]))
			.await?;
		decode("eth_getBalance", value)
	}

	/// ERC-20 `balanceOf(owner)` on `token`.
	async fn get_token_balance(&self, token: Address, owner: Address) -> Result<U256, ProviderError> {
		let data = self
			.call(
				&TransactionRequest::call(token, contracts::balance_of_calldata(owner)),
				BlockTag::Latest,
			)
			.await?;
		contracts::decode_word(&data)
	}

	/// ERC-20 `allowance(owner, spender)` on `token`.
	async fn get_allowance(
		&self,
		token: Address,
		owner: Address,
		spender: Address,
	) -> Result<U256, ProviderError> {
		let data = self
			.call(
				&TransactionRequest::call(token, contracts::allowance_calldata(owner, spender)),
				BlockTag::Latest,
			)
			.await?;
		contracts::decode_word(&data)
	}

	/// Transaction count of `address`; use `BlockTag::Pending` for the next nonce.
	async fn get_nonce(&self, address: Address, block: BlockTag) -> Result<u64, ProviderError> {
		let value = self
			.send("eth_getTransactionCount", json!([address, block.to_json()]))
			.await?;
		let count: U256 = decode("eth_getTransactionCount", value)?;
		u64::try_from(count).map_err(|_| ProviderError::Decode("nonce exceeds u64".into()))
	}

	async fn get_gas_price(&self) -> Result<U256, ProviderError> {
		let value = self.send("eth_gasPrice", json!([])).await?;
		decode("eth_gasPrice", value)
	}

	async fn get_fee_history(
		&self,
		block_count: u64,
		newest: BlockTag,
		percentiles: &[f64],
	) -> Result<FeeHistory, ProviderError> {
		let value = self
			.send(
				"eth_feeHistory",
				json!([format!("{:#x}", block_count), newest.to_json(), percentiles]),
			)
			.await?;
		decode("eth_feeHistory", value)
	}

	async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<U256, ProviderError> {
		let value = self.send("eth_estimateGas", json!([tx.to_json()])).await?;
		decode("eth_estimateGas", value)
	}

	async fn get_block_number(&self) -> Result<u64, ProviderError> {
		let value = self.send("eth_blockNumber", json!([])).await?;
		let number: U256 = decode("eth_blockNumber", value)?;
		u64::try_from(number).map_err(|_| ProviderError::Decode("block number exceeds u64".into()))
	}

	/// Block header with transaction hashes; `None` if the block does not exist.
	async fn get_block(&self, block: BlockTag) -> Result<Option<RpcBlock>, ProviderError> {
		let value = self
			.send("eth_getBlockByNumber", json!([block.to_json(), false]))
			.await?;
		decode("eth_getBlockByNumber", value)
	}

	async fn get_block_by_hash(&self, hash: B256) -> Result<Option<RpcBlock>, ProviderError> {
		let value = self.send("eth_getBlockByHash", json!([hash, false])).await?;
		decode("eth_getBlockByHash", value)
	}

	async fn get_transaction(&self, hash: B256) -> Result<Option<RpcTransaction>, ProviderError> {
		let value = self.send("eth_getTransactionByHash", json!([hash])).await?;
		decode("eth_getTransactionByHash", value)
	}

	/// Receipt of a mined transaction; `None` while it is pending.
	async fn get_transaction_receipt(
		&self,
		hash: B256,
	) -> Result<Option<TransactionReceipt>, ProviderError> {
		let value = self.send("eth_getTransactionReceipt", json!([hash])).await?;
		decode("eth_getTransactionReceipt", value)
	}

	async fn get_logs(&self, filter: Value) -> Result<Vec<Log>, ProviderError> {
		let value = self.send("eth_getLogs", json!([filter])).await?;
		decode("eth_getLogs", value)
	}

	async fn call(&self, tx: &TransactionRequest, block: BlockTag) -> Result<Bytes, ProviderError> {
		let value = self
			.send("eth_call", json!([tx.to_json(), block.to_json()]))
			.await?;
		decode("eth_call", value)
	}

	/// Broadcasts a signed, RLP-encoded transaction.
	async fn send_transaction(&self, signed: &Bytes) -> Result<B256, ProviderError> {
		let value = self.send("eth_sendRawTransaction", json!([signed])).await?;
		decode("eth_sendRawTransaction", value)
	}

	/// True when the latest block carries a base fee.
	async fn supports_eip1559(&self) -> Result<bool, ProviderError> {
		let block = self.get_block(BlockTag::Latest).await?;
		Ok(block.is_some_and(|b| b.base_fee_per_gas.is_some()))
	}

	/// Calls a read-only contract function described by a JSON ABI.
	///
	/// `method` is either a bare name, which must not be overloaded, or a
	/// full signature such as `transfer(address,uint256)`.
	async fn call_contract(
		&self,
		abi: &JsonAbi,
		address: Address,
		method: &str,
		params: &[DynSolValue],
	) -> Result<Vec<DynSolValue>, ProviderError> {
		let function = (if method.contains('(') {
			abi.functions().find(|f| f.signature() == method)
		} else {
			match abi.function(method).map(|overloads| overloads.as_slice()) {
				Some([only]) => Some(only),
				Some([]) | None => None,
				Some(_) => {
					return Err(ProviderError::Decode(format!(
						"Function '{}' is overloaded; pass its full signature",
						method
					)))
				},
			}
		})
		.ok_or_else(|| ProviderError::Decode(format!("Function '{}' not found in ABI", method)))?;

		let input = function
			.abi_encode_input(params)
			.map_err(|e| ProviderError::Decode(format!("Failed to encode {}: {}", method, e)))?;
		let output = self
			.call(&TransactionRequest::call(address, input), BlockTag::Latest)
			.await?;
		function
			.abi_decode_output(&output)
			.map_err(|e| ProviderError::Decode(format!("Failed to decode {}: {}", method, e)))
	}
}
