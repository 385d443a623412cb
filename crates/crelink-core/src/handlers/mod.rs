//! Message boundary between the wallet UI and the engine.
//!
//! Requests arrive as JSON `{"method": ..., "params": {...}}` and always
//! resolve to a [`WalletResponse`]: either `{"result": ...}` or
//! `{"error": "..."}`. Unknown methods and chains answer with a
//! "... is not supported" message.

use crate::{WalletEngine, WalletError};
use alloy_primitives::{Address, B256, U256};
use crelink_types::{
	BridgeRequest, ChainPair, ChainSwitchContext, GasSpeed, SessionId, TransactionRequest,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every operation exposed to the message layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
	tag = "method",
	content = "params",
	rename_all = "camelCase",
	rename_all_fields = "camelCase"
)]
pub enum WalletRequest {
	GetSelectedNetwork {
		#[serde(default)]
		session: SessionId,
	},
	SelectNetwork {
		chain_id: u64,
		#[serde(default)]
		context: ChainSwitchContext,
	},
	GetSupportedChains {},
	GetSupportedTokens {
		chain_id: u64,
	},
	GetBalance {
		chain_id: u64,
		address: Address,
		#[serde(default)]
		token: Option<Address>,
	},
	GetGasInfo {
		chain_id: u64,
	},
	EstimateFee {
		chain_id: u64,
		request: TransactionRequest,
	},
	SignAndSendTransaction {
		request: TransactionRequest,
		#[serde(default)]
		speed: GasSpeed,
		#[serde(default)]
		context: ChainSwitchContext,
	},
	SpeedUpTransaction {
		hash: B256,
	},
	CancelTransaction {
		hash: B256,
	},
	GetSwitchHistory {
		#[serde(default)]
		session: Option<SessionId>,
	},
	GetBridgePairs {},
	GetBridgeQuotes {
		request: BridgeRequest,
	},
	CreateTransaction {
		request: BridgeRequest,
		#[serde(default)]
		provider: Option<String>,
	},
	ExecuteTransaction {
		id: String,
	},
	ConfirmTransaction {
		id: String,
	},
	CancelBridgeTransaction {
		id: String,
	},
	GetTransactionStatus {
		id: String,
	},
	GetTransactionsByAccount {
		account: Address,
	},
	GetBridgeHistory {
		account: Address,
	},
	ApproveBridgeToken {
		source_chain_id: u64,
		target_chain_id: u64,
		token: Address,
		owner: Address,
		amount: U256,
	},
}

impl WalletRequest {
	/// Wire names of all methods, in declaration order.
	pub const METHODS: [&'static str; 21] = [
		"getSelectedNetwork",
		"selectNetwork",
		"getSupportedChains",
		"getSupportedTokens",
		"getBalance",
		"getGasInfo",
		"estimateFee",
		"signAndSendTransaction",
		"speedUpTransaction",
		"cancelTransaction",
		"getSwitchHistory",
		"getBridgePairs",
		"getBridgeQuotes",
		"createTransaction",
		"executeTransaction",
		"confirmTransaction",
		"cancelBridgeTransaction",
		"getTransactionStatus",
		"getTransactionsByAccount",
		"getBridgeHistory",
		"approveBridgeToken",
	];

	/// Parses a raw message, telling unknown methods apart from bad params.
	/// Missing or null params count as `{}`.
	pub fn from_message(mut message: Value) -> Result<Self, String> {
		let method = match message.get("method").and_then(Value::as_str) {
			Some(method) => method.to_string(),
			None => return Err("Message has no method".to_string()),
		};
		if !Self::METHODS.contains(&method.as_str()) {
			return Err(format!("Method {} is not supported", method));
		}
		if let Some(fields) = message.as_object_mut() {
			if fields.get("params").is_none_or(Value::is_null) {
				fields.insert("params".to_string(), Value::Object(serde_json::Map::new()));
			}
		}
		serde_json::from_value(message).map_err(|e| format!("Invalid params for {}: {}", method, e))
	}
}

/// Outcome of a request: a JSON result or an error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WalletResponse {
	Result(Value),
	Error(String),
}

impl WalletResponse {
	pub fn is_error(&self) -> bool {
		matches!(self, WalletResponse::Error(_))
	}
}

impl From<Result<Value, WalletError>> for WalletResponse {
	fn from(result: Result<Value, WalletError>) -> Self {
		match result {
			Ok(value) => WalletResponse::Result(value),
			Err(e) => WalletResponse::Error(e.to_string()),
		}
	}
}

fn json<T: Serialize>(value: T) -> Result<Value, WalletError> {
	Ok(serde_json::to_value(value)?)
}

impl WalletEngine {
	/// Handles a raw JSON message from the UI layer.
	pub async fn handle_message(&self, message: Value) -> WalletResponse {
		match WalletRequest::from_message(message) {
			Ok(request) => self.handle(request).await,
			Err(e) => {
				tracing::debug!(error = %e, "Rejected wallet message");
				WalletResponse::Error(e)
			},
		}
	}

	pub async fn handle(&self, request: WalletRequest) -> WalletResponse {
		let response = WalletResponse::from(self.dispatch(request).await);
		if let WalletResponse::Error(e) = &response {
			tracing::warn!(error = %e, "Wallet request failed");
		}
		response
	}

	async fn dispatch(&self, request: WalletRequest) -> Result<Value, WalletError> {
		match request {
			WalletRequest::GetSelectedNetwork { session } => {
				json(self.get_selected_network(&session)?)
			},
			WalletRequest::SelectNetwork { chain_id, context } => {
				json(self.select_network(chain_id, &context)?)
			},
			WalletRequest::GetSupportedChains {} => json(self.get_supported_chains()),
			WalletRequest::GetSupportedTokens { chain_id } => {
				json(self.get_supported_tokens(chain_id)?)
			},
			WalletRequest::GetBalance {
				chain_id,
				address,
				token,
			} => json(self.get_balance(chain_id, address, token).await?),
			WalletRequest::GetGasInfo { chain_id } => json(self.get_gas_info(chain_id).await?),
			WalletRequest::EstimateFee { chain_id, request } => {
				json(self.estimate_fee(chain_id, &request).await?)
			},
			WalletRequest::SignAndSendTransaction {
				request,
				speed,
				context,
			} => json(
				self.sign_and_send_transaction(request, speed, &context)
					.await?,
			),
			WalletRequest::SpeedUpTransaction { hash } => {
				json(self.speed_up_transaction(hash).await?)
			},
			WalletRequest::CancelTransaction { hash } => json(self.cancel_transaction(hash).await?),
			WalletRequest::GetSwitchHistory { session } => {
				json(self.switch_history(session.as_ref()))
			},
			WalletRequest::GetBridgePairs {} => json(self.bridge_pairs()),
			WalletRequest::GetBridgeQuotes { request } => {
				json(self.get_bridge_quotes(&request).await?)
			},
			WalletRequest::CreateTransaction { request, provider } => json(
				self.create_bridge_transaction(request, provider.as_deref())
					.await?,
			),
			WalletRequest::ExecuteTransaction { id } => {
				json(self.execute_bridge_transaction(&id).await?)
			},
			WalletRequest::ConfirmTransaction { id } => {
				json(self.confirm_bridge_transaction(&id).await?)
			},
			WalletRequest::CancelBridgeTransaction { id } => {
				json(self.cancel_bridge_transaction(&id).await?)
			},
			WalletRequest::GetTransactionStatus { id } => {
				json(self.get_bridge_transaction_status(&id).await?)
			},
			WalletRequest::GetTransactionsByAccount { account } => {
				json(self.get_transactions_by_account(account).await)
			},
			WalletRequest::GetBridgeHistory { account } => {
				json(self.get_bridge_history(account).await)
			},
			WalletRequest::ApproveBridgeToken {
				source_chain_id,
				target_chain_id,
				token,
				owner,
				amount,
			} => json(
				self.approve_bridge_token(
					ChainPair::new(source_chain_id, target_chain_id),
					token,
					owner,
					amount,
				)
				.await?,
			),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{build, sender};
	use serde_json::json;

	fn result(response: WalletResponse) -> Value {
		match response {
			WalletResponse::Result(value) => value,
			WalletResponse::Error(e) => panic!("unexpected error: {}", e),
		}
	}

	fn error(response: WalletResponse) -> String {
		match response {
			WalletResponse::Error(e) => e,
			WalletResponse::Result(value) => panic!("unexpected result: {}", value),
		}
	}

	#[test]
	fn test_method_names_match_variants() {
		let request = WalletRequest::from_message(json!({ "method": "getSupportedChains" })).unwrap();
		assert_eq!(request, WalletRequest::GetSupportedChains {});
		let request =
			WalletRequest::from_message(json!({ "method": "getSwitchHistory", "params": null }))
				.unwrap();
		assert_eq!(request, WalletRequest::GetSwitchHistory { session: None });

		let request = WalletRequest::from_message(json!({
			"method": "approveBridgeToken",
			"params": {
				"sourceChainId": 1,
				"targetChainId": 42161,
				"token": Address::repeat_byte(1),
				"owner": Address::repeat_byte(2),
				"amount": "0x10",
			}
		}))
		.unwrap();
		assert!(matches!(
			request,
			WalletRequest::ApproveBridgeToken {
				source_chain_id: 1,
				target_chain_id: 42161,
				..
			}
		));
	}

	#[test]
	fn test_unknown_method_is_not_supported() {
		assert_eq!(
			WalletRequest::from_message(json!({ "method": "eth_mine" })).unwrap_err(),
			"Method eth_mine is not supported"
		);
		assert!(WalletRequest::from_message(json!({ "params": {} })).is_err());
		assert!(WalletRequest::from_message(json!({ "method": "getBalance", "params": {} }))
			.unwrap_err()
			.starts_with("Invalid params for getBalance"));
	}

	#[test]
	fn test_response_wire_shape() {
		let ok = WalletResponse::Result(json!(1));
		assert_eq!(serde_json::to_value(&ok).unwrap(), json!({ "result": 1 }));
		let err = WalletResponse::Error("nope".into());
		assert_eq!(serde_json::to_value(&err).unwrap(), json!({ "error": "nope" }));
	}

	#[tokio::test]
	async fn test_network_selection_over_messages() {
		let wallet = build("").await;
		let engine = &wallet.engine;

		let selected = result(
			engine
				.handle_message(json!({ "method": "getSelectedNetwork" }))
				.await,
		);
		assert_eq!(selected["chainId"], json!(1000));

		let switched = result(
			engine
				.handle_message(json!({
					"method": "selectNetwork",
					"params": { "chainId": 1, "context": { "session": "tab-7" } }
				}))
				.await,
		);
		assert_eq!(switched["success"], json!(true));

		let selected = result(
			engine
				.handle_message(json!({
					"method": "getSelectedNetwork",
					"params": { "session": "tab-7" }
				}))
				.await,
		);
		assert_eq!(selected["chainId"], json!(1));
	}

	#[tokio::test]
	async fn test_unsupported_chain_message() {
		let wallet = build("").await;
		let message = error(
			wallet
				.engine
				.handle_message(json!({
					"method": "getBalance",
					"params": { "chainId": 5, "address": sender() }
				}))
				.await,
		);
		assert_eq!(message, "Chain 5 is not supported");

		let message = error(
			wallet
				.engine
				.handle(WalletRequest::GetBridgeQuotes {
					request: BridgeRequest {
						source_chain_id: 1000,
						target_chain_id: 1,
						token: Address::ZERO,
						amount: U256::from(1u64),
						sender: sender(),
						recipient: None,
					},
				})
				.await,
		);
		assert!(message.ends_with("is not supported"), "{}", message);
	}

	#[tokio::test]
	async fn test_multibyte_bridge_id_is_reported_not_found() {
		let subscriber = tracing_subscriber::fmt()
			.with_max_level(tracing::Level::TRACE)
			.with_test_writer()
			.finish();
		let _guard = tracing::subscriber::set_default(subscriber);

		let wallet = build("").await;
		for method in ["executeTransaction", "confirmTransaction"] {
			let message = error(
				wallet
					.engine
					.handle_message(json!({ "method": method, "params": { "id": "aéééé" } }))
					.await,
			);
			assert_eq!(message, "Bridge error: Bridge transaction aéééé not found");
		}
	}

	#[tokio::test]
	async fn test_tokens_and_chains_listing() {
		let wallet = build("").await;
		let chains = result(wallet.engine.handle(WalletRequest::GetSupportedChains {}).await);
		assert!(chains
			.as_array()
			.unwrap()
			.iter()
			.any(|c| c["chainId"] == json!(1000)));

		let tokens = result(
			wallet
				.engine
				.handle(WalletRequest::GetSupportedTokens { chain_id: 1000 })
				.await,
		);
		assert_eq!(tokens[0]["symbol"], json!("CTA"));
	}
}
