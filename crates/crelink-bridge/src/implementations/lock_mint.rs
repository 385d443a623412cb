//! Lock-and-mint bridge with an off-chain relayer.
//!
//! The sender locks tokens in the bridge contract on the source chain,
//! which emits `TransferInitiated` with the relayer's transfer id. The
//! relayer mints or releases the counterpart on the target chain and
//! reports progress over HTTP.

use crate::common::{self, AssetTable};
use crate::{BridgeContext, BridgeError, BridgeProvider, BridgeRegistry};
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, SolCall, SolEvent};
use async_trait::async_trait;
use crelink_types::{
	parse_address, BridgeAsset, BridgeQuote, BridgeRequest, BridgeStatus, BridgeStatusUpdate,
	BridgeTransaction, BridgeTransfer, ChainPair, ConfigSchema, Field, FieldType, GasSpeed,
	ImplementationRegistry, Schema, TransactionRequest, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

sol! {
	interface ILockMintBridge {
		function lock(address token, uint256 amount, uint256 targetChainId, address recipient) external payable returns (bytes32 transferId);

		event TransferInitiated(
			bytes32 indexed transferId,
			address indexed sender,
			address indexed recipient,
			address token,
			uint256 amount,
			uint256 targetChainId
		);
	}
}

/// Gas limit assumed for `lock` when estimation fails.
const LOCK_GAS_FALLBACK: u64 = 150_000;

const DEFAULT_FEE_BPS: u64 = 10;
const DEFAULT_ESTIMATED_SECONDS: u64 = 900;
const DEFAULT_RELAYER_TIMEOUT: u64 = 15;

/// Relayer-side transfer status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayerStatus {
	/// Seen on the source chain, not final yet.
	Pending,
	/// Source leg final; relay queued.
	Confirmed,
	Relaying,
	Completed,
	Failed,
}

impl From<RelayerStatus> for BridgeStatus {
	fn from(status: RelayerStatus) -> Self {
		match status {
			RelayerStatus::Pending => BridgeStatus::Submitted,
			RelayerStatus::Confirmed | RelayerStatus::Relaying => BridgeStatus::Relaying,
			RelayerStatus::Completed => BridgeStatus::Completed,
			RelayerStatus::Failed => BridgeStatus::Failed,
		}
	}
}

/// A transfer as the relayer API reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayerTransfer {
	pub transfer_id: String,
	pub source_chain_id: u64,
	pub target_chain_id: u64,
	pub token: Address,
	#[serde(default)]
	pub target_token: Option<Address>,
	pub sender: Address,
	pub recipient: Address,
	pub amount: U256,
	pub status: RelayerStatus,
	#[serde(default)]
	pub source_tx_hash: Option<B256>,
	#[serde(default)]
	pub target_tx_hash: Option<B256>,
	#[serde(default)]
	pub fee: U256,
	#[serde(default)]
	pub error: Option<String>,
	#[serde(default)]
	pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
	pub transfer_id: String,
	pub source_chain_id: u64,
	pub target_chain_id: u64,
	pub source_tx_hash: Option<B256>,
}

/// The relayer's HTTP API.
#[async_trait]
pub trait RelayerApi: Send + Sync {
	/// `None` when the relayer has not indexed the transfer yet.
	async fn transfer(&self, transfer_id: &str) -> Result<Option<RelayerTransfer>, BridgeError>;

	async fn request_relay(&self, request: &RelayRequest) -> Result<(), BridgeError>;

	async fn transfers(&self, account: Address) -> Result<Vec<RelayerTransfer>, BridgeError>;
}

pub struct HttpRelayer {
	client: reqwest::Client,
	base_url: String,
}

fn relayer_error(e: reqwest::Error) -> BridgeError {
	BridgeError::Relayer(e.to_string())
}

impl HttpRelayer {
	pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BridgeError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| BridgeError::Configuration(format!("Failed to build relayer client: {}", e)))?;
		Ok(Self {
			client,
			base_url: base_url.trim_end_matches('/').to_string(),
		})
	}
}

#[async_trait]
impl RelayerApi for HttpRelayer {
	async fn transfer(&self, transfer_id: &str) -> Result<Option<RelayerTransfer>, BridgeError> {
		let response = self
			.client
			.get(format!("{}/transfers/{}", self.base_url, transfer_id))
			.send()
			.await
			.map_err(relayer_error)?;
		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Ok(None);
		}
		let transfer = response
			.error_for_status()
			.map_err(relayer_error)?
			.json()
			.await
			.map_err(relayer_error)?;
		Ok(Some(transfer))
	}

	async fn request_relay(&self, request: &RelayRequest) -> Result<(), BridgeError> {
		self.client
			.post(format!("{}/relay", self.base_url))
			.json(request)
			.send()
			.await
			.map_err(relayer_error)?
			.error_for_status()
			.map_err(relayer_error)?;
		Ok(())
	}

	async fn transfers(&self, account: Address) -> Result<Vec<RelayerTransfer>, BridgeError> {
		self.client
			.get(format!("{}/transfers?account={}", self.base_url, account))
			.send()
			.await
			.map_err(relayer_error)?
			.error_for_status()
			.map_err(relayer_error)?
			.json()
			.await
			.map_err(relayer_error)
	}
}

pub struct LockMintSchema;

impl ConfigSchema for LockMintSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("relayer_url", FieldType::Url),
				common::pairs_field(),
				Field::new("bridges", FieldType::Table(Schema::new(vec![], vec![]))).with_validator(
					|value| {
						let bridges = value.as_table().ok_or("Expected a table")?;
						if bridges.is_empty() {
							return Err("At least one bridge contract is required".into());
						}
						for (chain, address) in bridges {
							chain
								.parse::<u64>()
								.map_err(|_| format!("'{}' is not a chain id", chain))?;
							let address = address.as_str().ok_or("Bridge addresses must be strings")?;
							parse_address(address).map_err(|e| e.to_string())?;
						}
						Ok(())
					},
				),
			],
			vec![
				Field::new(
					"fee_bps",
					FieldType::Integer {
						min: Some(0),
						max: Some(10_000),
					},
				),
				Field::new(
					"estimated_seconds",
					FieldType::Integer {
						min: Some(0),
						max: None,
					},
				),
				Field::new(
					"relayer_timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(300),
					},
				),
				common::assets_field(),
			],
		);
		schema.validate(config)
	}
}

pub struct LockMintBridge {
	pairs: Vec<ChainPair>,
	/// Bridge contract per chain.
	bridges: HashMap<u64, Address>,
	assets: AssetTable,
	fee_bps: u64,
	estimated_seconds: u64,
	relayer: Arc<dyn RelayerApi>,
	context: BridgeContext,
}

impl LockMintBridge {
	pub fn new(
		config: &toml::Value,
		context: BridgeContext,
		relayer: Arc<dyn RelayerApi>,
	) -> Result<Self, BridgeError> {
		LockMintSchema.validate(config)?;

		let mut bridges = HashMap::new();
		if let Some(table) = config.get("bridges").and_then(|v| v.as_table()) {
			for (chain, address) in table {
				let chain_id: u64 = chain
					.parse()
					.map_err(|_| BridgeError::Configuration(format!("'{}' is not a chain id", chain)))?;
				let address = address.as_str().ok_or_else(|| {
					BridgeError::Configuration("Bridge addresses must be strings".into())
				})?;
				bridges.insert(chain_id, parse_address(address)?);
			}
		}

		let pairs = common::parse_pairs(config)?;
		for pair in &pairs {
			if !bridges.contains_key(&pair.source) {
				return Err(BridgeError::Configuration(format!(
					"No bridge contract configured for chain {}",
					pair.source
				)));
			}
		}

		Ok(Self {
			pairs,
			bridges,
			assets: AssetTable::from_config(config)?,
			fee_bps: common::optional_u64(config, "fee_bps", DEFAULT_FEE_BPS),
			estimated_seconds: common::optional_u64(config, "estimated_seconds", DEFAULT_ESTIMATED_SECONDS),
			relayer,
			context,
		})
	}

	fn bridge_address(&self, chain_id: u64) -> Result<Address, BridgeError> {
		self.bridges
			.get(&chain_id)
			.copied()
			.ok_or_else(|| BridgeError::Configuration(format!("No bridge contract on chain {}", chain_id)))
	}

	fn bridge_fee(&self, amount: U256) -> U256 {
		amount * U256::from(self.fee_bps) / U256::from(10_000u64)
	}

	fn lock_request(
		&self,
		pair: ChainPair,
		token: Address,
		amount: U256,
		sender: Address,
		recipient: Address,
	) -> Result<TransactionRequest, BridgeError> {
		let data = ILockMintBridge::lockCall {
			token,
			amount,
			targetChainId: U256::from(pair.target),
			recipient,
		}
		.abi_encode();
		Ok(TransactionRequest {
			from: Some(sender),
			to: Some(self.bridge_address(pair.source)?),
			value: Some(if token.is_zero() { amount } else { U256::ZERO }),
			data: Some(data.into()),
			..Default::default()
		})
	}

	fn from_relayer(&self, transfer: RelayerTransfer) -> BridgeTransaction {
		let pair = ChainPair::new(transfer.source_chain_id, transfer.target_chain_id);
		let target_token = transfer
			.target_token
			.or_else(|| self.assets.find(pair, transfer.token).map(|a| a.target_token))
			.unwrap_or(Address::ZERO);
		BridgeTransaction {
			id: transfer.transfer_id.clone(),
			provider: Registry::NAME.to_string(),
			source_chain_id: transfer.source_chain_id,
			target_chain_id: transfer.target_chain_id,
			source_token: transfer.token,
			target_token,
			sender: transfer.sender,
			recipient: transfer.recipient,
			amount: transfer.amount,
			status: transfer.status.into(),
			source_tx_hash: transfer.source_tx_hash,
			target_tx_hash: transfer.target_tx_hash,
			transfer_id: Some(transfer.transfer_id),
			fee: transfer.fee,
			error: transfer.error,
			created_at: transfer.created_at,
			updated_at: transfer.created_at,
			expires_at: transfer.created_at,
		}
	}
}

#[async_trait]
impl BridgeProvider for LockMintBridge {
	fn name(&self) -> &str {
		Registry::NAME
	}

	fn supported_pairs(&self) -> &[ChainPair] {
		&self.pairs
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LockMintSchema)
	}

	async fn get_supported_assets(&self, pair: ChainPair) -> Result<Vec<BridgeAsset>, BridgeError> {
		if !self.supports(pair) {
			return Err(BridgeError::UnsupportedChainPair(pair));
		}
		Ok(self.assets.assets_for(pair))
	}

	async fn spender(&self, pair: ChainPair, token: Address) -> Result<Option<Address>, BridgeError> {
		if token.is_zero() {
			return Ok(None);
		}
		Ok(Some(self.bridge_address(pair.source)?))
	}

	async fn get_token_balance(
		&self,
		chain_id: u64,
		token: Address,
		owner: Address,
	) -> Result<U256, BridgeError> {
		let provider = self.context.providers.provider(chain_id)?;
		common::token_balance(provider.as_ref(), token, owner).await
	}

	async fn get_allowance(
		&self,
		pair: ChainPair,
		token: Address,
		owner: Address,
	) -> Result<U256, BridgeError> {
		if token.is_zero() {
			return Ok(U256::MAX);
		}
		let provider = self.context.providers.provider(pair.source)?;
		Ok(provider
			.get_allowance(token, owner, self.bridge_address(pair.source)?)
			.await?)
	}

	async fn approve_token(
		&self,
		pair: ChainPair,
		token: Address,
		owner: Address,
		amount: U256,
	) -> Result<B256, BridgeError> {
		if token.is_zero() {
			return Err(BridgeError::NotSupported("Approving the native currency".into()));
		}
		let spender = self.bridge_address(pair.source)?;
		common::send_approval(&self.context, pair.source, token, owner, spender, amount).await
	}

	async fn estimate_bridge_fee(&self, request: &BridgeRequest) -> Result<BridgeQuote, BridgeError> {
		let pair = request.chain_pair();
		self.assets.resolve(request)?;
		let provider = self.context.providers.provider(pair.source)?;
		let lock = self.lock_request(
			pair,
			request.token,
			request.amount,
			request.sender,
			request.recipient(),
		)?;
		let gas_fee =
			common::estimate_gas_cost(&self.context, provider.as_ref(), &lock, LOCK_GAS_FALLBACK).await?;

		Ok(BridgeQuote {
			provider: Registry::NAME.to_string(),
			chain_pair: pair,
			token: request.token,
			amount: request.amount,
			bridge_fee: self.bridge_fee(request.amount),
			gas_fee,
			estimated_seconds: self.estimated_seconds,
		})
	}

	async fn create_transaction(&self, request: &BridgeRequest) -> Result<BridgeTransaction, BridgeError> {
		if !self.supports(request.chain_pair()) {
			return Err(BridgeError::UnsupportedChainPair(request.chain_pair()));
		}
		let asset = self.assets.resolve(request)?;
		Ok(common::new_transaction(
			Registry::NAME,
			request,
			asset.target_token,
			self.bridge_fee(request.amount),
		))
	}

	async fn bridge_asset(&self, tx: &BridgeTransaction) -> Result<BridgeTransfer, BridgeError> {
		let pair = tx.chain_pair();
		let bridge = self.bridge_address(pair.source)?;
		let request = self.lock_request(pair, tx.source_token, tx.amount, tx.sender, tx.recipient)?;

		let sent = self
			.context
			.transactions
			.send(pair.source, request, GasSpeed::Standard)
			.await?;
		let receipt = common::wait_for_receipt(&self.context, pair.source, sent.hash).await?;

		let transfer_id = receipt
			.logs_matching(bridge, ILockMintBridge::TransferInitiated::SIGNATURE_HASH)
			.next()
			.and_then(|log| log.topics.get(1))
			.ok_or_else(|| {
				BridgeError::Receipt(format!("No TransferInitiated event in {}", sent.hash))
			})?;

		tracing::info!(
			chain_id = pair.source,
			tx_hash = %sent.hash,
			transfer_id = %transfer_id,
			"Locked tokens for bridging"
		);
		Ok(BridgeTransfer {
			transfer_id: transfer_id.to_string(),
			source_tx_hash: sent.hash,
		})
	}

	async fn get_transaction_status(
		&self,
		tx: &BridgeTransaction,
	) -> Result<BridgeStatusUpdate, BridgeError> {
		let Some(transfer_id) = &tx.transfer_id else {
			return Ok(BridgeStatusUpdate::status(tx.status));
		};
		match self.relayer.transfer(transfer_id).await? {
			Some(transfer) => Ok(BridgeStatusUpdate {
				status: transfer.status.into(),
				target_tx_hash: transfer.target_tx_hash,
				error: transfer.error,
			}),
			None => Ok(BridgeStatusUpdate::status(BridgeStatus::Submitted)),
		}
	}

	async fn get_transaction_history(
		&self,
		account: Address,
	) -> Result<Vec<BridgeTransaction>, BridgeError> {
		let transfers = self.relayer.transfers(account).await?;
		Ok(transfers
			.into_iter()
			.map(|transfer| self.from_relayer(transfer))
			.collect())
	}

	async fn request_relay(&self, tx: &BridgeTransaction) -> Result<(), BridgeError> {
		let transfer_id = tx
			.transfer_id
			.clone()
			.ok_or_else(|| BridgeError::Relayer(format!("Transfer {} has no relayer id yet", tx.id)))?;
		self.relayer
			.request_relay(&RelayRequest {
				transfer_id,
				source_chain_id: tx.source_chain_id,
				target_chain_id: tx.target_chain_id,
				source_tx_hash: tx.source_tx_hash,
			})
			.await
	}
}

/// Factory function to create a lock-and-mint bridge from configuration.
///
/// Configuration parameters:
/// - `relayer_url`: base URL of the relayer API
/// - `pairs`: served chain pairs as `"source-target"` strings
/// - `bridges`: bridge contract per chain id
/// - `fee_bps`: bridge fee in basis points (default: 10)
/// - `estimated_seconds`: expected completion time (default: 900)
/// - `relayer_timeout_seconds`: HTTP timeout (default: 15)
/// - `assets`: bridgeable tokens with their address per chain
pub fn create_bridge(
	config: &toml::Value,
	context: &BridgeContext,
) -> Result<Box<dyn BridgeProvider>, BridgeError> {
	LockMintSchema.validate(config)?;
	let url = config
		.get("relayer_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| BridgeError::Configuration("relayer_url is required".into()))?;
	let timeout = common::optional_u64(config, "relayer_timeout_seconds", DEFAULT_RELAYER_TIMEOUT);
	let relayer = Arc::new(HttpRelayer::new(url, Duration::from_secs(timeout))?);
	Ok(Box::new(LockMintBridge::new(config, context.clone(), relayer)?))
}

/// Registry for the lock-and-mint bridge.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "lock_mint";
	type Factory = crate::BridgeFactory;

	fn factory() -> Self::Factory {
		create_bridge
	}
}

impl BridgeRegistry for Registry {}
