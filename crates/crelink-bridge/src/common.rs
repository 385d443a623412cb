//! Helpers shared by bridge implementations: configuration parsing, asset
//! tables, approvals and source-chain receipt handling.

use crate::{BridgeContext, BridgeError};
use alloy_primitives::{Address, B256, U256};
use crelink_provider::contracts::approve_calldata;
use crelink_provider::{ProviderInterface, TRANSACTION_MONITOR_CEILING};
use crelink_types::{
	current_timestamp, parse_address, BlockTag, BridgeAsset, BridgeRequest, BridgeStatus,
	BridgeTransaction, ChainPair, Field, FieldType, GasSpeed, Log, Schema, TransactionReceipt,
	TransactionRequest,
};
use std::collections::HashMap;
use std::time::Duration;

/// Parses a `"source-target"` chain pair key.
pub fn parse_pair(value: &str) -> Result<ChainPair, BridgeError> {
	let invalid = || BridgeError::Configuration(format!("Invalid chain pair '{}'", value));
	let (source, target) = value.split_once('-').ok_or_else(invalid)?;
	let source: u64 = source.trim().parse().map_err(|_| invalid())?;
	let target: u64 = target.trim().parse().map_err(|_| invalid())?;
	if source == target {
		return Err(invalid());
	}
	Ok(ChainPair::new(source, target))
}

/// Reads the `pairs` array of an implementation table.
pub fn parse_pairs(config: &toml::Value) -> Result<Vec<ChainPair>, BridgeError> {
	let pairs = config
		.get("pairs")
		.and_then(|v| v.as_array())
		.ok_or_else(|| BridgeError::Configuration("pairs is required".into()))?;
	let mut parsed = Vec::with_capacity(pairs.len());
	for pair in pairs {
		let pair = pair
			.as_str()
			.ok_or_else(|| BridgeError::Configuration("pairs must be strings".into()))?;
		let pair = parse_pair(pair)?;
		if !parsed.contains(&pair) {
			parsed.push(pair);
		}
	}
	if parsed.is_empty() {
		return Err(BridgeError::Configuration("pairs must not be empty".into()));
	}
	Ok(parsed)
}

/// Schema field for `pairs = ["1000-1", ...]`.
pub fn pairs_field() -> Field {
	Field::new("pairs", FieldType::Array(Box::new(FieldType::String))).with_validator(|value| {
		let pairs = value.as_array().ok_or("Expected an array")?;
		if pairs.is_empty() {
			return Err("At least one chain pair is required".into());
		}
		for pair in pairs {
			if let Some(pair) = pair.as_str() {
				parse_pair(pair).map_err(|e| e.to_string())?;
			}
		}
		Ok(())
	})
}

/// Schema field for the `[[assets]]` array.
pub fn assets_field() -> Field {
	let asset = Schema::new(
		vec![
			Field::new("symbol", FieldType::String),
			Field::new(
				"decimals",
				FieldType::Integer {
					min: Some(0),
					max: Some(36),
				},
			),
			Field::new("tokens", FieldType::Table(Schema::new(vec![], vec![]))).with_validator(
				|value| {
					let tokens = value.as_table().ok_or("Expected a table")?;
					for (chain, token) in tokens {
						chain
							.parse::<u64>()
							.map_err(|_| format!("'{}' is not a chain id", chain))?;
						let token = token.as_str().ok_or("Token addresses must be strings")?;
						parse_address(token).map_err(|e| e.to_string())?;
					}
					Ok(())
				},
			),
		],
		vec![
			Field::new("min_amount", FieldType::String).with_validator(amount_validator),
			Field::new("max_amount", FieldType::String).with_validator(amount_validator),
		],
	);
	Field::new("assets", FieldType::Array(Box::new(FieldType::Table(asset))))
}

fn amount_validator(value: &toml::Value) -> Result<(), String> {
	match value.as_str().map(str::parse::<U256>) {
		Some(Ok(_)) => Ok(()),
		_ => Err("Expected an integer amount in base units".into()),
	}
}

/// Reads an optional non-negative integer setting.
pub fn optional_u64(config: &toml::Value, key: &str, default: u64) -> u64 {
	config
		.get(key)
		.and_then(|v| v.as_integer())
		.and_then(|v| u64::try_from(v).ok())
		.unwrap_or(default)
}

/// Reads an optional base-unit amount written as a decimal string.
pub fn optional_amount(config: &toml::Value, key: &str, default: U256) -> Result<U256, BridgeError> {
	match config.get(key).and_then(|v| v.as_str()) {
		Some(amount) => amount
			.parse()
			.map_err(|_| BridgeError::Configuration(format!("{} is not a valid amount", key))),
		None => Ok(default),
	}
}

#[derive(Debug, Clone)]
struct AssetEntry {
	symbol: String,
	decimals: u8,
	tokens: HashMap<u64, Address>,
	min_amount: U256,
	max_amount: Option<U256>,
}

/// Tokens a bridge moves, with their address on every chain it serves.
#[derive(Debug, Clone, Default)]
pub struct AssetTable {
	entries: Vec<AssetEntry>,
}

impl AssetTable {
	pub fn from_config(config: &toml::Value) -> Result<Self, BridgeError> {
		let Some(assets) = config.get("assets").and_then(|v| v.as_array()) else {
			return Ok(Self::default());
		};

		let mut entries = Vec::with_capacity(assets.len());
		for asset in assets {
			let symbol = asset
				.get("symbol")
				.and_then(|v| v.as_str())
				.ok_or_else(|| BridgeError::Configuration("asset symbol is required".into()))?
				.to_string();
			let decimals = asset
				.get("decimals")
				.and_then(|v| v.as_integer())
				.and_then(|v| u8::try_from(v).ok())
				.ok_or_else(|| BridgeError::Configuration(format!("{}: invalid decimals", symbol)))?;

			let mut tokens = HashMap::new();
			if let Some(table) = asset.get("tokens").and_then(|v| v.as_table()) {
				for (chain, token) in table {
					let chain_id: u64 = chain.parse().map_err(|_| {
						BridgeError::Configuration(format!("{}: '{}' is not a chain id", symbol, chain))
					})?;
					let token = token.as_str().ok_or_else(|| {
						BridgeError::Configuration(format!("{}: token addresses must be strings", symbol))
					})?;
					tokens.insert(chain_id, parse_address(token)?);
				}
			}

			entries.push(AssetEntry {
				min_amount: optional_amount(asset, "min_amount", U256::ZERO)?,
				max_amount: match asset.get("max_amount") {
					Some(_) => Some(optional_amount(asset, "max_amount", U256::MAX)?),
					None => None,
				},
				symbol,
				decimals,
				tokens,
			});
		}
		Ok(Self { entries })
	}

	/// Assets with an address on both chains of `pair`.
	pub fn assets_for(&self, pair: ChainPair) -> Vec<BridgeAsset> {
		self.entries
			.iter()
			.filter_map(|entry| {
				let source_token = *entry.tokens.get(&pair.source)?;
				let target_token = *entry.tokens.get(&pair.target)?;
				Some(BridgeAsset {
					symbol: entry.symbol.clone(),
					decimals: entry.decimals,
					source_token,
					target_token,
					min_amount: entry.min_amount,
					max_amount: entry.max_amount,
				})
			})
			.collect()
	}

	/// The asset whose source-chain address is `token`.
	pub fn find(&self, pair: ChainPair, token: Address) -> Option<BridgeAsset> {
		self.assets_for(pair)
			.into_iter()
			.find(|asset| asset.source_token == token)
	}

	/// Looks up the asset for a request and checks its amount limits.
	pub fn resolve(&self, request: &BridgeRequest) -> Result<BridgeAsset, BridgeError> {
		let pair = request.chain_pair();
		let asset = self
			.find(pair, request.token)
			.ok_or(BridgeError::UnsupportedToken {
				token: request.token,
				pair,
			})?;
		check_amount(&asset, request.amount)?;
		Ok(asset)
	}
}

pub fn check_amount(asset: &BridgeAsset, amount: U256) -> Result<(), BridgeError> {
	if amount.is_zero() {
		return Err(BridgeError::AmountOutOfRange("Amount must be positive".into()));
	}
	if amount < asset.min_amount {
		return Err(BridgeError::AmountOutOfRange(format!(
			"{} {} is below the minimum of {}",
			amount, asset.symbol, asset.min_amount
		)));
	}
	if let Some(max) = asset.max_amount {
		if amount > max {
			return Err(BridgeError::AmountOutOfRange(format!(
				"{} {} exceeds the maximum of {}",
				amount, asset.symbol, max
			)));
		}
	}
	Ok(())
}

/// A fresh `Created` record. The orchestrator sets the real expiry.
pub fn new_transaction(
	provider: &str,
	request: &BridgeRequest,
	target_token: Address,
	fee: U256,
) -> BridgeTransaction {
	let now = current_timestamp();
	BridgeTransaction {
		id: uuid::Uuid::new_v4().to_string(),
		provider: provider.to_string(),
		source_chain_id: request.source_chain_id,
		target_chain_id: request.target_chain_id,
		source_token: request.token,
		target_token,
		sender: request.sender,
		recipient: request.recipient(),
		amount: request.amount,
		status: BridgeStatus::Created,
		source_tx_hash: None,
		target_tx_hash: None,
		transfer_id: None,
		fee,
		error: None,
		created_at: now,
		updated_at: now,
		expires_at: now,
	}
}

/// Native balance for `Address::ZERO`, ERC-20 balance otherwise.
pub async fn token_balance(
	provider: &dyn ProviderInterface,
	token: Address,
	owner: Address,
) -> Result<U256, BridgeError> {
	if token.is_zero() {
		Ok(provider.get_balance(owner, BlockTag::Latest).await?)
	} else {
		Ok(provider.get_token_balance(token, owner).await?)
	}
}

/// Sends `approve(spender, amount)` on `token` from `owner`.
pub async fn send_approval(
	context: &BridgeContext,
	chain_id: u64,
	token: Address,
	owner: Address,
	spender: Address,
	amount: U256,
) -> Result<B256, BridgeError> {
	let request = TransactionRequest {
		from: Some(owner),
		to: Some(token),
		data: Some(approve_calldata(spender, amount).into()),
		..Default::default()
	};
	let sent = context
		.transactions
		.send(chain_id, request, GasSpeed::Standard)
		.await?;
	tracing::info!(chain_id, token = %token, spender = %spender, "Sent token approval");
	Ok(sent.hash)
}

/// Gas cost of `request` at the standard tier, in native wei.
pub async fn estimate_gas_cost(
	context: &BridgeContext,
	provider: &dyn ProviderInterface,
	request: &TransactionRequest,
	fallback_gas: u64,
) -> Result<U256, BridgeError> {
	let gas_limit = context
		.gas
		.estimate_gas_limit(provider, request, Some(U256::from(fallback_gas)))
		.await?;
	let fees = context.gas.fees_for(provider, GasSpeed::Standard).await?;
	Ok(gas_limit * fees.max_price_per_gas())
}

/// Polls for the receipt of `tx_hash` on `chain_id` at the chain's
/// transaction polling interval.
///
/// Fails if the transaction is not mined within the monitoring ceiling or
/// if it reverted.
pub async fn wait_for_receipt(
	context: &BridgeContext,
	chain_id: u64,
	tx_hash: B256,
) -> Result<TransactionReceipt, BridgeError> {
	let provider = context.providers.provider(chain_id)?;
	let interval = context
		.providers
		.registry()
		.get(chain_id)
		.map(|descriptor| {
			context
				.providers
				.optimization()
				.profile(descriptor)
				.transaction_polling_interval()
		})
		.unwrap_or(Duration::from_secs(5));

	let start_time = tokio::time::Instant::now();
	loop {
		if start_time.elapsed() > TRANSACTION_MONITOR_CEILING {
			return Err(BridgeError::Receipt(format!(
				"Transaction {} was not mined in time",
				tx_hash
			)));
		}
		match provider.get_transaction_receipt(tx_hash).await {
			Ok(Some(receipt)) if receipt.success() => return Ok(receipt),
			Ok(Some(_)) => {
				return Err(BridgeError::Receipt(format!("Transaction {} reverted", tx_hash)))
			},
			Ok(None) => {},
			Err(e) => {
				tracing::warn!(chain_id, error = %e, "Receipt lookup failed, retrying");
			},
		}
		tokio::time::sleep(interval).await;
	}
}

/// First log whose signature topic matches, from any emitter.
pub fn find_event(receipt: &TransactionReceipt, signature: B256) -> Option<&Log> {
	receipt
		.logs
		.iter()
		.find(|log| log.topics.first() == Some(&signature))
}

/// Indexed topic `index` of `log` read as an unsigned integer.
pub fn topic_u256(log: &Log, index: usize) -> Result<U256, BridgeError> {
	log.topics
		.get(index)
		.map(|topic| U256::from_be_bytes(topic.0))
		.ok_or_else(|| BridgeError::Receipt(format!("Event is missing topic {}", index)))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn config() -> toml::Value {
		toml::from_str(
			r#"
			pairs = ["1000-1", "1-1000", "1000-1"]

			[[assets]]
			symbol = "CTA"
			decimals = 18
			tokens = { "1000" = "0x0000000000000000000000000000000000000000", "1" = "0x1111111111111111111111111111111111111111" }
			min_amount = "1000"

			[[assets]]
			symbol = "USDC"
			decimals = 6
			tokens = { "1000" = "0x2222222222222222222222222222222222222222", "1" = "0x3333333333333333333333333333333333333333" }
			max_amount = "5000000"
			"#,
		)
		.unwrap()
	}

	fn request(token: Address, amount: u64) -> BridgeRequest {
		BridgeRequest {
			source_chain_id: 1000,
			target_chain_id: 1,
			token,
			amount: U256::from(amount),
			sender: Address::repeat_byte(0xaa),
			recipient: None,
		}
	}

	#[test]
	fn test_parse_pairs_deduplicates() {
		let pairs = parse_pairs(&config()).unwrap();
		assert_eq!(pairs, vec![ChainPair::new(1000, 1), ChainPair::new(1, 1000)]);
	}

	#[test]
	fn test_invalid_pairs() {
		assert!(parse_pair("1000").is_err());
		assert!(parse_pair("1-1").is_err());
		assert!(parse_pair("a-1").is_err());
		assert_eq!(parse_pair(" 1 - 42161 ").unwrap(), ChainPair::new(1, 42161));
	}

	#[test]
	fn test_assets_for_pair() {
		let table = AssetTable::from_config(&config()).unwrap();
		let assets = table.assets_for(ChainPair::new(1000, 1));
		assert_eq!(assets.len(), 2);
		assert!(assets[0].is_native());
		assert_eq!(assets[0].target_token, Address::repeat_byte(0x11));
		assert!(table.assets_for(ChainPair::new(1000, 137)).is_empty());
	}

	#[test]
	fn test_resolve_checks_limits() {
		let table = AssetTable::from_config(&config()).unwrap();
		assert!(table.resolve(&request(Address::ZERO, 1_000)).is_ok());
		assert!(matches!(
			table.resolve(&request(Address::ZERO, 999)),
			Err(BridgeError::AmountOutOfRange(_))
		));
		assert!(matches!(
			table.resolve(&request(Address::repeat_byte(0x22), 5_000_001)),
			Err(BridgeError::AmountOutOfRange(_))
		));
		assert!(matches!(
			table.resolve(&request(Address::repeat_byte(0x22), 0)),
			Err(BridgeError::AmountOutOfRange(_))
		));
		assert!(matches!(
			table.resolve(&request(Address::repeat_byte(0x99), 10)),
			Err(BridgeError::UnsupportedToken { .. })
		));
	}

	#[test]
	fn test_schema_fields() {
		let schema = Schema::new(vec![pairs_field()], vec![assets_field()]);
		assert!(schema.validate(&config()).is_ok());

		let bad: toml::Value = toml::from_str(
			r#"
			pairs = ["1000-1"]
			[[assets]]
			symbol = "X"
			decimals = 6
			tokens = { "mainnet" = "0x2222222222222222222222222222222222222222" }
			"#,
		)
		.unwrap();
		assert!(schema.validate(&bad).is_err());

		let empty: toml::Value = toml::from_str("pairs = []").unwrap();
		assert!(schema.validate(&empty).is_err());
	}

	#[test]
	fn test_new_transaction_defaults() {
		let tx = new_transaction("lock_mint", &request(Address::ZERO, 5), Address::ZERO, U256::from(1u64));
		assert_eq!(tx.status, BridgeStatus::Created);
		assert_eq!(tx.recipient, Address::repeat_byte(0xaa));
		assert!(tx.transfer_id.is_none());
		assert_eq!(tx.id.len(), 36);
	}
}
