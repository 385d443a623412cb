//! Configuration module for the CreLink chain engine.
//!
//! This module provides structures and utilities for managing engine
//! configuration. It supports loading configuration from TOML files and
//! validates it before any component is constructed.
//!
//! Every section is optional: an empty file yields a wallet on Catena
//! Mainnet with in-memory storage and the builtin chain table.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

use crelink_types::{
	Address, ChainDescriptor, ChainFeature, ChainRegistry, NativeCurrency, TokenInfo,
};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub use loader::ConfigLoader;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
	/// Wallet-wide selections.
	#[serde(default)]
	pub wallet: WalletConfig,
	/// Per-chain overrides and additional chains, keyed by chain id.
	#[serde(
		default,
		deserialize_with = "deserialize_chain_map",
		serialize_with = "serialize_chain_map"
	)]
	pub networks: HashMap<u64, NetworkConfig>,
	/// Provider and cache tunables.
	#[serde(default)]
	pub optimization: OptimizationConfig,
	/// Persistence backend for bridge history, profiles and cache snapshots.
	#[serde(default)]
	pub storage: StorageConfig,
	/// Chain switching behavior.
	#[serde(default)]
	pub switch: SwitchConfig,
	/// Gas policy parameters.
	#[serde(default)]
	pub gas: GasConfig,
	/// Bridge providers and orchestration timing.
	#[serde(default)]
	pub bridge: BridgeConfig,
}

/// Wallet-wide selections.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WalletConfig {
	/// Chain selected when no session has switched yet.
	#[serde(default = "default_chain_id")]
	pub default_chain_id: u64,
	/// Selected account, used by read-only commands.
	#[serde(default)]
	pub account: Option<Address>,
}

impl Default for WalletConfig {
	fn default() -> Self {
		Self {
			default_chain_id: default_chain_id(),
			account: None,
		}
	}
}

fn default_chain_id() -> u64 {
	1000
}

/// Overrides for a builtin chain, or the full description of a new one.
///
/// For chains absent from the builtin table `name` and `rpc_url` are
/// required; other fields fall back to Ethereum-like defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NetworkConfig {
	pub name: Option<String>,
	pub rpc_url: Option<String>,
	pub explorer_url: Option<String>,
	pub native_currency: Option<NativeCurrency>,
	pub is_testnet: Option<bool>,
	pub block_time_ms: Option<u64>,
	pub features: Option<BTreeSet<ChainFeature>>,
	/// Contract addresses keyed by role; merged over builtin entries.
	#[serde(default)]
	pub contracts: BTreeMap<String, Address>,
	/// Tokens appended to the chain's token list.
	#[serde(default)]
	pub tokens: Vec<TokenInfo>,
}

/// Provider, cache and gas-bound tunables.
///
/// `defaults` applies to every chain; `chains.<id>` overrides individual
/// fields for one chain. Unset fields are derived from the chain's block
/// time by the provider layer.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OptimizationConfig {
	#[serde(default)]
	pub defaults: OptimizationSettings,
	#[serde(
		default,
		deserialize_with = "deserialize_chain_map",
		serialize_with = "serialize_chain_map"
	)]
	pub chains: HashMap<u64, OptimizationSettings>,
}

/// One layer of optimization overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct OptimizationSettings {
	pub request_timeout_ms: Option<u64>,
	pub max_retries: Option<u32>,
	pub retry_delay_ms: Option<u64>,
	pub block_polling_interval_ms: Option<u64>,
	pub transaction_polling_interval_ms: Option<u64>,
	pub enable_cache: Option<bool>,
	pub cache_ttl_ms: Option<u64>,
	pub cache_max_size: Option<usize>,
	/// Lower bound for legacy gas prices, in wei.
	pub min_gas_price: Option<u64>,
	/// Upper bound for any fee field, in wei.
	pub max_gas_price: Option<u64>,
}

impl OptimizationSettings {
	/// Returns `self` with every field set in `other` replaced.
	pub fn merge(&self, other: &OptimizationSettings) -> OptimizationSettings {
		OptimizationSettings {
			request_timeout_ms: other.request_timeout_ms.or(self.request_timeout_ms),
			max_retries: other.max_retries.or(self.max_retries),
			retry_delay_ms: other.retry_delay_ms.or(self.retry_delay_ms),
			block_polling_interval_ms: other
				.block_polling_interval_ms
				.or(self.block_polling_interval_ms),
			transaction_polling_interval_ms: other
				.transaction_polling_interval_ms
				.or(self.transaction_polling_interval_ms),
			enable_cache: other.enable_cache.or(self.enable_cache),
			cache_ttl_ms: other.cache_ttl_ms.or(self.cache_ttl_ms),
			cache_max_size: other.cache_max_size.or(self.cache_max_size),
			min_gas_price: other.min_gas_price.or(self.min_gas_price),
			max_gas_price: other.max_gas_price.or(self.max_gas_price),
		}
	}
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	#[serde(default = "default_storage_primary")]
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	#[serde(default = "default_storage_implementations")]
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for cleaning up expired storage entries.
	#[serde(default = "default_cleanup_interval")]
	pub cleanup_interval_seconds: u64,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			primary: default_storage_primary(),
			implementations: default_storage_implementations(),
			cleanup_interval_seconds: default_cleanup_interval(),
		}
	}
}

fn default_storage_primary() -> String {
	"memory".to_string()
}

fn default_storage_implementations() -> HashMap<String, toml::Value> {
	HashMap::from([(
		"memory".to_string(),
		toml::Value::Table(toml::map::Map::new()),
	)])
}

fn default_cleanup_interval() -> u64 {
	3600
}

/// Chain switching behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SwitchConfig {
	/// Switch automatically when a dApp transaction targets another chain.
	#[serde(default = "default_true")]
	pub auto_switch: bool,
	/// Require an installed confirmer to approve automatic switches.
	#[serde(default)]
	pub force_confirmation: bool,
	/// Number of switch results kept per engine.
	#[serde(default = "default_history_size")]
	pub history_size: usize,
}

impl Default for SwitchConfig {
	fn default() -> Self {
		Self {
			auto_switch: true,
			force_confirmation: false,
			history_size: default_history_size(),
		}
	}
}

fn default_true() -> bool {
	true
}

fn default_history_size() -> usize {
	50
}

/// Gas policy parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GasConfig {
	/// Headroom added on top of `eth_estimateGas`, in percent.
	#[serde(default = "default_padding_percent")]
	pub gas_limit_padding_percent: u64,
	/// Fee increase applied by speed-up, in percent.
	#[serde(default = "default_speed_up_percent")]
	pub speed_up_percent: u64,
	/// Whether cancel transactions also bump the original fees.
	#[serde(default = "default_true")]
	pub bump_cancel_fees: bool,
}

impl Default for GasConfig {
	fn default() -> Self {
		Self {
			gas_limit_padding_percent: default_padding_percent(),
			speed_up_percent: default_speed_up_percent(),
			bump_cancel_fees: true,
		}
	}
}

fn default_padding_percent() -> u64 {
	10
}

fn default_speed_up_percent() -> u64 {
	10
}

/// Bridge providers and orchestration timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
	/// Registration order. When several providers serve the same chain
	/// pair, the first one listed wins. Unlisted implementations follow in
	/// alphabetical order.
	#[serde(default)]
	pub order: Vec<String>,
	/// Map of bridge implementation names to their configurations.
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
	/// How long a terminal or freshly refreshed status is served from cache.
	#[serde(default = "default_status_cache_ttl")]
	pub status_cache_ttl_seconds: u64,
	/// Lifetime of a transfer that was created but never submitted.
	#[serde(default = "default_expiry")]
	pub expiry_seconds: u64,
	/// Interval of the background status refresh loop.
	#[serde(default = "default_monitor_interval")]
	pub monitor_interval_seconds: u64,
}

impl Default for BridgeConfig {
	fn default() -> Self {
		Self {
			order: Vec::new(),
			implementations: HashMap::new(),
			status_cache_ttl_seconds: default_status_cache_ttl(),
			expiry_seconds: default_expiry(),
			monitor_interval_seconds: default_monitor_interval(),
		}
	}
}

impl BridgeConfig {
	/// Implementations in registration order.
	pub fn ordered_implementations(&self) -> Vec<(&str, &toml::Value)> {
		let mut ordered: Vec<(&str, &toml::Value)> = self
			.order
			.iter()
			.filter_map(|name| {
				self.implementations
					.get_key_value(name)
					.map(|(k, v)| (k.as_str(), v))
			})
			.collect();
		let mut rest: Vec<(&str, &toml::Value)> = self
			.implementations
			.iter()
			.filter(|(name, _)| !self.order.contains(name))
			.map(|(k, v)| (k.as_str(), v))
			.collect();
		rest.sort_by(|a, b| a.0.cmp(b.0));
		ordered.extend(rest);
		ordered
	}
}

fn default_status_cache_ttl() -> u64 {
	30
}

fn default_expiry() -> u64 {
	3600
}

fn default_monitor_interval() -> u64 {
	30
}

/// TOML keys are strings; chain-keyed tables parse them as `u64`.
fn deserialize_chain_map<'de, D, V>(deserializer: D) -> Result<HashMap<u64, V>, D::Error>
where
	D: Deserializer<'de>,
	V: Deserialize<'de>,
{
	let string_map: HashMap<String, V> = HashMap::deserialize(deserializer)?;
	let mut result = HashMap::new();
	for (key, value) in string_map {
		let chain_id = key
			.parse::<u64>()
			.map_err(|e| serde::de::Error::custom(format!("Invalid chain_id '{}': {}", key, e)))?;
		result.insert(chain_id, value);
	}
	Ok(result)
}

fn serialize_chain_map<S, V>(map: &HashMap<u64, V>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
	V: Serialize,
{
	let ordered: BTreeMap<String, &V> = map.iter().map(|(k, v)| (k.to_string(), v)).collect();
	ordered.serialize(serializer)
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};
		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

fn check_url(context: &str, url: &str) -> Result<(), ConfigError> {
	if url.starts_with("http://") || url.starts_with("https://") {
		Ok(())
	} else {
		Err(ConfigError::Validation(format!(
			"{} must be an http(s) URL, got '{}'",
			context, url
		)))
	}
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Builds the chain registry: builtin chains with network overrides
	/// applied, plus any additional chains declared in `[networks]`.
	pub fn chain_registry(&self) -> Result<ChainRegistry, ConfigError> {
		let mut registry = ChainRegistry::with_builtin();
		let mut chain_ids: Vec<_> = self.networks.keys().copied().collect();
		chain_ids.sort_unstable();

		for chain_id in chain_ids {
			let Some(network) = self.networks.get(&chain_id) else {
				continue;
			};
			match registry.get_mut(chain_id) {
				Some(existing) => apply_overrides(existing, network),
				None => {
					let descriptor = new_descriptor(chain_id, network)?;
					registry
						.register(descriptor)
						.map_err(|e| ConfigError::Validation(e.to_string()))?;
				},
			}
		}
		Ok(registry)
	}

	/// Effective optimization overrides for one chain.
	pub fn optimization_for(&self, chain_id: u64) -> OptimizationSettings {
		match self.optimization.chains.get(&chain_id) {
			Some(chain) => self.optimization.defaults.merge(chain),
			None => self.optimization.defaults.clone(),
		}
	}

	/// Validates the configuration to ensure all values are usable.
	fn validate(&self) -> Result<(), ConfigError> {
		// Networks
		for (chain_id, network) in &self.networks {
			if *chain_id == 0 {
				return Err(ConfigError::Validation("Chain id 0 is not valid".into()));
			}
			if let Some(url) = &network.rpc_url {
				check_url(&format!("Network {} rpc_url", chain_id), url)?;
			}
			if let Some(url) = &network.explorer_url {
				check_url(&format!("Network {} explorer_url", chain_id), url)?;
			}
			if crelink_types::get_network_info(*chain_id).is_none() {
				if network.name.as_deref().is_none_or(str::is_empty) {
					return Err(ConfigError::Validation(format!(
						"Network {} is not builtin and must have a name",
						chain_id
					)));
				}
				if network.rpc_url.is_none() {
					return Err(ConfigError::Validation(format!(
						"Network {} is not builtin and must have an rpc_url",
						chain_id
					)));
				}
			}
		}

		// Wallet
		let default_chain = self.wallet.default_chain_id;
		if crelink_types::get_network_info(default_chain).is_none()
			&& !self.networks.contains_key(&default_chain)
		{
			return Err(ConfigError::Validation(format!(
				"Default chain {} is not supported",
				default_chain
			)));
		}

		// Optimization
		let mut layers = vec![("defaults".to_string(), &self.optimization.defaults)];
		layers.extend(
			self.optimization
				.chains
				.iter()
				.map(|(id, settings)| (format!("chains.{}", id), settings)),
		);
		for (name, settings) in layers {
			if settings.request_timeout_ms == Some(0) {
				return Err(ConfigError::Validation(format!(
					"optimization.{}.request_timeout_ms must be greater than 0",
					name
				)));
			}
			if settings.max_retries.is_some_and(|r| r > 10) {
				return Err(ConfigError::Validation(format!(
					"optimization.{}.max_retries cannot exceed 10",
					name
				)));
			}
			if settings.block_polling_interval_ms == Some(0)
				|| settings.transaction_polling_interval_ms == Some(0)
			{
				return Err(ConfigError::Validation(format!(
					"optimization.{} polling intervals must be greater than 0",
					name
				)));
			}
			if settings.cache_max_size == Some(0) {
				return Err(ConfigError::Validation(format!(
					"optimization.{}.cache_max_size must be greater than 0",
					name
				)));
			}
			if let (Some(min), Some(max)) = (settings.min_gas_price, settings.max_gas_price) {
				if min > max {
					return Err(ConfigError::Validation(format!(
						"optimization.{}: min_gas_price {} exceeds max_gas_price {}",
						name, min, max
					)));
				}
			}
		}

		// Storage
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		if self.storage.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if self.storage.cleanup_interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}

		// Switch
		if self.switch.history_size == 0 || self.switch.history_size > 1000 {
			return Err(ConfigError::Validation(
				"switch.history_size must be between 1 and 1000".into(),
			));
		}

		// Gas
		if self.gas.gas_limit_padding_percent > 100 {
			return Err(ConfigError::Validation(
				"gas.gas_limit_padding_percent cannot exceed 100".into(),
			));
		}
		if self.gas.speed_up_percent == 0 || self.gas.speed_up_percent > 500 {
			return Err(ConfigError::Validation(
				"gas.speed_up_percent must be between 1 and 500".into(),
			));
		}

		// Bridge
		for name in &self.bridge.order {
			if !self.bridge.implementations.contains_key(name) {
				return Err(ConfigError::Validation(format!(
					"Bridge order references unknown implementation '{}'",
					name
				)));
			}
		}
		if self.bridge.expiry_seconds == 0 || self.bridge.monitor_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"bridge expiry_seconds and monitor_interval_seconds must be greater than 0".into(),
			));
		}

		Ok(())
	}
}

fn apply_overrides(descriptor: &mut ChainDescriptor, network: &NetworkConfig) {
	if let Some(name) = &network.name {
		descriptor.name = name.clone();
	}
	if let Some(url) = &network.rpc_url {
		descriptor.rpc_url = url.clone();
	}
	if let Some(url) = &network.explorer_url {
		descriptor.explorer_url = url.clone();
	}
	if let Some(currency) = &network.native_currency {
		descriptor.native_currency = currency.clone();
	}
	if let Some(is_testnet) = network.is_testnet {
		descriptor.is_testnet = is_testnet;
	}
	if let Some(block_time) = network.block_time_ms {
		descriptor.block_time_ms = block_time;
	}
	if let Some(features) = &network.features {
		descriptor.features = features.clone();
	}
	descriptor.contracts.extend(
		network
			.contracts
			.iter()
			.map(|(role, address)| (role.clone(), *address)),
	);
	for token in &network.tokens {
		if !descriptor.tokens.iter().any(|t| t.address == token.address) {
			descriptor.tokens.push(token.clone());
		}
	}
}

fn new_descriptor(chain_id: u64, network: &NetworkConfig) -> Result<ChainDescriptor, ConfigError> {
	let name = network
		.name
		.clone()
		.ok_or_else(|| ConfigError::Validation(format!("Network {} must have a name", chain_id)))?;
	let rpc_url = network.rpc_url.clone().ok_or_else(|| {
		ConfigError::Validation(format!("Network {} must have an rpc_url", chain_id))
	})?;
	Ok(ChainDescriptor {
		chain_id,
		name,
		rpc_url,
		explorer_url: network.explorer_url.clone().unwrap_or_default(),
		native_currency: network.native_currency.clone().unwrap_or(NativeCurrency {
			name: "Ether".to_string(),
			symbol: "ETH".to_string(),
			decimals: 18,
		}),
		features: network
			.features
			.clone()
			.unwrap_or_else(|| BTreeSet::from([ChainFeature::Eip1559, ChainFeature::Erc20])),
		is_testnet: network.is_testnet.unwrap_or(false),
		block_time_ms: network.block_time_ms.unwrap_or(12_000),
		contracts: network.contracts.clone(),
		tokens: network.tokens.clone(),
	})
}

/// Parse a TOML string into a validated Config.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("CRELINK_TEST_HOST", "localhost");
		std::env::set_var("CRELINK_TEST_PORT", "8545");

		let input = "url = \"http://${CRELINK_TEST_HOST}:${CRELINK_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "url = \"http://localhost:8545\"");

		std::env::remove_var("CRELINK_TEST_HOST");
		std::env::remove_var("CRELINK_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${CRELINK_MISSING_VAR:-fallback}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"fallback\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${CRELINK_MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("CRELINK_MISSING_VAR"));
	}

	#[test]
	fn test_empty_config_uses_defaults() {
		let config: Config = "".parse().unwrap();
		assert_eq!(config.wallet.default_chain_id, 1000);
		assert_eq!(config.storage.primary, "memory");
		assert_eq!(config.switch.history_size, 50);
		assert!(config.switch.auto_switch);
		assert!(!config.switch.force_confirmation);
		assert_eq!(config.gas.gas_limit_padding_percent, 10);
		assert_eq!(config.bridge.expiry_seconds, 3600);
	}

	#[test]
	fn test_network_overrides_and_new_chain() {
		let config: Config = r#"
[wallet]
default_chain_id = 777

[networks.1000]
rpc_url = "https://rpc.internal.catena"
[networks.1000.contracts]
lock_mint_bridge = "0x5fbdb2315678afecb367f032d93f642f64180aa3"

[networks.777]
name = "Devnet"
rpc_url = "http://localhost:8545"
is_testnet = true
[[networks.777.tokens]]
address = "0xabcdef1234567890abcdef1234567890abcdef12"
symbol = "TST"
name = "Test Token"
decimals = 6
"#
		.parse()
		.unwrap();

		let registry = config.chain_registry().unwrap();
		let catena = registry.get(1000).unwrap();
		assert_eq!(catena.rpc_url, "https://rpc.internal.catena");
		assert_eq!(catena.name, "Catena Mainnet");
		assert!(catena.contract("lock_mint_bridge").is_some());

		let devnet = registry.get(777).unwrap();
		assert_eq!(devnet.name, "Devnet");
		assert!(devnet.is_testnet);
		assert_eq!(devnet.tokens.len(), 1);
		assert_eq!(devnet.native_currency.symbol, "ETH");
	}

	#[test]
	fn test_unknown_chain_requires_rpc_url() {
		let result = r#"
[networks.777]
name = "Devnet"
"#
		.parse::<Config>();
		assert!(result.unwrap_err().to_string().contains("rpc_url"));
	}

	#[test]
	fn test_unsupported_default_chain() {
		let result = "[wallet]\ndefault_chain_id = 31337".parse::<Config>();
		assert!(result.unwrap_err().to_string().contains("not supported"));
	}

	#[test]
	fn test_optimization_layers_merge() {
		let config: Config = r#"
[optimization.defaults]
request_timeout_ms = 10000
max_retries = 3

[optimization.chains.42161]
request_timeout_ms = 4000
block_polling_interval_ms = 1000
"#
		.parse()
		.unwrap();

		let arbitrum = config.optimization_for(42161);
		assert_eq!(arbitrum.request_timeout_ms, Some(4000));
		assert_eq!(arbitrum.max_retries, Some(3));
		assert_eq!(arbitrum.block_polling_interval_ms, Some(1000));

		let ethereum = config.optimization_for(1);
		assert_eq!(ethereum.request_timeout_ms, Some(10000));
		assert_eq!(ethereum.block_polling_interval_ms, None);
	}

	#[test]
	fn test_invalid_values_rejected() {
		assert!("[switch]\nhistory_size = 0".parse::<Config>().is_err());
		assert!("[gas]\nspeed_up_percent = 0".parse::<Config>().is_err());
		assert!("[optimization.defaults]\nmin_gas_price = 10\nmax_gas_price = 5"
			.parse::<Config>()
			.is_err());
		assert!("[storage]\nprimary = \"file\"".parse::<Config>().is_err());
		assert!("[bridge]\norder = [\"missing\"]".parse::<Config>().is_err());
	}

	#[test]
	fn test_bridge_registration_order() {
		let config: Config = r#"
[bridge]
order = ["lock_mint"]
[bridge.implementations.lock_mint]
[bridge.implementations.arbitrum]
[bridge.implementations.zeta]
"#
		.parse()
		.unwrap();
		let names: Vec<_> = config
			.bridge
			.ordered_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["lock_mint", "arbitrum", "zeta"]);
	}
}
