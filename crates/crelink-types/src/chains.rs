//! Chain registry for the networks the wallet can talk to.
//!
//! The builtin table is immutable and keyed by EIP-155 chain id. A
//! [`ChainRegistry`] instance starts from that table and accepts
//! configuration overrides (RPC endpoints, contract addresses, token lists)
//! before it is shared with the rest of the engine.

use crate::validation::ValidationError;
use crate::utils::without_0x_prefix;
use alloy_primitives::{address, Address};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Capabilities a chain may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFeature {
	/// Blocks carry a base fee and type-2 transactions are accepted.
	Eip1559,
	/// ERC-20 token contracts are available.
	Erc20,
	/// At least one bridge route starts or ends on this chain.
	Bridge,
	/// DID registry contracts are deployed.
	Did,
	/// Multicall3 is deployed at its canonical address.
	Multicall,
}

/// Native currency metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
	pub name: String,
	pub symbol: String,
	pub decimals: u8,
}

/// ERC-20 token known to the wallet on a given chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenInfo {
	pub address: Address,
	pub symbol: String,
	pub name: String,
	pub decimals: u8,
}

/// Immutable description of a supported chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
	pub chain_id: u64,
	pub name: String,
	pub rpc_url: String,
	pub explorer_url: String,
	pub native_currency: NativeCurrency,
	pub features: BTreeSet<ChainFeature>,
	pub is_testnet: bool,
	/// Average block time in milliseconds, used to derive polling intervals.
	pub block_time_ms: u64,
	/// Well-known contract addresses keyed by role (e.g. `multicall3`).
	#[serde(default)]
	pub contracts: BTreeMap<String, Address>,
	/// ERC-20 tokens listed for this chain.
	#[serde(default)]
	pub tokens: Vec<TokenInfo>,
}

impl ChainDescriptor {
	/// Returns true if the chain advertises the given feature.
	pub fn has_feature(&self, feature: ChainFeature) -> bool {
		self.features.contains(&feature)
	}

	/// Looks up a contract address by role.
	pub fn contract(&self, role: &str) -> Option<Address> {
		self.contracts.get(role).copied()
	}

	/// Builds an explorer link for a transaction hash.
	pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
		format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
	}
}

const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

fn currency(name: &str, symbol: &str) -> NativeCurrency {
	NativeCurrency {
		name: name.to_string(),
		symbol: symbol.to_string(),
		decimals: 18,
	}
}

#[allow(clippy::too_many_arguments)]
fn descriptor(
	chain_id: u64,
	name: &str,
	rpc_url: &str,
	explorer_url: &str,
	native_currency: NativeCurrency,
	features: &[ChainFeature],
	is_testnet: bool,
	block_time_ms: u64,
	contracts: &[(&str, Address)],
) -> ChainDescriptor {
	ChainDescriptor {
		chain_id,
		name: name.to_string(),
		rpc_url: rpc_url.to_string(),
		explorer_url: explorer_url.to_string(),
		native_currency,
		features: features.iter().copied().collect(),
		is_testnet,
		block_time_ms,
		contracts: contracts
			.iter()
			.map(|(role, address)| (role.to_string(), *address))
			.collect(),
		tokens: Vec::new(),
	}
}

static BUILTIN_CHAINS: Lazy<Vec<ChainDescriptor>> = Lazy::new(|| {
	use ChainFeature::*;
	vec![
		descriptor(
			1000,
			"Catena Mainnet",
			"https://rpc.catena.network",
			"https://explorer.catena.network",
			currency("Catena", "CTA"),
			&[Erc20, Bridge, Did],
			false,
			12_000,
			&[],
		),
		descriptor(
			1001,
			"Catena Testnet",
			"https://testnet-rpc.catena.network",
			"https://testnet-explorer.catena.network",
			currency("Catena Test", "tCTA"),
			&[Erc20, Bridge, Did],
			true,
			12_000,
			&[],
		),
		descriptor(
			1,
			"Ethereum Mainnet",
			"https://eth.llamarpc.com",
			"https://etherscan.io",
			currency("Ether", "ETH"),
			&[Eip1559, Erc20, Bridge, Multicall],
			false,
			12_000,
			&[
				("multicall3", MULTICALL3),
				(
					"arbitrum_gateway_router",
					address!("72Ce9c846789fdB6fC1f34aC4AD25Dd9ef7031ef"),
				),
				(
					"arbitrum_outbox",
					address!("0B9857ae2D4A3DBe74ffE1d7DF045bb7F96E4840"),
				),
				(
					"arbitrum_inbox",
					address!("4Dbd4fc535Ac27206064B68FfCf827b0A60BAB3f"),
				),
			],
		),
		descriptor(
			11155111,
			"Sepolia",
			"https://rpc.sepolia.org",
			"https://sepolia.etherscan.io",
			currency("Sepolia Ether", "ETH"),
			&[Eip1559, Erc20, Bridge, Multicall],
			true,
			12_000,
			&[("multicall3", MULTICALL3)],
		),
		descriptor(
			42161,
			"Arbitrum One",
			"https://arb1.arbitrum.io/rpc",
			"https://arbiscan.io",
			currency("Ether", "ETH"),
			&[Eip1559, Erc20, Bridge, Multicall],
			false,
			250,
			&[
				("multicall3", MULTICALL3),
				(
					"arbitrum_gateway_router",
					address!("5288c571Fd7aD117beA99bF60FE0846C4E84F933"),
				),
				("arb_sys", address!("0000000000000000000000000000000000000064")),
			],
		),
		descriptor(
			421614,
			"Arbitrum Sepolia",
			"https://sepolia-rollup.arbitrum.io/rpc",
			"https://sepolia.arbiscan.io",
			currency("Sepolia Ether", "ETH"),
			&[Eip1559, Erc20, Bridge, Multicall],
			true,
			250,
			&[
				("multicall3", MULTICALL3),
				("arb_sys", address!("0000000000000000000000000000000000000064")),
			],
		),
		descriptor(
			137,
			"Polygon",
			"https://polygon-rpc.com",
			"https://polygonscan.com",
			currency("POL", "POL"),
			&[Eip1559, Erc20, Multicall],
			false,
			2_000,
			&[("multicall3", MULTICALL3)],
		),
		descriptor(
			10,
			"OP Mainnet",
			"https://mainnet.optimism.io",
			"https://optimistic.etherscan.io",
			currency("Ether", "ETH"),
			&[Eip1559, Erc20, Multicall],
			false,
			2_000,
			&[("multicall3", MULTICALL3)],
		),
		descriptor(
			56,
			"BNB Smart Chain",
			"https://bsc-dataseed.binance.org",
			"https://bscscan.com",
			currency("BNB", "BNB"),
			&[Erc20, Multicall],
			false,
			3_000,
			&[("multicall3", MULTICALL3)],
		),
	]
});

/// Returns the builtin descriptor for `chain_id`, or `None` if the chain is unknown.
pub fn get_network_info(chain_id: u64) -> Option<&'static ChainDescriptor> {
	BUILTIN_CHAINS.iter().find(|c| c.chain_id == chain_id)
}

/// Encodes a decimal chain id as a `0x`-prefixed lowercase hex string.
pub fn chain_id_to_hex(chain_id: u64) -> String {
	format!("{:#x}", chain_id)
}

/// Decodes a `0x`-prefixed (or bare) hex chain id.
pub fn hex_chain_id_to_number(hex_chain_id: &str) -> Result<u64, ValidationError> {
	let digits = without_0x_prefix(hex_chain_id.trim());
	if digits.is_empty() {
		return Err(ValidationError::InvalidHex(hex_chain_id.to_string()));
	}
	u64::from_str_radix(digits, 16).map_err(|_| ValidationError::InvalidHex(hex_chain_id.to_string()))
}

/// Mutable-at-startup registry of supported chains.
///
/// Built once from the builtin table plus configuration, then shared
/// read-only (behind an `Arc`) by providers, the switch engine and bridges.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
	chains: HashMap<u64, ChainDescriptor>,
}

impl ChainRegistry {
	/// Creates an empty registry.
	pub fn empty() -> Self {
		Self {
			chains: HashMap::new(),
		}
	}

	/// Creates a registry pre-populated with the builtin chains.
	pub fn with_builtin() -> Self {
		Self {
			chains: BUILTIN_CHAINS
				.iter()
				.map(|c| (c.chain_id, c.clone()))
				.collect(),
		}
	}

	/// Adds a new chain. Chain ids must be unique.
	pub fn register(&mut self, descriptor: ChainDescriptor) -> Result<(), ValidationError> {
		if self.chains.contains_key(&descriptor.chain_id) {
			return Err(ValidationError::InvalidValue {
				field: "chain_id".to_string(),
				message: format!("Chain {} is already registered", descriptor.chain_id),
			});
		}
		self.chains.insert(descriptor.chain_id, descriptor);
		Ok(())
	}

	/// Returns a mutable handle to an existing chain for applying overrides.
	pub fn get_mut(&mut self, chain_id: u64) -> Option<&mut ChainDescriptor> {
		self.chains.get_mut(&chain_id)
	}

	/// Looks up a chain by id.
	pub fn get(&self, chain_id: u64) -> Option<&ChainDescriptor> {
		self.chains.get(&chain_id)
	}

	/// Returns true if the chain id is registered.
	pub fn is_supported(&self, chain_id: u64) -> bool {
		self.chains.contains_key(&chain_id)
	}

	/// All registered chains ordered by chain id.
	pub fn all(&self) -> Vec<&ChainDescriptor> {
		let mut chains: Vec<_> = self.chains.values().collect();
		chains.sort_by_key(|c| c.chain_id);
		chains
	}

	/// All registered chain ids in ascending order.
	pub fn chain_ids(&self) -> Vec<u64> {
		self.all().into_iter().map(|c| c.chain_id).collect()
	}

	/// Finds a listed token on a chain by contract address.
	pub fn token(&self, chain_id: u64, address: &Address) -> Option<&TokenInfo> {
		self.get(chain_id)?
			.tokens
			.iter()
			.find(|t| &t.address == address)
	}
}

impl Default for ChainRegistry {
	fn default() -> Self {
		Self::with_builtin()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_catena_mainnet_is_registered() {
		let info = get_network_info(1000).unwrap();
		assert_eq!(info.name, "Catena Mainnet");
		assert_eq!(info.native_currency.symbol, "CTA");
		assert_eq!(info.native_currency.decimals, 18);
		assert!(!info.is_testnet);
	}

	#[test]
	fn test_lookup_is_idempotent() {
		for chain in BUILTIN_CHAINS.iter() {
			let first = get_network_info(chain.chain_id).unwrap();
			let second = get_network_info(chain.chain_id).unwrap();
			assert_eq!(first, second);
		}
		assert!(get_network_info(999_999).is_none());
	}

	#[test]
	fn test_builtin_chain_ids_are_unique() {
		let ids: BTreeSet<u64> = BUILTIN_CHAINS.iter().map(|c| c.chain_id).collect();
		assert_eq!(ids.len(), BUILTIN_CHAINS.len());
	}

	#[test]
	fn test_chain_id_hex_round_trip() {
		assert_eq!(chain_id_to_hex(1000), "0x3e8");
		assert_eq!(hex_chain_id_to_number("0x3e8").unwrap(), 1000);
		assert_eq!(hex_chain_id_to_number("0xA4B1").unwrap(), 42161);
		assert!(hex_chain_id_to_number("0x").is_err());
		assert!(hex_chain_id_to_number("0xzz").is_err());
	}

	#[test]
	fn test_registry_rejects_duplicates() {
		let mut registry = ChainRegistry::with_builtin();
		let duplicate = registry.get(1).unwrap().clone();
		assert!(registry.register(duplicate).is_err());

		let mut custom = registry.get(1000).unwrap().clone();
		custom.chain_id = 31337;
		custom.name = "Local".to_string();
		registry.register(custom).unwrap();
		assert!(registry.is_supported(31337));
		assert_eq!(registry.chain_ids().first(), Some(&1));
	}

	#[test]
	fn test_contract_lookup() {
		let eth = get_network_info(1).unwrap();
		assert_eq!(eth.contract("multicall3"), Some(MULTICALL3));
		assert!(eth.has_feature(ChainFeature::Eip1559));
		assert!(eth.contract("missing").is_none());
		assert_eq!(eth.explorer_tx_url("0xabc"), "https://etherscan.io/tx/0xabc");
	}
}
