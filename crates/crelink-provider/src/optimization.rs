//! Per-chain provider tunables.
//!
//! A profile starts from values derived from the chain's block time, then
//! configured overrides are applied on top. Profiles can be replaced at
//! runtime; the last write wins and providers created afterwards pick up
//! the new values.

use alloy_primitives::U256;
use crelink_config::{OptimizationConfig, OptimizationSettings};
use crelink_storage::{StorageError, StorageService};
use crelink_types::{ChainDescriptor, StorageKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

const GWEI: u64 = 1_000_000_000;

/// Tunables for one chain. Durations are in milliseconds, gas bounds in wei.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationProfile {
	pub chain_id: u64,
	pub request_timeout_ms: u64,
	pub max_retries: u32,
	pub retry_delay_ms: u64,
	pub block_polling_interval_ms: u64,
	pub transaction_polling_interval_ms: u64,
	pub enable_cache: bool,
	pub cache_ttl_ms: u64,
	pub cache_max_size: usize,
	pub min_gas_price: U256,
	pub max_gas_price: Option<U256>,
}

/// Minimum legacy gas price accepted by a chain's nodes.
fn min_gas_price_for(chain_id: u64) -> U256 {
	let wei = match chain_id {
		137 => 30 * GWEI,
		56 => 3 * GWEI,
		1000 | 1001 => GWEI,
		_ => GWEI / 10,
	};
	U256::from(wei)
}

impl OptimizationProfile {
	/// Defaults derived from the chain's block time.
	pub fn for_chain(descriptor: &ChainDescriptor) -> Self {
		let block_time = descriptor.block_time_ms;
		Self {
			chain_id: descriptor.chain_id,
			request_timeout_ms: 30_000,
			max_retries: 3,
			retry_delay_ms: 1_000,
			block_polling_interval_ms: block_time.max(1_000),
			transaction_polling_interval_ms: (block_time / 2).clamp(1_000, 5_000),
			enable_cache: true,
			cache_ttl_ms: 30_000,
			cache_max_size: 1_000,
			min_gas_price: min_gas_price_for(descriptor.chain_id),
			max_gas_price: None,
		}
	}

	/// Replaces every field that `settings` sets.
	pub fn apply(mut self, settings: &OptimizationSettings) -> Self {
		if let Some(v) = settings.request_timeout_ms {
			self.request_timeout_ms = v;
		}
		if let Some(v) = settings.max_retries {
			self.max_retries = v;
		}
		if let Some(v) = settings.retry_delay_ms {
			self.retry_delay_ms = v;
		}
		if let Some(v) = settings.block_polling_interval_ms {
			self.block_polling_interval_ms = v;
		}
		if let Some(v) = settings.transaction_polling_interval_ms {
			self.transaction_polling_interval_ms = v;
		}
		if let Some(v) = settings.enable_cache {
			self.enable_cache = v;
		}
		if let Some(v) = settings.cache_ttl_ms {
			self.cache_ttl_ms = v;
		}
		if let Some(v) = settings.cache_max_size {
			self.cache_max_size = v;
		}
		if let Some(v) = settings.min_gas_price {
			self.min_gas_price = U256::from(v);
		}
		if let Some(v) = settings.max_gas_price {
			self.max_gas_price = Some(U256::from(v));
		}
		self
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.request_timeout_ms)
	}

	pub fn retry_delay(&self) -> Duration {
		Duration::from_millis(self.retry_delay_ms)
	}

	pub fn block_polling_interval(&self) -> Duration {
		Duration::from_millis(self.block_polling_interval_ms)
	}

	pub fn transaction_polling_interval(&self) -> Duration {
		Duration::from_millis(self.transaction_polling_interval_ms)
	}

	pub fn cache_ttl(&self) -> Duration {
		Duration::from_millis(self.cache_ttl_ms)
	}

	/// Delay before retry number `attempt` (0-based): `retry_delay * 1.5^attempt`.
	pub fn backoff(&self, attempt: u32) -> Duration {
		self.retry_delay().mul_f64(1.5f64.powi(attempt as i32))
	}
}

const PROFILES_ID: &str = "profiles";

/// Owns the live profile of every chain.
pub struct OptimizationManager {
	overrides: OptimizationConfig,
	profiles: RwLock<HashMap<u64, OptimizationProfile>>,
}

impl OptimizationManager {
	pub fn new(overrides: OptimizationConfig) -> Self {
		Self {
			overrides,
			profiles: RwLock::new(HashMap::new()),
		}
	}

	fn settings_for(&self, chain_id: u64) -> OptimizationSettings {
		match self.overrides.chains.get(&chain_id) {
			Some(chain) => self.overrides.defaults.merge(chain),
			None => self.overrides.defaults.clone(),
		}
	}

	/// Current profile of a chain, derived and stored on first use.
	pub fn profile(&self, descriptor: &ChainDescriptor) -> OptimizationProfile {
		if let Some(profile) = self.get(descriptor.chain_id) {
			return profile;
		}
		let profile = OptimizationProfile::for_chain(descriptor)
			.apply(&self.settings_for(descriptor.chain_id));
		let mut profiles = match self.profiles.write() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		profiles
			.entry(descriptor.chain_id)
			.or_insert(profile)
			.clone()
	}

	pub fn get(&self, chain_id: u64) -> Option<OptimizationProfile> {
		let profiles = match self.profiles.read() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		profiles.get(&chain_id).cloned()
	}

	/// Minimum and maximum gas price of a chain, whether or not its profile
	/// has been derived yet.
	pub fn gas_bounds(&self, chain_id: u64) -> (U256, Option<U256>) {
		if let Some(profile) = self.get(chain_id) {
			return (profile.min_gas_price, profile.max_gas_price);
		}
		let settings = self.settings_for(chain_id);
		let min = settings
			.min_gas_price
			.map(U256::from)
			.unwrap_or_else(|| min_gas_price_for(chain_id));
		(min, settings.max_gas_price.map(U256::from))
	}

	/// Replaces a chain's profile.
	pub fn update(&self, profile: OptimizationProfile) {
		tracing::debug!(chain_id = profile.chain_id, "Optimization profile updated");
		let mut profiles = match self.profiles.write() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		profiles.insert(profile.chain_id, profile);
	}

	pub async fn persist(&self, storage: &StorageService) -> Result<usize, StorageError> {
		let snapshot: HashMap<u64, OptimizationProfile> = match self.profiles.read() {
			Ok(guard) => guard.clone(),
			Err(poisoned) => poisoned.into_inner().clone(),
		};
		storage
			.store(StorageKey::Optimization, PROFILES_ID, &snapshot)
			.await?;
		Ok(snapshot.len())
	}

	/// Loads persisted profiles, replacing any held for the same chains.
	pub async fn load(&self, storage: &StorageService) -> Result<usize, StorageError> {
		let snapshot: Option<HashMap<u64, OptimizationProfile>> = storage
			.retrieve_optional(StorageKey::Optimization, PROFILES_ID)
			.await?;
		let Some(snapshot) = snapshot else {
			return Ok(0);
		};
		let count = snapshot.len();
		for profile in snapshot.into_values() {
			self.update(profile);
		}
		Ok(count)
	}
}

impl Default for OptimizationManager {
	fn default() -> Self {
		Self::new(OptimizationConfig::default())
	}
}
