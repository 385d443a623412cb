//! Builder for constructing wallet engines.
//!
//! Composes a [`WalletEngine`] from configuration: the storage backend and
//! bridge implementations are picked by name from factory tables, which
//! default to every implementation shipped with the workspace.

use crate::{WalletEngine, WatchOnlySigner};
use crelink_bridge::{BridgeContext, BridgeFactory, BridgeOrchestrator};
use crelink_config::Config;
use crelink_delivery::{SignerInterface, TransactionOrchestrator};
use crelink_gas::GasPolicyEngine;
use crelink_provider::{OptimizationManager, ProviderFactory, RpcCache, TransportBuilder};
use crelink_storage::{StorageFactory, StorageService};
use crelink_switch::ChainSwitchEngine;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_CACHE_TTL_MS: u64 = 30_000;
const DEFAULT_CACHE_MAX_SIZE: usize = 1_000;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

pub struct WalletBuilder {
	config: Config,
	signer: Option<Arc<dyn SignerInterface>>,
	transport_builder: Option<TransportBuilder>,
	storage_factories: HashMap<String, StorageFactory>,
	bridge_factories: HashMap<String, BridgeFactory>,
}

impl WalletBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			signer: None,
			transport_builder: None,
			storage_factories: crelink_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			bridge_factories: crelink_bridge::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	/// The wallet controller's signer. Without one the engine can read but
	/// not sign.
	pub fn with_signer(mut self, signer: Arc<dyn SignerInterface>) -> Self {
		self.signer = Some(signer);
		self
	}

	/// Replaces the HTTP JSON-RPC transport for every chain.
	pub fn with_transport_builder(mut self, builder: TransportBuilder) -> Self {
		self.transport_builder = Some(builder);
		self
	}

	pub fn with_storage_factory(mut self, name: impl Into<String>, factory: StorageFactory) -> Self {
		self.storage_factories.insert(name.into(), factory);
		self
	}

	pub fn with_bridge_factory(mut self, name: impl Into<String>, factory: BridgeFactory) -> Self {
		self.bridge_factories.insert(name.into(), factory);
		self
	}

	pub async fn build(self) -> Result<WalletEngine, BuilderError> {
		let config = self.config;

		// Storage
		let primary = &config.storage.primary;
		let storage_config = config.storage.implementations.get(primary).ok_or_else(|| {
			BuilderError::Config(format!("Primary storage '{}' has no configuration", primary))
		})?;
		let factory = self.storage_factories.get(primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("storage implementation '{}'", primary))
		})?;
		let backend = factory(storage_config).map_err(|e| {
			tracing::error!(
				component = "storage",
				implementation = %primary,
				error = %e,
				"Failed to create storage implementation"
			);
			BuilderError::Config(format!(
				"Failed to create storage implementation '{}': {}",
				primary, e
			))
		})?;
		let storage = Arc::new(StorageService::new(backend));
		tracing::info!(component = "storage", implementation = %primary, "Loaded");

		// Chains and providers
		let registry = config
			.chain_registry()
			.map_err(|e| BuilderError::Config(e.to_string()))?;
		let default_chain_id = config.wallet.default_chain_id;
		if !registry.is_supported(default_chain_id) {
			return Err(BuilderError::Config(format!(
				"Default chain {} is not supported",
				default_chain_id
			)));
		}

		let defaults = &config.optimization.defaults;
		let cache = Arc::new(RpcCache::new(
			Duration::from_millis(defaults.cache_ttl_ms.unwrap_or(DEFAULT_CACHE_TTL_MS)),
			defaults.cache_max_size.unwrap_or(DEFAULT_CACHE_MAX_SIZE),
		));
		let optimization = Arc::new(OptimizationManager::new(config.optimization.clone()));
		let mut providers = ProviderFactory::new(registry.clone(), optimization.clone(), cache);
		if let Some(builder) = self.transport_builder {
			providers = providers.with_transport_builder(builder);
		}
		let providers = Arc::new(providers);
		tracing::info!(
			component = "provider",
			chains = registry.chain_ids().len(),
			"Loaded"
		);

		let gas = Arc::new(GasPolicyEngine::new(config.gas.clone(), optimization));
		let switch = Arc::new(ChainSwitchEngine::new(
			registry,
			config.switch.clone(),
			default_chain_id,
		));

		let signer = self
			.signer
			.unwrap_or_else(|| Arc::new(WatchOnlySigner::new(config.wallet.account)));
		let transactions = Arc::new(TransactionOrchestrator::new(
			providers.clone(),
			gas.clone(),
			signer,
		));

		// Bridges, in configured order so the first registered wins a pair.
		let bridge = Arc::new(BridgeOrchestrator::new(config.bridge.clone(), storage.clone()));
		let context = BridgeContext {
			providers: providers.clone(),
			gas: gas.clone(),
			transactions: transactions.clone(),
		};
		for (name, bridge_config) in config.bridge.ordered_implementations() {
			let factory = self.bridge_factories.get(name).ok_or_else(|| {
				BuilderError::MissingComponent(format!("bridge implementation '{}'", name))
			})?;
			bridge
				.register_implementation(name, bridge_config, *factory, context.clone())
				.map_err(|e| {
					tracing::error!(
						component = "bridge",
						implementation = %name,
						error = %e,
						"Failed to register bridge implementation"
					);
					BuilderError::Config(format!(
						"Failed to register bridge implementation '{}': {}",
						name, e
					))
				})?;
			tracing::info!(component = "bridge", implementation = %name, "Loaded");
		}

		Ok(WalletEngine::new(
			config,
			storage,
			providers,
			gas,
			switch,
			transactions,
			bridge,
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::build;

	async fn build_err(config: &str) -> BuilderError {
		let config: Config = config.parse().unwrap();
		match WalletBuilder::new(config).build().await {
			Ok(_) => panic!("expected a builder error"),
			Err(e) => e,
		}
	}

	#[tokio::test]
	async fn test_empty_config_builds_catena_wallet() {
		let wallet = build("").await;
		let selected = wallet
			.engine
			.get_selected_network(&Default::default())
			.unwrap();
		assert_eq!(selected.chain_id, 1000);
		assert!(wallet.engine.bridge_pairs().is_empty());
	}

	#[tokio::test]
	async fn test_unknown_bridge_implementation_fails() {
		let err = build_err(
			r#"
			[bridge.implementations.wormhole]
			pairs = ["1-1000"]
			"#,
		)
		.await;
		assert!(matches!(err, BuilderError::MissingComponent(_)));
	}

	#[tokio::test]
	async fn test_bridge_tables_are_validated() {
		let err = build_err(
			r#"
			[bridge.implementations.lock_mint]
			pairs = ["1000-1"]
			"#,
		)
		.await;
		assert!(matches!(err, BuilderError::Config(_)));
	}

	#[tokio::test]
	async fn test_bridges_register_in_configured_order() {
		let wallet = build(
			r#"
			[bridge]
			order = ["arbitrum"]

			[bridge.implementations.arbitrum]
			pairs = ["1-42161", "42161-1"]
			"#,
		)
		.await;
		assert_eq!(wallet.engine.bridge().provider_names(), vec!["arbitrum"]);
		assert_eq!(wallet.engine.bridge_pairs().len(), 2);
	}

	#[tokio::test]
	async fn test_file_storage_is_selectable() {
		let dir = tempfile::tempdir().unwrap();
		let config = format!(
			r#"
			[storage]
			primary = "file"

			[storage.implementations.file]
			storage_path = "{}"
			"#,
			dir.path().display()
		);
		let wallet = build(&config).await;
		wallet.engine.persist_state().await.unwrap();
	}
}
