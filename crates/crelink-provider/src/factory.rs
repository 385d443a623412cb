//! Shared provider instances.
//!
//! The factory creates at most one provider per chain and kind. Enhanced
//! providers wrap the chain's base provider, so both kinds share one
//! connection and one block poller.

use crate::cache::RpcCache;
use crate::chain::ChainProvider;
use crate::enhanced::EnhancedProvider;
use crate::interface::ProviderInterface;
use crate::optimization::{OptimizationManager, OptimizationProfile};
use crate::transport::{HttpTransport, RpcTransport};
use crate::ProviderError;
use crelink_types::{ChainDescriptor, ChainRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
	/// Plain JSON-RPC provider.
	Base,
	/// Base provider wrapped with caching, coalescing and retries.
	Enhanced,
}

/// Builds the transport for a chain.
pub type TransportBuilder = Arc<
	dyn Fn(&ChainDescriptor, &OptimizationProfile) -> Result<Arc<dyn RpcTransport>, ProviderError>
		+ Send
		+ Sync,
>;

fn http_transport(
	descriptor: &ChainDescriptor,
	profile: &OptimizationProfile,
) -> Result<Arc<dyn RpcTransport>, ProviderError> {
	let transport = HttpTransport::new(descriptor.rpc_url.clone(), profile.request_timeout())?;
	Ok(Arc::new(transport))
}

pub struct ProviderFactory {
	registry: ChainRegistry,
	optimization: Arc<OptimizationManager>,
	cache: Arc<RpcCache>,
	transport_builder: TransportBuilder,
	providers: Mutex<HashMap<(u64, ProviderKind), Arc<dyn ProviderInterface>>>,
}

impl ProviderFactory {
	/// Creates a factory that connects over HTTP to each chain's `rpc_url`.
	pub fn new(
		registry: ChainRegistry,
		optimization: Arc<OptimizationManager>,
		cache: Arc<RpcCache>,
	) -> Self {
		Self {
			registry,
			optimization,
			cache,
			transport_builder: Arc::new(http_transport),
			providers: Mutex::new(HashMap::new()),
		}
	}

	pub fn with_transport_builder(mut self, builder: TransportBuilder) -> Self {
		self.transport_builder = builder;
		self
	}

	pub fn registry(&self) -> &ChainRegistry {
		&self.registry
	}

	pub fn optimization(&self) -> &Arc<OptimizationManager> {
		&self.optimization
	}

	pub fn cache(&self) -> &Arc<RpcCache> {
		&self.cache
	}

	fn providers(&self) -> MutexGuard<'_, HashMap<(u64, ProviderKind), Arc<dyn ProviderInterface>>> {
		match self.providers.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		}
	}

	/// Returns the shared provider for a chain, creating it on first use.
	pub fn get_provider(
		&self,
		chain_id: u64,
		kind: ProviderKind,
	) -> Result<Arc<dyn ProviderInterface>, ProviderError> {
		if let Some(provider) = self.providers().get(&(chain_id, kind)) {
			return Ok(provider.clone());
		}

		let descriptor = self
			.registry
			.get(chain_id)
			.ok_or(ProviderError::UnsupportedChain(chain_id))?;
		let profile = self.optimization.profile(descriptor);

		let provider: Arc<dyn ProviderInterface> = match kind {
			ProviderKind::Base => {
				let transport = (self.transport_builder)(descriptor, &profile)?;
				Arc::new(
					ChainProvider::new(descriptor.clone(), transport)
						.with_block_polling(Some(profile.block_polling_interval())),
				)
			},
			ProviderKind::Enhanced => {
				let base = self.get_provider(chain_id, ProviderKind::Base)?;
				Arc::new(EnhancedProvider::new(base, profile).with_cache(self.cache.clone()))
			},
		};
		tracing::debug!(chain_id, kind = ?kind, "Created provider");

		Ok(self
			.providers()
			.entry((chain_id, kind))
			.or_insert(provider)
			.clone())
	}

	/// Enhanced provider for a chain.
	pub fn provider(&self, chain_id: u64) -> Result<Arc<dyn ProviderInterface>, ProviderError> {
		self.get_provider(chain_id, ProviderKind::Enhanced)
	}

	/// Chains and kinds with a live instance.
	pub fn active(&self) -> Vec<(u64, ProviderKind)> {
		let mut active: Vec<_> = self.providers().keys().copied().collect();
		active.sort_by_key(|(chain_id, kind)| (*chain_id, *kind as u8));
		active
	}

	/// Disconnects and forgets every provider.
	pub async fn disconnect_all(&self) {
		let providers: Vec<_> = self.providers().drain().collect();
		for ((chain_id, kind), provider) in providers {
			if let Err(e) = provider.disconnect().await {
				tracing::warn!(chain_id, kind = ?kind, error = %e, "Failed to disconnect provider");
			}
		}
	}
}
