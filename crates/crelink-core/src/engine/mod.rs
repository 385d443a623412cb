//! The wallet engine exposed to the UI and message layer.
//!
//! Every component is constructed once by the builder and shared through
//! `Arc`s; the engine only routes calls and owns the background tasks.

pub mod tokens;

use crate::WalletError;
use alloy_primitives::{Address, B256, U256};
use crelink_bridge::BridgeOrchestrator;
use crelink_config::Config;
use crelink_delivery::TransactionOrchestrator;
use crelink_gas::GasPolicyEngine;
use crelink_provider::{ProviderFactory, ProviderInterface};
use crelink_storage::StorageService;
use crelink_switch::ChainSwitchEngine;
use crelink_types::{
	BlockTag, BridgeQuote, BridgeRequest, BridgeTransaction, ChainDescriptor, ChainPair,
	ChainRegistry, ChainSwitchContext, ChainSwitchResult, FeeEstimate, GasInfo, GasSpeed,
	PendingTransaction, SessionId, TokenInfo, TransactionRequest,
};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokens::TokenRegistry;

/// Counts of records loaded by [`WalletEngine::restore_state`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoredState {
	pub optimization_profiles: usize,
	pub cache_entries: usize,
	pub transactions: usize,
}

pub struct WalletEngine {
	config: Config,
	storage: Arc<StorageService>,
	providers: Arc<ProviderFactory>,
	gas: Arc<GasPolicyEngine>,
	switch: Arc<ChainSwitchEngine>,
	transactions: Arc<TransactionOrchestrator>,
	bridge: Arc<BridgeOrchestrator>,
	tokens: TokenRegistry,
	tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WalletEngine {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		providers: Arc<ProviderFactory>,
		gas: Arc<GasPolicyEngine>,
		switch: Arc<ChainSwitchEngine>,
		transactions: Arc<TransactionOrchestrator>,
		bridge: Arc<BridgeOrchestrator>,
	) -> Self {
		let tokens = TokenRegistry::from_registry(providers.registry());
		Self {
			config,
			storage,
			providers,
			gas,
			switch,
			transactions,
			bridge,
			tokens,
			tasks: Mutex::new(Vec::new()),
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn providers(&self) -> &Arc<ProviderFactory> {
		&self.providers
	}

	pub fn gas(&self) -> &Arc<GasPolicyEngine> {
		&self.gas
	}

	pub fn switch(&self) -> &Arc<ChainSwitchEngine> {
		&self.switch
	}

	pub fn transactions(&self) -> &Arc<TransactionOrchestrator> {
		&self.transactions
	}

	pub fn bridge(&self) -> &Arc<BridgeOrchestrator> {
		&self.bridge
	}

	pub fn tokens(&self) -> &TokenRegistry {
		&self.tokens
	}

	pub fn registry(&self) -> &ChainRegistry {
		self.providers.registry()
	}

	fn tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
		match self.tasks.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		}
	}

	fn descriptor(&self, chain_id: u64) -> Result<&ChainDescriptor, WalletError> {
		self.registry()
			.get(chain_id)
			.ok_or(WalletError::UnsupportedChain(chain_id))
	}

	/// Shared provider for a supported chain.
	pub fn provider(&self, chain_id: u64) -> Result<Arc<dyn ProviderInterface>, WalletError> {
		self.descriptor(chain_id)?;
		Ok(self.providers.provider(chain_id)?)
	}

	/// Loads persisted optimization profiles, cache entries and tracked
	/// transactions.
	pub async fn restore_state(&self) -> Result<RestoredState, WalletError> {
		let restored = RestoredState {
			optimization_profiles: self.providers.optimization().load(&self.storage).await?,
			cache_entries: self.providers.cache().restore(&self.storage).await?,
			transactions: self.transactions.restore(&self.storage).await?,
		};
		tracing::info!(
			profiles = restored.optimization_profiles,
			cache_entries = restored.cache_entries,
			transactions = restored.transactions,
			"Restored wallet state"
		);
		Ok(restored)
	}

	pub async fn persist_state(&self) -> Result<(), WalletError> {
		self.providers.optimization().persist(&self.storage).await?;
		self.providers.cache().persist(&self.storage).await?;
		self.transactions.persist(&self.storage).await?;
		Ok(())
	}

	/// Starts the cache sweep, the storage cleanup loop and the bridge
	/// monitor. Calling it again replaces nothing; tasks accumulate.
	pub fn start(&self) {
		let mut tasks = self.tasks();
		tasks.push(self.providers.cache().spawn_sweeper());
		tasks.push(self.bridge.spawn_monitor());

		let storage = Arc::downgrade(&self.storage);
		let interval = Duration::from_secs(self.config.storage.cleanup_interval_seconds.max(1));
		tasks.push(tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.tick().await;
			loop {
				ticker.tick().await;
				let Some(storage) = storage.upgrade() else {
					break;
				};
				match storage.cleanup_expired().await {
					Ok(count) if count > 0 => {
						tracing::debug!(removed = count, "Storage cleanup removed expired entries");
					},
					Err(e) => tracing::warn!(error = %e, "Storage cleanup failed"),
					_ => {},
				}
			}
		}));
		tracing::info!(tasks = tasks.len(), "Started wallet engine");
	}

	/// Stops background work, persists state and disconnects providers.
	pub async fn shutdown(&self) {
		tracing::info!("Shutting down wallet engine");
		for task in self.tasks().drain(..) {
			task.abort();
		}
		self.transactions.shutdown();
		if let Err(e) = self.persist_state().await {
			tracing::warn!(error = %e, "Failed to persist wallet state");
		}
		self.providers.disconnect_all().await;
	}

	pub fn get_supported_chains(&self) -> Vec<ChainDescriptor> {
		self.registry().all().into_iter().cloned().collect()
	}

	pub fn get_supported_tokens(&self, chain_id: u64) -> Result<Vec<TokenInfo>, WalletError> {
		self.tokens
			.supported_tokens(chain_id)
			.map(<[TokenInfo]>::to_vec)
			.ok_or(WalletError::UnsupportedChain(chain_id))
	}

	pub fn get_selected_network(&self, session: &SessionId) -> Result<ChainDescriptor, WalletError> {
		let chain_id = self.switch.current_chain_id(session);
		self.descriptor(chain_id).cloned()
	}

	/// Switches a session on the user's behalf.
	pub fn select_network(
		&self,
		chain_id: u64,
		context: &ChainSwitchContext,
	) -> Result<ChainSwitchResult, WalletError> {
		self.descriptor(chain_id)?;
		let result = self.switch.switch_chain(chain_id, context);
		match result.error.clone() {
			Some(reason) if !result.success => Err(WalletError::SwitchFailed { chain_id, reason }),
			_ => Ok(result),
		}
	}

	pub fn switch_history(&self, session: Option<&SessionId>) -> Vec<ChainSwitchResult> {
		self.switch.history(session)
	}

	/// Native balance, or the ERC-20 balance of `token`.
	pub async fn get_balance(
		&self,
		chain_id: u64,
		address: Address,
		token: Option<Address>,
	) -> Result<U256, WalletError> {
		let provider = self.provider(chain_id)?;
		match token.filter(|t| !t.is_zero()) {
			Some(token) => Ok(provider.get_token_balance(token, address).await?),
			None => Ok(provider.get_balance(address, BlockTag::Latest).await?),
		}
	}

	pub async fn get_gas_info(&self, chain_id: u64) -> Result<GasInfo, WalletError> {
		let provider = self.provider(chain_id)?;
		Ok(self.gas.get_gas_info(provider.as_ref()).await?)
	}

	pub async fn estimate_fee(
		&self,
		chain_id: u64,
		request: &TransactionRequest,
	) -> Result<Vec<FeeEstimate>, WalletError> {
		self.descriptor(chain_id)?;
		Ok(self.transactions.estimate_fee(chain_id, request).await?)
	}

	/// Sends a dApp or wallet transaction.
	///
	/// The session follows the transaction to its chain first when automatic
	/// switching is enabled; a refused switch aborts the send. The request is
	/// sent on its explicit chain id, else on the session's chain.
	#[tracing::instrument(skip(self, request, context), fields(session = %context.session))]
	pub async fn sign_and_send_transaction(
		&self,
		request: TransactionRequest,
		speed: GasSpeed,
		context: &ChainSwitchContext,
	) -> Result<PendingTransaction, WalletError> {
		if let Some(result) = self.switch.auto_switch_chain(&request, context).await {
			if !result.success {
				return Err(WalletError::SwitchFailed {
					chain_id: result.chain_id,
					reason: result.error.unwrap_or_default(),
				});
			}
		}
		let chain_id = request
			.chain_id
			.unwrap_or_else(|| self.switch.current_chain_id(&context.session));
		self.descriptor(chain_id)?;
		Ok(self.transactions.send(chain_id, request, speed).await?)
	}

	pub async fn speed_up_transaction(&self, hash: B256) -> Result<PendingTransaction, WalletError> {
		Ok(self.transactions.speed_up(hash).await?)
	}

	pub async fn cancel_transaction(&self, hash: B256) -> Result<PendingTransaction, WalletError> {
		Ok(self.transactions.cancel(hash).await?)
	}

	pub fn bridge_pairs(&self) -> Vec<ChainPair> {
		self.bridge.supported_pairs()
	}

	pub async fn get_bridge_quotes(&self, request: &BridgeRequest) -> Result<Vec<BridgeQuote>, WalletError> {
		Ok(self.bridge.compare_quotes(request).await?)
	}

	/// Creates a transfer with the pair's active provider, or with
	/// `provider` when one is named.
	pub async fn create_bridge_transaction(
		&self,
		request: BridgeRequest,
		provider: Option<&str>,
	) -> Result<BridgeTransaction, WalletError> {
		let tx = match provider {
			Some(name) => self.bridge.create_transaction_with(name, request).await?,
			None => self.bridge.create_transaction(request).await?,
		};
		Ok(tx)
	}

	pub async fn execute_bridge_transaction(&self, id: &str) -> Result<BridgeTransaction, WalletError> {
		Ok(self.bridge.execute_transaction(id).await?)
	}

	pub async fn confirm_bridge_transaction(&self, id: &str) -> Result<BridgeTransaction, WalletError> {
		Ok(self.bridge.confirm_transaction(id).await?)
	}

	pub async fn cancel_bridge_transaction(&self, id: &str) -> Result<BridgeTransaction, WalletError> {
		Ok(self.bridge.cancel_transaction(id).await?)
	}

	pub async fn get_bridge_transaction_status(
		&self,
		id: &str,
	) -> Result<BridgeTransaction, WalletError> {
		Ok(self.bridge.get_transaction_status(id).await?)
	}

	pub async fn get_transactions_by_account(&self, account: Address) -> Vec<BridgeTransaction> {
		self.bridge.get_transactions_by_account(account).await
	}

	pub async fn get_bridge_history(&self, account: Address) -> Vec<BridgeTransaction> {
		self.bridge.get_transaction_history(account).await
	}

	pub async fn approve_bridge_token(
		&self,
		pair: ChainPair,
		token: Address,
		owner: Address,
		amount: U256,
	) -> Result<B256, WalletError> {
		Ok(self.bridge.approve_token(pair, token, owner, amount).await?)
	}
}
