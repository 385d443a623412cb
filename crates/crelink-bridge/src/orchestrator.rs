//! Provider selection and lifecycle of cross-chain transfers.
//!
//! Implementations are registered with the chain pairs they serve and
//! constructed on first use. For each pair the first registered provider
//! becomes the active one. Every transfer is kept in memory and written to
//! storage under its id, with a per-account index so history survives a
//! restart. Status lookups go to the owning provider at most once per cache
//! period and fall back to the last known record when the provider fails.
//! Settled transfers leave memory one cache period after their last update
//! and are read back from storage on demand.

use crate::state::can_transition;
use crate::{common, BridgeContext, BridgeError, BridgeFactory, BridgeProvider};
use alloy_primitives::{Address, B256, U256};
use crelink_config::BridgeConfig;
use crelink_storage::StorageService;
use crelink_types::{
	current_timestamp, truncate_id, BridgeAsset, BridgeEvent, BridgeQuote, BridgeRequest,
	BridgeStatus, BridgeStatusUpdate, BridgeTransaction, ChainPair, EventBus, StorageKey,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Builds a provider instance on first use.
pub type BridgeConstructor =
	Box<dyn Fn() -> Result<Arc<dyn BridgeProvider>, BridgeError> + Send + Sync>;

const EXPIRED: &str = "expired";

struct Registration {
	name: String,
	pairs: Vec<ChainPair>,
	construct: BridgeConstructor,
}

struct CachedTransfer {
	tx: BridgeTransaction,
	/// Last time the owning provider was asked for its status.
	refreshed_at: Option<Instant>,
	cached_at: Instant,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	match mutex.lock() {
		Ok(guard) => guard,
		Err(poisoned) => poisoned.into_inner(),
	}
}

pub struct BridgeOrchestrator {
	config: BridgeConfig,
	storage: Arc<StorageService>,
	registrations: RwLock<Vec<Registration>>,
	instances: Mutex<HashMap<String, Arc<dyn BridgeProvider>>>,
	active: Mutex<HashMap<ChainPair, Arc<dyn BridgeProvider>>>,
	transfers: RwLock<HashMap<String, CachedTransfer>>,
	/// Ids whose source leg is being submitted right now.
	submitting: Mutex<HashSet<String>>,
	index_lock: tokio::sync::Mutex<()>,
	events: EventBus<BridgeEvent>,
}

impl BridgeOrchestrator {
	pub fn new(config: BridgeConfig, storage: Arc<StorageService>) -> Self {
		Self {
			config,
			storage,
			registrations: RwLock::new(Vec::new()),
			instances: Mutex::new(HashMap::new()),
			active: Mutex::new(HashMap::new()),
			transfers: RwLock::new(HashMap::new()),
			submitting: Mutex::new(HashSet::new()),
			index_lock: tokio::sync::Mutex::new(()),
			events: EventBus::default(),
		}
	}

	pub fn events(&self) -> EventBus<BridgeEvent> {
		self.events.clone()
	}

	pub fn config(&self) -> &BridgeConfig {
		&self.config
	}

	/// Registers an implementation serving `pairs`. Construction is deferred
	/// until a transfer on one of them needs the provider.
	pub fn register(
		&self,
		name: impl Into<String>,
		pairs: Vec<ChainPair>,
		construct: BridgeConstructor,
	) -> Result<(), BridgeError> {
		let name = name.into();
		let mut registrations = match self.registrations.write() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		if registrations.iter().any(|r| r.name == name) {
			return Err(BridgeError::Configuration(format!(
				"Bridge '{}' is already registered",
				name
			)));
		}
		tracing::debug!(bridge = %name, pairs = pairs.len(), "Registered bridge provider");
		registrations.push(Registration {
			name,
			pairs,
			construct,
		});
		Ok(())
	}

	/// Registers a configured implementation after validating its table.
	pub fn register_implementation(
		&self,
		name: &str,
		config: &toml::Value,
		factory: BridgeFactory,
		context: BridgeContext,
	) -> Result<(), BridgeError> {
		if let Some(schema) = crate::config_schema(name) {
			schema.validate(config)?;
		}
		let pairs = common::parse_pairs(config)?;
		let config = config.clone();
		self.register(
			name,
			pairs,
			Box::new(move || factory(&config, &context).map(Arc::from)),
		)
	}

	/// Registers an already constructed provider.
	pub fn register_provider(&self, provider: Arc<dyn BridgeProvider>) -> Result<(), BridgeError> {
		let pairs = provider.supported_pairs().to_vec();
		let name = provider.name().to_string();
		self.register(name, pairs, Box::new(move || Ok(provider.clone())))
	}

	/// Registered implementation names in registration order.
	pub fn provider_names(&self) -> Vec<String> {
		self.with_registrations(|regs| regs.iter().map(|r| r.name.clone()).collect())
	}

	/// Every pair some registered implementation serves.
	pub fn supported_pairs(&self) -> Vec<ChainPair> {
		let mut pairs: Vec<ChainPair> = self.with_registrations(|regs| {
			regs.iter().flat_map(|r| r.pairs.iter().copied()).collect()
		});
		pairs.sort();
		pairs.dedup();
		pairs
	}

	fn with_registrations<R>(&self, f: impl FnOnce(&[Registration]) -> R) -> R {
		let registrations = match self.registrations.read() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		f(&registrations)
	}

	/// The named provider, constructing it on first use.
	pub fn provider(&self, name: &str) -> Result<Arc<dyn BridgeProvider>, BridgeError> {
		if let Some(provider) = lock(&self.instances).get(name) {
			return Ok(provider.clone());
		}
		let provider = self.with_registrations(|regs| {
			regs.iter()
				.find(|r| r.name == name)
				.map(|r| (r.construct)())
				.ok_or_else(|| BridgeError::Configuration(format!("Unknown bridge '{}'", name)))
		})??;
		tracing::info!(bridge = %name, "Initialized bridge provider");
		Ok(lock(&self.instances)
			.entry(name.to_string())
			.or_insert(provider)
			.clone())
	}

	/// Active provider for `pair`: the first registered one serving it.
	pub fn provider_for(&self, pair: ChainPair) -> Result<Arc<dyn BridgeProvider>, BridgeError> {
		if let Some(provider) = lock(&self.active).get(&pair) {
			return Ok(provider.clone());
		}
		let name = self
			.with_registrations(|regs| {
				regs.iter()
					.find(|r| r.pairs.contains(&pair))
					.map(|r| r.name.clone())
			})
			.ok_or(BridgeError::UnsupportedChainPair(pair))?;
		let provider = self.provider(&name)?;
		Ok(lock(&self.active).entry(pair).or_insert(provider).clone())
	}

	fn providers_serving(&self, pair: ChainPair) -> Vec<String> {
		self.with_registrations(|regs| {
			regs.iter()
				.filter(|r| r.pairs.contains(&pair))
				.map(|r| r.name.clone())
				.collect()
		})
	}

	pub async fn get_supported_assets(&self, pair: ChainPair) -> Result<Vec<BridgeAsset>, BridgeError> {
		self.provider_for(pair)?.get_supported_assets(pair).await
	}

	/// Quotes from every provider serving the request's pair, cheapest
	/// first. Providers that fail to quote are left out.
	pub async fn compare_quotes(&self, request: &BridgeRequest) -> Result<Vec<BridgeQuote>, BridgeError> {
		let pair = request.chain_pair();
		let names = self.providers_serving(pair);
		if names.is_empty() {
			return Err(BridgeError::UnsupportedChainPair(pair));
		}

		let providers: Vec<_> = names
			.iter()
			.filter_map(|name| match self.provider(name) {
				Ok(provider) => Some(provider),
				Err(e) => {
					tracing::warn!(bridge = %name, error = %e, "Skipping bridge provider");
					None
				},
			})
			.collect();
		let results =
			futures::future::join_all(providers.iter().map(|p| p.estimate_bridge_fee(request))).await;

		let mut quotes: Vec<BridgeQuote> = results
			.into_iter()
			.zip(&providers)
			.filter_map(|(result, provider)| match result {
				Ok(quote) => Some(quote),
				Err(e) => {
					tracing::warn!(bridge = %provider.name(), error = %e, "Quote failed");
					None
				},
			})
			.collect();
		quotes.sort_by(|a, b| a.total_fee().cmp(&b.total_fee()));
		Ok(quotes)
	}

	/// Creates a transfer with the active provider for the request's pair.
	#[tracing::instrument(skip(self, request), fields(pair = %request.chain_pair()))]
	pub async fn create_transaction(&self, request: BridgeRequest) -> Result<BridgeTransaction, BridgeError> {
		let provider = self.provider_for(request.chain_pair())?;
		self.create_with(provider, request).await
	}

	/// Creates a transfer with a specific provider.
	pub async fn create_transaction_with(
		&self,
		name: &str,
		request: BridgeRequest,
	) -> Result<BridgeTransaction, BridgeError> {
		let provider = self.provider(name)?;
		if !provider.supports(request.chain_pair()) {
			return Err(BridgeError::UnsupportedChainPair(request.chain_pair()));
		}
		self.create_with(provider, request).await
	}

	async fn create_with(
		&self,
		provider: Arc<dyn BridgeProvider>,
		request: BridgeRequest,
	) -> Result<BridgeTransaction, BridgeError> {
		let pair = request.chain_pair();
		if request.amount.is_zero() {
			return Err(BridgeError::AmountOutOfRange("Amount must be positive".into()));
		}

		if !request.is_native() {
			let assets = provider.get_supported_assets(pair).await?;
			if !assets.iter().any(|a| a.source_token == request.token) {
				return Err(BridgeError::UnsupportedToken {
					token: request.token,
					pair,
				});
			}
			if let Some(spender) = provider.spender(pair, request.token).await? {
				let current = provider
					.get_allowance(pair, request.token, request.sender)
					.await?;
				if current < request.amount {
					tracing::info!(
						token = %request.token,
						spender = %spender,
						"Transfer needs a larger allowance"
					);
					self.events.publish(BridgeEvent::AllowanceNeeded {
						chain_id: pair.source,
						token: request.token,
						owner: request.sender,
						spender,
						required: request.amount,
						current,
					});
					return Err(BridgeError::InsufficientAllowance {
						spender,
						required: request.amount,
						current,
					});
				}
			}
		}

		let mut tx = provider.create_transaction(&request).await?;
		tx.expires_at = tx.created_at.saturating_add(self.config.expiry_seconds);

		self.remember(tx.clone(), None);
		self.persist(&tx).await;
		self.index(&tx).await;

		tracing::info!(
			bridge_id = %truncate_id(&tx.id),
			bridge = %tx.provider,
			"Created bridge transaction"
		);
		self.events.publish(BridgeEvent::Created {
			id: tx.id.clone(),
			provider: tx.provider.clone(),
		});
		Ok(tx)
	}

	/// Submits the source leg of a created transfer.
	#[tracing::instrument(skip(self), fields(bridge_id = %truncate_id(id)))]
	pub async fn execute_transaction(&self, id: &str) -> Result<BridgeTransaction, BridgeError> {
		if !lock(&self.submitting).insert(id.to_string()) {
			return Err(BridgeError::InvalidState {
				id: id.to_string(),
				status: BridgeStatus::Created,
				action: "execute",
			});
		}
		let result = self.submit(id).await;
		lock(&self.submitting).remove(id);
		result
	}

	async fn submit(&self, id: &str) -> Result<BridgeTransaction, BridgeError> {
		let mut tx = self.load(id).await?;
		if tx.status != BridgeStatus::Created {
			return Err(BridgeError::InvalidState {
				id: tx.id,
				status: tx.status,
				action: "execute",
			});
		}
		if tx.is_expired(current_timestamp()) {
			self.expire(tx).await;
			return Err(BridgeError::Expired(id.to_string()));
		}

		let provider = self.provider(&tx.provider)?;
		let transfer = provider.bridge_asset(&tx).await?;
		tx.source_tx_hash = Some(transfer.source_tx_hash);
		tx.transfer_id = Some(transfer.transfer_id);
		Ok(self
			.apply_update(tx, BridgeStatusUpdate::status(BridgeStatus::Submitted))
			.await)
	}

	/// Pushes a submitted transfer towards completion.
	///
	/// Claimable withdrawals are claimed on the destination chain; submitted
	/// or relaying transfers get a relay request followed by a status
	/// refresh.
	#[tracing::instrument(skip(self), fields(bridge_id = %truncate_id(id)))]
	pub async fn confirm_transaction(&self, id: &str) -> Result<BridgeTransaction, BridgeError> {
		let tx = self.load(id).await?;
		let provider = self.provider(&tx.provider)?;
		match tx.status {
			BridgeStatus::Claimable => {
				let claim = provider.execute_withdrawal(&tx).await?;
				let update = BridgeStatusUpdate {
					status: BridgeStatus::Claimable,
					target_tx_hash: Some(claim),
					error: None,
				};
				Ok(self.apply_update(tx, update).await)
			},
			BridgeStatus::Submitted | BridgeStatus::Relaying => {
				provider.request_relay(&tx).await?;
				Ok(self.refresh(tx).await)
			},
			status => Err(BridgeError::InvalidState {
				id: tx.id,
				status,
				action: "confirm",
			}),
		}
	}

	/// Cancels a transfer that was never submitted.
	pub async fn cancel_transaction(&self, id: &str) -> Result<BridgeTransaction, BridgeError> {
		let tx = self.load(id).await?;
		if tx.status != BridgeStatus::Created || lock(&self.submitting).contains(id) {
			return Err(BridgeError::InvalidState {
				id: tx.id,
				status: tx.status,
				action: "cancel",
			});
		}
		Ok(self
			.apply_update(tx, BridgeStatusUpdate::status(BridgeStatus::Cancelled))
			.await)
	}

	/// The stored record, without asking the provider.
	pub async fn get_transaction(&self, id: &str) -> Result<BridgeTransaction, BridgeError> {
		self.load(id).await
	}

	/// Current record, refreshed from the provider unless it is terminal,
	/// not yet submitted, or was refreshed within the cache period.
	pub async fn get_transaction_status(&self, id: &str) -> Result<BridgeTransaction, BridgeError> {
		let tx = self.load(id).await?;
		if tx.status.is_terminal() {
			return Ok(tx);
		}
		if tx.is_expired(current_timestamp()) {
			return Ok(self.expire(tx).await);
		}
		if tx.status == BridgeStatus::Created {
			return Ok(tx);
		}

		let ttl = Duration::from_secs(self.config.status_cache_ttl_seconds);
		let fresh = self
			.read_transfers(|map| map.get(id).and_then(|c| c.refreshed_at))
			.is_some_and(|at| at.elapsed() < ttl);
		if fresh {
			return Ok(tx);
		}
		Ok(self.refresh(tx).await)
	}

	/// Transfers sent from or to `account`, newest first.
	pub async fn get_transactions_by_account(&self, account: Address) -> Vec<BridgeTransaction> {
		let ids: Vec<String> = match self
			.storage
			.retrieve_optional(StorageKey::BridgeAccounts, &account.to_string())
			.await
		{
			Ok(ids) => ids.unwrap_or_default(),
			Err(e) => {
				tracing::warn!(error = %e, "Failed to read bridge account index");
				Vec::new()
			},
		};

		let mut found: HashMap<String, BridgeTransaction> = self.read_transfers(|map| {
			map.values()
				.filter(|c| c.tx.sender == account || c.tx.recipient == account)
				.map(|c| (c.tx.id.clone(), c.tx.clone()))
				.collect()
		});
		for id in ids {
			if found.contains_key(&id) {
				continue;
			}
			if let Ok(tx) = self.load(&id).await {
				found.insert(id, tx);
			}
		}

		let mut transactions: Vec<_> = found.into_values().collect();
		transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
		transactions
	}

	/// Local transfers plus those the providers report for `account`.
	pub async fn get_transaction_history(&self, account: Address) -> Vec<BridgeTransaction> {
		let mut transactions = self.get_transactions_by_account(account).await;
		let known: HashSet<Option<String>> =
			transactions.iter().map(|tx| tx.transfer_id.clone()).collect();

		for name in self.provider_names() {
			let remote = match self.provider(&name) {
				Ok(provider) => provider.get_transaction_history(account).await,
				Err(e) => Err(e),
			};
			match remote {
				Ok(remote) => transactions.extend(
					remote
						.into_iter()
						.filter(|tx| tx.transfer_id.is_none() || !known.contains(&tx.transfer_id)),
				),
				Err(e) => tracing::warn!(bridge = %name, error = %e, "Bridge history unavailable"),
			}
		}
		transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		transactions
	}

	pub async fn get_allowance(
		&self,
		pair: ChainPair,
		token: Address,
		owner: Address,
	) -> Result<U256, BridgeError> {
		self.provider_for(pair)?.get_allowance(pair, token, owner).await
	}

	/// Approves the active provider for `pair` to move `amount` of `token`.
	pub async fn approve_token(
		&self,
		pair: ChainPair,
		token: Address,
		owner: Address,
		amount: U256,
	) -> Result<B256, BridgeError> {
		self.provider_for(pair)?
			.approve_token(pair, token, owner, amount)
			.await
	}

	/// Refreshes every transfer still in flight; returns how many changed
	/// status.
	pub async fn refresh_active(&self) -> usize {
		self.prune_settled();
		let in_flight: Vec<String> = self.read_transfers(|map| {
			map.values()
				.filter(|c| !c.tx.status.is_terminal())
				.map(|c| c.tx.id.clone())
				.collect()
		});

		let mut changed = 0;
		for id in in_flight {
			let before = self.read_transfers(|map| map.get(&id).map(|c| c.tx.status));
			if let Ok(tx) = self.get_transaction_status(&id).await {
				if before != Some(tx.status) {
					changed += 1;
				}
			}
		}
		changed
	}

	/// Starts the background refresh loop. The task ends once the
	/// orchestrator is dropped.
	pub fn spawn_monitor(self: &Arc<Self>) -> JoinHandle<()> {
		let orchestrator = Arc::downgrade(self);
		let interval = Duration::from_secs(self.config.monitor_interval_seconds.max(1));
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.tick().await;
			loop {
				ticker.tick().await;
				let Some(orchestrator) = orchestrator.upgrade() else {
					break;
				};
				let changed = orchestrator.refresh_active().await;
				if changed > 0 {
					tracing::debug!(changed, "Bridge monitor updated transfers");
				}
			}
		})
	}

	async fn refresh(&self, tx: BridgeTransaction) -> BridgeTransaction {
		let provider = match self.provider(&tx.provider) {
			Ok(provider) => provider,
			Err(e) => {
				tracing::warn!(bridge = %tx.provider, error = %e, "Cannot refresh bridge status");
				return tx;
			},
		};
		match provider.get_transaction_status(&tx).await {
			Ok(update) => self.apply_update(tx, update).await,
			Err(e) => {
				tracing::warn!(
					bridge_id = %truncate_id(&tx.id),
					error = %e,
					"Status lookup failed, returning last known status"
				);
				tx
			},
		}
	}

	async fn expire(&self, tx: BridgeTransaction) -> BridgeTransaction {
		let update = BridgeStatusUpdate {
			status: BridgeStatus::Failed,
			target_tx_hash: None,
			error: Some(EXPIRED.to_string()),
		};
		self.apply_update(tx, update).await
	}

	/// Applies a provider-reported status. Transitions the state machine
	/// does not allow are logged and dropped.
	async fn apply_update(
		&self,
		mut tx: BridgeTransaction,
		update: BridgeStatusUpdate,
	) -> BridgeTransaction {
		let previous = tx.status;
		let now = Instant::now();

		if update.status == previous {
			let new_hash = update.target_tx_hash.is_some() && update.target_tx_hash != tx.target_tx_hash;
			if new_hash {
				tx.target_tx_hash = update.target_tx_hash;
				tx.updated_at = current_timestamp();
				self.persist(&tx).await;
			}
			self.remember(tx.clone(), Some(now));
			return tx;
		}

		if !can_transition(previous, update.status) {
			tracing::warn!(
				bridge_id = %truncate_id(&tx.id),
				from = %previous,
				to = %update.status,
				"Ignoring invalid bridge status transition"
			);
			self.remember(tx.clone(), Some(now));
			return tx;
		}

		tx.status = update.status;
		if update.target_tx_hash.is_some() {
			tx.target_tx_hash = update.target_tx_hash;
		}
		if update.error.is_some() {
			tx.error = update.error;
		}
		tx.updated_at = current_timestamp();
		self.remember(tx.clone(), Some(now));
		self.persist(&tx).await;

		tracing::info!(
			bridge_id = %truncate_id(&tx.id),
			from = %previous,
			to = %tx.status,
			"Bridge status changed"
		);
		self.events.publish(BridgeEvent::StatusChanged {
			id: tx.id.clone(),
			previous,
			status: tx.status,
		});
		tx
	}

	async fn load(&self, id: &str) -> Result<BridgeTransaction, BridgeError> {
		if let Some(tx) = self.read_transfers(|map| map.get(id).map(|c| c.tx.clone())) {
			return Ok(tx);
		}
		let stored: Option<BridgeTransaction> = self
			.storage
			.retrieve_optional(StorageKey::BridgeTransactions, id)
			.await?;
		let tx = stored.ok_or_else(|| BridgeError::NotFound(id.to_string()))?;
		self.remember(tx.clone(), None);
		Ok(tx)
	}

	fn remember(&self, tx: BridgeTransaction, refreshed_at: Option<Instant>) {
		let mut map = match self.transfers.write() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		let refreshed_at = refreshed_at.or_else(|| map.get(&tx.id).and_then(|c| c.refreshed_at));
		map.insert(
			tx.id.clone(),
			CachedTransfer {
				tx,
				refreshed_at,
				cached_at: Instant::now(),
			},
		);
	}

	/// Drops settled transfers untouched for a full status cache period.
	/// Their records stay in storage.
	fn prune_settled(&self) -> usize {
		let window = Duration::from_secs(self.config.status_cache_ttl_seconds);
		let mut map = match self.transfers.write() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		let before = map.len();
		map.retain(|_, c| !c.tx.status.is_terminal() || c.cached_at.elapsed() < window);
		let pruned = before - map.len();
		if pruned > 0 {
			tracing::debug!(pruned, remaining = map.len(), "Released settled bridge transfers");
		}
		pruned
	}

	#[cfg(test)]
	fn cached_ids(&self) -> Vec<String> {
		self.read_transfers(|map| map.keys().cloned().collect())
	}

	fn read_transfers<R>(&self, f: impl FnOnce(&HashMap<String, CachedTransfer>) -> R) -> R {
		let map = match self.transfers.read() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		f(&map)
	}

	async fn persist(&self, tx: &BridgeTransaction) {
		if let Err(e) = self
			.storage
			.store(StorageKey::BridgeTransactions, &tx.id, tx)
			.await
		{
			tracing::warn!(bridge_id = %truncate_id(&tx.id), error = %e, "Failed to persist bridge transaction");
		}
	}

	/// Adds the transfer to the account index of its sender and recipient.
	async fn index(&self, tx: &BridgeTransaction) {
		let _guard = self.index_lock.lock().await;
		let mut accounts = vec![tx.sender];
		if tx.recipient != tx.sender {
			accounts.push(tx.recipient);
		}
		for account in accounts {
			let key = account.to_string();
			let result = async {
				let mut ids: Vec<String> = self
					.storage
					.retrieve_optional(StorageKey::BridgeAccounts, &key)
					.await?
					.unwrap_or_default();
				if !ids.contains(&tx.id) {
					ids.push(tx.id.clone());
				}
				self.storage
					.store(StorageKey::BridgeAccounts, &key, &ids)
					.await
			}
			.await;
			if let Err(e) = result {
				tracing::warn!(account = %key, error = %e, "Failed to update bridge account index");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::common::new_transaction;
	use async_trait::async_trait;
	use crelink_storage::implementations::memory::MemoryStorage;
	use crelink_types::{BridgeTransfer, ConfigSchema, Schema};
	use std::sync::atomic::{AtomicUsize, Ordering};
	use tokio::sync::broadcast;

	const PAIR: ChainPair = ChainPair {
		source: 1000,
		target: 1,
	};

	fn token() -> Address {
		Address::repeat_byte(0x22)
	}

	fn sender() -> Address {
		Address::repeat_byte(0xaa)
	}

	struct EmptySchema;

	impl ConfigSchema for EmptySchema {
		fn validate(&self, config: &toml::Value) -> Result<(), crelink_types::ValidationError> {
			Schema::new(vec![], vec![]).validate(config)
		}
	}

	struct MockBridge {
		name: String,
		pairs: Vec<ChainPair>,
		fee: U256,
		allowance: Mutex<U256>,
		status: Mutex<Result<BridgeStatusUpdate, String>>,
		quote_fails: bool,
		created: AtomicUsize,
		bridged: AtomicUsize,
		status_calls: AtomicUsize,
		relayed: AtomicUsize,
		withdrawn: AtomicUsize,
	}

	impl MockBridge {
		fn new(name: &str, fee: u64) -> Self {
			Self {
				name: name.to_string(),
				pairs: vec![PAIR],
				fee: U256::from(fee),
				allowance: Mutex::new(U256::ZERO),
				status: Mutex::new(Ok(BridgeStatusUpdate::status(BridgeStatus::Submitted))),
				quote_fails: false,
				created: AtomicUsize::new(0),
				bridged: AtomicUsize::new(0),
				status_calls: AtomicUsize::new(0),
				relayed: AtomicUsize::new(0),
				withdrawn: AtomicUsize::new(0),
			}
		}

		fn set_status(&self, status: BridgeStatus) {
			*lock(&self.status) = Ok(BridgeStatusUpdate::status(status));
		}

		fn set_status_error(&self, message: &str) {
			*lock(&self.status) = Err(message.to_string());
		}

		fn set_allowance(&self, amount: u64) {
			*lock(&self.allowance) = U256::from(amount);
		}
	}

	#[async_trait]
	impl BridgeProvider for MockBridge {
		fn name(&self) -> &str {
			&self.name
		}

		fn supported_pairs(&self) -> &[ChainPair] {
			&self.pairs
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(EmptySchema)
		}

		async fn get_supported_assets(&self, pair: ChainPair) -> Result<Vec<BridgeAsset>, BridgeError> {
			Ok(vec![
				BridgeAsset {
					symbol: "CTA".into(),
					decimals: 18,
					source_token: Address::ZERO,
					target_token: Address::repeat_byte(0x11),
					min_amount: U256::ZERO,
					max_amount: None,
				},
				BridgeAsset {
					symbol: "USDC".into(),
					decimals: 6,
					source_token: token(),
					target_token: Address::repeat_byte(0x33),
					min_amount: U256::ZERO,
					max_amount: None,
				},
			]
			.into_iter()
			.filter(|_| self.pairs.contains(&pair))
			.collect())
		}

		async fn spender(&self, _pair: ChainPair, _token: Address) -> Result<Option<Address>, BridgeError> {
			Ok(Some(Address::repeat_byte(0xbb)))
		}

		async fn get_token_balance(&self, _: u64, _: Address, _: Address) -> Result<U256, BridgeError> {
			Ok(U256::ZERO)
		}

		async fn get_allowance(&self, _: ChainPair, _: Address, _: Address) -> Result<U256, BridgeError> {
			Ok(*lock(&self.allowance))
		}

		async fn approve_token(
			&self,
			_: ChainPair,
			_: Address,
			_: Address,
			amount: U256,
		) -> Result<B256, BridgeError> {
			*lock(&self.allowance) = amount;
			Ok(B256::repeat_byte(0xab))
		}

		async fn estimate_bridge_fee(&self, request: &BridgeRequest) -> Result<BridgeQuote, BridgeError> {
			if self.quote_fails {
				return Err(BridgeError::Relayer("quote service down".into()));
			}
			Ok(BridgeQuote {
				provider: self.name.clone(),
				chain_pair: request.chain_pair(),
				token: request.token,
				amount: request.amount,
				bridge_fee: self.fee,
				gas_fee: U256::from(1u64),
				estimated_seconds: 600,
			})
		}

		async fn create_transaction(&self, request: &BridgeRequest) -> Result<BridgeTransaction, BridgeError> {
			self.created.fetch_add(1, Ordering::SeqCst);
			Ok(new_transaction(&self.name, request, Address::repeat_byte(0x11), self.fee))
		}

		async fn bridge_asset(&self, _tx: &BridgeTransaction) -> Result<BridgeTransfer, BridgeError> {
			let n = self.bridged.fetch_add(1, Ordering::SeqCst) + 1;
			Ok(BridgeTransfer {
				transfer_id: format!("transfer-{}", n),
				source_tx_hash: B256::repeat_byte(n as u8),
			})
		}

		async fn get_transaction_status(
			&self,
			_tx: &BridgeTransaction,
		) -> Result<BridgeStatusUpdate, BridgeError> {
			self.status_calls.fetch_add(1, Ordering::SeqCst);
			lock(&self.status).clone().map_err(BridgeError::Relayer)
		}

		async fn request_relay(&self, _tx: &BridgeTransaction) -> Result<(), BridgeError> {
			self.relayed.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}

		async fn execute_withdrawal(&self, _tx: &BridgeTransaction) -> Result<B256, BridgeError> {
			self.withdrawn.fetch_add(1, Ordering::SeqCst);
			Ok(B256::repeat_byte(0xcc))
		}
	}

	fn storage() -> Arc<StorageService> {
		Arc::new(StorageService::new(Box::new(MemoryStorage::new())))
	}

	fn orchestrator_with(config: BridgeConfig, bridges: &[Arc<MockBridge>]) -> BridgeOrchestrator {
		let orchestrator = BridgeOrchestrator::new(config, storage());
		for bridge in bridges {
			orchestrator.register_provider(bridge.clone()).unwrap();
		}
		orchestrator
	}

	fn native(amount: u64) -> BridgeRequest {
		BridgeRequest {
			source_chain_id: PAIR.source,
			target_chain_id: PAIR.target,
			token: Address::ZERO,
			amount: U256::from(amount),
			sender: sender(),
			recipient: Some(Address::repeat_byte(0xcd)),
		}
	}

	fn erc20(amount: u64) -> BridgeRequest {
		BridgeRequest {
			token: token(),
			..native(amount)
		}
	}

	async fn next_status(receiver: &mut broadcast::Receiver<BridgeEvent>) -> (BridgeStatus, BridgeStatus) {
		loop {
			if let BridgeEvent::StatusChanged {
				previous, status, ..
			} = receiver.recv().await.unwrap()
			{
				return (previous, status);
			}
		}
	}

	#[tokio::test]
	async fn test_first_registered_provider_wins() {
		let a = Arc::new(MockBridge::new("a", 5));
		let b = Arc::new(MockBridge::new("b", 3));
		let orchestrator = orchestrator_with(BridgeConfig::default(), &[a.clone(), b.clone()]);

		let tx = orchestrator.create_transaction(native(100)).await.unwrap();
		assert_eq!(tx.provider, "a");
		let tx = orchestrator
			.create_transaction_with("b", native(100))
			.await
			.unwrap();
		assert_eq!(tx.provider, "b");
		assert_eq!(orchestrator.provider_names(), vec!["a", "b"]);
		assert!(orchestrator.register_provider(a).is_err());
	}

	#[tokio::test]
	async fn test_providers_are_constructed_lazily() {
		let orchestrator = BridgeOrchestrator::new(BridgeConfig::default(), storage());
		let constructed = Arc::new(AtomicUsize::new(0));
		let counter = constructed.clone();
		orchestrator
			.register(
				"lazy",
				vec![PAIR],
				Box::new(move || {
					counter.fetch_add(1, Ordering::SeqCst);
					Ok(Arc::new(MockBridge::new("lazy", 1)) as Arc<dyn BridgeProvider>)
				}),
			)
			.unwrap();
		assert_eq!(constructed.load(Ordering::SeqCst), 0);
		assert_eq!(orchestrator.supported_pairs(), vec![PAIR]);

		orchestrator.create_transaction(native(1)).await.unwrap();
		orchestrator.create_transaction(native(2)).await.unwrap();
		assert_eq!(constructed.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_unsupported_pair() {
		let orchestrator = orchestrator_with(BridgeConfig::default(), &[Arc::new(MockBridge::new("a", 1))]);
		let request = BridgeRequest {
			target_chain_id: 137,
			..native(1)
		};
		let err = orchestrator.create_transaction(request.clone()).await.unwrap_err();
		assert_eq!(err.to_string(), "Chain pair 1000-137 is not supported");
		assert!(orchestrator.compare_quotes(&request).await.is_err());
		assert!(matches!(
			orchestrator.create_transaction_with("a", request).await,
			Err(BridgeError::UnsupportedChainPair(_))
		));
	}

	#[tokio::test]
	async fn test_allowance_gate_blocks_creation() {
		let bridge = Arc::new(MockBridge::new("a", 1));
		let orchestrator = orchestrator_with(BridgeConfig::default(), &[bridge.clone()]);
		let mut events = orchestrator.events().subscribe();
		bridge.set_allowance(50);

		let err = orchestrator.create_transaction(erc20(100)).await.unwrap_err();
		assert!(matches!(
			err,
			BridgeError::InsufficientAllowance { current, required, .. }
				if current == U256::from(50u64) && required == U256::from(100u64)
		));
		assert!(matches!(
			events.recv().await.unwrap(),
			BridgeEvent::AllowanceNeeded { chain_id: 1000, spender, .. } if spender == Address::repeat_byte(0xbb)
		));
		assert_eq!(bridge.created.load(Ordering::SeqCst), 0);

		orchestrator
			.approve_token(PAIR, token(), sender(), U256::from(100u64))
			.await
			.unwrap();
		let tx = orchestrator.create_transaction(erc20(100)).await.unwrap();
		assert_eq!(tx.source_token, token());
		assert_eq!(bridge.created.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_native_transfers_skip_allowance() {
		let bridge = Arc::new(MockBridge::new("a", 1));
		let orchestrator = orchestrator_with(BridgeConfig::default(), &[bridge.clone()]);
		assert!(orchestrator.create_transaction(native(100)).await.is_ok());
	}

	#[tokio::test]
	async fn test_unlisted_token_and_zero_amount() {
		let orchestrator = orchestrator_with(BridgeConfig::default(), &[Arc::new(MockBridge::new("a", 1))]);
		let request = BridgeRequest {
			token: Address::repeat_byte(0x99),
			..native(1)
		};
		assert!(matches!(
			orchestrator.create_transaction(request).await,
			Err(BridgeError::UnsupportedToken { .. })
		));
		assert!(matches!(
			orchestrator.create_transaction(native(0)).await,
			Err(BridgeError::AmountOutOfRange(_))
		));
	}

	#[tokio::test]
	async fn test_execute_submits_once() {
		let bridge = Arc::new(MockBridge::new("a", 1));
		let orchestrator = orchestrator_with(BridgeConfig::default(), &[bridge.clone()]);
		let created = orchestrator.create_transaction(native(10)).await.unwrap();
		assert_eq!(
			created.expires_at,
			created.created_at + BridgeConfig::default().expiry_seconds
		);

		let tx = orchestrator.execute_transaction(&created.id).await.unwrap();
		assert_eq!(tx.status, BridgeStatus::Submitted);
		assert_eq!(tx.transfer_id.as_deref(), Some("transfer-1"));
		assert_eq!(tx.source_tx_hash, Some(B256::repeat_byte(1)));

		assert!(matches!(
			orchestrator.execute_transaction(&created.id).await,
			Err(BridgeError::InvalidState {
				status: BridgeStatus::Submitted,
				..
			})
		));
		assert_eq!(bridge.bridged.load(Ordering::SeqCst), 1);
		assert!(matches!(
			orchestrator.execute_transaction("missing").await,
			Err(BridgeError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn test_expired_transfer_fails() {
		let bridge = Arc::new(MockBridge::new("a", 1));
		let config = BridgeConfig {
			expiry_seconds: 0,
			..Default::default()
		};
		let orchestrator = orchestrator_with(config, &[bridge.clone()]);
		let created = orchestrator.create_transaction(native(10)).await.unwrap();

		assert!(matches!(
			orchestrator.execute_transaction(&created.id).await,
			Err(BridgeError::Expired(_))
		));
		assert_eq!(bridge.bridged.load(Ordering::SeqCst), 0);
		let tx = orchestrator.get_transaction(&created.id).await.unwrap();
		assert_eq!(tx.status, BridgeStatus::Failed);
		assert_eq!(tx.error.as_deref(), Some("expired"));
	}

	#[tokio::test]
	async fn test_cancel_only_before_submission() {
		let bridge = Arc::new(MockBridge::new("a", 1));
		let orchestrator = orchestrator_with(BridgeConfig::default(), &[bridge.clone()]);

		let first = orchestrator.create_transaction(native(10)).await.unwrap();
		let cancelled = orchestrator.cancel_transaction(&first.id).await.unwrap();
		assert_eq!(cancelled.status, BridgeStatus::Cancelled);
		assert!(orchestrator.cancel_transaction(&first.id).await.is_err());
		let status = orchestrator.get_transaction_status(&first.id).await.unwrap();
		assert_eq!(status.status, BridgeStatus::Cancelled);
		assert_eq!(bridge.status_calls.load(Ordering::SeqCst), 0);

		let second = orchestrator.create_transaction(native(10)).await.unwrap();
		orchestrator.execute_transaction(&second.id).await.unwrap();
		assert!(matches!(
			orchestrator.cancel_transaction(&second.id).await,
			Err(BridgeError::InvalidState {
				action: "cancel",
				..
			})
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_status_is_cached_until_ttl() {
		let bridge = Arc::new(MockBridge::new("a", 1));
		let orchestrator = orchestrator_with(BridgeConfig::default(), &[bridge.clone()]);
		let mut events = orchestrator.events().subscribe();
		let created = orchestrator.create_transaction(native(10)).await.unwrap();
		orchestrator.execute_transaction(&created.id).await.unwrap();
		assert_eq!(
			next_status(&mut events).await,
			(BridgeStatus::Created, BridgeStatus::Submitted)
		);

		// Submission itself counts as a refresh.
		bridge.set_status(BridgeStatus::Relaying);
		let tx = orchestrator.get_transaction_status(&created.id).await.unwrap();
		assert_eq!(tx.status, BridgeStatus::Submitted);
		assert_eq!(bridge.status_calls.load(Ordering::SeqCst), 0);

		tokio::time::advance(Duration::from_secs(31)).await;
		let tx = orchestrator.get_transaction_status(&created.id).await.unwrap();
		assert_eq!(tx.status, BridgeStatus::Relaying);
		assert_eq!(
			next_status(&mut events).await,
			(BridgeStatus::Submitted, BridgeStatus::Relaying)
		);

		bridge.set_status(BridgeStatus::Completed);
		orchestrator.get_transaction_status(&created.id).await.unwrap();
		assert_eq!(bridge.status_calls.load(Ordering::SeqCst), 1);

		tokio::time::advance(Duration::from_secs(31)).await;
		let tx = orchestrator.get_transaction_status(&created.id).await.unwrap();
		assert_eq!(tx.status, BridgeStatus::Completed);

		// Terminal records are never refreshed again.
		tokio::time::advance(Duration::from_secs(31)).await;
		orchestrator.get_transaction_status(&created.id).await.unwrap();
		assert_eq!(bridge.status_calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_provider_error_returns_last_known_status() {
		let bridge = Arc::new(MockBridge::new("a", 1));
		let orchestrator = orchestrator_with(BridgeConfig::default(), &[bridge.clone()]);
		let created = orchestrator.create_transaction(native(10)).await.unwrap();
		orchestrator.execute_transaction(&created.id).await.unwrap();

		bridge.set_status_error("relayer unreachable");
		tokio::time::advance(Duration::from_secs(31)).await;
		let tx = orchestrator.get_transaction_status(&created.id).await.unwrap();
		assert_eq!(tx.status, BridgeStatus::Submitted);

		// A failed lookup does not start a new cache period.
		bridge.set_status(BridgeStatus::Relaying);
		let tx = orchestrator.get_transaction_status(&created.id).await.unwrap();
		assert_eq!(tx.status, BridgeStatus::Relaying);
	}

	#[tokio::test(start_paused = true)]
	async fn test_backward_transition_is_ignored() {
		let bridge = Arc::new(MockBridge::new("a", 1));
		let orchestrator = orchestrator_with(BridgeConfig::default(), &[bridge.clone()]);
		let created = orchestrator.create_transaction(native(10)).await.unwrap();
		orchestrator.execute_transaction(&created.id).await.unwrap();

		bridge.set_status(BridgeStatus::Claimable);
		tokio::time::advance(Duration::from_secs(31)).await;
		orchestrator.get_transaction_status(&created.id).await.unwrap();

		bridge.set_status(BridgeStatus::Relaying);
		tokio::time::advance(Duration::from_secs(31)).await;
		let tx = orchestrator.get_transaction_status(&created.id).await.unwrap();
		assert_eq!(tx.status, BridgeStatus::Claimable);
	}

	#[tokio::test(start_paused = true)]
	async fn test_confirm_relays_or_claims() {
		let bridge = Arc::new(MockBridge::new("a", 1));
		let orchestrator = orchestrator_with(BridgeConfig::default(), &[bridge.clone()]);
		let created = orchestrator.create_transaction(native(10)).await.unwrap();
		assert!(orchestrator.confirm_transaction(&created.id).await.is_err());
		orchestrator.execute_transaction(&created.id).await.unwrap();

		bridge.set_status(BridgeStatus::Claimable);
		let tx = orchestrator.confirm_transaction(&created.id).await.unwrap();
		assert_eq!(bridge.relayed.load(Ordering::SeqCst), 1);
		assert_eq!(tx.status, BridgeStatus::Claimable);

		let tx = orchestrator.confirm_transaction(&created.id).await.unwrap();
		assert_eq!(bridge.withdrawn.load(Ordering::SeqCst), 1);
		assert_eq!(tx.target_tx_hash, Some(B256::repeat_byte(0xcc)));
		assert_eq!(tx.status, BridgeStatus::Claimable);
	}

	#[tokio::test]
	async fn test_compare_quotes_cheapest_first() {
		let a = Arc::new(MockBridge::new("a", 5));
		let b = Arc::new(MockBridge::new("b", 3));
		let broken = Arc::new(MockBridge {
			quote_fails: true,
			..MockBridge::new("broken", 0)
		});
		let orchestrator = orchestrator_with(BridgeConfig::default(), &[a, broken, b]);

		let quotes = orchestrator.compare_quotes(&native(100)).await.unwrap();
		let providers: Vec<_> = quotes.iter().map(|q| q.provider.as_str()).collect();
		assert_eq!(providers, vec!["b", "a"]);
		assert_eq!(quotes[0].total_fee(), U256::from(4u64));
	}

	#[tokio::test]
	async fn test_history_survives_restart() {
		let shared = storage();
		let bridge = Arc::new(MockBridge::new("a", 1));
		let first = BridgeOrchestrator::new(BridgeConfig::default(), shared.clone());
		first.register_provider(bridge.clone()).unwrap();
		let one = first.create_transaction(native(1)).await.unwrap();
		let two = first.create_transaction(native(2)).await.unwrap();
		first.execute_transaction(&two.id).await.unwrap();

		let restarted = BridgeOrchestrator::new(BridgeConfig::default(), shared);
		restarted.register_provider(bridge).unwrap();
		let history = restarted.get_transactions_by_account(sender()).await;
		assert_eq!(history.len(), 2);
		let by_recipient = restarted
			.get_transactions_by_account(Address::repeat_byte(0xcd))
			.await;
		assert_eq!(by_recipient.len(), 2);
		assert!(restarted
			.get_transactions_by_account(Address::repeat_byte(0x01))
			.await
			.is_empty());

		let stored = restarted.get_transaction(&two.id).await.unwrap();
		assert_eq!(stored.status, BridgeStatus::Submitted);
		assert_eq!(
			restarted.get_transaction(&one.id).await.unwrap().status,
			BridgeStatus::Created
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_refresh_active_updates_in_flight_transfers() {
		let bridge = Arc::new(MockBridge::new("a", 1));
		let orchestrator = Arc::new(orchestrator_with(BridgeConfig::default(), &[bridge.clone()]));
		let pending = orchestrator.create_transaction(native(1)).await.unwrap();
		let sent = orchestrator.create_transaction(native(2)).await.unwrap();
		orchestrator.execute_transaction(&sent.id).await.unwrap();

		bridge.set_status(BridgeStatus::Relaying);
		let monitor = orchestrator.spawn_monitor();
		tokio::time::sleep(Duration::from_secs(31)).await;

		let tx = orchestrator.get_transaction(&sent.id).await.unwrap();
		assert_eq!(tx.status, BridgeStatus::Relaying);
		assert_eq!(
			orchestrator.get_transaction(&pending.id).await.unwrap().status,
			BridgeStatus::Created
		);
		monitor.abort();
	}

	#[tokio::test(start_paused = true)]
	async fn test_settled_transfers_leave_memory_but_stay_readable() {
		let bridge = Arc::new(MockBridge::new("a", 1));
		let orchestrator = orchestrator_with(BridgeConfig::default(), &[bridge.clone()]);
		let done = orchestrator.create_transaction(native(1)).await.unwrap();
		orchestrator.execute_transaction(&done.id).await.unwrap();
		let open = orchestrator.create_transaction(native(2)).await.unwrap();

		let window = Duration::from_secs(BridgeConfig::default().status_cache_ttl_seconds);
		bridge.set_status(BridgeStatus::Completed);
		tokio::time::advance(window + Duration::from_secs(1)).await;
		let tx = orchestrator.get_transaction_status(&done.id).await.unwrap();
		assert_eq!(tx.status, BridgeStatus::Completed);

		orchestrator.refresh_active().await;
		assert_eq!(orchestrator.cached_ids().len(), 2);

		tokio::time::advance(window + Duration::from_secs(1)).await;
		orchestrator.refresh_active().await;
		assert_eq!(orchestrator.cached_ids(), vec![open.id.clone()]);

		let tx = orchestrator.get_transaction(&done.id).await.unwrap();
		assert_eq!(tx.status, BridgeStatus::Completed);
		assert_eq!(orchestrator.get_transactions_by_account(sender()).await.len(), 2);
	}
}
