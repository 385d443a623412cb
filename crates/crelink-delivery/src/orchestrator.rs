//! Transaction lifecycle: prepare, sign, submit, track, replace.
//!
//! Each submitted transaction gets a [`PendingTransaction`] record. A
//! watcher task follows the provider's confirmation events for its hash and
//! moves the record to `Confirmed`, `Failed` or `TimedOut`; a watcher that
//! falls behind the event stream asks for the receipt directly. Speed-up and
//! cancel submit a replacement at the same nonce and mark the original
//! `Replaced`.

use crate::builder::TransactionBuilder;
use crate::{SignerInterface, TransactionError};
use alloy_primitives::{Address, B256, U256};
use crelink_gas::GasPolicyEngine;
use crelink_provider::{ProviderFactory, ProviderInterface, TRANSACTION_MONITOR_CEILING};
use crelink_storage::{StorageError, StorageService};
use crelink_types::{
	current_timestamp, truncate_id, BlockTag, EventBus, FeeEstimate, GasSpeed, PendingTransaction,
	ProviderEvent, StorageKey, Transaction, TransactionEvent, TransactionReceipt,
	TransactionRequest, TransactionStatus,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::AbortHandle;

/// Extra time a watcher waits past the provider's own monitoring ceiling.
const WATCH_GRACE: Duration = Duration::from_secs(60);

const RECORDS_ID: &str = "records";

type PendingMap = Arc<RwLock<HashMap<B256, PendingTransaction>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	match mutex.lock() {
		Ok(guard) => guard,
		Err(poisoned) => poisoned.into_inner(),
	}
}

fn update_pending<R>(pending: &PendingMap, f: impl FnOnce(&mut HashMap<B256, PendingTransaction>) -> R) -> R {
	let mut map = match pending.write() {
		Ok(guard) => guard,
		Err(poisoned) => poisoned.into_inner(),
	};
	f(&mut map)
}

fn read_pending<R>(pending: &PendingMap, f: impl FnOnce(&HashMap<B256, PendingTransaction>) -> R) -> R {
	let map = match pending.read() {
		Ok(guard) => guard,
		Err(poisoned) => poisoned.into_inner(),
	};
	f(&map)
}

pub struct TransactionOrchestrator {
	providers: Arc<ProviderFactory>,
	gas: Arc<GasPolicyEngine>,
	signer: Arc<dyn SignerInterface>,
	pending: PendingMap,
	/// Next nonce per (chain, sender) after transactions sent from here.
	nonces: Mutex<HashMap<(u64, Address), u64>>,
	watchers: Mutex<Vec<AbortHandle>>,
	events: EventBus<TransactionEvent>,
}

impl TransactionOrchestrator {
	pub fn new(
		providers: Arc<ProviderFactory>,
		gas: Arc<GasPolicyEngine>,
		signer: Arc<dyn SignerInterface>,
	) -> Self {
		Self {
			providers,
			gas,
			signer,
			pending: Arc::new(RwLock::new(HashMap::new())),
			nonces: Mutex::new(HashMap::new()),
			watchers: Mutex::new(Vec::new()),
			events: EventBus::default(),
		}
	}

	pub fn events(&self) -> EventBus<TransactionEvent> {
		self.events.clone()
	}

	pub fn signer(&self) -> &Arc<dyn SignerInterface> {
		&self.signer
	}

	fn provider(&self, chain_id: u64) -> Result<Arc<dyn ProviderInterface>, TransactionError> {
		Ok(self.providers.provider(chain_id)?)
	}

	/// Next usable nonce: the node's pending count, or one past the last
	/// nonce sent from here if the node has not seen it yet.
	async fn next_nonce(
		&self,
		provider: &dyn ProviderInterface,
		from: Address,
	) -> Result<u64, TransactionError> {
		let chain_id = provider.chain_id();
		let remote = provider.get_nonce(from, BlockTag::Pending).await?;
		let local = lock(&self.nonces).get(&(chain_id, from)).copied();
		Ok(local.map_or(remote, |local| local.max(remote)))
	}

	/// Fills in everything the request leaves open: sender, nonce, padded
	/// gas limit and fee fields for `speed`.
	#[tracing::instrument(skip(self, request), fields(to = ?request.to))]
	pub async fn prepare(
		&self,
		chain_id: u64,
		request: TransactionRequest,
		speed: GasSpeed,
	) -> Result<Transaction, TransactionError> {
		let provider = self.provider(chain_id)?;
		let mut builder = TransactionBuilder::from_request(chain_id, &request)?;

		let from = match request.from {
			Some(from) => from,
			None => self.signer.address().await?,
		};
		builder = builder.from(from);

		let nonce = match request.nonce {
			Some(nonce) => nonce,
			None => self.next_nonce(provider.as_ref(), from).await?,
		};
		builder = builder.nonce(nonce);

		if request.gas.is_none() {
			let estimate_request = TransactionRequest {
				from: Some(from),
				to: request.to,
				value: request.value,
				data: request.data.clone(),
				..Default::default()
			};
			let gas_limit = self
				.gas
				.estimate_gas_limit(provider.as_ref(), &estimate_request, None)
				.await?;
			builder = builder.gas_limit(gas_limit);
		}

		if !builder.has_fees() {
			builder = builder.fees(self.gas.fees_for(provider.as_ref(), speed).await?);
		}

		builder.build()
	}

	/// Signs `tx` with the external signer, broadcasts it and starts
	/// tracking it.
	#[tracing::instrument(skip(self, tx), fields(chain_id = tx.chain_id, nonce = tx.nonce))]
	pub async fn sign_and_send(&self, tx: Transaction) -> Result<PendingTransaction, TransactionError> {
		let provider = self.provider(tx.chain_id)?;
		let raw = self.signer.sign_transaction(&tx).await?;

		// Subscribe before broadcasting so the confirmation cannot be missed.
		let receiver = provider.events().subscribe();
		let hash = provider.send_transaction(&raw).await?;

		let record = PendingTransaction {
			hash,
			transaction: tx,
			status: TransactionStatus::Pending,
			submitted_at: current_timestamp(),
			block_number: None,
			replaced_by: None,
		};
		update_pending(&self.pending, |map| map.insert(hash, record.clone()));
		{
			let mut nonces = lock(&self.nonces);
			let next = nonces
				.entry((record.transaction.chain_id, record.transaction.from))
				.or_insert(0);
			*next = (*next).max(record.transaction.nonce + 1);
		}

		tracing::info!(
			tx_hash = %truncate_id(&hash.to_string()),
			"Submitted transaction"
		);
		self.events.publish(TransactionEvent::Submitted {
			chain_id: record.transaction.chain_id,
			tx_hash: hash,
			nonce: record.transaction.nonce,
		});
		self.watch(provider, hash, receiver);
		Ok(record)
	}

	/// Prepares and submits a transaction in one step.
	pub async fn send(
		&self,
		chain_id: u64,
		request: TransactionRequest,
		speed: GasSpeed,
	) -> Result<PendingTransaction, TransactionError> {
		let tx = self.prepare(chain_id, request, speed).await?;
		self.sign_and_send(tx).await
	}

	fn replaceable(&self, hash: B256) -> Result<PendingTransaction, TransactionError> {
		let record = self.transaction(&hash).ok_or(TransactionError::NotFound(hash))?;
		if record.status != TransactionStatus::Pending {
			return Err(TransactionError::NotReplaceable {
				hash,
				status: record.status,
			});
		}
		Ok(record)
	}

	async fn replace(
		&self,
		original: PendingTransaction,
		replacement: Transaction,
	) -> Result<PendingTransaction, TransactionError> {
		let chain_id = replacement.chain_id;
		let sent = self.sign_and_send(replacement).await?;
		let marked = update_pending(&self.pending, |map| match map.get_mut(&original.hash) {
			Some(record) if record.status == TransactionStatus::Pending => {
				record.status = TransactionStatus::Replaced;
				record.replaced_by = Some(sent.hash);
				true
			},
			_ => false,
		});

		self.events.publish(TransactionEvent::Replaced {
			chain_id,
			original: original.hash,
			replacement: sent.hash,
		});
		if marked {
			self.events.publish(TransactionEvent::StatusChanged {
				chain_id,
				tx_hash: original.hash,
				status: TransactionStatus::Replaced,
			});
		}
		Ok(sent)
	}

	/// Resubmits a pending transaction at the same nonce with higher fees.
	#[tracing::instrument(skip(self))]
	pub async fn speed_up(&self, hash: B256) -> Result<PendingTransaction, TransactionError> {
		let original = self.replaceable(hash)?;
		let replacement = self.gas.speed_up(&original.transaction);
		self.replace(original, replacement).await
	}

	/// Supersedes a pending transaction with a zero-value self-transfer at
	/// the same nonce.
	#[tracing::instrument(skip(self))]
	pub async fn cancel(&self, hash: B256) -> Result<PendingTransaction, TransactionError> {
		let original = self.replaceable(hash)?;
		let replacement = self.gas.cancel(&original.transaction);
		self.replace(original, replacement).await
	}

	/// Cost of `request` at every speed tier.
	pub async fn estimate_fee(
		&self,
		chain_id: u64,
		request: &TransactionRequest,
	) -> Result<Vec<FeeEstimate>, TransactionError> {
		let provider = self.provider(chain_id)?;
		let gas_limit = match request.gas {
			Some(gas) => gas,
			None => {
				let fallback = request
					.data
					.as_ref()
					.is_none_or(|d| d.is_empty())
					.then(|| U256::from(crelink_gas::TRANSFER_GAS));
				self.gas
					.estimate_gas_limit(provider.as_ref(), request, fallback)
					.await?
			},
		};
		let info = self.gas.get_gas_info(provider.as_ref()).await?;
		Ok(self.gas.fee_estimates(gas_limit, &info))
	}

	pub fn transaction(&self, hash: &B256) -> Option<PendingTransaction> {
		read_pending(&self.pending, |map| map.get(hash).cloned())
	}

	/// Tracked transactions, newest first, optionally for one chain.
	pub fn transactions(&self, chain_id: Option<u64>) -> Vec<PendingTransaction> {
		let mut records: Vec<_> = read_pending(&self.pending, |map| {
			map.values()
				.filter(|r| chain_id.is_none_or(|id| r.transaction.chain_id == id))
				.cloned()
				.collect()
		});
		records.sort_by(|a, b| {
			b.submitted_at
				.cmp(&a.submitted_at)
				.then(b.transaction.nonce.cmp(&a.transaction.nonce))
		});
		records
	}

	/// Writes every tracked record to storage.
	pub async fn persist(&self, storage: &StorageService) -> Result<usize, StorageError> {
		let records: Vec<PendingTransaction> =
			read_pending(&self.pending, |map| map.values().cloned().collect());
		storage
			.store(StorageKey::PendingTransactions, RECORDS_ID, &records)
			.await?;
		Ok(records.len())
	}

	/// Loads persisted records that are not tracked yet.
	///
	/// Restored records are not watched again; their status changes only
	/// through a later speed-up or cancel.
	pub async fn restore(&self, storage: &StorageService) -> Result<usize, StorageError> {
		let records: Option<Vec<PendingTransaction>> = storage
			.retrieve_optional(StorageKey::PendingTransactions, RECORDS_ID)
			.await?;
		let Some(records) = records else {
			return Ok(0);
		};

		let mut restored = 0;
		for record in records {
			if record.status == TransactionStatus::Pending {
				let mut nonces = lock(&self.nonces);
				let next = nonces
					.entry((record.transaction.chain_id, record.transaction.from))
					.or_insert(0);
				*next = (*next).max(record.transaction.nonce + 1);
			}
			let inserted = update_pending(&self.pending, |map| {
				if map.contains_key(&record.hash) {
					false
				} else {
					map.insert(record.hash, record);
					true
				}
			});
			if inserted {
				restored += 1;
			}
		}
		Ok(restored)
	}

	/// Stops every watcher. Records keep their last status.
	pub fn shutdown(&self) {
		for handle in lock(&self.watchers).drain(..) {
			handle.abort();
		}
	}

	fn watch(
		&self,
		provider: Arc<dyn ProviderInterface>,
		tx_hash: B256,
		mut receiver: broadcast::Receiver<ProviderEvent>,
	) {
		let chain_id = provider.chain_id();
		let pending = self.pending.clone();
		let events = self.events.clone();

		let handle = tokio::spawn(async move {
			let wait = async {
				loop {
					match receiver.recv().await {
						Ok(ProviderEvent::TransactionConfirmed {
							tx_hash: hash,
							receipt,
							..
						}) if hash == tx_hash => return Some(*receipt),
						Ok(ProviderEvent::TransactionTimeout { tx_hash: hash, .. }) if hash == tx_hash => {
							return None
						},
						Ok(_) => {},
						Err(RecvError::Lagged(skipped)) => {
							tracing::warn!(chain_id, skipped, "Transaction watcher lagged behind provider events");
							// The skipped events may have held this transaction's outcome.
							match provider.get_transaction_receipt(tx_hash).await {
								Ok(Some(receipt)) => return Some(receipt),
								Ok(None) => {},
								Err(e) => {
									tracing::debug!(chain_id, error = %e, "Receipt lookup after lag failed");
								},
							}
						},
						Err(RecvError::Closed) => return None,
					}
				}
			};
			let receipt = tokio::time::timeout(TRANSACTION_MONITOR_CEILING + WATCH_GRACE, wait)
				.await
				.unwrap_or(None);
			settle(&pending, &events, chain_id, tx_hash, receipt);
		});
		let mut watchers = lock(&self.watchers);
		watchers.retain(|h| !h.is_finished());
		watchers.push(handle.abort_handle());
	}
}

/// Applies a watcher's outcome. A receipt settles pending and replaced
/// records alike; a timeout only settles records still pending.
fn settle(
	pending: &PendingMap,
	events: &EventBus<TransactionEvent>,
	chain_id: u64,
	tx_hash: B256,
	receipt: Option<TransactionReceipt>,
) {
	let status = match &receipt {
		Some(receipt) if receipt.success() => TransactionStatus::Confirmed,
		Some(_) => TransactionStatus::Failed,
		None => TransactionStatus::TimedOut,
	};
	let changed = update_pending(pending, |map| {
		let Some(record) = map.get_mut(&tx_hash) else {
			return false;
		};
		let applies = match status {
			TransactionStatus::TimedOut => record.status == TransactionStatus::Pending,
			_ => matches!(
				record.status,
				TransactionStatus::Pending | TransactionStatus::Replaced
			),
		};
		if applies {
			record.status = status;
			record.block_number = receipt.as_ref().and_then(|r| r.block_number);
		}
		applies
	});

	if changed {
		tracing::info!(
			chain_id,
			tx_hash = %truncate_id(&tx_hash.to_string()),
			status = ?status,
			"Transaction settled"
		);
		events.publish(TransactionEvent::StatusChanged {
			chain_id,
			tx_hash,
			status,
		});
	}
}
