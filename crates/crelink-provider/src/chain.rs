//! JSON-RPC provider for a single chain.
//!
//! The provider verifies the endpoint's chain id on connect and, once
//! initialized, polls the block number on a fixed interval. Every height
//! between the last block it reported and the current head is fetched and
//! published as its own [`ProviderEvent::Block`], lowest first, so slow
//! polling never skips a block. Disconnecting pauses the poller; the next
//! successful connect resumes it from the last published height.

use crate::interface::{ProviderInterface, ProviderState};
use crate::transport::RpcTransport;
use crate::ProviderError;
use async_trait::async_trait;
use crelink_types::{parse_quantity, ChainDescriptor, EventBus, ProviderEvent, RpcBlock};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Height of the last block published by the poller.
type LastSeen = Arc<Mutex<Option<u64>>>;

pub struct ChainProvider {
	descriptor: ChainDescriptor,
	transport: Arc<dyn RpcTransport>,
	events: EventBus<ProviderEvent>,
	state: watch::Sender<ProviderState>,
	connect_lock: tokio::sync::Mutex<()>,
	block_polling: Option<Duration>,
	last_seen: LastSeen,
	poller: Mutex<Option<JoinHandle<()>>>,
	/// Set by `initialize`; connects resume polling while it holds.
	polling_requested: AtomicBool,
}

impl ChainProvider {
	/// Creates a disconnected provider. Block polling defaults to the
	/// chain's average block time.
	pub fn new(descriptor: ChainDescriptor, transport: Arc<dyn RpcTransport>) -> Self {
		let block_polling = Some(Duration::from_millis(descriptor.block_time_ms.max(100)));
		let (state, _) = watch::channel(ProviderState::Disconnected);
		Self {
			descriptor,
			transport,
			events: EventBus::default(),
			state,
			connect_lock: tokio::sync::Mutex::new(()),
			block_polling,
			last_seen: Arc::new(Mutex::new(None)),
			poller: Mutex::new(None),
			polling_requested: AtomicBool::new(false),
		}
	}

	/// Sets the block polling interval; `None` disables polling.
	pub fn with_block_polling(mut self, interval: Option<Duration>) -> Self {
		self.block_polling = interval;
		self
	}

	/// Publishes onto an existing bus instead of a private one.
	pub fn with_events(mut self, events: EventBus<ProviderEvent>) -> Self {
		self.events = events;
		self
	}

	pub fn descriptor(&self) -> &ChainDescriptor {
		&self.descriptor
	}

	pub fn transport(&self) -> &Arc<dyn RpcTransport> {
		&self.transport
	}

	/// Receiver that observes every state change.
	pub fn watch_state(&self) -> watch::Receiver<ProviderState> {
		self.state.subscribe()
	}

	/// Last block height published to subscribers.
	pub fn last_block_number(&self) -> Option<u64> {
		*lock(&self.last_seen)
	}

	pub fn is_polling(&self) -> bool {
		match self.poller.lock() {
			Ok(poller) => poller.as_ref().is_some_and(|h| !h.is_finished()),
			Err(poisoned) => poisoned.get_ref().as_ref().is_some_and(|h| !h.is_finished()),
		}
	}

	async fn verify_chain_id(&self) -> Result<(), ProviderError> {
		let value = self.transport.request("eth_chainId", json!([])).await?;
		let reported = value
			.as_str()
			.ok_or_else(|| ProviderError::Decode(format!("eth_chainId returned {}", value)))?;
		let actual = parse_quantity(reported)?;
		if actual != self.descriptor.chain_id {
			return Err(ProviderError::ChainMismatch {
				expected: self.descriptor.chain_id,
				actual,
			});
		}
		Ok(())
	}

	fn start_polling(&self, interval: Duration) {
		let mut poller = match self.poller.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		if poller.as_ref().is_some_and(|h| !h.is_finished()) {
			return;
		}

		let transport = self.transport.clone();
		let events = self.events.clone();
		let last_seen = self.last_seen.clone();
		let chain_id = self.descriptor.chain_id;

		*poller = Some(tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
			// The first tick completes immediately; the baseline is already set.
			ticker.tick().await;
			loop {
				ticker.tick().await;
				if let Err(e) = poll_blocks(transport.as_ref(), chain_id, &events, &last_seen).await {
					tracing::warn!(chain_id, error = %e, "Block poll failed");
					events.publish(ProviderEvent::Error {
						chain_id,
						error: e.to_string(),
					});
				}
			}
		}));
		tracing::debug!(chain_id, interval_ms = interval.as_millis() as u64, "Block polling started");
	}

	fn stop_polling(&self) {
		let handle = match self.poller.lock() {
			Ok(mut guard) => guard.take(),
			Err(poisoned) => poisoned.into_inner().take(),
		};
		if let Some(handle) = handle {
			handle.abort();
		}
	}
}

impl Drop for ChainProvider {
	fn drop(&mut self) {
		self.stop_polling();
	}
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
	match mutex.lock() {
		Ok(guard) => guard,
		Err(poisoned) => poisoned.into_inner(),
	}
}

async fn fetch_block_number(transport: &dyn RpcTransport) -> Result<u64, ProviderError> {
	let value = transport.request("eth_blockNumber", json!([])).await?;
	let hex = value
		.as_str()
		.ok_or_else(|| ProviderError::Decode(format!("eth_blockNumber returned {}", value)))?;
	Ok(parse_quantity(hex)?)
}

/// One poll tick. Publishes every block after the last seen height up to
/// the current head and returns how many were published.
///
/// A failed or missing block ends the tick; the next tick resumes from the
/// last block that was published.
async fn poll_blocks(
	transport: &dyn RpcTransport,
	chain_id: u64,
	events: &EventBus<ProviderEvent>,
	last_seen: &LastSeen,
) -> Result<usize, ProviderError> {
	let head = fetch_block_number(transport).await?;
	let start = match *lock(last_seen) {
		Some(seen) => seen + 1,
		None => head,
	};

	let mut published = 0;
	for height in start..=head {
		let value = transport
			.request("eth_getBlockByNumber", json!([format!("{:#x}", height), false]))
			.await?;
		let block: Option<RpcBlock> = serde_json::from_value(value)?;
		let Some(block) = block else {
			tracing::debug!(chain_id, height, "Block not yet available");
			break;
		};
		*lock(last_seen) = Some(height);
		events.publish(ProviderEvent::Block {
			chain_id,
			block: Box::new(block),
		});
		published += 1;
	}
	Ok(published)
}

#[async_trait]
impl ProviderInterface for ChainProvider {
	fn chain_id(&self) -> u64 {
		self.descriptor.chain_id
	}

	fn state(&self) -> ProviderState {
		*self.state.borrow()
	}

	fn events(&self) -> EventBus<ProviderEvent> {
		self.events.clone()
	}

	/// Connects and, when polling is enabled, records the current head as
	/// the baseline and starts the poller.
	async fn initialize(&self) -> Result<(), ProviderError> {
		self.connect().await?;
		if let Some(interval) = self.block_polling {
			if lock(&self.last_seen).is_none() {
				let head = fetch_block_number(self.transport.as_ref()).await?;
				*lock(&self.last_seen) = Some(head);
			}
			self.polling_requested.store(true, Ordering::SeqCst);
			self.start_polling(interval);
		}
		tracing::info!(
			chain_id = self.descriptor.chain_id,
			endpoint = self.transport.endpoint(),
			"Provider initialized"
		);
		Ok(())
	}

	async fn connect(&self) -> Result<(), ProviderError> {
		let _guard = self.connect_lock.lock().await;
		if self.state() == ProviderState::Connected {
			return Ok(());
		}

		let chain_id = self.descriptor.chain_id;
		self.state.send_replace(ProviderState::Connecting);
		match self.verify_chain_id().await {
			Ok(()) => {
				self.state.send_replace(ProviderState::Connected);
				self.events.publish(ProviderEvent::Connect { chain_id });
				tracing::debug!(chain_id, "Provider connected");
				if let Some(interval) = self.block_polling {
					if self.polling_requested.load(Ordering::SeqCst) {
						self.start_polling(interval);
					}
				}
				Ok(())
			},
			Err(e) => {
				self.state.send_replace(ProviderState::Error);
				self.events.publish(ProviderEvent::Error {
					chain_id,
					error: e.to_string(),
				});
				tracing::warn!(chain_id, error = %e, "Provider connection failed");
				Err(e)
			},
		}
	}

	async fn disconnect(&self) -> Result<(), ProviderError> {
		self.stop_polling();
		let previous = self.state.send_replace(ProviderState::Disconnected);
		if previous != ProviderState::Disconnected {
			self.events.publish(ProviderEvent::Disconnect {
				chain_id: self.descriptor.chain_id,
			});
		}
		Ok(())
	}

	async fn send(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
		if self.state() != ProviderState::Connected {
			self.connect().await?;
		}
		self.transport.request(method, params).await
	}
}
