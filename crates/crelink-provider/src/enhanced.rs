//! Provider decorator adding caching, coalescing, timeouts and retries.
//!
//! Every request passes through the same pipeline: a fresh cached result is
//! returned immediately; an identical request already in flight is joined
//! instead of sent again; otherwise the request runs against the inner
//! provider under a deadline and transient failures are retried with a
//! growing delay. Submitted transactions are watched until a receipt shows
//! up or [`TRANSACTION_MONITOR_CEILING`] passes.

use crate::cache::RpcCache;
use crate::interface::{ProviderInterface, ProviderState};
use crate::optimization::OptimizationProfile;
use crate::ProviderError;
use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use crelink_types::{truncate_id, EventBus, ProviderEvent, TransactionReceipt};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};

/// Transactions without a receipt after this long are reported as timed out.
pub const TRANSACTION_MONITOR_CEILING: Duration = Duration::from_secs(10 * 60);

/// How transaction monitoring ended.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorOutcome {
	Confirmed(Box<TransactionReceipt>),
	TimedOut,
}

type InFlight = Shared<BoxFuture<'static, Result<Value, ProviderError>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	match mutex.lock() {
		Ok(guard) => guard,
		Err(poisoned) => poisoned.into_inner(),
	}
}

pub struct EnhancedProvider {
	inner: Arc<dyn ProviderInterface>,
	cache: Option<Arc<RpcCache>>,
	profile: OptimizationProfile,
	in_flight: Mutex<HashMap<String, InFlight>>,
	monitors: Mutex<Vec<AbortHandle>>,
}

impl EnhancedProvider {
	pub fn new(inner: Arc<dyn ProviderInterface>, profile: OptimizationProfile) -> Self {
		Self {
			inner,
			cache: None,
			profile,
			in_flight: Mutex::new(HashMap::new()),
			monitors: Mutex::new(Vec::new()),
		}
	}

	/// Caches read-only results when the profile enables caching.
	pub fn with_cache(mut self, cache: Arc<RpcCache>) -> Self {
		self.cache = Some(cache);
		self
	}

	pub fn inner(&self) -> &Arc<dyn ProviderInterface> {
		&self.inner
	}

	pub fn profile(&self) -> &OptimizationProfile {
		&self.profile
	}

	fn active_cache(&self) -> Option<&Arc<RpcCache>> {
		self.cache.as_ref().filter(|_| self.profile.enable_cache)
	}

	/// Number of distinct requests currently waiting on the inner provider.
	pub fn in_flight(&self) -> usize {
		lock(&self.in_flight).len()
	}

	/// Number of transaction monitors still running.
	pub fn active_monitors(&self) -> usize {
		let mut monitors = lock(&self.monitors);
		monitors.retain(|handle| !handle.is_finished());
		monitors.len()
	}

	/// Runs one request with the deadline and retry policy.
	///
	/// The inner call runs as its own task. On timeout the task is left to
	/// finish and its result is dropped.
	async fn execute(
		inner: Arc<dyn ProviderInterface>,
		profile: OptimizationProfile,
		method: String,
		params: Value,
	) -> Result<Value, ProviderError> {
		let timeout = profile.request_timeout();
		let mut attempt = 0u32;
		loop {
			let request = {
				let inner = inner.clone();
				let method = method.clone();
				let params = params.clone();
				tokio::spawn(async move { inner.send(&method, params).await })
			};
			let result = match tokio::time::timeout(timeout, request).await {
				Ok(Ok(result)) => result,
				Ok(Err(join_error)) => Err(ProviderError::Network(format!(
					"Request task failed: {}",
					join_error
				))),
				Err(_) => Err(ProviderError::Timeout(timeout)),
			};

			match result {
				Err(e) if e.is_transient() && attempt < profile.max_retries => {
					let delay = profile.backoff(attempt);
					tracing::warn!(
						chain_id = profile.chain_id,
						method = %method,
						attempt = attempt + 1,
						delay_ms = delay.as_millis() as u64,
						error = %e,
						"Retrying RPC request"
					);
					tokio::time::sleep(delay).await;
					attempt += 1;
				},
				other => return other,
			}
		}
	}

	/// Polls for the receipt of `tx_hash` and publishes the outcome.
	///
	/// Polling stops at the first receipt or once
	/// [`TRANSACTION_MONITOR_CEILING`] has passed.
	pub fn monitor_transaction(&self, tx_hash: B256) -> JoinHandle<MonitorOutcome> {
		let inner = self.inner.clone();
		let events = self.inner.events();
		let chain_id = self.inner.chain_id();
		let interval = self.profile.transaction_polling_interval();

		let handle = tokio::spawn(async move {
			let start_time = tokio::time::Instant::now();
			let hash = tx_hash.to_string();
			loop {
				if start_time.elapsed() >= TRANSACTION_MONITOR_CEILING {
					tracing::warn!(
						chain_id,
						tx_hash = %truncate_id(&hash),
						"Transaction monitoring timeout reached after {} minutes",
						TRANSACTION_MONITOR_CEILING.as_secs() / 60
					);
					events.publish(ProviderEvent::TransactionTimeout { chain_id, tx_hash });
					return MonitorOutcome::TimedOut;
				}

				match inner.get_transaction_receipt(tx_hash).await {
					Ok(Some(receipt)) => {
						tracing::info!(
							chain_id,
							tx_hash = %truncate_id(&hash),
							success = receipt.success(),
							"Transaction confirmed"
						);
						let receipt = Box::new(receipt);
						events.publish(ProviderEvent::TransactionConfirmed {
							chain_id,
							tx_hash,
							receipt: receipt.clone(),
						});
						return MonitorOutcome::Confirmed(receipt);
					},
					Ok(None) => {
						tracing::debug!(
							elapsed_secs = start_time.elapsed().as_secs(),
							"Waiting for transaction to be mined"
						);
					},
					Err(e) => {
						tracing::debug!(error = %e, "Checking transaction status");
					},
				}

				tokio::time::sleep(interval).await;
			}
		});
		lock(&self.monitors).push(handle.abort_handle());
		handle
	}
}

#[async_trait]
impl ProviderInterface for EnhancedProvider {
	fn chain_id(&self) -> u64 {
		self.inner.chain_id()
	}

	fn state(&self) -> ProviderState {
		self.inner.state()
	}

	fn events(&self) -> EventBus<ProviderEvent> {
		self.inner.events()
	}

	async fn initialize(&self) -> Result<(), ProviderError> {
		self.inner.initialize().await
	}

	async fn connect(&self) -> Result<(), ProviderError> {
		self.inner.connect().await
	}

	/// Disconnects the inner provider and stops transaction monitors.
	async fn disconnect(&self) -> Result<(), ProviderError> {
		for handle in lock(&self.monitors).drain(..) {
			handle.abort();
		}
		self.inner.disconnect().await
	}

	async fn send(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
		let chain_id = self.inner.chain_id();
		if let Some(cache) = self.active_cache() {
			if let Some(value) = cache.get(chain_id, method, &params) {
				return Ok(value);
			}
		}

		let key = RpcCache::cache_key(chain_id, method, &params);
		let request = {
			let mut in_flight = lock(&self.in_flight);
			match in_flight.get(&key) {
				Some(existing) => {
					tracing::trace!(method, "Joining in-flight request");
					existing.clone()
				},
				None => {
					let request = Self::execute(
						self.inner.clone(),
						self.profile.clone(),
						method.to_string(),
						params.clone(),
					)
					.boxed()
					.shared();
					in_flight.insert(key.clone(), request.clone());
					request
				},
			}
		};

		let result = request.clone().await;
		{
			let mut in_flight = lock(&self.in_flight);
			if in_flight.get(&key).is_some_and(|f| f.ptr_eq(&request)) {
				in_flight.remove(&key);
			}
		}

		if let (Ok(value), Some(cache)) = (&result, self.active_cache()) {
			cache.set_scoped(
				chain_id,
				method,
				&params,
				value.clone(),
				self.profile.cache_ttl(),
				self.profile.cache_max_size,
			);
		}
		result
	}

	/// Broadcasts a signed transaction and starts monitoring it.
	async fn send_transaction(&self, signed: &Bytes) -> Result<B256, ProviderError> {
		let value = self.send("eth_sendRawTransaction", json!([signed])).await?;
		let tx_hash: B256 = serde_json::from_value(value)?;
		let chain_id = self.inner.chain_id();
		self.inner
			.events()
			.publish(ProviderEvent::TransactionSubmitted { chain_id, tx_hash });
		tracing::info!(chain_id, tx_hash = %truncate_id(&tx_hash.to_string()), "Transaction submitted");
		self.monitor_transaction(tx_hash);
		Ok(tx_hash)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{mock_receipt, MockTransport};
	use crate::ChainProvider;
	use crelink_types::get_network_info;
	use std::time::Duration;
	use tokio::time::Instant;

	fn setup(
		transport: Arc<MockTransport>,
		configure: impl FnOnce(&mut OptimizationProfile),
	) -> EnhancedProvider {
		let descriptor = get_network_info(1000).unwrap().clone();
		let mut profile = OptimizationProfile::for_chain(&descriptor);
		configure(&mut profile);
		let inner = ChainProvider::new(descriptor, transport).with_block_polling(None);
		EnhancedProvider::new(Arc::new(inner), profile)
	}

	fn balance_params() -> Value {
		json!(["0x0101010101010101010101010101010101010101", "latest"])
	}

	#[tokio::test(start_paused = true)]
	async fn test_cached_result_skips_transport() {
		let transport = Arc::new(MockTransport::new(1000));
		transport.set("eth_getBalance", json!("0x64"));
		let cache = Arc::new(RpcCache::new(Duration::from_secs(30), 100));
		let provider = setup(transport.clone(), |_| {}).with_cache(cache.clone());

		for _ in 0..3 {
			let value = provider.send("eth_getBalance", balance_params()).await.unwrap();
			assert_eq!(value, json!("0x64"));
		}
		assert_eq!(transport.calls("eth_getBalance"), 1);
		assert_eq!(cache.stats().hits, 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_chain_cache_ttl_applies_to_default_methods() {
		let transport = Arc::new(MockTransport::new(1000));
		transport.set("eth_call", json!("0x01"));
		let cache = Arc::new(RpcCache::new(Duration::from_secs(30), 100));
		let provider =
			setup(transport.clone(), |p| p.cache_ttl_ms = 1_000).with_cache(cache.clone());
		let params = json!([{ "to": "0x0101010101010101010101010101010101010101" }, "latest"]);

		provider.send("eth_call", params.clone()).await.unwrap();
		provider.send("eth_call", params.clone()).await.unwrap();
		assert_eq!(transport.calls("eth_call"), 1);

		tokio::time::advance(Duration::from_secs(2)).await;
		provider.send("eth_call", params).await.unwrap();
		assert_eq!(transport.calls("eth_call"), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_chain_cache_size_is_bounded() {
		let transport = Arc::new(MockTransport::new(1000));
		transport.set("eth_getBalance", json!("0x64"));
		let cache = Arc::new(RpcCache::new(Duration::from_secs(30), 100));
		let provider =
			setup(transport.clone(), |p| p.cache_max_size = 2).with_cache(cache.clone());

		for byte in 1..=3u8 {
			let address = format!("0x{}", format!("{:02x}", byte).repeat(20));
			provider.send("eth_getBalance", json!([address, "latest"])).await.unwrap();
		}
		assert_eq!(cache.len(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_cache_disabled_by_profile() {
		let transport = Arc::new(MockTransport::new(1000));
		transport.set("eth_getBalance", json!("0x64"));
		let cache = Arc::new(RpcCache::new(Duration::from_secs(30), 100));
		let provider =
			setup(transport.clone(), |p| p.enable_cache = false).with_cache(cache.clone());

		provider.send("eth_getBalance", balance_params()).await.unwrap();
		provider.send("eth_getBalance", balance_params()).await.unwrap();
		assert_eq!(transport.calls("eth_getBalance"), 2);
		assert!(cache.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn test_concurrent_identical_requests_coalesce() {
		let transport = Arc::new(MockTransport::new(1000));
		transport.set("eth_getBalance", json!("0x64"));
		transport.set_delay("eth_getBalance", Duration::from_millis(200));
		let provider = setup(transport.clone(), |_| {});
		provider.connect().await.unwrap();

		let (a, b, c) = tokio::join!(
			provider.send("eth_getBalance", balance_params()),
			provider.send("eth_getBalance", balance_params()),
			provider.send("eth_getBalance", json!(["0x02", "latest"])),
		);
		assert_eq!(a.unwrap(), json!("0x64"));
		assert_eq!(b.unwrap(), json!("0x64"));
		assert!(c.is_ok());
		assert_eq!(transport.calls("eth_getBalance"), 2);
		assert_eq!(provider.in_flight(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_transient_errors_retry_with_backoff() {
		let transport = Arc::new(MockTransport::new(1000));
		transport.push_error("eth_gasPrice", ProviderError::Network("reset".into()));
		transport.push_error("eth_gasPrice", ProviderError::Network("reset".into()));
		transport.set("eth_gasPrice", json!("0x3b9aca00"));
		let provider = setup(transport.clone(), |p| p.max_retries = 3);

		let start = Instant::now();
		let value = provider.send("eth_gasPrice", json!([])).await.unwrap();
		assert_eq!(value, json!("0x3b9aca00"));
		assert_eq!(transport.calls("eth_gasPrice"), 3);
		// 1000ms then 1500ms
		assert!(start.elapsed() >= Duration::from_millis(2_500));
	}

	#[tokio::test(start_paused = true)]
	async fn test_retries_exhausted() {
		let transport = Arc::new(MockTransport::new(1000));
		transport.set_error("eth_gasPrice", ProviderError::Network("down".into()));
		let provider = setup(transport.clone(), |p| p.max_retries = 2);

		let result = provider.send("eth_gasPrice", json!([])).await;
		assert!(matches!(result, Err(ProviderError::Network(_))));
		assert_eq!(transport.calls("eth_gasPrice"), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn test_rpc_errors_are_not_retried() {
		let transport = Arc::new(MockTransport::new(1000));
		transport.set_error(
			"eth_estimateGas",
			ProviderError::Rpc {
				code: 3,
				message: "execution reverted".into(),
				data: None,
			},
		);
		let provider = setup(transport.clone(), |p| p.max_retries = 3);

		let result = provider.send("eth_estimateGas", json!([{}])).await;
		assert!(matches!(result, Err(ProviderError::Rpc { code: 3, .. })));
		assert_eq!(transport.calls("eth_estimateGas"), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_request_timeout() {
		let transport = Arc::new(MockTransport::new(1000));
		transport.set("eth_getLogs", json!([]));
		transport.set_delay("eth_getLogs", Duration::from_secs(60));
		let provider = setup(transport.clone(), |p| {
			p.request_timeout_ms = 1_000;
			p.max_retries = 0;
		});

		let start = Instant::now();
		let result = provider.send("eth_getLogs", json!([{}])).await;
		assert!(matches!(result, Err(ProviderError::Timeout(d)) if d == Duration::from_secs(1)));
		assert!(start.elapsed() < Duration::from_secs(2));
	}

	#[tokio::test(start_paused = true)]
	async fn test_send_transaction_monitors_until_confirmed() {
		let hash = B256::repeat_byte(0xab);
		let transport = Arc::new(MockTransport::new(1000));
		transport.set("eth_sendRawTransaction", json!(hash));
		transport.push("eth_getTransactionReceipt", Value::Null);
		transport.push("eth_getTransactionReceipt", Value::Null);
		transport.set("eth_getTransactionReceipt", mock_receipt(hash, 42, 1));
		let provider = setup(transport.clone(), |_| {});
		let mut events = provider.events().subscribe();

		let tx_hash = provider
			.send_transaction(&Bytes::from_static(&[0x02, 0x01]))
			.await
			.unwrap();
		assert_eq!(tx_hash, hash);

		tokio::time::sleep(Duration::from_secs(30)).await;
		let mut seen = Vec::new();
		while let Ok(event) = events.try_recv() {
			seen.push(event);
		}
		assert!(matches!(seen[0], ProviderEvent::Connect { .. }));
		assert!(matches!(seen[1], ProviderEvent::TransactionSubmitted { tx_hash, .. } if tx_hash == hash));
		match &seen[2] {
			ProviderEvent::TransactionConfirmed { receipt, .. } => {
				assert_eq!(receipt.block_number, Some(42));
				assert!(receipt.success());
			},
			other => panic!("unexpected {:?}", other),
		}
		assert_eq!(transport.calls("eth_getTransactionReceipt"), 3);
		assert_eq!(provider.active_monitors(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_monitor_times_out_at_ceiling() {
		let transport = Arc::new(MockTransport::new(1000));
		transport.set("eth_getTransactionReceipt", Value::Null);
		let provider = setup(transport.clone(), |_| {});
		let mut events = provider.events().subscribe();

		let start = Instant::now();
		let outcome = provider.monitor_transaction(B256::ZERO).await.unwrap();
		assert_eq!(outcome, MonitorOutcome::TimedOut);
		assert!(start.elapsed() >= TRANSACTION_MONITOR_CEILING);
		assert!(start.elapsed() < TRANSACTION_MONITOR_CEILING + Duration::from_secs(10));

		let mut timed_out = false;
		while let Ok(event) = events.try_recv() {
			timed_out |= matches!(event, ProviderEvent::TransactionTimeout { .. });
		}
		assert!(timed_out);
	}
}
