//! RPC response caching.
//!
//! [`TtlCache`] is a keyed cache with per-entry expiry and a size bound.
//! When the bound is exceeded the entry created first is dropped; reads do
//! not refresh an entry's position. [`RpcCache`] layers JSON-RPC semantics on
//! top: keys are `<chain id>:<method>:<params json>`, only read-only methods
//! on an allow-list are cached, and each method has its own time-to-live.
//! Methods without a fixed time-to-live use the default of the chain they
//! were sent to, and each chain may also cap its own share of the entries.

use crelink_storage::{StorageError, StorageService};
use crelink_types::StorageKey;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

struct CacheEntry<V> {
	value: V,
	created_at: Instant,
	expires_at: Instant,
	/// Insertion order, breaks ties between entries created at the same instant.
	seq: u64,
}

/// Keyed cache with per-entry expiry.
pub struct TtlCache<V> {
	entries: HashMap<String, CacheEntry<V>>,
	default_ttl: Duration,
	max_size: usize,
	next_seq: u64,
}

impl<V: Clone> TtlCache<V> {
	pub fn new(default_ttl: Duration, max_size: usize) -> Self {
		Self {
			entries: HashMap::new(),
			default_ttl,
			max_size: max_size.max(1),
			next_seq: 0,
		}
	}

	pub fn default_ttl(&self) -> Duration {
		self.default_ttl
	}

	/// Inserts or replaces `key`. A replaced entry counts as newly created.
	pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
		let now = Instant::now();
		let ttl = ttl.unwrap_or(self.default_ttl);
		self.next_seq += 1;
		self.entries.insert(
			key.into(),
			CacheEntry {
				value,
				created_at: now,
				expires_at: now + ttl,
				seq: self.next_seq,
			},
		);
		if self.entries.len() > self.max_size {
			self.evict_oldest();
		}
	}

	fn evict_oldest(&mut self) {
		let oldest = self
			.entries
			.iter()
			.min_by_key(|(_, entry)| (entry.created_at, entry.seq))
			.map(|(key, _)| key.clone());
		if let Some(key) = oldest {
			self.entries.remove(&key);
		}
	}

	/// Returns the value if it has not expired. Expired entries are removed.
	pub fn get(&mut self, key: &str) -> Option<V> {
		let now = Instant::now();
		match self.entries.get(key) {
			Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
			Some(_) => {
				self.entries.remove(key);
				None
			},
			None => None,
		}
	}

	pub fn has(&mut self, key: &str) -> bool {
		self.get(key).is_some()
	}

	pub fn delete(&mut self, key: &str) -> bool {
		self.entries.remove(key).is_some()
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	/// Removes every entry whose expiry lies strictly in the past.
	pub fn cleanup(&mut self) -> usize {
		let now = Instant::now();
		let before = self.entries.len();
		self.entries.retain(|_, entry| entry.expires_at >= now);
		before - self.entries.len()
	}

	fn live(&self) -> impl Iterator<Item = (&String, &CacheEntry<V>)> {
		let now = Instant::now();
		self.entries
			.iter()
			.filter(move |(_, entry)| now < entry.expires_at)
	}

	pub fn keys(&self) -> Vec<String> {
		self.live().map(|(key, _)| key.clone()).collect()
	}

	pub fn values(&self) -> Vec<V> {
		self.live().map(|(_, entry)| entry.value.clone()).collect()
	}

	pub fn entries(&self) -> Vec<(String, V)> {
		self.live()
			.map(|(key, entry)| (key.clone(), entry.value.clone()))
			.collect()
	}

	/// Live entries with the time each has left.
	pub fn entries_with_ttl(&self) -> Vec<(String, V, Duration)> {
		let now = Instant::now();
		self.live()
			.map(|(key, entry)| (key.clone(), entry.value.clone(), entry.expires_at - now))
			.collect()
	}

	/// Drops the oldest entries under `prefix` until at most `limit` remain.
	pub fn trim_prefix(&mut self, prefix: &str, limit: usize) -> usize {
		let mut matching: Vec<(Instant, u64, String)> = self
			.entries
			.iter()
			.filter(|(key, _)| key.starts_with(prefix))
			.map(|(key, entry)| (entry.created_at, entry.seq, key.clone()))
			.collect();
		if matching.len() <= limit {
			return 0;
		}
		matching.sort();
		let excess = matching.len() - limit;
		for (_, _, key) in matching.into_iter().take(excess) {
			self.entries.remove(&key);
		}
		excess
	}

	/// Deletes every key matching `pattern` and returns how many were removed.
	pub fn delete_pattern(&mut self, pattern: &Regex) -> usize {
		let before = self.entries.len();
		self.entries.retain(|key, _| !pattern.is_match(key));
		before - self.entries.len()
	}

	/// Number of stored entries, including expired ones not yet swept.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

/// Cacheable methods and their time-to-live. `None` uses the cache default.
static METHOD_TTLS: Lazy<HashMap<&'static str, Option<Duration>>> = Lazy::new(|| {
	HashMap::from([
		("eth_chainId", Some(Duration::from_secs(300))),
		("net_version", Some(Duration::from_secs(300))),
		("eth_blockNumber", Some(Duration::from_secs(3))),
		("eth_gasPrice", Some(Duration::from_secs(5))),
		("eth_maxPriorityFeePerGas", Some(Duration::from_secs(5))),
		("eth_feeHistory", Some(Duration::from_secs(5))),
		("eth_getBlockByNumber", Some(Duration::from_secs(3))),
		("eth_getBlockByHash", Some(Duration::from_secs(60))),
		("eth_getTransactionByHash", Some(Duration::from_secs(10))),
		("eth_getTransactionReceipt", Some(Duration::from_secs(60))),
		("eth_getCode", Some(Duration::from_secs(300))),
		("eth_getLogs", Some(Duration::from_secs(30))),
		("eth_getBalance", None),
		("eth_getStorageAt", None),
		("eth_call", None),
		("eth_estimateGas", None),
	])
});

/// Cache hit and size counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
	pub entries: usize,
	pub hits: u64,
	pub misses: u64,
}

impl CacheStats {
	pub fn hit_rate(&self) -> f64 {
		let total = self.hits + self.misses;
		if total == 0 {
			0.0
		} else {
			self.hits as f64 / total as f64
		}
	}
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
	key: String,
	value: Value,
	ttl_ms: u64,
}

const SNAPSHOT_ID: &str = "snapshot";

/// Shared JSON-RPC response cache.
pub struct RpcCache {
	inner: Mutex<TtlCache<Value>>,
	hits: AtomicU64,
	misses: AtomicU64,
}

impl RpcCache {
	pub fn new(default_ttl: Duration, max_size: usize) -> Self {
		Self {
			inner: Mutex::new(TtlCache::new(default_ttl, max_size)),
			hits: AtomicU64::new(0),
			misses: AtomicU64::new(0),
		}
	}

	fn lock(&self) -> MutexGuard<'_, TtlCache<Value>> {
		match self.inner.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		}
	}

	pub fn cache_key(chain_id: u64, method: &str, params: &Value) -> String {
		format!("{}:{}:{}", chain_id, method, params)
	}

	/// True for read-only methods whose results may be reused.
	pub fn is_cacheable(method: &str) -> bool {
		METHOD_TTLS.contains_key(method)
	}

	/// Fixed time-to-live of a method, `None` when it follows a default.
	pub fn fixed_ttl(method: &str) -> Option<Duration> {
		METHOD_TTLS.get(method).copied().flatten()
	}

	pub fn ttl_for(&self, method: &str) -> Duration {
		Self::fixed_ttl(method).unwrap_or_else(|| self.lock().default_ttl())
	}

	/// Cached result for a request, if present and fresh.
	pub fn get(&self, chain_id: u64, method: &str, params: &Value) -> Option<Value> {
		if !Self::is_cacheable(method) {
			return None;
		}
		let key = Self::cache_key(chain_id, method, params);
		let value = self.lock().get(&key);
		if value.is_some() {
			self.hits.fetch_add(1, Ordering::Relaxed);
			tracing::trace!(key = %key, "RPC cache hit");
		} else {
			self.misses.fetch_add(1, Ordering::Relaxed);
		}
		value
	}

	/// Stores a result. Returns false when the method is not cacheable or
	/// the result is `null`, which nodes return for data that may appear later.
	pub fn set(&self, chain_id: u64, method: &str, params: &Value, value: Value) -> bool {
		if !Self::is_cacheable(method) || value.is_null() {
			return false;
		}
		let ttl = self.ttl_for(method);
		self.lock()
			.set(Self::cache_key(chain_id, method, params), value, Some(ttl));
		true
	}

	/// Like [`RpcCache::set`], under a chain's own limits: `default_ttl`
	/// replaces the cache default for methods without a fixed TTL and the
	/// chain keeps at most `max_entries` responses, oldest dropped first.
	pub fn set_scoped(
		&self,
		chain_id: u64,
		method: &str,
		params: &Value,
		value: Value,
		default_ttl: Duration,
		max_entries: usize,
	) -> bool {
		if !Self::is_cacheable(method) || value.is_null() {
			return false;
		}
		let ttl = Self::fixed_ttl(method).unwrap_or(default_ttl);
		let mut inner = self.lock();
		inner.set(Self::cache_key(chain_id, method, params), value, Some(ttl));
		let evicted = inner.trim_prefix(&format!("{}:", chain_id), max_entries.max(1));
		if evicted > 0 {
			tracing::trace!(chain_id, evicted, "Chain cache limit reached");
		}
		true
	}

	/// Drops every cached response for one chain.
	pub fn invalidate_chain(&self, chain_id: u64) -> usize {
		let pattern = match Regex::new(&format!("^{}:", chain_id)) {
			Ok(pattern) => pattern,
			Err(_) => return 0,
		};
		self.lock().delete_pattern(&pattern)
	}

	pub fn delete_pattern(&self, pattern: &Regex) -> usize {
		self.lock().delete_pattern(pattern)
	}

	pub fn clear(&self) {
		self.lock().clear();
	}

	pub fn cleanup(&self) -> usize {
		self.lock().cleanup()
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	pub fn stats(&self) -> CacheStats {
		CacheStats {
			entries: self.len(),
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
		}
	}

	/// Writes live entries, with their remaining lifetime, to storage.
	pub async fn persist(&self, storage: &StorageService) -> Result<usize, StorageError> {
		let snapshot: Vec<PersistedEntry> = self
			.lock()
			.entries_with_ttl()
			.into_iter()
			.map(|(key, value, ttl)| PersistedEntry {
				key,
				value,
				ttl_ms: ttl.as_millis() as u64,
			})
			.collect();
		storage
			.store(StorageKey::RpcCache, SNAPSHOT_ID, &snapshot)
			.await?;
		Ok(snapshot.len())
	}

	/// Loads a snapshot written by [`persist`](Self::persist).
	pub async fn restore(&self, storage: &StorageService) -> Result<usize, StorageError> {
		let snapshot: Option<Vec<PersistedEntry>> = storage
			.retrieve_optional(StorageKey::RpcCache, SNAPSHOT_ID)
			.await?;
		let Some(snapshot) = snapshot else {
			return Ok(0);
		};
		let mut cache = self.lock();
		let mut restored = 0;
		for entry in snapshot.into_iter().filter(|e| e.ttl_ms > 0) {
			cache.set(entry.key, entry.value, Some(Duration::from_millis(entry.ttl_ms)));
			restored += 1;
		}
		Ok(restored)
	}

	/// Sweep cadence: half the default TTL, at least one second.
	pub fn sweep_interval(&self) -> Duration {
		(self.lock().default_ttl() / 2).max(Duration::from_secs(1))
	}

	/// Starts the background sweep. The task ends once the cache is dropped.
	pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
		let cache = Arc::downgrade(self);
		let interval = self.sweep_interval();
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.tick().await;
			loop {
				ticker.tick().await;
				let Some(cache) = cache.upgrade() else {
					break;
				};
				let removed = cache.cleanup();
				if removed > 0 {
					tracing::debug!(removed, "Swept expired RPC cache entries");
				}
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crelink_storage::implementations::memory::MemoryStorage;
	use serde_json::json;

	#[tokio::test(start_paused = true)]
	async fn test_expiry_boundary() {
		let mut cache = TtlCache::new(Duration::from_millis(5000), 10);
		cache.set("k", "v".to_string(), None);
		assert_eq!(cache.get("k").as_deref(), Some("v"));

		tokio::time::advance(Duration::from_millis(4999)).await;
		assert!(cache.has("k"));

		tokio::time::advance(Duration::from_millis(2)).await;
		assert_eq!(cache.get("k"), None);
		assert!(cache.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn test_get_misses_at_expiry_but_cleanup_keeps_it() {
		let mut cache = TtlCache::new(Duration::from_secs(1), 10);
		cache.set("a", 1, None);
		tokio::time::advance(Duration::from_secs(1)).await;

		// expires_at == now: unreadable, but not yet strictly past.
		assert_eq!(cache.keys(), Vec::<String>::new());
		assert_eq!(cache.cleanup(), 0);
		assert_eq!(cache.len(), 1);

		tokio::time::advance(Duration::from_millis(1)).await;
		assert_eq!(cache.cleanup(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_evicts_oldest_created_not_least_used() {
		let mut cache = TtlCache::new(Duration::from_secs(60), 2);
		cache.set("first", 1, None);
		tokio::time::advance(Duration::from_millis(10)).await;
		cache.set("second", 2, None);

		// Reading does not protect an entry from eviction.
		assert_eq!(cache.get("first"), Some(1));
		cache.set("third", 3, None);

		assert_eq!(cache.get("first"), None);
		assert_eq!(cache.get("second"), Some(2));
		assert_eq!(cache.get("third"), Some(3));
	}

	#[tokio::test(start_paused = true)]
	async fn test_same_instant_evicts_by_insertion_order() {
		let mut cache = TtlCache::new(Duration::from_secs(60), 2);
		cache.set("a", 1, None);
		cache.set("b", 2, None);
		cache.set("c", 3, None);
		let mut keys = cache.keys();
		keys.sort();
		assert_eq!(keys, vec!["b".to_string(), "c".to_string()]);
	}

	#[tokio::test(start_paused = true)]
	async fn test_delete_pattern_and_entries() {
		let mut cache = TtlCache::new(Duration::from_secs(60), 10);
		cache.set("1:eth_call:[]", json!("0x1"), None);
		cache.set("1:eth_getBalance:[]", json!("0x2"), None);
		cache.set("137:eth_call:[]", json!("0x3"), None);

		let removed = cache.delete_pattern(&Regex::new("^1:").unwrap());
		assert_eq!(removed, 2);
		assert_eq!(cache.entries(), vec![("137:eth_call:[]".to_string(), json!("0x3"))]);
		assert!(cache.delete("137:eth_call:[]"));
		assert!(!cache.delete("137:eth_call:[]"));
	}

	#[test]
	fn test_key_format() {
		let params = json!(["0x0000000000000000000000000000000000000001", "latest"]);
		assert_eq!(
			RpcCache::cache_key(1000, "eth_getBalance", &params),
			"1000:eth_getBalance:[\"0x0000000000000000000000000000000000000001\",\"latest\"]"
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_allow_list_and_method_ttls() {
		let cache = RpcCache::new(Duration::from_secs(30), 100);
		let params = json!([]);

		assert!(!cache.set(1, "eth_sendRawTransaction", &params, json!("0xabc")));
		assert!(!cache.set(1, "eth_getTransactionCount", &params, json!("0x1")));
		assert!(!cache.set(1, "eth_getTransactionReceipt", &params, Value::Null));
		assert!(cache.set(1, "eth_blockNumber", &params, json!("0x10")));
		assert!(cache.set(1, "net_version", &params, json!("1")));

		assert_eq!(cache.ttl_for("eth_getBlockByHash"), Duration::from_secs(60));
		assert_eq!(cache.ttl_for("eth_call"), Duration::from_secs(30));

		tokio::time::advance(Duration::from_secs(3)).await;
		assert_eq!(cache.get(1, "eth_blockNumber", &params), None);
		assert_eq!(cache.get(1, "net_version", &params), Some(json!("1")));

		let stats = cache.stats();
		assert_eq!((stats.hits, stats.misses), (1, 1));
		assert_eq!(stats.hit_rate(), 0.5);
	}

	#[tokio::test(start_paused = true)]
	async fn test_scoped_set_uses_chain_limits() {
		let cache = RpcCache::new(Duration::from_secs(30), 100);
		let short = Duration::from_secs(1);

		assert!(cache.set_scoped(1, "eth_call", &json!([1]), json!("0x1"), short, 2));
		assert!(cache.set_scoped(1, "eth_chainId", &json!([]), json!("0x1"), short, 2));
		assert!(!cache.set_scoped(1, "eth_sendRawTransaction", &json!([]), json!("0x"), short, 2));

		tokio::time::advance(Duration::from_secs(2)).await;
		// eth_call follows the chain default, eth_chainId keeps its fixed TTL.
		assert_eq!(cache.get(1, "eth_call", &json!([1])), None);
		assert_eq!(cache.get(1, "eth_chainId", &json!([])), Some(json!("0x1")));

		cache.set(10, "eth_call", &json!([1]), json!("0xa"));
		cache.set_scoped(1, "eth_call", &json!([2]), json!("0x2"), short, 2);
		cache.set_scoped(1, "eth_call", &json!([3]), json!("0x3"), short, 2);
		assert_eq!(cache.get(1, "eth_chainId", &json!([])), None);
		assert_eq!(cache.get(1, "eth_call", &json!([3])), Some(json!("0x3")));
		assert_eq!(cache.get(10, "eth_call", &json!([1])), Some(json!("0xa")));
	}

	#[tokio::test(start_paused = true)]
	async fn test_invalidate_chain() {
		let cache = RpcCache::new(Duration::from_secs(30), 100);
		cache.set(1, "eth_chainId", &json!([]), json!("0x1"));
		cache.set(10, "eth_chainId", &json!([]), json!("0xa"));
		assert_eq!(cache.invalidate_chain(1), 1);
		assert!(cache.get(10, "eth_chainId", &json!([])).is_some());
	}

	#[tokio::test(start_paused = true)]
	async fn test_persist_and_restore_keep_remaining_ttl() {
		let storage = StorageService::new(Box::new(MemoryStorage::new()));
		let cache = RpcCache::new(Duration::from_secs(30), 100);
		cache.set(1, "eth_getCode", &json!(["0x01", "latest"]), json!("0x6080"));
		tokio::time::advance(Duration::from_secs(100)).await;
		assert_eq!(cache.persist(&storage).await.unwrap(), 1);

		let restored = RpcCache::new(Duration::from_secs(30), 100);
		assert_eq!(restored.restore(&storage).await.unwrap(), 1);
		assert!(restored
			.get(1, "eth_getCode", &json!(["0x01", "latest"]))
			.is_some());

		tokio::time::advance(Duration::from_secs(200)).await;
		assert!(restored
			.get(1, "eth_getCode", &json!(["0x01", "latest"]))
			.is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn test_sweeper_removes_expired_entries() {
		let cache = Arc::new(RpcCache::new(Duration::from_secs(4), 100));
		assert_eq!(cache.sweep_interval(), Duration::from_secs(2));
		cache.set(1, "eth_call", &json!([]), json!("0x"));
		let handle = cache.spawn_sweeper();

		// Ticks at 2s and 4s leave the entry (it expires exactly at 4s); 6s removes it.
		tokio::time::sleep(Duration::from_secs(5)).await;
		assert_eq!(cache.len(), 1);
		tokio::time::sleep(Duration::from_secs(2)).await;
		assert_eq!(cache.len(), 0);

		drop(cache);
		tokio::time::sleep(Duration::from_secs(3)).await;
		assert!(handle.is_finished());
	}

	#[test]
	fn test_sweep_interval_floor() {
		let cache = RpcCache::new(Duration::from_millis(500), 10);
		assert_eq!(cache.sweep_interval(), Duration::from_secs(1));
	}
}
