//! Chain provider module for the CreLink chain engine.
//!
//! A provider owns the JSON-RPC connection to one chain. [`ChainProvider`]
//! is the plain implementation: it connects lazily, polls for new blocks
//! and exposes typed accessors. [`EnhancedProvider`] wraps any provider and
//! adds response caching, request coalescing, timeouts, retry with backoff
//! and transaction confirmation monitoring. [`ProviderFactory`] hands out
//! one shared instance per chain and provider kind.

use crelink_types::ValidationError;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub mod cache;
pub mod chain;
pub mod contracts;
pub mod enhanced;
pub mod factory;
pub mod interface;
pub mod optimization;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::{CacheStats, RpcCache, TtlCache};
pub use chain::ChainProvider;
pub use enhanced::{EnhancedProvider, MonitorOutcome, TRANSACTION_MONITOR_CEILING};
pub use factory::{ProviderFactory, ProviderKind, TransportBuilder};
pub use interface::{ProviderInterface, ProviderState};
pub use optimization::{OptimizationManager, OptimizationProfile};
pub use transport::{HttpTransport, RpcTransport};

/// Errors that can occur during provider operations.
#[derive(Debug, Error, Clone)]
pub enum ProviderError {
	/// The endpoint could not be reached or returned a non-JSON-RPC reply.
	#[error("Network error: {0}")]
	Network(String),
	/// The node answered with a JSON-RPC error object.
	#[error("RPC error {code}: {message}")]
	Rpc {
		code: i64,
		message: String,
		data: Option<Value>,
	},
	#[error("Request timed out after {0:?}")]
	Timeout(Duration),
	#[error("Chain {0} is not supported")]
	UnsupportedChain(u64),
	/// The endpoint serves a different chain than the one configured.
	#[error("Chain id mismatch: expected {expected}, endpoint reports {actual}")]
	ChainMismatch { expected: u64, actual: u64 },
	#[error("Validation error: {0}")]
	Validation(#[from] ValidationError),
	/// A result could not be decoded into the expected shape.
	#[error("Decode error: {0}")]
	Decode(String),
}

impl ProviderError {
	/// Failures worth retrying: the request may succeed if sent again.
	pub fn is_transient(&self) -> bool {
		matches!(self, ProviderError::Network(_) | ProviderError::Timeout(_))
	}
}

impl From<serde_json::Error> for ProviderError {
	fn from(err: serde_json::Error) -> Self {
		ProviderError::Decode(err.to_string())
	}
}
