//! Scripted JSON-RPC transport for tests.
//!
//! Replies are resolved in this order: one-shot replies queued with
//! [`MockTransport::push`], then per-method handlers, then fixed replies set
//! with [`MockTransport::set`]. Unknown methods answer `-32601`.

use crate::transport::RpcTransport;
use crate::ProviderError;
use alloy_primitives::{B256, U256};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Handler = Arc<dyn Fn(&Value) -> Result<Value, ProviderError> + Send + Sync>;

#[derive(Default)]
struct MockState {
	queued: HashMap<String, VecDeque<Result<Value, ProviderError>>>,
	handlers: HashMap<String, Handler>,
	fixed: HashMap<String, Result<Value, ProviderError>>,
	delays: HashMap<String, Duration>,
	calls: Vec<(String, Value)>,
}

pub struct MockTransport {
	state: Mutex<MockState>,
}

impl MockTransport {
	/// A transport that reports `chain_id` from `eth_chainId`.
	pub fn new(chain_id: u64) -> Self {
		let transport = Self {
			state: Mutex::new(MockState::default()),
		};
		transport.set("eth_chainId", json!(format!("{:#x}", chain_id)));
		transport
	}

	fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
		let mut state = match self.state.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		f(&mut state)
	}

	pub fn set(&self, method: &str, value: Value) {
		self.with_state(|s| s.fixed.insert(method.to_string(), Ok(value)));
	}

	pub fn set_error(&self, method: &str, error: ProviderError) {
		self.with_state(|s| s.fixed.insert(method.to_string(), Err(error)));
	}

	pub fn push(&self, method: &str, value: Value) {
		self.with_state(|s| {
			s.queued
				.entry(method.to_string())
				.or_default()
				.push_back(Ok(value))
		});
	}

	pub fn push_error(&self, method: &str, error: ProviderError) {
		self.with_state(|s| {
			s.queued
				.entry(method.to_string())
				.or_default()
				.push_back(Err(error))
		});
	}

	/// Answers `method` by calling `handler` with the request params.
	pub fn handle<F>(&self, method: &str, handler: F)
	where
		F: Fn(&Value) -> Result<Value, ProviderError> + Send + Sync + 'static,
	{
		self.with_state(|s| s.handlers.insert(method.to_string(), Arc::new(handler)));
	}

	/// Delays every reply to `method`.
	pub fn set_delay(&self, method: &str, delay: Duration) {
		self.with_state(|s| s.delays.insert(method.to_string(), delay));
	}

	/// Number of requests received for `method`.
	pub fn calls(&self, method: &str) -> usize {
		self.with_state(|s| s.calls.iter().filter(|(m, _)| m == method).count())
	}

	/// Params of every request received for `method`, oldest first.
	pub fn params_of(&self, method: &str) -> Vec<Value> {
		self.with_state(|s| {
			s.calls
				.iter()
				.filter(|(m, _)| m == method)
				.map(|(_, p)| p.clone())
				.collect()
		})
	}

	pub fn total_calls(&self) -> usize {
		self.with_state(|s| s.calls.len())
	}
}

#[async_trait]
impl RpcTransport for MockTransport {
	async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
		let (delay, reply) = self.with_state(|s| {
			s.calls.push((method.to_string(), params.clone()));
			let delay = s.delays.get(method).copied();
			let reply = if let Some(next) = s.queued.get_mut(method).and_then(|q| q.pop_front()) {
				Some(next)
			} else if let Some(handler) = s.handlers.get(method).cloned() {
				Some(handler(&params))
			} else {
				s.fixed.get(method).cloned()
			};
			(delay, reply)
		});

		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		reply.unwrap_or_else(|| {
			Err(ProviderError::Rpc {
				code: -32601,
				message: format!("the method {} does not exist/is not available", method),
				data: None,
			})
		})
	}

	fn endpoint(&self) -> &str {
		"mock://"
	}
}

/// JSON block object as a node returns it.
pub fn mock_block(number: u64, base_fee: Option<U256>) -> Value {
	let mut block = json!({
		"number": format!("{:#x}", number),
		"hash": B256::with_last_byte(number as u8),
		"parentHash": B256::with_last_byte(number.saturating_sub(1) as u8),
		"timestamp": format!("{:#x}", 1_700_000_000 + number * 12),
		"gasLimit": "0x1c9c380",
		"gasUsed": "0xe4e1c0",
		"transactions": []
	});
	if let Some(base_fee) = base_fee {
		block["baseFeePerGas"] = json!(base_fee);
	}
	block
}

/// Receipt JSON with the given status (`1` success, `0` revert).
pub fn mock_receipt(hash: B256, block_number: u64, status: u64) -> Value {
	json!({
		"transactionHash": hash,
		"blockNumber": format!("{:#x}", block_number),
		"blockHash": B256::with_last_byte(block_number as u8),
		"from": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
		"to": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
		"gasUsed": "0x5208",
		"effectiveGasPrice": "0x3b9aca00",
		"status": format!("{:#x}", status),
		"logs": []
	})
}
