//! Chain switch module for the CreLink chain engine.
//!
//! Tracks the selected chain of every session, remembers which chain a
//! contract or dApp origin was last used on, and infers the target chain of
//! an incoming transaction from that memory. Every switch attempt other
//! than a no-op is recorded in a bounded history.

use alloy_primitives::Address;
use async_trait::async_trait;
use crelink_config::SwitchConfig;
use crelink_types::{
	current_timestamp, ChainRegistry, ChainSwitchContext, ChainSwitchResult, EventBus, SessionId,
	SwitchEvent, TransactionRequest,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Errors that can occur while configuring the switch engine.
#[derive(Debug, Error)]
pub enum SwitchError {
	#[error("Chain {0} is not supported")]
	UnsupportedChain(u64),
}

/// A switch the engine wants to perform on a dApp's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchRequest {
	pub session: SessionId,
	pub from_chain_id: u64,
	pub to_chain_id: u64,
	pub origin: Option<String>,
}

/// Approves or refuses automatic switches when confirmation is enforced.
#[async_trait]
pub trait SwitchConfirmer: Send + Sync {
	async fn confirm(&self, request: &SwitchRequest) -> bool;
}

#[derive(Default)]
struct SwitchState {
	current: HashMap<SessionId, u64>,
	contracts: HashMap<Address, u64>,
	origins: HashMap<String, u64>,
	history: VecDeque<ChainSwitchResult>,
}

pub struct ChainSwitchEngine {
	registry: ChainRegistry,
	config: SwitchConfig,
	default_chain_id: u64,
	state: RwLock<SwitchState>,
	confirmer: RwLock<Option<Arc<dyn SwitchConfirmer>>>,
	events: EventBus<SwitchEvent>,
}

impl ChainSwitchEngine {
	/// Creates an engine whose sessions start on `default_chain_id`.
	pub fn new(registry: ChainRegistry, config: SwitchConfig, default_chain_id: u64) -> Self {
		Self {
			registry,
			config,
			default_chain_id,
			state: RwLock::new(SwitchState::default()),
			confirmer: RwLock::new(None),
			events: EventBus::default(),
		}
	}

	fn read(&self) -> RwLockReadGuard<'_, SwitchState> {
		match self.state.read() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		}
	}

	fn write(&self) -> RwLockWriteGuard<'_, SwitchState> {
		match self.state.write() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		}
	}

	pub fn events(&self) -> EventBus<SwitchEvent> {
		self.events.clone()
	}

	pub fn config(&self) -> &SwitchConfig {
		&self.config
	}

	pub fn registry(&self) -> &ChainRegistry {
		&self.registry
	}

	/// Installs the confirmer consulted when `force_confirmation` is set.
	pub fn set_confirmer(&self, confirmer: Arc<dyn SwitchConfirmer>) {
		let mut slot = match self.confirmer.write() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		*slot = Some(confirmer);
	}

	fn confirmer(&self) -> Option<Arc<dyn SwitchConfirmer>> {
		match self.confirmer.read() {
			Ok(guard) => guard.clone(),
			Err(poisoned) => poisoned.into_inner().clone(),
		}
	}

	/// Selected chain of a session. Sessions that never switched follow
	/// the default session.
	pub fn current_chain_id(&self, session: &SessionId) -> u64 {
		let state = self.read();
		state
			.current
			.get(session)
			.or_else(|| state.current.get(&SessionId::default()))
			.copied()
			.unwrap_or(self.default_chain_id)
	}

	/// Forgets a session's selection.
	pub fn end_session(&self, session: &SessionId) {
		if !session.is_default() {
			self.write().current.remove(session);
		}
	}

	pub fn register_contract(&self, contract: Address, chain_id: u64) -> Result<(), SwitchError> {
		if !self.registry.is_supported(chain_id) {
			return Err(SwitchError::UnsupportedChain(chain_id));
		}
		self.write().contracts.insert(contract, chain_id);
		Ok(())
	}

	pub fn register_origin(&self, origin: &str, chain_id: u64) -> Result<(), SwitchError> {
		if !self.registry.is_supported(chain_id) {
			return Err(SwitchError::UnsupportedChain(chain_id));
		}
		self.write().origins.insert(origin.to_string(), chain_id);
		Ok(())
	}

	pub fn contract_chain(&self, contract: &Address) -> Option<u64> {
		self.read().contracts.get(contract).copied()
	}

	pub fn origin_chain(&self, origin: &str) -> Option<u64> {
		self.read().origins.get(origin).copied()
	}

	fn record(&self, state: &mut SwitchState, result: ChainSwitchResult) {
		state.history.push_back(result);
		while state.history.len() > self.config.history_size {
			state.history.pop_front();
		}
	}

	fn fail(&self, context: &ChainSwitchContext, target: u64, error: String) -> ChainSwitchResult {
		let previous = self.current_chain_id(&context.session);
		let result = ChainSwitchResult {
			session: context.session.clone(),
			previous_chain_id: previous,
			chain_id: target,
			success: false,
			error: Some(error),
			timestamp: current_timestamp(),
			dapp_initiated: context.dapp_initiated,
		};
		tracing::warn!(
			session = %context.session,
			chain_id = target,
			error = result.error.as_deref().unwrap_or_default(),
			"Chain switch failed"
		);
		{
			let mut state = self.write();
			self.record(&mut state, result.clone());
		}
		self.events.publish(SwitchEvent::SwitchFailed {
			result: result.clone(),
		});
		result
	}

	/// Switches a session to `target`.
	///
	/// Never fails with an error; an unsupported target yields a result
	/// with `success == false`. Switching to the current chain succeeds
	/// without changing state or emitting an event, but is still recorded
	/// in the history with `previous_chain_id == chain_id`.
	pub fn switch_chain(&self, target: u64, context: &ChainSwitchContext) -> ChainSwitchResult {
		let previous = self.current_chain_id(&context.session);
		if target == previous {
			let result = ChainSwitchResult {
				session: context.session.clone(),
				previous_chain_id: previous,
				chain_id: target,
				success: true,
				error: None,
				timestamp: current_timestamp(),
				dapp_initiated: context.dapp_initiated,
			};
			let mut state = self.write();
			self.record(&mut state, result.clone());
			return result;
		}
		if !self.registry.is_supported(target) {
			return self.fail(context, target, format!("Chain {} is not supported", target));
		}

		let result = ChainSwitchResult {
			session: context.session.clone(),
			previous_chain_id: previous,
			chain_id: target,
			success: true,
			error: None,
			timestamp: current_timestamp(),
			dapp_initiated: context.dapp_initiated,
		};
		{
			let mut state = self.write();
			state.current.insert(context.session.clone(), target);
			if let Some(contract) = context.contract_address {
				state.contracts.insert(contract, target);
			}
			if let Some(origin) = &context.origin {
				state.origins.insert(origin.clone(), target);
			}
			self.record(&mut state, result.clone());
		}

		tracing::info!(
			session = %context.session,
			previous_chain_id = previous,
			chain_id = target,
			dapp_initiated = context.dapp_initiated,
			"Switched chain"
		);
		self.events.publish(SwitchEvent::ChainChanged {
			session: context.session.clone(),
			previous_chain_id: previous,
			chain_id: target,
		});
		result
	}

	/// Chain a transaction belongs to: its explicit chain id, else the chain
	/// its target contract was last used on, else the chain the origin was
	/// last used on.
	pub fn detect_chain_from_transaction(
		&self,
		tx: &TransactionRequest,
		origin: Option<&str>,
	) -> Option<u64> {
		if let Some(chain_id) = tx.chain_id {
			return Some(chain_id);
		}
		let state = self.read();
		if let Some(chain_id) = tx.to.and_then(|to| state.contracts.get(&to).copied()) {
			return Some(chain_id);
		}
		origin.and_then(|origin| state.origins.get(origin).copied())
	}

	/// Switches the session to the chain detected for `tx` when it differs
	/// from the current one and automatic switching is enabled.
	///
	/// Returns `None` when nothing was attempted. With `force_confirmation`
	/// set the installed confirmer must approve; without one the switch is
	/// refused.
	pub async fn auto_switch_chain(
		&self,
		tx: &TransactionRequest,
		context: &ChainSwitchContext,
	) -> Option<ChainSwitchResult> {
		if !self.config.auto_switch {
			return None;
		}
		let detected = self.detect_chain_from_transaction(tx, context.origin.as_deref())?;
		let current = self.current_chain_id(&context.session);
		if detected == current {
			return None;
		}

		let context = ChainSwitchContext {
			contract_address: context.contract_address.or(tx.to),
			..context.clone()
		}
		.dapp_initiated(false);

		if self.config.force_confirmation {
			let Some(confirmer) = self.confirmer() else {
				return Some(self.fail(
					&context,
					detected,
					"Switch requires confirmation but no confirmer is installed".to_string(),
				));
			};
			let request = SwitchRequest {
				session: context.session.clone(),
				from_chain_id: current,
				to_chain_id: detected,
				origin: context.origin.clone(),
			};
			if !confirmer.confirm(&request).await {
				return Some(self.fail(&context, detected, "Switch rejected by user".to_string()));
			}
		}

		Some(self.switch_chain(detected, &context))
	}

	/// Switch results, oldest first, optionally for one session only.
	pub fn history(&self, session: Option<&SessionId>) -> Vec<ChainSwitchResult> {
		self.read()
			.history
			.iter()
			.filter(|r| session.is_none_or(|s| &r.session == s))
			.cloned()
			.collect()
	}

	pub fn clear_history(&self) {
		self.write().history.clear();
	}
}
