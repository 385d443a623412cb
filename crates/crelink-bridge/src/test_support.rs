//! Scripted chains and a bridge context for unit tests.

use crate::BridgeContext;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use crelink_config::GasConfig;
use crelink_delivery::testing::MockSigner;
use crelink_delivery::TransactionOrchestrator;
use crelink_gas::GasPolicyEngine;
use crelink_provider::testing::{mock_block, MockTransport};
use crelink_provider::{
	OptimizationManager, OptimizationProfile, ProviderError, ProviderFactory, RpcCache, RpcTransport,
};
use crelink_types::{ChainDescriptor, ChainRegistry, Log, TransactionReceipt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const GWEI: u64 = 1_000_000_000;

pub struct TestChains {
	pub context: BridgeContext,
	pub transports: HashMap<u64, Arc<MockTransport>>,
	pub signer: Arc<MockSigner>,
}

impl TestChains {
	pub fn transport(&self, chain_id: u64) -> &MockTransport {
		&self.transports[&chain_id]
	}

	/// Answers every receipt lookup on `chain_id` with a successful receipt
	/// carrying `logs`.
	pub fn receipt_with_logs(&self, chain_id: u64, logs: Vec<Log>) {
		self.transport(chain_id)
			.handle("eth_getTransactionReceipt", move |params| {
				let hash: B256 = serde_json::from_value(params[0].clone())?;
				Ok(json!(receipt(hash, 1, logs.clone())))
			});
	}
}

pub fn sender() -> Address {
	Address::repeat_byte(0xaa)
}

pub fn receipt(hash: B256, status: u64, logs: Vec<Log>) -> TransactionReceipt {
	TransactionReceipt {
		transaction_hash: hash,
		block_number: Some(11),
		block_hash: Some(B256::repeat_byte(0x11)),
		from: sender(),
		to: None,
		gas_used: U256::from(50_000u64),
		effective_gas_price: None,
		status: Some(status),
		contract_address: None,
		logs,
	}
}

pub fn log(address: Address, topics: Vec<B256>, data: Vec<u8>) -> Log {
	Log {
		address,
		topics,
		data: data.into(),
		block_number: Some(11),
		transaction_hash: None,
		log_index: Some(0),
	}
}

/// A 32-byte ABI word holding `value`.
pub fn word(value: u64) -> Vec<u8> {
	U256::from(value).to_be_bytes::<32>().to_vec()
}

fn scripted(chain_id: u64) -> Arc<MockTransport> {
	let transport = Arc::new(MockTransport::new(chain_id));
	transport.set("eth_getBlockByNumber", mock_block(10, None));
	transport.set("eth_gasPrice", json!(U256::from(2 * GWEI)));
	transport.set("eth_getTransactionCount", json!("0x0"));
	transport.set("eth_estimateGas", json!("0x186a0"));
	transport.set("eth_getBalance", json!("0x0"));
	transport.set("eth_getTransactionReceipt", Value::Null);
	transport.handle("eth_sendRawTransaction", |params| {
		let raw: Bytes = serde_json::from_value(params[0].clone())?;
		Ok(json!(keccak256(&raw)))
	});
	transport
}

/// A context whose providers talk to one scripted transport per chain.
pub fn setup(chain_ids: &[u64]) -> TestChains {
	let transports: HashMap<u64, Arc<MockTransport>> =
		chain_ids.iter().map(|&id| (id, scripted(id))).collect();

	let routed = transports.clone();
	let providers = Arc::new(
		ProviderFactory::new(
			ChainRegistry::with_builtin(),
			Arc::new(OptimizationManager::default()),
			Arc::new(RpcCache::new(Duration::from_secs(30), 100)),
		)
		.with_transport_builder(Arc::new(
			move |descriptor: &ChainDescriptor, _: &OptimizationProfile| {
				routed
					.get(&descriptor.chain_id)
					.map(|t| t.clone() as Arc<dyn RpcTransport>)
					.ok_or(ProviderError::UnsupportedChain(descriptor.chain_id))
			},
		)),
	);
	let gas = Arc::new(GasPolicyEngine::new(
		GasConfig::default(),
		providers.optimization().clone(),
	));
	let signer = Arc::new(MockSigner::new(sender()));
	let transactions = Arc::new(TransactionOrchestrator::new(
		providers.clone(),
		gas.clone(),
		signer.clone(),
	));

	TestChains {
		context: BridgeContext {
			providers,
			gas,
			transactions,
		},
		transports,
		signer,
	}
}
