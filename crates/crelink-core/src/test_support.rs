//! A wallet engine over scripted chains for unit tests.

use crate::{WalletBuilder, WalletEngine};
use alloy_primitives::{keccak256, Address, Bytes, U256};
use crelink_config::Config;
use crelink_delivery::testing::MockSigner;
use crelink_provider::testing::{mock_block, MockTransport};
use crelink_provider::{OptimizationProfile, ProviderError, RpcTransport};
use crelink_types::ChainDescriptor;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

const CHAINS: [u64; 3] = [1000, 1, 42161];

pub struct TestWallet {
	pub engine: WalletEngine,
	pub transports: HashMap<u64, Arc<MockTransport>>,
	pub signer: Arc<MockSigner>,
}

impl TestWallet {
	pub fn transport(&self, chain_id: u64) -> &MockTransport {
		&self.transports[&chain_id]
	}
}

pub fn sender() -> Address {
	Address::repeat_byte(0xaa)
}

fn scripted(chain_id: u64) -> Arc<MockTransport> {
	let transport = Arc::new(MockTransport::new(chain_id));
	transport.set("eth_getBlockByNumber", mock_block(10, None));
	transport.set("eth_blockNumber", json!("0xa"));
	transport.set("eth_gasPrice", json!(U256::from(2_000_000_000u64)));
	transport.set("eth_getTransactionCount", json!("0x0"));
	transport.set("eth_estimateGas", json!("0x5208"));
	transport.set("eth_getBalance", json!("0x0"));
	transport.set("eth_getTransactionReceipt", Value::Null);
	transport.handle("eth_sendRawTransaction", |params| {
		let raw: Bytes = serde_json::from_value(params[0].clone())?;
		Ok(json!(keccak256(&raw)))
	});
	transport
}

/// Builds an engine from `config` with every builtin test chain scripted.
pub async fn build(config: &str) -> TestWallet {
	let config: Config = config.parse().unwrap();
	let transports: HashMap<u64, Arc<MockTransport>> =
		CHAINS.iter().map(|&id| (id, scripted(id))).collect();
	let routed = transports.clone();
	let signer = Arc::new(MockSigner::new(sender()));

	let engine = WalletBuilder::new(config)
		.with_signer(signer.clone())
		.with_transport_builder(Arc::new(
			move |descriptor: &ChainDescriptor, _: &OptimizationProfile| {
				routed
					.get(&descriptor.chain_id)
					.map(|t| t.clone() as Arc<dyn RpcTransport>)
					.ok_or(ProviderError::UnsupportedChain(descriptor.chain_id))
			},
		))
		.build()
		.await
		.unwrap();

	TestWallet {
		engine,
		transports,
		signer,
	}
}
