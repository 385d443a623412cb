//! Gas policy module for the CreLink chain engine.
//!
//! Turns live fee data into four speed tiers. Chains whose latest block
//! carries a base fee are priced from `eth_feeHistory`; all others from
//! `eth_gasPrice` clamped to the chain's minimum. The engine also pads gas
//! limit estimates and derives speed-up and cancel replacements for stuck
//! transactions.

use alloy_primitives::{Bytes, U256};
use crelink_config::GasConfig;
use crelink_provider::{OptimizationManager, ProviderError, ProviderInterface};
use crelink_types::{
	current_timestamp, BlockTag, FeeEstimate, FeeFields, GasInfo, GasSpeed, Transaction,
	TransactionRequest,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while computing fees.
#[derive(Debug, Error)]
pub enum GasError {
	#[error("Provider error: {0}")]
	Provider(#[from] ProviderError),
	/// Fee data was present but could not be turned into a recommendation.
	#[error("Gas error: {0}")]
	Computation(String),
}

/// Blocks sampled from `eth_feeHistory`.
pub const FEE_HISTORY_BLOCKS: u64 = 20;
/// Reward percentiles requested from `eth_feeHistory`.
pub const FEE_HISTORY_PERCENTILES: [f64; 4] = [10.0, 30.0, 60.0, 90.0];
/// Column of [`FEE_HISTORY_PERCENTILES`] used as the reference tip.
const REFERENCE_PERCENTILE: usize = FEE_HISTORY_PERCENTILES.len() / 2;

// Tier multipliers in basis points, ordered safe low, standard, fast, fastest.
const PRIORITY_MULTIPLIERS_BPS: [u64; 4] = [9_000, 10_000, 16_000, 25_000];
const BASE_FEE_MULTIPLIERS_BPS: [u64; 4] = [12_000, 15_000, 20_000, 30_000];
const LEGACY_MULTIPLIERS_BPS: [u64; 4] = [9_000, 10_000, 13_000, 17_000];

const GWEI: f64 = 1_000_000_000.0;
const LOW_CONGESTION_GWEI: f64 = 1.0;
const HIGH_CONGESTION_GWEI: f64 = 100.0;
const LOW_CONGESTION_SCORE: f64 = 0.1;
const HIGH_CONGESTION_SCORE: f64 = 1.0;

/// Gas used by a plain value transfer.
pub const TRANSFER_GAS: u64 = 21_000;

fn mul_bps(value: U256, bps: u64) -> U256 {
	value * U256::from(bps) / U256::from(10_000u64)
}

/// Congestion score in `[0.1, 1.0]` for a price per gas, interpolated
/// linearly between 1 gwei and 100 gwei.
pub fn congestion_score(price_per_gas: U256) -> f64 {
	let gwei = u128::try_from(price_per_gas).unwrap_or(u128::MAX) as f64 / GWEI;
	if gwei <= LOW_CONGESTION_GWEI {
		return LOW_CONGESTION_SCORE;
	}
	if gwei >= HIGH_CONGESTION_GWEI {
		return HIGH_CONGESTION_SCORE;
	}
	let position = (gwei - LOW_CONGESTION_GWEI) / (HIGH_CONGESTION_GWEI - LOW_CONGESTION_GWEI);
	LOW_CONGESTION_SCORE + position * (HIGH_CONGESTION_SCORE - LOW_CONGESTION_SCORE)
}

/// Average reward per percentile column over the sampled blocks.
fn average_rewards(rewards: &[Vec<U256>]) -> Vec<U256> {
	(0..FEE_HISTORY_PERCENTILES.len())
		.map(|column| {
			let samples: Vec<U256> = rewards.iter().filter_map(|row| row.get(column).copied()).collect();
			if samples.is_empty() {
				U256::ZERO
			} else {
				samples.iter().fold(U256::ZERO, |acc, v| acc + *v) / U256::from(samples.len())
			}
		})
		.collect()
}

fn cap(value: U256, max: Option<U256>) -> U256 {
	match max {
		Some(max) => value.min(max),
		None => value,
	}
}

fn assemble(tiers: [FeeFields; 4], congestion: f64, base_fee: Option<U256>) -> GasInfo {
	GasInfo {
		fees: tiers[1],
		safe_low: tiers[0],
		standard: tiers[1],
		fast: tiers[2],
		fastest: tiers[3],
		network_congestion: congestion,
		base_fee,
		eip1559: base_fee.is_some(),
		last_updated: current_timestamp(),
	}
}

pub struct GasPolicyEngine {
	config: GasConfig,
	optimization: Arc<OptimizationManager>,
}

impl GasPolicyEngine {
	pub fn new(config: GasConfig, optimization: Arc<OptimizationManager>) -> Self {
		Self {
			config,
			optimization,
		}
	}

	pub fn config(&self) -> &GasConfig {
		&self.config
	}

	/// Fee recommendation for every speed tier on the provider's chain.
	pub async fn get_gas_info(&self, provider: &dyn ProviderInterface) -> Result<GasInfo, GasError> {
		let chain_id = provider.chain_id();
		let latest = provider.get_block(BlockTag::Latest).await?;
		let info = match latest.and_then(|block| block.base_fee_per_gas) {
			Some(base_fee) => self.eip1559_info(provider, base_fee).await?,
			None => self.legacy_info(provider).await?,
		};
		tracing::debug!(
			chain_id,
			eip1559 = info.eip1559,
			congestion = info.network_congestion,
			"Computed gas info"
		);
		Ok(info)
	}

	async fn eip1559_info(
		&self,
		provider: &dyn ProviderInterface,
		block_base_fee: U256,
	) -> Result<GasInfo, GasError> {
		let (_, max_price) = self.optimization.gas_bounds(provider.chain_id());
		let history = provider
			.get_fee_history(FEE_HISTORY_BLOCKS, BlockTag::Latest, &FEE_HISTORY_PERCENTILES)
			.await?;
		let base_fee = history.next_base_fee().unwrap_or(block_base_fee);

		let priority_fee = match history.reward.as_deref() {
			Some(rewards) if !rewards.is_empty() => average_rewards(rewards)[REFERENCE_PERCENTILE],
			_ => {
				let value = provider.send("eth_maxPriorityFeePerGas", json!([])).await?;
				serde_json::from_value(value).map_err(|e| {
					GasError::Computation(format!("Invalid eth_maxPriorityFeePerGas result: {}", e))
				})?
			},
		};

		let tiers = [0, 1, 2, 3].map(|i| {
			let tip = mul_bps(priority_fee, PRIORITY_MULTIPLIERS_BPS[i]);
			let max_fee = cap(mul_bps(base_fee, BASE_FEE_MULTIPLIERS_BPS[i]) + tip, max_price);
			FeeFields::Eip1559 {
				max_fee_per_gas: max_fee,
				max_priority_fee_per_gas: tip.min(max_fee),
			}
		});
		Ok(assemble(
			tiers,
			congestion_score(base_fee + priority_fee),
			Some(base_fee),
		))
	}

	async fn legacy_info(&self, provider: &dyn ProviderInterface) -> Result<GasInfo, GasError> {
		let (min_price, max_price) = self.optimization.gas_bounds(provider.chain_id());
		let gas_price = provider.get_gas_price().await?.max(min_price);
		let tiers = LEGACY_MULTIPLIERS_BPS.map(|bps| FeeFields::Legacy {
			gas_price: cap(mul_bps(gas_price, bps), max_price),
		});
		Ok(assemble(tiers, congestion_score(gas_price), None))
	}

	/// Fee fields for one speed tier.
	pub async fn fees_for(
		&self,
		provider: &dyn ProviderInterface,
		speed: GasSpeed,
	) -> Result<FeeFields, GasError> {
		Ok(self.get_gas_info(provider).await?.tier(speed))
	}

	/// `eth_estimateGas` padded by the configured percentage.
	///
	/// `fallback` is returned unchanged only when estimation fails.
	pub async fn estimate_gas_limit(
		&self,
		provider: &dyn ProviderInterface,
		request: &TransactionRequest,
		fallback: Option<U256>,
	) -> Result<U256, GasError> {
		match provider.estimate_gas(request).await {
			Ok(raw) => Ok(self.pad_gas_limit(raw)),
			Err(e) => match fallback {
				Some(limit) => {
					tracing::warn!(
						chain_id = provider.chain_id(),
						error = %e,
						fallback = %limit,
						"Gas estimation failed, using fallback limit"
					);
					Ok(limit)
				},
				None => Err(e.into()),
			},
		}
	}

	pub fn pad_gas_limit(&self, raw: U256) -> U256 {
		let percent = U256::from(100 + self.config.gas_limit_padding_percent);
		(raw * percent).div_ceil(U256::from(100u64))
	}

	/// Cost of a transaction with `gas_limit` at every speed tier.
	pub fn fee_estimates(&self, gas_limit: U256, info: &GasInfo) -> Vec<FeeEstimate> {
		GasSpeed::ALL
			.iter()
			.map(|speed| FeeEstimate::new(*speed, gas_limit, info.tier(*speed)))
			.collect()
	}

	fn bump_bps(&self) -> u64 {
		10_000 + self.config.speed_up_percent * 100
	}

	/// Replacement of `original` at the same nonce with every fee field
	/// raised by the speed-up percentage.
	pub fn speed_up(&self, original: &Transaction) -> Transaction {
		Transaction {
			fees: original.fees.scale_bps(self.bump_bps()),
			..original.clone()
		}
	}

	/// Zero-value transfer to the sender at the original nonce, superseding
	/// `original` once mined.
	pub fn cancel(&self, original: &Transaction) -> Transaction {
		let fees = if self.config.bump_cancel_fees {
			original.fees.scale_bps(self.bump_bps())
		} else {
			original.fees
		};
		Transaction {
			from: original.from,
			to: Some(original.from),
			value: U256::ZERO,
			data: Bytes::new(),
			nonce: original.nonce,
			chain_id: original.chain_id,
			gas_limit: U256::from(TRANSFER_GAS),
			fees,
		}
	}
}
