//! Gas recommendation types.

use crate::transaction::FeeFields;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inclusion speed a caller asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasSpeed {
	SafeLow,
	#[default]
	Standard,
	Fast,
	Fastest,
}

impl GasSpeed {
	pub const ALL: [GasSpeed; 4] = [
		GasSpeed::SafeLow,
		GasSpeed::Standard,
		GasSpeed::Fast,
		GasSpeed::Fastest,
	];
}

impl fmt::Display for GasSpeed {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			GasSpeed::SafeLow => "safe_low",
			GasSpeed::Standard => "standard",
			GasSpeed::Fast => "fast",
			GasSpeed::Fastest => "fastest",
		};
		f.write_str(name)
	}
}

impl FromStr for GasSpeed {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"safe_low" | "safelow" | "low" | "slow" => Ok(GasSpeed::SafeLow),
			"standard" | "average" => Ok(GasSpeed::Standard),
			"fast" => Ok(GasSpeed::Fast),
			"fastest" | "instant" => Ok(GasSpeed::Fastest),
			other => Err(format!("unknown gas speed '{}'", other)),
		}
	}
}

/// Fee recommendation for every speed tier.
///
/// All four tiers share the same fee model: either every tier is legacy or
/// every tier is EIP-1559. `fees` mirrors the standard tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasInfo {
	pub fees: FeeFields,
	pub safe_low: FeeFields,
	pub standard: FeeFields,
	pub fast: FeeFields,
	pub fastest: FeeFields,
	/// Network congestion in `[0, 1]`.
	pub network_congestion: f64,
	/// Base fee of the pending block on EIP-1559 chains.
	#[serde(default)]
	pub base_fee: Option<U256>,
	pub eip1559: bool,
	pub last_updated: u64,
}

impl GasInfo {
	pub fn tier(&self, speed: GasSpeed) -> FeeFields {
		match speed {
			GasSpeed::SafeLow => self.safe_low,
			GasSpeed::Standard => self.standard,
			GasSpeed::Fast => self.fast,
			GasSpeed::Fastest => self.fastest,
		}
	}
}

/// Estimated cost of one transaction at one speed tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEstimate {
	pub speed: GasSpeed,
	pub gas_limit: U256,
	pub fees: FeeFields,
	/// `gas_limit * max price per gas`, in wei.
	pub max_cost: U256,
}

impl FeeEstimate {
	pub fn new(speed: GasSpeed, gas_limit: U256, fees: FeeFields) -> Self {
		Self {
			speed,
			gas_limit,
			fees,
			max_cost: gas_limit * fees.max_price_per_gas(),
		}
	}
}
