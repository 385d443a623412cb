//! Incremental transaction assembly.

use crate::TransactionError;
use alloy_primitives::{Address, Bytes, U256};
use crelink_types::{FeeFields, Transaction, TransactionRequest, TxType};

/// Collects transaction fields and checks them once on [`build`].
///
/// [`build`]: TransactionBuilder::build
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
	chain_id: u64,
	from: Option<Address>,
	to: Option<Address>,
	value: U256,
	data: Bytes,
	nonce: Option<u64>,
	gas_limit: Option<U256>,
	fees: Option<FeeFields>,
}

impl TransactionBuilder {
	pub fn new(chain_id: u64) -> Self {
		Self {
			chain_id,
			from: None,
			to: None,
			value: U256::ZERO,
			data: Bytes::new(),
			nonce: None,
			gas_limit: None,
			fees: None,
		}
	}

	/// Starts from the fields a dApp supplied.
	///
	/// Rejects requests that name another chain, mix both fee models, or
	/// carry a type byte that contradicts their fee fields.
	pub fn from_request(chain_id: u64, request: &TransactionRequest) -> Result<Self, TransactionError> {
		if let Some(requested) = request.chain_id {
			if requested != chain_id {
				return Err(TransactionError::Invalid(format!(
					"Request targets chain {} but is being sent on chain {}",
					requested, chain_id
				)));
			}
		}

		let fees = match (
			request.gas_price,
			request.max_fee_per_gas,
			request.max_priority_fee_per_gas,
		) {
			(None, None, None) => None,
			(Some(gas_price), None, None) => Some(FeeFields::Legacy { gas_price }),
			(None, Some(max_fee_per_gas), Some(max_priority_fee_per_gas)) => Some(FeeFields::Eip1559 {
				max_fee_per_gas,
				max_priority_fee_per_gas,
			}),
			(Some(_), _, _) => {
				return Err(TransactionError::Invalid(
					"gasPrice cannot be combined with EIP-1559 fee fields".into(),
				))
			},
			_ => {
				return Err(TransactionError::Invalid(
					"maxFeePerGas and maxPriorityFeePerGas must be set together".into(),
				))
			},
		};
		if let (Some(tx_type), Some(fees)) = (request.tx_type, &fees) {
			if tx_type != fees.tx_type().as_u8() as u64 {
				return Err(TransactionError::Invalid(format!(
					"Type {} does not match the supplied fee fields",
					tx_type
				)));
			}
		}

		Ok(Self {
			chain_id,
			from: request.from,
			to: request.to,
			value: request.value.unwrap_or_default(),
			data: request.data.clone().unwrap_or_default(),
			nonce: request.nonce,
			gas_limit: request.gas,
			fees,
		})
	}

	pub fn from(mut self, from: Address) -> Self {
		self.from = Some(from);
		self
	}

	pub fn to(mut self, to: Address) -> Self {
		self.to = Some(to);
		self
	}

	pub fn value(mut self, value: U256) -> Self {
		self.value = value;
		self
	}

	pub fn data(mut self, data: Bytes) -> Self {
		self.data = data;
		self
	}

	pub fn nonce(mut self, nonce: u64) -> Self {
		self.nonce = Some(nonce);
		self
	}

	pub fn gas_limit(mut self, gas_limit: U256) -> Self {
		self.gas_limit = Some(gas_limit);
		self
	}

	pub fn fees(mut self, fees: FeeFields) -> Self {
		self.fees = Some(fees);
		self
	}

	pub fn has_fees(&self) -> bool {
		self.fees.is_some()
	}

	pub fn tx_type(&self) -> Option<TxType> {
		self.fees.map(|fees| fees.tx_type())
	}

	pub fn build(self) -> Result<Transaction, TransactionError> {
		let missing = |field: &str| TransactionError::Invalid(format!("Missing {}", field));
		let from = self.from.ok_or_else(|| missing("sender"))?;
		let nonce = self.nonce.ok_or_else(|| missing("nonce"))?;
		let gas_limit = self.gas_limit.ok_or_else(|| missing("gas limit"))?;
		let fees = self.fees.ok_or_else(|| missing("fee fields"))?;

		if gas_limit.is_zero() {
			return Err(TransactionError::Invalid("Gas limit must be positive".into()));
		}
		if self.to.is_none() && self.data.is_empty() {
			return Err(TransactionError::Invalid(
				"Contract creation requires init code".into(),
			));
		}
		if let FeeFields::Eip1559 {
			max_fee_per_gas,
			max_priority_fee_per_gas,
		} = fees
		{
			if max_priority_fee_per_gas > max_fee_per_gas {
				return Err(TransactionError::Invalid(
					"maxPriorityFeePerGas exceeds maxFeePerGas".into(),
				));
			}
		}

		Ok(Transaction {
			from,
			to: self.to,
			value: self.value,
			data: self.data,
			nonce,
			chain_id: self.chain_id,
			gas_limit,
			fees,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn legacy(gwei: u64) -> FeeFields {
		FeeFields::Legacy {
			gas_price: U256::from(gwei * 1_000_000_000),
		}
	}

	#[test]
	fn test_build_complete_transaction() {
		let tx = TransactionBuilder::new(1000)
			.from(Address::repeat_byte(1))
			.to(Address::repeat_byte(2))
			.value(U256::from(10u64))
			.nonce(3)
			.gas_limit(U256::from(21_000u64))
			.fees(legacy(2))
			.build()
			.unwrap();
		assert_eq!(tx.chain_id, 1000);
		assert_eq!(tx.nonce, 3);
		assert_eq!(tx.tx_type(), TxType::Legacy);
	}

	#[test]
	fn test_missing_fields_are_reported() {
		let err = TransactionBuilder::new(1)
			.from(Address::repeat_byte(1))
			.to(Address::repeat_byte(2))
			.gas_limit(U256::from(21_000u64))
			.fees(legacy(1))
			.build()
			.unwrap_err();
		assert_eq!(err.to_string(), "Invalid transaction: Missing nonce");
	}

	#[test]
	fn test_request_with_mixed_fee_models_is_rejected() {
		let request = TransactionRequest {
			gas_price: Some(U256::from(1u64)),
			max_fee_per_gas: Some(U256::from(2u64)),
			max_priority_fee_per_gas: Some(U256::from(1u64)),
			..Default::default()
		};
		assert!(matches!(
			TransactionBuilder::from_request(1, &request),
			Err(TransactionError::Invalid(_))
		));

		let half = TransactionRequest {
			max_fee_per_gas: Some(U256::from(2u64)),
			..Default::default()
		};
		assert!(TransactionBuilder::from_request(1, &half).is_err());
	}

	#[test]
	fn test_request_type_must_match_fees() {
		let request = TransactionRequest {
			gas_price: Some(U256::from(1u64)),
			tx_type: Some(2),
			..Default::default()
		};
		assert!(TransactionBuilder::from_request(1, &request).is_err());
	}

	#[test]
	fn test_request_for_other_chain_is_rejected() {
		let request = TransactionRequest {
			chain_id: Some(137),
			..Default::default()
		};
		assert!(TransactionBuilder::from_request(1, &request).is_err());
	}

	#[test]
	fn test_request_fields_carry_over() {
		let request = TransactionRequest {
			from: Some(Address::repeat_byte(1)),
			to: Some(Address::repeat_byte(2)),
			max_fee_per_gas: Some(U256::from(30u64)),
			max_priority_fee_per_gas: Some(U256::from(2u64)),
			..Default::default()
		};
		let builder = TransactionBuilder::from_request(10, &request).unwrap();
		assert!(builder.has_fees());
		assert_eq!(builder.tx_type(), Some(TxType::Eip1559));
		let tx = builder.nonce(0).gas_limit(U256::from(50_000u64)).build().unwrap();
		assert_eq!(tx.to, Some(Address::repeat_byte(2)));
		assert_eq!(tx.value, U256::ZERO);
	}

	#[test]
	fn test_priority_fee_above_max_fee() {
		let err = TransactionBuilder::new(1)
			.from(Address::repeat_byte(1))
			.to(Address::repeat_byte(2))
			.nonce(0)
			.gas_limit(U256::from(21_000u64))
			.fees(FeeFields::Eip1559 {
				max_fee_per_gas: U256::from(1u64),
				max_priority_fee_per_gas: U256::from(2u64),
			})
			.build();
		assert!(err.is_err());
	}
}
