//! Tokens the wallet lists per chain.

use alloy_primitives::Address;
use crelink_types::{ChainRegistry, TokenInfo};
use std::collections::HashMap;

/// Native currency first, then the chain's configured ERC-20 list.
///
/// The native currency is listed under `Address::ZERO`, the same sentinel
/// bridges use for native transfers.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
	tokens: HashMap<u64, Vec<TokenInfo>>,
}

impl TokenRegistry {
	pub fn from_registry(registry: &ChainRegistry) -> Self {
		let tokens = registry
			.all()
			.into_iter()
			.map(|descriptor| {
				let native = TokenInfo {
					address: Address::ZERO,
					symbol: descriptor.native_currency.symbol.clone(),
					name: descriptor.native_currency.name.clone(),
					decimals: descriptor.native_currency.decimals,
				};
				let mut list = vec![native];
				for token in &descriptor.tokens {
					if !list.iter().any(|t| t.address == token.address) {
						list.push(token.clone());
					}
				}
				(descriptor.chain_id, list)
			})
			.collect();
		Self { tokens }
	}

	/// `None` for chains the wallet does not know.
	pub fn supported_tokens(&self, chain_id: u64) -> Option<&[TokenInfo]> {
		self.tokens.get(&chain_id).map(Vec::as_slice)
	}

	pub fn find(&self, chain_id: u64, address: &Address) -> Option<&TokenInfo> {
		self.supported_tokens(chain_id)?
			.iter()
			.find(|t| &t.address == address)
	}

	/// Case-insensitive symbol lookup.
	pub fn find_by_symbol(&self, chain_id: u64, symbol: &str) -> Option<&TokenInfo> {
		self.supported_tokens(chain_id)?
			.iter()
			.find(|t| t.symbol.eq_ignore_ascii_case(symbol))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn registry() -> ChainRegistry {
		let mut registry = ChainRegistry::with_builtin();
		let catena = registry.get_mut(1000).unwrap();
		let token = TokenInfo {
			address: Address::repeat_byte(0x11),
			symbol: "USDC".into(),
			name: "USD Coin".into(),
			decimals: 6,
		};
		catena.tokens.push(token.clone());
		catena.tokens.push(token);
		registry
	}

	#[test]
	fn test_native_currency_is_listed_first() {
		let tokens = TokenRegistry::from_registry(&registry());
		let catena = tokens.supported_tokens(1000).unwrap();
		assert_eq!(catena[0].address, Address::ZERO);
		assert_eq!(catena[0].symbol, "CTA");
		assert_eq!(catena[0].decimals, 18);
		assert_eq!(catena.len(), 2);
	}

	#[test]
	fn test_lookup_by_address_and_symbol() {
		let tokens = TokenRegistry::from_registry(&registry());
		assert_eq!(
			tokens.find_by_symbol(1000, "usdc").map(|t| t.address),
			Some(Address::repeat_byte(0x11))
		);
		assert!(tokens.find(1000, &Address::repeat_byte(0x11)).is_some());
		assert!(tokens.find(1000, &Address::repeat_byte(0x22)).is_none());
		assert!(tokens.supported_tokens(424242).is_none());
	}
}
