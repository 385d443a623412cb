//! ERC-20 call encoding and return decoding.

use crate::ProviderError;
use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolCall};

sol! {
	interface IERC20 {
		function balanceOf(address owner) external view returns (uint256);
		function allowance(address owner, address spender) external view returns (uint256);
		function approve(address spender, uint256 amount) external returns (bool);
		function transfer(address to, uint256 amount) external returns (bool);
		function decimals() external view returns (uint8);
	}
}

pub fn balance_of_calldata(owner: Address) -> Vec<u8> {
	IERC20::balanceOfCall { owner }.abi_encode()
}

pub fn allowance_calldata(owner: Address, spender: Address) -> Vec<u8> {
	IERC20::allowanceCall { owner, spender }.abi_encode()
}

pub fn approve_calldata(spender: Address, amount: U256) -> Vec<u8> {
	IERC20::approveCall { spender, amount }.abi_encode()
}

pub fn transfer_calldata(to: Address, amount: U256) -> Vec<u8> {
	IERC20::transferCall { to, amount }.abi_encode()
}

pub fn decimals_calldata() -> Vec<u8> {
	IERC20::decimalsCall {}.abi_encode()
}

/// Reads a single 32-byte word return value.
pub fn decode_word(data: &[u8]) -> Result<U256, ProviderError> {
	if data.len() < 32 {
		return Err(ProviderError::Decode(format!(
			"Expected a 32-byte word, got {} bytes",
			data.len()
		)));
	}
	Ok(U256::from_be_slice(&data[..32]))
}
