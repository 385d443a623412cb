//! Subcommands of the `crelink` binary.

use alloy_primitives::Address;
use clap::Subcommand;
use crelink_core::{WalletEngine, WalletResponse};
use crelink_provider::ProviderInterface;
use crelink_types::{format_units, parse_units, BlockTag, BridgeRequest, ProviderEvent};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;

type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

#[derive(Subcommand, Debug)]
pub enum Command {
	/// List supported chains
	Chains,
	/// Show the latest block of a chain
	Block {
		#[arg(long)]
		chain: u64,
	},
	/// Show gas tiers and congestion for a chain
	Gas {
		#[arg(long)]
		chain: u64,
	},
	/// Show the native or token balance of an address
	Balance {
		#[arg(long)]
		chain: u64,
		/// Defaults to the configured wallet account
		#[arg(long)]
		address: Option<Address>,
		/// ERC-20 token; the native currency when omitted
		#[arg(long)]
		token: Option<Address>,
	},
	/// Compare bridge quotes for a transfer
	Quote {
		#[arg(long)]
		from: u64,
		#[arg(long)]
		to: u64,
		/// Decimal amount in token units, e.g. 1.5
		#[arg(long)]
		amount: String,
		/// ERC-20 token on the source chain; the native currency when omitted
		#[arg(long)]
		token: Option<Address>,
		/// Defaults to the configured wallet account
		#[arg(long)]
		sender: Option<Address>,
	},
	/// Stream new blocks of a chain until interrupted
	Watch {
		#[arg(long)]
		chain: u64,
		/// Stop after this many blocks
		#[arg(long)]
		count: Option<usize>,
	},
	/// Dispatch a raw wallet message, e.g. '{"method":"getSupportedChains"}'
	Request { message: String },
}

pub async fn run(engine: &WalletEngine, command: Command) -> CommandResult {
	match command {
		Command::Chains => {
			for chain in engine.get_supported_chains() {
				println!(
					"{:>8}  {:<24} {:<6} {}",
					chain.chain_id,
					chain.name,
					chain.native_currency.symbol,
					if chain.is_testnet { "testnet" } else { "mainnet" }
				);
			}
			Ok(())
		},
		Command::Block { chain } => {
			let provider = engine.provider(chain)?;
			match provider.get_block(BlockTag::Latest).await? {
				Some(block) => print_json(&block),
				None => Err(format!("Chain {} returned no latest block", chain).into()),
			}
		},
		Command::Gas { chain } => print_json(&engine.get_gas_info(chain).await?),
		Command::Balance {
			chain,
			address,
			token,
		} => {
			let address = account(engine, address)?;
			let balance = engine.get_balance(chain, address, token).await?;
			let (symbol, decimals) = token_units(engine, chain, token.unwrap_or(Address::ZERO));
			println!("{} {}", format_units(balance, decimals), symbol);
			Ok(())
		},
		Command::Quote {
			from,
			to,
			amount,
			token,
			sender,
		} => {
			let token = token.unwrap_or(Address::ZERO);
			let (_, decimals) = token_units(engine, from, token);
			let request = BridgeRequest {
				source_chain_id: from,
				target_chain_id: to,
				token,
				amount: parse_units(&amount, decimals)?,
				sender: account(engine, sender)?,
				recipient: None,
			};
			print_json(&engine.get_bridge_quotes(&request).await?)
		},
		Command::Watch { chain, count } => watch(engine, chain, count).await,
		Command::Request { message } => {
			let message: Value = serde_json::from_str(&message)?;
			let response = engine.handle_message(message).await;
			print_json(&response)?;
			if let WalletResponse::Error(e) = response {
				return Err(e.into());
			}
			Ok(())
		},
	}
}

fn print_json<T: Serialize>(value: &T) -> CommandResult {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

fn account(engine: &WalletEngine, explicit: Option<Address>) -> CommandResult<Address> {
	explicit
		.or(engine.config().wallet.account)
		.ok_or_else(|| "No address given and no wallet account configured".into())
}

/// Symbol and decimals of a listed token; unlisted tokens count as 18 decimals.
fn token_units(engine: &WalletEngine, chain_id: u64, token: Address) -> (String, u8) {
	match engine.tokens().find(chain_id, &token) {
		Some(info) => (info.symbol.clone(), info.decimals),
		None => (token.to_string(), 18),
	}
}

async fn watch(engine: &WalletEngine, chain: u64, count: Option<usize>) -> CommandResult {
	let provider = engine.provider(chain)?;
	let mut events = provider.events().subscribe();
	provider.initialize().await?;
	tracing::info!(chain_id = chain, "Watching blocks");

	let mut seen = 0usize;
	loop {
		if count.is_some_and(|limit| seen >= limit) {
			break;
		}
		tokio::select! {
			event = events.recv() => match event {
				Ok(ProviderEvent::Block { block, .. }) => {
					seen += 1;
					println!(
						"block {} hash {} txs {} gas used {}",
						block.number.unwrap_or_default(),
						block.hash.map(|h| h.to_string()).unwrap_or_default(),
						block.transactions.len(),
						block.gas_used
					);
				},
				Ok(ProviderEvent::Error { error, .. }) => {
					tracing::warn!(chain_id = chain, error = %error, "Provider error");
				},
				Ok(_) => {},
				Err(RecvError::Lagged(skipped)) => {
					tracing::warn!(skipped, "Block watcher fell behind");
				},
				Err(RecvError::Closed) => break,
			},
			_ = tokio::signal::ctrl_c() => break,
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crelink_config::Config;
	use crelink_core::WalletBuilder;

	async fn build(config: &str) -> WalletEngine {
		let config: Config = config.parse().unwrap();
		WalletBuilder::new(config).build().await.unwrap()
	}

	#[tokio::test]
	async fn test_request_dispatches_raw_messages() {
		let engine = build("").await;
		let result = run(
			&engine,
			Command::Request {
				message: r#"{"method":"getSupportedChains"}"#.to_string(),
			},
		)
		.await;
		assert!(result.is_ok());

		let result = run(
			&engine,
			Command::Request {
				message: r#"{"method":"eth_sign"}"#.to_string(),
			},
		)
		.await;
		assert_eq!(result.unwrap_err().to_string(), "Method eth_sign is not supported");
	}

	#[tokio::test]
	async fn test_account_falls_back_to_configured_wallet() {
		let engine = build("").await;
		assert!(account(&engine, None).is_err());

		let configured = Address::repeat_byte(0x42);
		let engine = build(&format!("[wallet]\naccount = \"{}\"", configured)).await;
		assert_eq!(account(&engine, None).unwrap(), configured);
		assert_eq!(
			account(&engine, Some(Address::repeat_byte(1))).unwrap(),
			Address::repeat_byte(1)
		);
	}

	#[tokio::test]
	async fn test_token_units_use_registry_decimals() {
		let engine = build("").await;
		assert_eq!(token_units(&engine, 1000, Address::ZERO), ("CTA".to_string(), 18));
		let (_, decimals) = token_units(&engine, 1000, Address::repeat_byte(0x77));
		assert_eq!(decimals, 18);
	}

	#[tokio::test]
	async fn test_unsupported_chain_is_reported() {
		let engine = build("").await;
		let err = run(&engine, Command::Gas { chain: 5 }).await.unwrap_err();
		assert_eq!(err.to_string(), "Chain 5 is not supported");
	}
}
