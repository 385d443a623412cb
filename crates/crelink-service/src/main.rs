//! Command-line front end for the CreLink wallet engine.
//!
//! Loads configuration, builds a [`WalletEngine`] and runs one command
//! against it: chain listing, block and gas lookups, balances, bridge
//! quotes, a block watcher, or a raw wallet message.

use clap::Parser;
use crelink_config::Config;
use crelink_core::{WalletBuilder, WalletEngine};
use std::path::{Path, PathBuf};

mod commands;

use commands::Command;

/// Command-line arguments for the wallet CLI.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file; builtin defaults apply when it is absent
	#[arg(short, long, default_value = "config.toml", env = "CRELINK_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "warn")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();

	let config = load_config(&args.config).await?;
	let engine = build_engine(config).await?;
	engine.restore_state().await?;

	let result = commands::run(&engine, args.command).await;
	engine.shutdown().await;
	result
}

/// Reads the config file, or falls back to defaults when it does not exist.
async fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
	if !path.exists() {
		tracing::info!(path = %path.display(), "No configuration file, using defaults");
		return Ok(Config::default());
	}
	let path = path
		.to_str()
		.ok_or_else(|| format!("Invalid config path: {}", path.display()))?;
	let config = Config::from_file(path).await?;
	tracing::info!(path, "Loaded configuration");
	Ok(config)
}

async fn build_engine(config: Config) -> Result<WalletEngine, Box<dyn std::error::Error>> {
	Ok(WalletBuilder::new(config).build().await?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn test_cli_definition_is_consistent() {
		Args::command().debug_assert();
	}

	#[test]
	fn test_args_default_values() {
		let args = Args::try_parse_from(["crelink", "chains"]).unwrap();
		assert_eq!(args.log_level, "warn");
		assert!(matches!(args.command, Command::Chains));
	}

	#[test]
	fn test_args_custom_values() {
		let args = Args::try_parse_from([
			"crelink",
			"--config",
			"custom.toml",
			"--log-level",
			"debug",
			"block",
			"--chain",
			"1",
		])
		.unwrap();
		assert_eq!(args.config, PathBuf::from("custom.toml"));
		assert_eq!(args.log_level, "debug");
		assert!(matches!(args.command, Command::Block { chain: 1 }));
	}

	#[tokio::test]
	async fn test_missing_config_file_uses_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let config = load_config(&dir.path().join("absent.toml")).await.unwrap();
		assert_eq!(config.wallet.default_chain_id, 1000);
		assert_eq!(config.storage.primary, "memory");
	}

	#[tokio::test]
	async fn test_config_file_is_loaded() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.toml");
		std::fs::write(
			&path,
			r#"
[wallet]
default_chain_id = 1

[networks.31337]
name = "Anvil"
rpc_url = "http://localhost:8545"
"#,
		)
		.unwrap();

		let config = load_config(&path).await.unwrap();
		assert_eq!(config.wallet.default_chain_id, 1);

		let engine = build_engine(config).await.unwrap();
		assert!(engine.registry().is_supported(31337));
	}
}
