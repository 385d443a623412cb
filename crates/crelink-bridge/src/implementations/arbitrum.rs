//! Arbitrum canonical bridge.
//!
//! Deposits go through the L1 inbox (ETH) or the L1 gateway router
//! (ERC-20, paying for the L2 retryable ticket up front) and complete on L2
//! after the retryable executes. Withdrawals are sent through ArbSys or the
//! L2 gateway router and emit `L2ToL1Tx`; once the challenge period has
//! passed they become claimable and are executed on the L1 outbox with a
//! proof from the node interface precompile.

use crate::common::{self, AssetTable};
use crate::{BridgeContext, BridgeError, BridgeProvider, BridgeRegistry};
use alloy_primitives::{address, Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall, SolEvent};
use async_trait::async_trait;
use crelink_provider::contracts::decode_word;
use crelink_types::{
	current_timestamp, BlockTag, BridgeAsset, BridgeQuote, BridgeRequest, BridgeStatus,
	BridgeStatusUpdate, BridgeTransaction, BridgeTransfer, ChainPair, ConfigSchema, Field,
	FieldType, GasSpeed, ImplementationRegistry, Log, Schema, TransactionRequest, ValidationError,
	WithdrawalStatus,
};

sol! {
	interface IInbox {
		function depositEth() external payable returns (uint256);

		event InboxMessageDelivered(uint256 indexed messageNum, bytes data);
	}

	interface IL1GatewayRouter {
		function getGateway(address token) external view returns (address gateway);

		function outboundTransfer(
			address token,
			address to,
			uint256 amount,
			uint256 maxGas,
			uint256 gasPriceBid,
			bytes calldata data
		) external payable returns (bytes memory);
	}

	interface IL1ERC20Gateway {
		event DepositInitiated(
			address l1Token,
			address indexed from,
			address indexed to,
			uint256 indexed sequenceNumber,
			uint256 amount
		);
	}

	interface IL2GatewayRouter {
		function outboundTransfer(address l1Token, address to, uint256 amount, bytes calldata data)
			external
			payable
			returns (bytes memory);
	}

	interface IArbSys {
		function withdrawEth(address destination) external payable returns (uint256);

		function sendMerkleTreeState() external view returns (uint256 size, bytes32 root, bytes32[] memory partials);

		event L2ToL1Tx(
			address caller,
			address indexed destination,
			uint256 indexed hash,
			uint256 indexed position,
			uint256 arbBlockNum,
			uint256 ethBlockNum,
			uint256 timestamp,
			uint256 callvalue,
			bytes data
		);
	}

	interface INodeInterface {
		function constructOutboxProof(uint64 size, uint64 leaf)
			external
			view
			returns (bytes32 send, bytes32 root, bytes32[] memory proof);
	}

	interface IOutbox {
		function isSpent(uint256 index) external view returns (bool);

		function executeTransaction(
			bytes32[] calldata proof,
			uint256 index,
			address l2Sender,
			address to,
			uint256 l2Block,
			uint256 l1Block,
			uint256 l2Timestamp,
			uint256 value,
			bytes calldata data
		) external;
	}
}

/// NodeInterface virtual contract available through `eth_call` on L2.
const NODE_INTERFACE: Address = address!("00000000000000000000000000000000000000C8");

const INBOX: &str = "arbitrum_inbox";
const OUTBOX: &str = "arbitrum_outbox";
const ROUTER: &str = "arbitrum_gateway_router";
const ARB_SYS: &str = "arb_sys";

const DEFAULT_CHALLENGE_PERIOD: u64 = 604_800;
const DEFAULT_DEPOSIT_SECONDS: u64 = 900;
const DEFAULT_RETRYABLE_GAS_LIMIT: u64 = 300_000;
const DEFAULT_RETRYABLE_GAS_PRICE: u64 = 100_000_000;
const DEFAULT_MAX_SUBMISSION_COST: u64 = 100_000_000_000_000;

/// Gas limit assumed for source-chain bridge calls when estimation fails.
const BRIDGE_GAS_FALLBACK: u64 = 300_000;

/// An `L2ToL1Tx` event decoded from a withdrawal receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L2ToL1Message {
	pub caller: Address,
	pub destination: Address,
	pub position: U256,
	pub arb_block: U256,
	pub eth_block: U256,
	pub timestamp: U256,
	pub callvalue: U256,
	pub data: Bytes,
}

fn receipt_error(message: impl Into<String>) -> BridgeError {
	BridgeError::Receipt(message.into())
}

fn word(data: &[u8], index: usize) -> Result<&[u8], BridgeError> {
	data.get(index * 32..index * 32 + 32)
		.ok_or_else(|| receipt_error("Truncated ABI data"))
}

fn word_usize(data: &[u8], index: usize) -> Result<usize, BridgeError> {
	usize::try_from(U256::from_be_slice(word(data, index)?))
		.map_err(|_| receipt_error("ABI offset out of range"))
}

/// Reads a dynamic `bytes32[]` whose head offset sits at word `index`.
fn bytes32_array(data: &[u8], index: usize) -> Result<Vec<B256>, BridgeError> {
	let offset = word_usize(data, index)?;
	let tail = data
		.get(offset..)
		.ok_or_else(|| receipt_error("ABI offset out of range"))?;
	let len = word_usize(tail, 0)?;
	(0..len)
		.map(|i| word(tail, i + 1).map(B256::from_slice))
		.collect()
}

/// Reads a dynamic `bytes` whose head offset sits at word `index`.
fn dynamic_bytes(data: &[u8], index: usize) -> Result<Bytes, BridgeError> {
	let offset = word_usize(data, index)?;
	let tail = data
		.get(offset..)
		.ok_or_else(|| receipt_error("ABI offset out of range"))?;
	let len = word_usize(tail, 0)?;
	tail.get(32..32 + len)
		.map(Bytes::copy_from_slice)
		.ok_or_else(|| receipt_error("Truncated ABI bytes"))
}

impl L2ToL1Message {
	pub fn from_log(log: &Log) -> Result<Self, BridgeError> {
		if log.topics.first() != Some(&IArbSys::L2ToL1Tx::SIGNATURE_HASH) {
			return Err(receipt_error("Not an L2ToL1Tx event"));
		}
		let destination = log
			.topics
			.get(1)
			.map(|topic| Address::from_slice(&topic[12..]))
			.ok_or_else(|| receipt_error("L2ToL1Tx is missing its destination"))?;
		let data = log.data.as_ref();
		let uint = |index: usize| word(data, index).map(U256::from_be_slice);

		Ok(Self {
			caller: Address::from_slice(&word(data, 0)?[12..]),
			destination,
			position: common::topic_u256(log, 3)?,
			arb_block: uint(1)?,
			eth_block: uint(2)?,
			timestamp: uint(3)?,
			callvalue: uint(4)?,
			data: dynamic_bytes(data, 5)?,
		})
	}
}

/// ABI `(uint256 maxSubmissionCost, bytes extraData)` with empty extra data.
fn retryable_data(max_submission_cost: U256) -> Bytes {
	let mut data = Vec::with_capacity(96);
	data.extend_from_slice(&max_submission_cost.to_be_bytes::<32>());
	data.extend_from_slice(&U256::from(64u64).to_be_bytes::<32>());
	data.extend_from_slice(&[0u8; 32]);
	data.into()
}

pub struct ArbitrumSchema;

impl ConfigSchema for ArbitrumSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let seconds = || FieldType::Integer {
			min: Some(0),
			max: None,
		};
		let amount = |value: &toml::Value| match value.as_str().map(str::parse::<U256>) {
			Some(Ok(_)) => Ok(()),
			_ => Err("Expected an integer amount in wei".to_string()),
		};
		let schema = Schema::new(
			vec![common::pairs_field()],
			vec![
				Field::new("challenge_period_seconds", seconds()),
				Field::new("deposit_seconds", seconds()),
				Field::new(
					"retryable_gas_limit",
					FieldType::Integer {
						min: Some(21_000),
						max: None,
					},
				),
				Field::new("retryable_gas_price", FieldType::String).with_validator(amount),
				Field::new("max_submission_cost", FieldType::String).with_validator(amount),
				common::assets_field(),
			],
		);
		schema.validate(config)
	}
}

pub struct ArbitrumBridge {
	pairs: Vec<ChainPair>,
	assets: AssetTable,
	challenge_period: u64,
	deposit_seconds: u64,
	retryable_gas_limit: U256,
	retryable_gas_price: U256,
	max_submission_cost: U256,
	context: BridgeContext,
}

impl ArbitrumBridge {
	pub fn new(config: &toml::Value, context: BridgeContext) -> Result<Self, BridgeError> {
		ArbitrumSchema.validate(config)?;
		let bridge = Self {
			pairs: common::parse_pairs(config)?,
			assets: AssetTable::from_config(config)?,
			challenge_period: common::optional_u64(
				config,
				"challenge_period_seconds",
				DEFAULT_CHALLENGE_PERIOD,
			),
			deposit_seconds: common::optional_u64(config, "deposit_seconds", DEFAULT_DEPOSIT_SECONDS),
			retryable_gas_limit: U256::from(common::optional_u64(
				config,
				"retryable_gas_limit",
				DEFAULT_RETRYABLE_GAS_LIMIT,
			)),
			retryable_gas_price: common::optional_amount(
				config,
				"retryable_gas_price",
				U256::from(DEFAULT_RETRYABLE_GAS_PRICE),
			)?,
			max_submission_cost: common::optional_amount(
				config,
				"max_submission_cost",
				U256::from(DEFAULT_MAX_SUBMISSION_COST),
			)?,
			context,
		};

		for pair in &bridge.pairs {
			let roles: &[(u64, &str)] = if bridge.is_withdrawal(*pair) {
				&[(pair.source, ROUTER), (pair.target, OUTBOX)]
			} else {
				&[(pair.source, INBOX), (pair.source, ROUTER), (pair.target, ARB_SYS)]
			};
			for (chain_id, role) in roles {
				bridge.contract(*chain_id, role)?;
			}
		}
		Ok(bridge)
	}

	fn contract(&self, chain_id: u64, role: &str) -> Result<Address, BridgeError> {
		self.context
			.providers
			.registry()
			.get(chain_id)
			.and_then(|descriptor| descriptor.contract(role))
			.ok_or_else(|| {
				BridgeError::Configuration(format!("Chain {} has no {} contract", chain_id, role))
			})
	}

	/// Withdrawals start on the rollup, which exposes ArbSys.
	fn is_withdrawal(&self, pair: ChainPair) -> bool {
		self.contract(pair.source, ARB_SYS).is_ok()
	}

	fn retryable_cost(&self) -> U256 {
		self.max_submission_cost + self.retryable_gas_limit * self.retryable_gas_price
	}

	async fn call(&self, chain_id: u64, to: Address, data: Vec<u8>) -> Result<Bytes, BridgeError> {
		let provider = self.context.providers.provider(chain_id)?;
		Ok(provider
			.call(&TransactionRequest::call(to, data), BlockTag::Latest)
			.await?)
	}

	/// The L1 gateway that escrows `token` on deposit.
	async fn l1_gateway(&self, chain_id: u64, token: Address) -> Result<Address, BridgeError> {
		let router = self.contract(chain_id, ROUTER)?;
		let data = self
			.call(chain_id, router, IL1GatewayRouter::getGatewayCall { token }.abi_encode())
			.await?;
		let gateway = Address::from_slice(&word(&data, 0)?[12..]);
		if gateway.is_zero() {
			return Err(BridgeError::NotSupported(format!("Token {} without an L1 gateway", token)));
		}
		Ok(gateway)
	}

	/// The source-chain call that starts a transfer.
	fn source_request(
		&self,
		pair: ChainPair,
		token: Address,
		target_token: Address,
		amount: U256,
		sender: Address,
		recipient: Address,
	) -> Result<TransactionRequest, BridgeError> {
		let (to, value, data) = match (self.is_withdrawal(pair), token.is_zero()) {
			(false, true) => {
				if recipient != sender {
					return Err(BridgeError::NotSupported(
						"ETH deposits to a different recipient".into(),
					));
				}
				(
					self.contract(pair.source, INBOX)?,
					amount,
					IInbox::depositEthCall {}.abi_encode(),
				)
			},
			(false, false) => (
				self.contract(pair.source, ROUTER)?,
				self.retryable_cost(),
				IL1GatewayRouter::outboundTransferCall {
					token,
					to: recipient,
					amount,
					maxGas: self.retryable_gas_limit,
					gasPriceBid: self.retryable_gas_price,
					data: retryable_data(self.max_submission_cost),
				}
				.abi_encode(),
			),
			(true, true) => (
				self.contract(pair.source, ARB_SYS)?,
				amount,
				IArbSys::withdrawEthCall {
					destination: recipient,
				}
				.abi_encode(),
			),
			(true, false) => (
				self.contract(pair.source, ROUTER)?,
				U256::ZERO,
				IL2GatewayRouter::outboundTransferCall {
					l1Token: target_token,
					to: recipient,
					amount,
					data: Bytes::new(),
				}
				.abi_encode(),
			),
		};
		Ok(TransactionRequest {
			from: Some(sender),
			to: Some(to),
			value: Some(value),
			data: Some(data.into()),
			..Default::default()
		})
	}

	/// Decodes the `L2ToL1Tx` event of a submitted withdrawal, or `None`
	/// while its transaction is not mined.
	async fn withdrawal_message(
		&self,
		tx: &BridgeTransaction,
	) -> Result<Option<Result<L2ToL1Message, String>>, BridgeError> {
		let Some(hash) = tx.source_tx_hash else {
			return Ok(None);
		};
		let provider = self.context.providers.provider(tx.source_chain_id)?;
		let Some(receipt) = provider.get_transaction_receipt(hash).await? else {
			return Ok(None);
		};
		if !receipt.success() {
			return Ok(Some(Err("Withdrawal transaction reverted".into())));
		}
		match common::find_event(&receipt, IArbSys::L2ToL1Tx::SIGNATURE_HASH) {
			Some(log) => Ok(Some(L2ToL1Message::from_log(log).map_err(|e| e.to_string()))),
			None => Ok(Some(Err("Withdrawal emitted no L2ToL1Tx event".into()))),
		}
	}

	/// Where a withdrawal stands in the challenge-and-claim flow.
	pub async fn withdrawal_status(&self, tx: &BridgeTransaction) -> Result<WithdrawalStatus, BridgeError> {
		let message = match self.withdrawal_message(tx).await? {
			None => return Ok(WithdrawalStatus::NotFound),
			Some(Err(reason)) => {
				tracing::warn!(bridge_id = %tx.id, reason = %reason, "Withdrawal failed");
				return Ok(WithdrawalStatus::Failed);
			},
			Some(Ok(message)) => message,
		};

		let outbox = self.contract(tx.target_chain_id, OUTBOX)?;
		let spent = self
			.call(
				tx.target_chain_id,
				outbox,
				IOutbox::isSpentCall {
					index: message.position,
				}
				.abi_encode(),
			)
			.await?;
		if !decode_word(&spent)?.is_zero() {
			return Ok(WithdrawalStatus::Completed);
		}

		let claimable_at = message
			.timestamp
			.saturating_add(U256::from(self.challenge_period));
		if U256::from(current_timestamp()) >= claimable_at {
			Ok(WithdrawalStatus::Claimable)
		} else {
			Ok(WithdrawalStatus::Pending)
		}
	}

	async fn deposit_status(&self, tx: &BridgeTransaction) -> Result<BridgeStatusUpdate, BridgeError> {
		let Some(hash) = tx.source_tx_hash else {
			return Ok(BridgeStatusUpdate::status(tx.status));
		};
		let provider = self.context.providers.provider(tx.source_chain_id)?;
		match provider.get_transaction_receipt(hash).await? {
			None => Ok(BridgeStatusUpdate::status(BridgeStatus::Submitted)),
			Some(receipt) if !receipt.success() => Ok(BridgeStatusUpdate {
				status: BridgeStatus::Failed,
				target_tx_hash: None,
				error: Some("Deposit transaction reverted".into()),
			}),
			Some(_) if current_timestamp() >= tx.created_at.saturating_add(self.deposit_seconds) => {
				Ok(BridgeStatusUpdate::status(BridgeStatus::Completed))
			},
			Some(_) => Ok(BridgeStatusUpdate::status(BridgeStatus::Relaying)),
		}
	}
}

#[async_trait]
impl BridgeProvider for ArbitrumBridge {
	fn name(&self) -> &str {
		Registry::NAME
	}

	fn supported_pairs(&self) -> &[ChainPair] {
		&self.pairs
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(ArbitrumSchema)
	}

	async fn get_supported_assets(&self, pair: ChainPair) -> Result<Vec<BridgeAsset>, BridgeError> {
		if !self.supports(pair) {
			return Err(BridgeError::UnsupportedChainPair(pair));
		}
		Ok(self.assets.assets_for(pair))
	}

	/// Deposits approve the token's L1 gateway; withdrawals burn on L2 and
	/// need no approval.
	async fn spender(&self, pair: ChainPair, token: Address) -> Result<Option<Address>, BridgeError> {
		if token.is_zero() || self.is_withdrawal(pair) {
			return Ok(None);
		}
		Ok(Some(self.l1_gateway(pair.source, token).await?))
	}

	async fn get_token_balance(
		&self,
		chain_id: u64,
		token: Address,
		owner: Address,
	) -> Result<U256, BridgeError> {
		let provider = self.context.providers.provider(chain_id)?;
		common::token_balance(provider.as_ref(), token, owner).await
	}

	async fn get_allowance(
		&self,
		pair: ChainPair,
		token: Address,
		owner: Address,
	) -> Result<U256, BridgeError> {
		let Some(spender) = self.spender(pair, token).await? else {
			return Ok(U256::MAX);
		};
		let provider = self.context.providers.provider(pair.source)?;
		Ok(provider.get_allowance(token, owner, spender).await?)
	}

	async fn approve_token(
		&self,
		pair: ChainPair,
		token: Address,
		owner: Address,
		amount: U256,
	) -> Result<B256, BridgeError> {
		let spender = self.spender(pair, token).await?.ok_or_else(|| {
			BridgeError::NotSupported(format!("Approving {} for {}", token, pair))
		})?;
		common::send_approval(&self.context, pair.source, token, owner, spender, amount).await
	}

	async fn estimate_bridge_fee(&self, request: &BridgeRequest) -> Result<BridgeQuote, BridgeError> {
		let pair = request.chain_pair();
		let asset = self.assets.resolve(request)?;
		let source = self.source_request(
			pair,
			request.token,
			asset.target_token,
			request.amount,
			request.sender,
			request.recipient(),
		)?;
		let provider = self.context.providers.provider(pair.source)?;
		let mut gas_fee =
			common::estimate_gas_cost(&self.context, provider.as_ref(), &source, BRIDGE_GAS_FALLBACK)
				.await?;

		let withdrawal = self.is_withdrawal(pair);
		if !withdrawal && !request.is_native() {
			gas_fee += self.retryable_cost();
		}
		Ok(BridgeQuote {
			provider: Registry::NAME.to_string(),
			chain_pair: pair,
			token: request.token,
			amount: request.amount,
			bridge_fee: U256::ZERO,
			gas_fee,
			estimated_seconds: if withdrawal {
				self.challenge_period
			} else {
				self.deposit_seconds
			},
		})
	}

	async fn create_transaction(&self, request: &BridgeRequest) -> Result<BridgeTransaction, BridgeError> {
		if !self.supports(request.chain_pair()) {
			return Err(BridgeError::UnsupportedChainPair(request.chain_pair()));
		}
		let asset = self.assets.resolve(request)?;
		// Rejects unsupported combinations before anything is recorded.
		self.source_request(
			request.chain_pair(),
			request.token,
			asset.target_token,
			request.amount,
			request.sender,
			request.recipient(),
		)?;
		Ok(common::new_transaction(
			Registry::NAME,
			request,
			asset.target_token,
			U256::ZERO,
		))
	}

	async fn bridge_asset(&self, tx: &BridgeTransaction) -> Result<BridgeTransfer, BridgeError> {
		let pair = tx.chain_pair();
		let request = self.source_request(
			pair,
			tx.source_token,
			tx.target_token,
			tx.amount,
			tx.sender,
			tx.recipient,
		)?;
		let sent = self
			.context
			.transactions
			.send(pair.source, request, GasSpeed::Standard)
			.await?;
		let receipt = common::wait_for_receipt(&self.context, pair.source, sent.hash).await?;

		let (signature, topic) = match (self.is_withdrawal(pair), tx.is_native()) {
			(true, _) => (IArbSys::L2ToL1Tx::SIGNATURE_HASH, 3),
			(false, true) => (IInbox::InboxMessageDelivered::SIGNATURE_HASH, 1),
			(false, false) => (IL1ERC20Gateway::DepositInitiated::SIGNATURE_HASH, 3),
		};
		let log = common::find_event(&receipt, signature)
			.ok_or_else(|| receipt_error(format!("No bridge event in {}", sent.hash)))?;
		let transfer_id = common::topic_u256(log, topic)?;

		tracing::info!(
			chain_id = pair.source,
			tx_hash = %sent.hash,
			transfer_id = %transfer_id,
			"Submitted Arbitrum bridge transaction"
		);
		Ok(BridgeTransfer {
			transfer_id: transfer_id.to_string(),
			source_tx_hash: sent.hash,
		})
	}

	async fn get_transaction_status(
		&self,
		tx: &BridgeTransaction,
	) -> Result<BridgeStatusUpdate, BridgeError> {
		if !self.is_withdrawal(tx.chain_pair()) {
			return self.deposit_status(tx).await;
		}
		if tx.source_tx_hash.is_none() {
			return Ok(BridgeStatusUpdate::status(tx.status));
		}
		let status = self.withdrawal_status(tx).await?;
		let mut update = BridgeStatusUpdate::status(status.into());
		if status == WithdrawalStatus::Failed {
			update.error = Some("Withdrawal failed on L2".into());
		}
		Ok(update)
	}

	/// Claims a withdrawal on the L1 outbox; returns the claim transaction
	/// hash without waiting for it.
	async fn execute_withdrawal(&self, tx: &BridgeTransaction) -> Result<B256, BridgeError> {
		let status = self.withdrawal_status(tx).await?;
		if status != WithdrawalStatus::Claimable {
			return Err(BridgeError::InvalidState {
				id: tx.id.clone(),
				status: status.into(),
				action: "claim",
			});
		}
		let message = match self.withdrawal_message(tx).await? {
			Some(Ok(message)) => message,
			_ => return Err(receipt_error("Withdrawal event unavailable")),
		};

		let arb_sys = self.contract(tx.source_chain_id, ARB_SYS)?;
		let state = self
			.call(
				tx.source_chain_id,
				arb_sys,
				IArbSys::sendMerkleTreeStateCall {}.abi_encode(),
			)
			.await?;
		let size = u64::try_from(decode_word(&state)?)
			.map_err(|_| receipt_error("Merkle tree size out of range"))?;
		let leaf = u64::try_from(message.position)
			.map_err(|_| receipt_error("Withdrawal position out of range"))?;
		let proof = self
			.call(
				tx.source_chain_id,
				NODE_INTERFACE,
				INodeInterface::constructOutboxProofCall { size, leaf }.abi_encode(),
			)
			.await?;
		let proof = bytes32_array(&proof, 2)?;

		let outbox = self.contract(tx.target_chain_id, OUTBOX)?;
		let data = IOutbox::executeTransactionCall {
			proof,
			index: message.position,
			l2Sender: message.caller,
			to: message.destination,
			l2Block: message.arb_block,
			l1Block: message.eth_block,
			l2Timestamp: message.timestamp,
			value: message.callvalue,
			data: message.data,
		}
		.abi_encode();
		let request = TransactionRequest {
			from: Some(tx.sender),
			to: Some(outbox),
			data: Some(data.into()),
			..Default::default()
		};
		let sent = self
			.context
			.transactions
			.send(tx.target_chain_id, request, GasSpeed::Standard)
			.await?;
		tracing::info!(bridge_id = %tx.id, tx_hash = %sent.hash, "Submitted withdrawal claim");
		Ok(sent.hash)
	}
}

/// Factory function to create an Arbitrum bridge from configuration.
///
/// Configuration parameters:
/// - `pairs`: served chain pairs, e.g. `["1-42161", "42161-1"]`
/// - `challenge_period_seconds`: withdrawal delay (default: 604800)
/// - `deposit_seconds`: expected deposit time (default: 900)
/// - `retryable_gas_limit`, `retryable_gas_price`, `max_submission_cost`:
///   L2 retryable ticket parameters for token deposits
/// - `assets`: bridgeable tokens with their L1 and L2 addresses
pub fn create_bridge(
	config: &toml::Value,
	context: &BridgeContext,
) -> Result<Box<dyn BridgeProvider>, BridgeError> {
	Ok(Box::new(ArbitrumBridge::new(config, context.clone())?))
}

/// Registry for the Arbitrum bridge.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "arbitrum";
	type Factory = crate::BridgeFactory;

	fn factory() -> Self::Factory {
		create_bridge
	}
}

impl BridgeRegistry for Registry {}
