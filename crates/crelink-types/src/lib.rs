//! Common types module for the CreLink chain engine.
//!
//! This module defines the data model shared by every engine component:
//! the static chain registry, JSON-RPC wire types, transactions and gas
//! recommendations, chain-switch records, bridge transfers and the typed
//! events that flow between components.

/// Bridge transfer records, quotes and status enums.
pub mod bridge;
/// Static chain registry and chain-id helpers.
pub mod chains;
/// Typed broadcast event bus.
pub mod event_bus;
/// Event types emitted by providers, the switch engine, the orchestrator and bridges.
pub mod events;
/// Gas recommendation types.
pub mod gas;
/// Self-registering implementation trait.
pub mod registry;
/// JSON-RPC wire types and per-method result decoding.
pub mod rpc;
/// Storage namespaces for persisted state.
pub mod storage;
/// Chain switch context and audit records.
pub mod switch;
/// Transaction data model.
pub mod transaction;
/// Formatting and parsing helpers.
pub mod utils;
/// Configuration and input validation types.
pub mod validation;

pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use bridge::*;
pub use chains::{
	chain_id_to_hex, get_network_info, hex_chain_id_to_number, ChainDescriptor, ChainFeature,
	ChainRegistry, NativeCurrency, TokenInfo,
};
pub use event_bus::EventBus;
pub use events::*;
pub use gas::*;
pub use registry::ImplementationRegistry;
pub use rpc::{
	parse_quantity, BlockTag, FeeHistory, Log, RpcBlock, RpcResponse, RpcTransaction, TransactionReceipt,
};
pub use storage::StorageKey;
pub use switch::*;
pub use transaction::*;
pub use utils::{
	current_timestamp, format_units, parse_address, parse_units, truncate_id, with_0x_prefix,
	without_0x_prefix,
};
pub use validation::*;
