//! Chain listeners for the solver.
//!
//! One listener runs per monitored chain. It polls the chain for the settler's
//! "Open" event, backfills history in bounded chunks, hands every decoded order
//! to an [`OrderHandler`] and commits its progress to the checkpoint store only
//! once every order of a range has been resolved.
//!
//! The chain-specific part is the [`OrderEventSource`]: EVM log filters and
//! Starknet event queries both reduce to "head block" and "Open events in a
//! block range". Everything else lives in the generic [`ChainListener`].

use async_trait::async_trait;
use solver_order::DecodeError;
use solver_storage::{CheckpointStore, StorageError};
use solver_types::{
	ChainFamily, EventBus, ListenerConfig, NetworkConfig, NetworkRegistry, ResolvedOrder,
};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod listener;

pub mod implementations {
	pub mod cairo;
	pub mod evm;
}

pub use listener::ChainListener;

#[derive(Debug, Error)]
pub enum ListenerError {
	#[error("RPC error: {0}")]
	Rpc(String),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	#[error("Invalid configuration: {0}")]
	Config(String),
	#[error("Listener is already running")]
	AlreadyRunning,
}

/// Outcome of a handler call that did not complete normally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
	/// The destination settler already knows the order. Counts as resolved.
	#[error("Order already filled")]
	AlreadyFilled,
	/// A rule declined the order for now.
	#[error("Order rejected: {0}")]
	Rejected(String),
	#[error("Execution failed: {0}")]
	Execution(String),
}

/// Consumer of decoded orders.
#[async_trait]
pub trait OrderHandler: Send + Sync {
	/// Returns `Ok(true)` when the order needs no further action and
	/// `Ok(false)` when the listener must not advance past its block yet.
	async fn handle(&self, order: &ResolvedOrder) -> Result<bool, HandlerError>;
}

/// One "Open" event found on chain.
#[derive(Debug, Clone)]
pub struct OpenEvent {
	pub block_number: u64,
	/// Position of the event within its block.
	pub log_index: u64,
	pub order: Result<ResolvedOrder, DecodeError>,
}

/// Chain-family specific access to the settler's events.
#[async_trait]
pub trait OrderEventSource: Send + Sync {
	async fn latest_block(&self) -> Result<u64, ListenerError>;

	/// All "Open" events in the inclusive range `[from, to]`.
	async fn fetch_order_events(&self, from: u64, to: u64)
		-> Result<Vec<OpenEvent>, ListenerError>;
}

#[async_trait]
pub trait ListenerInterface: Send + Sync {
	fn chain_name(&self) -> &str;

	/// Resolves the start block and spawns the backfill and poll task.
	/// The task runs until `cancel` fires or [`stop`](Self::stop) is called.
	async fn start(
		&self,
		cancel: CancellationToken,
		handler: Arc<dyn OrderHandler>,
	) -> Result<(), ListenerError>;

	/// Signals the task and waits for it to finish its in-flight work.
	async fn stop(&self) -> Result<(), ListenerError>;

	fn last_processed_block(&self) -> u64;
}

/// Builds the listener for a network according to its chain family.
pub fn create_listener(
	network: &NetworkConfig,
	registry: Arc<NetworkRegistry>,
	checkpoints: Arc<dyn CheckpointStore>,
	events: EventBus,
) -> Result<Box<dyn ListenerInterface>, ListenerError> {
	let config = ListenerConfig::from_network(network);

	let listener: Box<dyn ListenerInterface> = match network.family {
		ChainFamily::Evm => {
			let source = implementations::evm::EvmEventSource::new(
				&config.rpc_url,
				&config.contract_address,
				registry,
			)?;
			Box::new(ChainListener::new(config, source, checkpoints).with_event_bus(events))
		}
		ChainFamily::Cairo => {
			let source = implementations::cairo::CairoEventSource::new(
				&config.rpc_url,
				&config.contract_address,
				registry,
			)?;
			Box::new(ChainListener::new(config, source, checkpoints).with_event_bus(events))
		}
	};

	Ok(listener)
}
