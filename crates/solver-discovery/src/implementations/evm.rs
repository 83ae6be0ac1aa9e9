//! EVM event source: `eth_getLogs` filtered by settler address and the
//! `Open` topic.

use crate::{ListenerError, OpenEvent, OrderEventSource};
use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use solver_order::implementations::evm::abi::Open;
use solver_order::EvmOrderDecoder;
use solver_types::NetworkRegistry;
use std::sync::Arc;

/// Turns `Open` logs into events. Logs dropped by a reorg or not yet mined
/// into a block are skipped.
pub fn open_events(logs: Vec<Log>, decoder: &EvmOrderDecoder) -> Vec<OpenEvent> {
	logs.into_iter()
		.filter_map(|log| {
			if log.removed {
				tracing::debug!(tx_hash = ?log.transaction_hash, "Skipping removed log");
				return None;
			}
			let Some(block_number) = log.block_number else {
				tracing::warn!(tx_hash = ?log.transaction_hash, "Skipping log without block number");
				return None;
			};
			Some(OpenEvent {
				block_number,
				log_index: log.log_index.unwrap_or_default(),
				order: decoder.decode(log.data()),
			})
		})
		.collect()
}

pub struct EvmEventSource {
	provider: DynProvider,
	settler: Address,
	decoder: EvmOrderDecoder,
}

impl EvmEventSource {
	pub fn new(
		rpc_url: &str,
		settler: &str,
		registry: Arc<NetworkRegistry>,
	) -> Result<Self, ListenerError> {
		let url = rpc_url
			.parse()
			.map_err(|e| ListenerError::Config(format!("Invalid RPC URL: {}", e)))?;
		let settler = settler
			.parse::<Address>()
			.map_err(|e| ListenerError::Config(format!("Invalid settler address: {}", e)))?;

		Ok(Self {
			provider: ProviderBuilder::new().connect_http(url).erased(),
			settler,
			decoder: EvmOrderDecoder::new(registry),
		})
	}
}

#[async_trait]
impl OrderEventSource for EvmEventSource {
	async fn latest_block(&self) -> Result<u64, ListenerError> {
		self.provider
			.get_block_number()
			.await
			.map_err(|e| ListenerError::Rpc(format!("Failed to get block number: {}", e)))
	}

	async fn fetch_order_events(
		&self,
		from: u64,
		to: u64,
	) -> Result<Vec<OpenEvent>, ListenerError> {
		let filter = Filter::new()
			.address(self.settler)
			.event_signature(Open::SIGNATURE_HASH)
			.from_block(from)
			.to_block(to);

		let logs = self
			.provider
			.get_logs(&filter)
			.await
			.map_err(|e| ListenerError::Rpc(format!("Failed to get logs: {}", e)))?;

		Ok(open_events(logs, &self.decoder))
	}
}
