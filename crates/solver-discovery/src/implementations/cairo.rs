//! Starknet event source: `starknet_getEvents` filtered by settler address and
//! the `Open` selector, following continuation tokens.

use crate::{ListenerError, OpenEvent, OrderEventSource};
use async_trait::async_trait;
use solver_order::CairoOrderDecoder;
use solver_types::NetworkRegistry;
use starknet::core::types::{BlockId, EventFilter, Felt};
use starknet::core::utils::get_selector_from_name;
use starknet::providers::jsonrpc::HttpTransport;
use starknet::providers::{JsonRpcClient, Provider, Url};
use std::sync::Arc;

const EVENTS_CHUNK_SIZE: u64 = 100;

pub struct CairoEventSource {
	provider: JsonRpcClient<HttpTransport>,
	settler: Felt,
	open_selector: Felt,
	decoder: CairoOrderDecoder,
}

impl CairoEventSource {
	pub fn new(
		rpc_url: &str,
		settler: &str,
		registry: Arc<NetworkRegistry>,
	) -> Result<Self, ListenerError> {
		let url = Url::parse(rpc_url)
			.map_err(|e| ListenerError::Config(format!("Invalid RPC URL: {}", e)))?;
		let settler = Felt::from_hex(settler)
			.map_err(|e| ListenerError::Config(format!("Invalid settler address: {}", e)))?;
		let open_selector = get_selector_from_name("Open")
			.map_err(|e| ListenerError::Config(e.to_string()))?;

		Ok(Self {
			provider: JsonRpcClient::new(HttpTransport::new(url)),
			settler,
			open_selector,
			decoder: CairoOrderDecoder::new(registry),
		})
	}
}

#[async_trait]
impl OrderEventSource for CairoEventSource {
	async fn latest_block(&self) -> Result<u64, ListenerError> {
		self.provider
			.block_number()
			.await
			.map_err(|e| ListenerError::Rpc(format!("Failed to get block number: {}", e)))
	}

	async fn fetch_order_events(
		&self,
		from: u64,
		to: u64,
	) -> Result<Vec<OpenEvent>, ListenerError> {
		let filter = EventFilter {
			from_block: Some(BlockId::Number(from)),
			to_block: Some(BlockId::Number(to)),
			address: Some(self.settler),
			keys: Some(vec![vec![self.open_selector]]),
		};

		let mut events = Vec::new();
		let mut continuation_token = None;
		loop {
			let page = self
				.provider
				.get_events(filter.clone(), continuation_token, EVENTS_CHUNK_SIZE)
				.await
				.map_err(|e| ListenerError::Rpc(format!("Failed to get events: {}", e)))?;

			for event in page.events {
				let Some(block_number) = event.block_number else {
					// Pending events are picked up once their block is final.
					continue;
				};
				events.push(OpenEvent {
					block_number,
					// Pages preserve emission order.
					log_index: events.len() as u64,
					order: self.decoder.decode(&event.data),
				});
			}

			match page.continuation_token {
				Some(token) => continuation_token = Some(token),
				None => break,
			}
		}

		Ok(events)
	}
}
