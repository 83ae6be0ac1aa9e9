//! Listener configuration and checkpoint records.

use serde::{Deserialize, Serialize};

use crate::chains::{ChainFamily, NetworkConfig};

/// Resolved settings for one chain listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
	/// Settler contract whose "Open" events are watched.
	pub contract_address: String,
	/// Checkpoint key and log tag.
	pub chain_name: String,
	pub chain_id: u64,
	pub family: ChainFamily,
	pub rpc_url: String,
	/// Positive = absolute block, `0` = start live, `-N` = N blocks behind head.
	pub start_block: i64,
	pub poll_interval_ms: u64,
	pub confirmation_blocks: u64,
	pub max_block_range_per_request: u64,
	pub max_retries: u32,
}

impl ListenerConfig {
	pub fn from_network(network: &NetworkConfig) -> Self {
		Self {
			contract_address: network.settler_address.clone(),
			chain_name: network.name.clone(),
			chain_id: network.chain_id,
			family: network.family,
			rpc_url: network.rpc_url.clone(),
			start_block: network.listener.start_block,
			poll_interval_ms: network.listener.poll_interval_ms,
			confirmation_blocks: network.listener.confirmation_blocks,
			max_block_range_per_request: network.listener.max_block_range_per_request.max(1),
			max_retries: network.listener.max_retries,
		}
	}
}

/// Persisted progress of one listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerCheckpoint {
	pub chain_name: String,
	/// Last block whose events were all resolved.
	pub last_indexed_block: u64,
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::chains::ListenerSettings;

	#[test]
	fn test_checkpoint_json_shape() {
		let checkpoint = ListenerCheckpoint {
			chain_name: "optimism".to_string(),
			last_indexed_block: 100,
		};
		let json = serde_json::to_string(&checkpoint).unwrap();
		assert_eq!(json, r#"{"chainName":"optimism","lastIndexedBlock":100}"#);
	}

	#[test]
	fn test_from_network_clamps_zero_range() {
		let network = NetworkConfig {
			name: "base".to_string(),
			chain_id: 8453,
			family: ChainFamily::Evm,
			rpc_url: "http://localhost:8545".to_string(),
			domain: 8453,
			settler_address: "0x01".to_string(),
			legacy_tx: false,
			fee_token: None,
			tx_confirmations: 1,
			listener: ListenerSettings {
				max_block_range_per_request: 0,
				..ListenerSettings::default()
			},
		};

		let config = ListenerConfig::from_network(&network);
		assert_eq!(config.max_block_range_per_request, 1);
		assert_eq!(config.chain_name, "base");
		assert_eq!(config.contract_address, "0x01");
	}
}
