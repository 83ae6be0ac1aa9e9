//! Network registry shared by the listeners, the rule engine and the executor.
//!
//! The registry is built once from configuration and handed to every component
//! behind an `Arc`. Chain-family dispatch is a lookup in this table, so adding a
//! chain means adding an entry, not a branch.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction and event encoding used by a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
	/// EVM JSON-RPC with ABI encoded calldata and logs.
	Evm,
	/// Starknet JSON-RPC with felt calldata and events.
	Cairo,
}

impl fmt::Display for ChainFamily {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ChainFamily::Evm => f.write_str("evm"),
			ChainFamily::Cairo => f.write_str("cairo"),
		}
	}
}

/// Listener tuning for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerSettings {
	/// Whether a listener is started for this network.
	#[serde(default = "default_enabled")]
	pub enabled: bool,
	/// Absolute block (> 0), live (0) or blocks behind head (< 0).
	#[serde(default)]
	pub start_block: i64,
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	#[serde(default)]
	pub confirmation_blocks: u64,
	#[serde(default = "default_max_block_range")]
	pub max_block_range_per_request: u64,
	/// Attempts per backfill chunk before giving up on it.
	#[serde(default = "default_max_retries")]
	pub max_retries: u32,
}

impl Default for ListenerSettings {
	fn default() -> Self {
		Self {
			enabled: default_enabled(),
			start_block: 0,
			poll_interval_ms: default_poll_interval_ms(),
			confirmation_blocks: 0,
			max_block_range_per_request: default_max_block_range(),
			max_retries: default_max_retries(),
		}
	}
}

fn default_enabled() -> bool {
	true
}

fn default_poll_interval_ms() -> u64 {
	3000
}

fn default_max_block_range() -> u64 {
	500
}

fn default_max_retries() -> u32 {
	3
}

/// Static description of one network the solver talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
	/// Human-readable name, also the checkpoint key.
	pub name: String,
	pub chain_id: u64,
	pub family: ChainFamily,
	pub rpc_url: String,
	/// Hyperlane domain of this network.
	pub domain: u32,
	/// Hyperlane7683 settler contract (hex).
	pub settler_address: String,
	/// Forces legacy (non EIP-1559) gas pricing on EVM networks.
	#[serde(default)]
	pub legacy_tx: bool,
	/// Fee token used to pay messaging gas on Cairo networks (hex).
	#[serde(default)]
	pub fee_token: Option<String>,
	/// Confirmations awaited for submitted transactions.
	#[serde(default = "default_tx_confirmations")]
	pub tx_confirmations: u64,
	#[serde(default)]
	pub listener: ListenerSettings,
}

fn default_tx_confirmations() -> u64 {
	1
}

/// Lookup table over all configured networks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRegistry {
	networks: Vec<NetworkConfig>,
}

impl NetworkRegistry {
	pub fn new(networks: Vec<NetworkConfig>) -> Self {
		Self { networks }
	}

	pub fn networks(&self) -> &[NetworkConfig] {
		&self.networks
	}

	pub fn get(&self, chain_id: u64) -> Option<&NetworkConfig> {
		self.networks.iter().find(|n| n.chain_id == chain_id)
	}

	pub fn by_name(&self, name: &str) -> Option<&NetworkConfig> {
		self.networks.iter().find(|n| n.name == name)
	}

	/// Family of the chain, if the chain is configured.
	pub fn family(&self, chain_id: u64) -> Option<ChainFamily> {
		self.get(chain_id).map(|n| n.family)
	}

	pub fn is_cairo(&self, chain_id: u64) -> bool {
		self.family(chain_id) == Some(ChainFamily::Cairo)
	}

	/// Reverse lookup from a Hyperlane domain to the configured chain id.
	pub fn chain_id_for_domain(&self, domain: u32) -> Option<u64> {
		self.networks
			.iter()
			.find(|n| n.domain == domain)
			.map(|n| n.chain_id)
	}

	pub fn domain_for_chain(&self, chain_id: u64) -> Option<u32> {
		self.get(chain_id).map(|n| n.domain)
	}

	/// Families that at least one configured network uses.
	pub fn families(&self) -> Vec<ChainFamily> {
		let mut families: Vec<ChainFamily> = Vec::new();
		for network in &self.networks {
			if !families.contains(&network.family) {
				families.push(network.family);
			}
		}
		families
	}
}
