//! Solver configuration.
//!
//! The whole solver is described by one TOML file: identity, keys, storage,
//! executor tuning, the networks to watch and optional allow/block lists.

use serde::{Deserialize, Serialize};
use solver_types::{AllowBlockLists, ChainFamily, NetworkConfig};
use std::collections::HashSet;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	#[serde(default)]
	pub solver: SolverSettings,
	/// Keys per chain family: `[accounts.evm]` and `[accounts.cairo]`.
	#[serde(default = "empty_table")]
	pub accounts: toml::Value,
	#[serde(default)]
	pub storage: StorageConfig,
	#[serde(default)]
	pub executor: ExecutorConfig,
	pub networks: Vec<NetworkConfig>,
	#[serde(default)]
	pub rules: AllowBlockLists,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolverSettings {
	#[serde(default = "default_solver_name")]
	pub name: String,
	/// Capacity of the lifecycle event channel.
	#[serde(default = "default_event_capacity")]
	pub event_capacity: usize,
}

impl Default for SolverSettings {
	fn default() -> Self {
		Self {
			name: default_solver_name(),
			event_capacity: default_event_capacity(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// `file` or `memory`.
	#[serde(default = "default_storage_backend")]
	pub backend: String,
	/// Backend specific settings, validated by the backend's schema.
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			backend: default_storage_backend(),
			config: empty_table(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutorConfig {
	/// First delay while waiting for the FILLED status before settling.
	#[serde(default = "default_status_poll_interval_ms")]
	pub status_poll_interval_ms: u64,
}

impl Default for ExecutorConfig {
	fn default() -> Self {
		Self {
			status_poll_interval_ms: default_status_poll_interval_ms(),
		}
	}
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::Table::new())
}

fn default_solver_name() -> String {
	"hyperlane7683-solver".to_string()
}

fn default_event_capacity() -> usize {
	1000
}

fn default_storage_backend() -> String {
	"file".to_string()
}

fn default_status_poll_interval_ms() -> u64 {
	2000
}

impl Config {
	/// Families of every configured network, each listed once.
	pub fn families(&self) -> Vec<ChainFamily> {
		let mut families = Vec::new();
		for network in &self.networks {
			if !families.contains(&network.family) {
				families.push(network.family);
			}
		}
		families
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

		if self.networks.is_empty() {
			return invalid("At least one network must be configured".to_string());
		}

		let mut names = HashSet::new();
		let mut chain_ids = HashSet::new();
		let mut domains = HashSet::new();
		for network in &self.networks {
			if network.name.trim().is_empty() {
				return invalid(format!("Network {} has an empty name", network.chain_id));
			}
			if !names.insert(network.name.as_str()) {
				return invalid(format!("Duplicate network name '{}'", network.name));
			}
			if !chain_ids.insert(network.chain_id) {
				return invalid(format!("Duplicate chain id {}", network.chain_id));
			}
			if !domains.insert(network.domain) {
				return invalid(format!("Duplicate domain {}", network.domain));
			}
			if network.rpc_url.trim().is_empty() {
				return invalid(format!("Network '{}' has no rpc_url", network.name));
			}
			if network.settler_address.trim().is_empty() {
				return invalid(format!("Network '{}' has no settler_address", network.name));
			}

			let listener = &network.listener;
			if listener.poll_interval_ms == 0 {
				return invalid(format!(
					"Network '{}': poll_interval_ms must be positive",
					network.name
				));
			}
			if listener.max_block_range_per_request == 0 {
				return invalid(format!(
					"Network '{}': max_block_range_per_request must be positive",
					network.name
				));
			}
		}

		for family in self.families() {
			if self.accounts.get(family.to_string()).is_none() {
				return invalid(format!(
					"Networks of family '{}' are configured but [accounts.{}] is missing",
					family, family
				));
			}
		}

		if self.storage.backend.trim().is_empty() {
			return invalid("Storage backend cannot be empty".to_string());
		}
		if self.executor.status_poll_interval_ms == 0 {
			return invalid("status_poll_interval_ms must be positive".to_string());
		}

		Ok(())
	}
}
