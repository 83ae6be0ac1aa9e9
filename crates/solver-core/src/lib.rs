//! Solver wiring.
//!
//! [`SolverBuilder`] turns a [`Config`] into a [`SolverEngine`]: the network
//! registry, accounts, storage, checkpoint store, delivery service, rule
//! engine, the shared [`OrderProcessor`] and one listener per network.

use solver_account::{AccountError, AccountService};
use solver_config::Config;
use solver_delivery::{ChainClient, DeliveryService};
use solver_discovery::{create_listener, ListenerError, ListenerInterface};
use solver_rules::RuleEngine;
use solver_storage::{
	create_storage, CheckpointStore, StorageCheckpointStore, StorageError, StorageService,
};
use solver_types::{EventBus, NetworkRegistry};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod engine;
pub mod lifecycle;
pub mod processor;

pub use engine::SolverEngine;
pub use lifecycle::LifecycleState;
pub use processor::{OrderProcessor, OrderProgress};

#[cfg(test)]
mod testing;

#[derive(Debug, Error)]
pub enum SolverError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	#[error("Account error: {0}")]
	Account(#[from] AccountError),
	#[error("Listener error: {0}")]
	Listener(#[from] ListenerError),
	#[error("Lifecycle error: {0}")]
	Lifecycle(String),
}

/// Builds a [`SolverEngine`] from configuration. Every component can be
/// replaced before [`build`](Self::build), which is how tests run the engine
/// against mock chains.
pub struct SolverBuilder {
	config: Config,
	storage: Option<StorageService>,
	checkpoints: Option<Arc<dyn CheckpointStore>>,
	accounts: Option<AccountService>,
	clients: Vec<(u64, Arc<dyn ChainClient>)>,
	listeners: Vec<Box<dyn ListenerInterface>>,
}

impl SolverBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			storage: None,
			checkpoints: None,
			accounts: None,
			clients: Vec::new(),
			listeners: Vec::new(),
		}
	}

	pub fn with_storage(mut self, storage: StorageService) -> Self {
		self.storage = Some(storage);
		self
	}

	pub fn with_checkpoints(mut self, checkpoints: Arc<dyn CheckpointStore>) -> Self {
		self.checkpoints = Some(checkpoints);
		self
	}

	pub fn with_accounts(mut self, accounts: AccountService) -> Self {
		self.accounts = Some(accounts);
		self
	}

	pub fn with_client(mut self, chain_id: u64, client: Arc<dyn ChainClient>) -> Self {
		self.clients.push((chain_id, client));
		self
	}

	/// Replaces the listeners that would be built from `[[networks]]`.
	pub fn with_listener(mut self, listener: Box<dyn ListenerInterface>) -> Self {
		self.listeners.push(listener);
		self
	}

	pub fn build(self) -> Result<SolverEngine, SolverError> {
		let config = self.config;
		let registry = Arc::new(NetworkRegistry::new(config.networks.clone()));

		let storage = match self.storage {
			Some(storage) => storage,
			None => StorageService::new(create_storage(
				&config.storage.backend,
				&config.storage.config,
			)?),
		};

		let accounts = match self.accounts {
			Some(accounts) => accounts,
			None => AccountService::from_config(&config.accounts)?,
		};
		for network in registry.networks() {
			let injected = self.clients.iter().any(|(id, _)| *id == network.chain_id);
			if !injected && !accounts.has(network.family) {
				return Err(SolverError::Config(format!(
					"Network '{}' needs a {} account",
					network.name, network.family
				)));
			}
		}

		let mut delivery = DeliveryService::new(registry.clone(), accounts).with_status_poll_interval(
			Duration::from_millis(config.executor.status_poll_interval_ms),
		);
		for (chain_id, client) in self.clients {
			delivery = delivery.with_client(chain_id, client);
		}
		let delivery = Arc::new(delivery);

		let lists = (!config.rules.is_empty()).then(|| config.rules.clone());
		let rules = RuleEngine::standard(delivery.clone(), lists);
		tracing::info!(rules = ?rules.rule_names(), "Rule engine ready");

		let event_bus = EventBus::new(config.solver.event_capacity);
		let processor = Arc::new(OrderProcessor::new(
			rules,
			delivery,
			storage.clone(),
			event_bus.clone(),
		));

		let checkpoints: Arc<dyn CheckpointStore> = match self.checkpoints {
			Some(checkpoints) => checkpoints,
			None => Arc::new(StorageCheckpointStore::new(storage)),
		};

		let listeners = if self.listeners.is_empty() {
			let mut listeners = Vec::new();
			for network in registry.networks() {
				if !network.listener.enabled {
					tracing::info!(chain = %network.name, "Listener disabled");
					continue;
				}
				listeners.push(create_listener(
					network,
					registry.clone(),
					checkpoints.clone(),
					event_bus.clone(),
				)?);
			}
			listeners
		} else {
			self.listeners
		};

		if listeners.is_empty() {
			return Err(SolverError::Config(
				"No network has an enabled listener".to_string(),
			));
		}

		Ok(SolverEngine {
			config,
			processor,
			listeners,
			event_bus,
			cancel: CancellationToken::new(),
			lifecycle: Default::default(),
		})
	}
}
