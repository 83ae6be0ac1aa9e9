//! Routing of fill, settle and status calls to chain clients.

use alloy::primitives::{B256, U256};
use solver_account::AccountService;
use solver_types::{
	retry, ChainFamily, NetworkRegistry, OrderStatus, ResolvedOrder, RetryPolicy,
	TransactionReceipt,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};

use crate::{create_client, origin_domain, ChainClient, DeliveryError};

/// Attempts made on Cairo chains while waiting for the FILLED status, since
/// their RPC nodes lag behind the fill receipt.
const CAIRO_STATUS_ATTEMPTS: u32 = 5;

pub struct DeliveryService {
	registry: Arc<NetworkRegistry>,
	accounts: AccountService,
	/// One cell per chain, so connecting to a slow endpoint only holds up
	/// callers of that chain.
	clients: Mutex<HashMap<u64, Arc<OnceCell<Arc<dyn ChainClient>>>>>,
	locks: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
	status_poll_interval: Duration,
}

impl DeliveryService {
	pub fn new(registry: Arc<NetworkRegistry>, accounts: AccountService) -> Self {
		Self {
			registry,
			accounts,
			clients: Mutex::new(HashMap::new()),
			locks: Mutex::new(HashMap::new()),
			status_poll_interval: Duration::from_secs(2),
		}
	}

	/// Installs a pre-built client for a chain instead of connecting lazily.
	pub fn with_client(mut self, chain_id: u64, client: Arc<dyn ChainClient>) -> Self {
		self.clients
			.get_mut()
			.insert(chain_id, Arc::new(OnceCell::from(client)));
		self
	}

	pub fn with_status_poll_interval(mut self, interval: Duration) -> Self {
		self.status_poll_interval = interval;
		self
	}

	pub fn registry(&self) -> &Arc<NetworkRegistry> {
		&self.registry
	}

	async fn client(&self, chain_id: u64) -> Result<Arc<dyn ChainClient>, DeliveryError> {
		let network = self
			.registry
			.get(chain_id)
			.ok_or(DeliveryError::UnknownChain(chain_id))?;

		let cell = self
			.clients
			.lock()
			.await
			.entry(chain_id)
			.or_default()
			.clone();

		cell.get_or_try_init(|| create_client(network, &self.accounts))
			.await
			.cloned()
	}

	async fn chain_lock(&self, chain_id: u64) -> Arc<Mutex<()>> {
		self.locks
			.lock()
			.await
			.entry(chain_id)
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone()
	}

	fn status_policy(&self, family: ChainFamily) -> RetryPolicy {
		match family {
			ChainFamily::Cairo => RetryPolicy::new(CAIRO_STATUS_ATTEMPTS, self.status_poll_interval),
			ChainFamily::Evm => RetryPolicy::new(1, self.status_poll_interval),
		}
	}

	/// Distinct destination chains of the order, in instruction order.
	pub fn destination_chains(order: &ResolvedOrder) -> Vec<u64> {
		let mut chains: Vec<u64> = Vec::new();
		for instruction in &order.fill_instructions {
			if !chains.contains(&instruction.destination_chain_id) {
				chains.push(instruction.destination_chain_id);
			}
		}
		chains
	}

	/// Executes every fill instruction of the order on its destination chain.
	/// Returns each confirmed fill with its destination chain.
	pub async fn fill(
		&self,
		order: &ResolvedOrder,
	) -> Result<Vec<(u64, TransactionReceipt)>, DeliveryError> {
		self.fill_instructions(order, false).await
	}

	/// Completes an interrupted fill: instructions whose destination settler
	/// already reports the order FILLED are skipped.
	pub async fn resume_fill(
		&self,
		order: &ResolvedOrder,
	) -> Result<Vec<(u64, TransactionReceipt)>, DeliveryError> {
		self.fill_instructions(order, true).await
	}

	async fn fill_instructions(
		&self,
		order: &ResolvedOrder,
		skip_filled: bool,
	) -> Result<Vec<(u64, TransactionReceipt)>, DeliveryError> {
		if order.fill_instructions.is_empty() {
			return Err(DeliveryError::InvalidOrder(
				"order has no fill instructions".to_string(),
			));
		}

		let mut receipts = Vec::with_capacity(order.fill_instructions.len());
		for instruction in &order.fill_instructions {
			let chain_id = instruction.destination_chain_id;
			let client = self.client(chain_id).await?;

			if skip_filled && client.order_status(&order.order_id).await? == OrderStatus::Filled {
				tracing::info!(order_id = %order.short_id(), chain_id, "Fill already landed");
				continue;
			}

			let lock = self.chain_lock(chain_id).await;
			let _guard = lock.lock().await;

			tracing::info!(order_id = %order.short_id(), chain_id, "Filling order");
			let receipt = client.fill(order, instruction).await?;
			tracing::info!(
				order_id = %order.short_id(),
				chain_id,
				tx_hash = %receipt.hash,
				block = receipt.block_number,
				"Fill confirmed"
			);
			receipts.push((chain_id, receipt));
		}
		Ok(receipts)
	}

	/// Settles the order on every destination chain once the settler reports
	/// it FILLED. The settler relays the settlement to the origin chain.
	pub async fn settle(
		&self,
		order: &ResolvedOrder,
	) -> Result<Vec<TransactionReceipt>, DeliveryError> {
		let origin_domain = origin_domain(&self.registry, order)?;

		let mut receipts = Vec::new();
		for chain_id in Self::destination_chains(order) {
			let client = self.client(chain_id).await?;
			self.wait_until_filled(client.as_ref(), order).await?;

			let lock = self.chain_lock(chain_id).await;
			let _guard = lock.lock().await;

			tracing::info!(order_id = %order.short_id(), chain_id, origin_domain, "Settling order");
			let receipt = client.settle(&[order.order_id], origin_domain).await?;
			tracing::info!(
				order_id = %order.short_id(),
				chain_id,
				tx_hash = %receipt.hash,
				"Settle confirmed"
			);
			receipts.push(receipt);
		}
		Ok(receipts)
	}

	async fn wait_until_filled(
		&self,
		client: &dyn ChainClient,
		order: &ResolvedOrder,
	) -> Result<(), DeliveryError> {
		let policy = self.status_policy(client.family());
		retry(&policy, "Waiting for FILLED status", || async {
			match client.order_status(&order.order_id).await {
				Ok(OrderStatus::Filled) => Ok(()),
				Ok(status) => Err(DeliveryError::NotFilled {
					order_id: order.short_id(),
					status,
				}),
				Err(e) => Err(e),
			}
		})
		.await
	}

	/// Status of the order across its destination settlers: the first status
	/// other than UNKNOWN, so a partially filled order is not reported unknown.
	pub async fn order_status(&self, order: &ResolvedOrder) -> Result<OrderStatus, DeliveryError> {
		let chains = Self::destination_chains(order);
		if chains.is_empty() {
			return Err(DeliveryError::InvalidOrder(
				"order has no fill instructions".to_string(),
			));
		}

		for chain_id in chains {
			let status = self.client(chain_id).await?.order_status(&order.order_id).await?;
			if status != OrderStatus::Unknown {
				return Ok(status);
			}
		}
		Ok(OrderStatus::Unknown)
	}

	pub async fn token_balance(&self, chain_id: u64, token: &B256) -> Result<U256, DeliveryError> {
		self.client(chain_id).await?.token_balance(token).await
	}
}
