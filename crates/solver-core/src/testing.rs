use alloy::primitives::{Bytes, B256, U256};
use async_trait::async_trait;
use solver_config::{Config, ExecutorConfig, SolverSettings, StorageConfig};
use solver_delivery::{ChainClient, DeliveryError};
use solver_discovery::{ListenerError, OpenEvent, OrderEventSource};
use solver_storage::implementations::memory::MemoryStorage;
use solver_storage::{
	CheckpointStore, StorageCheckpointStore, StorageError, StorageInterface, StorageService,
};
use solver_types::{
	AllowBlockLists, ChainFamily, ConfigSchema, FillInstruction, ListenerConfig, ListenerSettings,
	NetworkConfig, OrderStatus, Output, ResolvedOrder, TransactionHash, TransactionReceipt,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub const ORIGIN: u64 = 11155111;
pub const DEST: u64 = 84532;
pub const TOKEN: B256 = B256::repeat_byte(0x77);

pub fn network(name: &str, chain_id: u64) -> NetworkConfig {
	NetworkConfig {
		name: name.to_string(),
		chain_id,
		family: ChainFamily::Evm,
		rpc_url: "http://localhost:8545".to_string(),
		domain: chain_id as u32,
		settler_address: "0x0000000000000000000000000000000000000001".to_string(),
		legacy_tx: false,
		fee_token: None,
		tx_confirmations: 1,
		listener: ListenerSettings {
			start_block: 1,
			poll_interval_ms: 10,
			..ListenerSettings::default()
		},
	}
}

pub fn config() -> Config {
	Config {
		solver: SolverSettings::default(),
		accounts: toml::Value::Table(toml::Table::new()),
		storage: StorageConfig {
			backend: "memory".to_string(),
			config: toml::Value::Table(toml::Table::new()),
		},
		executor: ExecutorConfig {
			status_poll_interval_ms: 10,
		},
		networks: vec![network("sepolia", ORIGIN), network("base", DEST)],
		rules: AllowBlockLists::default(),
	}
}

pub fn storage() -> StorageService {
	StorageService::new(Box::new(MemoryStorage::new()))
}

/// Memory storage whose `n`-th write fails, counting from one.
pub struct FailingWrite {
	inner: MemoryStorage,
	writes: AtomicU32,
	fail_at: u32,
}

impl FailingWrite {
	pub fn storage(fail_at: u32) -> StorageService {
		StorageService::new(Box::new(Self {
			inner: MemoryStorage::new(),
			writes: AtomicU32::new(0),
			fail_at,
		}))
	}
}

#[async_trait]
impl StorageInterface for FailingWrite {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.inner.get_bytes(key).await
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		if self.writes.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_at {
			return Err(StorageError::Backend("disk full".to_string()));
		}
		self.inner.set_bytes(key, value).await
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.inner.delete(key).await
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		self.inner.exists(key).await
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		self.inner.config_schema()
	}
}

pub fn checkpoints(storage: &StorageService) -> Arc<StorageCheckpointStore> {
	Arc::new(StorageCheckpointStore::new(storage.clone()))
}

pub fn listener_config() -> ListenerConfig {
	ListenerConfig::from_network(&network("sepolia", ORIGIN))
}

/// Order `id` spending `spent` of [`TOKEN`] on [`DEST`] for `received`.
pub fn order(id: u8, spent: u64, received: u64) -> ResolvedOrder {
	let output = |amount: u64, chain_id| Output {
		token: TOKEN,
		amount: U256::from(amount),
		recipient: B256::repeat_byte(0x02),
		chain_id,
	};
	ResolvedOrder {
		user: B256::repeat_byte(0x01),
		origin_chain_id: ORIGIN,
		open_deadline: 0,
		fill_deadline: u64::MAX,
		order_id: B256::repeat_byte(id),
		max_spent: vec![output(spent, DEST)],
		min_received: vec![output(received, ORIGIN)],
		fill_instructions: vec![FillInstruction {
			destination_chain_id: DEST,
			destination_settler: B256::repeat_byte(0x03),
			origin_data: Bytes::from(vec![id; 8]),
		}],
	}
}

/// Destination chain whose settler state follows the solver's own calls.
pub struct MockChain {
	balance: U256,
	statuses: Mutex<Vec<(B256, OrderStatus)>>,
	settle_failures: AtomicU32,
	fill_failures: AtomicU32,
	pub fills: AtomicU32,
	pub settles: AtomicU32,
	/// Checkpoint of the origin chain seen by each successful settle.
	watched: Option<Arc<dyn CheckpointStore>>,
	pub checkpoint_at_settle: Mutex<Vec<Option<u64>>>,
}

impl MockChain {
	pub fn new(balance: u64) -> Self {
		Self {
			balance: U256::from(balance),
			statuses: Mutex::new(Vec::new()),
			settle_failures: AtomicU32::new(0),
			fill_failures: AtomicU32::new(0),
			fills: AtomicU32::new(0),
			settles: AtomicU32::new(0),
			watched: None,
			checkpoint_at_settle: Mutex::new(Vec::new()),
		}
	}

	pub fn failing_settles(self, count: u32) -> Self {
		self.settle_failures.store(count, Ordering::SeqCst);
		self
	}

	pub fn failing_fills(self, count: u32) -> Self {
		self.fill_failures.store(count, Ordering::SeqCst);
		self
	}

	pub fn watching(mut self, checkpoints: Arc<dyn CheckpointStore>) -> Self {
		self.watched = Some(checkpoints);
		self
	}

	pub fn set_status(&self, order_id: B256, status: OrderStatus) {
		let mut statuses = self.statuses.lock().unwrap();
		statuses.retain(|(id, _)| *id != order_id);
		statuses.push((order_id, status));
	}

	fn receipt(tag: u8) -> TransactionReceipt {
		TransactionReceipt {
			hash: TransactionHash(vec![tag; 32]),
			block_number: 1,
			success: true,
		}
	}
}

#[async_trait]
impl ChainClient for MockChain {
	fn family(&self) -> ChainFamily {
		ChainFamily::Evm
	}

	async fn token_balance(&self, _token: &B256) -> Result<U256, DeliveryError> {
		Ok(self.balance)
	}

	async fn order_status(&self, order_id: &B256) -> Result<OrderStatus, DeliveryError> {
		Ok(self
			.statuses
			.lock()
			.unwrap()
			.iter()
			.find(|(id, _)| id == order_id)
			.map(|(_, status)| *status)
			.unwrap_or(OrderStatus::Unknown))
	}

	async fn fill(
		&self,
		order: &ResolvedOrder,
		_instruction: &FillInstruction,
	) -> Result<TransactionReceipt, DeliveryError> {
		if self
			.fill_failures
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
			.is_ok()
		{
			return Err(DeliveryError::Transaction("fill reverted".to_string()));
		}
		self.fills.fetch_add(1, Ordering::SeqCst);
		self.set_status(order.order_id, OrderStatus::Filled);
		Ok(Self::receipt(0xf1))
	}

	async fn settle(
		&self,
		order_ids: &[B256],
		_origin_domain: u32,
	) -> Result<TransactionReceipt, DeliveryError> {
		if self
			.settle_failures
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
			.is_ok()
		{
			return Err(DeliveryError::Transaction("settle reverted".to_string()));
		}

		if let Some(checkpoints) = &self.watched {
			let seen = checkpoints.get("sepolia").await.unwrap();
			self.checkpoint_at_settle.lock().unwrap().push(seen);
		}
		self.settles.fetch_add(1, Ordering::SeqCst);
		for order_id in order_ids {
			self.set_status(*order_id, OrderStatus::Settled);
		}
		Ok(Self::receipt(0x5e))
	}
}

/// Origin chain with a fixed head and a fixed set of Open events.
pub struct MockSource {
	pub head: u64,
	pub events: Vec<OpenEvent>,
}

impl MockSource {
	pub fn new(head: u64, orders: Vec<(u64, ResolvedOrder)>) -> Self {
		Self {
			head,
			events: orders
				.into_iter()
				.enumerate()
				.map(|(index, (block_number, order))| OpenEvent {
					block_number,
					log_index: index as u64,
					order: Ok(order),
				})
				.collect(),
		}
	}
}

#[async_trait]
impl OrderEventSource for MockSource {
	async fn latest_block(&self) -> Result<u64, ListenerError> {
		Ok(self.head)
	}

	async fn fetch_order_events(
		&self,
		from: u64,
		to: u64,
	) -> Result<Vec<OpenEvent>, ListenerError> {
		Ok(self
			.events
			.iter()
			.filter(|event| event.block_number >= from && event.block_number <= to)
			.cloned()
			.collect())
	}
}
