use alloy::primitives::{Bytes, B256, U256};
use async_trait::async_trait;
use solver_account::AccountService;
use solver_delivery::{ChainClient, DeliveryError, DeliveryService};
use solver_types::{
	ChainFamily, FillInstruction, ListenerSettings, NetworkConfig, NetworkRegistry, OrderStatus,
	Output, ResolvedOrder, TransactionReceipt,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub const ORIGIN: u64 = 11155111;
pub const DEST: u64 = 84532;
pub const DEST_DOMAIN: u32 = 84532;
pub const TOKEN: B256 = B256::repeat_byte(0x77);

pub fn registry() -> Arc<NetworkRegistry> {
	let network = |name: &str, chain_id: u64| NetworkConfig {
		name: name.to_string(),
		chain_id,
		family: ChainFamily::Evm,
		rpc_url: "http://localhost:8545".to_string(),
		domain: chain_id as u32,
		settler_address: "0x01".to_string(),
		legacy_tx: false,
		fee_token: None,
		tx_confirmations: 1,
		listener: ListenerSettings::default(),
	};
	Arc::new(NetworkRegistry::new(vec![
		network("sepolia", ORIGIN),
		network("base", DEST),
	]))
}

pub fn output(token: B256, amount: u64, chain_id: u64) -> Output {
	Output {
		token,
		amount: U256::from(amount),
		recipient: B256::repeat_byte(0x02),
		chain_id,
	}
}

/// An order spending `spent` of [`TOKEN`] on [`DEST`] in exchange for
/// `received` on the origin.
pub fn order(spent: u64, received: u64) -> ResolvedOrder {
	ResolvedOrder {
		user: B256::repeat_byte(0x01),
		origin_chain_id: ORIGIN,
		open_deadline: 0,
		fill_deadline: u64::MAX,
		order_id: B256::repeat_byte(0xab),
		max_spent: vec![output(TOKEN, spent, DEST)],
		min_received: vec![output(TOKEN, received, ORIGIN)],
		fill_instructions: vec![FillInstruction {
			destination_chain_id: DEST,
			destination_settler: B256::repeat_byte(0x03),
			origin_data: Bytes::new(),
		}],
	}
}

pub struct MockClient {
	balance: U256,
	status: Mutex<Result<OrderStatus, String>>,
	pub balance_calls: AtomicU32,
	pub status_calls: AtomicU32,
}

impl MockClient {
	pub fn new(balance: U256, status: OrderStatus) -> Self {
		Self {
			balance,
			status: Mutex::new(Ok(status)),
			balance_calls: AtomicU32::new(0),
			status_calls: AtomicU32::new(0),
		}
	}

	pub fn failing_status(self) -> Self {
		*self.status.lock().unwrap() = Err("rpc down".to_string());
		self
	}
}

#[async_trait]
impl ChainClient for MockClient {
	fn family(&self) -> ChainFamily {
		ChainFamily::Evm
	}

	async fn token_balance(&self, _token: &B256) -> Result<U256, DeliveryError> {
		self.balance_calls.fetch_add(1, Ordering::SeqCst);
		Ok(self.balance)
	}

	async fn order_status(&self, _order_id: &B256) -> Result<OrderStatus, DeliveryError> {
		self.status_calls.fetch_add(1, Ordering::SeqCst);
		self.status
			.lock()
			.unwrap()
			.clone()
			.map_err(DeliveryError::Network)
	}

	async fn fill(
		&self,
		_order: &ResolvedOrder,
		_instruction: &FillInstruction,
	) -> Result<TransactionReceipt, DeliveryError> {
		Err(DeliveryError::Transaction("rules never fill".to_string()))
	}

	async fn settle(
		&self,
		_order_ids: &[B256],
		_origin_domain: u32,
	) -> Result<TransactionReceipt, DeliveryError> {
		Err(DeliveryError::Transaction("rules never settle".to_string()))
	}
}

pub fn delivery(client: Arc<MockClient>) -> Arc<DeliveryService> {
	Arc::new(DeliveryService::new(registry(), AccountService::default()).with_client(DEST, client))
}
