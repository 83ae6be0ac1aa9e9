//! Fill and settle execution for the solver.
//!
//! [`ChainClient`] is the per-chain transaction builder; EVM and Cairo chains
//! each have one implementation. [`DeliveryService`] routes every call to the
//! client of the chain named by the order's fill instructions.

use alloy::primitives::{B256, U256};
use async_trait::async_trait;
use solver_account::{AccountError, AccountService};
use solver_types::{
	ChainFamily, FillInstruction, NetworkConfig, NetworkRegistry, OrderStatus, ResolvedOrder,
	TransactionReceipt,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod executor;

pub mod implementations {
	pub mod cairo;
	pub mod evm;
}

pub use executor::DeliveryService;

#[derive(Debug, Error)]
pub enum DeliveryError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Transaction failed: {0}")]
	Transaction(String),
	#[error("Invalid configuration: {0}")]
	Config(String),
	#[error("Chain {0} is not configured")]
	UnknownChain(u64),
	#[error("Account error: {0}")]
	Account(#[from] AccountError),
	#[error("Order {order_id} is {status}, expected FILLED")]
	NotFilled {
		order_id: String,
		status: OrderStatus,
	},
	#[error("Invalid order: {0}")]
	InvalidOrder(String),
}

/// Transaction builder for one chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
	fn family(&self) -> ChainFamily;

	/// Solver balance of `token`; the zero token is the chain's native asset.
	async fn token_balance(&self, token: &B256) -> Result<U256, DeliveryError>;

	/// Status of the order on this chain's settler.
	async fn order_status(&self, order_id: &B256) -> Result<OrderStatus, DeliveryError>;

	/// Executes `instruction`, funding every `max_spent` output of this chain.
	async fn fill(
		&self,
		order: &ResolvedOrder,
		instruction: &FillInstruction,
	) -> Result<TransactionReceipt, DeliveryError>;

	/// Settles filled orders, paying for the message to `origin_domain`.
	async fn settle(
		&self,
		order_ids: &[B256],
		origin_domain: u32,
	) -> Result<TransactionReceipt, DeliveryError>;
}

/// Connects the client for a network according to its chain family.
pub async fn create_client(
	network: &NetworkConfig,
	accounts: &AccountService,
) -> Result<Arc<dyn ChainClient>, DeliveryError> {
	let client: Arc<dyn ChainClient> = match network.family {
		ChainFamily::Evm => Arc::new(implementations::evm::EvmClient::new(
			network,
			&*accounts.evm()?,
		)?),
		ChainFamily::Cairo => Arc::new(
			implementations::cairo::CairoClient::connect(network, &*accounts.cairo()?).await?,
		),
	};

	tracing::info!(
		chain = %network.name,
		family = %network.family,
		"Connected chain client"
	);
	Ok(client)
}

/// Domain of the order's origin chain, needed to pay for settlement messages.
pub(crate) fn origin_domain(
	registry: &NetworkRegistry,
	order: &ResolvedOrder,
) -> Result<u32, DeliveryError> {
	registry
		.domain_for_chain(order.origin_chain_id)
		.ok_or(DeliveryError::UnknownChain(order.origin_chain_id))
}

/// Amounts per token that the solver pays out on `chain_id`.
pub fn outputs_by_token(order: &ResolvedOrder, chain_id: u64) -> HashMap<B256, U256> {
	let mut totals: HashMap<B256, U256> = HashMap::new();
	for output in order.max_spent_on(chain_id) {
		let total = totals.entry(output.token).or_insert(U256::ZERO);
		*total = total.saturating_add(output.amount);
	}
	totals
}
