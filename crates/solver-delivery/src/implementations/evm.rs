//! EVM chain client built on alloy.

use crate::{outputs_by_token, ChainClient, DeliveryError};
use alloy::network::ReceiptResponse;
use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::sol;
use async_trait::async_trait;
use solver_account::EvmAccount;
use solver_types::{
	bytes32_to_address, ChainFamily, FillInstruction, NetworkConfig, OrderStatus, ResolvedOrder,
	TransactionHash, TransactionReceipt,
};
use std::time::Duration;

const TX_TIMEOUT: Duration = Duration::from_secs(300);

sol! {
	#[sol(rpc)]
	interface IHyperlane7683 {
		function fill(bytes32 orderId, bytes originData, bytes fillerData) external payable;
		function settle(bytes32[] orderIds) external payable;
		function orderStatus(bytes32 orderId) external view returns (bytes32);
		function quoteGasPayment(uint32 destinationDomain) external view returns (uint256);
	}

	#[sol(rpc)]
	interface IERC20 {
		function balanceOf(address account) external view returns (uint256);
		function allowance(address owner, address spender) external view returns (uint256);
		function approve(address spender, uint256 amount) external returns (bool);
	}
}

/// Maps the settler's `bytes32` status word to an [`OrderStatus`].
pub fn status_from_word(word: &B256) -> OrderStatus {
	if *word == B256::ZERO {
		return OrderStatus::Unknown;
	}
	[
		("OPENED", OrderStatus::Opened),
		("FILLED", OrderStatus::Filled),
		("SETTLED", OrderStatus::Settled),
		("REFUNDED", OrderStatus::Refunded),
	]
	.into_iter()
	.find(|(label, _)| keccak256(label.as_bytes()) == *word)
	.map(|(_, status)| status)
	.unwrap_or(OrderStatus::Other)
}

pub struct EvmClient {
	provider: DynProvider,
	chain_id: u64,
	solver: Address,
	settler: Address,
	legacy_tx: bool,
	confirmations: u64,
}

impl EvmClient {
	pub fn new(network: &NetworkConfig, account: &EvmAccount) -> Result<Self, DeliveryError> {
		let url = network
			.rpc_url
			.parse()
			.map_err(|e| DeliveryError::Config(format!("Invalid RPC URL: {}", e)))?;
		let settler = network
			.settler_address
			.parse::<Address>()
			.map_err(|e| DeliveryError::Config(format!("Invalid settler address: {}", e)))?;

		let provider = ProviderBuilder::new()
			.wallet(account.wallet())
			.connect_http(url)
			.erased();

		Ok(Self {
			provider,
			chain_id: network.chain_id,
			solver: account.evm_address(),
			settler,
			legacy_tx: network.legacy_tx,
			confirmations: network.tx_confirmations.max(1),
		})
	}

	fn token_address(token: &B256) -> Result<Address, DeliveryError> {
		bytes32_to_address(token).ok_or_else(|| {
			DeliveryError::InvalidOrder(format!("{} is not an EVM token address", token))
		})
	}

	async fn gas_price(&self) -> Result<Option<u128>, DeliveryError> {
		if !self.legacy_tx {
			return Ok(None);
		}
		self.provider
			.get_gas_price()
			.await
			.map(Some)
			.map_err(|e| DeliveryError::Network(format!("Failed to get gas price: {}", e)))
	}

	/// Approves the settler for `amount` of `token` when the allowance is short.
	async fn ensure_allowance(&self, token: Address, amount: U256) -> Result<(), DeliveryError> {
		let erc20 = IERC20::new(token, self.provider.clone());
		let allowance = erc20
			.allowance(self.solver, self.settler)
			.call()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to read allowance: {}", e)))?;
		if allowance >= amount {
			return Ok(());
		}

		tracing::info!(token = %token, amount = %amount, "Approving settler");
		let mut call = erc20.approve(self.settler, amount);
		if let Some(gas_price) = self.gas_price().await? {
			call = call.gas_price(gas_price);
		}
		let pending = call
			.send()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to send approve: {}", e)))?;
		self.confirm(pending).await?;
		Ok(())
	}

	async fn confirm(
		&self,
		pending: alloy::providers::PendingTransactionBuilder<alloy::network::Ethereum>,
	) -> Result<TransactionReceipt, DeliveryError> {
		let tx_hash = *pending.tx_hash();
		tracing::info!(chain_id = self.chain_id, tx_hash = %tx_hash, "Submitted transaction");

		let receipt = pending
			.with_required_confirmations(self.confirmations)
			.with_timeout(Some(TX_TIMEOUT))
			.get_receipt()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get receipt: {}", e)))?;

		if !receipt.status() {
			return Err(DeliveryError::Transaction(format!(
				"transaction {} reverted",
				tx_hash
			)));
		}

		Ok(TransactionReceipt {
			hash: TransactionHash(tx_hash.to_vec()),
			block_number: receipt.block_number().unwrap_or_default(),
			success: true,
		})
	}
}

#[async_trait]
impl ChainClient for EvmClient {
	fn family(&self) -> ChainFamily {
		ChainFamily::Evm
	}

	async fn token_balance(&self, token: &B256) -> Result<U256, DeliveryError> {
		if *token == B256::ZERO {
			return self
				.provider
				.get_balance(self.solver)
				.await
				.map_err(|e| DeliveryError::Network(format!("Failed to get balance: {}", e)));
		}

		IERC20::new(Self::token_address(token)?, self.provider.clone())
			.balanceOf(self.solver)
			.call()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get token balance: {}", e)))
	}

	async fn order_status(&self, order_id: &B256) -> Result<OrderStatus, DeliveryError> {
		let word = IHyperlane7683::new(self.settler, self.provider.clone())
			.orderStatus(*order_id)
			.call()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get order status: {}", e)))?;
		Ok(status_from_word(&word))
	}

	async fn fill(
		&self,
		order: &ResolvedOrder,
		instruction: &FillInstruction,
	) -> Result<TransactionReceipt, DeliveryError> {
		let mut native_value = U256::ZERO;
		for (token, amount) in outputs_by_token(order, self.chain_id) {
			if token == B256::ZERO {
				native_value = native_value.saturating_add(amount);
			} else {
				self.ensure_allowance(Self::token_address(&token)?, amount)
					.await?;
			}
		}

		let settler = IHyperlane7683::new(self.settler, self.provider.clone());
		let mut call = settler
			.fill(
				order.order_id,
				instruction.origin_data.clone(),
				Bytes::new(),
			)
			.value(native_value);
		if let Some(gas_price) = self.gas_price().await? {
			call = call.gas_price(gas_price);
		}

		let pending = call
			.send()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to send fill: {}", e)))?;
		self.confirm(pending).await
	}

	async fn settle(
		&self,
		order_ids: &[B256],
		origin_domain: u32,
	) -> Result<TransactionReceipt, DeliveryError> {
		let settler = IHyperlane7683::new(self.settler, self.provider.clone());
		let quote = settler
			.quoteGasPayment(origin_domain)
			.call()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to quote gas payment: {}", e)))?;

		let mut call = settler.settle(order_ids.to_vec()).value(quote);
		if let Some(gas_price) = self.gas_price().await? {
			call = call.gas_price(gas_price);
		}

		let pending = call
			.send()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to send settle: {}", e)))?;
		self.confirm(pending).await
	}
}
