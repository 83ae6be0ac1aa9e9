//! Starknet chain client: multicalls signed by a single-owner account.

use crate::{ChainClient, DeliveryError};
use alloy::primitives::{B256, U256};
use async_trait::async_trait;
use solver_account::CairoAccount;
use solver_order::felt::{b256_to_felt, bytes_to_felts, join_u256, order_id_to_felts, split_u256};
use solver_types::{
	retry, ChainFamily, FillInstruction, NetworkConfig, OrderStatus, ResolvedOrder, RetryPolicy,
	TransactionHash, TransactionReceipt,
};
use starknet::accounts::{Account, ConnectedAccount, ExecutionEncoding, SingleOwnerAccount};
use starknet::core::types::{
	BlockId, BlockTag, Call, ExecutionResult, Felt, FunctionCall, ReceiptBlock,
};
use starknet::core::utils::{cairo_short_string_to_felt, get_selector_from_name};
use starknet::providers::jsonrpc::HttpTransport;
use starknet::providers::{JsonRpcClient, Provider, Url};
use starknet::signers::LocalWallet;
use std::time::Duration;

/// STRK, used for messaging fees when the network names no fee token.
const DEFAULT_FEE_TOKEN: &str =
	"0x04718f5a0fc34cc1af16a1cdee98ffb20c31f5cd61d6ab07201858f4287c938d";

type StarknetAccount = SingleOwnerAccount<JsonRpcClient<HttpTransport>, LocalWallet>;

/// Calldata of `fill(order_id: u256, origin_data: Bytes, filler_data: Bytes)`.
/// Filler data is always empty.
pub fn fill_calldata(order_id: &B256, origin_data: &[u8]) -> Vec<Felt> {
	let (low, high) = order_id_to_felts(order_id);
	let mut calldata = vec![low, high];
	calldata.extend(bytes_to_felts(origin_data));
	calldata.extend([Felt::ZERO, Felt::ZERO]);
	calldata
}

/// Calldata of `settle(order_ids: Array<u256>, value: u256)`.
pub fn settle_calldata(order_ids: &[B256], value: U256) -> Vec<Felt> {
	let mut calldata = vec![Felt::from(order_ids.len() as u64)];
	for order_id in order_ids {
		let (low, high) = order_id_to_felts(order_id);
		calldata.extend([low, high]);
	}
	let (low, high) = split_u256(value);
	calldata.extend([low, high]);
	calldata
}

/// Amounts per Cairo token paid out on `chain_id`. The zero token resolves to
/// `fee_token`, so it shares an entry with outputs naming the fee token.
pub fn spend_by_token(order: &ResolvedOrder, chain_id: u64, fee_token: Felt) -> Vec<(Felt, U256)> {
	let mut totals: Vec<(Felt, U256)> = Vec::new();
	for output in order.max_spent_on(chain_id) {
		let token = if output.token == B256::ZERO {
			fee_token
		} else {
			b256_to_felt(&output.token)
		};
		match totals.iter_mut().find(|(existing, _)| *existing == token) {
			Some((_, total)) => *total = total.saturating_add(output.amount),
			None => totals.push((token, output.amount)),
		}
	}
	totals
}

/// A token the fill pays out, with the allowance the settler already has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpend {
	pub token: Felt,
	pub amount: U256,
	pub allowance: U256,
}

fn approve_call(token: Felt, spender: Felt, amount: U256) -> Result<Call, DeliveryError> {
	let (low, high) = split_u256(amount);
	Ok(Call {
		to: token,
		selector: selector("approve")?,
		calldata: vec![spender, low, high],
	})
}

/// Multicall of a fill: one `approve` per token whose allowance falls short,
/// then the settler's `fill`.
pub fn fill_calls(
	settler: Felt,
	spends: &[TokenSpend],
	order_id: &B256,
	origin_data: &[u8],
) -> Result<Vec<Call>, DeliveryError> {
	let mut calls = Vec::with_capacity(spends.len() + 1);
	for spend in spends.iter().filter(|spend| spend.allowance < spend.amount) {
		calls.push(approve_call(spend.token, settler, spend.amount)?);
	}
	calls.push(Call {
		to: settler,
		selector: selector("fill")?,
		calldata: fill_calldata(order_id, origin_data),
	});
	Ok(calls)
}

fn read_u256(result: &[Felt], entry_point: &'static str) -> Result<U256, DeliveryError> {
	match result {
		[low, high, ..] => {
			join_u256(low, high, entry_point).map_err(|e| DeliveryError::Network(e.to_string()))
		}
		_ => Err(DeliveryError::Network(format!(
			"{} returned a short result",
			entry_point
		))),
	}
}

/// Maps the settler's short-string status to an [`OrderStatus`].
pub fn status_from_felt(value: &Felt) -> OrderStatus {
	if *value == Felt::ZERO {
		return OrderStatus::Unknown;
	}
	[
		("OPENED", OrderStatus::Opened),
		("FILLED", OrderStatus::Filled),
		("SETTLED", OrderStatus::Settled),
		("REFUNDED", OrderStatus::Refunded),
	]
	.into_iter()
	.find(|(label, _)| cairo_short_string_to_felt(label).is_ok_and(|felt| felt == *value))
	.map(|(_, status)| status)
	.unwrap_or(OrderStatus::Other)
}

fn selector(name: &str) -> Result<Felt, DeliveryError> {
	get_selector_from_name(name).map_err(|e| DeliveryError::Config(e.to_string()))
}

pub struct CairoClient {
	account: StarknetAccount,
	chain_name: String,
	settler: Felt,
	fee_token: Felt,
	receipt_policy: RetryPolicy,
}

impl CairoClient {
	/// Builds the account; fetches the chain id from the node.
	pub async fn connect(
		network: &NetworkConfig,
		signer: &CairoAccount,
	) -> Result<Self, DeliveryError> {
		let url = Url::parse(&network.rpc_url)
			.map_err(|e| DeliveryError::Config(format!("Invalid RPC URL: {}", e)))?;
		let settler = Felt::from_hex(&network.settler_address)
			.map_err(|e| DeliveryError::Config(format!("Invalid settler address: {}", e)))?;
		let fee_token = Felt::from_hex(network.fee_token.as_deref().unwrap_or(DEFAULT_FEE_TOKEN))
			.map_err(|e| DeliveryError::Config(format!("Invalid fee token: {}", e)))?;

		let provider = JsonRpcClient::new(HttpTransport::new(url));
		let chain_id = provider
			.chain_id()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get chain id: {}", e)))?;

		let account = SingleOwnerAccount::new(
			provider,
			signer.signer(),
			signer.felt_address(),
			chain_id,
			ExecutionEncoding::New,
		);

		Ok(Self {
			account,
			chain_name: network.name.clone(),
			settler,
			fee_token,
			receipt_policy: RetryPolicy {
				max_attempts: 60,
				initial_interval: Duration::from_secs(2),
				multiplier: 1.0,
			},
		})
	}

	/// The zero token stands for the fee token, Starknet having no native asset.
	fn token(&self, token: &B256) -> Felt {
		if *token == B256::ZERO {
			self.fee_token
		} else {
			b256_to_felt(token)
		}
	}

	async fn call(
		&self,
		contract_address: Felt,
		entry_point: &str,
		calldata: Vec<Felt>,
	) -> Result<Vec<Felt>, DeliveryError> {
		self.account
			.provider()
			.call(
				FunctionCall {
					contract_address,
					entry_point_selector: selector(entry_point)?,
					calldata,
				},
				BlockId::Tag(BlockTag::Latest),
			)
			.await
			.map_err(|e| DeliveryError::Network(format!("{} call failed: {}", entry_point, e)))
	}

	async fn allowance(&self, token: Felt) -> Result<U256, DeliveryError> {
		let result = self
			.call(token, "allowance", vec![self.account.address(), self.settler])
			.await?;
		read_u256(&result, "allowance")
	}

	async fn execute(&self, calls: Vec<Call>) -> Result<TransactionReceipt, DeliveryError> {
		let result = self
			.account
			.execute_v3(calls)
			.send()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to send transaction: {}", e)))?;
		let tx_hash = result.transaction_hash;
		tracing::info!(
			chain = %self.chain_name,
			tx_hash = %format!("{:#x}", tx_hash),
			"Submitted transaction"
		);

		self.wait_for_receipt(tx_hash).await
	}

	async fn wait_for_receipt(&self, tx_hash: Felt) -> Result<TransactionReceipt, DeliveryError> {
		let label = format!("receipt {:#x}", tx_hash);
		let receipt = retry(&self.receipt_policy, &label, || async {
			let receipt = match self.account.provider().get_transaction_receipt(tx_hash).await {
				Ok(receipt) => receipt,
				Err(e) => return Err(DeliveryError::Network(e.to_string())),
			};
			match receipt.block {
				ReceiptBlock::Block { block_number, .. } => Ok((receipt.receipt, block_number)),
				ReceiptBlock::Pending => Err(DeliveryError::Network(
					"transaction is still pending".to_string(),
				)),
			}
		})
		.await?;

		let (receipt, block_number) = receipt;
		if let ExecutionResult::Reverted { reason } = receipt.execution_result() {
			return Err(DeliveryError::Transaction(format!(
				"transaction {:#x} reverted: {}",
				tx_hash, reason
			)));
		}

		Ok(TransactionReceipt {
			hash: TransactionHash(tx_hash.to_bytes_be().to_vec()),
			block_number,
			success: true,
		})
	}
}

#[async_trait]
impl ChainClient for CairoClient {
	fn family(&self) -> ChainFamily {
		ChainFamily::Cairo
	}

	async fn token_balance(&self, token: &B256) -> Result<U256, DeliveryError> {
		let result = self
			.call(self.token(token), "balance_of", vec![self.account.address()])
			.await?;
		read_u256(&result, "balance_of")
	}

	async fn order_status(&self, order_id: &B256) -> Result<OrderStatus, DeliveryError> {
		let (low, high) = order_id_to_felts(order_id);
		let result = self.call(self.settler, "order_status", vec![low, high]).await?;
		result
			.first()
			.map(status_from_felt)
			.ok_or_else(|| DeliveryError::Network("order_status returned nothing".to_string()))
	}

	async fn fill(
		&self,
		order: &ResolvedOrder,
		instruction: &FillInstruction,
	) -> Result<TransactionReceipt, DeliveryError> {
		let mut spends = Vec::new();
		for (token, amount) in spend_by_token(order, instruction.destination_chain_id, self.fee_token)
		{
			let allowance = self.allowance(token).await?;
			spends.push(TokenSpend {
				token,
				amount,
				allowance,
			});
		}

		let calls = fill_calls(
			self.settler,
			&spends,
			&order.order_id,
			&instruction.origin_data,
		)?;
		tracing::debug!(
			chain = %self.chain_name,
			order_id = %order.short_id(),
			approvals = calls.len() - 1,
			"Built fill multicall"
		);
		self.execute(calls).await
	}

	async fn settle(
		&self,
		order_ids: &[B256],
		origin_domain: u32,
	) -> Result<TransactionReceipt, DeliveryError> {
		let quote = self
			.call(
				self.settler,
				"quote_gas_payment",
				vec![Felt::from(origin_domain)],
			)
			.await?;
		let value = read_u256(&quote, "quote_gas_payment")?;

		let calls = vec![
			approve_call(self.fee_token, self.settler, value)?,
			Call {
				to: self.settler,
				selector: selector("settle")?,
				calldata: settle_calldata(order_ids, value),
			},
		];

		self.execute(calls).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_fill_calldata_layout() {
		let order_id = B256::repeat_byte(0xab);
		let origin_data = vec![7u8; 40];
		let calldata = fill_calldata(&order_id, &origin_data);

		let (low, high) = order_id_to_felts(&order_id);
		assert_eq!(calldata[0], low);
		assert_eq!(calldata[1], high);
		assert_eq!(calldata[2], Felt::from(40u64));
		assert_eq!(calldata[3], Felt::from(3u64));
		// Three words, then an empty filler payload.
		assert_eq!(calldata.len(), 2 + 2 + 3 + 2);
		assert_eq!(&calldata[calldata.len() - 2..], &[Felt::ZERO, Felt::ZERO]);
	}

	#[test]
	fn test_settle_calldata_layout() {
		let ids = [B256::repeat_byte(1), B256::repeat_byte(2)];
		let value = U256::from(1u128 << 100);
		let calldata = settle_calldata(&ids, value);

		assert_eq!(calldata.len(), 1 + 4 + 2);
		assert_eq!(calldata[0], Felt::from(2u64));
		let (low, high) = order_id_to_felts(&ids[1]);
		assert_eq!(calldata[3], low);
		assert_eq!(calldata[4], high);
		assert_eq!(calldata[5], Felt::from(1u128 << 100));
		assert_eq!(calldata[6], Felt::ZERO);
	}

	fn order_paying(outputs: Vec<(B256, u64)>) -> ResolvedOrder {
		ResolvedOrder {
			user: B256::repeat_byte(0x01),
			origin_chain_id: 1,
			open_deadline: 0,
			fill_deadline: u64::MAX,
			order_id: B256::repeat_byte(0xab),
			max_spent: outputs
				.into_iter()
				.map(|(token, amount)| solver_types::Output {
					token,
					amount: U256::from(amount),
					recipient: B256::repeat_byte(0x02),
					chain_id: 7,
				})
				.collect(),
			min_received: vec![],
			fill_instructions: vec![],
		}
	}

	#[test]
	fn test_zero_token_and_fee_token_share_one_spend() {
		let fee_token = Felt::from_hex(DEFAULT_FEE_TOKEN).unwrap();
		let fee_token_b256 = B256::from(fee_token.to_bytes_be());
		let other = B256::left_padding_from(&[0x42]);
		let order = order_paying(vec![(B256::ZERO, 10), (other, 5), (fee_token_b256, 7)]);

		let spends = spend_by_token(&order, 7, fee_token);

		assert_eq!(
			spends,
			vec![(fee_token, U256::from(17u8)), (Felt::from(0x42u64), U256::from(5u8))]
		);
		assert!(spend_by_token(&order, 8, fee_token).is_empty());
	}

	#[test]
	fn test_fill_approves_only_short_allowances() {
		let settler = Felt::from(0x5e77u64);
		let spends = [
			TokenSpend {
				token: Felt::from(1u64),
				amount: U256::from(100u8),
				allowance: U256::from(100u8),
			},
			TokenSpend {
				token: Felt::from(2u64),
				amount: U256::from(100u8),
				allowance: U256::from(99u8),
			},
		];

		let calls = fill_calls(settler, &spends, &B256::repeat_byte(0xab), &[]).unwrap();

		assert_eq!(calls.len(), 2);
		assert_eq!(calls[0].to, Felt::from(2u64));
		assert_eq!(calls[0].selector, get_selector_from_name("approve").unwrap());
		assert_eq!(calls[0].calldata, vec![settler, Felt::from(100u64), Felt::ZERO]);
		assert_eq!(calls[1].to, settler);
		assert_eq!(calls[1].selector, get_selector_from_name("fill").unwrap());

		let covered = fill_calls(settler, &spends[..1], &B256::repeat_byte(0xab), &[]).unwrap();
		assert_eq!(covered.len(), 1);
	}

	#[test]
	fn test_status_short_strings() {
		let felt = |s: &str| cairo_short_string_to_felt(s).unwrap();
		assert_eq!(status_from_felt(&Felt::ZERO), OrderStatus::Unknown);
		assert_eq!(status_from_felt(&felt("FILLED")), OrderStatus::Filled);
		assert_eq!(status_from_felt(&felt("OPENED")), OrderStatus::Opened);
		assert_eq!(status_from_felt(&felt("SETTLED")), OrderStatus::Settled);
		assert_eq!(status_from_felt(&felt("REFUNDED")), OrderStatus::Refunded);
		assert_eq!(status_from_felt(&felt("UNKNOWN_X")), OrderStatus::Other);
	}
}
