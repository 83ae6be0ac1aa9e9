//! Chain-agnostic order types for the solver system.
//!
//! Every chain family decodes its native "Open" event into a [`ResolvedOrder`],
//! which is the only order representation the rule engine and the executor see.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single token movement described by an order.
///
/// Addresses are normalized to 32 bytes so that EVM (20-byte) and Cairo
/// (felt) addresses share one representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
	/// Token contract. The zero value denotes the chain's native asset.
	pub token: B256,
	/// Amount in the token's smallest unit.
	pub amount: U256,
	/// Receiver of the tokens.
	pub recipient: B256,
	/// Chain on which the movement happens.
	pub chain_id: u64,
}

impl Output {
	/// Whether this output moves the native asset rather than a token contract.
	pub fn is_native(&self) -> bool {
		self.token == B256::ZERO
	}
}

/// Destination-side instructions needed to fill an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillInstruction {
	/// Chain on which the fill must be executed.
	pub destination_chain_id: u64,
	/// Settlement contract on the destination chain.
	pub destination_settler: B256,
	/// Opaque payload handed to the destination settler. Always ABI-shaped,
	/// regardless of the chain the order originated on.
	pub origin_data: Bytes,
}

/// Canonical, chain-agnostic representation of an opened intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOrder {
	/// Order creator on the origin chain.
	pub user: B256,
	pub origin_chain_id: u64,
	pub open_deadline: u64,
	pub fill_deadline: u64,
	/// Unique order identifier.
	pub order_id: B256,
	/// Maximum the filler pays out.
	pub max_spent: Vec<Output>,
	/// Minimum the filler receives in return.
	pub min_received: Vec<Output>,
	/// At least one entry for any order the solver can process.
	pub fill_instructions: Vec<FillInstruction>,
}

impl ResolvedOrder {
	/// Outputs of `max_spent` that are paid out on the given chain.
	pub fn max_spent_on(&self, chain_id: u64) -> impl Iterator<Item = &Output> {
		self.max_spent
			.iter()
			.filter(move |output| output.chain_id == chain_id)
	}

	/// Short form of the order id used in log lines.
	pub fn short_id(&self) -> String {
		let hex = self.order_id.to_string();
		format!("{}..", &hex[..10])
	}
}

/// Settlement status of an order as reported by a settler contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
	/// The settler has never seen the order.
	Unknown,
	Opened,
	Filled,
	Settled,
	Refunded,
	/// A status value this solver does not recognise.
	Other,
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let label = match self {
			OrderStatus::Unknown => "UNKNOWN",
			OrderStatus::Opened => "OPENED",
			OrderStatus::Filled => "FILLED",
			OrderStatus::Settled => "SETTLED",
			OrderStatus::Refunded => "REFUNDED",
			OrderStatus::Other => "OTHER",
		};
		f.write_str(label)
	}
}

/// Blockchain transaction hash, stored as raw bytes to support different chain formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHash(pub Vec<u8>);

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", alloy::primitives::hex::encode(&self.0))
	}
}

/// Transaction receipt containing execution details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: TransactionHash,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
}

/// Left-pads a 20-byte EVM address into the 32-byte form used by orders.
pub fn address_to_bytes32(address: Address) -> B256 {
	address.into_word()
}

/// Extracts an EVM address from its 32-byte form.
///
/// Returns `None` when the upper 12 bytes are not zero.
pub fn bytes32_to_address(value: &B256) -> Option<Address> {
	if value[..12].iter().any(|&b| b != 0) {
		return None;
	}
	Some(Address::from_word(*value))
}
