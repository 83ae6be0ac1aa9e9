//! EVM decoder for the Hyperlane7683 `Open` log.

use alloy::primitives::{LogData, U256};
use alloy::sol_types::SolEvent;
use solver_types::{
	address_to_bytes32, FillInstruction, NetworkRegistry, Output, ResolvedOrder,
};
use std::sync::Arc;

use crate::DecodeError;

/// ABI types of the settler's `Open` event.
pub mod abi {
	alloy::sol! {
		struct Output {
			bytes32 token;
			uint256 amount;
			bytes32 recipient;
			uint256 chainId;
		}

		struct FillInstruction {
			uint64 destinationChainId;
			bytes32 destinationSettler;
			bytes originData;
		}

		struct ResolvedCrossChainOrder {
			address user;
			uint256 originChainId;
			uint32 openDeadline;
			uint32 fillDeadline;
			bytes32 orderId;
			Output[] maxSpent;
			Output[] minReceived;
			FillInstruction[] fillInstructions;
		}

		event Open(bytes32 indexed orderId, ResolvedCrossChainOrder resolvedOrder);
	}
}

/// Decodes `Open` logs emitted by EVM settlers.
///
/// Output and fill-instruction chain fields carry Hyperlane domains; a domain
/// known to the registry is translated to its chain id, any other value is
/// taken as the chain id itself.
pub struct EvmOrderDecoder {
	registry: Arc<NetworkRegistry>,
}

impl EvmOrderDecoder {
	pub fn new(registry: Arc<NetworkRegistry>) -> Self {
		Self { registry }
	}

	pub fn decode(&self, data: &LogData) -> Result<ResolvedOrder, DecodeError> {
		let event =
			abi::Open::decode_log_data(data).map_err(|e| DecodeError::Abi(e.to_string()))?;
		let order = event.resolvedOrder;

		if order.fillInstructions.is_empty() {
			return Err(DecodeError::NoFillInstructions);
		}

		Ok(ResolvedOrder {
			user: address_to_bytes32(order.user),
			origin_chain_id: u256_to_u64(order.originChainId, "origin_chain_id")?,
			open_deadline: u64::from(order.openDeadline),
			fill_deadline: u64::from(order.fillDeadline),
			order_id: event.orderId,
			max_spent: self.outputs(&order.maxSpent, "max_spent")?,
			min_received: self.outputs(&order.minReceived, "min_received")?,
			fill_instructions: order
				.fillInstructions
				.into_iter()
				.map(|instruction| FillInstruction {
					destination_chain_id: self.chain_id(instruction.destinationChainId),
					destination_settler: instruction.destinationSettler,
					origin_data: instruction.originData,
				})
				.collect(),
		})
	}

	fn outputs(
		&self,
		outputs: &[abi::Output],
		field: &'static str,
	) -> Result<Vec<Output>, DecodeError> {
		outputs
			.iter()
			.map(|output| {
				Ok(Output {
					token: output.token,
					amount: output.amount,
					recipient: output.recipient,
					chain_id: self.chain_id(u256_to_u64(output.chainId, field)?),
				})
			})
			.collect()
	}

	fn chain_id(&self, domain_or_chain: u64) -> u64 {
		u32::try_from(domain_or_chain)
			.ok()
			.and_then(|domain| self.registry.chain_id_for_domain(domain))
			.unwrap_or(domain_or_chain)
	}
}

fn u256_to_u64(value: U256, field: &'static str) -> Result<u64, DecodeError> {
	if value > U256::from(u64::MAX) {
		return Err(DecodeError::Overflow { field });
	}
	Ok(value.as_limbs()[0])
}
