//! Cairo decoder for the Hyperlane7683 `Open` event.
//!
//! Event data is the serialized `ResolvedCrossChainOrder`:
//!
//! ```text
//! user, origin_domain, open_deadline, fill_deadline, order_id.low, order_id.high,
//! max_spent_len, (token, amount.low, amount.high, recipient, domain)*,
//! min_received_len, (token, amount.low, amount.high, recipient, domain)*,
//! fill_instructions_len, (domain, settler, size, words_len, word*)*
//! ```

use alloy::primitives::{Bytes, B256, U256};
use solver_types::{FillInstruction, NetworkRegistry, Output, ResolvedOrder};
use starknet::core::types::Felt;
use std::sync::Arc;

use crate::felt::{
	felt_to_b256, felt_to_u128, felt_to_u32, felt_to_u64, join_u256, u128_words_to_bytes,
};
use crate::DecodeError;

const OUTPUT_FELTS: usize = 5;

/// Sequential reader over event felts. Every read is bounds-checked.
struct FeltReader<'a> {
	data: &'a [Felt],
	pos: usize,
}

impl<'a> FeltReader<'a> {
	fn new(data: &'a [Felt]) -> Self {
		Self { data, pos: 0 }
	}

	fn remaining(&self) -> usize {
		self.data.len() - self.pos
	}

	fn felt(&mut self, field: &'static str) -> Result<&'a Felt, DecodeError> {
		let value = self
			.data
			.get(self.pos)
			.ok_or(DecodeError::Truncated { field })?;
		self.pos += 1;
		Ok(value)
	}

	fn u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
		felt_to_u32(self.felt(field)?, field)
	}

	fn u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
		felt_to_u64(self.felt(field)?, field)
	}

	fn b256(&mut self, field: &'static str) -> Result<B256, DecodeError> {
		Ok(felt_to_b256(self.felt(field)?))
	}

	fn u256(&mut self, field: &'static str) -> Result<U256, DecodeError> {
		let low = self.felt(field)?;
		let high = self.felt(field)?;
		join_u256(low, high, field)
	}

	/// Reads an array length, rejecting lengths the remaining input cannot hold.
	fn len(&mut self, field: &'static str, min_item_felts: usize) -> Result<usize, DecodeError> {
		let len = self.u32(field)? as usize;
		if len.saturating_mul(min_item_felts) > self.remaining() {
			return Err(DecodeError::Truncated { field });
		}
		Ok(len)
	}

	fn bytes(&mut self, field: &'static str) -> Result<Bytes, DecodeError> {
		let size = self.u32(field)? as usize;
		let words_len = self.len(field, 1)?;
		let words = (0..words_len)
			.map(|_| felt_to_u128(self.felt(field)?, field))
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Bytes::from(u128_words_to_bytes(size, &words)?))
	}
}

/// Decodes `Open` events emitted by Cairo settlers. Domains are resolved to
/// chain ids through the registry; an unconfigured domain is a decode error.
pub struct CairoOrderDecoder {
	registry: Arc<NetworkRegistry>,
}

impl CairoOrderDecoder {
	pub fn new(registry: Arc<NetworkRegistry>) -> Self {
		Self { registry }
	}

	pub fn decode(&self, data: &[Felt]) -> Result<ResolvedOrder, DecodeError> {
		let mut reader = FeltReader::new(data);

		let user = reader.b256("user")?;
		let origin_chain_id = self.chain_id(reader.u32("origin_domain")?)?;
		let open_deadline = reader.u64("open_deadline")?;
		let fill_deadline = reader.u64("fill_deadline")?;
		let order_id = B256::from(reader.u256("order_id")?.to_be_bytes::<32>());
		let max_spent = self.outputs(&mut reader, "max_spent")?;
		let min_received = self.outputs(&mut reader, "min_received")?;

		// Domain, settler, size and words_len at minimum.
		let instructions_len = reader.len("fill_instructions", 4)?;
		if instructions_len == 0 {
			return Err(DecodeError::NoFillInstructions);
		}
		let mut fill_instructions = Vec::with_capacity(instructions_len);
		for _ in 0..instructions_len {
			fill_instructions.push(FillInstruction {
				destination_chain_id: self.chain_id(reader.u32("destination_domain")?)?,
				destination_settler: reader.b256("destination_settler")?,
				origin_data: reader.bytes("origin_data")?,
			});
		}

		Ok(ResolvedOrder {
			user,
			origin_chain_id,
			open_deadline,
			fill_deadline,
			order_id,
			max_spent,
			min_received,
			fill_instructions,
		})
	}

	fn outputs(
		&self,
		reader: &mut FeltReader<'_>,
		field: &'static str,
	) -> Result<Vec<Output>, DecodeError> {
		let len = reader.len(field, OUTPUT_FELTS)?;
		let mut outputs = Vec::with_capacity(len);
		for _ in 0..len {
			outputs.push(Output {
				token: reader.b256(field)?,
				amount: reader.u256(field)?,
				recipient: reader.b256(field)?,
				chain_id: self.chain_id(reader.u32(field)?)?,
			});
		}
		Ok(outputs)
	}

	fn chain_id(&self, domain: u32) -> Result<u64, DecodeError> {
		self.registry
			.chain_id_for_domain(domain)
			.ok_or(DecodeError::UnknownDomain(domain))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::felt::{bytes_to_felts, split_u256};
	use solver_types::{ChainFamily, ListenerSettings, NetworkConfig};

	const STARKNET_DOMAIN: u32 = 23448594;
	const OPTIMISM_DOMAIN: u32 = 11155420;

	fn registry() -> Arc<NetworkRegistry> {
		let network = |name: &str, chain_id, domain, family| NetworkConfig {
			name: name.to_string(),
			chain_id,
			family,
			rpc_url: "http://localhost:5050".to_string(),
			domain,
			settler_address: "0x01".to_string(),
			legacy_tx: false,
			fee_token: None,
			tx_confirmations: 1,
			listener: ListenerSettings::default(),
		};
		Arc::new(NetworkRegistry::new(vec![
			network("starknet", 393402133, STARKNET_DOMAIN, ChainFamily::Cairo),
			network("optimism", 11155420, OPTIMISM_DOMAIN, ChainFamily::Evm),
		]))
	}

	fn push_output(felts: &mut Vec<Felt>, amount: U256, domain: u32) {
		let (low, high) = split_u256(amount);
		felts.extend([Felt::from(0x7u64), low, high, Felt::from(0x9u64), Felt::from(domain)]);
	}

	fn encode(fill_instructions: usize, origin_data: &[u8]) -> Vec<Felt> {
		let (id_low, id_high) = split_u256(U256::from(1u8) << 200);
		let mut felts = vec![
			Felt::from(0x1234u64),
			Felt::from(STARKNET_DOMAIN),
			Felt::from(100u64),
			Felt::from(200u64),
			id_low,
			id_high,
			Felt::ONE,
		];
		push_output(&mut felts, U256::MAX, OPTIMISM_DOMAIN);
		felts.push(Felt::ONE);
		push_output(&mut felts, U256::from(5u8), STARKNET_DOMAIN);
		felts.push(Felt::from(fill_instructions as u64));
		for _ in 0..fill_instructions {
			felts.push(Felt::from(OPTIMISM_DOMAIN));
			felts.push(Felt::from(0xabcdu64));
			felts.extend(bytes_to_felts(origin_data));
		}
		felts
	}

	#[test]
	fn test_decode_open_event() {
		let origin_data: Vec<u8> = (0..448).map(|i| (i % 256) as u8).collect();
		let order = CairoOrderDecoder::new(registry())
			.decode(&encode(1, &origin_data))
			.unwrap();

		assert_eq!(order.user, B256::from(U256::from(0x1234u64).to_be_bytes::<32>()));
		assert_eq!(order.origin_chain_id, 393402133);
		assert_eq!(order.open_deadline, 100);
		assert_eq!(order.fill_deadline, 200);
		assert_eq!(
			order.order_id,
			B256::from((U256::from(1u8) << 200usize).to_be_bytes::<32>())
		);
		assert_eq!(order.max_spent[0].amount, U256::MAX);
		assert_eq!(order.max_spent[0].chain_id, 11155420);
		assert_eq!(order.min_received[0].amount, U256::from(5u8));
		assert_eq!(order.fill_instructions[0].destination_chain_id, 11155420);
		assert_eq!(order.fill_instructions[0].origin_data.as_ref(), &origin_data[..]);
	}

	#[test]
	fn test_every_truncation_is_an_error() {
		let felts = encode(1, &[1, 2, 3]);
		let decoder = CairoOrderDecoder::new(registry());

		for cut in 0..felts.len() {
			assert!(decoder.decode(&felts[..cut]).is_err(), "cut at {}", cut);
		}
		assert!(decoder.decode(&felts).is_ok());
	}

	#[test]
	fn test_unknown_domain() {
		let mut felts = encode(1, &[]);
		felts[1] = Felt::from(77u64);
		assert_eq!(
			CairoOrderDecoder::new(registry()).decode(&felts),
			Err(DecodeError::UnknownDomain(77))
		);
	}

	#[test]
	fn test_no_fill_instructions() {
		assert_eq!(
			CairoOrderDecoder::new(registry()).decode(&encode(0, &[])),
			Err(DecodeError::NoFillInstructions)
		);
	}

	#[test]
	fn test_absurd_length_does_not_allocate() {
		let mut felts = encode(1, &[]);
		felts[6] = Felt::from(u32::MAX);
		assert_eq!(
			CairoOrderDecoder::new(registry()).decode(&felts),
			Err(DecodeError::Truncated { field: "max_spent" })
		);
	}
}
