//! Conversions between Cairo felts and the EVM-shaped primitives used by orders.
//!
//! A u256 crosses the Cairo ABI as two felts `(low, high)` holding 128 bits
//! each. Byte strings cross as `{size, words_len, words...}` where every word
//! is a big-endian u128 chunk and the last word keeps the trailing bytes in its
//! low-order bits.

use alloy::primitives::{B256, U256};
use starknet::core::types::Felt;

use crate::DecodeError;

const WORD_BYTES: usize = 16;

/// Splits a u256 into its `(low, high)` felts.
pub fn split_u256(value: U256) -> (Felt, Felt) {
	let bytes = value.to_be_bytes::<32>();
	let mut high = [0u8; 32];
	let mut low = [0u8; 32];
	high[16..].copy_from_slice(&bytes[..16]);
	low[16..].copy_from_slice(&bytes[16..]);
	(Felt::from_bytes_be(&low), Felt::from_bytes_be(&high))
}

/// Recombines `(low, high)` felts. Either half wider than 128 bits is an error.
pub fn join_u256(low: &Felt, high: &Felt, field: &'static str) -> Result<U256, DecodeError> {
	let low = felt_to_u128(low, field)?;
	let high = felt_to_u128(high, field)?;
	Ok((U256::from(high) << 128) | U256::from(low))
}

pub fn b256_to_felt(value: &B256) -> Felt {
	Felt::from_bytes_be(&value.0)
}

pub fn felt_to_b256(value: &Felt) -> B256 {
	B256::from(value.to_bytes_be())
}

/// Splits a 32-byte order id into `(low, high)` felts.
pub fn order_id_to_felts(order_id: &B256) -> (Felt, Felt) {
	split_u256(U256::from_be_bytes(order_id.0))
}

pub fn felt_to_u128(value: &Felt, field: &'static str) -> Result<u128, DecodeError> {
	let bytes = value.to_bytes_be();
	if bytes[..16].iter().any(|&b| b != 0) {
		return Err(DecodeError::Overflow { field });
	}
	let mut word = [0u8; 16];
	word.copy_from_slice(&bytes[16..]);
	Ok(u128::from_be_bytes(word))
}

pub fn felt_to_u64(value: &Felt, field: &'static str) -> Result<u64, DecodeError> {
	u64::try_from(felt_to_u128(value, field)?).map_err(|_| DecodeError::Overflow { field })
}

pub fn felt_to_u32(value: &Felt, field: &'static str) -> Result<u32, DecodeError> {
	u32::try_from(felt_to_u128(value, field)?).map_err(|_| DecodeError::Overflow { field })
}

/// Packs bytes into u128 words.
pub fn bytes_to_u128_words(bytes: &[u8]) -> Vec<u128> {
	bytes
		.chunks(WORD_BYTES)
		.map(|chunk| {
			chunk
				.iter()
				.fold(0u128, |acc, &byte| (acc << 8) | u128::from(byte))
		})
		.collect()
}

/// Unpacks `size` bytes from u128 words.
pub fn u128_words_to_bytes(size: usize, words: &[u128]) -> Result<Vec<u8>, DecodeError> {
	let expected_words = size.div_ceil(WORD_BYTES);
	if words.len() != expected_words {
		return Err(DecodeError::InvalidBytes(format!(
			"{} bytes need {} words, got {}",
			size,
			expected_words,
			words.len()
		)));
	}

	let mut bytes = Vec::with_capacity(size);
	for (i, word) in words.iter().enumerate() {
		let remaining = size - i * WORD_BYTES;
		let width = remaining.min(WORD_BYTES);
		let be = word.to_be_bytes();
		if be[..WORD_BYTES - width].iter().any(|&b| b != 0) {
			return Err(DecodeError::InvalidBytes(format!(
				"word {} wider than {} bytes",
				i, width
			)));
		}
		bytes.extend_from_slice(&be[WORD_BYTES - width..]);
	}
	Ok(bytes)
}

/// Encodes bytes as the `{size, words_len, words...}` felt sequence.
pub fn bytes_to_felts(bytes: &[u8]) -> Vec<Felt> {
	let words = bytes_to_u128_words(bytes);
	let mut felts = Vec::with_capacity(words.len() + 2);
	felts.push(Felt::from(bytes.len() as u64));
	felts.push(Felt::from(words.len() as u64));
	felts.extend(words.into_iter().map(Felt::from));
	felts
}
