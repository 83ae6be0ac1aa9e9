//! Order decoding for the solver.
//!
//! Each chain family emits the Hyperlane7683 "Open" event in its own encoding.
//! The decoders here turn those payloads into the chain-agnostic
//! [`ResolvedOrder`](solver_types::ResolvedOrder). Decoding never panics and
//! never reads past the end of its input; malformed payloads surface as
//! [`DecodeError`] and the listener skips them.

use thiserror::Error;

pub mod felt;

pub mod implementations {
	pub mod cairo;
	pub mod evm;
}

pub use implementations::cairo::CairoOrderDecoder;
pub use implementations::evm::EvmOrderDecoder;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
	#[error("Payload truncated while reading {field}")]
	Truncated { field: &'static str },
	#[error("Value of {field} does not fit its type")]
	Overflow { field: &'static str },
	#[error("Invalid byte array: {0}")]
	InvalidBytes(String),
	#[error("ABI decoding failed: {0}")]
	Abi(String),
	#[error("Unknown domain {0}")]
	UnknownDomain(u32),
	#[error("Order has no fill instructions")]
	NoFillInstructions,
}
