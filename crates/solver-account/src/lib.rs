//! Solver signing keys, one per chain family.

use alloy::primitives::B256;
use solver_types::{ChainFamily, ConfigSchema};
use std::sync::Arc;
use thiserror::Error;

pub mod implementations {
	pub mod cairo;
	pub mod evm;
}

pub use implementations::cairo::CairoAccount;
pub use implementations::evm::EvmAccount;

#[derive(Debug, Error)]
pub enum AccountError {
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),
	#[error("No {0} account configured")]
	Missing(ChainFamily),
}

/// Common view over a family-specific account.
pub trait AccountInterface: Send + Sync {
	fn family(&self) -> ChainFamily;

	/// Solver address, normalized to 32 bytes.
	fn address(&self) -> B256;

	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Holds the configured account of every family.
#[derive(Clone, Default)]
pub struct AccountService {
	evm: Option<Arc<EvmAccount>>,
	cairo: Option<Arc<CairoAccount>>,
}

impl AccountService {
	pub fn new(evm: Option<EvmAccount>, cairo: Option<CairoAccount>) -> Self {
		Self {
			evm: evm.map(Arc::new),
			cairo: cairo.map(Arc::new),
		}
	}

	/// Builds accounts from the `[accounts]` table, which holds an optional
	/// `evm` and an optional `cairo` sub-table.
	pub fn from_config(config: &toml::Value) -> Result<Self, AccountError> {
		let evm = config
			.get("evm")
			.map(implementations::evm::create_account)
			.transpose()?;
		let cairo = config
			.get("cairo")
			.map(implementations::cairo::create_account)
			.transpose()?;

		if let Some(account) = &evm {
			tracing::info!(address = %account.address(), "Loaded EVM account");
		}
		if let Some(account) = &cairo {
			tracing::info!(address = %account.address(), "Loaded Cairo account");
		}

		Ok(Self::new(evm, cairo))
	}

	pub fn evm(&self) -> Result<Arc<EvmAccount>, AccountError> {
		self.evm
			.clone()
			.ok_or(AccountError::Missing(ChainFamily::Evm))
	}

	pub fn cairo(&self) -> Result<Arc<CairoAccount>, AccountError> {
		self.cairo
			.clone()
			.ok_or(AccountError::Missing(ChainFamily::Cairo))
	}

	pub fn has(&self, family: ChainFamily) -> bool {
		match family {
			ChainFamily::Evm => self.evm.is_some(),
			ChainFamily::Cairo => self.cairo.is_some(),
		}
	}
}
