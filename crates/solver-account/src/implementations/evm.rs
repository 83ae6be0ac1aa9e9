//! EVM account backed by a local private key.

use crate::{AccountError, AccountInterface};
use alloy::network::EthereumWallet;
use alloy::primitives::{hex, Address, B256};
use alloy::signers::local::PrivateKeySigner;
use solver_types::{ChainFamily, ConfigSchema, Field, FieldType, Schema, ValidationError};

pub struct EvmAccount {
	signer: PrivateKeySigner,
}

impl EvmAccount {
	/// Parses a hex private key, with or without `0x`.
	pub fn new(private_key_hex: &str) -> Result<Self, AccountError> {
		let signer = private_key_hex
			.parse::<PrivateKeySigner>()
			.map_err(|e| AccountError::InvalidKey(format!("Invalid private key: {}", e)))?;

		Ok(Self { signer })
	}

	pub fn evm_address(&self) -> Address {
		self.signer.address()
	}

	/// Wallet used by providers to sign outgoing transactions.
	pub fn wallet(&self) -> EthereumWallet {
		EthereumWallet::from(self.signer.clone())
	}
}

impl AccountInterface for EvmAccount {
	fn family(&self) -> ChainFamily {
		ChainFamily::Evm
	}

	fn address(&self) -> B256 {
		self.signer.address().into_word()
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(EvmAccountSchema)
	}
}

pub struct EvmAccountSchema;

impl ConfigSchema for EvmAccountSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("private_key", FieldType::String).with_validator(|value| {
					let key = value.as_str().unwrap_or_default();
					let key_without_prefix = key.strip_prefix("0x").unwrap_or(key);

					if key_without_prefix.len() != 64 {
						return Err("Private key must be 64 hex characters (32 bytes)".to_string());
					}

					if hex::decode(key_without_prefix).is_err() {
						return Err("Private key must be valid hexadecimal".to_string());
					}

					Ok(())
				}),
			],
			vec![],
		);

		schema.validate(config)
	}
}

/// Builds the EVM account from its `[accounts.evm]` table.
pub fn create_account(config: &toml::Value) -> Result<EvmAccount, AccountError> {
	EvmAccountSchema
		.validate(config)
		.map_err(|e| AccountError::InvalidConfig(e.to_string()))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.ok_or_else(|| AccountError::InvalidConfig("private_key is required".to_string()))?;

	EvmAccount::new(private_key)
}
