//! Starknet account: a deployed account contract address plus the key that
//! controls it.

use crate::{AccountError, AccountInterface};
use alloy::primitives::B256;
use solver_types::{ChainFamily, ConfigSchema, Field, FieldType, Schema, ValidationError};
use starknet::core::types::Felt;
use starknet::signers::{LocalWallet, SigningKey};

pub struct CairoAccount {
	address: Felt,
	signer: LocalWallet,
}

impl CairoAccount {
	pub fn new(address_hex: &str, private_key_hex: &str) -> Result<Self, AccountError> {
		let address = Felt::from_hex(address_hex)
			.map_err(|e| AccountError::InvalidKey(format!("Invalid account address: {}", e)))?;
		let secret = Felt::from_hex(private_key_hex)
			.map_err(|e| AccountError::InvalidKey(format!("Invalid private key: {}", e)))?;
		if secret == Felt::ZERO {
			return Err(AccountError::InvalidKey("Private key cannot be zero".to_string()));
		}

		Ok(Self {
			address,
			signer: LocalWallet::from(SigningKey::from_secret_scalar(secret)),
		})
	}

	pub fn felt_address(&self) -> Felt {
		self.address
	}

	pub fn signer(&self) -> LocalWallet {
		self.signer.clone()
	}
}

impl AccountInterface for CairoAccount {
	fn family(&self) -> ChainFamily {
		ChainFamily::Cairo
	}

	fn address(&self) -> B256 {
		B256::from(self.address.to_bytes_be())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(CairoAccountSchema)
	}
}

pub struct CairoAccountSchema;

impl ConfigSchema for CairoAccountSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![
				Field::new("address", FieldType::Hex { max_bytes: 32 }),
				Field::new("private_key", FieldType::Hex { max_bytes: 32 }),
			],
			vec![],
		)
		.validate(config)
	}
}

/// Builds the Cairo account from its `[accounts.cairo]` table.
pub fn create_account(config: &toml::Value) -> Result<CairoAccount, AccountError> {
	CairoAccountSchema
		.validate(config)
		.map_err(|e| AccountError::InvalidConfig(e.to_string()))?;

	let field = |name: &str| {
		config
			.get(name)
			.and_then(|v| v.as_str())
			.ok_or_else(|| AccountError::InvalidConfig(format!("{} is required", name)))
	};

	CairoAccount::new(field("address")?, field("private_key")?)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_create_account() {
		let config: toml::Value = toml::from_str(
			r#"
			address = "0x0127fd5f1fe78a71f8bcd1fec63e3fe2f0486b6ecd5c86a0466c3a21fa5cfcec"
			private_key = "0x00c1cf1490de1352865301bb8705143f3ef938f97fdf892f1090dcb5ac7bcd1d"
			"#,
		)
		.unwrap();
		let account = create_account(&config).unwrap();

		assert_eq!(account.family(), ChainFamily::Cairo);
		assert_eq!(account.address()[0], 0x01);
		assert_eq!(account.address()[1], 0x27);
	}

	#[test]
	fn test_zero_key_rejected() {
		assert!(CairoAccount::new("0x1", "0x0").is_err());
	}

	#[test]
	fn test_missing_address() {
		let config: toml::Value = toml::from_str("private_key = \"0x1\"").unwrap();
		assert!(matches!(
			create_account(&config),
			Err(AccountError::InvalidConfig(_))
		));
	}
}
