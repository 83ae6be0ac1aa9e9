//! Allow and block lists applied to every order before any funds move.

use alloy::primitives::{hex, B256};
use serde::{Deserialize, Serialize};

/// Wildcard accepted by every field of a list entry.
pub const WILDCARD: &str = "*";

/// One list entry. Each field is either [`WILDCARD`] or a concrete value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowBlockListItem {
	#[serde(default = "wildcard", alias = "sender_address")]
	pub sender_address: String,
	#[serde(default = "wildcard", alias = "destination_domain")]
	pub destination_domain: String,
	#[serde(default = "wildcard", alias = "recipient_address")]
	pub recipient_address: String,
}

fn wildcard() -> String {
	WILDCARD.to_string()
}

impl Default for AllowBlockListItem {
	/// Matches every order.
	fn default() -> Self {
		Self {
			sender_address: wildcard(),
			destination_domain: wildcard(),
			recipient_address: wildcard(),
		}
	}
}

impl AllowBlockListItem {
	pub fn matches(&self, sender: &B256, destination_domain: u32, recipient: &B256) -> bool {
		address_matches(&self.sender_address, sender)
			&& domain_matches(&self.destination_domain, destination_domain)
			&& address_matches(&self.recipient_address, recipient)
	}
}

/// Allow and block lists. An empty allow list permits everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowBlockLists {
	#[serde(default, alias = "allow_list")]
	pub allow_list: Vec<AllowBlockListItem>,
	#[serde(default, alias = "block_list")]
	pub block_list: Vec<AllowBlockListItem>,
}

impl AllowBlockLists {
	pub fn is_empty(&self) -> bool {
		self.allow_list.is_empty() && self.block_list.is_empty()
	}

	pub fn is_allowed(&self, sender: &B256, destination_domain: u32, recipient: &B256) -> bool {
		let allowed = self.allow_list.is_empty()
			|| self
				.allow_list
				.iter()
				.any(|item| item.matches(sender, destination_domain, recipient));

		allowed
			&& !self
				.block_list
				.iter()
				.any(|item| item.matches(sender, destination_domain, recipient))
	}
}

fn domain_matches(pattern: &str, domain: u32) -> bool {
	let pattern = pattern.trim();
	pattern == WILDCARD || pattern.parse::<u32>().ok() == Some(domain)
}

/// Compares a hex pattern against a 32-byte address, left-padding short
/// patterns so 20-byte EVM addresses match their normalized form.
fn address_matches(pattern: &str, address: &B256) -> bool {
	let pattern = pattern.trim();
	if pattern == WILDCARD {
		return true;
	}
	match hex::decode(pattern) {
		Ok(bytes) if bytes.len() <= 32 => {
			let mut word = [0u8; 32];
			word[32 - bytes.len()..].copy_from_slice(&bytes);
			B256::from(word) == *address
		}
		_ => false,
	}
}
