//! Allow and block list policy.

use crate::{Rule, RuleError};
use async_trait::async_trait;
use solver_types::{AllowBlockLists, NetworkRegistry, ResolvedOrder};
use std::sync::Arc;

/// Permits an order only when every output it spends, seen as
/// `(user, destination domain, recipient)`, passes the lists.
pub struct AllowBlockListRule {
	lists: AllowBlockLists,
	registry: Arc<NetworkRegistry>,
}

impl AllowBlockListRule {
	pub fn new(lists: AllowBlockLists, registry: Arc<NetworkRegistry>) -> Self {
		Self { lists, registry }
	}
}

#[async_trait]
impl Rule for AllowBlockListRule {
	fn name(&self) -> &'static str {
		"allow_block_list"
	}

	async fn evaluate(&self, order: &ResolvedOrder) -> Result<(), RuleError> {
		for output in &order.max_spent {
			let domain = self.registry.domain_for_chain(output.chain_id).ok_or_else(|| {
				RuleError::Blocked(format!("chain {} is not served", output.chain_id))
			})?;

			if !self.lists.is_allowed(&order.user, domain, &output.recipient) {
				return Err(RuleError::Blocked(format!(
					"sender {} to {} on domain {} is not allowed",
					order.user, output.recipient, domain
				)));
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{order, output, registry, DEST, DEST_DOMAIN, TOKEN};
	use solver_types::AllowBlockListItem;

	fn item(sender: &str, domain: &str, recipient: &str) -> AllowBlockListItem {
		AllowBlockListItem {
			sender_address: sender.to_string(),
			destination_domain: domain.to_string(),
			recipient_address: recipient.to_string(),
		}
	}

	fn rule(allow: Vec<AllowBlockListItem>, block: Vec<AllowBlockListItem>) -> AllowBlockListRule {
		AllowBlockListRule::new(
			AllowBlockLists {
				allow_list: allow,
				block_list: block,
			},
			registry(),
		)
	}

	#[tokio::test]
	async fn test_allow_list_restricts_domains() {
		let rule = rule(vec![item("*", &DEST_DOMAIN.to_string(), "*")], vec![]);
		rule.evaluate(&order(10, 20)).await.unwrap();

		let rule = self::rule(vec![item("*", "1", "*")], vec![]);
		assert!(matches!(
			rule.evaluate(&order(10, 20)).await,
			Err(RuleError::Blocked(_))
		));
	}

	#[tokio::test]
	async fn test_block_list_wins() {
		let sender = alloy::primitives::hex::encode(order(10, 20).user);
		let rule = rule(
			vec![item("*", "*", "*")],
			vec![item(&sender, "*", "*")],
		);
		assert!(matches!(
			rule.evaluate(&order(10, 20)).await,
			Err(RuleError::Blocked(_))
		));
	}

	#[tokio::test]
	async fn test_every_output_is_checked() {
		let mut order = order(10, 20);
		let mut second = output(TOKEN, 1, DEST);
		second.recipient = alloy::primitives::B256::repeat_byte(0x99);
		order.max_spent.push(second);

		let rule = rule(vec![], vec![item("*", "*", &"99".repeat(32))]);
		assert!(rule.evaluate(&order).await.is_err());
	}

	#[tokio::test]
	async fn test_unserved_chain_is_blocked() {
		let mut order = order(10, 20);
		order.max_spent[0].chain_id = 5;
		assert!(matches!(
			rule(vec![], vec![]).evaluate(&order).await,
			Err(RuleError::Blocked(_))
		));
	}
}
