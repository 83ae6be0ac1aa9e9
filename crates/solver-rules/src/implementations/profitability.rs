//! Minimal profitability check.

use crate::{Rule, RuleError};
use async_trait::async_trait;
use solver_types::ResolvedOrder;

/// Accepts an order when its first received amount exceeds its first spent
/// amount. Only the first leg is compared.
pub struct ProfitabilityRule;

#[async_trait]
impl Rule for ProfitabilityRule {
	fn name(&self) -> &'static str {
		"profitability"
	}

	async fn evaluate(&self, order: &ResolvedOrder) -> Result<(), RuleError> {
		let (Some(received), Some(spent)) = (order.min_received.first(), order.max_spent.first())
		else {
			return Err(RuleError::InvalidOrder(
				"order has no inputs or outputs".to_string(),
			));
		};

		if received.amount > spent.amount {
			Ok(())
		} else {
			Err(RuleError::Unprofitable {
				received: received.amount,
				spent: spent.amount,
			})
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::order;
	use alloy::primitives::U256;

	#[tokio::test]
	async fn test_requires_strict_gain() {
		ProfitabilityRule.evaluate(&order(10, 11)).await.unwrap();
		assert!(matches!(
			ProfitabilityRule.evaluate(&order(10, 10)).await,
			Err(RuleError::Unprofitable { .. })
		));
		assert!(ProfitabilityRule.evaluate(&order(11, 10)).await.is_err());
	}

	#[tokio::test]
	async fn test_receiving_less_than_spent_is_rejected() {
		// 100 out on the destination against 90 back on the origin.
		assert!(matches!(
			ProfitabilityRule.evaluate(&order(100, 90)).await,
			Err(RuleError::Unprofitable { received, spent })
				if received == U256::from(90) && spent == U256::from(100)
		));
	}

	#[tokio::test]
	async fn test_empty_legs_are_invalid() {
		let mut order = order(10, 20);
		order.min_received.clear();
		assert!(matches!(
			ProfitabilityRule.evaluate(&order).await,
			Err(RuleError::InvalidOrder(_))
		));
	}
}
