//! Skips orders the destination settler already knows about.

use crate::{Rule, RuleError};
use async_trait::async_trait;
use solver_delivery::DeliveryService;
use solver_types::{OrderStatus, ResolvedOrder};
use std::sync::Arc;

pub struct NotFilledRule {
	delivery: Arc<DeliveryService>,
}

impl NotFilledRule {
	pub fn new(delivery: Arc<DeliveryService>) -> Self {
		Self { delivery }
	}
}

#[async_trait]
impl Rule for NotFilledRule {
	fn name(&self) -> &'static str {
		"not_filled"
	}

	async fn evaluate(&self, order: &ResolvedOrder) -> Result<(), RuleError> {
		match self.delivery.order_status(order).await? {
			OrderStatus::Unknown => Ok(()),
			status => {
				tracing::debug!(order_id = %order.short_id(), status = %status, "Order already known");
				Err(RuleError::AlreadyFilled)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{delivery, order, MockClient};
	use alloy::primitives::U256;

	async fn evaluate(client: MockClient) -> Result<(), RuleError> {
		NotFilledRule::new(delivery(Arc::new(client)))
			.evaluate(&order(10, 20))
			.await
	}

	#[tokio::test]
	async fn test_unknown_passes() {
		evaluate(MockClient::new(U256::ZERO, OrderStatus::Unknown))
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn test_any_known_status_is_already_filled() {
		for status in [
			OrderStatus::Opened,
			OrderStatus::Filled,
			OrderStatus::Settled,
			OrderStatus::Refunded,
			OrderStatus::Other,
		] {
			assert!(matches!(
				evaluate(MockClient::new(U256::ZERO, status)).await,
				Err(RuleError::AlreadyFilled)
			));
		}
	}

	#[tokio::test]
	async fn test_status_failure_is_not_terminal() {
		let result = evaluate(MockClient::new(U256::ZERO, OrderStatus::Unknown).failing_status()).await;
		assert!(matches!(result, Err(ref e) if !e.is_terminal()));
	}
}
