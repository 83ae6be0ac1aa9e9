//! Solver liquidity on destination chains.

use crate::{Rule, RuleError};
use alloy::primitives::{B256, U256};
use async_trait::async_trait;
use solver_delivery::DeliveryService;
use solver_types::ResolvedOrder;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Requires the solver to hold, per `(chain, token)`, at least the sum of
/// the order's `max_spent` amounts. Any failed balance query rejects.
pub struct BalanceRule {
	delivery: Arc<DeliveryService>,
}

impl BalanceRule {
	pub fn new(delivery: Arc<DeliveryService>) -> Self {
		Self { delivery }
	}
}

/// Sums `max_spent` per `(chain, token)`.
pub fn required_amounts(order: &ResolvedOrder) -> Result<BTreeMap<(u64, B256), U256>, RuleError> {
	let mut required: BTreeMap<(u64, B256), U256> = BTreeMap::new();
	for output in &order.max_spent {
		let total = required
			.entry((output.chain_id, output.token))
			.or_insert(U256::ZERO);
		*total = total.checked_add(output.amount).ok_or_else(|| {
			RuleError::InvalidOrder("max_spent amounts overflow".to_string())
		})?;
	}
	Ok(required)
}

#[async_trait]
impl Rule for BalanceRule {
	fn name(&self) -> &'static str {
		"balance"
	}

	async fn evaluate(&self, order: &ResolvedOrder) -> Result<(), RuleError> {
		for ((chain_id, token), required) in required_amounts(order)? {
			let available = self.delivery.token_balance(chain_id, &token).await?;
			if available < required {
				return Err(RuleError::InsufficientBalance {
					chain_id,
					token,
					required,
					available,
				});
			}
		}
		Ok(())
	}
}
