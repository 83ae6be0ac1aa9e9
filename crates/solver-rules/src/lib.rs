//! Pre-execution rules.
//!
//! A [`RuleEngine`] runs an ordered list of [`Rule`]s against every decoded
//! order before any funds move. Evaluation stops at the first failure. Rules
//! only read chain state; they never submit transactions.

use alloy::primitives::{B256, U256};
use async_trait::async_trait;
use solver_delivery::{DeliveryError, DeliveryService};
use solver_types::{AllowBlockLists, ResolvedOrder};
use std::sync::Arc;
use thiserror::Error;

pub mod implementations {
	pub mod allow_list;
	pub mod balance;
	pub mod not_filled;
	pub mod profitability;
}

pub use implementations::allow_list::AllowBlockListRule;
pub use implementations::balance::BalanceRule;
pub use implementations::not_filled::NotFilledRule;
pub use implementations::profitability::ProfitabilityRule;

#[cfg(test)]
pub(crate) mod testing;

#[derive(Debug, Error)]
pub enum RuleError {
	/// The destination settler already knows the order.
	#[error("Order already filled")]
	AlreadyFilled,
	#[error("Order blocked: {0}")]
	Blocked(String),
	#[error("Insufficient balance on chain {chain_id} for token {token}: need {required}, have {available}")]
	InsufficientBalance {
		chain_id: u64,
		token: B256,
		required: U256,
		available: U256,
	},
	#[error("Order not profitable: receives {received}, spends {spent}")]
	Unprofitable { received: U256, spent: U256 },
	#[error("Invalid order: {0}")]
	InvalidOrder(String),
	#[error("Chain query failed: {0}")]
	Rpc(#[from] DeliveryError),
}

impl RuleError {
	/// Terminal rejections settle the order's fate: the order never needs
	/// processing again, so its block may be committed.
	pub fn is_terminal(&self) -> bool {
		matches!(self, RuleError::AlreadyFilled | RuleError::Blocked(_))
	}
}

#[async_trait]
pub trait Rule: Send + Sync {
	fn name(&self) -> &'static str;

	async fn evaluate(&self, order: &ResolvedOrder) -> Result<(), RuleError>;
}

pub struct RuleEngine {
	rules: Vec<Box<dyn Rule>>,
}

impl RuleEngine {
	pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
		Self { rules }
	}

	/// The standard chain: allow/block lists when configured, then balance,
	/// profitability and the already-filled check.
	pub fn standard(delivery: Arc<DeliveryService>, lists: Option<AllowBlockLists>) -> Self {
		let mut rules: Vec<Box<dyn Rule>> = Vec::new();
		if let Some(lists) = lists.filter(|lists| !lists.is_empty()) {
			rules.push(Box::new(AllowBlockListRule::new(
				lists,
				delivery.registry().clone(),
			)));
		}
		rules.push(Box::new(BalanceRule::new(delivery.clone())));
		rules.push(Box::new(ProfitabilityRule));
		rules.push(Box::new(NotFilledRule::new(delivery)));
		Self::new(rules)
	}

	pub fn rule_names(&self) -> Vec<&'static str> {
		self.rules.iter().map(|rule| rule.name()).collect()
	}

	pub async fn evaluate(&self, order: &ResolvedOrder) -> Result<(), RuleError> {
		for rule in &self.rules {
			if let Err(e) = rule.evaluate(order).await {
				tracing::debug!(
					order_id = %order.short_id(),
					rule = rule.name(),
					error = %e,
					"Rule rejected order"
				);
				return Err(e);
			}
		}
		Ok(())
	}
}
