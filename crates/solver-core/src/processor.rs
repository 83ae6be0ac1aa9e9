//! The order handler: rules, then fill, then settle.

use alloy::hex;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solver_delivery::{DeliveryError, DeliveryService};
use solver_discovery::{HandlerError, OrderHandler};
use solver_rules::{RuleEngine, RuleError};
use solver_storage::{StorageError, StorageService};
use solver_types::{DeliveryEvent, EventBus, OrderEvent, ResolvedOrder, SolverEvent};
use std::sync::Arc;

const PROGRESS_NAMESPACE: &str = "orders";

/// Execution progress of one order, persisted so a filled order is never
/// filled again and a failed settlement is resumed.
///
/// `filling` is written before the first fill transaction is sent. Finding it
/// without `filled` means the outcome of the fill was lost, so the fill is
/// completed from the settlers' view of the order instead of being
/// re-evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderProgress {
	#[serde(default)]
	pub filling: bool,
	pub filled: bool,
	pub settled: bool,
}

pub struct OrderProcessor {
	rules: RuleEngine,
	delivery: Arc<DeliveryService>,
	storage: StorageService,
	events: EventBus,
}

impl OrderProcessor {
	pub fn new(
		rules: RuleEngine,
		delivery: Arc<DeliveryService>,
		storage: StorageService,
		events: EventBus,
	) -> Self {
		Self {
			rules,
			delivery,
			storage,
			events,
		}
	}

	fn progress_key(order: &ResolvedOrder) -> String {
		hex::encode_prefixed(order.order_id)
	}

	pub async fn progress(&self, order: &ResolvedOrder) -> Result<OrderProgress, StorageError> {
		Ok(self
			.storage
			.try_retrieve(PROGRESS_NAMESPACE, &Self::progress_key(order))
			.await?
			.unwrap_or_default())
	}

	async fn record(
		&self,
		order: &ResolvedOrder,
		progress: &OrderProgress,
	) -> Result<(), HandlerError> {
		self.storage
			.store(PROGRESS_NAMESPACE, &Self::progress_key(order), progress)
			.await
			.map_err(|e| {
				tracing::error!(order_id = %order.short_id(), error = %e, "Failed to record order progress");
				HandlerError::Execution(e.to_string())
			})
	}

	/// Maps a rule rejection to the listener's notion of progress.
	fn rejected(&self, order: &ResolvedOrder, error: RuleError) -> Result<bool, HandlerError> {
		let order_id = order.short_id();
		match error {
			RuleError::AlreadyFilled => {
				tracing::info!(order_id = %order_id, "Order already filled, skipping");
				self.events.publish(SolverEvent::Order(OrderEvent::Skipped {
					order_id,
					reason: RuleError::AlreadyFilled.to_string(),
				}));
				Err(HandlerError::AlreadyFilled)
			}
			e if e.is_terminal() => {
				tracing::info!(order_id = %order_id, reason = %e, "Order declined");
				self.events.publish(SolverEvent::Order(OrderEvent::Rejected {
					order_id,
					reason: e.to_string(),
				}));
				Ok(true)
			}
			e => {
				tracing::warn!(order_id = %order_id, reason = %e, "Order rejected");
				self.events.publish(SolverEvent::Order(OrderEvent::Rejected {
					order_id,
					reason: e.to_string(),
				}));
				Err(HandlerError::Rejected(e.to_string()))
			}
		}
	}

	fn failed(&self, order: &ResolvedOrder, stage: &str, error: DeliveryError) -> HandlerError {
		tracing::error!(order_id = %order.short_id(), stage, error = %error, "Order execution failed");
		self.events.publish(SolverEvent::Order(OrderEvent::Failed {
			order_id: order.short_id(),
			error: format!("{} failed: {}", stage, error),
		}));
		HandlerError::Execution(error.to_string())
	}

	async fn fill(&self, order: &ResolvedOrder, resume: bool) -> Result<(), HandlerError> {
		let result = if resume {
			self.delivery.resume_fill(order).await
		} else {
			self.delivery.fill(order).await
		};
		let receipts = result.map_err(|e| self.failed(order, "fill", e))?;

		for (chain_id, receipt) in receipts {
			self.events.publish(SolverEvent::Delivery(DeliveryEvent::Filled {
				order_id: order.short_id(),
				chain_id,
				tx_hash: receipt.hash,
			}));
		}
		Ok(())
	}

	async fn settle(&self, order: &ResolvedOrder) -> Result<(), HandlerError> {
		let receipts = self
			.delivery
			.settle(order)
			.await
			.map_err(|e| self.failed(order, "settle", e))?;

		for (chain_id, receipt) in DeliveryService::destination_chains(order)
			.into_iter()
			.zip(receipts)
		{
			self.events.publish(SolverEvent::Delivery(DeliveryEvent::Settled {
				order_id: order.short_id(),
				chain_id,
				tx_hash: receipt.hash,
			}));
		}
		Ok(())
	}
}

#[async_trait]
impl OrderHandler for OrderProcessor {
	async fn handle(&self, order: &ResolvedOrder) -> Result<bool, HandlerError> {
		let mut progress = self.progress(order).await.map_err(|e| {
			tracing::error!(order_id = %order.short_id(), error = %e, "Failed to read order progress");
			HandlerError::Execution(e.to_string())
		})?;

		if progress.settled {
			tracing::debug!(order_id = %order.short_id(), "Order already settled by this solver");
			return Err(HandlerError::AlreadyFilled);
		}

		if progress.filled {
			tracing::info!(order_id = %order.short_id(), "Resuming settlement of filled order");
		} else {
			let resume = progress.filling;
			if resume {
				tracing::warn!(order_id = %order.short_id(), "Resuming interrupted fill");
			} else {
				self.events.publish(SolverEvent::Order(OrderEvent::Discovered {
					order_id: order.short_id(),
					origin_chain_id: order.origin_chain_id,
				}));

				if let Err(e) = self.rules.evaluate(order).await {
					return self.rejected(order, e);
				}

				progress.filling = true;
				self.record(order, &progress).await?;
			}

			self.fill(order, resume).await?;
			progress.filled = true;
			self.record(order, &progress).await?;
		}

		self.settle(order).await?;
		progress.settled = true;
		self.record(order, &progress).await?;

		tracing::info!(order_id = %order.short_id(), "Order filled and settled");
		Ok(true)
	}
}
