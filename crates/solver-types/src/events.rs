//! Lifecycle events published by the solver core.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::TransactionHash;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SolverEvent {
	Order(OrderEvent),
	Delivery(DeliveryEvent),
	Listener(ListenerEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	Discovered {
		order_id: String,
		origin_chain_id: u64,
	},
	Rejected {
		order_id: String,
		reason: String,
	},
	/// The settler already knows the order; nothing to do.
	Skipped {
		order_id: String,
		reason: String,
	},
	Failed {
		order_id: String,
		error: String,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeliveryEvent {
	Filled {
		order_id: String,
		chain_id: u64,
		tx_hash: TransactionHash,
	},
	Settled {
		order_id: String,
		chain_id: u64,
		tx_hash: TransactionHash,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ListenerEvent {
	RangeCommitted {
		chain_name: String,
		from: u64,
		to: u64,
	},
	BackfillGaveUp {
		chain_name: String,
		from: u64,
		to: u64,
	},
}

pub struct EventBus {
	sender: broadcast::Sender<SolverEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<SolverEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event. Having no subscribers is not an error.
	pub fn publish(&self, event: SolverEvent) {
		let _ = self.sender.send(event);
	}
}

impl Clone for EventBus {
	fn clone(&self) -> Self {
		Self {
			sender: self.sender.clone(),
		}
	}
}
