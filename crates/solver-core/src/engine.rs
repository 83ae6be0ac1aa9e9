//! The running solver: one listener per network sharing one processor.

use futures::future::join_all;
use solver_config::Config;
use solver_discovery::{ListenerInterface, OrderHandler};
use solver_types::EventBus;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::{LifecycleManager, LifecycleState};
use crate::processor::OrderProcessor;
use crate::SolverError;

pub struct SolverEngine {
	pub(crate) config: Config,
	pub(crate) processor: Arc<OrderProcessor>,
	pub(crate) listeners: Vec<Box<dyn ListenerInterface>>,
	pub(crate) event_bus: EventBus,
	pub(crate) cancel: CancellationToken,
	pub(crate) lifecycle: LifecycleManager,
}

impl SolverEngine {
	/// Starts every listener. A listener that cannot start fails the whole
	/// engine; the caller is expected to [`shutdown`](Self::shutdown).
	pub async fn start(&self) -> Result<(), SolverError> {
		self.lifecycle.transition(LifecycleState::Running).await?;

		let handler: Arc<dyn OrderHandler> = self.processor.clone();
		for listener in &self.listeners {
			if let Err(e) = listener.start(self.cancel.clone(), handler.clone()).await {
				tracing::error!(chain = %listener.chain_name(), error = %e, "Failed to start listener");
				self.lifecycle.transition(LifecycleState::Failed).await?;
				return Err(e.into());
			}
		}

		tracing::info!(
			solver = %self.config.solver.name,
			listeners = self.listeners.len(),
			"Solver started"
		);
		Ok(())
	}

	/// Cancels all listeners and waits for their in-flight ranges to finish.
	pub async fn shutdown(&self) -> Result<(), SolverError> {
		self.lifecycle.transition(LifecycleState::Stopping).await?;
		self.cancel.cancel();

		let results = join_all(self.listeners.iter().map(|listener| listener.stop())).await;

		let mut first_error = None;
		for (listener, result) in self.listeners.iter().zip(results) {
			if let Err(e) = result {
				tracing::error!(chain = %listener.chain_name(), error = %e, "Listener did not stop cleanly");
				first_error.get_or_insert(e);
			}
		}

		self.lifecycle.transition(LifecycleState::Stopped).await?;
		tracing::info!("Solver stopped");

		match first_error {
			Some(e) => Err(e.into()),
			None => Ok(()),
		}
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn processor(&self) -> &Arc<OrderProcessor> {
		&self.processor
	}

	pub async fn state(&self) -> LifecycleState {
		self.lifecycle.state().await
	}

	/// Last processed block per listening chain.
	pub fn progress(&self) -> Vec<(String, u64)> {
		self.listeners
			.iter()
			.map(|listener| {
				(
					listener.chain_name().to_string(),
					listener.last_processed_block(),
				)
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{
		checkpoints, config, listener_config, order, storage, MockChain, MockSource, DEST, ORIGIN,
	};
	use crate::SolverBuilder;
	use solver_account::AccountService;
	use solver_discovery::ChainListener;
	use solver_storage::{CheckpointStore, StorageService};
	use solver_types::{AllowBlockListItem, DeliveryEvent, OrderEvent, OrderStatus, SolverEvent};
	use std::sync::atomic::Ordering;
	use std::time::Duration;

	fn engine(
		config: Config,
		chain: Arc<MockChain>,
		source: MockSource,
		storage: StorageService,
		checkpoints: Arc<dyn CheckpointStore>,
	) -> SolverEngine {
		let listener = ChainListener::new(listener_config(), source, checkpoints);
		SolverBuilder::new(config)
			.with_storage(storage)
			.with_accounts(AccountService::default())
			.with_client(DEST, chain)
			.with_client(ORIGIN, Arc::new(MockChain::new(0)))
			.with_listener(Box::new(listener))
			.build()
			.unwrap()
	}

	async fn run(engine: &SolverEngine) {
		engine.start().await.unwrap();
		tokio::time::sleep(Duration::from_secs(1)).await;
		engine.shutdown().await.unwrap();
	}

	fn drain(receiver: &mut tokio::sync::broadcast::Receiver<SolverEvent>) -> Vec<SolverEvent> {
		let mut events = Vec::new();
		while let Ok(event) = receiver.try_recv() {
			events.push(event);
		}
		events
	}

	#[tokio::test(start_paused = true)]
	async fn test_checkpoint_advances_only_after_settle() {
		let storage = storage();
		let checkpoints = checkpoints(&storage);
		let chain = Arc::new(MockChain::new(1_000).watching(checkpoints.clone()));
		let source = MockSource::new(100, vec![(50, order(1, 10, 20))]);
		let engine = engine(config(), chain.clone(), source, storage, checkpoints.clone());
		let mut receiver = engine.event_bus().subscribe();

		run(&engine).await;

		assert_eq!(chain.fills.load(Ordering::SeqCst), 1);
		assert_eq!(chain.settles.load(Ordering::SeqCst), 1);
		// Nothing was committed while the settle transaction ran.
		assert_eq!(*chain.checkpoint_at_settle.lock().unwrap(), vec![None]);
		assert_eq!(checkpoints.get("sepolia").await.unwrap(), Some(100));
		assert_eq!(engine.progress(), vec![("sepolia".to_string(), 100)]);
		assert_eq!(engine.state().await, LifecycleState::Stopped);

		let events = drain(&mut receiver);
		assert!(matches!(
			events.first(),
			Some(SolverEvent::Order(OrderEvent::Discovered { .. }))
		));
		assert!(events
			.iter()
			.any(|e| matches!(e, SolverEvent::Delivery(DeliveryEvent::Filled { chain_id, .. }) if *chain_id == DEST)));
		assert!(events
			.iter()
			.any(|e| matches!(e, SolverEvent::Delivery(DeliveryEvent::Settled { .. }))));
	}

	#[tokio::test(start_paused = true)]
	async fn test_insufficient_balance_holds_checkpoint_below_order() {
		let storage = storage();
		let checkpoints = checkpoints(&storage);
		let chain = Arc::new(MockChain::new(5));
		let source = MockSource::new(100, vec![(50, order(1, 10, 20))]);
		let engine = engine(config(), chain.clone(), source, storage, checkpoints.clone());

		run(&engine).await;

		assert_eq!(chain.fills.load(Ordering::SeqCst), 0);
		// Committed up to, never past, the block of the rejected order.
		assert_eq!(checkpoints.get("sepolia").await.unwrap(), Some(49));
		assert_eq!(engine.progress(), vec![("sepolia".to_string(), 49)]);
	}

	#[tokio::test(start_paused = true)]
	async fn test_settle_failure_is_retried_without_second_fill() {
		let storage = storage();
		let checkpoints = checkpoints(&storage);
		let chain = Arc::new(MockChain::new(1_000).failing_settles(1));
		let source = MockSource::new(100, vec![(50, order(1, 10, 20))]);
		let engine = engine(config(), chain.clone(), source, storage, checkpoints.clone());

		run(&engine).await;

		assert_eq!(chain.fills.load(Ordering::SeqCst), 1);
		assert_eq!(chain.settles.load(Ordering::SeqCst), 1);
		assert_eq!(checkpoints.get("sepolia").await.unwrap(), Some(100));
	}

	#[tokio::test(start_paused = true)]
	async fn test_filled_and_blocked_orders_are_committed() {
		let storage = storage();
		let checkpoints = checkpoints(&storage);
		let chain = Arc::new(MockChain::new(1_000));
		chain.set_status(order(1, 10, 20).order_id, OrderStatus::Filled);

		let mut config = config();
		config.rules.block_list.push(AllowBlockListItem {
			recipient_address: format!("0x{}", "02".repeat(32)),
			..AllowBlockListItem::default()
		});
		let source = MockSource::new(
			100,
			vec![(10, order(1, 10, 20)), (60, order(2, 10, 20))],
		);
		let engine = engine(config, chain.clone(), source, storage, checkpoints.clone());

		run(&engine).await;

		assert_eq!(chain.fills.load(Ordering::SeqCst), 0);
		assert_eq!(checkpoints.get("sepolia").await.unwrap(), Some(100));
	}

	#[tokio::test(start_paused = true)]
	async fn test_engine_cannot_start_twice() {
		let storage = storage();
		let checkpoints = checkpoints(&storage);
		let chain = Arc::new(MockChain::new(1_000));
		let engine = engine(config(), chain, MockSource::new(0, vec![]), storage, checkpoints);

		engine.start().await.unwrap();
		assert!(matches!(
			engine.start().await,
			Err(SolverError::Lifecycle(_))
		));
		engine.shutdown().await.unwrap();
	}

	#[test]
	fn test_build_requires_accounts_and_listeners() {
		let result = SolverBuilder::new(config())
			.with_storage(storage())
			.with_accounts(AccountService::default())
			.build();
		assert!(matches!(result, Err(SolverError::Config(_))));

		let mut config = config();
		for network in &mut config.networks {
			network.listener.enabled = false;
		}
		let result = SolverBuilder::new(config)
			.with_storage(storage())
			.with_accounts(AccountService::default())
			.with_client(DEST, Arc::new(MockChain::new(0)))
			.with_client(ORIGIN, Arc::new(MockChain::new(0)))
			.build();
		assert!(matches!(result, Err(SolverError::Config(msg)) if msg.contains("listener")));
	}
}
