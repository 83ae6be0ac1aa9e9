//! Generic backfill-then-poll listener over an [`OrderEventSource`].

use async_trait::async_trait;
use backoff::backoff::Backoff;
use solver_storage::CheckpointStore;
use solver_types::{
	retry, EventBus, ListenerConfig, ListenerEvent, ResolvedOrder, RetryPolicy, SolverEvent,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{HandlerError, ListenerError, ListenerInterface, OrderEventSource, OrderHandler};

/// Block ranges `[from, to]` covering `(last_processed, target]` in order,
/// each at most `max_range` blocks wide.
pub fn chunk_ranges(last_processed: u64, target: u64, max_range: u64) -> Vec<(u64, u64)> {
	let max_range = max_range.max(1);
	let mut ranges = Vec::new();
	let mut from = last_processed.saturating_add(1);
	while from <= target {
		let to = target.min(from.saturating_add(max_range - 1));
		ranges.push((from, to));
		if to == u64::MAX {
			break;
		}
		from = to + 1;
	}
	ranges
}

/// Last processed block to resume from.
///
/// `start_block` is absolute when positive, live when zero and relative to
/// `head` when negative. A stored checkpoint never moves the listener back;
/// for a live start it always wins so a restart does not skip the gap.
pub fn initial_last_block(
	start_block: i64,
	head: u64,
	confirmations: u64,
	checkpoint: Option<u64>,
) -> u64 {
	let from_start = if start_block > 0 {
		Some(start_block as u64 - 1)
	} else if start_block < 0 {
		Some(head.saturating_sub(start_block.unsigned_abs()).saturating_sub(1))
	} else {
		None
	};

	match (from_start, checkpoint) {
		(Some(start), Some(checkpoint)) => start.max(checkpoint),
		(Some(start), None) => start,
		(None, Some(checkpoint)) => checkpoint,
		(None, None) => head.saturating_sub(confirmations),
	}
}

struct RunningTask {
	cancel: CancellationToken,
	handle: JoinHandle<()>,
}

/// Listener for one chain, generic over the chain family's event source.
pub struct ChainListener<S> {
	config: ListenerConfig,
	source: Arc<S>,
	checkpoints: Arc<dyn CheckpointStore>,
	events: Option<EventBus>,
	last_processed: Arc<AtomicU64>,
	running: Mutex<Option<RunningTask>>,
}

impl<S: OrderEventSource + 'static> ChainListener<S> {
	pub fn new(config: ListenerConfig, source: S, checkpoints: Arc<dyn CheckpointStore>) -> Self {
		Self {
			config,
			source: Arc::new(source),
			checkpoints,
			events: None,
			last_processed: Arc::new(AtomicU64::new(0)),
			running: Mutex::new(None),
		}
	}

	pub fn with_event_bus(mut self, events: EventBus) -> Self {
		self.events = Some(events);
		self
	}

	fn retry_policy(&self) -> RetryPolicy {
		RetryPolicy::new(
			self.config.max_retries,
			Duration::from_millis(self.config.poll_interval_ms),
		)
	}
}

#[async_trait]
impl<S: OrderEventSource + 'static> ListenerInterface for ChainListener<S> {
	fn chain_name(&self) -> &str {
		&self.config.chain_name
	}

	async fn start(
		&self,
		cancel: CancellationToken,
		handler: Arc<dyn OrderHandler>,
	) -> Result<(), ListenerError> {
		let mut running = self.running.lock().await;
		if running.is_some() {
			return Err(ListenerError::AlreadyRunning);
		}

		let head = retry(&self.retry_policy(), "Fetching head block", || {
			self.source.latest_block()
		})
		.await?;
		let checkpoint = self.checkpoints.get(&self.config.chain_name).await?;
		let last = initial_last_block(
			self.config.start_block,
			head,
			self.config.confirmation_blocks,
			checkpoint,
		);
		self.last_processed.store(last, Ordering::SeqCst);

		tracing::info!(
			chain = %self.config.chain_name,
			head,
			checkpoint = ?checkpoint,
			resume_from = last + 1,
			"Starting listener"
		);

		let child = cancel.child_token();
		let worker = Worker {
			config: self.config.clone(),
			source: self.source.clone(),
			checkpoints: self.checkpoints.clone(),
			handler,
			events: self.events.clone(),
			last_processed: self.last_processed.clone(),
			cancel: child.clone(),
		};
		let handle = tokio::spawn(worker.run(head));

		*running = Some(RunningTask {
			cancel: child,
			handle,
		});
		Ok(())
	}

	async fn stop(&self) -> Result<(), ListenerError> {
		let Some(task) = self.running.lock().await.take() else {
			return Ok(());
		};

		task.cancel.cancel();
		if let Err(e) = task.handle.await {
			tracing::error!(chain = %self.config.chain_name, error = %e, "Listener task failed");
		}
		Ok(())
	}

	fn last_processed_block(&self) -> u64 {
		self.last_processed.load(Ordering::SeqCst)
	}
}

/// State owned by the spawned listener task.
struct Worker<S> {
	config: ListenerConfig,
	source: Arc<S>,
	checkpoints: Arc<dyn CheckpointStore>,
	handler: Arc<dyn OrderHandler>,
	events: Option<EventBus>,
	last_processed: Arc<AtomicU64>,
	cancel: CancellationToken,
}

impl<S: OrderEventSource + 'static> Worker<S> {
	async fn run(self, head: u64) {
		self.backfill(head).await;
		self.poll().await;
		tracing::info!(chain = %self.config.chain_name, "Listener stopped");
	}

	fn last(&self) -> u64 {
		self.last_processed.load(Ordering::SeqCst)
	}

	fn safe_head(&self, head: u64) -> u64 {
		head.saturating_sub(self.config.confirmation_blocks)
	}

	fn publish(&self, event: ListenerEvent) {
		if let Some(events) = &self.events {
			events.publish(SolverEvent::Listener(event));
		}
	}

	/// Sleeps unless cancelled first. Returns false on cancellation.
	async fn pause(&self, delay: Duration) -> bool {
		tokio::select! {
			_ = self.cancel.cancelled() => false,
			_ = tokio::time::sleep(delay) => true,
		}
	}

	/// Processes `(last, safe head]` chunk by chunk. A chunk that keeps
	/// failing is abandoned after `max_retries` attempts; the poll loop then
	/// resumes from the unchanged checkpoint.
	async fn backfill(&self, head: u64) {
		let target = self.safe_head(head);
		let ranges = chunk_ranges(self.last(), target, self.config.max_block_range_per_request);
		if ranges.is_empty() {
			return;
		}

		tracing::info!(
			chain = %self.config.chain_name,
			from = self.last() + 1,
			to = target,
			chunks = ranges.len(),
			"Backfilling"
		);

		let policy = RetryPolicy::new(
			self.config.max_retries,
			Duration::from_millis(self.config.poll_interval_ms),
		);

		for (from, to) in ranges {
			let mut backoff = policy.backoff();
			let mut attempts = 0;

			loop {
				if self.cancel.is_cancelled() {
					return;
				}
				attempts += 1;

				// A partial commit moves the retry past the resolved blocks.
				let start = from.max(self.last() + 1);
				match self.process_range(start, to).await {
					Ok(true) => break,
					Ok(false) => tracing::debug!(
						chain = %self.config.chain_name,
						from,
						to,
						attempt = attempts,
						"Range has unresolved orders"
					),
					Err(e) => tracing::warn!(
						chain = %self.config.chain_name,
						from,
						to,
						attempt = attempts,
						error = %e,
						"Backfill chunk failed"
					),
				}

				if attempts >= policy.max_attempts {
					tracing::error!(
						chain = %self.config.chain_name,
						from,
						to,
						attempts,
						"Giving up on backfill chunk, checkpoint left at {}",
						self.last()
					);
					self.publish(ListenerEvent::BackfillGaveUp {
						chain_name: self.config.chain_name.clone(),
						from,
						to,
					});
					return;
				}

				let delay = backoff.next_backoff().unwrap_or(policy.initial_interval);
				if !self.pause(delay).await {
					return;
				}
			}
		}
	}

	async fn poll(&self) {
		let interval = Duration::from_millis(self.config.poll_interval_ms);

		loop {
			if self.cancel.is_cancelled() {
				break;
			}

			if let Err(e) = self.poll_once().await {
				tracing::warn!(chain = %self.config.chain_name, error = %e, "Poll failed");
			}

			if !self.pause(interval).await {
				break;
			}
		}
	}

	/// Processes at most one chunk above the last processed block.
	async fn poll_once(&self) -> Result<bool, ListenerError> {
		let safe_head = self.safe_head(self.source.latest_block().await?);
		let last = self.last();
		if last >= safe_head {
			return Ok(false);
		}

		let to = safe_head.min(last.saturating_add(self.config.max_block_range_per_request));
		self.process_range(last + 1, to).await
	}

	/// Dispatches the orders of `[from, to]` block by block. The first block
	/// holding an unresolved order ends the pass: its remaining orders are
	/// still dispatched, later blocks are not, and the checkpoint stops right
	/// below it. Returns whether the whole range was committed.
	async fn process_range(&self, from: u64, to: u64) -> Result<bool, ListenerError> {
		if self.cancel.is_cancelled() {
			return Ok(false);
		}

		let mut events = self.source.fetch_order_events(from, to).await?;
		events.sort_by_key(|event| (event.block_number, event.log_index));

		let mut unresolved_block = None;
		for event in events {
			if self.cancel.is_cancelled() {
				return Ok(false);
			}
			if unresolved_block.is_some_and(|block| event.block_number > block) {
				break;
			}

			match event.order {
				Ok(order) => {
					if !self.dispatch(&order, event.block_number).await {
						unresolved_block.get_or_insert(event.block_number);
					}
				}
				Err(e) => tracing::warn!(
					chain = %self.config.chain_name,
					block = event.block_number,
					error = %e,
					"Skipping malformed Open event"
				),
			}
		}

		let committed = match unresolved_block {
			Some(block) => block.checked_sub(1),
			None => Some(to),
		};
		if let Some(committed) = committed.filter(|committed| *committed >= from) {
			self.commit(from, committed).await?;
		}
		Ok(unresolved_block.is_none())
	}

	async fn commit(&self, from: u64, to: u64) -> Result<(), ListenerError> {
		self.checkpoints.set(&self.config.chain_name, to).await?;
		self.last_processed.fetch_max(to, Ordering::SeqCst);
		tracing::debug!(chain = %self.config.chain_name, from, to, "Range committed");
		self.publish(ListenerEvent::RangeCommitted {
			chain_name: self.config.chain_name.clone(),
			from,
			to,
		});
		Ok(())
	}

	async fn dispatch(&self, order: &ResolvedOrder, block: u64) -> bool {
		match self.handler.handle(order).await {
			Ok(true) => true,
			Ok(false) => {
				tracing::info!(
					chain = %self.config.chain_name,
					order_id = %order.short_id(),
					block,
					"Order not resolved, block will be retried"
				);
				false
			}
			Err(HandlerError::AlreadyFilled) => {
				tracing::info!(
					chain = %self.config.chain_name,
					order_id = %order.short_id(),
					"Order already filled"
				);
				true
			}
			Err(e) => {
				tracing::warn!(
					chain = %self.config.chain_name,
					order_id = %order.short_id(),
					block,
					error = %e,
					"Order handling failed"
				);
				false
			}
		}
	}
}
