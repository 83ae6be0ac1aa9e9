//! Bounded exponential backoff for RPC calls.

use backoff::{backoff::Backoff, ExponentialBackoff};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How often and how patiently an operation is retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
	/// Total attempts, including the first one.
	pub max_attempts: u32,
	pub initial_interval: Duration,
	pub multiplier: f64,
}

impl RetryPolicy {
	pub fn new(max_attempts: u32, initial_interval: Duration) -> Self {
		Self {
			max_attempts: max_attempts.max(1),
			initial_interval,
			multiplier: 2.0,
		}
	}

	/// Deterministic backoff: no jitter, no elapsed-time cap.
	pub fn backoff(&self) -> ExponentialBackoff {
		let mut backoff = ExponentialBackoff {
			initial_interval: self.initial_interval,
			current_interval: self.initial_interval,
			multiplier: self.multiplier,
			randomization_factor: 0.0,
			max_interval: Duration::from_secs(300),
			max_elapsed_time: None,
			..Default::default()
		};
		backoff.reset();
		backoff
	}
}

/// Runs `op` until it succeeds or `policy.max_attempts` is reached, sleeping
/// between attempts. The last error is returned on give-up.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
	E: Display,
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
{
	let mut backoff = policy.backoff();
	let mut attempts = 0;

	loop {
		match op().await {
			Ok(value) => return Ok(value),
			Err(e) => {
				attempts += 1;
				if attempts >= policy.max_attempts {
					tracing::warn!(
						"{} failed after {} attempts, giving up: {}",
						label,
						attempts,
						e
					);
					return Err(e);
				}

				match backoff.next_backoff() {
					Some(delay) => {
						tracing::debug!(
							"{} failed, attempt {}/{}, retrying in {:?}: {}",
							label,
							attempts,
							policy.max_attempts,
							delay,
							e
						);
						tokio::time::sleep(delay).await;
					}
					None => return Err(e),
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	#[test]
	fn test_backoff_doubles_without_jitter() {
		let mut backoff = RetryPolicy::new(5, Duration::from_millis(100)).backoff();
		assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
		assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(200)));
		assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(400)));
	}

	#[tokio::test(start_paused = true)]
	async fn test_retry_gives_up_after_max_attempts() {
		let calls = AtomicU32::new(0);
		let policy = RetryPolicy::new(3, Duration::from_millis(10));

		let result: Result<(), String> = retry(&policy, "op", || async {
			calls.fetch_add(1, Ordering::SeqCst);
			Err("boom".to_string())
		})
		.await;

		assert_eq!(result, Err("boom".to_string()));
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn test_retry_returns_first_success() {
		let calls = AtomicU32::new(0);
		let policy = RetryPolicy::new(5, Duration::from_millis(10));

		let result: Result<u32, String> = retry(&policy, "op", || async {
			let n = calls.fetch_add(1, Ordering::SeqCst);
			if n < 2 {
				Err("not yet".to_string())
			} else {
				Ok(n)
			}
		})
		.await;

		assert_eq!(result, Ok(2));
	}
}
