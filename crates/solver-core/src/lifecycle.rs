//! Engine lifecycle state machine.

use std::fmt;
use tokio::sync::RwLock;

use crate::SolverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
	Idle,
	Running,
	Stopping,
	Stopped,
	Failed,
}

impl fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Idle => write!(f, "Idle"),
			Self::Running => write!(f, "Running"),
			Self::Stopping => write!(f, "Stopping"),
			Self::Stopped => write!(f, "Stopped"),
			Self::Failed => write!(f, "Failed"),
		}
	}
}

pub struct LifecycleManager {
	state: RwLock<LifecycleState>,
}

impl LifecycleManager {
	pub fn new() -> Self {
		Self {
			state: RwLock::new(LifecycleState::Idle),
		}
	}

	pub async fn state(&self) -> LifecycleState {
		*self.state.read().await
	}

	pub async fn transition(&self, new_state: LifecycleState) -> Result<(), SolverError> {
		let mut state = self.state.write().await;
		let old_state = *state;

		if !Self::is_valid_transition(old_state, new_state) {
			return Err(SolverError::Lifecycle(format!(
				"Invalid state transition from {} to {}",
				old_state, new_state
			)));
		}

		*state = new_state;
		tracing::debug!("Lifecycle state changed: {} -> {}", old_state, new_state);
		Ok(())
	}

	fn is_valid_transition(from: LifecycleState, to: LifecycleState) -> bool {
		use LifecycleState::*;

		matches!(
			(from, to),
			(Idle, Running) | (Running, Stopping) | (Failed, Stopping) | (Stopping, Stopped) | (_, Failed)
		)
	}
}

impl Default for LifecycleManager {
	fn default() -> Self {
		Self::new()
	}
}
