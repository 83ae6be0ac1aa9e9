//! Durable per-chain listener checkpoints.

use async_trait::async_trait;
use solver_types::ListenerCheckpoint;
use tokio::sync::Mutex;

use crate::{StorageError, StorageService};

const NAMESPACE: &str = "checkpoints";

/// Last fully processed block per chain name.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
	async fn get(&self, chain_name: &str) -> Result<Option<u64>, StorageError>;

	/// Records progress. A block lower than the stored one is ignored.
	async fn set(&self, chain_name: &str, block: u64) -> Result<(), StorageError>;
}

/// Checkpoint store backed by a [`StorageService`], one key per chain.
pub struct StorageCheckpointStore {
	storage: StorageService,
	// Serializes read-compare-write so the stored value never goes backwards.
	write_lock: Mutex<()>,
}

impl StorageCheckpointStore {
	pub fn new(storage: StorageService) -> Self {
		Self {
			storage,
			write_lock: Mutex::new(()),
		}
	}

	async fn load(&self, chain_name: &str) -> Result<Option<ListenerCheckpoint>, StorageError> {
		self.storage.try_retrieve(NAMESPACE, chain_name).await
	}
}

#[async_trait]
impl CheckpointStore for StorageCheckpointStore {
	async fn get(&self, chain_name: &str) -> Result<Option<u64>, StorageError> {
		Ok(self
			.load(chain_name)
			.await?
			.map(|checkpoint| checkpoint.last_indexed_block))
	}

	async fn set(&self, chain_name: &str, block: u64) -> Result<(), StorageError> {
		let _guard = self.write_lock.lock().await;

		if let Some(existing) = self.load(chain_name).await? {
			if existing.last_indexed_block > block {
				tracing::warn!(
					chain = %chain_name,
					stored = existing.last_indexed_block,
					requested = block,
					"Ignoring checkpoint regression"
				);
				return Ok(());
			}
		}

		let checkpoint = ListenerCheckpoint {
			chain_name: chain_name.to_string(),
			last_indexed_block: block,
		};
		self.storage.store(NAMESPACE, chain_name, &checkpoint).await?;
		tracing::debug!(chain = %chain_name, block, "Checkpoint saved");
		Ok(())
	}
}
