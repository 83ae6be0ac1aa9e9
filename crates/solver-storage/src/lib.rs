//! Storage module for the solver.
//!
//! Provides a byte-level [`StorageInterface`] with file and in-memory backends,
//! a typed [`StorageService`] on top of it, and the listener checkpoint store.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use solver_types::{ConfigSchema, ValidationError};
use std::sync::Arc;
use thiserror::Error;

pub mod checkpoint;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

pub use checkpoint::{CheckpointStore, StorageCheckpointStore};

#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Not found")]
	NotFound,
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Backend error: {0}")]
	Backend(String),
	#[error("Invalid configuration: {0}")]
	Configuration(String),
}

/// Low-level key-value interface every storage backend implements.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, replacing any previous value atomically.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Schema of the backend-specific `[storage.config]` table.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Typed storage on top of a backend. Values are stored as JSON under
/// `namespace:id` keys. Clones share the backend.
#[derive(Clone)]
pub struct StorageService {
	backend: Arc<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self {
			backend: Arc::from(backend),
		}
	}

	fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.set_bytes(&Self::key(namespace, id), bytes)
			.await
	}

	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Like [`retrieve`](Self::retrieve), but maps a missing key to `None`.
	pub async fn try_retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		match self.retrieve(namespace, id).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&Self::key(namespace, id)).await
	}

	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&Self::key(namespace, id)).await
	}
}

/// Builds a storage backend by name from its `[storage.config]` table.
pub fn create_storage(
	backend: &str,
	config: &toml::Value,
) -> Result<Box<dyn StorageInterface>, StorageError> {
	let storage: Box<dyn StorageInterface> = match backend {
		"file" => implementations::file::create_storage(config),
		"memory" => implementations::memory::create_storage(config),
		other => {
			return Err(StorageError::Configuration(format!(
				"unknown storage backend '{}'",
				other
			)))
		}
	};

	storage
		.config_schema()
		.validate(config)
		.map_err(|e: ValidationError| StorageError::Configuration(e.to_string()))?;

	Ok(storage)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde::Deserialize;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Record {
		value: u64,
	}

	#[tokio::test]
	async fn test_typed_round_trip_and_missing() {
		let service = StorageService::new(Box::new(
			implementations::memory::MemoryStorage::new(),
		));

		service.store("records", "a", &Record { value: 7 }).await.unwrap();
		let record: Record = service.retrieve("records", "a").await.unwrap();
		assert_eq!(record, Record { value: 7 });

		let missing: Option<Record> = service.try_retrieve("records", "b").await.unwrap();
		assert!(missing.is_none());

		service.remove("records", "a").await.unwrap();
		assert!(!service.exists("records", "a").await.unwrap());
	}

	#[test]
	fn test_unknown_backend_rejected() {
		let config = toml::Value::Table(Default::default());
		assert!(matches!(
			create_storage("redis", &config),
			Err(StorageError::Configuration(_))
		));
	}

	#[test]
	fn test_file_backend_config_checked() {
		let config: toml::Value = toml::from_str("storage_path = 42").unwrap();
		assert!(create_storage("file", &config).is_err());
	}
}
