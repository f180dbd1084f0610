//! In-memory storage backend.
//!
//! Data lives only as long as the process. Useful for tests and for sessions
//! that should not outlive the command that created them.

use crate::{notify, StorageChange, StorageError, StorageInterface, CHANGE_CHANNEL_CAPACITY};
use async_trait::async_trait;
use eto_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// In-memory storage implementation.
pub struct MemoryStorage {
	store: RwLock<HashMap<String, String>>,
	changes: broadcast::Sender<StorageChange>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
		Self {
			store: RwLock::new(HashMap::new()),
			changes,
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
		Ok(self.store.read().await.get(key).cloned())
	}

	async fn set(
		&self,
		key: &str,
		value: &str,
		origin: &str,
	) -> Result<Option<String>, StorageError> {
		let old = self
			.store
			.write()
			.await
			.insert(key.to_string(), value.to_string());
		notify(
			&self.changes,
			key,
			old.clone(),
			Some(value.to_string()),
			origin,
		);
		Ok(old)
	}

	async fn remove(&self, key: &str, origin: &str) -> Result<Option<String>, StorageError> {
		let old = self.store.write().await.remove(key);
		notify(&self.changes, key, old.clone(), None, origin);
		Ok(old)
	}

	fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
		self.changes.subscribe()
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
///
/// Configuration parameters:
/// - None required for memory storage
pub fn create_storage(_config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	Ok(Box::new(MemoryStorage::new()))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}
