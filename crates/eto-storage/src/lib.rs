//! Storage module for the ETO platform session layer.
//!
//! This module provides a string-valued key/value store with change
//! notifications, modelled on browser local storage. Several
//! [`StorageService`] sessions can share one backend; each write is tagged
//! with the session that made it so other sessions can react to it the way
//! browser tabs react to `storage` events.

use async_trait::async_trait;
use eto_types::{ConfigSchema, ImplementationRegistry, StorageKey};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Capacity of the change notification channel of each backend.
pub const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// A change made to one key, as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
	pub key: String,
	pub old_value: Option<String>,
	pub new_value: Option<String>,
	/// Session that made the change.
	pub origin: String,
}

impl StorageChange {
	/// True when the key held a value before and holds none now.
	pub fn is_removal(&self) -> bool {
		self.old_value.is_some() && self.new_value.is_none()
	}

	/// True when the key held no value before and holds one now.
	pub fn is_creation(&self) -> bool {
		self.old_value.is_none() && self.new_value.is_some()
	}
}

/// Trait defining the low-level interface for storage backends.
///
/// Every mutating call broadcasts a [`StorageChange`] to all subscribers of
/// the backend, the writer included.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves the value stored under `key`, if any.
	async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

	/// Stores `value` under `key` and returns the previous value.
	async fn set(&self, key: &str, value: &str, origin: &str)
		-> Result<Option<String>, StorageError>;

	/// Removes `key` and returns the previous value.
	async fn remove(&self, key: &str, origin: &str) -> Result<Option<String>, StorageError>;

	/// Subscribes to changes made through this backend.
	fn subscribe(&self) -> broadcast::Receiver<StorageChange>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Sends a change notification, ignoring the case of no live subscribers.
pub(crate) fn notify(
	sender: &broadcast::Sender<StorageChange>,
	key: &str,
	old_value: Option<String>,
	new_value: Option<String>,
	origin: &str,
) {
	if old_value == new_value {
		return;
	}
	let _ = sender.send(StorageChange {
		key: key.to_string(),
		old_value,
		new_value,
		origin: origin.to_string(),
	});
}

/// One session's view of a shared storage backend.
///
/// The service tags its writes with its own session id and offers typed
/// JSON helpers keyed by [`StorageKey`].
#[derive(Clone)]
pub struct StorageService {
	backend: Arc<dyn StorageInterface>,
	session_id: String,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend and a fresh
	/// session id.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self::from_shared(Arc::from(backend))
	}

	fn from_shared(backend: Arc<dyn StorageInterface>) -> Self {
		Self {
			backend,
			session_id: uuid::Uuid::new_v4().to_string(),
		}
	}

	/// Opens another session on the same backend.
	pub fn new_session(&self) -> Self {
		Self::from_shared(Arc::clone(&self.backend))
	}

	pub fn session_id(&self) -> &str {
		&self.session_id
	}

	/// Reads the raw string stored under `key`.
	pub async fn get(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
		self.backend.get(key.as_str()).await
	}

	/// Stores a raw string under `key`.
	pub async fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError> {
		self.backend
			.set(key.as_str(), value, &self.session_id)
			.await
			.map(|_| ())
	}

	/// Removes `key`. Removing a missing key is not an error.
	pub async fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
		self.backend
			.remove(key.as_str(), &self.session_id)
			.await
			.map(|_| ())
	}

	/// Stores a serializable value as JSON.
	pub async fn store<T: Serialize>(&self, key: StorageKey, data: &T) -> Result<(), StorageError> {
		let json =
			serde_json::to_string(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.set(key, &json).await
	}

	/// Retrieves and deserializes a JSON value.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		key: StorageKey,
	) -> Result<Option<T>, StorageError> {
		match self.get(key).await? {
			Some(json) => serde_json::from_str(&json)
				.map(Some)
				.map_err(|e| StorageError::Serialization(e.to_string())),
			None => Ok(None),
		}
	}

	/// Subscribes to changes made by other sessions.
	pub fn foreign_changes(&self) -> ForeignChanges {
		ForeignChanges {
			rx: self.backend.subscribe(),
			session_id: self.session_id.clone(),
		}
	}
}

/// Stream of changes made by sessions other than the subscriber.
pub struct ForeignChanges {
	rx: broadcast::Receiver<StorageChange>,
	session_id: String,
}

impl ForeignChanges {
	/// Waits for the next change made by another session.
	///
	/// Returns `None` once the backend is dropped.
	pub async fn recv(&mut self) -> Option<StorageChange> {
		loop {
			match self.rx.recv().await {
				Ok(change) if change.origin == self.session_id => continue,
				Ok(change) => return Some(change),
				Err(broadcast::error::RecvError::Lagged(skipped)) => {
					tracing::warn!(skipped, "Storage change subscriber lagged");
				},
				Err(broadcast::error::RecvError::Closed) => return None,
			}
		}
	}
}
