//! File-based storage backend.
//!
//! Each key is kept in its own file under a base directory so a session
//! survives restarts of the process. Writes go to a temporary file first and
//! are renamed into place.

use crate::{notify, StorageChange, StorageError, StorageInterface, CHANGE_CHANNEL_CAPACITY};
use async_trait::async_trait;
use eto_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::{broadcast, Mutex};

/// File-based storage implementation.
pub struct FileStorage {
	base_path: PathBuf,
	/// Serializes read-modify-write cycles so reported old values are exact.
	write_lock: Mutex<()>,
	changes: broadcast::Sender<StorageChange>,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
		Self {
			base_path,
			write_lock: Mutex::new(()),
			changes,
		}
	}

	/// Converts a storage key to a filesystem-safe file path.
	fn file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', '\\', ':', '.'], "_");
		self.base_path.join(format!("{}.value", safe_key))
	}

	async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
		match fs::read_to_string(self.file_path(key)).await {
			Ok(value) => Ok(Some(value)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
		self.read(key).await
	}

	async fn set(
		&self,
		key: &str,
		value: &str,
		origin: &str,
	) -> Result<Option<String>, StorageError> {
		let _guard = self.write_lock.lock().await;
		let old = self.read(key).await?;

		fs::create_dir_all(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		let path = self.file_path(key);
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		tracing::debug!(key, path = %path.display(), "Stored value");
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
		let _guard = self.write_lock.lock().await;
		let old = self.read(key).await?;

		match fs::remove_file(self.file_path(key)).await {
			Ok(_) => {},
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		}

		notify(&self.changes, key, old.clone(), None, origin);
		Ok(old)
	}

	fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
		self.changes.subscribe()
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("storage_path", FieldType::String).with_validator(|v| {
					match v.as_str() {
						Some(path) if path.trim().is_empty() => {
							Err("storage_path must not be empty".into())
						},
						_ => Ok(()),
					}
				}),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/session")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/session");

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_persists_across_instances() {
		let dir = TempDir::new().unwrap();

		let storage = FileStorage::new(dir.path().to_path_buf());
		storage.set("NF_JWT", "token-1", "a").await.unwrap();

		let reopened = FileStorage::new(dir.path().to_path_buf());
		assert_eq!(reopened.get("NF_JWT").await.unwrap(), Some("token-1".into()));

		assert_eq!(
			reopened.remove("NF_JWT", "a").await.unwrap(),
			Some("token-1".into())
		);
		assert_eq!(storage.get("NF_JWT").await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_reports_previous_value() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().join("nested"));
		let mut rx = storage.subscribe();

		assert_eq!(storage.set("NF_USER", "{}", "a").await.unwrap(), None);
		assert_eq!(
			storage.set("NF_USER", "{\"x\":1}", "b").await.unwrap(),
			Some("{}".into())
		);

		let first = rx.recv().await.unwrap();
		assert!(first.is_creation());
		let second = rx.recv().await.unwrap();
		assert_eq!(second.old_value.as_deref(), Some("{}"));
		assert_eq!(second.origin, "b");
	}

	#[test]
	fn test_factory_rejects_empty_path() {
		let config: toml::Value = toml::from_str("storage_path = \" \"").unwrap();
		assert!(matches!(
			create_storage(&config),
			Err(StorageError::Configuration(_))
		));
	}
}
