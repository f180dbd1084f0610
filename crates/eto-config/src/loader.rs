//! Loader for configurations split across several files.
//!
//! The main file may name other files with `include`. Every top-level section
//! must come from exactly one file and a file may only be loaded once.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub struct ConfigLoader {
	/// Base path for resolving relative includes
	base_path: PathBuf,
	/// Canonical paths already loaded, used to reject include cycles
	loaded_files: HashSet<PathBuf>,
	/// Which file each top-level section came from
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads a configuration file and all its includes.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let config_path = self.resolve_path(config_path)?;
		let mut combined = self.load_table(&config_path).await?;

		let includes = match combined.remove("include") {
			None => Vec::new(),
			Some(toml::Value::String(path)) => vec![PathBuf::from(path)],
			Some(toml::Value::Array(items)) => items
				.into_iter()
				.map(|item| match item {
					toml::Value::String(path) => Ok(PathBuf::from(path)),
					_ => Err(ConfigError::Validation(
						"Include array must contain only strings".into(),
					)),
				})
				.collect::<Result<_, _>>()?,
			Some(_) => {
				return Err(ConfigError::Validation(
					"Include must be a string or array of strings".into(),
				))
			},
		};

		for key in combined.keys() {
			self.section_sources
				.insert(key.clone(), config_path.clone());
		}

		for include in includes {
			let include_path = self.resolve_path(&include)?;
			let table = self.load_table(&include_path).await?;

			for (key, value) in table {
				if let Some(existing) = self.section_sources.get(&key) {
					return Err(ConfigError::Validation(format!(
						"Duplicate section '{}' found in {} and {}. \
						Each top-level section must be unique across all configuration files.",
						key,
						existing.display(),
						include_path.display()
					)));
				}
				self.section_sources
					.insert(key.clone(), include_path.clone());
				combined.insert(key, value);
			}
		}

		let config_str = toml::to_string(&toml::Value::Table(combined)).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		config_str.parse()
	}

	/// Reads a file, resolves environment variables and parses it as a table.
	async fn load_table(&mut self, path: &Path) -> Result<toml::Table, ConfigError> {
		let canonical_path = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical_path.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical_path.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		let resolved = resolve_env_vars(&content)?;
		Ok(toml::from_str(&resolved)?)
	}

	/// Resolves a path relative to the base path.
	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tests::VALID_CONFIG;
	use std::fs;
	use tempfile::TempDir;

	/// Splits the reference config into a main file and a contracts file.
	fn split_config(dir: &Path) -> PathBuf {
		let (main, contracts) = VALID_CONFIG
			.split_once("[contracts]")
			.expect("contracts section");
		fs::write(
			dir.join("contracts.toml"),
			format!("[contracts]{}", contracts),
		)
		.unwrap();
		let main_path = dir.join("config.toml");
		fs::write(
			&main_path,
			format!("include = [\"contracts.toml\"]\n{}", main),
		)
		.unwrap();
		main_path
	}

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");
		fs::write(&config_path, VALID_CONFIG).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config(&config_path).await.unwrap();
		assert_eq!(config.platform.id, "eto-test");
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();
		let main_path = split_config(temp_dir.path());

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config(&main_path).await.unwrap();
		assert_eq!(config.platform.chain_id, 17);
		assert_eq!(
			config.contracts.universe,
			"0x0000000000000000000000000000000000000007"
				.parse::<eto_types::Address>()
				.unwrap()
		);
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let temp_dir = TempDir::new().unwrap();
		let main_path = split_config(temp_dir.path());
		fs::write(
			temp_dir.path().join("contracts.toml"),
			"[platform]\nid = \"other\"\nchain_id = 1\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config(&main_path).await.unwrap_err();
		assert!(err.to_string().contains("Duplicate section 'platform'"));
	}

	#[tokio::test]
	async fn test_self_include_detection() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");
		fs::write(
			&config_path,
			format!("include = [\"config.toml\"]\n{}", VALID_CONFIG),
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config(&config_path).await.unwrap_err();
		assert!(err.to_string().contains("Circular include"));
	}
}
