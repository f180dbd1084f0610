//! Configuration module for the ETO platform transaction core.
//!
//! This module provides structures and utilities for managing configuration.
//! It supports loading configuration from TOML files and validates that all
//! required values are properly set before any service is built.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod builders;
mod loader;

pub use builders::config::ConfigBuilder;

use eto_types::Address;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep only the message, not the input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Platform identity and target chain.
	pub platform: PlatformConfig,
	/// Ethereum node access.
	pub node: NodeConfig,
	/// Signature authentication server and session timing.
	pub auth: AuthConfig,
	/// Session storage backend.
	pub storage: StorageConfig,
	/// Wallet used to sign challenges and transactions.
	pub wallet: WalletConfig,
	/// Platform contract addresses.
	pub contracts: ContractsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlatformConfig {
	/// Name of this deployment, used in logs.
	pub id: String,
	/// Chain id transactions are signed for.
	pub chain_id: u64,
}

/// Configuration of the Ethereum node adapter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
	/// JSON-RPC endpoint.
	pub rpc_url: String,
	/// Total attempts of a retried call, the first one included.
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	/// Delay between two attempts of a retried call.
	#[serde(default = "default_retry_wait_ms")]
	pub retry_wait_ms: u64,
	/// Whether read-only calls are coalesced into batch requests.
	#[serde(default = "default_true")]
	pub batching: bool,
	/// Methods routed through the batch queue. Defaults to the read-only set.
	#[serde(default)]
	pub batched_methods: Option<Vec<String>>,
	/// Interval between two `eth_blockNumber` polls.
	#[serde(default = "default_block_poll_interval_ms")]
	pub block_poll_interval_ms: u64,
	/// Give up waiting for inclusion after this many seconds.
	#[serde(default)]
	pub inclusion_timeout_seconds: Option<u64>,
	/// HTTP timeout of a single request.
	#[serde(default = "default_request_timeout_seconds")]
	pub request_timeout_seconds: u64,
}

fn default_max_attempts() -> u32 {
	5
}

fn default_retry_wait_ms() -> u64 {
	1000
}

fn default_true() -> bool {
	true
}

fn default_block_poll_interval_ms() -> u64 {
	3000
}

fn default_request_timeout_seconds() -> u64 {
	30
}

/// Configuration of the challenge/response authentication cycle.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
	/// Base URL of the signature authentication API.
	pub base_url: String,
	/// Fraction of the remaining token lifetime after which it is refreshed.
	#[serde(default = "default_refresh_ratio")]
	pub refresh_ratio: f64,
	/// Lateness above which a timer is considered to have drifted.
	#[serde(default = "default_drift_threshold_ms")]
	pub drift_threshold_ms: u64,
	/// Polling interval of drift-tolerant timers.
	#[serde(default = "default_timer_poll_ms")]
	pub timer_poll_ms: u64,
	/// Pause between two handled cross-session storage events.
	#[serde(default = "default_redirect_delay_ms")]
	pub redirect_delay_ms: u64,
	/// Permissions requested with a plain login.
	#[serde(default)]
	pub default_permissions: Vec<String>,
}

fn default_refresh_ratio() -> f64 {
	0.9
}

fn default_drift_threshold_ms() -> u64 {
	100
}

fn default_timer_poll_ms() -> u64 {
	10
}

fn default_redirect_delay_ms() -> u64 {
	1000
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for wallet management.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WalletConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of wallet implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Addresses of the platform contracts the flows call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractsConfig {
	/// Ether token (wrapped ether used for investments).
	pub ether_token: Address,
	/// Euro token (nEUR).
	pub euro_token: Address,
	/// Ether lock of legacy commitments.
	pub ether_lock: Address,
	/// Euro lock of legacy commitments.
	pub euro_lock: Address,
	/// Fee disbursal contract paying out investor proceeds.
	pub fee_disbursal: Address,
	/// Platform terms contract referenced when setting offering dates.
	pub platform_terms: Address,
	/// Universe contract registering offerings.
	pub universe: Address,
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match (std::env::var(var_name.as_str()), cap.get(2)) {
			(Ok(v), _) => v,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					var_name.as_str()
				)))
			},
		};

		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.platform.id.is_empty() {
			return Err(ConfigError::Validation("Platform ID cannot be empty".into()));
		}
		if self.platform.chain_id == 0 {
			return Err(ConfigError::Validation(
				"Platform chain_id must be greater than 0".into(),
			));
		}

		// Node
		if !self.node.rpc_url.starts_with("http://") && !self.node.rpc_url.starts_with("https://")
		{
			return Err(ConfigError::Validation(format!(
				"Node rpc_url must be an http(s) URL, got '{}'",
				self.node.rpc_url
			)));
		}
		if self.node.max_attempts == 0 || self.node.max_attempts > 20 {
			return Err(ConfigError::Validation(
				"Node max_attempts must be between 1 and 20".into(),
			));
		}
		if self.node.block_poll_interval_ms == 0 {
			return Err(ConfigError::Validation(
				"Node block_poll_interval_ms must be greater than 0".into(),
			));
		}
		if self.node.inclusion_timeout_seconds == Some(0) {
			return Err(ConfigError::Validation(
				"Node inclusion_timeout_seconds must be greater than 0 when set".into(),
			));
		}
		if let Some(methods) = &self.node.batched_methods {
			if methods.iter().any(|m| m.trim().is_empty()) {
				return Err(ConfigError::Validation(
					"Node batched_methods cannot contain empty names".into(),
				));
			}
		}

		// Auth
		if self.auth.base_url.is_empty() {
			return Err(ConfigError::Validation("Auth base_url cannot be empty".into()));
		}
		if !(self.auth.refresh_ratio > 0.0 && self.auth.refresh_ratio < 1.0) {
			return Err(ConfigError::Validation(
				"Auth refresh_ratio must be strictly between 0 and 1".into(),
			));
		}
		if self.auth.timer_poll_ms == 0 {
			return Err(ConfigError::Validation(
				"Auth timer_poll_ms must be greater than 0".into(),
			));
		}

		// Storage
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		// Wallet
		if !self
			.wallet
			.implementations
			.contains_key(&self.wallet.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary wallet '{}' not found in implementations",
				self.wallet.primary
			)));
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating
/// the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	pub(crate) const VALID_CONFIG: &str = r#"
[platform]
id = "eto-test"
chain_id = 17

[node]
rpc_url = "http://localhost:8545"

[auth]
base_url = "http://localhost:5000"

[storage]
primary = "memory"
[storage.implementations.memory]

[wallet]
primary = "local"
[wallet.implementations.local]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"

[contracts]
ether_token = "0x0000000000000000000000000000000000000001"
euro_token = "0x0000000000000000000000000000000000000002"
ether_lock = "0x0000000000000000000000000000000000000003"
euro_lock = "0x0000000000000000000000000000000000000004"
fee_disbursal = "0x0000000000000000000000000000000000000005"
platform_terms = "0x0000000000000000000000000000000000000006"
universe = "0x0000000000000000000000000000000000000007"
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("ETO_TEST_HOST", "localhost");
		std::env::set_var("ETO_TEST_PORT", "8545");

		let input = "rpc_url = \"http://${ETO_TEST_HOST}:${ETO_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "rpc_url = \"http://localhost:8545\"");

		std::env::remove_var("ETO_TEST_HOST");
		std::env::remove_var("ETO_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${ETO_TEST_NONEXISTENT:-fallback}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"fallback\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${ETO_TEST_MISSING_VAR}\"";
		let err = resolve_env_vars(input).unwrap_err();
		assert!(err.to_string().contains("ETO_TEST_MISSING_VAR"));
	}

	#[test]
	fn test_defaults_applied() {
		let config: Config = VALID_CONFIG.parse().unwrap();
		assert_eq!(config.node.max_attempts, 5);
		assert_eq!(config.node.retry_wait_ms, 1000);
		assert_eq!(config.node.block_poll_interval_ms, 3000);
		assert!(config.node.batching);
		assert_eq!(config.node.inclusion_timeout_seconds, None);
		assert_eq!(config.auth.refresh_ratio, 0.9);
		assert_eq!(config.auth.drift_threshold_ms, 100);
		assert_eq!(config.auth.timer_poll_ms, 10);
		assert_eq!(config.auth.redirect_delay_ms, 1000);
	}

	#[test]
	fn test_invalid_refresh_ratio_rejected() {
		let input = VALID_CONFIG.replace(
			"base_url = \"http://localhost:5000\"",
			"base_url = \"http://localhost:5000\"\nrefresh_ratio = 1.5",
		);
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("refresh_ratio"));
	}

	#[test]
	fn test_unknown_primary_storage_rejected() {
		let input = VALID_CONFIG.replace("primary = \"memory\"", "primary = \"file\"");
		let err = input.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Primary storage 'file'"));
	}

	#[test]
	fn test_non_http_rpc_url_rejected() {
		let input = VALID_CONFIG.replace("http://localhost:8545", "ws://localhost:8545");
		assert!(matches!(
			input.parse::<Config>(),
			Err(ConfigError::Validation(_))
		));
	}
}
