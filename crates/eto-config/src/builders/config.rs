//! Configuration builder for tests and local development.

use crate::{
	AuthConfig, Config, ContractsConfig, NodeConfig, PlatformConfig, StorageConfig, WalletConfig,
};
use eto_types::Address;
use std::collections::HashMap;

/// Well-known development key (first account of a local dev node).
const DEV_PRIVATE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults describe a local development node, memory storage and a local
/// wallet holding the development key.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	platform_id: String,
	chain_id: u64,
	rpc_url: String,
	auth_url: String,
	max_attempts: u32,
	retry_wait_ms: u64,
	block_poll_interval_ms: u64,
	inclusion_timeout_seconds: Option<u64>,
	private_key: String,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self {
			platform_id: "eto-dev".to_string(),
			chain_id: 17,
			rpc_url: "http://localhost:8545".to_string(),
			auth_url: "http://localhost:5000".to_string(),
			max_attempts: 5,
			retry_wait_ms: 1000,
			block_poll_interval_ms: 3000,
			inclusion_timeout_seconds: None,
			private_key: DEV_PRIVATE_KEY.to_string(),
		}
	}

	pub fn chain_id(mut self, chain_id: u64) -> Self {
		self.chain_id = chain_id;
		self
	}

	pub fn rpc_url(mut self, url: impl Into<String>) -> Self {
		self.rpc_url = url.into();
		self
	}

	pub fn auth_url(mut self, url: impl Into<String>) -> Self {
		self.auth_url = url.into();
		self
	}

	/// Sets the retry policy of node calls.
	pub fn retry(mut self, max_attempts: u32, wait_ms: u64) -> Self {
		self.max_attempts = max_attempts;
		self.retry_wait_ms = wait_ms;
		self
	}

	pub fn block_poll_interval_ms(mut self, interval: u64) -> Self {
		self.block_poll_interval_ms = interval;
		self
	}

	pub fn inclusion_timeout_seconds(mut self, timeout: Option<u64>) -> Self {
		self.inclusion_timeout_seconds = timeout;
		self
	}

	pub fn private_key(mut self, key: impl Into<String>) -> Self {
		self.private_key = key.into();
		self
	}

	pub fn build(self) -> Config {
		let mut wallet_config = toml::Table::new();
		wallet_config.insert(
			"private_key".to_string(),
			toml::Value::String(self.private_key),
		);

		Config {
			platform: PlatformConfig {
				id: self.platform_id,
				chain_id: self.chain_id,
			},
			node: NodeConfig {
				rpc_url: self.rpc_url,
				max_attempts: self.max_attempts,
				retry_wait_ms: self.retry_wait_ms,
				batching: true,
				batched_methods: None,
				block_poll_interval_ms: self.block_poll_interval_ms,
				inclusion_timeout_seconds: self.inclusion_timeout_seconds,
				request_timeout_seconds: 30,
			},
			auth: AuthConfig {
				base_url: self.auth_url,
				refresh_ratio: 0.9,
				drift_threshold_ms: 100,
				timer_poll_ms: 10,
				redirect_delay_ms: 1000,
				default_permissions: Vec::new(),
			},
			storage: StorageConfig {
				primary: "memory".to_string(),
				implementations: HashMap::from([(
					"memory".to_string(),
					toml::Value::Table(toml::Table::new()),
				)]),
			},
			wallet: WalletConfig {
				primary: "local".to_string(),
				implementations: HashMap::from([(
					"local".to_string(),
					toml::Value::Table(wallet_config),
				)]),
			},
			contracts: ContractsConfig {
				ether_token: Address::with_last_byte(1),
				euro_token: Address::with_last_byte(2),
				ether_lock: Address::with_last_byte(3),
				euro_lock: Address::with_last_byte(4),
				fee_disbursal: Address::with_last_byte(5),
				platform_terms: Address::with_last_byte(6),
				universe: Address::with_last_byte(7),
			},
		}
	}
}
