//! Builder pattern for constructing the platform.
//!
//! Composes a [`Platform`] from configuration and factory functions for the
//! pluggable parts (storage backends and wallets). The node connection, the
//! session layer and the transaction sender are built from configuration.

use crate::auth::{AuthService, HttpSignatureAuthApi, RedirectChannel};
use crate::delay::{SafeTimers, SystemClock};
use crate::event_bus::EventBus;
use crate::tx::{AutoConfirm, SignaturePrompt, TxSender};
use crate::wallets::NodeWallet;
use crate::Platform;
use eto_account::{SignerType, WalletError, WalletInterface, WalletManager};
use eto_config::Config;
use eto_node::batch::DEFAULT_BATCHED_METHODS;
use eto_node::implementations::http::HttpTransport;
use eto_node::{NodeAdapter, RetryPolicy};
use eto_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Wallet implementation backed by accounts of the node itself.
pub const NODE_WALLET: &str = "node";

/// Errors that can occur while building the platform.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for the pluggable components.
pub struct PlatformFactories<SF, WF> {
	pub storage_factories: HashMap<String, SF>,
	pub wallet_factories: HashMap<String, WF>,
}

/// Builder for constructing a [`Platform`].
pub struct PlatformBuilder {
	config: Config,
	prompt: Arc<dyn SignaturePrompt>,
}

impl PlatformBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			prompt: Arc::new(AutoConfirm),
		}
	}

	/// Sets how the user confirms drafts before signing.
	pub fn with_signature_prompt(mut self, prompt: Arc<dyn SignaturePrompt>) -> Self {
		self.prompt = prompt;
		self
	}

	pub async fn build<SF, WF>(
		self,
		factories: PlatformFactories<SF, WF>,
	) -> Result<Platform, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		WF: Fn(&toml::Value) -> Result<Box<dyn WalletInterface>, WalletError>,
	{
		let config = &self.config;

		// Storage
		let primary_storage = &config.storage.primary;
		let storage_config = config
			.storage
			.implementations
			.get(primary_storage)
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"Primary storage '{}' has no configuration",
					primary_storage
				))
			})?;
		let factory = factories
			.storage_factories
			.get(primary_storage)
			.ok_or_else(|| BuilderError::MissingComponent(format!("storage '{}'", primary_storage)))?;
		let backend = factory(storage_config).map_err(|e| {
			tracing::error!(
				component = "storage",
				implementation = %primary_storage,
				error = %e,
				"Failed to create storage implementation"
			);
			BuilderError::Config(format!(
				"Failed to create storage implementation '{}': {}",
				primary_storage, e
			))
		})?;
		let storage = StorageService::new(backend);
		tracing::info!(component = "storage", implementation = %primary_storage, "Loaded");

		// Node
		let node_config = &config.node;
		let transport = HttpTransport::new(
			node_config.rpc_url.clone(),
			Duration::from_secs(node_config.request_timeout_seconds),
		)
		.map_err(|e| BuilderError::Config(format!("Failed to create node transport: {}", e)))?;
		let mut node = NodeAdapter::new(Arc::new(transport))
			.with_retry_policy(RetryPolicy {
				max_attempts: node_config.max_attempts,
				wait: Duration::from_millis(node_config.retry_wait_ms),
			})
			.with_block_poll_interval(Duration::from_millis(node_config.block_poll_interval_ms));
		if node_config.batching {
			let methods = node_config.batched_methods.clone().unwrap_or_else(|| {
				DEFAULT_BATCHED_METHODS
					.iter()
					.map(|m| m.to_string())
					.collect()
			});
			node = node.with_batching(methods);
		}
		let node = Arc::new(node);
		tracing::info!(component = "node", rpc_url = %node_config.rpc_url, batching = node_config.batching, "Loaded");

		// Wallet
		let primary_wallet = &config.wallet.primary;
		let wallet_config = config
			.wallet
			.implementations
			.get(primary_wallet)
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"Primary wallet '{}' has no configuration",
					primary_wallet
				))
			})?;
		let wallet: Arc<dyn WalletInterface> = if primary_wallet == NODE_WALLET {
			let signer_type = node_signer_type(wallet_config)?;
			Arc::new(
				NodeWallet::connect(node.clone(), signer_type)
					.await
					.map_err(|e| wallet_error(primary_wallet, e))?,
			)
		} else {
			let factory = factories
				.wallet_factories
				.get(primary_wallet)
				.ok_or_else(|| BuilderError::MissingComponent(format!("wallet '{}'", primary_wallet)))?;
			Arc::from(factory(wallet_config).map_err(|e| wallet_error(primary_wallet, e))?)
		};
		let wallets = Arc::new(WalletManager::new());
		wallets
			.plug(wallet)
			.await
			.map_err(|e| wallet_error(primary_wallet, e))?;
		tracing::info!(component = "wallet", implementation = %primary_wallet, "Loaded");

		// Session
		let event_bus = EventBus::default();
		let auth_config = &config.auth;
		let timers = SafeTimers::with_settings(
			Arc::new(SystemClock),
			Duration::from_millis(auth_config.timer_poll_ms),
			Duration::from_millis(auth_config.drift_threshold_ms),
		);
		let api = HttpSignatureAuthApi::new(
			&auth_config.base_url,
			Duration::from_secs(node_config.request_timeout_seconds),
		)
		.map_err(|e| BuilderError::Config(format!("Failed to create auth client: {}", e)))?;
		let auth = Arc::new(
			AuthService::new(
				Arc::new(api),
				storage.clone(),
				wallets.clone(),
				event_bus.clone(),
				timers.clone(),
			)
			.with_refresh_ratio(auth_config.refresh_ratio),
		);
		let redirect = Arc::new(
			RedirectChannel::new(storage.clone(), event_bus.clone())
				.with_watch_delay(Duration::from_millis(auth_config.redirect_delay_ms)),
		);

		// Transactions
		let tx_sender = Arc::new(
			TxSender::new(
				node.clone(),
				wallets.clone(),
				event_bus.clone(),
				self.prompt.clone(),
				config.platform.chain_id,
			)
			.with_inclusion_timeout(node_config.inclusion_timeout_seconds.map(Duration::from_secs)),
		);

		Ok(Platform {
			config: self.config,
			storage,
			node,
			wallets,
			event_bus,
			timers,
			auth,
			redirect,
			tx_sender,
		})
	}
}

fn node_signer_type(config: &toml::Value) -> Result<SignerType, BuilderError> {
	match config.get("signer_type").and_then(|v| v.as_str()) {
		None | Some("eth_sign") => Ok(SignerType::EthSign),
		Some("eth_signTypedData") => Ok(SignerType::EthSignTypedData),
		Some(other) => Err(BuilderError::Config(format!(
			"Unknown signer type '{}'",
			other
		))),
	}
}

fn wallet_error(name: &str, error: WalletError) -> BuilderError {
	tracing::error!(component = "wallet", implementation = %name, error = %error, "Failed to create wallet");
	BuilderError::Config(format!(
		"Failed to create wallet implementation '{}': {}",
		name, error
	))
}

#[cfg(test)]
mod tests {
	use super::*;
	use eto_config::ConfigBuilder;

	fn factories() -> PlatformFactories<eto_storage::StorageFactory, eto_account::WalletFactory> {
		PlatformFactories {
			storage_factories: eto_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			wallet_factories: eto_account::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	#[tokio::test]
	async fn test_build_plugs_primary_wallet() {
		let platform = PlatformBuilder::new(ConfigBuilder::new().build())
			.build(factories())
			.await
			.unwrap();

		let wallet = platform.wallets.personal_wallet().await.unwrap();
		assert_eq!(
			wallet.address().await.unwrap().to_checksum(None),
			"0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
		);
		assert_eq!(platform.config.platform.chain_id, 17);
	}

	#[tokio::test]
	async fn test_unknown_storage_is_rejected() {
		let mut config = ConfigBuilder::new().build();
		config.storage.primary = "redis".into();
		config
			.storage
			.implementations
			.insert("redis".into(), toml::Value::Table(toml::Table::new()));

		let result = PlatformBuilder::new(config).build(factories()).await;

		assert!(matches!(result, Err(BuilderError::MissingComponent(_))));
	}

	#[test]
	fn test_node_signer_type() {
		let typed: toml::Table = toml::from_str("signer_type = \"eth_signTypedData\"").unwrap();
		assert_eq!(
			node_signer_type(&toml::Value::Table(typed)).unwrap(),
			SignerType::EthSignTypedData
		);
		assert_eq!(
			node_signer_type(&toml::Value::Table(toml::Table::new())).unwrap(),
			SignerType::EthSign
		);
	}
}
