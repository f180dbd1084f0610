//! Registry of the pluggable storage and wallet implementations.
//!
//! Every implementation crate exposes its factories through
//! `get_all_implementations`; the registry collects them once so the
//! configuration can refer to implementations by name.

use eto_account::WalletFactory;
use eto_config::Config;
use eto_core::builder::NODE_WALLET;
use eto_core::{Platform, PlatformBuilder, PlatformFactories};
use eto_storage::StorageFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub wallet: HashMap<String, WalletFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			wallet: HashMap::new(),
		}
	}

	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	pub fn register_wallet(&mut self, name: impl Into<String>, factory: WalletFactory) {
		self.wallet.insert(name.into(), factory);
	}
}

impl Default for FactoryRegistry {
	fn default() -> Self {
		Self::new()
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Returns the process-wide registry, filling it on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in eto_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in eto_account::get_all_implementations() {
			tracing::debug!("Registering wallet implementation: {}", name);
			registry.register_wallet(name, factory);
		}

		registry
	})
}

/// Picks the factory of every configured implementation, failing on names the
/// registry does not know.
macro_rules! build_factories {
	($registry:expr, $names:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $names {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Builds the platform for `config` from the registered implementations.
pub async fn build_platform_from_config(
	config: Config,
) -> Result<Platform, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let storage_factories = build_factories!(
		registry,
		config.storage.implementations.keys(),
		storage,
		"storage"
	);
	// The node wallet is wired by the builder itself.
	let wallet_factories = build_factories!(
		registry,
		config
			.wallet
			.implementations
			.keys()
			.filter(|name| name.as_str() != NODE_WALLET),
		wallet,
		"wallet"
	);

	let factories = PlatformFactories {
		storage_factories,
		wallet_factories,
	};

	Ok(PlatformBuilder::new(config).build(factories).await?)
}
