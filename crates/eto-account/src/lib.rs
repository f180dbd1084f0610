//! Wallet management for the ETO platform.
//!
//! This module defines the signing capability flows and the session layer rely
//! on: message signing for authentication challenges, legacy typed-data
//! signing, and transaction signing. The user's wallet is "plugged" into a
//! [`WalletManager`] after login and unplugged on logout.

use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use eto_types::{ConfigSchema, ImplementationRegistry, TxData};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}
pub mod typed_data;

pub use typed_data::TypedDataField;

/// Errors that can occur during wallet operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
	/// The user rejected the confirmation on the signing device.
	#[error("Signer rejected confirmation")]
	SignerRejectConfirmation,
	/// The signing device did not answer in time.
	#[error("Signer timed out")]
	SignerTimeout,
	/// The user closed the message signing prompt.
	#[error("Message signing cancelled")]
	MessageSignCancelled,
	/// No wallet is plugged in.
	#[error("Wallet unavailable")]
	Unavailable,
	/// Error that occurs when signing operations fail.
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// Error that occurs when a cryptographic key is invalid or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

/// How a wallet signs authentication challenges.
///
/// The value is sent to the authentication server with every challenge so
/// it can verify the signature the right way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignerType {
	#[serde(rename = "eth_sign")]
	EthSign,
	#[serde(rename = "eth_signTypedData")]
	EthSignTypedData,
}

impl SignerType {
	pub fn as_str(&self) -> &'static str {
		match self {
			SignerType::EthSign => "eth_sign",
			SignerType::EthSignTypedData => "eth_signTypedData",
		}
	}
}

impl fmt::Display for SignerType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Result of asking a wallet to sign a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedTransaction {
	/// An EIP-2718 encoded transaction ready for `eth_sendRawTransaction`.
	Raw(Bytes),
	/// The account lives in the node; the draft must be sent with
	/// `eth_sendTransaction` and the node signs it.
	NodeManaged(TxData),
}

/// Trait defining the interface for wallet implementations.
#[async_trait]
pub trait WalletInterface: Send + Sync {
	/// Returns the configuration schema for this wallet implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// How this wallet signs authentication challenges.
	fn signer_type(&self) -> SignerType;

	/// Retrieves the address associated with this wallet.
	async fn address(&self) -> Result<Address, WalletError>;

	/// Signs a challenge string the way [`Self::signer_type`] announces.
	async fn sign_message(&self, message: &str) -> Result<Bytes, WalletError>;

	/// Signs legacy (v1) typed data.
	async fn sign_typed_data(&self, data: &[TypedDataField]) -> Result<Bytes, WalletError>;

	/// Signs a transaction draft for the given chain.
	///
	/// The draft must carry a nonce.
	async fn sign_transaction(
		&self,
		tx: &TxData,
		chain_id: u64,
	) -> Result<SignedTransaction, WalletError>;
}

/// Type alias for wallet factory functions.
pub type WalletFactory = fn(&toml::Value) -> Result<Box<dyn WalletInterface>, WalletError>;

/// Registry trait for wallet implementations.
pub trait WalletRegistry: ImplementationRegistry<Factory = WalletFactory> {}

/// Get all registered wallet implementations.
pub fn get_all_implementations() -> Vec<(&'static str, WalletFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Holds the personal wallet of the current session.
#[derive(Default)]
pub struct WalletManager {
	personal: RwLock<Option<Arc<dyn WalletInterface>>>,
}

impl WalletManager {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes `wallet` the personal wallet, replacing any previous one.
	pub async fn plug(&self, wallet: Arc<dyn WalletInterface>) -> Result<Address, WalletError> {
		let address = wallet.address().await?;
		*self.personal.write().await = Some(wallet);
		tracing::info!(%address, "Plugged personal wallet");
		Ok(address)
	}

	/// Removes the personal wallet.
	pub async fn unplug(&self) {
		if self.personal.write().await.take().is_some() {
			tracing::info!("Unplugged personal wallet");
		}
	}

	/// Returns the personal wallet.
	pub async fn personal_wallet(&self) -> Result<Arc<dyn WalletInterface>, WalletError> {
		self.personal
			.read()
			.await
			.clone()
			.ok_or(WalletError::Unavailable)
	}

	pub async fn has_plugged_wallet(&self) -> bool {
		self.personal.read().await.is_some()
	}
}
