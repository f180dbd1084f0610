//! Session authentication by wallet signature.
//!
//! A session token is obtained by signing a single-use challenge issued by
//! the authentication server. Tokens carry timed permissions; operations that
//! need a missing permission escalate the token with another signed
//! challenge. Tokens are refreshed shortly before expiry unless the process
//! was suspended for too long, in which case the user is logged out.

use crate::state::StateError;
use async_trait::async_trait;
use eto_account::WalletError;
use thiserror::Error;

pub mod api;
pub mod jwt;
pub mod redirect;
pub mod service;

pub use api::{HttpSignatureAuthApi, SignatureAuthApi};
pub use jwt::{Jwt, JwtClaims};
pub use redirect::{RedirectAction, RedirectChannel};
pub use service::{AuthService, SignedChallenge};

/// Errors that can occur in the session layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
	#[error("JWT not available")]
	JwtNotAvailable,
	#[error("Wallet unavailable")]
	WalletUnavailable,
	#[error("Authentication API error: {0}")]
	Api(String),
	#[error("Wallet error: {0}")]
	Wallet(WalletError),
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Invalid token: {0}")]
	InvalidToken(String),
	#[error(transparent)]
	State(#[from] StateError),
}

impl From<WalletError> for AuthError {
	fn from(error: WalletError) -> Self {
		match error {
			WalletError::Unavailable => AuthError::WalletUnavailable,
			other => AuthError::Wallet(other),
		}
	}
}

impl From<eto_storage::StorageError> for AuthError {
	fn from(error: eto_storage::StorageError) -> Self {
		AuthError::Storage(error.to_string())
	}
}

/// What the user is asked to unlock their wallet for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
	pub title: String,
	pub message: String,
	pub input_label: Option<String>,
}

impl AccessRequest {
	pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			title: title.into(),
			message: message.into(),
			input_label: None,
		}
	}
}

/// Lets the user unlock their wallet before a signing round.
///
/// Closing the prompt must be reported as
/// [`WalletError::MessageSignCancelled`].
#[async_trait]
pub trait WalletAccessPrompt: Send + Sync {
	async fn request_access(&self, request: &AccessRequest) -> Result<(), WalletError>;
}

/// Grants access without asking, for unattended sessions.
pub struct AutoApprove;

#[async_trait]
impl WalletAccessPrompt for AutoApprove {
	async fn request_access(&self, request: &AccessRequest) -> Result<(), WalletError> {
		tracing::debug!(title = %request.title, "Wallet access granted without prompt");
		Ok(())
	}
}
