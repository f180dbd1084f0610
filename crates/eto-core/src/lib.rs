//! Core of the ETO platform client.
//!
//! Ties the node adapter, the personal wallet and the authentication server
//! together: transaction flows are driven by [`tx::TxSender`], the session
//! token by [`auth::AuthService`], and every component reports progress on
//! the [`event_bus::EventBus`].

use crate::auth::{AuthError, AuthService, RedirectChannel};
use crate::delay::SafeTimers;
use crate::event_bus::EventBus;
use crate::tx::TxSender;
use eto_account::WalletManager;
use eto_config::Config;
use eto_node::NodeAdapter;
use eto_storage::StorageService;
use eto_types::{AppEvent, AuthEvent};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub mod auth;
pub mod builder;
pub mod delay;
pub mod event_bus;
pub mod state;
pub mod tx;
pub mod wallets;

pub use builder::{BuilderError, PlatformBuilder, PlatformFactories};

/// Errors that can occur while running the platform.
#[derive(Debug, Error)]
pub enum PlatformError {
	#[error("Session error: {0}")]
	Auth(#[from] AuthError),
}

/// Every service of one client session.
pub struct Platform {
	config: Config,
	storage: StorageService,
	node: Arc<NodeAdapter>,
	wallets: Arc<WalletManager>,
	event_bus: EventBus,
	timers: SafeTimers,
	auth: Arc<AuthService>,
	redirect: Arc<RedirectChannel>,
	tx_sender: Arc<TxSender>,
}

impl Platform {
	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn storage(&self) -> &StorageService {
		&self.storage
	}

	pub fn node(&self) -> &Arc<NodeAdapter> {
		&self.node
	}

	pub fn wallets(&self) -> &Arc<WalletManager> {
		&self.wallets
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn timers(&self) -> &SafeTimers {
		&self.timers
	}

	pub fn auth(&self) -> &Arc<AuthService> {
		&self.auth
	}

	pub fn tx_sender(&self) -> &Arc<TxSender> {
		&self.tx_sender
	}

	/// Keeps the session in step with the auth server and other sessions
	/// until `cancel` fires.
	///
	/// A persisted token is restored first. While a token is loaded it is
	/// refreshed before expiry, and logout requests from any source end the
	/// session.
	pub async fn run(&self, cancel: CancellationToken) -> Result<(), PlatformError> {
		let mut events = self.event_bus.subscribe();

		let redirect = self.redirect.clone();
		let redirect_cancel = cancel.child_token();
		let redirect_task = tokio::spawn(async move { redirect.run(redirect_cancel).await });

		let mut keep_alive: Option<JoinHandle<()>> = None;
		if self.auth.load_jwt().await?.is_some() {
			keep_alive = Some(self.spawn_keep_alive(&cancel));
		} else {
			tracing::info!("No stored session token");
		}

		loop {
			tokio::select! {
				_ = cancel.cancelled() => break,
				Ok(event) = events.recv() => {
					let AppEvent::Auth(event) = event else {
						continue;
					};
					match &event {
						AuthEvent::JwtLoaded { .. } => {
							// A running keep-alive reschedules itself for newer tokens.
							if keep_alive.as_ref().is_none_or(|task| task.is_finished()) {
								keep_alive = Some(self.spawn_keep_alive(&cancel));
							}
						},
						AuthEvent::Logout => {
							if let Some(task) = keep_alive.take() {
								task.abort();
							}
						},
						AuthEvent::AppInit => {},
					}
					if let Err(e) = self.auth.handle_event(&event).await {
						tracing::error!(error = %e, "Failed to handle session event");
					}
				}
			}
		}

		if let Some(task) = keep_alive {
			task.abort();
		}
		redirect_task.await.ok();
		Ok(())
	}

	fn spawn_keep_alive(&self, cancel: &CancellationToken) -> JoinHandle<()> {
		let auth = self.auth.clone();
		let cancel = cancel.child_token();
		tokio::spawn(async move {
			if let Err(e) = auth.keep_session_alive(&cancel).await {
				tracing::warn!(error = %e, "Session keep-alive stopped");
			}
		})
	}
}
