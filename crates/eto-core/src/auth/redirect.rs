//! Keeps sessions sharing one storage backend in step.
//!
//! When another session logs out (removes the token) this one logs out too;
//! when another session logs in (creates the user entry) this one restarts.

use crate::event_bus::EventBus;
use eto_storage::{StorageChange, StorageService};
use eto_types::{AppEvent, AuthEvent, StorageKey};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Pause after handling a change before the next one is considered.
pub const REDIRECT_CHANNEL_WATCH_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectAction {
	Logout,
	Login,
}

impl RedirectAction {
	fn event(self) -> AuthEvent {
		match self {
			RedirectAction::Logout => AuthEvent::Logout,
			RedirectAction::Login => AuthEvent::AppInit,
		}
	}
}

/// Maps a change made by another session to the action it requires here.
pub fn classify_change(change: &StorageChange) -> Option<RedirectAction> {
	match change.key.parse::<StorageKey>() {
		Ok(StorageKey::Jwt) if change.is_removal() => Some(RedirectAction::Logout),
		Ok(StorageKey::User) if change.is_creation() => Some(RedirectAction::Login),
		_ => None,
	}
}

pub struct RedirectChannel {
	storage: StorageService,
	event_bus: EventBus,
	watch_delay: Duration,
}

impl RedirectChannel {
	pub fn new(storage: StorageService, event_bus: EventBus) -> Self {
		Self {
			storage,
			event_bus,
			watch_delay: REDIRECT_CHANNEL_WATCH_DELAY,
		}
	}

	pub fn with_watch_delay(mut self, delay: Duration) -> Self {
		self.watch_delay = delay;
		self
	}

	/// Watches changes made by other sessions until cancelled.
	pub async fn run(&self, cancel: CancellationToken) {
		let mut changes = self.storage.foreign_changes();
		loop {
			let change = tokio::select! {
				_ = cancel.cancelled() => return,
				change = changes.recv() => change,
			};
			let Some(change) = change else {
				return;
			};
			let Some(action) = classify_change(&change) else {
				continue;
			};

			info!(?action, origin = %change.origin, "Session changed elsewhere");
			self.event_bus.publish(AppEvent::Auth(action.event())).ok();

			tokio::select! {
				_ = cancel.cancelled() => return,
				_ = tokio::time::sleep(self.watch_delay) => {},
			}
		}
	}
}
