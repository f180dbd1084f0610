//! Event bus for broadcasting application events.
//!
//! Flows, the session layer and the multi-tab channel publish here; any
//! number of consumers subscribe independently.

use eto_types::AppEvent;
use tokio::sync::broadcast;

/// Default number of events buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// Broadcast channel carrying [`AppEvent`]s.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to all current subscribers.
	///
	/// Fails only when nobody is subscribed.
	pub fn publish(
		&self,
		event: AppEvent,
	) -> Result<usize, broadcast::error::SendError<AppEvent>> {
		self.sender.send(event)
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use eto_types::AuthEvent;

	#[tokio::test]
	async fn test_every_subscriber_receives_events() {
		let bus = EventBus::default();
		let mut a = bus.subscribe();
		let mut b = bus.subscribe();

		bus.publish(AppEvent::Auth(AuthEvent::Logout)).unwrap();

		assert_eq!(a.recv().await.unwrap(), AppEvent::Auth(AuthEvent::Logout));
		assert_eq!(b.recv().await.unwrap(), AppEvent::Auth(AuthEvent::Logout));
	}

	#[test]
	fn test_publish_without_subscribers_fails() {
		let bus = EventBus::default();
		assert!(bus.publish(AppEvent::Auth(AuthEvent::AppInit)).is_err());
	}
}
