//! Typed broadcast event bus.
//!
//! Thin wrapper over a tokio broadcast channel. Publishing never blocks and
//! never fails from the publisher's point of view: with no subscribers the
//! event is dropped, and slow subscribers observe `Lagged` on receive.

use tokio::sync::broadcast;

/// Default number of buffered events per bus.
pub const DEFAULT_CAPACITY: usize = 1024;

/// A cloneable handle to a broadcast channel of `E`.
#[derive(Debug)]
pub struct EventBus<E: Clone> {
	sender: broadcast::Sender<E>,
}

impl<E: Clone> Clone for EventBus<E> {
	fn clone(&self) -> Self {
		Self {
			sender: self.sender.clone(),
		}
	}
}

impl<E: Clone> EventBus<E> {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self { sender }
	}

	/// Publishes an event, returning the number of receivers it reached.
	pub fn publish(&self, event: E) -> usize {
		self.sender.send(event).unwrap_or(0)
	}

	pub fn subscribe(&self) -> broadcast::Receiver<E> {
		self.sender.subscribe()
	}

	pub fn subscriber_count(&self) -> usize {
		self.sender.receiver_count()
	}
}

impl<E: Clone> Default for EventBus<E> {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_publish_reaches_all_subscribers() {
		let bus: EventBus<u32> = EventBus::default();
		let mut a = bus.subscribe();
		let mut b = bus.clone().subscribe();
		assert_eq!(bus.publish(7), 2);
		assert_eq!(a.recv().await.unwrap(), 7);
		assert_eq!(b.recv().await.unwrap(), 7);
	}

	#[test]
	fn test_publish_without_subscribers() {
		let bus: EventBus<&'static str> = EventBus::new(4);
		assert_eq!(bus.publish("dropped"), 0);
		assert_eq!(bus.subscriber_count(), 0);
	}
}
