//! Typed event fan-out to collaborators.
//!
//! Replaces broadcast-style delivery with a typed publish/subscribe
//! boundary: subscribers receive [`SessionEvent`] values over unbounded
//! channels in publish order. Nothing is redelivered after a link drop;
//! collaborators react to `Disconnected` by clearing stale values.

use crate::domain::models::SessionEvent;
use tokio::sync::mpsc;
use tracing::debug;

/// Handle identifying one subscription, returned by [`ReadingBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Minimal publish/subscribe sink for readings and link-state events.
#[derive(Debug, Default)]
pub struct ReadingBus {
    subscribers: Vec<(SubscriberId, mpsc::UnboundedSender<SessionEvent>)>,
    next_id: u64,
}

impl ReadingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collaborator; events published from now on arrive on the
    /// returned receiver, in publish order.
    pub fn subscribe(&mut self) -> (SubscriberId, mpsc::UnboundedReceiver<SessionEvent>) {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push((id, tx));
        (id, rx)
    }

    /// Remove a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&mut self, id: SubscriberId) {
        self.subscribers.retain(|(sid, _)| *sid != id);
    }

    /// Deliver `event` to every live subscriber. Subscribers whose receiver
    /// has been dropped are pruned here.
    pub fn publish(&mut self, event: SessionEvent) {
        self.subscribers.retain(|(id, tx)| {
            if tx.send(event.clone()).is_ok() {
                true
            } else {
                debug!(subscriber = id.0, "receiver dropped, pruning subscription");
                false
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
