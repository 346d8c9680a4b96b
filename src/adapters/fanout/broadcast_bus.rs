//! Broadcast fan-out bus for operator sessions.
//!
//! A single `tokio::sync::broadcast` channel carries every desk event to
//! every connected operator. Operators see the whole desk, so there are no
//! per-conversation rooms; filtering happens client-side.
//!
//! ```text
//! engine ──publish──▶ Sender ──┬──▶ operator session a
//!                              ├──▶ operator session b
//!                              └──▶ operator session c
//! ```
//!
//! A subscriber that falls more than `capacity` events behind receives
//! `RecvError::Lagged` and must re-fetch state.

use tokio::sync::broadcast;

use crate::domain::foundation::DeskEvent;
use crate::ports::FanoutPublisher;

/// Default buffer per subscriber.
pub const DEFAULT_FANOUT_CAPACITY: usize = 256;

/// Fan-out bus backed by a broadcast channel.
pub struct BroadcastFanout {
    sender: broadcast::Sender<DeskEvent>,
}

impl BroadcastFanout {
    /// Create a bus whose subscribers buffer up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }
}

impl Default for BroadcastFanout {
    fn default() -> Self {
        Self::new(DEFAULT_FANOUT_CAPACITY)
    }
}

impl FanoutPublisher for BroadcastFanout {
    fn publish(&self, event: DeskEvent) {
        // No subscribers is fine.
        if let Ok(receivers) = self.sender.send(event) {
            tracing::trace!(receivers, "Desk event fanned out");
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<DeskEvent> {
        self.sender.subscribe()
    }

    fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
