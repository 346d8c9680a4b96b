//! Fan-out port - real-time stream of desk events to operator sessions.
//!
//! Publishing is synchronous and never fails the caller: the engine
//! publishes after the commit (while still holding the conversation lock,
//! which gives per-conversation ordering) and a slow or missing subscriber
//! must not affect state. Subscribers that fall behind lose events and
//! reconcile by re-fetching.

use tokio::sync::broadcast;

use crate::domain::foundation::DeskEvent;

/// Publisher/subscriber interface of the fan-out bus.
pub trait FanoutPublisher: Send + Sync {
    /// Publishes an event to every current subscriber.
    fn publish(&self, event: DeskEvent);

    /// Opens a new subscription receiving events published from now on.
    fn subscribe(&self) -> broadcast::Receiver<DeskEvent>;

    /// Number of live subscriptions.
    fn subscriber_count(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fanout_publisher_is_object_safe() {
        fn _accepts_dyn(_bus: &dyn FanoutPublisher) {}
    }
}
