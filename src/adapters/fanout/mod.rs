//! Fan-out adapters - real-time desk events for operator sessions.

mod broadcast_bus;

pub use broadcast_bus::{BroadcastFanout, DEFAULT_FANOUT_CAPACITY};
