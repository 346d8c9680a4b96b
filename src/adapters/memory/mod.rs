//! In-memory adapters for the store ports.
//!
//! - `MemoryDeskStore` - conversations, agents, tickets, surveys, audit log
//! - `MemoryDedupStore` - inbound redelivery tracking
//! - `MemorySettingsStore` - administrator overrides

mod dedup_store;
mod desk_store;
mod settings_store;

pub use dedup_store::MemoryDedupStore;
pub use desk_store::MemoryDeskStore;
pub use settings_store::MemorySettingsStore;
