//! Inbound deduplication port.
//!
//! Channels redeliver webhooks on timeouts and non-2xx responses. Every
//! channel-native message id is recorded once; a second sighting is a
//! redelivery and must be acknowledged without being processed again.

use async_trait::async_trait;

use crate::domain::conversation::Channel;
use crate::domain::foundation::{DomainError, Timestamp};

/// Result of attempting to record a message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// First time seeing this message.
    Inserted,
    /// Already recorded (redelivery).
    AlreadyExists,
}

/// Port for recording seen inbound message ids.
///
/// Implementations must make `record` atomic (PRIMARY KEY on
/// `(channel, external_message_id)` with `ON CONFLICT DO NOTHING`) so that
/// concurrent redeliveries race safely.
#[async_trait]
pub trait InboundDedupStore: Send + Sync {
    /// Records a message id, reporting whether it was new.
    async fn record(
        &self,
        channel: Channel,
        external_message_id: &str,
    ) -> Result<SaveResult, DomainError>;

    /// Forgets a message id whose processing could not be queued, so a
    /// redelivery can try again.
    async fn forget(&self, channel: Channel, external_message_id: &str) -> Result<(), DomainError>;

    /// Deletes records older than `cutoff`. Returns the number removed.
    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError>;
}
