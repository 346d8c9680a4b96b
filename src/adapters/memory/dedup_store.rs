//! In-memory inbound dedup store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::conversation::Channel;
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{InboundDedupStore, SaveResult};

/// Records seen message ids with the time they were first seen.
#[derive(Default)]
pub struct MemoryDedupStore {
    seen: Mutex<HashMap<(Channel, String), Timestamp>>,
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_seen<R>(
        &self,
        f: impl FnOnce(&mut HashMap<(Channel, String), Timestamp>) -> R,
    ) -> Result<R, DomainError> {
        let mut seen = self
            .seen
            .lock()
            .map_err(|_| DomainError::new(ErrorCode::InternalError, "Dedup store lock poisoned"))?;
        Ok(f(&mut seen))
    }

    /// Records an id as seen at `at` (for retention tests).
    pub fn record_at(&self, channel: Channel, id: &str, at: Timestamp) -> Result<(), DomainError> {
        self.with_seen(|seen| {
            seen.insert((channel, id.to_string()), at);
        })
    }
}

#[async_trait]
impl InboundDedupStore for MemoryDedupStore {
    async fn record(&self, channel: Channel, external_message_id: &str) -> Result<SaveResult, DomainError> {
        self.with_seen(|seen| {
            let key = (channel, external_message_id.to_string());
            if seen.contains_key(&key) {
                SaveResult::AlreadyExists
            } else {
                seen.insert(key, Timestamp::now());
                SaveResult::Inserted
            }
        })
    }

    async fn forget(&self, channel: Channel, external_message_id: &str) -> Result<(), DomainError> {
        self.with_seen(|seen| {
            seen.remove(&(channel, external_message_id.to_string()));
        })
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        self.with_seen(|seen| {
            let before = seen.len();
            seen.retain(|_, at| !at.is_before(&cutoff));
            (before - seen.len()) as u64
        })
    }
}
