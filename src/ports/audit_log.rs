//! Audit log reader port.
//!
//! The audit log is append-only; appends happen inside
//! [`TransitionCommitter::commit`](super::TransitionCommitter::commit).

use async_trait::async_trait;

use crate::domain::audit::{AuditLogEntry, EntityRef};
use crate::domain::foundation::{ConversationId, DomainError};

/// Read access to committed audit entries.
#[async_trait]
pub trait AuditLogReader: Send + Sync {
    /// Entries about one entity, ascending by sequence.
    async fn entity_history(&self, entity: EntityRef) -> Result<Vec<AuditLogEntry>, DomainError>;

    /// Entries belonging to a conversation (including its tickets and
    /// surveys), ascending by sequence.
    async fn conversation_history(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<AuditLogEntry>, DomainError>;

    /// Highest assigned sequence, or 0 for an empty log.
    async fn last_sequence(&self) -> Result<u64, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_log_reader_is_object_safe() {
        fn _accepts_dyn(_reader: &dyn AuditLogReader) {}
    }
}
