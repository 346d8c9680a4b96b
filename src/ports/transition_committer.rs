//! Transition committer port - the unit of work of the desk store.
//!
//! Every state-changing engine operation builds one [`ChangeSet`] and commits
//! it atomically: entity writes, agent load adjustments and the audit
//! append either all land or none do.
//!
//! # Compare-and-swap
//!
//! - A conversation update carries the version the caller loaded. The store
//!   rejects the commit with `ConcurrentModification` when the stored
//!   version differs.
//! - A conversation insert is rejected with `ConcurrentModification` when a
//!   conversation already exists for the same channel and external user.
//! - A load adjustment with `require_available` fails with
//!   `AgentUnavailable` unless the agent is `available` at commit time.
//! - A ticket insert fails with `OpenTicketExists` when the conversation
//!   already has an unresolved ticket.

use async_trait::async_trait;

use super::{AgentRepository, AuditLogReader, ConversationRepository, CsatRepository, TicketRepository};
use crate::domain::agent::{Agent, AgentStatus};
use crate::domain::audit::{AuditLogEntry, AuditRecord};
use crate::domain::conversation::{Conversation, Message};
use crate::domain::foundation::{AgentId, DomainError, ErrorCode};
use crate::domain::ticket::{CsatRating, Ticket};

/// Write of a conversation with its optimistic-concurrency expectation.
#[derive(Debug, Clone)]
pub enum ConversationWrite {
    /// No conversation may exist yet for the same channel and external user.
    Insert(Conversation),
    /// The stored conversation must still be at `expected_version`.
    Update {
        conversation: Conversation,
        expected_version: u64,
    },
}

impl ConversationWrite {
    pub fn conversation(&self) -> &Conversation {
        match self {
            ConversationWrite::Insert(c) | ConversationWrite::Update { conversation: c, .. } => c,
        }
    }
}

/// Insert or overwrite of a ticket or survey. Writes to these are
/// serialized by the owning conversation's lock.
#[derive(Debug, Clone)]
pub enum EntityWrite<T> {
    Insert(T),
    Update(T),
}

impl<T> EntityWrite<T> {
    pub fn entity(&self) -> &T {
        match self {
            EntityWrite::Insert(entity) | EntityWrite::Update(entity) => entity,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, EntityWrite::Insert(_))
    }
}

/// Atomic change to an agent's live conversation count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadAdjustment {
    pub agent_id: AgentId,
    pub delta: i32,
    /// Taking new load requires the agent to be `available` at commit time.
    pub require_available: bool,
}

impl LoadAdjustment {
    /// +1 for an agent taking a conversation.
    pub fn take(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            delta: 1,
            require_available: true,
        }
    }

    /// -1 for an agent releasing a conversation.
    pub fn release(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            delta: -1,
            require_available: false,
        }
    }
}

/// Status change of an agent, applied only if the stored status is still
/// `expected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentStatusChange {
    pub agent_id: AgentId,
    pub expected: AgentStatus,
    pub new_status: AgentStatus,
}

/// Everything one engine operation writes.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub conversation: Option<ConversationWrite>,
    pub messages: Vec<Message>,
    pub new_agent: Option<Agent>,
    pub agent_status: Option<AgentStatusChange>,
    pub load_adjustments: Vec<LoadAdjustment>,
    pub ticket: Option<EntityWrite<Ticket>>,
    pub csat: Option<EntityWrite<CsatRating>>,
    /// Appended last, in order. Must not be empty.
    pub audit: Vec<AuditRecord>,
}

impl ChangeSet {
    pub fn new(audit: AuditRecord) -> Self {
        Self {
            audit: vec![audit],
            ..Self::default()
        }
    }

    pub fn insert_conversation(mut self, conversation: Conversation) -> Self {
        self.conversation = Some(ConversationWrite::Insert(conversation));
        self
    }

    pub fn update_conversation(mut self, conversation: Conversation, expected_version: u64) -> Self {
        self.conversation = Some(ConversationWrite::Update {
            conversation,
            expected_version,
        });
        self
    }

    pub fn append_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn register_agent(mut self, agent: Agent) -> Self {
        self.new_agent = Some(agent);
        self
    }

    pub fn change_agent_status(mut self, change: AgentStatusChange) -> Self {
        self.agent_status = Some(change);
        self
    }

    pub fn adjust_load(mut self, adjustment: LoadAdjustment) -> Self {
        self.load_adjustments.push(adjustment);
        self
    }

    pub fn insert_ticket(mut self, ticket: Ticket) -> Self {
        self.ticket = Some(EntityWrite::Insert(ticket));
        self
    }

    pub fn update_ticket(mut self, ticket: Ticket) -> Self {
        self.ticket = Some(EntityWrite::Update(ticket));
        self
    }

    pub fn insert_csat(mut self, csat: CsatRating) -> Self {
        self.csat = Some(EntityWrite::Insert(csat));
        self
    }

    pub fn update_csat(mut self, csat: CsatRating) -> Self {
        self.csat = Some(EntityWrite::Update(csat));
        self
    }

    pub fn also_audit(mut self, record: AuditRecord) -> Self {
        self.audit.push(record);
        self
    }

    /// Rejects change sets that would commit without an audit entry.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.audit.is_empty() {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                "Change set has no audit record",
            ));
        }
        Ok(())
    }
}

/// Outcome of a successful commit.
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    /// Appended audit entries with their assigned sequences, in order.
    pub entries: Vec<AuditLogEntry>,
}

impl CommitReceipt {
    /// Sequence of the last entry appended by this commit.
    pub fn sequence(&self) -> u64 {
        self.entries.last().map(|e| e.sequence).unwrap_or(0)
    }
}

/// Atomic writer for engine transitions.
#[async_trait]
pub trait TransitionCommitter: Send + Sync {
    /// Applies the change set in one transaction.
    ///
    /// # Errors
    ///
    /// - `ConcurrentModification` on a version or uniqueness conflict
    /// - `AgentUnavailable` / `AgentNotFound` for load adjustments
    /// - `OpenTicketExists` for a second unresolved ticket
    /// - `DatabaseError` on persistence failure
    async fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, DomainError>;
}

/// The complete desk store: every read port plus the committer.
pub trait DeskStore:
    ConversationRepository
    + AgentRepository
    + TicketRepository
    + CsatRepository
    + AuditLogReader
    + TransitionCommitter
{
}

impl<T> DeskStore for T where
    T: ConversationRepository
        + AgentRepository
        + TicketRepository
        + CsatRepository
        + AuditLogReader
        + TransitionCommitter
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::{AuditAction, EntityRef};
    use crate::domain::foundation::{Actor, ConversationId};

    #[test]
    fn committer_is_object_safe() {
        fn _accepts_dyn(_c: &dyn TransitionCommitter) {}
        fn _accepts_store(_s: &dyn DeskStore) {}
    }

    #[test]
    fn empty_audit_is_rejected() {
        let err = ChangeSet::default().validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
    }

    #[test]
    fn load_adjustment_helpers() {
        let agent = AgentId::new();
        assert_eq!(LoadAdjustment::take(agent).delta, 1);
        assert!(LoadAdjustment::take(agent).require_available);
        assert_eq!(LoadAdjustment::release(agent).delta, -1);
        assert!(!LoadAdjustment::release(agent).require_available);
    }

    #[test]
    fn change_set_builder_collects_writes() {
        let record = AuditRecord::new(
            AuditAction::Escalated,
            EntityRef::Conversation(ConversationId::new()),
            &Actor::system(),
        );
        let agent = AgentId::new();
        let changes = ChangeSet::new(record).adjust_load(LoadAdjustment::release(agent));
        assert!(changes.validate().is_ok());
        assert_eq!(changes.load_adjustments.len(), 1);
        assert!(changes.conversation.is_none());
    }
}
