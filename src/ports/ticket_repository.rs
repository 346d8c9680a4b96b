//! Ticket and CSAT repository ports (read side).

use async_trait::async_trait;

use crate::domain::foundation::{ConversationId, CsatId, DomainError, TicketId};
use crate::domain::ticket::{CsatRating, Ticket};

/// Read access to tickets.
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Find a ticket by its ID.
    async fn find_ticket(&self, id: TicketId) -> Result<Option<Ticket>, DomainError>;

    /// The unresolved ticket of a conversation, if any. At most one exists.
    async fn find_open_ticket(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<Ticket>, DomainError>;

    /// All tickets of a conversation, oldest first.
    async fn tickets_for_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Ticket>, DomainError>;
}

/// Read access to CSAT surveys.
#[async_trait]
pub trait CsatRepository: Send + Sync {
    /// Find a survey by its ID.
    async fn find_csat(&self, id: CsatId) -> Result<Option<CsatRating>, DomainError>;

    /// All surveys of a conversation, oldest first.
    async fn csat_for_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<CsatRating>, DomainError>;
}
