//! Read model. Queries take no locks.

use super::DeskEngine;
use crate::application::EngineError;
use crate::domain::audit::{AuditLogEntry, EntityRef};
use crate::domain::conversation::{Conversation, Message};
use crate::domain::foundation::{ConversationId, CsatId, ErrorCode, TicketId, Timestamp};
use crate::domain::ticket::{CsatRating, Ticket};
use crate::ports::ConversationFilter;

impl DeskEngine {
    pub async fn get_conversation(&self, id: ConversationId) -> Result<Conversation, EngineError> {
        self.load_conversation(id).await
    }

    /// Conversations matching `filter`, most recently active first.
    pub async fn list_conversations(&self, filter: &ConversationFilter) -> Result<Vec<Conversation>, EngineError> {
        Ok(self.store.list(filter).await?)
    }

    /// Conversations still waiting for an agent that were escalated before
    /// `cutoff`, oldest first.
    pub async fn escalated_before(&self, cutoff: Timestamp) -> Result<Vec<Conversation>, EngineError> {
        Ok(self.store.list_escalated_before(cutoff).await?)
    }

    /// Messages of a conversation in timestamp order; `limit` keeps the
    /// latest ones.
    pub async fn list_messages(
        &self,
        id: ConversationId,
        limit: Option<u32>,
    ) -> Result<Vec<Message>, EngineError> {
        self.load_conversation(id).await?;
        Ok(self.store.messages(id, limit).await?)
    }

    /// Every audit entry belonging to a conversation (its tickets, surveys
    /// and delivery failures included), ordered by sequence.
    pub async fn conversation_audit(&self, id: ConversationId) -> Result<Vec<AuditLogEntry>, EngineError> {
        self.load_conversation(id).await?;
        Ok(self.store.conversation_history(id).await?)
    }

    /// Audit entries about one entity, ordered by sequence.
    pub async fn entity_audit(&self, entity: EntityRef) -> Result<Vec<AuditLogEntry>, EngineError> {
        Ok(self.store.entity_history(entity).await?)
    }

    pub async fn get_ticket(&self, id: TicketId) -> Result<Ticket, EngineError> {
        self.load_ticket(id).await
    }

    /// Tickets of a conversation, oldest first.
    pub async fn tickets_for_conversation(&self, id: ConversationId) -> Result<Vec<Ticket>, EngineError> {
        self.load_conversation(id).await?;
        Ok(self.store.tickets_for_conversation(id).await?)
    }

    pub async fn get_csat(&self, id: CsatId) -> Result<CsatRating, EngineError> {
        self.store
            .find_csat(id)
            .await?
            .ok_or_else(|| EngineError::not_found(ErrorCode::CsatNotFound, format!("CSAT {}", id)))
    }

    pub async fn csat_for_conversation(&self, id: ConversationId) -> Result<Vec<CsatRating>, EngineError> {
        Ok(self.store.csat_for_conversation(id).await?)
    }
}
