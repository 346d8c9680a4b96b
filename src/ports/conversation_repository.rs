//! Conversation repository port (read side of the desk store).
//!
//! Writes never go through this trait; every mutation is committed as one
//! [`ChangeSet`](super::ChangeSet) by a [`TransitionCommitter`](super::TransitionCommitter).

use async_trait::async_trait;

use crate::domain::conversation::{Channel, Conversation, ConversationStatus, Message};
use crate::domain::foundation::{ConversationId, DomainError, ExternalUserId, Timestamp};

/// Filter for listing conversations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationFilter {
    pub status: Option<ConversationStatus>,
    pub channel: Option<Channel>,
    /// Only conversations waiting for an agent.
    pub escalation_pending: bool,
    /// Maximum rows; `None` means the store default.
    pub limit: Option<u32>,
}

impl ConversationFilter {
    pub fn with_status(mut self, status: ConversationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn escalation_pending(mut self) -> Self {
        self.escalation_pending = true;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Checks a conversation against the filter (ignores `limit`).
    pub fn matches(&self, conversation: &Conversation) -> bool {
        self.status.map_or(true, |s| conversation.status() == s)
            && self.channel.map_or(true, |c| conversation.channel() == c)
            && (!self.escalation_pending || conversation.is_escalation_pending())
    }
}

/// Read access to conversations and their messages.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Find a conversation by its ID.
    async fn find_by_id(&self, id: ConversationId) -> Result<Option<Conversation>, DomainError>;

    /// Find the conversation for a channel-native user.
    async fn find_by_external_user(
        &self,
        channel: Channel,
        external_user_id: &ExternalUserId,
    ) -> Result<Option<Conversation>, DomainError>;

    /// List conversations, most recent activity first.
    async fn list(&self, filter: &ConversationFilter) -> Result<Vec<Conversation>, DomainError>;

    /// Escalation-pending conversations escalated before `cutoff`, oldest first.
    async fn list_escalated_before(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<Conversation>, DomainError>;

    /// Messages of a conversation in timestamp order. With `limit`, the most
    /// recent `limit` messages, still oldest first.
    async fn messages(
        &self,
        id: ConversationId,
        limit: Option<u32>,
    ) -> Result<Vec<Message>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::CustomerIdentity;

    #[test]
    fn conversation_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn ConversationRepository) {}
    }

    #[test]
    fn filter_matches_escalation_pending_only() {
        let customer = CustomerIdentity::new("Ana", ExternalUserId::new("u1").unwrap());
        let mut c = Conversation::start(Channel::Widget, customer, Timestamp::now());
        let filter = ConversationFilter::default().escalation_pending();
        assert!(!filter.matches(&c));

        c.escalate(None, Timestamp::now()).unwrap();
        assert!(filter.matches(&c));
        assert!(!ConversationFilter::default()
            .with_status(ConversationStatus::Assigned)
            .matches(&c));
    }
}
