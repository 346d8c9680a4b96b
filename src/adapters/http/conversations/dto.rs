//! HTTP DTOs for conversation endpoints.

use serde::{Deserialize, Serialize};

use crate::application::{AgentReplyResult, AssignResult, IngestOutcome, ResolveResult};
use crate::domain::conversation::{
    Channel, Conversation, ConversationStatus, CustomerIdentity, InboundMessage, Message,
};
use crate::domain::foundation::{AgentId, ExternalUserId, ValidationError};
use crate::domain::ticket::CsatRating;
use crate::ports::ConversationFilter;

use super::super::tickets::dto::CsatResponse;

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListConversationsQuery {
    #[serde(default)]
    pub status: Option<ConversationStatus>,
    #[serde(default)]
    pub channel: Option<Channel>,
    #[serde(default)]
    pub escalation_pending: bool,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl From<ListConversationsQuery> for ConversationFilter {
    fn from(query: ListConversationsQuery) -> Self {
        ConversationFilter {
            status: query.status,
            channel: query.channel,
            escalation_pending: query.escalation_pending,
            limit: query.limit,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Direct ingest of a customer message, bypassing channel webhooks.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub channel: Channel,
    pub external_user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub external_message_id: Option<String>,
    pub content: String,
}

impl IngestRequest {
    pub fn into_inbound(self) -> Result<InboundMessage, ValidationError> {
        let external_user_id = ExternalUserId::new(self.external_user_id)?;
        let customer = CustomerIdentity::new(self.name.unwrap_or_default(), external_user_id)
            .with_email(self.email)
            .with_phone(self.phone);
        let mut inbound = InboundMessage::new(self.channel, customer, self.content)?
            .with_subject(self.subject);
        if let Some(id) = self.external_message_id {
            inbound = inbound.with_external_message_id(id);
        }
        Ok(inbound)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EscalateRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignRequest {
    pub agent_id: AgentId,
    /// Owner the caller last saw; required for transfers.
    #[serde(default)]
    pub expected_owner: Option<AgentId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentMessageRequest {
    pub agent_id: AgentId,
    pub text: String,
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct ConversationResponse {
    pub id: String,
    pub channel: Channel,
    pub customer: CustomerIdentity,
    pub status: ConversationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<String>,
    pub escalation_pending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_reason: Option<String>,
    pub last_message_at: String,
    pub created_at: String,
    pub updated_at: String,
    pub version: u64,
}

impl From<&Conversation> for ConversationResponse {
    fn from(c: &Conversation) -> Self {
        Self {
            id: c.id().to_string(),
            channel: c.channel(),
            customer: c.customer().clone(),
            status: c.status(),
            assigned_agent: c.assigned_agent().map(|a| a.to_string()),
            escalation_pending: c.is_escalation_pending(),
            escalated_at: c.escalated_at().map(|t| t.to_rfc3339()),
            escalation_reason: c.escalation_reason().map(str::to_string),
            last_message_at: c.last_message_at().to_rfc3339(),
            created_at: c.created_at().to_rfc3339(),
            updated_at: c.updated_at().to_rfc3339(),
            version: c.version(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationResponse>,
    pub total: usize,
}

impl From<Vec<Conversation>> for ConversationListResponse {
    fn from(items: Vec<Conversation>) -> Self {
        let conversations: Vec<ConversationResponse> = items.iter().map(Into::into).collect();
        Self {
            total: conversations.len(),
            conversations,
        }
    }
}

/// A transition result: the new authoritative state plus the audit sequence
/// of the commit that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionResponse {
    pub conversation: ConversationResponse,
    pub sequence: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub conversation: ConversationResponse,
    pub message: Message,
    pub created: bool,
    pub reopened: bool,
    pub ai_turn_scheduled: bool,
    pub sequence: u64,
}

impl From<&IngestOutcome> for IngestResponse {
    fn from(outcome: &IngestOutcome) -> Self {
        Self {
            conversation: (&outcome.conversation).into(),
            message: outcome.message.clone(),
            created: outcome.created,
            reopened: outcome.reopened,
            ai_turn_scheduled: outcome.ai_turn.is_some(),
            sequence: outcome.sequence,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignResponse {
    pub conversation: ConversationResponse,
    pub transferred: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_owner: Option<String>,
    pub sequence: u64,
}

impl From<AssignResult> for AssignResponse {
    fn from(result: AssignResult) -> Self {
        use crate::domain::conversation::AssignOutcome;
        let previous_owner = match result.outcome {
            AssignOutcome::Claimed { .. } => None,
            AssignOutcome::Transferred { from, .. } => Some(from.to_string()),
        };
        Self {
            conversation: (&result.conversation).into(),
            transferred: previous_owner.is_some(),
            previous_owner,
            sequence: result.sequence,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveResponse {
    pub conversation: ConversationResponse,
    pub csat: CsatResponse,
    pub survey_delivered: bool,
    pub sequence: u64,
}

impl From<ResolveResult> for ResolveResponse {
    fn from(result: ResolveResult) -> Self {
        Self {
            conversation: (&result.conversation).into(),
            csat: (&result.csat).into(),
            survey_delivered: result.survey.is_delivered(),
            sequence: result.sequence,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentReplyResponse {
    pub conversation: ConversationResponse,
    pub message: Message,
    pub delivered: bool,
    pub sequence: u64,
}

impl From<AgentReplyResult> for AgentReplyResponse {
    fn from(result: AgentReplyResult) -> Self {
        Self {
            conversation: (&result.conversation).into(),
            message: result.message,
            delivered: result.delivery.is_delivered(),
            sequence: result.sequence,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CsatListResponse {
    pub surveys: Vec<CsatResponse>,
}

impl From<Vec<CsatRating>> for CsatListResponse {
    fn from(items: Vec<CsatRating>) -> Self {
        Self {
            surveys: items.iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;

    #[test]
    fn ingest_request_builds_inbound_message() {
        let req: IngestRequest = serde_json::from_value(serde_json::json!({
            "channel": "email-like",
            "external_user_id": "ana@example.com",
            "name": "Ana",
            "email": "ana@example.com",
            "subject": "Refund",
            "external_message_id": "m-1",
            "content": "Where is my refund?"
        }))
        .unwrap();

        let inbound = req.into_inbound().unwrap();
        assert_eq!(inbound.channel, Channel::EmailLike);
        assert_eq!(inbound.customer.name, "Ana");
        assert_eq!(inbound.subject.as_deref(), Some("Refund"));
        assert_eq!(inbound.dedup_key(), Some((Channel::EmailLike, "m-1")));
    }

    #[test]
    fn blank_content_is_rejected() {
        let req = IngestRequest {
            channel: Channel::Widget,
            external_user_id: "s-1".into(),
            name: None,
            email: None,
            phone: None,
            subject: None,
            external_message_id: None,
            content: "  ".into(),
        };
        assert!(req.into_inbound().is_err());
    }

    #[test]
    fn conversation_response_exposes_pending_escalation() {
        let customer = CustomerIdentity::new("Ana", ExternalUserId::new("u-1").unwrap());
        let mut conversation = Conversation::start(Channel::Widget, customer, Timestamp::now());
        conversation.escalate(Some("asked for a human".into()), Timestamp::now()).unwrap();

        let dto = ConversationResponse::from(&conversation);
        assert!(dto.escalation_pending);
        assert_eq!(dto.status, ConversationStatus::Open);
        assert!(dto.assigned_agent.is_none());
        assert_eq!(dto.escalation_reason.as_deref(), Some("asked for a human"));
    }
}
