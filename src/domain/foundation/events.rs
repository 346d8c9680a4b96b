//! Fan-out event vocabulary.
//!
//! A `DeskEvent` is a cache-invalidation hint for operator sessions: it names
//! the entities that changed and the audit sequence of the change. Subscribers
//! re-fetch authoritative state by id instead of trusting `hint` fields.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use super::{AgentId, ConversationId, TicketId, Timestamp};

/// Kinds of events pushed to operator sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeskEventKind {
    /// A conversation was created by a first inbound message.
    NewChat,
    /// A message was appended to a conversation.
    Message,
    /// An agent claimed an escalated conversation.
    ChatAccepted,
    /// Status of a conversation, ticket or agent changed.
    StatusUpdate,
    /// AI handling was abandoned; the conversation awaits a human.
    Escalation,
    /// Ownership moved between agents.
    Assignment,
    /// Operator typing indicator. Best-effort, never persisted.
    Typing,
}

impl DeskEventKind {
    /// Wire name used in the `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeskEventKind::NewChat => "new_chat",
            DeskEventKind::Message => "message",
            DeskEventKind::ChatAccepted => "chat_accepted",
            DeskEventKind::StatusUpdate => "status_update",
            DeskEventKind::Escalation => "escalation",
            DeskEventKind::Assignment => "assignment",
            DeskEventKind::Typing => "typing",
        }
    }

    /// Typing indicators are not ordered, persisted or retried.
    pub fn is_best_effort(&self) -> bool {
        matches!(self, DeskEventKind::Typing)
    }
}

impl fmt::Display for DeskEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state-change notification for operator sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeskEvent {
    pub kind: DeskEventKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<TicketId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,

    /// Audit sequence of the commit this event announces. `None` for
    /// best-effort events that have no audit entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,

    pub occurred_at: Timestamp,

    /// Non-authoritative extra fields (status names, previews).
    #[serde(default, skip_serializing_if = "JsonValue::is_null")]
    pub hint: JsonValue,
}

impl DeskEvent {
    /// Creates an event of the given kind with no ids attached.
    pub fn new(kind: DeskEventKind) -> Self {
        Self {
            kind,
            conversation_id: None,
            ticket_id: None,
            agent_id: None,
            sequence: None,
            occurred_at: Timestamp::now(),
            hint: JsonValue::Null,
        }
    }

    /// Builder: attach the conversation.
    pub fn for_conversation(mut self, id: ConversationId) -> Self {
        self.conversation_id = Some(id);
        self
    }

    /// Builder: attach the ticket.
    pub fn for_ticket(mut self, id: TicketId) -> Self {
        self.ticket_id = Some(id);
        self
    }

    /// Builder: attach the agent.
    pub fn for_agent(mut self, id: AgentId) -> Self {
        self.agent_id = Some(id);
        self
    }

    /// Builder: attach the audit sequence.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Builder: attach hint fields.
    pub fn with_hint(mut self, hint: JsonValue) -> Self {
        self.hint = hint;
        self
    }

    /// Returns the `data` object sent to operator clients.
    pub fn data(&self) -> JsonValue {
        let mut data = serde_json::Map::new();
        if let Some(id) = self.conversation_id {
            data.insert("conversation_id".into(), JsonValue::String(id.to_string()));
        }
        if let Some(id) = self.ticket_id {
            data.insert("ticket_id".into(), JsonValue::String(id.to_string()));
        }
        if let Some(id) = self.agent_id {
            data.insert("agent_id".into(), JsonValue::String(id.to_string()));
        }
        if let Some(seq) = self.sequence {
            data.insert("sequence".into(), JsonValue::from(seq));
        }
        data.insert(
            "occurred_at".into(),
            JsonValue::String(self.occurred_at.to_rfc3339()),
        );
        if let JsonValue::Object(extra) = &self.hint {
            for (key, value) in extra {
                data.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        JsonValue::Object(data)
    }
}
