//! Audit domain module.
//!
//! Every state-changing operation produces exactly one [`AuditRecord`],
//! committed in the same transaction as the change. The store assigns a
//! global, strictly increasing sequence number on append and hands back an
//! [`AuditLogEntry`]; fan-out events carry that sequence.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::foundation::{
    Actor, AgentId, ConversationId, CsatId, TicketId, Timestamp, ValidationError,
};

/// Kind of state change being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    MessageReceived,
    EmailReplyReceived,
    AiReplied,
    Escalated,
    Assigned,
    Transferred,
    StatusChanged,
    Updated,
    ResolutionSent,
    CsatRecorded,
    AgentReplied,
    DeliveryFailed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::MessageReceived => "message_received",
            AuditAction::EmailReplyReceived => "email_reply_received",
            AuditAction::AiReplied => "ai_replied",
            AuditAction::Escalated => "escalated",
            AuditAction::Assigned => "assigned",
            AuditAction::Transferred => "transferred",
            AuditAction::StatusChanged => "status_changed",
            AuditAction::Updated => "updated",
            AuditAction::ResolutionSent => "resolution_sent",
            AuditAction::CsatRecorded => "csat_recorded",
            AuditAction::AgentReplied => "agent_replied",
            AuditAction::DeliveryFailed => "delivery_failed",
        }
    }

    const ALL: [AuditAction; 13] = [
        AuditAction::Created,
        AuditAction::MessageReceived,
        AuditAction::EmailReplyReceived,
        AuditAction::AiReplied,
        AuditAction::Escalated,
        AuditAction::Assigned,
        AuditAction::Transferred,
        AuditAction::StatusChanged,
        AuditAction::Updated,
        AuditAction::ResolutionSent,
        AuditAction::CsatRecorded,
        AuditAction::AgentReplied,
        AuditAction::DeliveryFailed,
    ];
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ValidationError::invalid_format("action", format!("unknown action '{}'", s)))
    }
}

/// Entity an audit record is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "entity_type", content = "entity_id", rename_all = "snake_case")]
pub enum EntityRef {
    Conversation(ConversationId),
    Ticket(TicketId),
    Agent(AgentId),
    Csat(CsatId),
}

impl EntityRef {
    pub fn kind(&self) -> &'static str {
        match self {
            EntityRef::Conversation(_) => "conversation",
            EntityRef::Ticket(_) => "ticket",
            EntityRef::Agent(_) => "agent",
            EntityRef::Csat(_) => "csat",
        }
    }

    pub fn uuid(&self) -> Uuid {
        match self {
            EntityRef::Conversation(id) => *id.as_uuid(),
            EntityRef::Ticket(id) => *id.as_uuid(),
            EntityRef::Agent(id) => *id.as_uuid(),
            EntityRef::Csat(id) => *id.as_uuid(),
        }
    }

    /// Rebuilds a reference from its stored parts.
    pub fn from_parts(kind: &str, id: Uuid) -> Result<Self, ValidationError> {
        match kind {
            "conversation" => Ok(EntityRef::Conversation(ConversationId::from_uuid(id))),
            "ticket" => Ok(EntityRef::Ticket(TicketId::from_uuid(id))),
            "agent" => Ok(EntityRef::Agent(AgentId::from_uuid(id))),
            "csat" => Ok(EntityRef::Csat(CsatId::from_uuid(id))),
            other => Err(ValidationError::invalid_format(
                "entity_type",
                format!("unknown entity '{}'", other),
            )),
        }
    }
}

/// Old/new value of one changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: JsonValue,
    pub new: JsonValue,
}

/// Builds the structured diff stored on an audit record. Unchanged fields
/// are skipped.
#[derive(Debug, Default, Clone)]
pub struct FieldDiff {
    changes: Vec<FieldChange>,
}

impl FieldDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `field` if `old != new`.
    pub fn field<T: Serialize + ?Sized>(mut self, field: &str, old: &T, new: &T) -> Self {
        let old = serde_json::to_value(old).unwrap_or(JsonValue::Null);
        let new = serde_json::to_value(new).unwrap_or(JsonValue::Null);
        if old != new {
            self.changes.push(FieldChange {
                field: field.to_string(),
                old,
                new,
            });
        }
        self
    }

    /// Records a value that did not exist before.
    pub fn added<T: Serialize + ?Sized>(mut self, field: &str, new: &T) -> Self {
        self.changes.push(FieldChange {
            field: field.to_string(),
            old: JsonValue::Null,
            new: serde_json::to_value(new).unwrap_or(JsonValue::Null),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn into_changes(self) -> Vec<FieldChange> {
        self.changes
    }
}

/// An audit record before the store assigns its sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub action: AuditAction,
    #[serde(flatten)]
    pub entity: EntityRef,
    /// Conversation the change belongs to, for per-conversation history.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
    pub changes: Vec<FieldChange>,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub occurred_at: Timestamp,
}

impl AuditRecord {
    /// Creates a record for `entity` attributed to `actor`.
    pub fn new(action: AuditAction, entity: EntityRef, actor: &Actor) -> Self {
        let conversation_id = match entity {
            EntityRef::Conversation(id) => Some(id),
            _ => None,
        };
        let correlation_id = match actor.correlation_id() {
            "none" => None,
            id => Some(id.to_string()),
        };
        Self {
            action,
            entity,
            conversation_id,
            changes: Vec::new(),
            actor: actor.name.clone(),
            correlation_id,
            occurred_at: Timestamp::now(),
        }
    }

    pub fn in_conversation(mut self, id: ConversationId) -> Self {
        self.conversation_id = Some(id);
        self
    }

    pub fn with_changes(mut self, diff: FieldDiff) -> Self {
        self.changes = diff.into_changes();
        self
    }
}

/// A committed, immutable audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Global append order; strictly increasing.
    pub sequence: u64,
    #[serde(flatten)]
    pub record: AuditRecord,
}

impl AuditLogEntry {
    pub fn action(&self) -> AuditAction {
        self.record.action
    }

    /// True if this entry is part of the conversation's history.
    pub fn concerns_conversation(&self, id: ConversationId) -> bool {
        self.record.conversation_id == Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diff_skips_unchanged_fields() {
        let diff = FieldDiff::new()
            .field("status", "open", "assigned")
            .field("channel", "widget", "widget");
        let changes = diff.into_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "status");
        assert_eq!(changes[0].old, json!("open"));
        assert_eq!(changes[0].new, json!("assigned"));
    }

    #[test]
    fn added_records_null_old_value() {
        let changes = FieldDiff::new().added("rating", &4).into_changes();
        assert_eq!(changes[0].old, JsonValue::Null);
        assert_eq!(changes[0].new, json!(4));
    }

    #[test]
    fn conversation_records_index_themselves() {
        let id = ConversationId::new();
        let record = AuditRecord::new(
            AuditAction::Escalated,
            EntityRef::Conversation(id),
            &Actor::system(),
        );
        assert_eq!(record.conversation_id, Some(id));
        assert_eq!(record.actor, "system");
        assert!(record.correlation_id.is_none());
    }

    #[test]
    fn ticket_records_can_be_linked_to_conversation() {
        let conversation = ConversationId::new();
        let record = AuditRecord::new(
            AuditAction::ResolutionSent,
            EntityRef::Ticket(TicketId::new()),
            &Actor::new("Dana").unwrap().with_correlation_id("req-9"),
        )
        .in_conversation(conversation);
        assert_eq!(record.conversation_id, Some(conversation));
        assert_eq!(record.correlation_id.as_deref(), Some("req-9"));
    }

    #[test]
    fn entity_ref_round_trips_through_parts() {
        let entity = EntityRef::Agent(AgentId::new());
        let back = EntityRef::from_parts(entity.kind(), entity.uuid()).unwrap();
        assert_eq!(back, entity);
    }

    #[test]
    fn action_names_parse() {
        assert_eq!(
            "email_reply_received".parse::<AuditAction>().unwrap(),
            AuditAction::EmailReplyReceived
        );
        assert!("deleted".parse::<AuditAction>().is_err());
    }

    #[test]
    fn entry_serializes_flat() {
        let id = ConversationId::new();
        let entry = AuditLogEntry {
            sequence: 7,
            record: AuditRecord::new(
                AuditAction::Created,
                EntityRef::Conversation(id),
                &Actor::system(),
            ),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["sequence"], json!(7));
        assert_eq!(value["action"], json!("created"));
        assert_eq!(value["entity_type"], json!("conversation"));
        assert_eq!(value["entity_id"], json!(id.to_string()));
    }
}
