//! Conversation messages. Append-only.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{ConversationId, MessageId, Timestamp, ValidationError};

/// Maximum stored message length in characters.
pub const MAX_CONTENT_LENGTH: usize = 10_000;

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    Customer,
    Ai,
    Agent,
}

impl SenderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderKind::Customer => "customer",
            SenderKind::Ai => "ai",
            SenderKind::Agent => "agent",
        }
    }
}

impl fmt::Display for SenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SenderKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(SenderKind::Customer),
            "ai" => Ok(SenderKind::Ai),
            "agent" => Ok(SenderKind::Agent),
            other => Err(ValidationError::invalid_format(
                "sender",
                format!("unknown sender '{}'", other),
            )),
        }
    }
}

/// A single immutable message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: SenderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    pub content: String,
    pub created_at: Timestamp,
}

impl Message {
    /// Creates a message, validating content.
    ///
    /// # Errors
    ///
    /// - `EmptyField` if content is blank
    /// - `OutOfRange` if content exceeds [`MAX_CONTENT_LENGTH`]
    pub fn new(
        conversation_id: ConversationId,
        sender: SenderKind,
        sender_name: Option<String>,
        content: impl Into<String>,
        created_at: Timestamp,
    ) -> Result<Self, ValidationError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(ValidationError::empty_field("content"));
        }
        let len = content.chars().count();
        if len > MAX_CONTENT_LENGTH {
            return Err(ValidationError::out_of_range(
                "content",
                1,
                MAX_CONTENT_LENGTH as i32,
                len.min(i32::MAX as usize) as i32,
            ));
        }
        Ok(Self {
            id: MessageId::new(),
            conversation_id,
            sender,
            sender_name,
            content,
            created_at,
        })
    }

    /// Short single-line preview for fan-out hints and log lines.
    pub fn preview(&self, max_chars: usize) -> String {
        let flat: String = self
            .content
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        if flat.chars().count() <= max_chars {
            flat
        } else {
            let mut cut: String = flat.chars().take(max_chars).collect();
            cut.push('…');
            cut
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_content_is_rejected() {
        let err = Message::new(
            ConversationId::new(),
            SenderKind::Customer,
            None,
            "   ",
            Timestamp::now(),
        )
        .unwrap_err();
        assert_eq!(err.field(), "content");
    }

    #[test]
    fn oversized_content_is_rejected() {
        let long = "x".repeat(MAX_CONTENT_LENGTH + 1);
        assert!(Message::new(
            ConversationId::new(),
            SenderKind::Agent,
            None,
            long,
            Timestamp::now()
        )
        .is_err());
    }

    #[test]
    fn preview_truncates_and_flattens() {
        let msg = Message::new(
            ConversationId::new(),
            SenderKind::Customer,
            Some("Ana".into()),
            "line one\nline two",
            Timestamp::now(),
        )
        .unwrap();
        assert_eq!(msg.preview(8), "line one…");
        assert_eq!(msg.preview(100), "line one line two");
    }

    #[test]
    fn sender_round_trips_through_str() {
        for sender in [SenderKind::Customer, SenderKind::Ai, SenderKind::Agent] {
            assert_eq!(sender.as_str().parse::<SenderKind>().unwrap(), sender);
        }
    }
}
