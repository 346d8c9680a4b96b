//! Operator stream protocol.
//!
//! Every frame in both directions is `{"type": ..., "data": ...}`.
//!
//! Server → client types are the desk event kinds (`new_chat`, `message`,
//! `chat_accepted`, `status_update`, `escalation`, `assignment`, `typing`)
//! plus the session frames `connected`, `pong`, `resync` and `error`.
//!
//! Client → server types are `typing` and `ping` only; state changes go
//! through the HTTP API.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::domain::foundation::{AgentId, ConversationId, DeskEvent, Timestamp};

/// One server → client frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: JsonValue,
}

impl ServerFrame {
    fn new(kind: &str, data: JsonValue) -> Self {
        Self {
            kind: kind.to_string(),
            data,
        }
    }

    pub fn connected(session_id: &str) -> Self {
        Self::new(
            "connected",
            json!({ "session_id": session_id, "timestamp": Timestamp::now().to_rfc3339() }),
        )
    }

    /// A desk event; `data` is the event without its kind.
    pub fn event(event: &DeskEvent) -> Result<Self, serde_json::Error> {
        let mut data = serde_json::to_value(event)?;
        if let Some(map) = data.as_object_mut() {
            map.remove("kind");
        }
        Ok(Self::new(event.kind.as_str(), data))
    }

    pub fn pong() -> Self {
        Self::new("pong", json!({ "timestamp": Timestamp::now().to_rfc3339() }))
    }

    /// The session fell behind and `missed` events were dropped; the client
    /// should re-read state over HTTP.
    pub fn resync(missed: u64) -> Self {
        Self::new("resync", json!({ "missed": missed }))
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new("error", json!({ "code": code, "message": message.into() }))
    }
}

/// Client → server frames.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    /// An operator is typing in a conversation.
    Typing(TypingSignal),
    Ping,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypingSignal {
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub agent_id: Option<AgentId>,
}
