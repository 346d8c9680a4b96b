//! Command context carried through every engine operation.
//!
//! Instead of each operation accepting `actor: String, correlation_id:
//! Option<String>, source: ...` separately, they accept one `Actor`. The
//! actor name ends up on the audit entry written by the operation.

use serde::{Deserialize, Serialize};

use super::{AgentId, ValidationError};

/// Who (or what) initiated a state-changing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Display name recorded on audit entries.
    pub name: String,

    /// The agent behind the action, when a human operator initiated it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,

    /// Links related operations across a single request.
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,

    /// Source of the command (e.g., "api", "webhook", "sweeper").
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

impl Actor {
    /// Creates an actor with a display name.
    ///
    /// # Errors
    ///
    /// `EmptyField` when the name is blank.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::empty_field("actor"));
        }
        Ok(Self {
            name,
            agent_id: None,
            correlation_id: None,
            source: None,
        })
    }

    /// The engine acting on its own behalf (sweeper, escalation policy).
    pub fn system() -> Self {
        Self {
            name: "system".to_string(),
            agent_id: None,
            correlation_id: None,
            source: Some("engine".to_string()),
        }
    }

    /// The AI responder.
    pub fn ai() -> Self {
        Self {
            name: "ai".to_string(),
            agent_id: None,
            correlation_id: None,
            source: Some("ai".to_string()),
        }
    }

    /// A customer writing through a channel.
    pub fn customer(display_name: impl Into<String>) -> Self {
        Self {
            name: display_name.into(),
            agent_id: None,
            correlation_id: None,
            source: Some("channel".to_string()),
        }
    }

    /// Builder: attach the operating agent.
    pub fn with_agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    /// Builder: add correlation ID for request tracing.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Builder: add source identifier.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns the correlation ID, or "none".
    pub fn correlation_id(&self) -> &str {
        self.correlation_id.as_deref().unwrap_or("none")
    }

    /// Returns the source, if set.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}
