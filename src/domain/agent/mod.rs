//! Agent domain module.
//!
//! Human operators who claim escalated conversations. Agents are never
//! deleted; going `offline` is how they are deactivated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    AgentId, DomainError, ErrorCode, StateMachine, Timestamp, ValidationError,
};

/// Maximum agent display name length.
pub const MAX_NAME_LENGTH: usize = 120;

/// Availability of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Accepts new conversations.
    Available,
    /// Keeps current conversations, takes no new ones.
    Busy,
    /// Deactivated.
    Offline,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Available => "available",
            AgentStatus::Busy => "busy",
            AgentStatus::Offline => "offline",
        }
    }
}

impl StateMachine for AgentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        self != target
    }

    fn valid_transitions(&self) -> Vec<Self> {
        [AgentStatus::Available, AgentStatus::Busy, AgentStatus::Offline]
            .into_iter()
            .filter(|s| s != self)
            .collect()
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(AgentStatus::Available),
            "busy" => Ok(AgentStatus::Busy),
            "offline" => Ok(AgentStatus::Offline),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown agent status '{}'", other),
            )),
        }
    }
}

/// A human support agent with a live count of owned conversations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    id: AgentId,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    status: AgentStatus,
    active_conversations: u32,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl Agent {
    /// Registers a new agent, initially `offline` with no load.
    ///
    /// # Errors
    ///
    /// - `EmptyField` / `OutOfRange` for a blank or oversized name
    /// - `InvalidFormat` for an email without `@`
    pub fn register(
        name: impl Into<String>,
        email: Option<String>,
        phone: Option<String>,
    ) -> Result<Self, ValidationError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::empty_field("name"));
        }
        let len = name.chars().count();
        if len > MAX_NAME_LENGTH {
            return Err(ValidationError::out_of_range(
                "name",
                1,
                MAX_NAME_LENGTH as i32,
                len.min(i32::MAX as usize) as i32,
            ));
        }
        let email = email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
        if let Some(e) = &email {
            if !e.contains('@') {
                return Err(ValidationError::invalid_format("email", "missing '@'"));
            }
        }
        let now = Timestamp::now();
        Ok(Self {
            id: AgentId::new(),
            name,
            email,
            phone: phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            status: AgentStatus::Offline,
            active_conversations: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Reconstitute an agent from persistence.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: AgentId,
        name: String,
        email: Option<String>,
        phone: Option<String>,
        status: AgentStatus,
        active_conversations: u32,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id,
            name,
            email,
            phone,
            status,
            active_conversations,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    pub fn active_conversations(&self) -> u32 {
        self.active_conversations
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    pub fn is_available(&self) -> bool {
        self.status == AgentStatus::Available
    }

    /// Changes availability. Returns the previous status.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` if the status is unchanged
    pub fn set_status(&mut self, status: AgentStatus) -> Result<AgentStatus, DomainError> {
        let previous = self.status;
        self.status = self.status.transition_to(status)?;
        self.updated_at = Timestamp::now();
        Ok(previous)
    }

    /// Applies a load delta.
    ///
    /// # Errors
    ///
    /// - `AgentUnavailable` when taking load while not `available`
    /// - `InternalError` when the counter would go negative or overflow
    pub fn adjust_load(&mut self, delta: i32, require_available: bool) -> Result<(), DomainError> {
        if require_available && !self.is_available() {
            return Err(DomainError::new(
                ErrorCode::AgentUnavailable,
                format!("Agent {} is {}", self.id, self.status),
            ));
        }
        let next = i64::from(self.active_conversations) + i64::from(delta);
        self.active_conversations = u32::try_from(next).map_err(|_| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Load counter for agent {} would become {}", self.id, next),
            )
        })?;
        self.updated_at = Timestamp::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> Agent {
        Agent::register("Dana", Some("dana@desk.io".into()), None).unwrap()
    }

    #[test]
    fn registered_agent_starts_offline_with_no_load() {
        let a = agent();
        assert_eq!(a.status(), AgentStatus::Offline);
        assert_eq!(a.active_conversations(), 0);
    }

    #[test]
    fn invalid_email_is_rejected() {
        let err = Agent::register("Dana", Some("nope".into()), None).unwrap_err();
        assert_eq!(err.field(), "email");
    }

    #[test]
    fn status_change_to_same_status_fails() {
        let mut a = agent();
        assert!(a.set_status(AgentStatus::Offline).is_err());
        assert_eq!(a.set_status(AgentStatus::Available).unwrap(), AgentStatus::Offline);
    }

    #[test]
    fn taking_load_requires_availability() {
        let mut a = agent();
        let err = a.adjust_load(1, true).unwrap_err();
        assert_eq!(err.code, ErrorCode::AgentUnavailable);

        a.set_status(AgentStatus::Available).unwrap();
        a.adjust_load(1, true).unwrap();
        assert_eq!(a.active_conversations(), 1);
    }

    #[test]
    fn releasing_load_works_while_busy() {
        let mut a = agent();
        a.set_status(AgentStatus::Available).unwrap();
        a.adjust_load(1, true).unwrap();
        a.set_status(AgentStatus::Busy).unwrap();
        a.adjust_load(-1, false).unwrap();
        assert_eq!(a.active_conversations(), 0);
    }

    #[test]
    fn load_never_goes_negative() {
        let mut a = agent();
        let err = a.adjust_load(-1, false).unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert_eq!(a.active_conversations(), 0);
    }
}
