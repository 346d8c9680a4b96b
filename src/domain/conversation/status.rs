//! Conversation lifecycle status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};

/// Status of a conversation.
///
/// ```text
/// open ──► assigned ──► resolved
///   │         │  ▲ (transfer)
///   │         └──┘
///   └─────────┴──► ticket
/// resolved / ticket ──► open   (new inbound message reopens)
/// ```
///
/// `open` is AI-owned until escalated; an escalated `open` conversation is
/// ownerless until an agent claims it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Open,
    Assigned,
    Resolved,
    Ticket,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Open => "open",
            ConversationStatus::Assigned => "assigned",
            ConversationStatus::Resolved => "resolved",
            ConversationStatus::Ticket => "ticket",
        }
    }

    /// Closed for the current handling cycle. Only a new customer
    /// message leaves these states.
    pub fn is_closed(&self) -> bool {
        matches!(self, ConversationStatus::Resolved | ConversationStatus::Ticket)
    }
}

impl StateMachine for ConversationStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConversationStatus::*;
        match self {
            Open => vec![Assigned, Ticket],
            Assigned => vec![Assigned, Resolved, Ticket],
            Resolved => vec![Open],
            Ticket => vec![Open],
        }
    }

    fn is_terminal(&self) -> bool {
        self.is_closed()
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ConversationStatus::Open),
            "assigned" => Ok(ConversationStatus::Assigned),
            "resolved" => Ok(ConversationStatus::Resolved),
            "ticket" => Ok(ConversationStatus::Ticket),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown conversation status '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConversationStatus::*;

    #[test]
    fn open_can_be_claimed_or_ticketed() {
        assert!(Open.can_transition_to(&Assigned));
        assert!(Open.can_transition_to(&Ticket));
        assert!(!Open.can_transition_to(&Resolved));
    }

    #[test]
    fn assigned_allows_transfer_to_itself() {
        assert!(Assigned.can_transition_to(&Assigned));
    }

    #[test]
    fn closed_states_only_reopen() {
        assert_eq!(Resolved.valid_transitions(), vec![Open]);
        assert_eq!(Ticket.valid_transitions(), vec![Open]);
        assert!(Resolved.is_terminal());
        assert!(Ticket.is_terminal());
        assert!(!Assigned.is_terminal());
    }

    #[test]
    fn resolved_cannot_be_resolved_again() {
        assert!(Resolved.transition_to(Resolved).is_err());
    }

    #[test]
    fn parses_storage_names() {
        for status in [Open, Assigned, Resolved, Ticket] {
            assert_eq!(status.as_str().parse::<ConversationStatus>().unwrap(), status);
        }
    }
}
