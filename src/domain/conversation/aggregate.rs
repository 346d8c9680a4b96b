//! Conversation aggregate entity.
//!
//! A conversation is created by the first inbound message from a
//! channel-native user and is owned at any instant by at most one handler:
//! the AI (`open`, not escalated), nobody (`open`, escalation pending), or
//! exactly one agent (`assigned`).
//!
//! # Versioning
//!
//! Every mutation bumps `version`. Stores compare the version a command
//! loaded against the stored one at commit time, and the AI responder
//! discards replies computed against an older version.

use serde::{Deserialize, Serialize};

use super::{Channel, ConversationStatus, CustomerIdentity};
use crate::domain::foundation::{
    AgentId, ConversationId, DomainError, ErrorCode, StateMachine, Timestamp,
};

/// Maximum stored escalation reason length.
pub const MAX_REASON_LENGTH: usize = 500;

/// Escalation reason set when a customer writes back on an open ticket.
pub const TICKET_FOLLOW_UP_REASON: &str = "Customer replied to an open ticket";

/// Result of a successful `assign`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOutcome {
    /// An escalation-pending conversation was claimed.
    Claimed { agent: AgentId },
    /// Ownership moved from one agent to another.
    Transferred { from: AgentId, to: AgentId },
}

impl AssignOutcome {
    /// The agent that owns the conversation afterwards.
    pub fn owner(&self) -> AgentId {
        match self {
            AssignOutcome::Claimed { agent } => *agent,
            AssignOutcome::Transferred { to, .. } => *to,
        }
    }
}

/// Conversation aggregate.
///
/// # Invariants
///
/// - `assigned_agent.is_some()` iff `status == Assigned`
/// - `escalated_at` is only set while `status == Open`
/// - `version` strictly increases with every mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    id: ConversationId,
    channel: Channel,
    customer: CustomerIdentity,
    status: ConversationStatus,
    assigned_agent: Option<AgentId>,
    escalated_at: Option<Timestamp>,
    escalation_reason: Option<String>,
    last_message_at: Timestamp,
    created_at: Timestamp,
    updated_at: Timestamp,
    version: u64,
}

impl Conversation {
    /// Starts a new AI-handled conversation.
    pub fn start(channel: Channel, customer: CustomerIdentity, at: Timestamp) -> Self {
        Self {
            id: ConversationId::new(),
            channel,
            customer,
            status: ConversationStatus::Open,
            assigned_agent: None,
            escalated_at: None,
            escalation_reason: None,
            last_message_at: at,
            created_at: at,
            updated_at: at,
            version: 1,
        }
    }

    /// Reconstitute a conversation from persistence (no validation).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: ConversationId,
        channel: Channel,
        customer: CustomerIdentity,
        status: ConversationStatus,
        assigned_agent: Option<AgentId>,
        escalated_at: Option<Timestamp>,
        escalation_reason: Option<String>,
        last_message_at: Timestamp,
        created_at: Timestamp,
        updated_at: Timestamp,
        version: u64,
    ) -> Self {
        Self {
            id,
            channel,
            customer,
            status,
            assigned_agent,
            escalated_at,
            escalation_reason,
            last_message_at,
            created_at,
            updated_at,
            version,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> ConversationId {
        self.id
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn customer(&self) -> &CustomerIdentity {
        &self.customer
    }

    pub fn status(&self) -> ConversationStatus {
        self.status
    }

    pub fn assigned_agent(&self) -> Option<AgentId> {
        self.assigned_agent
    }

    pub fn escalated_at(&self) -> Option<&Timestamp> {
        self.escalated_at.as_ref()
    }

    pub fn escalation_reason(&self) -> Option<&str> {
        self.escalation_reason.as_deref()
    }

    pub fn last_message_at(&self) -> &Timestamp {
        &self.last_message_at
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ownership queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Open and not escalated: the AI responds to new messages.
    pub fn is_ai_handled(&self) -> bool {
        self.status == ConversationStatus::Open && self.escalated_at.is_none()
    }

    /// Open, escalated, and waiting for an agent to claim it.
    pub fn is_escalation_pending(&self) -> bool {
        self.status == ConversationStatus::Open && self.escalated_at.is_some()
    }

    /// Checks the status/owner invariant.
    pub fn owner_invariant_holds(&self) -> bool {
        let assigned = self.status == ConversationStatus::Assigned;
        let escalation_ok = self.escalated_at.is_none() || self.status == ConversationStatus::Open;
        assigned == self.assigned_agent.is_some() && escalation_ok
    }

    /// Validates that `agent` currently owns this conversation.
    ///
    /// # Errors
    ///
    /// - `OwnerMismatch` if the conversation is owned by someone else or nobody
    pub fn ensure_owned_by(&self, agent: AgentId) -> Result<(), DomainError> {
        match self.assigned_agent {
            Some(owner) if owner == agent => Ok(()),
            Some(owner) => Err(DomainError::new(
                ErrorCode::OwnerMismatch,
                format!("Conversation {} is owned by agent {}", self.id, owner),
            )),
            None => Err(DomainError::new(
                ErrorCode::OwnerMismatch,
                format!("Conversation {} is not assigned to an agent", self.id),
            )),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Records a customer message. A closed conversation reopens to `open`
    /// with the escalation cleared, handing it back to the AI.
    ///
    /// Returns `true` when the conversation was reopened.
    pub fn record_customer_message(&mut self, at: Timestamp) -> Result<bool, DomainError> {
        let reopened = if self.status.is_closed() {
            self.status = self.status.transition_to(ConversationStatus::Open)?;
            self.escalated_at = None;
            self.escalation_reason = None;
            true
        } else {
            false
        };
        self.last_message_at = at;
        self.touch(at);
        Ok(reopened)
    }

    /// Records a customer message on a conversation that still has an open
    /// ticket. A closed conversation reopens straight into the agent queue
    /// instead of back to the AI.
    ///
    /// Returns `true` when the conversation was reopened.
    pub fn record_ticket_follow_up(&mut self, at: Timestamp) -> Result<bool, DomainError> {
        let reopened = self.record_customer_message(at)?;
        if reopened {
            self.escalated_at = Some(at);
            self.escalation_reason = Some(TICKET_FOLLOW_UP_REASON.to_string());
        }
        Ok(reopened)
    }

    /// Records an AI or agent reply.
    pub fn record_reply(&mut self, at: Timestamp) {
        self.last_message_at = at;
        self.touch(at);
    }

    /// Abandons AI handling; the conversation stays `open` without owner.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` if not `open` or already escalated
    /// - `ValidationFailed` if the reason is too long
    pub fn escalate(&mut self, reason: Option<String>, at: Timestamp) -> Result<(), DomainError> {
        if self.status != ConversationStatus::Open {
            return Err(DomainError::invalid_transition(self.status, "Escalated"));
        }
        if self.escalated_at.is_some() {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Conversation {} is already awaiting an agent", self.id),
            ));
        }
        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        if let Some(r) = &reason {
            if r.chars().count() > MAX_REASON_LENGTH {
                return Err(DomainError::validation(
                    "reason",
                    format!("Reason must be at most {} characters", MAX_REASON_LENGTH),
                ));
            }
        }
        self.escalated_at = Some(at);
        self.escalation_reason = reason;
        self.touch(at);
        Ok(())
    }

    /// Claims (no expected owner) or transfers (expected owner given).
    ///
    /// # Errors
    ///
    /// - `AlreadyClaimed` if a claim races an existing owner
    /// - `OwnerMismatch` if the expected owner is not the current owner
    /// - `InvalidStateTransition` if the conversation is not escalated or is closed
    /// - `ValidationFailed` if transferring to the current owner
    pub fn assign(
        &mut self,
        agent: AgentId,
        expected_owner: Option<AgentId>,
        at: Timestamp,
    ) -> Result<AssignOutcome, DomainError> {
        let outcome = match (self.status, self.assigned_agent, expected_owner) {
            (ConversationStatus::Open, _, Some(expected)) => {
                return Err(DomainError::new(
                    ErrorCode::OwnerMismatch,
                    format!(
                        "Expected owner {} but conversation {} has no owner",
                        expected, self.id
                    ),
                ));
            }
            (ConversationStatus::Open, _, None) => {
                if self.escalated_at.is_none() {
                    return Err(DomainError::new(
                        ErrorCode::InvalidStateTransition,
                        format!("Conversation {} is handled by AI and not escalated", self.id),
                    ));
                }
                AssignOutcome::Claimed { agent }
            }
            (ConversationStatus::Assigned, Some(owner), None) => {
                return Err(DomainError::new(
                    ErrorCode::AlreadyClaimed,
                    format!("Conversation {} was already claimed", self.id),
                )
                .with_detail("owner", owner.to_string()));
            }
            (ConversationStatus::Assigned, Some(owner), Some(expected)) => {
                if owner != expected {
                    return Err(DomainError::new(
                        ErrorCode::OwnerMismatch,
                        format!("Conversation {} is no longer owned by {}", self.id, expected),
                    )
                    .with_detail("owner", owner.to_string()));
                }
                if owner == agent {
                    return Err(DomainError::validation(
                        "agent_id",
                        "Conversation is already assigned to this agent",
                    ));
                }
                AssignOutcome::Transferred { from: owner, to: agent }
            }
            (status, _, _) => {
                return Err(DomainError::invalid_transition(status, ConversationStatus::Assigned));
            }
        };

        self.status = self.status.transition_to(ConversationStatus::Assigned)?;
        self.assigned_agent = Some(agent);
        self.escalated_at = None;
        self.touch(at);
        Ok(outcome)
    }

    /// Marks an assigned conversation resolved, releasing its owner.
    ///
    /// Returns the agent whose load must be decremented.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` if not `assigned`
    pub fn resolve(&mut self, at: Timestamp) -> Result<AgentId, DomainError> {
        self.status = self.status.transition_to(ConversationStatus::Resolved)?;
        let owner = self.assigned_agent.take().ok_or_else(|| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Assigned conversation {} has no owner", self.id),
            )
        })?;
        self.touch(at);
        Ok(owner)
    }

    /// Converts the conversation to a ticket, releasing any owner.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` if already `resolved` or `ticket`
    pub fn convert_to_ticket(&mut self, at: Timestamp) -> Result<Option<AgentId>, DomainError> {
        self.status = self.status.transition_to(ConversationStatus::Ticket)?;
        self.escalated_at = None;
        let released = self.assigned_agent.take();
        self.touch(at);
        Ok(released)
    }

    fn touch(&mut self, at: Timestamp) {
        self.version += 1;
        self.updated_at = at;
    }
}
