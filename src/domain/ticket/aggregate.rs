//! Ticket aggregate.
//!
//! A ticket tracks a conversation that AI and agents could not close in
//! time. It has its own status, priority and turn-around-time target.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::audit::FieldDiff;
use crate::domain::foundation::{
    ConversationId, DomainError, StateMachine, TicketId, Timestamp, ValidationError,
};

/// Maximum title length.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum description length.
pub const MAX_DESCRIPTION_LENGTH: usize = 5_000;

/// Upper bound on a TAT target (90 days).
pub const MAX_TAT_MINUTES: u32 = 90 * 24 * 60;

/// Ticket priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
        }
    }

    /// Built-in TAT target in minutes.
    pub fn default_tat_minutes(&self) -> u32 {
        match self {
            TicketPriority::High => 240,
            TicketPriority::Medium => 1_440,
            TicketPriority::Low => 4_320,
        }
    }
}

impl Default for TicketPriority {
    fn default() -> Self {
        TicketPriority::Medium
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketPriority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TicketPriority::Low),
            "medium" => Ok(TicketPriority::Medium),
            "high" => Ok(TicketPriority::High),
            other => Err(ValidationError::invalid_format(
                "priority",
                format!("unknown priority '{}'", other),
            )),
        }
    }
}

/// Ticket status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
        }
    }
}

impl StateMachine for TicketStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use TicketStatus::*;
        match self {
            Open => vec![InProgress, Resolved],
            InProgress => vec![Open, Resolved],
            Resolved => vec![],
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "in_progress" => Ok(TicketStatus::InProgress),
            "resolved" => Ok(TicketStatus::Resolved),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown ticket status '{}'", other),
            )),
        }
    }
}

/// Fields supplied when opening a ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: TicketPriority,
    /// Overrides the priority's default TAT.
    #[serde(default)]
    pub tat_minutes: Option<u32>,
}

/// Partial update of a ticket. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<TicketPriority>,
    /// Only `open` and `in_progress`; resolving goes through `resolve`.
    #[serde(default)]
    pub status: Option<TicketStatus>,
    #[serde(default)]
    pub tat_minutes: Option<u32>,
}

/// Ticket aggregate.
///
/// # Invariants
///
/// - `resolved_at.is_some()` iff `status == Resolved`
/// - resolved tickets are immutable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    id: TicketId,
    conversation_id: ConversationId,
    title: String,
    description: Option<String>,
    priority: TicketPriority,
    status: TicketStatus,
    tat_minutes: u32,
    created_at: Timestamp,
    updated_at: Timestamp,
    resolved_at: Option<Timestamp>,
}

impl Ticket {
    /// Opens a ticket for a conversation.
    ///
    /// `default_tat` supplies the TAT for the priority when the caller gives
    /// none.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` for a blank/oversized title or description or an
    ///   out-of-range TAT
    pub fn open(
        conversation_id: ConversationId,
        fields: NewTicket,
        default_tat: impl Fn(TicketPriority) -> u32,
        at: Timestamp,
    ) -> Result<Self, DomainError> {
        let title = validate_title(&fields.title)?;
        let description = validate_description(fields.description)?;
        let tat_minutes = match fields.tat_minutes {
            Some(tat) => validate_tat(tat)?,
            None => default_tat(fields.priority),
        };
        Ok(Self {
            id: TicketId::new(),
            conversation_id,
            title,
            description,
            priority: fields.priority,
            status: TicketStatus::Open,
            tat_minutes,
            created_at: at,
            updated_at: at,
            resolved_at: None,
        })
    }

    /// Reconstitute a ticket from persistence.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: TicketId,
        conversation_id: ConversationId,
        title: String,
        description: Option<String>,
        priority: TicketPriority,
        status: TicketStatus,
        tat_minutes: u32,
        created_at: Timestamp,
        updated_at: Timestamp,
        resolved_at: Option<Timestamp>,
    ) -> Self {
        Self {
            id,
            conversation_id,
            title,
            description,
            priority,
            status,
            tat_minutes,
            created_at,
            updated_at,
            resolved_at,
        }
    }

    pub fn id(&self) -> TicketId {
        self.id
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn priority(&self) -> TicketPriority {
        self.priority
    }

    pub fn status(&self) -> TicketStatus {
        self.status
    }

    pub fn tat_minutes(&self) -> u32 {
        self.tat_minutes
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    pub fn resolved_at(&self) -> Option<&Timestamp> {
        self.resolved_at.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.status != TicketStatus::Resolved
    }

    /// Deadline implied by the TAT target.
    pub fn due_at(&self) -> Timestamp {
        self.created_at.plus_minutes(i64::from(self.tat_minutes))
    }

    /// An unresolved ticket past its TAT deadline.
    pub fn is_overdue(&self, now: &Timestamp) -> bool {
        self.is_open() && now.is_after(&self.due_at())
    }

    /// Applies a partial update and returns the field diff.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` on a resolved ticket, or when `status`
    ///   asks for `resolved` or an illegal edge
    /// - `ValidationFailed` for invalid field values
    pub fn apply_update(&mut self, update: TicketUpdate, at: Timestamp) -> Result<FieldDiff, DomainError> {
        if self.status == TicketStatus::Resolved {
            return Err(DomainError::invalid_transition(self.status, "Updated"));
        }

        let mut diff = FieldDiff::new();

        if let Some(title) = update.title {
            let title = validate_title(&title)?;
            diff = diff.field("title", &self.title, &title);
            self.title = title;
        }
        if let Some(description) = update.description {
            let description = validate_description(Some(description))?;
            diff = diff.field("description", &self.description, &description);
            self.description = description;
        }
        if let Some(priority) = update.priority {
            diff = diff.field("priority", &self.priority, &priority);
            self.priority = priority;
        }
        if let Some(tat) = update.tat_minutes {
            let tat = validate_tat(tat)?;
            diff = diff.field("tat_minutes", &self.tat_minutes, &tat);
            self.tat_minutes = tat;
        }
        if let Some(status) = update.status {
            if status == TicketStatus::Resolved {
                return Err(DomainError::validation(
                    "status",
                    "Use the resolve operation to resolve a ticket",
                ));
            }
            if status != self.status {
                let next = self.status.transition_to(status)?;
                diff = diff.field("status", &self.status, &next);
                self.status = next;
            }
        }

        if !diff.is_empty() {
            self.updated_at = at;
        }
        Ok(diff)
    }

    /// Resolves the ticket. Returns `false` when it was already resolved.
    pub fn resolve(&mut self, at: Timestamp) -> Result<bool, DomainError> {
        if self.status == TicketStatus::Resolved {
            return Ok(false);
        }
        self.status = self.status.transition_to(TicketStatus::Resolved)?;
        self.resolved_at = Some(at);
        self.updated_at = at;
        Ok(true)
    }
}

fn validate_title(title: &str) -> Result<String, DomainError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::empty_field("title").into());
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(DomainError::validation(
            "title",
            format!("Title must be at most {} characters", MAX_TITLE_LENGTH),
        ));
    }
    Ok(title.to_string())
}

fn validate_description(description: Option<String>) -> Result<Option<String>, DomainError> {
    let description = description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    if let Some(d) = &description {
        if d.chars().count() > MAX_DESCRIPTION_LENGTH {
            return Err(DomainError::validation(
                "description",
                format!("Description must be at most {} characters", MAX_DESCRIPTION_LENGTH),
            ));
        }
    }
    Ok(description)
}

fn validate_tat(tat: u32) -> Result<u32, DomainError> {
    if tat == 0 || tat > MAX_TAT_MINUTES {
        return Err(ValidationError::out_of_range(
            "tat_minutes",
            1,
            MAX_TAT_MINUTES as i32,
            tat.min(i32::MAX as u32) as i32,
        )
        .into());
    }
    Ok(tat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    fn new_ticket(priority: TicketPriority) -> Ticket {
        Ticket::open(
            ConversationId::new(),
            NewTicket {
                title: "Refund not received".into(),
                description: Some("Order 1234".into()),
                priority,
                tat_minutes: None,
            },
            |p| p.default_tat_minutes(),
            Timestamp::now(),
        )
        .unwrap()
    }

    #[test]
    fn default_tat_follows_priority() {
        assert_eq!(new_ticket(TicketPriority::High).tat_minutes(), 240);
        assert_eq!(new_ticket(TicketPriority::Medium).tat_minutes(), 1_440);
        assert_eq!(new_ticket(TicketPriority::Low).tat_minutes(), 4_320);
    }

    #[test]
    fn blank_title_is_rejected() {
        let err = Ticket::open(
            ConversationId::new(),
            NewTicket {
                title: " ".into(),
                ..NewTicket::default()
            },
            |p| p.default_tat_minutes(),
            Timestamp::now(),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[test]
    fn zero_tat_is_rejected() {
        let result = Ticket::open(
            ConversationId::new(),
            NewTicket {
                title: "t".into(),
                tat_minutes: Some(0),
                ..NewTicket::default()
            },
            |p| p.default_tat_minutes(),
            Timestamp::now(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn overdue_after_tat_elapses() {
        let ticket = new_ticket(TicketPriority::High);
        let created = *ticket.created_at();
        assert!(!ticket.is_overdue(&created.plus_minutes(239)));
        assert!(ticket.is_overdue(&created.plus_minutes(241)));
    }

    #[test]
    fn resolved_ticket_is_never_overdue() {
        let mut ticket = new_ticket(TicketPriority::High);
        ticket.resolve(Timestamp::now()).unwrap();
        assert!(!ticket.is_overdue(&ticket.created_at().plus_minutes(10_000)));
    }

    #[test]
    fn update_returns_only_changed_fields() {
        let mut ticket = new_ticket(TicketPriority::Low);
        let diff = ticket
            .apply_update(
                TicketUpdate {
                    title: Some("Refund not received".into()),
                    priority: Some(TicketPriority::High),
                    status: Some(TicketStatus::InProgress),
                    ..TicketUpdate::default()
                },
                Timestamp::now(),
            )
            .unwrap();
        let fields: Vec<_> = diff.into_changes().into_iter().map(|c| c.field).collect();
        assert_eq!(fields, vec!["priority", "status"]);
        assert_eq!(ticket.status(), TicketStatus::InProgress);
    }

    #[test]
    fn update_cannot_resolve() {
        let mut ticket = new_ticket(TicketPriority::Low);
        let err = ticket
            .apply_update(
                TicketUpdate {
                    status: Some(TicketStatus::Resolved),
                    ..TicketUpdate::default()
                },
                Timestamp::now(),
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut ticket = new_ticket(TicketPriority::Medium);
        assert!(ticket.resolve(Timestamp::now()).unwrap());
        let first = *ticket.resolved_at().unwrap();
        assert!(!ticket.resolve(Timestamp::now()).unwrap());
        assert_eq!(ticket.resolved_at(), Some(&first));
        assert_eq!(ticket.status(), TicketStatus::Resolved);
    }

    #[test]
    fn resolved_ticket_rejects_updates() {
        let mut ticket = new_ticket(TicketPriority::Medium);
        ticket.resolve(Timestamp::now()).unwrap();
        let err = ticket
            .apply_update(TicketUpdate::default(), Timestamp::now())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }
}
