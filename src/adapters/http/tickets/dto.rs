//! HTTP DTOs for ticket and CSAT endpoints.

use serde::{Deserialize, Serialize};

use crate::application::{TicketResolution, TicketResult, TicketUpdateResult};
use crate::domain::foundation::Timestamp;
use crate::domain::ticket::{CsatRating, Ticket, TicketPriority, TicketStatus};

use super::super::conversations::dto::ConversationResponse;

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct RecordCsatRequest {
    pub rating: i32,
    #[serde(default)]
    pub feedback: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct TicketResponse {
    pub id: String,
    pub conversation_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub tat_minutes: u32,
    pub due_at: String,
    pub overdue: bool,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
}

impl From<&Ticket> for TicketResponse {
    fn from(t: &Ticket) -> Self {
        Self {
            id: t.id().to_string(),
            conversation_id: t.conversation_id().to_string(),
            title: t.title().to_string(),
            description: t.description().map(str::to_string),
            priority: t.priority(),
            status: t.status(),
            tat_minutes: t.tat_minutes(),
            due_at: t.due_at().to_rfc3339(),
            overdue: t.is_overdue(&Timestamp::now()),
            created_at: t.created_at().to_rfc3339(),
            updated_at: t.updated_at().to_rfc3339(),
            resolved_at: t.resolved_at().map(|at| at.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CsatResponse {
    pub id: String,
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    pub pending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub requested_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<String>,
}

impl From<&CsatRating> for CsatResponse {
    fn from(c: &CsatRating) -> Self {
        Self {
            id: c.id().to_string(),
            conversation_id: c.conversation_id().to_string(),
            ticket_id: c.ticket_id().map(|t| t.to_string()),
            pending: c.is_pending(),
            rating: c.rating().map(|r| r.value()),
            feedback: c.feedback().map(str::to_string),
            requested_at: c.requested_at().to_rfc3339(),
            recorded_at: c.recorded_at().map(|at| at.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketListResponse {
    pub tickets: Vec<TicketResponse>,
}

impl From<Vec<Ticket>> for TicketListResponse {
    fn from(items: Vec<Ticket>) -> Self {
        Self {
            tickets: items.iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenTicketResponse {
    pub ticket: TicketResponse,
    pub conversation: ConversationResponse,
    pub sequence: u64,
}

impl From<TicketResult> for OpenTicketResponse {
    fn from(result: TicketResult) -> Self {
        Self {
            ticket: (&result.ticket).into(),
            conversation: (&result.conversation).into(),
            sequence: result.sequence,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateTicketResponse {
    pub ticket: TicketResponse,
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

impl From<TicketUpdateResult> for UpdateTicketResponse {
    fn from(result: TicketUpdateResult) -> Self {
        Self {
            ticket: (&result.ticket).into(),
            changed: result.sequence.is_some(),
            sequence: result.sequence,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveTicketResponse {
    pub ticket: TicketResponse,
    pub conversation: ConversationResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csat: Option<CsatResponse>,
    pub newly_resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub survey_delivered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

impl From<TicketResolution> for ResolveTicketResponse {
    fn from(result: TicketResolution) -> Self {
        Self {
            ticket: (&result.ticket).into(),
            conversation: (&result.conversation).into(),
            csat: result.csat.as_ref().map(Into::into),
            newly_resolved: result.newly_resolved,
            survey_delivered: result.survey.as_ref().map(|s| s.is_delivered()),
            sequence: result.sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ConversationId;
    use crate::domain::ticket::NewTicket;

    #[test]
    fn ticket_response_reports_due_date_and_priority() {
        let opened = Timestamp::now();
        let ticket = Ticket::open(
            ConversationId::new(),
            NewTicket {
                title: "Refund not received".into(),
                priority: TicketPriority::High,
                ..NewTicket::default()
            },
            |p| p.default_tat_minutes(),
            opened,
        )
        .unwrap();

        let dto = TicketResponse::from(&ticket);
        assert_eq!(dto.priority, TicketPriority::High);
        assert_eq!(dto.status, TicketStatus::Open);
        assert_eq!(dto.tat_minutes, 240);
        assert_eq!(dto.due_at, opened.plus_minutes(240).to_rfc3339());
        assert!(!dto.overdue);
        assert!(dto.resolved_at.is_none());
    }

    #[test]
    fn pending_csat_has_no_rating() {
        let csat = CsatRating::request(ConversationId::new(), None, Timestamp::now());
        let dto = CsatResponse::from(&csat);
        assert!(dto.pending);
        assert!(dto.rating.is_none());
        assert!(dto.ticket_id.is_none());
    }
}
