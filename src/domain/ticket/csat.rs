//! Customer-satisfaction survey records.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    ConversationId, CsatId, DomainError, ErrorCode, TicketId, Timestamp, ValidationError,
};

/// Maximum feedback length.
pub const MAX_FEEDBACK_LENGTH: usize = 2_000;

/// A rating from 1 (worst) to 5 (best).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct CsatScore(u8);

impl CsatScore {
    /// # Errors
    ///
    /// `OutOfRange` outside 1..=5.
    pub fn new(value: i32) -> Result<Self, ValidationError> {
        if !(1..=5).contains(&value) {
            return Err(ValidationError::out_of_range("rating", 1, 5, value));
        }
        Ok(Self(value as u8))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i32> for CsatScore {
    type Error = ValidationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        CsatScore::new(value)
    }
}

impl From<CsatScore> for i32 {
    fn from(score: CsatScore) -> Self {
        i32::from(score.0)
    }
}

/// A survey issued after resolution, filled in at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsatRating {
    id: CsatId,
    conversation_id: ConversationId,
    ticket_id: Option<TicketId>,
    rating: Option<CsatScore>,
    feedback: Option<String>,
    requested_at: Timestamp,
    recorded_at: Option<Timestamp>,
}

impl CsatRating {
    /// Issues a pending survey for a resolved conversation or ticket.
    pub fn request(conversation_id: ConversationId, ticket_id: Option<TicketId>, at: Timestamp) -> Self {
        Self {
            id: CsatId::new(),
            conversation_id,
            ticket_id,
            rating: None,
            feedback: None,
            requested_at: at,
            recorded_at: None,
        }
    }

    /// Reconstitute from persistence.
    pub fn reconstitute(
        id: CsatId,
        conversation_id: ConversationId,
        ticket_id: Option<TicketId>,
        rating: Option<CsatScore>,
        feedback: Option<String>,
        requested_at: Timestamp,
        recorded_at: Option<Timestamp>,
    ) -> Self {
        Self {
            id,
            conversation_id,
            ticket_id,
            rating,
            feedback,
            requested_at,
            recorded_at,
        }
    }

    pub fn id(&self) -> CsatId {
        self.id
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    pub fn ticket_id(&self) -> Option<TicketId> {
        self.ticket_id
    }

    pub fn rating(&self) -> Option<CsatScore> {
        self.rating
    }

    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    pub fn requested_at(&self) -> &Timestamp {
        &self.requested_at
    }

    pub fn recorded_at(&self) -> Option<&Timestamp> {
        self.recorded_at.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.rating.is_none()
    }

    /// Fills in the survey.
    ///
    /// # Errors
    ///
    /// - `CsatAlreadyRecorded` if a rating exists
    /// - `ValidationFailed` for oversized feedback
    pub fn record(
        &mut self,
        score: CsatScore,
        feedback: Option<String>,
        at: Timestamp,
    ) -> Result<(), DomainError> {
        if !self.is_pending() {
            return Err(DomainError::new(
                ErrorCode::CsatAlreadyRecorded,
                format!("Survey {} was already answered", self.id),
            ));
        }
        let feedback = feedback.map(|f| f.trim().to_string()).filter(|f| !f.is_empty());
        if let Some(f) = &feedback {
            if f.chars().count() > MAX_FEEDBACK_LENGTH {
                return Err(DomainError::validation(
                    "feedback",
                    format!("Feedback must be at most {} characters", MAX_FEEDBACK_LENGTH),
                ));
            }
        }
        self.rating = Some(score);
        self.feedback = feedback;
        self.recorded_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_accepts_one_through_five() {
        for v in 1..=5 {
            assert_eq!(CsatScore::new(v).unwrap().value() as i32, v);
        }
        assert!(CsatScore::new(0).is_err());
        assert!(CsatScore::new(6).is_err());
    }

    #[test]
    fn score_deserializes_with_validation() {
        assert!(serde_json::from_str::<CsatScore>("4").is_ok());
        assert!(serde_json::from_str::<CsatScore>("9").is_err());
    }

    #[test]
    fn new_request_is_pending() {
        let csat = CsatRating::request(ConversationId::new(), None, Timestamp::now());
        assert!(csat.is_pending());
        assert!(csat.recorded_at().is_none());
    }

    #[test]
    fn second_record_is_rejected() {
        let mut csat = CsatRating::request(ConversationId::new(), Some(TicketId::new()), Timestamp::now());
        csat.record(CsatScore::new(5).unwrap(), Some(" great ".into()), Timestamp::now())
            .unwrap();
        assert_eq!(csat.feedback(), Some("great"));

        let err = csat
            .record(CsatScore::new(1).unwrap(), None, Timestamp::now())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CsatAlreadyRecorded);
        assert_eq!(csat.rating().map(|r| r.value()), Some(5));
    }
}
