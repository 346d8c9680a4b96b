//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i32,
        max: i32,
        actual: i32,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: i32, max: i32, actual: i32) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::EmptyField { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. } => field,
        }
    }
}

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,
    ChannelDisabled,

    // Not found errors
    ConversationNotFound,
    AgentNotFound,
    TicketNotFound,
    CsatNotFound,

    // State / ownership conflicts
    InvalidStateTransition,
    AlreadyClaimed,
    OwnerMismatch,
    AgentUnavailable,
    ConcurrentModification,
    OpenTicketExists,
    CsatAlreadyRecorded,

    // External collaborators
    AIProviderError,
    DeliveryFailed,

    // Infrastructure errors
    DatabaseError,
    InternalError,
}

/// Coarse error class used to pick propagation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    NotFound,
    Conflict,
    Provider,
    Infrastructure,
}

impl ErrorCode {
    /// Classifies the code into the engine's error taxonomy.
    pub fn class(&self) -> ErrorClass {
        use ErrorCode::*;
        match self {
            ValidationFailed | ChannelDisabled => ErrorClass::Validation,
            ConversationNotFound | AgentNotFound | TicketNotFound | CsatNotFound => {
                ErrorClass::NotFound
            }
            InvalidStateTransition
            | AlreadyClaimed
            | OwnerMismatch
            | AgentUnavailable
            | ConcurrentModification
            | OpenTicketExists
            | CsatAlreadyRecorded => ErrorClass::Conflict,
            AIProviderError | DeliveryFailed => ErrorClass::Provider,
            DatabaseError | InternalError => ErrorClass::Infrastructure,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::ChannelDisabled => "CHANNEL_DISABLED",
            ErrorCode::ConversationNotFound => "CONVERSATION_NOT_FOUND",
            ErrorCode::AgentNotFound => "AGENT_NOT_FOUND",
            ErrorCode::TicketNotFound => "TICKET_NOT_FOUND",
            ErrorCode::CsatNotFound => "CSAT_NOT_FOUND",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::AlreadyClaimed => "ALREADY_CLAIMED",
            ErrorCode::OwnerMismatch => "OWNER_MISMATCH",
            ErrorCode::AgentUnavailable => "AGENT_UNAVAILABLE",
            ErrorCode::ConcurrentModification => "CONCURRENT_MODIFICATION",
            ErrorCode::OpenTicketExists => "OPEN_TICKET_EXISTS",
            ErrorCode::CsatAlreadyRecorded => "CSAT_ALREADY_RECORDED",
            ErrorCode::AIProviderError => "AI_PROVIDER_ERROR",
            ErrorCode::DeliveryFailed => "DELIVERY_FAILED",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message).with_detail("field", field.into())
    }

    /// Creates an invalid-transition error naming both states.
    pub fn invalid_transition(from: impl fmt::Debug, to: impl fmt::Debug) -> Self {
        Self::new(
            ErrorCode::InvalidStateTransition,
            format!("Cannot transition from {:?} to {:?}", from, to),
        )
    }

    /// Creates a database error wrapping a driver message.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Returns the taxonomy class of this error.
    pub fn class(&self) -> ErrorClass {
        self.code.class()
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        let field = err.field().to_string();
        DomainError::validation(field, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_empty_field_displays_correctly() {
        let err = ValidationError::empty_field("content");
        assert_eq!(format!("{}", err), "Field 'content' cannot be empty");
    }

    #[test]
    fn validation_error_out_of_range_displays_correctly() {
        let err = ValidationError::out_of_range("rating", 1, 5, 9);
        assert_eq!(
            format!("{}", err),
            "Field 'rating' must be between 1 and 5, got 9"
        );
    }

    #[test]
    fn domain_error_displays_code_and_message() {
        let err = DomainError::new(ErrorCode::ConversationNotFound, "Conversation not found");
        assert_eq!(
            format!("{}", err),
            "[CONVERSATION_NOT_FOUND] Conversation not found"
        );
    }

    #[test]
    fn domain_error_from_validation_keeps_field() {
        let err: DomainError = ValidationError::invalid_format("email", "missing @").into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.details.get("field"), Some(&"email".to_string()));
    }

    #[test]
    fn codes_classify_into_taxonomy() {
        assert_eq!(ErrorCode::AlreadyClaimed.class(), ErrorClass::Conflict);
        assert_eq!(ErrorCode::OwnerMismatch.class(), ErrorClass::Conflict);
        assert_eq!(ErrorCode::TicketNotFound.class(), ErrorClass::NotFound);
        assert_eq!(ErrorCode::ChannelDisabled.class(), ErrorClass::Validation);
        assert_eq!(ErrorCode::DeliveryFailed.class(), ErrorClass::Provider);
        assert_eq!(ErrorCode::DatabaseError.class(), ErrorClass::Infrastructure);
    }
}
