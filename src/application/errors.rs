//! Engine error taxonomy.
//!
//! `Validation` and `NotFound` are returned with no side effects.
//! `Conflict` is recoverable by the caller (re-read and retry) and never
//! retried by the engine. `Provider` failures are retried internally and
//! surface only when the fallback (escalation, delivery-failed audit) could
//! not be applied either. `Infrastructure` covers store failures.

use crate::domain::foundation::{DomainError, ErrorClass, ErrorCode, ValidationError};

/// Error returned by every engine operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("[{code}] {message}")]
    Validation { code: ErrorCode, message: String },

    #[error("[{code}] {message}")]
    NotFound { code: ErrorCode, message: String },

    #[error("[{code}] {message}")]
    Conflict { code: ErrorCode, message: String },

    #[error("[{code}] {message}")]
    Provider { code: ErrorCode, message: String },

    #[error("[{code}] {message}")]
    Infrastructure { code: ErrorCode, message: String },
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
        }
    }

    pub fn channel_disabled(channel: impl std::fmt::Display) -> Self {
        EngineError::Validation {
            code: ErrorCode::ChannelDisabled,
            message: format!("Channel {} is disabled", channel),
        }
    }

    pub fn not_found(code: ErrorCode, what: impl std::fmt::Display) -> Self {
        EngineError::NotFound {
            code,
            message: format!("{} not found", what),
        }
    }

    pub fn conflict(code: ErrorCode, message: impl Into<String>) -> Self {
        EngineError::Conflict {
            code,
            message: message.into(),
        }
    }

    pub fn provider(code: ErrorCode, message: impl Into<String>) -> Self {
        EngineError::Provider {
            code,
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        EngineError::Infrastructure {
            code: ErrorCode::InternalError,
            message: message.into(),
        }
    }

    /// The specific error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Validation { code, .. }
            | EngineError::NotFound { code, .. }
            | EngineError::Conflict { code, .. }
            | EngineError::Provider { code, .. }
            | EngineError::Infrastructure { code, .. } => *code,
        }
    }

    /// Human-readable message without the code.
    pub fn message(&self) -> &str {
        match self {
            EngineError::Validation { message, .. }
            | EngineError::NotFound { message, .. }
            | EngineError::Conflict { message, .. }
            | EngineError::Provider { message, .. }
            | EngineError::Infrastructure { message, .. } => message,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Conflict { .. })
    }
}

impl From<DomainError> for EngineError {
    fn from(err: DomainError) -> Self {
        let code = err.code;
        let message = err.message;
        match code.class() {
            ErrorClass::Validation => EngineError::Validation { code, message },
            ErrorClass::NotFound => EngineError::NotFound { code, message },
            ErrorClass::Conflict => EngineError::Conflict { code, message },
            ErrorClass::Provider => EngineError::Provider { code, message },
            ErrorClass::Infrastructure => EngineError::Infrastructure { code, message },
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::validation(err.to_string())
    }
}
