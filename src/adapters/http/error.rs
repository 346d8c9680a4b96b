//! Engine error to HTTP response mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::EngineError;
use crate::domain::foundation::{ErrorCode, ValidationError};

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }
}

/// API error type that converts engine errors to HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            EngineError::Validation { .. } => StatusCode::BAD_REQUEST,
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::Conflict { .. } => StatusCode::CONFLICT,
            EngineError::Provider { .. } => StatusCode::BAD_GATEWAY,
            EngineError::Infrastructure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = %self.0.code(), error = %self.0.message(), "Request failed");
        }
        let body = ErrorResponse::new(self.0.code(), self.0.message());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases = [
            (EngineError::validation("bad"), StatusCode::BAD_REQUEST),
            (
                EngineError::not_found(ErrorCode::TicketNotFound, "Ticket x"),
                StatusCode::NOT_FOUND,
            ),
            (
                EngineError::conflict(ErrorCode::AlreadyClaimed, "taken"),
                StatusCode::CONFLICT,
            ),
            (
                EngineError::provider(ErrorCode::AIProviderError, "down"),
                StatusCode::BAD_GATEWAY,
            ),
            (
                EngineError::infrastructure("pool"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }

    #[test]
    fn body_carries_code_and_message() {
        let body = ErrorResponse::new(ErrorCode::OwnerMismatch, "not yours");
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["code"], "OWNER_MISMATCH");
        assert_eq!(json["message"], "not yours");
    }
}
