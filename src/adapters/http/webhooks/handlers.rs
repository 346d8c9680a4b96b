//! Webhook handlers.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::adapters::channels::SIGNATURE_HEADER;
use crate::adapters::http::error::{ApiError, ErrorResponse};
use crate::adapters::http::state::AppState;
use crate::application::EngineError;
use crate::domain::conversation::Channel;
use crate::domain::foundation::ErrorCode;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntakeResponse {
    pub accepted: usize,
    pub duplicates: usize,
}

fn forbidden(message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(ErrorResponse::new(ErrorCode::ValidationFailed, message)),
    )
        .into_response()
}

/// GET /webhooks/:channel
pub async fn verify_subscription(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Query(query): Query<HubQuery>,
) -> Result<Response, ApiError> {
    let channel: Channel = channel.parse()?;
    let Some(verifier) = state.verifier(channel) else {
        return Ok(forbidden("Channel does not use subscription verification"));
    };

    match verifier.verify_subscription(
        query.mode.as_deref(),
        query.verify_token.as_deref(),
        query.challenge.as_deref(),
    ) {
        Some(challenge) => {
            tracing::info!(channel = %channel, "Webhook subscription verified");
            Ok((StatusCode::OK, challenge).into_response())
        }
        None => {
            tracing::warn!(channel = %channel, "Webhook subscription refused");
            Ok(forbidden("Verification failed"))
        }
    }
}

/// POST /webhooks/:channel
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let channel: Channel = channel.parse()?;

    if let Some(verifier) = state.verifier(channel) {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        if let Err(err) = verifier.verify_body(&body, signature) {
            tracing::warn!(channel = %channel, error = %err, "Webhook signature rejected");
            return Ok((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(ErrorCode::ValidationFailed, err.to_string())),
            )
                .into_response());
        }
    }

    let payload: JsonValue = serde_json::from_slice(&body)
        .map_err(|e| EngineError::validation(format!("Invalid JSON body: {}", e)))?;

    match state.intake.receive(channel, &payload).await {
        Ok(report) => {
            tracing::debug!(
                channel = %channel,
                accepted = report.accepted,
                duplicates = report.duplicates,
                "Webhook accepted"
            );
            Ok((
                StatusCode::OK,
                Json(IntakeResponse {
                    accepted: report.accepted,
                    duplicates: report.duplicates,
                }),
            )
                .into_response())
        }
        Err(err @ EngineError::Infrastructure { .. }) => Ok((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(err.code(), err.message())),
        )
            .into_response()),
        Err(err) => Err(err.into()),
    }
}
