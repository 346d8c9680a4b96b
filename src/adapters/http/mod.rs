//! HTTP adapter - the synchronous request interface and channel webhooks.
//!
//! ```text
//! GET  /health
//! /api/conversations/...   reads, direct ingest, escalate/assign/resolve, agent replies
//! /api/tickets/...         open/update/resolve tickets
//! /api/csat/:id            survey lookup and rating
//! /api/agents/...          agent registry and the auto-assignment helper
//! /api/settings            runtime settings
//! /webhooks/:channel       channel webhooks (handshake + intake)
//! GET  /ws                 operator real-time stream
//! ```
//!
//! Mutating `/api` routes require an `X-Actor` header; see [`actor`].

pub mod actor;
pub mod agents;
pub mod conversations;
pub mod error;
pub mod settings;
pub mod state;
pub mod tickets;
pub mod webhooks;

use std::time::Duration;

use axum::{extract::State, http::HeaderName, routing::get, Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::adapters::websocket::ws_handler;

pub use error::{ApiError, ErrorResponse};
pub use state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub operator_sessions: usize,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        operator_sessions: state.engine.fanout().subscriber_count(),
    })
}

/// Builds the complete application router.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let api = Router::new()
        .merge(conversations::conversation_routes())
        .merge(tickets::ticket_routes())
        .merge(agents::agent_routes())
        .merge(settings::settings_routes());

    let request_id = HeaderName::from_static(actor::REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .nest("/api", api)
        .nest("/webhooks", webhooks::webhook_routes())
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(TimeoutLayer::new(request_timeout))
                .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)),
        )
        .with_state(state)
}
