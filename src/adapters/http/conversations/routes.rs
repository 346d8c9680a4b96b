//! Axum routes for conversation endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    assign, conversation_audit, escalate, get_conversation, ingest_message, list_conversations,
    list_csat, list_messages, resolve, send_agent_message,
};
use crate::adapters::http::state::AppState;

/// Conversation routes, merged under `/api`.
///
/// - `GET /conversations` - list (filters: `status`, `channel`,
///   `escalation_pending`, `limit`)
/// - `POST /conversations` - ingest a customer message directly
/// - `GET /conversations/:id` - current state
/// - `GET|POST /conversations/:id/messages` - history / agent reply
/// - `GET /conversations/:id/audit` - audit trail including tickets and surveys
/// - `POST /conversations/:id/{escalate,assign,resolve}`
/// - `GET /conversations/:id/csat` - survey records
pub fn conversation_routes() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(list_conversations).post(ingest_message))
        .route("/conversations/:id", get(get_conversation))
        .route(
            "/conversations/:id/messages",
            get(list_messages).post(send_agent_message),
        )
        .route("/conversations/:id/audit", get(conversation_audit))
        .route("/conversations/:id/escalate", post(escalate))
        .route("/conversations/:id/assign", post(assign))
        .route("/conversations/:id/resolve", post(resolve))
        .route("/conversations/:id/csat", get(list_csat))
}
