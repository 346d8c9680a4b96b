//! Axum routes for ticket and CSAT endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    get_csat, get_ticket, list_conversation_tickets, open_ticket, record_csat, resolve_ticket,
    ticket_audit, update_ticket,
};
use crate::adapters::http::state::AppState;

/// Ticket and survey routes, merged under `/api`.
pub fn ticket_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations/:id/tickets",
            get(list_conversation_tickets).post(open_ticket),
        )
        .route("/tickets/:id", get(get_ticket).patch(update_ticket))
        .route("/tickets/:id/resolve", post(resolve_ticket))
        .route("/tickets/:id/audit", get(ticket_audit))
        .route("/csat/:id", get(get_csat).post(record_csat))
}
