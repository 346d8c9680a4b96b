//! Axum routes for the agent registry.

use axum::{
    routing::{get, put},
    Router,
};

use super::handlers::{get_agent, list_agents, pick_available_agent, register_agent, set_agent_status};
use crate::adapters::http::state::AppState;

/// Agent routes, merged under `/api`.
pub fn agent_routes() -> Router<AppState> {
    Router::new()
        .route("/agents", get(list_agents).post(register_agent))
        .route("/agents/available", get(pick_available_agent))
        .route("/agents/:id", get(get_agent))
        .route("/agents/:id/status", put(set_agent_status))
}
