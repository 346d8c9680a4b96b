//! HTTP handlers for the agent registry.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::dto::{AgentListResponse, AgentResponse, PickAgentResponse, SetStatusRequest};
use crate::adapters::http::actor::RequireActor;
use crate::adapters::http::error::ApiError;
use crate::adapters::http::state::AppState;
use crate::application::{RegisterAgentCommand, SetAgentStatusCommand};
use crate::domain::foundation::AgentId;

/// POST /api/agents
pub async fn register_agent(
    State(state): State<AppState>,
    RequireActor(actor): RequireActor,
    Json(cmd): Json<RegisterAgentCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let agent = state.engine.register_agent(cmd, &actor).await?;
    Ok((StatusCode::CREATED, Json(AgentResponse::from(&agent))))
}

/// GET /api/agents
pub async fn list_agents(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let agents = state.engine.list_agents().await?;
    Ok(Json(AgentListResponse::from(agents)))
}

/// GET /api/agents/available
pub async fn pick_available_agent(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let agent = state.engine.pick_available_agent().await?;
    Ok(Json(PickAgentResponse {
        agent: agent.as_ref().map(Into::into),
    }))
}

/// GET /api/agents/:id
pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<AgentId>,
) -> Result<impl IntoResponse, ApiError> {
    let agent = state.engine.get_agent(id).await?;
    Ok(Json(AgentResponse::from(&agent)))
}

/// PUT /api/agents/:id/status
pub async fn set_agent_status(
    State(state): State<AppState>,
    Path(id): Path<AgentId>,
    RequireActor(actor): RequireActor,
    Json(req): Json<SetStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = SetAgentStatusCommand {
        agent_id: id,
        status: req.status,
    };
    let agent = state.engine.set_agent_status(cmd, &actor).await?;
    Ok(Json(AgentResponse::from(&agent)))
}
