//! HTTP handlers for conversation endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::dto::{
    AgentMessageRequest, AgentReplyResponse, AssignRequest, AssignResponse,
    ConversationListResponse, ConversationResponse, CsatListResponse, EscalateRequest,
    IngestRequest, IngestResponse, ListConversationsQuery, MessagesQuery, ResolveResponse,
    TransitionResponse,
};
use crate::adapters::http::actor::RequireActor;
use crate::adapters::http::error::ApiError;
use crate::adapters::http::state::AppState;
use crate::application::{AssignCommand, EscalateCommand, SendAgentMessageCommand};
use crate::domain::foundation::ConversationId;
use crate::ports::ConversationFilter;

/// GET /api/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ListConversationsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter: ConversationFilter = query.into();
    let conversations = state.engine.list_conversations(&filter).await?;
    Ok(Json(ConversationListResponse::from(conversations)))
}

/// GET /api/conversations/:id
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = state.engine.get_conversation(id).await?;
    Ok(Json(ConversationResponse::from(&conversation)))
}

/// POST /api/conversations - synchronous ingest of a customer message.
///
/// The AI turn, if any, runs in the background.
pub async fn ingest_message(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let inbound = req.into_inbound()?;
    let outcome = state.engine.ingest(inbound).await?;
    let response = IngestResponse::from(&outcome);
    if let Some(turn) = outcome.ai_turn {
        state.engine.spawn_ai_turn(turn);
    }
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)))
}

/// GET /api/conversations/:id/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
    Query(query): Query<MessagesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state.engine.list_messages(id, query.limit).await?;
    Ok(Json(messages))
}

/// POST /api/conversations/:id/messages - reply from the owning agent
pub async fn send_agent_message(
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
    RequireActor(actor): RequireActor,
    Json(req): Json<AgentMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = SendAgentMessageCommand {
        conversation_id: id,
        agent_id: req.agent_id,
        text: req.text,
    };
    let result = state.engine.send_agent_message(cmd, &actor).await?;
    Ok((StatusCode::CREATED, Json(AgentReplyResponse::from(result))))
}

/// GET /api/conversations/:id/audit
pub async fn conversation_audit(
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state.engine.conversation_audit(id).await?;
    Ok(Json(entries))
}

/// POST /api/conversations/:id/escalate
pub async fn escalate(
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
    RequireActor(actor): RequireActor,
    body: Option<Json<EscalateRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let cmd = EscalateCommand {
        conversation_id: id,
        reason: req.reason,
    };
    let result = state.engine.escalate(cmd, &actor).await?;
    Ok(Json(TransitionResponse {
        conversation: (&result.conversation).into(),
        sequence: result.sequence,
    }))
}

/// POST /api/conversations/:id/assign - claim or transfer
pub async fn assign(
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
    RequireActor(actor): RequireActor,
    Json(req): Json<AssignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = AssignCommand {
        conversation_id: id,
        agent_id: req.agent_id,
        expected_owner: req.expected_owner,
    };
    let result = state.engine.assign(cmd, &actor).await?;
    Ok(Json(AssignResponse::from(result)))
}

/// POST /api/conversations/:id/resolve
pub async fn resolve(
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
    RequireActor(actor): RequireActor,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.engine.resolve(id, &actor).await?;
    Ok(Json(ResolveResponse::from(result)))
}

/// GET /api/conversations/:id/csat
pub async fn list_csat(
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
) -> Result<impl IntoResponse, ApiError> {
    let surveys = state.engine.csat_for_conversation(id).await?;
    Ok(Json(CsatListResponse::from(surveys)))
}
