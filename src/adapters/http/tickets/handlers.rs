//! HTTP handlers for ticket and CSAT endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::dto::{
    CsatResponse, OpenTicketResponse, RecordCsatRequest, ResolveTicketResponse,
    TicketListResponse, TicketResponse, UpdateTicketResponse,
};
use crate::adapters::http::actor::RequireActor;
use crate::adapters::http::error::ApiError;
use crate::adapters::http::state::AppState;
use crate::application::{OpenTicketCommand, RecordCsatCommand, UpdateTicketCommand};
use crate::domain::audit::EntityRef;
use crate::domain::foundation::{ConversationId, CsatId, TicketId};
use crate::domain::ticket::{NewTicket, TicketUpdate};

/// POST /api/conversations/:id/tickets
pub async fn open_ticket(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    RequireActor(actor): RequireActor,
    Json(ticket): Json<NewTicket>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = OpenTicketCommand {
        conversation_id,
        ticket,
        only_if_unclaimed: false,
    };
    let result = state.engine.open_ticket(cmd, &actor).await?;
    Ok((StatusCode::CREATED, Json(OpenTicketResponse::from(result))))
}

/// GET /api/conversations/:id/tickets
pub async fn list_conversation_tickets(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
) -> Result<impl IntoResponse, ApiError> {
    let tickets = state.engine.tickets_for_conversation(conversation_id).await?;
    Ok(Json(TicketListResponse::from(tickets)))
}

/// GET /api/tickets/:id
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket = state.engine.get_ticket(id).await?;
    Ok(Json(TicketResponse::from(&ticket)))
}

/// PATCH /api/tickets/:id
pub async fn update_ticket(
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
    RequireActor(actor): RequireActor,
    Json(update): Json<TicketUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = UpdateTicketCommand {
        ticket_id: id,
        update,
    };
    let result = state.engine.update_ticket(cmd, &actor).await?;
    Ok(Json(UpdateTicketResponse::from(result)))
}

/// POST /api/tickets/:id/resolve
pub async fn resolve_ticket(
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
    RequireActor(actor): RequireActor,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.engine.resolve_ticket(id, &actor).await?;
    Ok(Json(ResolveTicketResponse::from(result)))
}

/// GET /api/tickets/:id/audit
pub async fn ticket_audit(
    State(state): State<AppState>,
    Path(id): Path<TicketId>,
) -> Result<impl IntoResponse, ApiError> {
    state.engine.get_ticket(id).await?;
    let entries = state.engine.entity_audit(EntityRef::Ticket(id)).await?;
    Ok(Json(entries))
}

/// GET /api/csat/:id
pub async fn get_csat(
    State(state): State<AppState>,
    Path(id): Path<CsatId>,
) -> Result<impl IntoResponse, ApiError> {
    let csat = state.engine.get_csat(id).await?;
    Ok(Json(CsatResponse::from(&csat)))
}

/// POST /api/csat/:id - the customer's rating
pub async fn record_csat(
    State(state): State<AppState>,
    Path(id): Path<CsatId>,
    RequireActor(actor): RequireActor,
    Json(req): Json<RecordCsatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = RecordCsatCommand {
        csat_id: id,
        rating: req.rating,
        feedback: req.feedback,
    };
    let csat = state.engine.record_csat(cmd, &actor).await?;
    Ok(Json(CsatResponse::from(&csat)))
}
