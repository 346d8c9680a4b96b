//! Operator identity extractor.
//!
//! Authentication is handled upstream; the desk API only needs to know who
//! to attribute an audit entry to. Callers send:
//!
//! ```text
//! X-Actor: Dana Smith          (required on mutating routes)
//! X-Agent-Id: <uuid>           (optional)
//! X-Request-Id: <id>           (optional, becomes the correlation id)
//! ```

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
    response::{IntoResponse, Response},
};

use super::error::ApiError;
use crate::application::EngineError;
use crate::domain::foundation::{Actor, AgentId};

pub const ACTOR_HEADER: &str = "x-actor";
pub const AGENT_ID_HEADER: &str = "x-agent-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Extractor producing the [`Actor`] an operation is attributed to.
#[derive(Debug, Clone)]
pub struct RequireActor(pub Actor);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, EngineError> {
    let name = header(headers, ACTOR_HEADER)
        .ok_or_else(|| EngineError::validation("Missing X-Actor header"))?;
    let mut actor = Actor::new(name)?.with_source("api");

    if let Some(raw) = header(headers, AGENT_ID_HEADER) {
        let agent_id: AgentId = raw
            .parse()
            .map_err(|_| EngineError::validation(format!("Invalid X-Agent-Id '{}'", raw)))?;
        actor = actor.with_agent(agent_id);
    }
    if let Some(request_id) = header(headers, REQUEST_ID_HEADER) {
        actor = actor.with_correlation_id(request_id);
    }
    Ok(actor)
}

#[async_trait]
impl<S> FromRequestParts<S> for RequireActor
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers)
            .map(RequireActor)
            .map_err(|err| ApiError(err).into_response())
    }
}
