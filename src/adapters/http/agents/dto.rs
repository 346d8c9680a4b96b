//! HTTP DTOs for agent endpoints.

use serde::{Deserialize, Serialize};

use crate::domain::agent::{Agent, AgentStatus};

#[derive(Debug, Clone, Deserialize)]
pub struct SetStatusRequest {
    pub status: AgentStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub status: AgentStatus,
    pub active_conversations: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Agent> for AgentResponse {
    fn from(a: &Agent) -> Self {
        Self {
            id: a.id().to_string(),
            name: a.name().to_string(),
            email: a.email().map(str::to_string),
            phone: a.phone().map(str::to_string),
            status: a.status(),
            active_conversations: a.active_conversations(),
            created_at: a.created_at().to_rfc3339(),
            updated_at: a.updated_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentListResponse {
    pub agents: Vec<AgentResponse>,
}

impl From<Vec<Agent>> for AgentListResponse {
    fn from(items: Vec<Agent>) -> Self {
        Self {
            agents: items.iter().map(Into::into).collect(),
        }
    }
}

/// Suggestion from the auto-assignment helper; `agent` is absent when
/// nobody is available.
#[derive(Debug, Clone, Serialize)]
pub struct PickAgentResponse {
    pub agent: Option<AgentResponse>,
}
