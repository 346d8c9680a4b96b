//! Agent registry.

use serde::Deserialize;
use serde_json::json;

use super::DeskEngine;
use crate::application::EngineError;
use crate::domain::agent::{Agent, AgentStatus};
use crate::domain::audit::{AuditAction, AuditRecord, EntityRef, FieldDiff};
use crate::domain::foundation::{Actor, AgentId, DeskEvent, DeskEventKind};
use crate::ports::{AgentStatusChange, ChangeSet};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterAgentCommand {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Starting availability; `offline` when absent.
    #[serde(default)]
    pub status: Option<AgentStatus>,
}

#[derive(Debug, Clone)]
pub struct SetAgentStatusCommand {
    pub agent_id: AgentId,
    pub status: AgentStatus,
}

impl DeskEngine {
    /// Registers a new agent.
    pub async fn register_agent(&self, cmd: RegisterAgentCommand, actor: &Actor) -> Result<Agent, EngineError> {
        let mut agent = Agent::register(cmd.name, cmd.email, cmd.phone)?;
        if let Some(status) = cmd.status.filter(|s| *s != agent.status()) {
            agent.set_status(status)?;
        }

        let diff = FieldDiff::new()
            .added("name", agent.name())
            .added("status", &agent.status());
        let audit = AuditRecord::new(AuditAction::Created, EntityRef::Agent(agent.id()), actor)
            .with_changes(diff);
        let receipt = self.commit(ChangeSet::new(audit).register_agent(agent.clone())).await?;

        tracing::info!(agent_id = %agent.id(), sequence = receipt.sequence(), "Agent registered");
        self.publish(
            DeskEvent::new(DeskEventKind::StatusUpdate)
                .for_agent(agent.id())
                .with_hint(json!({ "agent_status": agent.status() })),
            &receipt,
        );
        Ok(agent)
    }

    /// Changes an agent's availability. Setting the current status again is
    /// a no-op. Agents are deactivated by going `offline`; they keep the
    /// conversations they own.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown agent
    pub async fn set_agent_status(&self, cmd: SetAgentStatusCommand, actor: &Actor) -> Result<Agent, EngineError> {
        let _guard = self.agent_locks.acquire(&cmd.agent_id).await;
        let mut agent = self.load_agent(cmd.agent_id).await?;
        if agent.status() == cmd.status {
            return Ok(agent);
        }
        let previous = agent.set_status(cmd.status)?;

        let audit = AuditRecord::new(AuditAction::StatusChanged, EntityRef::Agent(agent.id()), actor)
            .with_changes(FieldDiff::new().field("status", &previous, &agent.status()));
        let changes = ChangeSet::new(audit).change_agent_status(AgentStatusChange {
            agent_id: agent.id(),
            expected: previous,
            new_status: agent.status(),
        });
        let receipt = self.commit(changes).await?;

        tracing::info!(
            agent_id = %agent.id(),
            from = %previous,
            to = %agent.status(),
            "Agent status changed"
        );
        self.publish(
            DeskEvent::new(DeskEventKind::StatusUpdate)
                .for_agent(agent.id())
                .with_hint(json!({ "agent_status": agent.status() })),
            &receipt,
        );
        Ok(agent)
    }

    pub async fn get_agent(&self, id: AgentId) -> Result<Agent, EngineError> {
        self.load_agent(id).await
    }

    /// All agents in registration order.
    pub async fn list_agents(&self) -> Result<Vec<Agent>, EngineError> {
        Ok(self.store.list_agents().await?)
    }
}
