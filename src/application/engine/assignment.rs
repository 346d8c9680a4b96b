//! Escalation, claim and transfer.

use serde_json::json;

use super::DeskEngine;
use crate::application::EngineError;
use crate::domain::agent::Agent;
use crate::domain::audit::{AuditAction, AuditRecord, EntityRef, FieldDiff};
use crate::domain::conversation::{AssignOutcome, Conversation};
use crate::domain::foundation::{
    Actor, AgentId, ConversationId, DeskEvent, DeskEventKind, ErrorCode, Timestamp,
};
use crate::ports::{ChangeSet, LoadAdjustment};

/// Abandon AI handling of a conversation.
#[derive(Debug, Clone)]
pub struct EscalateCommand {
    pub conversation_id: ConversationId,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EscalationResult {
    pub conversation: Conversation,
    pub sequence: u64,
}

/// Claim (no expected owner) or transfer (expected owner given).
#[derive(Debug, Clone)]
pub struct AssignCommand {
    pub conversation_id: ConversationId,
    pub agent_id: AgentId,
    pub expected_owner: Option<AgentId>,
}

#[derive(Debug, Clone)]
pub struct AssignResult {
    pub conversation: Conversation,
    pub outcome: AssignOutcome,
    pub sequence: u64,
}

impl DeskEngine {
    /// Moves an AI-handled conversation to escalation-pending.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown conversation
    /// - `Conflict` if the conversation is not AI-handled
    pub async fn escalate(&self, cmd: EscalateCommand, actor: &Actor) -> Result<EscalationResult, EngineError> {
        let _guard = self.lock_conversation(cmd.conversation_id).await;
        let conversation = self.load_conversation(cmd.conversation_id).await?;
        self.apply_escalation(conversation, cmd.reason, actor).await
    }

    /// Escalation step shared with AI turns. Callers hold the conversation lock.
    pub(super) async fn apply_escalation(
        &self,
        mut conversation: Conversation,
        reason: Option<String>,
        actor: &Actor,
    ) -> Result<EscalationResult, EngineError> {
        let id = conversation.id();
        let expected_version = conversation.version();
        conversation.escalate(reason, Timestamp::now())?;

        let diff = FieldDiff::new()
            .added("escalated_at", &conversation.escalated_at())
            .added("reason", &conversation.escalation_reason());
        let audit = AuditRecord::new(AuditAction::Escalated, EntityRef::Conversation(id), actor)
            .with_changes(diff);
        let changes = ChangeSet::new(audit).update_conversation(conversation.clone(), expected_version);
        let receipt = self.commit(changes).await?;

        tracing::info!(conversation_id = %id, sequence = receipt.sequence(), "Conversation escalated");
        self.publish(
            DeskEvent::new(DeskEventKind::Escalation)
                .for_conversation(id)
                .with_hint(json!({ "reason": conversation.escalation_reason() })),
            &receipt,
        );
        Ok(EscalationResult {
            conversation,
            sequence: receipt.sequence(),
        })
    }

    /// Claims or transfers a conversation.
    ///
    /// Ownership change and load counters are committed together: a claim
    /// takes +1 on the new owner, a transfer additionally releases the old
    /// owner.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown conversation or agent
    /// - `Conflict` when the conversation was already claimed, the expected
    ///   owner does not match, or the agent is not available
    pub async fn assign(&self, cmd: AssignCommand, actor: &Actor) -> Result<AssignResult, EngineError> {
        let id = cmd.conversation_id;
        let _guard = self.lock_conversation(id).await;

        let mut involved = vec![cmd.agent_id];
        involved.extend(cmd.expected_owner);
        let _agent_guards = self.lock_agents(&involved).await;

        let agent = self.load_agent(cmd.agent_id).await?;
        if !agent.is_available() {
            return Err(EngineError::conflict(
                ErrorCode::AgentUnavailable,
                format!("Agent {} is {}", agent.id(), agent.status()),
            ));
        }

        let mut conversation = self.load_conversation(id).await?;
        let expected_version = conversation.version();
        let previous_owner = conversation.assigned_agent();
        let previous_status = conversation.status();
        let outcome = conversation.assign(cmd.agent_id, cmd.expected_owner, Timestamp::now())?;

        let mut changes = ChangeSet::new(AuditRecord::new(
            match outcome {
                AssignOutcome::Claimed { .. } => AuditAction::Assigned,
                AssignOutcome::Transferred { .. } => AuditAction::Transferred,
            },
            EntityRef::Conversation(id),
            actor,
        )
        .with_changes(
            FieldDiff::new()
                .field("status", &previous_status, &conversation.status())
                .field("assigned_agent", &previous_owner, &conversation.assigned_agent()),
        ))
        .update_conversation(conversation.clone(), expected_version)
        .adjust_load(LoadAdjustment::take(cmd.agent_id));
        if let AssignOutcome::Transferred { from, .. } = outcome {
            changes = changes.adjust_load(LoadAdjustment::release(from));
        }

        let receipt = self.commit(changes).await?;
        tracing::info!(
            conversation_id = %id,
            agent_id = %cmd.agent_id,
            sequence = receipt.sequence(),
            transfer = matches!(outcome, AssignOutcome::Transferred { .. }),
            "Conversation assigned"
        );

        let event = match outcome {
            AssignOutcome::Claimed { agent: owner } => DeskEvent::new(DeskEventKind::ChatAccepted)
                .for_conversation(id)
                .for_agent(owner)
                .with_hint(json!({ "agent_name": agent.name() })),
            AssignOutcome::Transferred { from, to } => DeskEvent::new(DeskEventKind::Assignment)
                .for_conversation(id)
                .for_agent(to)
                .with_hint(json!({ "from": from, "agent_name": agent.name() })),
        };
        self.publish(event, &receipt);

        Ok(AssignResult {
            conversation,
            outcome,
            sequence: receipt.sequence(),
        })
    }

    /// The available agent with the lowest live load, earliest registered on
    /// ties. Never claims anything.
    pub async fn pick_available_agent(&self) -> Result<Option<Agent>, EngineError> {
        let agents = self.store.list_agents().await?;
        Ok(agents
            .into_iter()
            .filter(Agent::is_available)
            .min_by_key(|a| (a.active_conversations(), *a.created_at())))
    }
}
