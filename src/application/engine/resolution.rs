//! Conversation resolution, agent replies and CSAT recording.

use serde_json::json;

use super::DeskEngine;
use crate::application::{DeliveryStatus, EngineError};
use crate::domain::audit::{AuditAction, AuditRecord, EntityRef, FieldDiff};
use crate::domain::conversation::{Conversation, Message, OutboundMessage, SenderKind};
use crate::domain::foundation::{
    Actor, AgentId, ConversationId, CsatId, DeskEvent, DeskEventKind, ErrorCode, Timestamp,
};
use crate::domain::ticket::{CsatRating, CsatScore};
use crate::ports::{ChangeSet, LoadAdjustment};

#[derive(Debug, Clone)]
pub struct ResolveResult {
    pub conversation: Conversation,
    /// The survey record created by this resolution.
    pub csat: CsatRating,
    pub survey: DeliveryStatus,
    pub sequence: u64,
}

/// A reply written by the owning agent.
#[derive(Debug, Clone)]
pub struct SendAgentMessageCommand {
    pub conversation_id: ConversationId,
    pub agent_id: AgentId,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct AgentReplyResult {
    pub conversation: Conversation,
    pub message: Message,
    pub delivery: DeliveryStatus,
    pub sequence: u64,
}

/// Customer's answer to a survey.
#[derive(Debug, Clone)]
pub struct RecordCsatCommand {
    pub csat_id: CsatId,
    pub rating: i32,
    pub feedback: Option<String>,
}

impl DeskEngine {
    /// Resolves an assigned conversation, releasing its owner and requesting
    /// a satisfaction survey.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown conversation
    /// - `Conflict` if the conversation is not `assigned`
    pub async fn resolve(&self, id: ConversationId, actor: &Actor) -> Result<ResolveResult, EngineError> {
        let guard = self.lock_conversation(id).await;
        let mut conversation = self.load_conversation(id).await?;
        let expected_version = conversation.version();
        let previous_status = conversation.status();
        let previous_owner = conversation.assigned_agent();
        let agent_guards = self.lock_agents(&previous_owner.into_iter().collect::<Vec<_>>()).await;

        let at = Timestamp::now();
        let owner = conversation.resolve(at)?;
        let csat = CsatRating::request(id, None, at);

        let diff = FieldDiff::new()
            .field("status", &previous_status, &conversation.status())
            .field("assigned_agent", &previous_owner, &conversation.assigned_agent())
            .added("csat_id", &csat.id());
        let audit = AuditRecord::new(AuditAction::StatusChanged, EntityRef::Conversation(id), actor)
            .with_changes(diff);
        let changes = ChangeSet::new(audit)
            .update_conversation(conversation.clone(), expected_version)
            .adjust_load(LoadAdjustment::release(owner))
            .insert_csat(csat.clone());
        let receipt = self.commit(changes).await?;

        tracing::info!(
            conversation_id = %id,
            agent_id = %owner,
            sequence = receipt.sequence(),
            "Conversation resolved"
        );
        self.publish(
            DeskEvent::new(DeskEventKind::StatusUpdate)
                .for_conversation(id)
                .for_agent(owner)
                .with_hint(json!({ "status": conversation.status() })),
            &receipt,
        );
        drop(agent_guards);
        drop(guard);

        let survey = self.delivery.request_survey(&conversation, &csat).await;
        Ok(ResolveResult {
            conversation,
            csat,
            survey,
            sequence: receipt.sequence(),
        })
    }

    /// Appends a reply from the owning agent and delivers it.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown conversation or agent
    /// - `Conflict` (`OWNER_MISMATCH`) if the agent does not own the conversation
    /// - `Validation` for blank or oversized text
    pub async fn send_agent_message(
        &self,
        cmd: SendAgentMessageCommand,
        actor: &Actor,
    ) -> Result<AgentReplyResult, EngineError> {
        let id = cmd.conversation_id;
        let agent = self.load_agent(cmd.agent_id).await?;

        let guard = self.lock_conversation(id).await;
        let mut conversation = self.load_conversation(id).await?;
        conversation.ensure_owned_by(cmd.agent_id)?;
        let expected_version = conversation.version();

        let at = Timestamp::monotonic_after(Some(conversation.last_message_at()));
        let message = Message::new(id, SenderKind::Agent, Some(agent.name().to_string()), cmd.text, at)?;
        conversation.record_reply(at);

        let audit = AuditRecord::new(AuditAction::AgentReplied, EntityRef::Conversation(id), actor)
            .with_changes(FieldDiff::new().added("message_id", &message.id));
        let changes = ChangeSet::new(audit)
            .update_conversation(conversation.clone(), expected_version)
            .append_message(message.clone());
        let receipt = self.commit(changes).await?;
        self.publish(
            DeskEvent::new(DeskEventKind::Message)
                .for_conversation(id)
                .for_agent(cmd.agent_id)
                .with_hint(json!({
                    "sender": SenderKind::Agent,
                    "preview": message.preview(120),
                })),
            &receipt,
        );
        drop(guard);

        let outbound = OutboundMessage::to_customer(
            conversation.channel(),
            conversation.customer(),
            message.content.clone(),
        );
        let delivery = self.delivery.deliver(&conversation, outbound).await;
        Ok(AgentReplyResult {
            conversation,
            message,
            delivery,
            sequence: receipt.sequence(),
        })
    }

    /// Fills a pending survey exactly once.
    ///
    /// # Errors
    ///
    /// - `Validation` for a rating outside 1..=5
    /// - `NotFound` for an unknown survey
    /// - `Conflict` (`CSAT_ALREADY_RECORDED`) on a second answer
    pub async fn record_csat(&self, cmd: RecordCsatCommand, actor: &Actor) -> Result<CsatRating, EngineError> {
        let score = CsatScore::new(cmd.rating)?;
        let pending = self
            .store
            .find_csat(cmd.csat_id)
            .await?
            .ok_or_else(|| EngineError::not_found(ErrorCode::CsatNotFound, format!("CSAT {}", cmd.csat_id)))?;

        let conversation_id = pending.conversation_id();
        let _guard = self.lock_conversation(conversation_id).await;
        let mut csat = self
            .store
            .find_csat(cmd.csat_id)
            .await?
            .ok_or_else(|| EngineError::not_found(ErrorCode::CsatNotFound, format!("CSAT {}", cmd.csat_id)))?;
        csat.record(score, cmd.feedback, Timestamp::now())?;

        let diff = FieldDiff::new()
            .added("rating", &score.value())
            .added("feedback", &csat.feedback());
        let audit = AuditRecord::new(AuditAction::CsatRecorded, EntityRef::Csat(csat.id()), actor)
            .in_conversation(conversation_id)
            .with_changes(diff);
        let receipt = self.commit(ChangeSet::new(audit).update_csat(csat.clone())).await?;

        tracing::info!(
            conversation_id = %conversation_id,
            rating = score.value(),
            sequence = receipt.sequence(),
            "CSAT recorded"
        );
        Ok(csat)
    }
}
