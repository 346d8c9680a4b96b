//! AI turns with the stale-result guard.
//!
//! The provider call runs without the conversation lock. The turn records
//! the conversation version it was computed against; if anything changed
//! the conversation in the meantime (escalation, claim, a newer customer
//! message) the result is discarded.

use std::sync::Arc;

use serde_json::json;
use tokio::task::JoinHandle;

use super::DeskEngine;
use crate::application::{AiOutcome, DeliveryStatus, EngineError};
use crate::domain::audit::{AuditAction, AuditRecord, EntityRef, FieldDiff};
use crate::domain::conversation::{Conversation, Message, OutboundMessage, SenderKind};
use crate::domain::foundation::{Actor, ConversationId, DeskEvent, DeskEventKind, Timestamp};
use crate::ports::ChangeSet;

/// Display name on AI messages.
const AI_SENDER_NAME: &str = "AI Assistant";

/// A pending AI turn: the conversation and the version it must still be at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiTurn {
    pub conversation_id: ConversationId,
    pub version: u64,
}

impl AiTurn {
    pub fn for_conversation(conversation: &Conversation) -> Self {
        Self {
            conversation_id: conversation.id(),
            version: conversation.version(),
        }
    }
}

/// What an AI turn did.
#[derive(Debug, Clone)]
pub enum AiTurnOutcome {
    Replied {
        message: Message,
        delivery: DeliveryStatus,
    },
    Escalated {
        reason: String,
    },
    /// The conversation moved on; nothing was written.
    Stale,
}

impl DeskEngine {
    /// Runs one AI turn to completion.
    pub async fn run_ai_turn(&self, turn: AiTurn) -> Result<AiTurnOutcome, EngineError> {
        let id = turn.conversation_id;
        let settings = self.settings.resolve().await;

        let conversation = self.load_conversation(id).await?;
        if conversation.version() != turn.version || !conversation.is_ai_handled() {
            tracing::debug!(conversation_id = %id, "AI turn superseded before start");
            return Ok(AiTurnOutcome::Stale);
        }
        let history = self
            .store
            .messages(id, Some(self.policy.history_limit))
            .await?;

        let outcome = self.responder.respond(&conversation, &history, &settings).await;

        let guard = self.lock_conversation(id).await;
        let mut conversation = self.load_conversation(id).await?;
        if conversation.version() != turn.version || !conversation.is_ai_handled() {
            tracing::info!(
                conversation_id = %id,
                computed_for = turn.version,
                current = conversation.version(),
                "Discarding stale AI result"
            );
            return Ok(AiTurnOutcome::Stale);
        }

        match outcome {
            AiOutcome::Reply { text, model } => {
                let at = Timestamp::monotonic_after(Some(conversation.last_message_at()));
                let message = Message::new(id, SenderKind::Ai, Some(AI_SENDER_NAME.to_string()), text, at)?;
                conversation.record_reply(at);

                let diff = FieldDiff::new()
                    .added("message_id", &message.id)
                    .added("model", &model);
                let audit = AuditRecord::new(AuditAction::AiReplied, EntityRef::Conversation(id), &Actor::ai())
                    .with_changes(diff);
                let changes = ChangeSet::new(audit)
                    .update_conversation(conversation.clone(), turn.version)
                    .append_message(message.clone());
                let receipt = self.commit(changes).await?;
                self.publish(
                    DeskEvent::new(DeskEventKind::Message)
                        .for_conversation(id)
                        .with_hint(json!({
                            "sender": SenderKind::Ai,
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
                Ok(AiTurnOutcome::Replied { message, delivery })
            }
            AiOutcome::Unresolved(reason) => {
                let reason = reason.describe();
                tracing::info!(conversation_id = %id, reason = %reason, "AI could not resolve, escalating");
                self.apply_escalation(conversation, Some(reason.clone()), &Actor::ai())
                    .await?;
                drop(guard);
                Ok(AiTurnOutcome::Escalated { reason })
            }
        }
    }

    /// Runs the turn on a background task, logging failures.
    pub fn spawn_ai_turn(self: &Arc<Self>, turn: AiTurn) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = engine.run_ai_turn(turn).await {
                tracing::warn!(
                    conversation_id = %turn.conversation_id,
                    error = %err,
                    "AI turn failed"
                );
            }
        })
    }
}
