//! Ingest of canonical inbound messages.

use serde_json::json;

use super::{AiTurn, DeskEngine};
use crate::application::EngineError;
use crate::domain::audit::{AuditAction, AuditRecord, EntityRef, FieldDiff};
use crate::domain::conversation::{Channel, Conversation, InboundMessage, Message, SenderKind};
use crate::domain::foundation::{
    Actor, ConversationId, DeskEvent, DeskEventKind, ErrorCode, Timestamp,
};
use crate::ports::ChangeSet;

const PREVIEW_CHARS: usize = 120;

/// Result of ingesting one inbound message.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub conversation: Conversation,
    pub message: Message,
    /// The message started a new conversation.
    pub created: bool,
    /// The message reopened a resolved or ticketed conversation.
    pub reopened: bool,
    /// Set when the AI should answer; run it with `run_ai_turn`.
    pub ai_turn: Option<AiTurn>,
    pub sequence: u64,
}

impl DeskEngine {
    /// Appends a customer message, creating or reopening the conversation.
    ///
    /// A conversation reopened while one of its tickets is still open goes
    /// to the agent queue (escalation pending) and gets no AI turn.
    ///
    /// Lookup-or-create is keyed by channel and external user id. Two
    /// concurrent first messages from the same user race on the insert; the
    /// loser retries once and appends to the winner's conversation.
    ///
    /// # Errors
    ///
    /// - `Validation` for blank or oversized content, or a disabled channel
    pub async fn ingest(&self, inbound: InboundMessage) -> Result<IngestOutcome, EngineError> {
        let settings = self.settings.resolve().await;
        if !settings.channel_enabled(inbound.channel) {
            return Err(EngineError::channel_disabled(inbound.channel));
        }

        match self.ingest_once(&inbound).await {
            Err(err) if err.code() == ErrorCode::ConcurrentModification => {
                tracing::debug!(
                    channel = %inbound.channel,
                    "Conversation created concurrently, retrying ingest"
                );
                self.ingest_once(&inbound).await
            }
            other => other,
        }
    }

    async fn ingest_once(&self, inbound: &InboundMessage) -> Result<IngestOutcome, EngineError> {
        let existing = self
            .store
            .find_by_external_user(inbound.channel, &inbound.customer.external_user_id)
            .await?;
        match existing {
            Some(conversation) => self.append_inbound(conversation.id(), inbound).await,
            None => self.create_from_inbound(inbound).await,
        }
    }

    async fn create_from_inbound(&self, inbound: &InboundMessage) -> Result<IngestOutcome, EngineError> {
        let at = Timestamp::now();
        let conversation = Conversation::start(inbound.channel, inbound.customer.clone(), at);
        let id = conversation.id();
        let message = customer_message(id, inbound, at)?;
        let actor = Actor::customer(inbound.customer.name.clone());

        let diff = FieldDiff::new()
            .added("status", &conversation.status())
            .added("channel", &conversation.channel())
            .added("message_id", &message.id);
        let audit = AuditRecord::new(AuditAction::Created, EntityRef::Conversation(id), &actor)
            .with_changes(diff);
        let changes = ChangeSet::new(audit)
            .insert_conversation(conversation.clone())
            .append_message(message.clone());

        let _guard = self.lock_conversation(id).await;
        let receipt = self.commit(changes).await?;
        tracing::info!(
            conversation_id = %id,
            channel = %inbound.channel,
            sequence = receipt.sequence(),
            "Conversation created"
        );
        self.publish(
            DeskEvent::new(DeskEventKind::NewChat)
                .for_conversation(id)
                .with_hint(json!({
                    "channel": conversation.channel(),
                    "customer": conversation.customer().name,
                    "preview": message.preview(PREVIEW_CHARS),
                })),
            &receipt,
        );

        Ok(IngestOutcome {
            ai_turn: Some(AiTurn::for_conversation(&conversation)),
            sequence: receipt.sequence(),
            conversation,
            message,
            created: true,
            reopened: false,
        })
    }

    async fn append_inbound(
        &self,
        id: ConversationId,
        inbound: &InboundMessage,
    ) -> Result<IngestOutcome, EngineError> {
        let _guard = self.lock_conversation(id).await;
        let mut conversation = self.load_conversation(id).await?;
        let expected_version = conversation.version();
        let previous_status = conversation.status();

        let at = Timestamp::monotonic_after(Some(conversation.last_message_at()));
        let message = customer_message(id, inbound, at)?;
        let open_ticket = self.store.find_open_ticket(id).await?;
        let reopened = match &open_ticket {
            Some(_) => conversation.record_ticket_follow_up(at)?,
            None => conversation.record_customer_message(at)?,
        };
        let actor = Actor::customer(inbound.customer.name.clone());

        let diff = FieldDiff::new()
            .added("message_id", &message.id)
            .field("status", &previous_status, &conversation.status());
        let audit = AuditRecord::new(AuditAction::MessageReceived, EntityRef::Conversation(id), &actor)
            .with_changes(diff);
        let mut changes = ChangeSet::new(audit)
            .update_conversation(conversation.clone(), expected_version)
            .append_message(message.clone());

        if inbound.channel == Channel::EmailLike {
            if let Some(ticket) = &open_ticket {
                let reply = AuditRecord::new(
                    AuditAction::EmailReplyReceived,
                    EntityRef::Ticket(ticket.id()),
                    &actor,
                )
                .in_conversation(id)
                .with_changes(
                    FieldDiff::new()
                        .added("message_id", &message.id)
                        .added("subject", &inbound.subject),
                );
                changes = changes.also_audit(reply);
            }
        }

        let receipt = self.commit(changes).await?;
        if reopened {
            tracing::info!(
                conversation_id = %id,
                previous_status = %previous_status,
                awaiting_agent = conversation.is_escalation_pending(),
                "Conversation reopened by customer message"
            );
        }
        self.publish(
            DeskEvent::new(DeskEventKind::Message)
                .for_conversation(id)
                .with_hint(json!({
                    "sender": SenderKind::Customer,
                    "status": conversation.status(),
                    "awaiting_agent": conversation.is_escalation_pending(),
                    "preview": message.preview(PREVIEW_CHARS),
                })),
            &receipt,
        );

        Ok(IngestOutcome {
            ai_turn: conversation
                .is_ai_handled()
                .then(|| AiTurn::for_conversation(&conversation)),
            sequence: receipt.sequence(),
            conversation,
            message,
            created: false,
            reopened,
        })
    }
}

fn customer_message(
    id: ConversationId,
    inbound: &InboundMessage,
    at: Timestamp,
) -> Result<Message, EngineError> {
    let message = Message::new(
        id,
        SenderKind::Customer,
        Some(inbound.customer.name.clone()),
        inbound.content.clone(),
        at,
    )?;
    Ok(message)
}
