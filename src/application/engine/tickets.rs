//! Ticket lifecycle: open, update, resolve (with conversation cascade).

use serde_json::json;

use super::DeskEngine;
use crate::application::{DeliveryStatus, EngineError};
use crate::domain::audit::{AuditAction, AuditRecord, EntityRef, FieldDiff};
use crate::domain::conversation::{Conversation, ConversationStatus};
use crate::domain::foundation::{
    Actor, ConversationId, DeskEvent, DeskEventKind, ErrorCode, TicketId, Timestamp,
};
use crate::domain::ticket::{CsatRating, NewTicket, Ticket, TicketUpdate};
use crate::ports::{ChangeSet, LoadAdjustment};

/// Convert a conversation into a ticket.
#[derive(Debug, Clone)]
pub struct OpenTicketCommand {
    pub conversation_id: ConversationId,
    pub ticket: NewTicket,
    /// Refuse unless the conversation is still waiting for an agent.
    pub only_if_unclaimed: bool,
}

#[derive(Debug, Clone)]
pub struct TicketResult {
    pub ticket: Ticket,
    pub conversation: Conversation,
    pub sequence: u64,
}

#[derive(Debug, Clone)]
pub struct UpdateTicketCommand {
    pub ticket_id: TicketId,
    pub update: TicketUpdate,
}

#[derive(Debug, Clone)]
pub struct TicketUpdateResult {
    pub ticket: Ticket,
    /// `None` when the update changed nothing and nothing was written.
    pub sequence: Option<u64>,
}

/// Outcome of `resolve_ticket`.
#[derive(Debug, Clone)]
pub struct TicketResolution {
    pub ticket: Ticket,
    pub conversation: Conversation,
    /// Survey tied to this ticket (created now, or by the first resolve).
    pub csat: Option<CsatRating>,
    /// `false` for a repeated resolve, which writes nothing.
    pub newly_resolved: bool,
    pub survey: Option<DeliveryStatus>,
    pub sequence: Option<u64>,
}

impl DeskEngine {
    /// Moves a conversation to `ticket` and opens a ticket for it, releasing
    /// any owning agent.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown conversation
    /// - `Conflict` if an unresolved ticket exists or the conversation is closed
    /// - `Validation` for invalid ticket fields
    pub async fn open_ticket(&self, cmd: OpenTicketCommand, actor: &Actor) -> Result<TicketResult, EngineError> {
        let id = cmd.conversation_id;
        let _guard = self.lock_conversation(id).await;
        let mut conversation = self.load_conversation(id).await?;
        let owner = conversation.assigned_agent();
        let _agent_guards = self.lock_agents(&owner.into_iter().collect::<Vec<_>>()).await;

        if cmd.only_if_unclaimed && !conversation.is_escalation_pending() {
            return Err(EngineError::conflict(
                ErrorCode::InvalidStateTransition,
                format!("Conversation {} is no longer awaiting an agent", id),
            ));
        }
        if let Some(existing) = self.store.find_open_ticket(id).await? {
            return Err(EngineError::conflict(
                ErrorCode::OpenTicketExists,
                format!("Conversation {} already has open ticket {}", id, existing.id()),
            ));
        }

        let expected_version = conversation.version();
        let previous_status = conversation.status();
        let at = Timestamp::now();
        let ticket = Ticket::open(id, cmd.ticket, |p| self.policy.tat_minutes(p), at)?;
        let released = conversation.convert_to_ticket(at)?;

        let diff = FieldDiff::new()
            .added("title", ticket.title())
            .added("priority", &ticket.priority())
            .added("tat_minutes", &ticket.tat_minutes())
            .field("conversation_status", &previous_status, &conversation.status())
            .field("assigned_agent", &owner, &conversation.assigned_agent());
        let audit = AuditRecord::new(AuditAction::Created, EntityRef::Ticket(ticket.id()), actor)
            .in_conversation(id)
            .with_changes(diff);
        let mut changes = ChangeSet::new(audit)
            .update_conversation(conversation.clone(), expected_version)
            .insert_ticket(ticket.clone());
        if let Some(agent) = released {
            changes = changes.adjust_load(LoadAdjustment::release(agent));
        }
        let receipt = self.commit(changes).await?;

        tracing::info!(
            conversation_id = %id,
            ticket_id = %ticket.id(),
            priority = %ticket.priority(),
            sequence = receipt.sequence(),
            "Ticket opened"
        );
        self.publish(
            DeskEvent::new(DeskEventKind::StatusUpdate)
                .for_conversation(id)
                .for_ticket(ticket.id())
                .with_hint(json!({
                    "status": conversation.status(),
                    "ticket_status": ticket.status(),
                })),
            &receipt,
        );

        Ok(TicketResult {
            ticket,
            conversation,
            sequence: receipt.sequence(),
        })
    }

    /// Parks an escalation-pending conversation back under its open ticket.
    ///
    /// Used when a customer follow-up on an open ticket was not claimed in
    /// time. Returns `None` (and writes nothing) when the conversation has no
    /// open ticket.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown conversation
    /// - `Conflict` if the conversation is no longer awaiting an agent
    pub async fn return_to_open_ticket(
        &self,
        conversation_id: ConversationId,
        actor: &Actor,
    ) -> Result<Option<TicketResult>, EngineError> {
        let _guard = self.lock_conversation(conversation_id).await;
        let mut conversation = self.load_conversation(conversation_id).await?;
        if !conversation.is_escalation_pending() {
            return Err(EngineError::conflict(
                ErrorCode::InvalidStateTransition,
                format!("Conversation {} is no longer awaiting an agent", conversation_id),
            ));
        }
        let Some(ticket) = self.store.find_open_ticket(conversation_id).await? else {
            return Ok(None);
        };

        let expected_version = conversation.version();
        let previous_status = conversation.status();
        conversation.convert_to_ticket(Timestamp::now())?;

        let diff = FieldDiff::new()
            .field("status", &previous_status, &conversation.status())
            .added("ticket_id", &ticket.id());
        let audit = AuditRecord::new(
            AuditAction::StatusChanged,
            EntityRef::Conversation(conversation_id),
            actor,
        )
        .with_changes(diff);
        let receipt = self
            .commit(ChangeSet::new(audit).update_conversation(conversation.clone(), expected_version))
            .await?;

        tracing::info!(
            conversation_id = %conversation_id,
            ticket_id = %ticket.id(),
            sequence = receipt.sequence(),
            "Conversation returned to open ticket"
        );
        self.publish(
            DeskEvent::new(DeskEventKind::StatusUpdate)
                .for_conversation(conversation_id)
                .for_ticket(ticket.id())
                .with_hint(json!({
                    "status": conversation.status(),
                    "ticket_status": ticket.status(),
                })),
            &receipt,
        );

        Ok(Some(TicketResult {
            ticket,
            conversation,
            sequence: receipt.sequence(),
        }))
    }

    /// Edits ticket fields. An update that changes nothing writes nothing.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown ticket
    /// - `Conflict` for a resolved ticket or an invalid status move
    /// - `Validation` for invalid fields
    pub async fn update_ticket(
        &self,
        cmd: UpdateTicketCommand,
        actor: &Actor,
    ) -> Result<TicketUpdateResult, EngineError> {
        let conversation_id = self.load_ticket(cmd.ticket_id).await?.conversation_id();
        let _guard = self.lock_conversation(conversation_id).await;
        let mut ticket = self.load_ticket(cmd.ticket_id).await?;

        let diff = ticket.apply_update(cmd.update, Timestamp::now())?;
        if diff.is_empty() {
            return Ok(TicketUpdateResult {
                ticket,
                sequence: None,
            });
        }

        let audit = AuditRecord::new(AuditAction::Updated, EntityRef::Ticket(ticket.id()), actor)
            .in_conversation(conversation_id)
            .with_changes(diff);
        let receipt = self
            .commit(ChangeSet::new(audit).update_ticket(ticket.clone()))
            .await?;

        tracing::info!(ticket_id = %ticket.id(), sequence = receipt.sequence(), "Ticket updated");
        self.publish(
            DeskEvent::new(DeskEventKind::StatusUpdate)
                .for_conversation(conversation_id)
                .for_ticket(ticket.id())
                .with_hint(json!({ "ticket_status": ticket.status() })),
            &receipt,
        );
        Ok(TicketUpdateResult {
            ticket,
            sequence: Some(receipt.sequence()),
        })
    }

    /// Resolves a ticket and requests one survey.
    ///
    /// When the linked conversation is `assigned` it is resolved in the same
    /// commit and its owner released. Resolving an already-resolved ticket
    /// succeeds without writing, notifying or re-sending the survey.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown ticket
    pub async fn resolve_ticket(&self, ticket_id: TicketId, actor: &Actor) -> Result<TicketResolution, EngineError> {
        let conversation_id = self.load_ticket(ticket_id).await?.conversation_id();
        let guard = self.lock_conversation(conversation_id).await;
        let mut ticket = self.load_ticket(ticket_id).await?;
        let mut conversation = self.load_conversation(conversation_id).await?;

        let owner = conversation.assigned_agent();
        let agent_guards = self.lock_agents(&owner.into_iter().collect::<Vec<_>>()).await;

        let previous_ticket_status = ticket.status();
        let at = Timestamp::now();
        if !ticket.resolve(at)? {
            let csat = self
                .store
                .csat_for_conversation(conversation_id)
                .await?
                .into_iter()
                .find(|c| c.ticket_id() == Some(ticket_id));
            tracing::debug!(ticket_id = %ticket_id, "Ticket already resolved");
            return Ok(TicketResolution {
                ticket,
                conversation,
                csat,
                newly_resolved: false,
                survey: None,
                sequence: None,
            });
        }

        let expected_version = conversation.version();
        let previous_status = conversation.status();
        let released = if conversation.status() == ConversationStatus::Assigned {
            Some(conversation.resolve(at)?)
        } else {
            None
        };
        let csat = CsatRating::request(conversation_id, Some(ticket_id), at);

        let diff = FieldDiff::new()
            .field("status", &previous_ticket_status, &ticket.status())
            .added("resolved_at", &ticket.resolved_at())
            .field("conversation_status", &previous_status, &conversation.status())
            .added("csat_id", &csat.id());
        let audit = AuditRecord::new(AuditAction::ResolutionSent, EntityRef::Ticket(ticket_id), actor)
            .in_conversation(conversation_id)
            .with_changes(diff);
        let mut changes = ChangeSet::new(audit)
            .update_ticket(ticket.clone())
            .insert_csat(csat.clone());
        if let Some(agent) = released {
            changes = changes
                .update_conversation(conversation.clone(), expected_version)
                .adjust_load(LoadAdjustment::release(agent));
        }
        let receipt = self.commit(changes).await?;

        tracing::info!(
            ticket_id = %ticket_id,
            conversation_id = %conversation_id,
            cascaded = released.is_some(),
            sequence = receipt.sequence(),
            "Ticket resolved"
        );
        let mut event = DeskEvent::new(DeskEventKind::StatusUpdate)
            .for_conversation(conversation_id)
            .for_ticket(ticket_id)
            .with_hint(json!({
                "status": conversation.status(),
                "ticket_status": ticket.status(),
            }));
        if let Some(agent) = released {
            event = event.for_agent(agent);
        }
        self.publish(event, &receipt);
        drop(agent_guards);
        drop(guard);

        let survey = self.delivery.request_survey(&conversation, &csat).await;
        Ok(TicketResolution {
            ticket,
            conversation,
            csat: Some(csat),
            newly_resolved: true,
            survey: Some(survey),
            sequence: Some(receipt.sequence()),
        })
    }
}
