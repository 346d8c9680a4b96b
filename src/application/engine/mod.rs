//! Conversation orchestration engine.
//!
//! Every mutating operation follows the same shape:
//!
//! 1. Acquire the conversation lock (and agent locks, conversation first,
//!    agents in id order).
//! 2. Reload the aggregate and apply the domain transition.
//! 3. Commit one [`ChangeSet`] holding the entity writes, load adjustments
//!    and the audit record.
//! 4. Publish the fan-out event stamped with the commit's audit sequence.
//! 5. Release the lock, then perform any network call (AI, delivery,
//!    survey).
//!
//! Publishing under the lock is what keeps per-conversation event order
//! identical to audit order.

mod agents;
mod ai_turn;
mod assignment;
mod ingest;
mod queries;
mod resolution;
mod tickets;

use std::sync::Arc;

use super::{AiResponder, DeliveryService, EngineError, KeyGuard, KeyedLocks, SettingsResolver};
use crate::domain::agent::Agent;
use crate::domain::conversation::Conversation;
use crate::domain::foundation::{AgentId, ConversationId, DeskEvent, ErrorCode, TicketId};
use crate::domain::ticket::{Ticket, TicketPriority};
use crate::ports::{ChangeSet, CommitReceipt, DeskStore, FanoutPublisher};

pub use agents::{RegisterAgentCommand, SetAgentStatusCommand};
pub use ai_turn::{AiTurn, AiTurnOutcome};
pub use assignment::{AssignCommand, AssignResult, EscalateCommand, EscalationResult};
pub use ingest::IngestOutcome;
pub use resolution::{
    AgentReplyResult, RecordCsatCommand, ResolveResult, SendAgentMessageCommand,
};
pub use tickets::{
    OpenTicketCommand, TicketResolution, TicketResult, TicketUpdateResult, UpdateTicketCommand,
};

/// Engine tuning that is not runtime-editable.
#[derive(Debug, Clone)]
pub struct EnginePolicy {
    pub tat_high_minutes: u32,
    pub tat_medium_minutes: u32,
    pub tat_low_minutes: u32,
    /// Messages handed to the AI responder.
    pub history_limit: u32,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            tat_high_minutes: TicketPriority::High.default_tat_minutes(),
            tat_medium_minutes: TicketPriority::Medium.default_tat_minutes(),
            tat_low_minutes: TicketPriority::Low.default_tat_minutes(),
            history_limit: 50,
        }
    }
}

impl EnginePolicy {
    /// Default turn-around time for a new ticket.
    pub fn tat_minutes(&self, priority: TicketPriority) -> u32 {
        match priority {
            TicketPriority::High => self.tat_high_minutes,
            TicketPriority::Medium => self.tat_medium_minutes,
            TicketPriority::Low => self.tat_low_minutes,
        }
    }
}

/// The conversation orchestration engine.
pub struct DeskEngine {
    store: Arc<dyn DeskStore>,
    fanout: Arc<dyn FanoutPublisher>,
    settings: Arc<SettingsResolver>,
    responder: Arc<AiResponder>,
    delivery: Arc<DeliveryService>,
    conversation_locks: KeyedLocks<ConversationId>,
    agent_locks: KeyedLocks<AgentId>,
    policy: EnginePolicy,
}

impl DeskEngine {
    pub fn new(
        store: Arc<dyn DeskStore>,
        fanout: Arc<dyn FanoutPublisher>,
        settings: Arc<SettingsResolver>,
        responder: Arc<AiResponder>,
        delivery: Arc<DeliveryService>,
        policy: EnginePolicy,
    ) -> Self {
        Self {
            store,
            fanout,
            settings,
            responder,
            delivery,
            conversation_locks: KeyedLocks::new(),
            agent_locks: KeyedLocks::new(),
            policy,
        }
    }

    pub fn settings(&self) -> &Arc<SettingsResolver> {
        &self.settings
    }

    pub fn fanout(&self) -> &Arc<dyn FanoutPublisher> {
        &self.fanout
    }

    pub fn delivery(&self) -> &Arc<DeliveryService> {
        &self.delivery
    }

    pub fn policy(&self) -> &EnginePolicy {
        &self.policy
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shared steps
    // ─────────────────────────────────────────────────────────────────────────

    async fn lock_conversation(&self, id: ConversationId) -> KeyGuard {
        self.conversation_locks.acquire(&id).await
    }

    /// Locks the given agents in a deterministic order.
    async fn lock_agents(&self, agents: &[AgentId]) -> Vec<KeyGuard> {
        let mut ids: Vec<AgentId> = agents.to_vec();
        ids.sort_by_key(|id| *id.as_uuid());
        ids.dedup();
        let mut guards = Vec::with_capacity(ids.len());
        for id in &ids {
            guards.push(self.agent_locks.acquire(id).await);
        }
        guards
    }

    async fn load_conversation(&self, id: ConversationId) -> Result<Conversation, EngineError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| EngineError::not_found(ErrorCode::ConversationNotFound, format!("Conversation {}", id)))
    }

    async fn load_agent(&self, id: AgentId) -> Result<Agent, EngineError> {
        self.store
            .find_agent(id)
            .await?
            .ok_or_else(|| EngineError::not_found(ErrorCode::AgentNotFound, format!("Agent {}", id)))
    }

    async fn load_ticket(&self, id: TicketId) -> Result<Ticket, EngineError> {
        self.store
            .find_ticket(id)
            .await?
            .ok_or_else(|| EngineError::not_found(ErrorCode::TicketNotFound, format!("Ticket {}", id)))
    }

    async fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, EngineError> {
        changes.validate()?;
        let receipt = self.store.commit(changes).await?;
        Ok(receipt)
    }

    /// Publishes `event` stamped with the commit's sequence. Callers hold the
    /// conversation lock.
    fn publish(&self, event: DeskEvent, receipt: &CommitReceipt) {
        let event = event.with_sequence(receipt.sequence());
        tracing::debug!(
            kind = %event.kind,
            sequence = receipt.sequence(),
            conversation_id = ?event.conversation_id,
            "Publishing desk event"
        );
        self.fanout.publish(event);
    }
}
