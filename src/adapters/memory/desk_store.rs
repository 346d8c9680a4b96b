//! In-memory desk store.
//!
//! Implements every read port and the [`TransitionCommitter`] over a single
//! mutex-guarded state. A commit stages all writes against a copy of the
//! entities it touches, checks every compare-and-swap condition, and only
//! then applies the writes and appends the audit records, so a failed
//! commit leaves no trace.
//!
//! Used by the test suites and by single-process deployments that run
//! without `SUPPORT_DESK__DATABASE__URL`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::agent::Agent;
use crate::domain::audit::{AuditLogEntry, EntityRef};
use crate::domain::conversation::{Channel, Conversation, Message};
use crate::domain::foundation::{
    AgentId, ConversationId, CsatId, DomainError, ErrorCode, ExternalUserId, TicketId, Timestamp,
};
use crate::domain::ticket::{CsatRating, Ticket};
use crate::ports::{
    AgentRepository, AuditLogReader, ChangeSet, CommitReceipt, ConversationFilter,
    ConversationRepository, ConversationWrite, CsatRepository, EntityWrite, TicketRepository,
    TransitionCommitter,
};

const DEFAULT_LIST_LIMIT: usize = 100;

#[derive(Default)]
struct DeskState {
    conversations: HashMap<ConversationId, Conversation>,
    by_external_user: HashMap<(Channel, ExternalUserId), ConversationId>,
    messages: HashMap<ConversationId, Vec<Message>>,
    agents: HashMap<AgentId, Agent>,
    tickets: HashMap<TicketId, Ticket>,
    csat: HashMap<CsatId, CsatRating>,
    audit: Vec<AuditLogEntry>,
}

impl DeskState {
    fn next_sequence(&self) -> u64 {
        self.audit.last().map(|e| e.sequence).unwrap_or(0) + 1
    }

    fn has_open_ticket(&self, conversation_id: ConversationId, except: Option<TicketId>) -> bool {
        self.tickets.values().any(|t| {
            t.conversation_id() == conversation_id && t.is_open() && Some(t.id()) != except
        })
    }
}

/// Desk store held entirely in process memory.
#[derive(Default)]
pub struct MemoryDeskStore {
    state: Mutex<DeskState>,
}

impl MemoryDeskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, DeskState>, DomainError> {
        self.state
            .lock()
            .map_err(|_| DomainError::new(ErrorCode::InternalError, "Desk store lock poisoned"))
    }

    /// Number of audit entries (for test assertions).
    pub fn audit_len(&self) -> usize {
        self.state().map(|s| s.audit.len()).unwrap_or(0)
    }
}

/// Writes staged by a commit, applied only after every check passed.
struct Staged {
    conversation: Option<Conversation>,
    agents: HashMap<AgentId, Agent>,
}

fn stage(state: &DeskState, changes: &ChangeSet) -> Result<Staged, DomainError> {
    let conversation = match &changes.conversation {
        Some(ConversationWrite::Insert(conversation)) => {
            let key = (conversation.channel(), conversation.customer().external_user_id.clone());
            if state.conversations.contains_key(&conversation.id())
                || state.by_external_user.contains_key(&key)
            {
                return Err(DomainError::new(
                    ErrorCode::ConcurrentModification,
                    format!(
                        "A conversation already exists for {} user {}",
                        key.0, key.1
                    ),
                ));
            }
            Some(conversation.clone())
        }
        Some(ConversationWrite::Update {
            conversation,
            expected_version,
        }) => {
            let stored = state.conversations.get(&conversation.id()).ok_or_else(|| {
                DomainError::new(
                    ErrorCode::ConversationNotFound,
                    format!("Conversation {} not found", conversation.id()),
                )
            })?;
            if stored.version() != *expected_version {
                return Err(DomainError::new(
                    ErrorCode::ConcurrentModification,
                    format!(
                        "Conversation {} is at version {}, expected {}",
                        conversation.id(),
                        stored.version(),
                        expected_version
                    ),
                ));
            }
            Some(conversation.clone())
        }
        None => None,
    };

    for message in &changes.messages {
        let known = state.conversations.contains_key(&message.conversation_id)
            || conversation.as_ref().map(|c| c.id()) == Some(message.conversation_id);
        if !known {
            return Err(DomainError::new(
                ErrorCode::ConversationNotFound,
                format!("Conversation {} not found", message.conversation_id),
            ));
        }
    }

    let mut agents: HashMap<AgentId, Agent> = HashMap::new();
    if let Some(agent) = &changes.new_agent {
        if state.agents.contains_key(&agent.id()) {
            return Err(DomainError::new(
                ErrorCode::ConcurrentModification,
                format!("Agent {} already exists", agent.id()),
            ));
        }
        agents.insert(agent.id(), agent.clone());
    }

    let staged_agent = |id: AgentId, agents: &mut HashMap<AgentId, Agent>| -> Result<(), DomainError> {
        if agents.contains_key(&id) {
            return Ok(());
        }
        let agent = state.agents.get(&id).cloned().ok_or_else(|| {
            DomainError::new(ErrorCode::AgentNotFound, format!("Agent {} not found", id))
        })?;
        agents.insert(id, agent);
        Ok(())
    };

    if let Some(change) = &changes.agent_status {
        staged_agent(change.agent_id, &mut agents)?;
        if let Some(agent) = agents.get_mut(&change.agent_id) {
            if agent.status() != change.expected {
                return Err(DomainError::new(
                    ErrorCode::ConcurrentModification,
                    format!(
                        "Agent {} is {}, expected {}",
                        change.agent_id,
                        agent.status(),
                        change.expected
                    ),
                ));
            }
            agent.set_status(change.new_status)?;
        }
    }

    for adjustment in &changes.load_adjustments {
        staged_agent(adjustment.agent_id, &mut agents)?;
        if let Some(agent) = agents.get_mut(&adjustment.agent_id) {
            agent.adjust_load(adjustment.delta, adjustment.require_available)?;
        }
    }

    match &changes.ticket {
        Some(EntityWrite::Insert(ticket)) => {
            if state.has_open_ticket(ticket.conversation_id(), None) {
                return Err(DomainError::new(
                    ErrorCode::OpenTicketExists,
                    format!("Conversation {} already has an open ticket", ticket.conversation_id()),
                ));
            }
        }
        Some(EntityWrite::Update(ticket)) => {
            if !state.tickets.contains_key(&ticket.id()) {
                return Err(DomainError::new(
                    ErrorCode::TicketNotFound,
                    format!("Ticket {} not found", ticket.id()),
                ));
            }
            if ticket.is_open() && state.has_open_ticket(ticket.conversation_id(), Some(ticket.id())) {
                return Err(DomainError::new(
                    ErrorCode::OpenTicketExists,
                    format!("Conversation {} already has an open ticket", ticket.conversation_id()),
                ));
            }
        }
        None => {}
    }

    if let Some(EntityWrite::Update(csat)) = &changes.csat {
        if !state.csat.contains_key(&csat.id()) {
            return Err(DomainError::new(
                ErrorCode::CsatNotFound,
                format!("CSAT {} not found", csat.id()),
            ));
        }
    }

    Ok(Staged {
        conversation,
        agents,
    })
}

#[async_trait]
impl TransitionCommitter for MemoryDeskStore {
    async fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, DomainError> {
        changes.validate()?;
        let mut state = self.state()?;
        let staged = stage(&state, &changes)?;

        if let Some(conversation) = staged.conversation {
            let key = (conversation.channel(), conversation.customer().external_user_id.clone());
            state.by_external_user.insert(key, conversation.id());
            state.conversations.insert(conversation.id(), conversation);
        }
        for message in changes.messages {
            state
                .messages
                .entry(message.conversation_id)
                .or_default()
                .push(message);
        }
        state.agents.extend(staged.agents);
        if let Some(write) = changes.ticket {
            let ticket = match write {
                EntityWrite::Insert(t) | EntityWrite::Update(t) => t,
            };
            state.tickets.insert(ticket.id(), ticket);
        }
        if let Some(write) = changes.csat {
            let csat = match write {
                EntityWrite::Insert(c) | EntityWrite::Update(c) => c,
            };
            state.csat.insert(csat.id(), csat);
        }

        let mut entries = Vec::with_capacity(changes.audit.len());
        for record in changes.audit {
            let entry = AuditLogEntry {
                sequence: state.next_sequence(),
                record,
            };
            state.audit.push(entry.clone());
            entries.push(entry);
        }
        Ok(CommitReceipt { entries })
    }
}

#[async_trait]
impl ConversationRepository for MemoryDeskStore {
    async fn find_by_id(&self, id: ConversationId) -> Result<Option<Conversation>, DomainError> {
        Ok(self.state()?.conversations.get(&id).cloned())
    }

    async fn find_by_external_user(
        &self,
        channel: Channel,
        external_user_id: &ExternalUserId,
    ) -> Result<Option<Conversation>, DomainError> {
        let state = self.state()?;
        Ok(state
            .by_external_user
            .get(&(channel, external_user_id.clone()))
            .and_then(|id| state.conversations.get(id))
            .cloned())
    }

    async fn list(&self, filter: &ConversationFilter) -> Result<Vec<Conversation>, DomainError> {
        let state = self.state()?;
        let mut found: Vec<Conversation> = state
            .conversations
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.last_message_at().cmp(a.last_message_at()));
        found.truncate(filter.limit.map_or(DEFAULT_LIST_LIMIT, |l| l as usize));
        Ok(found)
    }

    async fn list_escalated_before(&self, cutoff: Timestamp) -> Result<Vec<Conversation>, DomainError> {
        let state = self.state()?;
        let mut found: Vec<Conversation> = state
            .conversations
            .values()
            .filter(|c| c.is_escalation_pending())
            .filter(|c| c.escalated_at().map_or(false, |at| at.is_before(&cutoff)))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.escalated_at().cmp(&b.escalated_at()));
        Ok(found)
    }

    async fn messages(&self, id: ConversationId, limit: Option<u32>) -> Result<Vec<Message>, DomainError> {
        let state = self.state()?;
        let all = state.messages.get(&id).map(Vec::as_slice).unwrap_or_default();
        let skip = limit.map_or(0, |l| all.len().saturating_sub(l as usize));
        Ok(all[skip..].to_vec())
    }
}

#[async_trait]
impl AgentRepository for MemoryDeskStore {
    async fn find_agent(&self, id: AgentId) -> Result<Option<Agent>, DomainError> {
        Ok(self.state()?.agents.get(&id).cloned())
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, DomainError> {
        let mut agents: Vec<Agent> = self.state()?.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.created_at().cmp(b.created_at()).then(a.id().cmp(&b.id())));
        Ok(agents)
    }
}

#[async_trait]
impl TicketRepository for MemoryDeskStore {
    async fn find_ticket(&self, id: TicketId) -> Result<Option<Ticket>, DomainError> {
        Ok(self.state()?.tickets.get(&id).cloned())
    }

    async fn find_open_ticket(&self, conversation_id: ConversationId) -> Result<Option<Ticket>, DomainError> {
        Ok(self
            .state()?
            .tickets
            .values()
            .find(|t| t.conversation_id() == conversation_id && t.is_open())
            .cloned())
    }

    async fn tickets_for_conversation(&self, conversation_id: ConversationId) -> Result<Vec<Ticket>, DomainError> {
        let mut tickets: Vec<Ticket> = self
            .state()?
            .tickets
            .values()
            .filter(|t| t.conversation_id() == conversation_id)
            .cloned()
            .collect();
        tickets.sort_by(|a, b| a.created_at().cmp(b.created_at()));
        Ok(tickets)
    }
}

#[async_trait]
impl CsatRepository for MemoryDeskStore {
    async fn find_csat(&self, id: CsatId) -> Result<Option<CsatRating>, DomainError> {
        Ok(self.state()?.csat.get(&id).cloned())
    }

    async fn csat_for_conversation(&self, conversation_id: ConversationId) -> Result<Vec<CsatRating>, DomainError> {
        let mut ratings: Vec<CsatRating> = self
            .state()?
            .csat
            .values()
            .filter(|c| c.conversation_id() == conversation_id)
            .cloned()
            .collect();
        ratings.sort_by(|a, b| a.requested_at().cmp(b.requested_at()));
        Ok(ratings)
    }
}

#[async_trait]
impl AuditLogReader for MemoryDeskStore {
    async fn entity_history(&self, entity: EntityRef) -> Result<Vec<AuditLogEntry>, DomainError> {
        Ok(self
            .state()?
            .audit
            .iter()
            .filter(|e| e.record.entity == entity)
            .cloned()
            .collect())
    }

    async fn conversation_history(&self, conversation_id: ConversationId) -> Result<Vec<AuditLogEntry>, DomainError> {
        Ok(self
            .state()?
            .audit
            .iter()
            .filter(|e| e.concerns_conversation(conversation_id))
            .cloned()
            .collect())
    }

    async fn last_sequence(&self) -> Result<u64, DomainError> {
        Ok(self.state()?.audit.last().map(|e| e.sequence).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentStatus;
    use crate::domain::audit::{AuditAction, AuditRecord};
    use crate::domain::conversation::{CustomerIdentity, SenderKind};
    use crate::domain::foundation::Actor;
    use crate::domain::ticket::{NewTicket, TicketPriority};
    use crate::ports::{AgentStatusChange, LoadAdjustment};

    fn conversation(user: &str) -> Conversation {
        let customer = CustomerIdentity::new("Ana", ExternalUserId::new(user).unwrap());
        Conversation::start(Channel::Widget, customer, Timestamp::now())
    }

    fn audit_for(conversation: &Conversation) -> AuditRecord {
        AuditRecord::new(
            AuditAction::Created,
            EntityRef::Conversation(conversation.id()),
            &Actor::system(),
        )
    }

    async fn store_with(conversation: &Conversation) -> MemoryDeskStore {
        let store = MemoryDeskStore::new();
        store
            .commit(ChangeSet::new(audit_for(conversation)).insert_conversation(conversation.clone()))
            .await
            .unwrap();
        store
    }

    async fn available_agent(store: &MemoryDeskStore) -> Agent {
        let agent = Agent::register("Dana", None, None).unwrap();
        let record = AuditRecord::new(AuditAction::Created, EntityRef::Agent(agent.id()), &Actor::system());
        store
            .commit(
                ChangeSet::new(record.clone())
                    .register_agent(agent.clone())
                    .change_agent_status(AgentStatusChange {
                        agent_id: agent.id(),
                        expected: AgentStatus::Offline,
                        new_status: AgentStatus::Available,
                    }),
            )
            .await
            .unwrap();
        store.find_agent(agent.id()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn commit_assigns_increasing_sequences() {
        let c = conversation("u1");
        let store = store_with(&c).await;
        let receipt = store
            .commit(ChangeSet::new(audit_for(&c)).also_audit(audit_for(&c)))
            .await
            .unwrap();

        let sequences: Vec<u64> = receipt.entries.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![2, 3]);
        assert_eq!(receipt.sequence(), 3);
        assert_eq!(store.last_sequence().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn second_conversation_for_same_user_is_rejected() {
        let c = conversation("u1");
        let store = store_with(&c).await;
        let dup = conversation("u1");
        let err = store
            .commit(ChangeSet::new(audit_for(&dup)).insert_conversation(dup.clone()))
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ConcurrentModification);
        assert_eq!(store.audit_len(), 1);
    }

    #[tokio::test]
    async fn stale_version_is_rejected_without_side_effects() {
        let c = conversation("u1");
        let store = store_with(&c).await;
        let mut updated = c.clone();
        updated.escalate(None, Timestamp::now()).unwrap();
        let message = Message::new(c.id(), SenderKind::Customer, None, "hi", Timestamp::now()).unwrap();

        let err = store
            .commit(
                ChangeSet::new(audit_for(&c))
                    .update_conversation(updated, c.version() + 5)
                    .append_message(message),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ConcurrentModification);
        assert!(store.messages(c.id(), None).await.unwrap().is_empty());
        assert_eq!(store.audit_len(), 1);
    }

    #[tokio::test]
    async fn taking_load_requires_available_agent() {
        let c = conversation("u1");
        let store = store_with(&c).await;
        let agent = Agent::register("Sam", None, None).unwrap();
        let record = AuditRecord::new(AuditAction::Created, EntityRef::Agent(agent.id()), &Actor::system());
        store
            .commit(ChangeSet::new(record).register_agent(agent.clone()))
            .await
            .unwrap();

        let err = store
            .commit(ChangeSet::new(audit_for(&c)).adjust_load(LoadAdjustment::take(agent.id())))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AgentUnavailable);
    }

    #[tokio::test]
    async fn failed_load_adjustment_rolls_back_conversation_update() {
        let c = conversation("u1");
        let store = store_with(&c).await;
        let mut updated = c.clone();
        updated.escalate(None, Timestamp::now()).unwrap();

        let err = store
            .commit(
                ChangeSet::new(audit_for(&c))
                    .update_conversation(updated, c.version())
                    .adjust_load(LoadAdjustment::take(AgentId::new())),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::AgentNotFound);
        let stored = store.find_by_id(c.id()).await.unwrap().unwrap();
        assert_eq!(stored.version(), c.version());
    }

    #[tokio::test]
    async fn load_adjustments_apply_to_agent() {
        let c = conversation("u1");
        let store = store_with(&c).await;
        let agent = available_agent(&store).await;

        store
            .commit(ChangeSet::new(audit_for(&c)).adjust_load(LoadAdjustment::take(agent.id())))
            .await
            .unwrap();
        assert_eq!(store.find_agent(agent.id()).await.unwrap().unwrap().active_conversations(), 1);
    }

    #[tokio::test]
    async fn agent_status_change_checks_expected_status() {
        let store = MemoryDeskStore::new();
        let agent = available_agent(&store).await;
        let record = AuditRecord::new(AuditAction::StatusChanged, EntityRef::Agent(agent.id()), &Actor::system());

        let err = store
            .commit(ChangeSet::new(record).change_agent_status(AgentStatusChange {
                agent_id: agent.id(),
                expected: AgentStatus::Offline,
                new_status: AgentStatus::Busy,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConcurrentModification);
    }

    #[tokio::test]
    async fn only_one_open_ticket_per_conversation() {
        let c = conversation("u1");
        let store = store_with(&c).await;
        let new_ticket = || NewTicket {
            title: "Refund".into(),
            description: None,
            priority: TicketPriority::High,
            tat_minutes: None,
        };
        let first = Ticket::open(c.id(), new_ticket(), |p| p.default_tat_minutes(), Timestamp::now()).unwrap();
        let second = Ticket::open(c.id(), new_ticket(), |p| p.default_tat_minutes(), Timestamp::now()).unwrap();

        store
            .commit(ChangeSet::new(audit_for(&c)).insert_ticket(first.clone()))
            .await
            .unwrap();
        let err = store
            .commit(ChangeSet::new(audit_for(&c)).insert_ticket(second))
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::OpenTicketExists);
        assert_eq!(store.find_open_ticket(c.id()).await.unwrap().unwrap().id(), first.id());
    }

    #[tokio::test]
    async fn messages_limit_keeps_latest_in_order() {
        let c = conversation("u1");
        let store = store_with(&c).await;
        let mut at = Timestamp::now();
        for text in ["one", "two", "three"] {
            at = Timestamp::monotonic_after(Some(&at));
            let message = Message::new(c.id(), SenderKind::Customer, None, text, at).unwrap();
            store
                .commit(ChangeSet::new(audit_for(&c)).append_message(message))
                .await
                .unwrap();
        }

        let latest = store.messages(c.id(), Some(2)).await.unwrap();
        let texts: Vec<&str> = latest.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, vec!["two", "three"]);
    }

    #[tokio::test]
    async fn conversation_history_includes_ticket_entries() {
        let c = conversation("u1");
        let store = store_with(&c).await;
        let ticket_record = AuditRecord::new(
            AuditAction::Updated,
            EntityRef::Ticket(TicketId::new()),
            &Actor::system(),
        )
        .in_conversation(c.id());
        store.commit(ChangeSet::new(ticket_record)).await.unwrap();

        assert_eq!(store.conversation_history(c.id()).await.unwrap().len(), 2);
        assert_eq!(
            store
                .entity_history(EntityRef::Conversation(c.id()))
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
