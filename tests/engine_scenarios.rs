//! End-to-end engine scenarios over the in-memory stores.
//!
//! Each test wires a complete `DeskEngine` (memory stores, broadcast
//! fan-out, scripted AI provider, recording channel adapters) and drives it
//! through the public operations only.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinSet;

use support_desk::adapters::ai::{MockAIProvider, MockError};
use support_desk::adapters::channels::{ChannelSurveyNotifier, RecordingChannelAdapter};
use support_desk::adapters::fanout::BroadcastFanout;
use support_desk::adapters::memory::{MemoryDedupStore, MemoryDeskStore, MemorySettingsStore};
use support_desk::application::{
    AiResponder, AiResponderConfig, AiTurnOutcome, AssignCommand, ChannelRegistry,
    DeliveryPolicy, DeliveryService, DeskEngine, DeskSettings, EnginePolicy, EngineError,
    EscalateCommand, EscalationSweeper, InboundQueue, IngestWorker, OpenTicketCommand,
    RecordCsatCommand, RegisterAgentCommand, SendAgentMessageCommand, SetAgentStatusCommand,
    SettingsResolver, SweeperConfig,
};
use support_desk::domain::agent::{Agent, AgentStatus};
use support_desk::domain::audit::AuditAction;
use support_desk::domain::conversation::{
    Channel, ConversationStatus, CustomerIdentity, InboundMessage, SenderKind,
    TICKET_FOLLOW_UP_REASON,
};
use support_desk::domain::foundation::{
    Actor, ConversationId, DeskEvent, DeskEventKind, ErrorCode, ExternalUserId,
};
use support_desk::domain::ticket::{NewTicket, TicketPriority, TicketStatus};
use support_desk::ports::{AiProviderKind, ConversationFilter, DeliveryError, FanoutPublisher};

// =============================================================================
// Test Infrastructure
// =============================================================================

struct Desk {
    engine: Arc<DeskEngine>,
    provider: MockAIProvider,
    widget: Arc<RecordingChannelAdapter>,
    email: Arc<RecordingChannelAdapter>,
    dedup: Arc<MemoryDedupStore>,
    events: broadcast::Receiver<DeskEvent>,
}

struct DeskBuilder {
    provider: MockAIProvider,
    widget: RecordingChannelAdapter,
}

impl DeskBuilder {
    fn new() -> Self {
        Self {
            provider: MockAIProvider::new(),
            widget: RecordingChannelAdapter::new(Channel::Widget),
        }
    }

    fn with_provider(mut self, provider: MockAIProvider) -> Self {
        self.provider = provider;
        self
    }

    fn with_widget(mut self, widget: RecordingChannelAdapter) -> Self {
        self.widget = widget;
        self
    }

    fn build(self) -> Desk {
        let store = Arc::new(MemoryDeskStore::new());
        let fanout = Arc::new(BroadcastFanout::new(256));
        let events = fanout.subscribe();

        let provider = self.provider.clone();
        let widget = Arc::new(self.widget);
        let email = Arc::new(RecordingChannelAdapter::new(Channel::EmailLike));
        let channels = Arc::new(
            ChannelRegistry::new()
                .with_adapter(widget.clone())
                .with_adapter(email.clone()),
        );
        let surveys = Arc::new(ChannelSurveyNotifier::new(
            Arc::clone(&channels),
            Some("https://desk.example.com/csat".to_string()),
        ));
        let delivery = Arc::new(DeliveryService::new(
            Arc::clone(&channels),
            surveys,
            store.clone(),
            DeliveryPolicy {
                max_attempts: 3,
                backoff: Duration::from_millis(1),
                timeout: Duration::from_secs(1),
            },
        ));

        let settings = Arc::new(SettingsResolver::new(
            Arc::new(MemorySettingsStore::new()),
            DeskSettings {
                ai_provider: AiProviderKind::Mock,
                ai_model: None,
                knowledge_base: "Orders ship within two business days.".to_string(),
                system_prompt: "You are a helpful support assistant.".to_string(),
                ai_paused: false,
                channels_enabled: BTreeMap::new(),
            },
        ));
        let responder = Arc::new(
            AiResponder::new(AiResponderConfig::default().with_retry_backoff(Duration::from_millis(1)))
                .with_provider(AiProviderKind::Mock, Arc::new(self.provider)),
        );

        let engine = Arc::new(DeskEngine::new(
            store,
            fanout,
            settings,
            responder,
            delivery,
            EnginePolicy::default(),
        ));

        Desk {
            engine,
            provider,
            widget,
            email,
            dedup: Arc::new(MemoryDedupStore::new()),
            events,
        }
    }
}

impl Desk {
    fn drain_events(&mut self) -> Vec<DeskEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    async fn ingest(&self, channel: Channel, user: &str, text: &str) -> support_desk::application::IngestOutcome {
        let customer = CustomerIdentity::new("Dana", ExternalUserId::new(user).unwrap());
        let inbound = InboundMessage::new(channel, customer, text).unwrap();
        self.engine.ingest(inbound).await.unwrap()
    }

    async fn agent(&self, name: &str, status: AgentStatus) -> Agent {
        self.engine
            .register_agent(
                RegisterAgentCommand {
                    name: name.to_string(),
                    email: None,
                    phone: None,
                    status: Some(status),
                },
                &admin(),
            )
            .await
            .unwrap()
    }

    /// Ingests a widget message and lets the AI hand it off.
    async fn escalated_conversation(&self, user: &str) -> ConversationId {
        let outcome = self.ingest(Channel::Widget, user, "I want a refund").await;
        let id = outcome.conversation.id();
        self.engine
            .escalate(
                EscalateCommand {
                    conversation_id: id,
                    reason: Some("customer asked for a human".to_string()),
                },
                &Actor::ai(),
            )
            .await
            .unwrap();
        id
    }

    async fn claim(&self, id: ConversationId, agent: &Agent) {
        self.engine
            .assign(
                AssignCommand {
                    conversation_id: id,
                    agent_id: agent.id(),
                    expected_owner: None,
                },
                &operator(agent),
            )
            .await
            .unwrap();
    }

    async fn open_ticket(&self, id: ConversationId, title: &str, actor: &Actor) -> support_desk::domain::ticket::Ticket {
        self.engine
            .open_ticket(
                OpenTicketCommand {
                    conversation_id: id,
                    ticket: NewTicket {
                        title: title.to_string(),
                        description: None,
                        priority: TicketPriority::Medium,
                        tat_minutes: None,
                    },
                    only_if_unclaimed: false,
                },
                actor,
            )
            .await
            .unwrap()
            .ticket
    }

    fn sweeper(&self) -> EscalationSweeper {
        EscalationSweeper::new(
            Arc::clone(&self.engine),
            SweeperConfig::default().with_escalation_ticket_after(0),
        )
    }

    async fn load(&self, agent: &Agent) -> u32 {
        self.engine.get_agent(agent.id()).await.unwrap().active_conversations()
    }
}

fn admin() -> Actor {
    Actor::new("admin").unwrap()
}

fn operator(agent: &Agent) -> Actor {
    Actor::new(agent.name()).unwrap().with_agent(agent.id())
}

fn actions(entries: &[support_desk::domain::audit::AuditLogEntry]) -> Vec<AuditAction> {
    entries.iter().map(|e| e.action()).collect()
}

// =============================================================================
// AI first response
// =============================================================================

#[tokio::test]
async fn first_message_creates_conversation_and_ai_replies() {
    let mut desk = DeskBuilder::new()
        .with_provider(MockAIProvider::new().with_response("Your order ships tomorrow."))
        .build();

    let outcome = desk.ingest(Channel::Widget, "session-1", "Where is my order?").await;
    assert!(outcome.created);
    assert_eq!(outcome.conversation.status(), ConversationStatus::Open);

    let turn = outcome.ai_turn.expect("new conversations get an AI turn");
    let result = desk.engine.run_ai_turn(turn).await.unwrap();
    match result {
        AiTurnOutcome::Replied { message, delivery } => {
            assert_eq!(message.content, "Your order ships tomorrow.");
            assert!(delivery.is_delivered());
        }
        other => panic!("expected a reply, got {:?}", other),
    }

    let id = outcome.conversation.id();
    let messages = desk.engine.list_messages(id, None).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(desk.widget.delivered().len(), 1);
    assert_eq!(desk.widget.delivered()[0].text, "Your order ships tomorrow.");

    let kinds: Vec<_> = desk.drain_events().into_iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![DeskEventKind::NewChat, DeskEventKind::Message]);
}

#[tokio::test]
async fn second_message_appends_to_the_same_conversation() {
    let desk = DeskBuilder::new().build();

    let first = desk.ingest(Channel::Widget, "session-2", "Hello").await;
    let second = desk.ingest(Channel::Widget, "session-2", "Anyone there?").await;

    assert!(!second.created);
    assert_eq!(first.conversation.id(), second.conversation.id());
    assert!(second.message.created_at > first.message.created_at);
    assert_eq!(
        desk.engine.list_messages(first.conversation.id(), None).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn ai_handoff_marker_escalates_the_conversation() {
    let desk = DeskBuilder::new()
        .with_provider(MockAIProvider::new().with_response("HANDOFF_TO_HUMAN"))
        .build();

    let outcome = desk.ingest(Channel::Widget, "session-3", "Let me talk to a person").await;
    let result = desk.engine.run_ai_turn(outcome.ai_turn.unwrap()).await.unwrap();
    assert!(matches!(result, AiTurnOutcome::Escalated { .. }));

    let conversation = desk.engine.get_conversation(outcome.conversation.id()).await.unwrap();
    assert!(conversation.is_escalation_pending());
    assert!(conversation.assigned_agent().is_none());
    assert!(desk.widget.delivered().is_empty());
}

#[tokio::test]
async fn provider_failure_after_retry_escalates() {
    let provider = MockAIProvider::new()
        .with_error(MockError::Unavailable { message: "down".into() })
        .with_error(MockError::Unavailable { message: "still down".into() });
    let desk = DeskBuilder::new().with_provider(provider).build();

    let outcome = desk.ingest(Channel::Widget, "session-4", "Help").await;
    let result = desk.engine.run_ai_turn(outcome.ai_turn.unwrap()).await.unwrap();

    assert!(matches!(result, AiTurnOutcome::Escalated { .. }));
    let audit = desk.engine.conversation_audit(outcome.conversation.id()).await.unwrap();
    assert_eq!(actions(&audit), vec![AuditAction::Created, AuditAction::Escalated]);
}

#[tokio::test]
async fn stale_ai_turn_is_discarded() {
    let desk = DeskBuilder::new().build();

    let first = desk.ingest(Channel::Widget, "session-5", "Hi").await;
    desk.ingest(Channel::Widget, "session-5", "Actually, one more thing").await;

    let result = desk.engine.run_ai_turn(first.ai_turn.unwrap()).await.unwrap();
    assert!(matches!(result, AiTurnOutcome::Stale));
    assert!(desk.widget.delivered().is_empty());
}

#[tokio::test]
async fn worker_asks_the_ai_exactly_once_for_a_first_message() {
    let desk = DeskBuilder::new()
        .with_provider(MockAIProvider::new().with_response("Happy to help with that."))
        .build();
    let (_queue, receiver) = InboundQueue::bounded(4);
    let worker = IngestWorker::new(Arc::clone(&desk.engine), receiver);

    let customer = CustomerIdentity::new("Dana", ExternalUserId::new("session-6").unwrap());
    let inbound = InboundMessage::new(Channel::Widget, customer, "Can I change my address?").unwrap();
    let mut ai_turns = JoinSet::new();
    worker.process(inbound, &mut ai_turns).await;
    while let Some(joined) = ai_turns.join_next().await {
        joined.unwrap();
    }

    assert_eq!(desk.provider.call_count(), 1);

    let conversations = desk
        .engine
        .list_conversations(&ConversationFilter::default())
        .await
        .unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].status(), ConversationStatus::Open);

    let messages = desk.engine.list_messages(conversations[0].id(), None).await.unwrap();
    let customer_messages = messages.iter().filter(|m| m.sender == SenderKind::Customer).count();
    assert_eq!(customer_messages, 1);
    assert_eq!(messages.last().map(|m| m.content.as_str()), Some("Happy to help with that."));
    assert_eq!(desk.widget.delivered().len(), 1);
}

// =============================================================================
// Escalation, claim and resolution
// =============================================================================

#[tokio::test]
async fn escalate_claim_reply_resolve_and_rate() {
    let mut desk = DeskBuilder::new().build();
    let agent = desk.agent("Ana", AgentStatus::Available).await;
    let id = desk.escalated_conversation("session-10").await;

    desk.claim(id, &agent).await;
    assert_eq!(desk.load(&agent).await, 1);

    let reply = desk
        .engine
        .send_agent_message(
            SendAgentMessageCommand {
                conversation_id: id,
                agent_id: agent.id(),
                text: "I've issued the refund.".to_string(),
            },
            &operator(&agent),
        )
        .await
        .unwrap();
    assert!(reply.delivery.is_delivered());

    let resolved = desk.engine.resolve(id, &operator(&agent)).await.unwrap();
    assert_eq!(resolved.conversation.status(), ConversationStatus::Resolved);
    assert!(resolved.conversation.assigned_agent().is_none());
    assert!(resolved.csat.is_pending());
    assert_eq!(desk.load(&agent).await, 0);

    let rated = desk
        .engine
        .record_csat(
            RecordCsatCommand {
                csat_id: resolved.csat.id(),
                rating: 5,
                feedback: Some("Quick and friendly".to_string()),
            },
            &Actor::customer("Dana"),
        )
        .await
        .unwrap();
    assert_eq!(rated.rating().map(|s| s.value()), Some(5));

    let again = desk
        .engine
        .record_csat(
            RecordCsatCommand {
                csat_id: resolved.csat.id(),
                rating: 1,
                feedback: None,
            },
            &Actor::customer("Dana"),
        )
        .await
        .unwrap_err();
    assert_eq!(again.code(), ErrorCode::CsatAlreadyRecorded);

    let audit = desk.engine.conversation_audit(id).await.unwrap();
    assert_eq!(
        actions(&audit),
        vec![
            AuditAction::Created,
            AuditAction::Escalated,
            AuditAction::Assigned,
            AuditAction::AgentReplied,
            AuditAction::StatusChanged,
            AuditAction::CsatRecorded,
        ]
    );

    let kinds: Vec<_> = desk.drain_events().into_iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            DeskEventKind::StatusUpdate,
            DeskEventKind::NewChat,
            DeskEventKind::Escalation,
            DeskEventKind::ChatAccepted,
            DeskEventKind::Message,
            DeskEventKind::StatusUpdate,
        ]
    );
}

#[tokio::test]
async fn events_carry_audit_sequence_in_commit_order() {
    let mut desk = DeskBuilder::new().build();
    let agent = desk.agent("Ben", AgentStatus::Available).await;
    let id = desk.escalated_conversation("session-11").await;
    desk.claim(id, &agent).await;
    desk.engine.resolve(id, &operator(&agent)).await.unwrap();

    let sequences: Vec<u64> = desk
        .drain_events()
        .into_iter()
        .filter(|e| e.conversation_id == Some(id))
        .map(|e| e.sequence.expect("state events carry a sequence"))
        .collect();
    let audited: Vec<u64> = desk
        .engine
        .conversation_audit(id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.sequence)
        .collect();

    assert_eq!(sequences, audited);
    assert!(sequences.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn parallel_conversations_share_one_gap_free_sequence() {
    let desk = DeskBuilder::new().build();
    let mut tasks = JoinSet::new();
    for n in 0..8 {
        let engine = Arc::clone(&desk.engine);
        tasks.spawn(async move {
            let user = format!("session-par-{}", n % 4);
            let customer = CustomerIdentity::new("Dana", ExternalUserId::new(user).unwrap());
            let inbound = InboundMessage::new(Channel::Widget, customer, "hello").unwrap();
            engine.ingest(inbound).await.unwrap().conversation.id()
        });
    }
    let mut ids = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        ids.push(joined.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);

    let mut sequences = Vec::new();
    for id in ids {
        let audit = desk.engine.conversation_audit(id).await.unwrap();
        sequences.extend(audit.into_iter().map(|e| e.sequence));
    }
    sequences.sort_unstable();
    assert_eq!(sequences, (1..=8).collect::<Vec<u64>>());
}

#[tokio::test]
async fn concurrent_claims_have_exactly_one_winner() {
    let desk = DeskBuilder::new().build();
    let first = desk.agent("Cleo", AgentStatus::Available).await;
    let second = desk.agent("Dev", AgentStatus::Available).await;
    let id = desk.escalated_conversation("session-12").await;

    let engine = Arc::clone(&desk.engine);
    let claim = move |agent: Agent| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .assign(
                    AssignCommand {
                        conversation_id: id,
                        agent_id: agent.id(),
                        expected_owner: None,
                    },
                    &operator(&agent),
                )
                .await
        })
    };
    let (a, b) = tokio::join!(claim(first.clone()), claim(second.clone()));
    let results = [a.unwrap(), b.unwrap()];

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(loser.is_conflict());

    assert_eq!(desk.load(&first).await + desk.load(&second).await, 1);
    let conversation = desk.engine.get_conversation(id).await.unwrap();
    assert_eq!(conversation.status(), ConversationStatus::Assigned);
}

#[tokio::test]
async fn transfer_moves_load_between_agents() {
    let desk = DeskBuilder::new().build();
    let from = desk.agent("Eli", AgentStatus::Available).await;
    let to = desk.agent("Fay", AgentStatus::Available).await;
    let id = desk.escalated_conversation("session-13").await;
    desk.claim(id, &from).await;

    let stale = desk
        .engine
        .assign(
            AssignCommand {
                conversation_id: id,
                agent_id: to.id(),
                expected_owner: Some(to.id()),
            },
            &admin(),
        )
        .await
        .unwrap_err();
    assert_eq!(stale.code(), ErrorCode::OwnerMismatch);

    let moved = desk
        .engine
        .assign(
            AssignCommand {
                conversation_id: id,
                agent_id: to.id(),
                expected_owner: Some(from.id()),
            },
            &admin(),
        )
        .await
        .unwrap();
    assert_eq!(moved.conversation.assigned_agent(), Some(to.id()));
    assert_eq!(desk.load(&from).await, 0);
    assert_eq!(desk.load(&to).await, 1);
}

#[tokio::test]
async fn unavailable_agent_cannot_claim() {
    let desk = DeskBuilder::new().build();
    let agent = desk.agent("Gus", AgentStatus::Busy).await;
    let id = desk.escalated_conversation("session-14").await;

    let err = desk
        .engine
        .assign(
            AssignCommand {
                conversation_id: id,
                agent_id: agent.id(),
                expected_owner: None,
            },
            &operator(&agent),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AgentUnavailable);
    assert!(desk.engine.get_conversation(id).await.unwrap().is_escalation_pending());
}

#[tokio::test]
async fn only_the_owner_may_reply() {
    let desk = DeskBuilder::new().build();
    let owner = desk.agent("Hana", AgentStatus::Available).await;
    let other = desk.agent("Ivo", AgentStatus::Available).await;
    let id = desk.escalated_conversation("session-15").await;
    desk.claim(id, &owner).await;

    let err = desk
        .engine
        .send_agent_message(
            SendAgentMessageCommand {
                conversation_id: id,
                agent_id: other.id(),
                text: "Hi!".to_string(),
            },
            &operator(&other),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::OwnerMismatch);
}

#[tokio::test]
async fn customer_message_reopens_a_resolved_conversation() {
    let desk = DeskBuilder::new().build();
    let agent = desk.agent("Jo", AgentStatus::Available).await;
    let id = desk.escalated_conversation("session-16").await;
    desk.claim(id, &agent).await;
    desk.engine.resolve(id, &operator(&agent)).await.unwrap();

    let outcome = desk.ingest(Channel::Widget, "session-16", "It broke again").await;
    assert!(outcome.reopened);
    assert_eq!(outcome.conversation.id(), id);
    assert!(outcome.conversation.is_ai_handled());
    assert!(outcome.ai_turn.is_some());
    assert!(outcome.conversation.escalated_at().is_none());
}

#[tokio::test]
async fn failed_delivery_is_audited_without_blocking() {
    let widget = RecordingChannelAdapter::new(Channel::Widget)
        .failing_with(DeliveryError::Unavailable("503".into()))
        .failing_with(DeliveryError::Unavailable("503".into()))
        .failing_with(DeliveryError::Unavailable("503".into()));
    let desk = DeskBuilder::new()
        .with_widget(widget)
        .with_provider(MockAIProvider::new().with_response("On it."))
        .build();

    let outcome = desk.ingest(Channel::Widget, "session-17", "Status?").await;
    let result = desk.engine.run_ai_turn(outcome.ai_turn.unwrap()).await.unwrap();
    match result {
        AiTurnOutcome::Replied { delivery, .. } => assert!(!delivery.is_delivered()),
        other => panic!("expected a reply, got {:?}", other),
    }

    let audit = desk.engine.conversation_audit(outcome.conversation.id()).await.unwrap();
    assert_eq!(
        actions(&audit),
        vec![AuditAction::Created, AuditAction::AiReplied, AuditAction::DeliveryFailed]
    );
    let conversation = desk.engine.get_conversation(outcome.conversation.id()).await.unwrap();
    assert_eq!(conversation.status(), ConversationStatus::Open);
}

// =============================================================================
// Agents
// =============================================================================

#[tokio::test]
async fn pick_available_agent_prefers_lowest_load() {
    let desk = DeskBuilder::new().build();
    assert!(desk.engine.pick_available_agent().await.unwrap().is_none());

    let busy_one = desk.agent("Kai", AgentStatus::Available).await;
    let idle = desk.agent("Lea", AgentStatus::Available).await;
    desk.agent("Max", AgentStatus::Offline).await;

    let id = desk.escalated_conversation("session-20").await;
    desk.claim(id, &busy_one).await;

    let picked = desk.engine.pick_available_agent().await.unwrap().unwrap();
    assert_eq!(picked.id(), idle.id());
    // Picking never claims.
    assert_eq!(desk.load(&idle).await, 0);
}

#[tokio::test]
async fn setting_the_same_status_writes_nothing() {
    let desk = DeskBuilder::new().build();
    let agent = desk.agent("Nia", AgentStatus::Available).await;

    let before = desk
        .engine
        .entity_audit(support_desk::domain::audit::EntityRef::Agent(agent.id()))
        .await
        .unwrap()
        .len();
    let same = desk
        .engine
        .set_agent_status(
            SetAgentStatusCommand {
                agent_id: agent.id(),
                status: AgentStatus::Available,
            },
            &admin(),
        )
        .await
        .unwrap();
    assert_eq!(same.status(), AgentStatus::Available);

    let changed = desk
        .engine
        .set_agent_status(
            SetAgentStatusCommand {
                agent_id: agent.id(),
                status: AgentStatus::Busy,
            },
            &admin(),
        )
        .await
        .unwrap();
    assert_eq!(changed.status(), AgentStatus::Busy);

    let after = desk
        .engine
        .entity_audit(support_desk::domain::audit::EntityRef::Agent(agent.id()))
        .await
        .unwrap()
        .len();
    assert_eq!(after, before + 1);
}

// =============================================================================
// Tickets and the sweeper
// =============================================================================

#[tokio::test]
async fn sweeper_turns_unclaimed_escalation_into_ticket() {
    let desk = DeskBuilder::new().build();
    let id = desk.escalated_conversation("session-30").await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    let sweeper = EscalationSweeper::new(
        Arc::clone(&desk.engine),
        SweeperConfig::default().with_escalation_ticket_after(0),
    )
    .with_dedup_store(desk.dedup.clone());

    let report = sweeper.poll_once().await.unwrap();
    assert_eq!(report.tickets_opened, 1);

    let conversation = desk.engine.get_conversation(id).await.unwrap();
    assert_eq!(conversation.status(), ConversationStatus::Ticket);
    let tickets = desk.engine.tickets_for_conversation(id).await.unwrap();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].priority(), TicketPriority::High);
    assert_eq!(tickets[0].tat_minutes(), desk.engine.policy().tat_high_minutes);

    let again = sweeper.poll_once().await.unwrap();
    assert_eq!(again.tickets_opened, 0);
}

#[tokio::test]
async fn sweeper_leaves_claimed_conversations_alone() {
    let desk = DeskBuilder::new().build();
    let agent = desk.agent("Oli", AgentStatus::Available).await;
    let id = desk.escalated_conversation("session-31").await;
    desk.claim(id, &agent).await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    let sweeper = EscalationSweeper::new(
        Arc::clone(&desk.engine),
        SweeperConfig::default().with_escalation_ticket_after(0),
    );
    let report = sweeper.poll_once().await.unwrap();

    assert_eq!(report.tickets_opened, 0);
    assert_eq!(
        desk.engine.get_conversation(id).await.unwrap().status(),
        ConversationStatus::Assigned
    );
}

#[tokio::test]
async fn resolving_ticket_cascades_to_assigned_conversation() {
    let desk = DeskBuilder::new().build();
    let agent = desk.agent("Pia", AgentStatus::Available).await;
    let id = desk.escalated_conversation("session-32").await;
    desk.claim(id, &agent).await;

    let opened = desk
        .engine
        .open_ticket(
            OpenTicketCommand {
                conversation_id: id,
                ticket: NewTicket {
                    title: "Refund follow-up".to_string(),
                    description: None,
                    priority: TicketPriority::Medium,
                    tat_minutes: None,
                },
                only_if_unclaimed: false,
            },
            &operator(&agent),
        )
        .await
        .unwrap();
    assert_eq!(opened.conversation.status(), ConversationStatus::Ticket);
    assert_eq!(desk.load(&agent).await, 0);

    let duplicate = desk
        .engine
        .open_ticket(
            OpenTicketCommand {
                conversation_id: id,
                ticket: NewTicket {
                    title: "Another".to_string(),
                    ..NewTicket::default()
                },
                only_if_unclaimed: false,
            },
            &operator(&agent),
        )
        .await
        .unwrap_err();
    assert!(duplicate.is_conflict());

    let resolution = desk
        .engine
        .resolve_ticket(opened.ticket.id(), &operator(&agent))
        .await
        .unwrap();
    assert!(resolution.newly_resolved);
    assert_eq!(resolution.ticket.status(), TicketStatus::Resolved);
    assert!(resolution.ticket.resolved_at().is_some());
    assert!(resolution.csat.is_some());
}

#[tokio::test]
async fn follow_up_on_open_ticket_goes_to_agents_not_the_ai() {
    let desk = DeskBuilder::new().build();
    let id = desk.escalated_conversation("session-33").await;
    let ticket = desk.open_ticket(id, "Damaged parcel", &admin()).await;

    let follow_up = desk.ingest(Channel::Widget, "session-33", "Still waiting on this").await;

    assert!(follow_up.reopened);
    assert!(follow_up.ai_turn.is_none());
    assert!(follow_up.conversation.is_escalation_pending());
    assert_eq!(
        follow_up.conversation.escalation_reason(),
        Some(TICKET_FOLLOW_UP_REASON)
    );
    assert_eq!(desk.provider.call_count(), 0);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let sweeper = desk.sweeper();
    let report = sweeper.poll_once().await.unwrap();
    assert_eq!(report.returned_to_ticket, 1);
    assert_eq!(report.tickets_opened, 0);
    assert_eq!(report.skipped, 0);

    let conversation = desk.engine.get_conversation(id).await.unwrap();
    assert_eq!(conversation.status(), ConversationStatus::Ticket);
    assert!(!conversation.is_escalation_pending());
    let tickets = desk.engine.tickets_for_conversation(id).await.unwrap();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].id(), ticket.id());

    let again = sweeper.poll_once().await.unwrap();
    assert_eq!(again.returned_to_ticket + again.tickets_opened + again.skipped, 0);
}

#[tokio::test]
async fn resolving_ticket_resolves_the_claimed_follow_up() {
    let desk = DeskBuilder::new().build();
    let agent = desk.agent("Rui", AgentStatus::Available).await;
    let id = desk.escalated_conversation("session-34").await;
    let ticket = desk.open_ticket(id, "Wrong size delivered", &admin()).await;

    desk.ingest(Channel::Widget, "session-34", "Any update on the exchange?").await;
    desk.claim(id, &agent).await;
    assert_eq!(desk.load(&agent).await, 1);

    let resolution = desk
        .engine
        .resolve_ticket(ticket.id(), &operator(&agent))
        .await
        .unwrap();

    assert!(resolution.newly_resolved);
    assert_eq!(resolution.conversation.status(), ConversationStatus::Resolved);
    assert!(resolution.conversation.assigned_agent().is_none());
    assert_eq!(desk.load(&agent).await, 0);
    assert_eq!(
        desk.engine.get_conversation(id).await.unwrap().status(),
        ConversationStatus::Resolved
    );

    let surveys = desk.engine.csat_for_conversation(id).await.unwrap();
    assert_eq!(surveys.len(), 1);
    assert_eq!(surveys[0].ticket_id(), Some(ticket.id()));

    let audit = desk.engine.conversation_audit(id).await.unwrap();
    let resolutions = actions(&audit)
        .into_iter()
        .filter(|a| *a == AuditAction::ResolutionSent)
        .count();
    assert_eq!(resolutions, 1);
    assert!(!actions(&audit).contains(&AuditAction::StatusChanged));
}

#[tokio::test]
async fn email_reply_to_ticket_is_audited_and_double_resolve_writes_nothing() {
    let desk = DeskBuilder::new().build();

    let first = desk.ingest(Channel::EmailLike, "dana@example.com", "My invoice is wrong").await;
    let id = first.conversation.id();
    desk.engine
        .escalate(
            EscalateCommand {
                conversation_id: id,
                reason: None,
            },
            &Actor::ai(),
        )
        .await
        .unwrap();
    let opened = desk
        .engine
        .open_ticket(
            OpenTicketCommand {
                conversation_id: id,
                ticket: NewTicket {
                    title: "Invoice correction".to_string(),
                    description: Some("Customer was billed twice".to_string()),
                    priority: TicketPriority::Low,
                    tat_minutes: Some(90),
                },
                only_if_unclaimed: true,
            },
            &Actor::system(),
        )
        .await
        .unwrap();
    assert_eq!(opened.ticket.tat_minutes(), 90);

    let reply = desk
        .ingest(Channel::EmailLike, "dana@example.com", "Any news on this?")
        .await;
    assert!(reply.reopened);
    assert!(reply.ai_turn.is_none());
    assert!(reply.conversation.is_escalation_pending());

    let audit = desk.engine.conversation_audit(id).await.unwrap();
    assert!(actions(&audit).contains(&AuditAction::EmailReplyReceived));

    let resolved = desk
        .engine
        .resolve_ticket(opened.ticket.id(), &admin())
        .await
        .unwrap();
    assert!(resolved.newly_resolved);
    let survey_requests = desk.email.delivered().len();
    let audit_len = desk.engine.conversation_audit(id).await.unwrap().len();

    let repeat = desk
        .engine
        .resolve_ticket(opened.ticket.id(), &admin())
        .await
        .unwrap();
    assert!(!repeat.newly_resolved);
    assert!(repeat.sequence.is_none());
    assert_eq!(
        repeat.csat.map(|c| c.id()),
        resolved.csat.map(|c| c.id())
    );
    assert_eq!(desk.engine.conversation_audit(id).await.unwrap().len(), audit_len);
    assert_eq!(desk.email.delivered().len(), survey_requests);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let desk = DeskBuilder::new().build();
    let err = desk.engine.get_conversation(ConversationId::new()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
    assert_eq!(err.code(), ErrorCode::ConversationNotFound);
}
