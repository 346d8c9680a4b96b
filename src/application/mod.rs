//! Application layer - the conversation orchestration engine and its
//! background workers.
//!
//! - `DeskEngine` - every synchronous operation (ingest, escalate, assign,
//!   resolve, tickets, CSAT, agents) plus AI turns
//! - `AiResponder` - provider-agnostic reply generation with budgets
//! - `DeliveryService` - outbound delivery with bounded retries
//! - `WebhookIntake` / `IngestWorker` - enqueue-then-process inbound path
//! - `EscalationSweeper` - converts unclaimed escalations into tickets

mod ai_responder;
mod delivery;
pub mod engine;
mod errors;
mod inbound_queue;
mod locks;
mod settings;
mod sweeper;

pub use ai_responder::{AiOutcome, AiResponder, AiResponderConfig, UnresolvedReason};
pub use delivery::{ChannelRegistry, DeliveryPolicy, DeliveryService, DeliveryStatus};
pub use engine::{
    AgentReplyResult, AiTurn, AiTurnOutcome, AssignCommand, AssignResult, DeskEngine,
    EnginePolicy, EscalateCommand, EscalationResult, IngestOutcome, OpenTicketCommand,
    RecordCsatCommand, RegisterAgentCommand, ResolveResult, SendAgentMessageCommand,
    SetAgentStatusCommand, TicketResolution, TicketResult, TicketUpdateResult,
    UpdateTicketCommand,
};
pub use errors::EngineError;
pub use inbound_queue::{InboundQueue, IngestWorker, IntakeReport, WebhookIntake};
pub use locks::{KeyGuard, KeyedLocks};
pub use settings::{DeskSettings, SettingsResolver};
pub use sweeper::{EscalationSweeper, SweepReport, SweeperConfig};
