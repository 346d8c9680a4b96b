//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the engine and the outside world. Adapters implement these ports.
//!
//! ## Store Ports
//!
//! - `ConversationRepository`, `AgentRepository`, `TicketRepository`,
//!   `CsatRepository`, `AuditLogReader` - read side
//! - `TransitionCommitter` - atomic unit of work for every transition
//! - `DeskStore` - all of the above
//! - `InboundDedupStore` - webhook redelivery tracking
//! - `SettingsStore` - administrator overrides
//!
//! ## Collaborator Ports
//!
//! - `AIProvider` - chat completion
//! - `ChannelAdapter` - inbound normalization and outbound delivery
//! - `FanoutPublisher` - real-time events to operator sessions
//! - `SurveyNotifier` - CSAT survey requests

mod agent_repository;
mod ai_provider;
mod audit_log;
mod channel_adapter;
mod conversation_repository;
mod fanout;
mod inbound_dedup;
mod settings_store;
mod survey_notifier;
mod ticket_repository;
mod transition_committer;

pub use agent_repository::AgentRepository;
pub use ai_provider::{
    AIError, AIProvider, AiProviderKind, CompletionRequest, CompletionResponse, FinishReason,
    MessageRole, PromptMessage, ProviderInfo, RequestMetadata, TokenUsage,
};
pub use audit_log::AuditLogReader;
pub use channel_adapter::{ChannelAdapter, DeliveryError, DeliveryReceipt};
pub use conversation_repository::{ConversationFilter, ConversationRepository};
pub use fanout::FanoutPublisher;
pub use inbound_dedup::{InboundDedupStore, SaveResult};
pub use settings_store::{SettingsStore, StoredSettings};
pub use survey_notifier::SurveyNotifier;
pub use ticket_repository::{CsatRepository, TicketRepository};
pub use transition_committer::{
    AgentStatusChange, ChangeSet, CommitReceipt, ConversationWrite, DeskStore, EntityWrite,
    LoadAdjustment, TransitionCommitter,
};
