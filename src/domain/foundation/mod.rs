//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, errors and the fan-out event
//! vocabulary that form the language of the support desk.

mod command;
mod errors;
mod events;
mod ids;
mod state_machine;
mod timestamp;

pub use command::Actor;
pub use errors::{DomainError, ErrorClass, ErrorCode, ValidationError};
pub use events::{DeskEvent, DeskEventKind};
pub use ids::{AgentId, ConversationId, CsatId, ExternalUserId, MessageId, TicketId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
