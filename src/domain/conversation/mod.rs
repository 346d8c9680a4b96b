//! Conversation domain module.
//!
//! Owns the conversation lifecycle (`open` → `assigned` → `resolved` /
//! `ticket`), the append-only message log and the normalized shapes that
//! channel adapters produce and consume.

mod aggregate;
mod channel;
mod inbound;
mod message;
mod status;

pub use aggregate::{AssignOutcome, Conversation, MAX_REASON_LENGTH, TICKET_FOLLOW_UP_REASON};
pub use channel::Channel;
pub use inbound::{CustomerIdentity, InboundMessage, OutboundMessage};
pub use message::{Message, SenderKind, MAX_CONTENT_LENGTH};
pub use status::ConversationStatus;
