//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, fan-out events)
//! - `conversation` - Conversation lifecycle, messages and channel shapes
//! - `agent` - Human agents and their load counters
//! - `ticket` - Tickets, TAT targets and CSAT surveys
//! - `audit` - Append-only audit records

pub mod agent;
pub mod audit;
pub mod conversation;
pub mod foundation;
pub mod ticket;
