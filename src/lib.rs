//! Support Desk - multi-channel customer support conversation engine.
//!
//! Customers write in over a web widget, a messaging app, two social
//! inboxes and email. Every conversation is answered by an AI assistant
//! until it escalates, is claimed by a human agent, turns into a ticket or
//! is resolved. Every transition is audited and fanned out to operator
//! sessions in commit order.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
