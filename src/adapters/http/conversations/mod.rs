//! HTTP adapter for conversations: reads, direct ingest and the operator
//! transitions (escalate, assign, resolve, agent reply).

pub mod dto;
mod handlers;
mod routes;

pub use routes::conversation_routes;
