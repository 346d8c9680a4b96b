//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the engine to external systems:
//! - `memory` - in-process stores (default when no database is configured)
//! - `postgres` - PostgreSQL stores and migrations
//! - `ai` - chat completion providers
//! - `channels` - customer channel adapters and webhook verification
//! - `fanout` - broadcast bus for operator sessions
//! - `http` - axum router, API handlers and webhooks
//! - `websocket` - operator real-time stream

pub mod ai;
pub mod channels;
pub mod fanout;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod websocket;
