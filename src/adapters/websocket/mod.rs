//! WebSocket adapter - the operator real-time stream.
//!
//! ```text
//! DeskEngine ──publish──▶ FanoutPublisher (broadcast bus)
//!                                │ subscribe (one receiver per session)
//!                                ▼
//!                        operator session ──{type, data}──▶ browser
//! ```
//!
//! - [`messages`] - frame protocol
//! - [`handler`] - axum upgrade handler and session loop

pub mod handler;
pub mod messages;

pub use handler::ws_handler;
pub use messages::{ClientFrame, ServerFrame, TypingSignal};
