//! Inbound channel webhooks.
//!
//! - `GET /webhooks/:channel` - hub subscription handshake
//! - `POST /webhooks/:channel` - native payload; signature-checked when the
//!   channel has an app secret, then normalized, deduplicated and queued
//!
//! The POST handler never waits for ingest or AI work. A full queue answers
//! `503` so the platform redelivers; dedup makes redelivery safe.

mod handlers;

use axum::{routing::get, Router};

use crate::adapters::http::state::AppState;

pub use handlers::{receive_webhook, verify_subscription, IntakeResponse};

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/:channel", get(verify_subscription).post(receive_webhook))
}
