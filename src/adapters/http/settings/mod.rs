//! HTTP adapter for runtime settings.
//!
//! - `GET /api/settings` - effective settings (stored values over defaults)
//! - `PUT /api/settings` - store an administrator patch

mod handlers;

use axum::{routing::get, Router};

use crate::adapters::http::state::AppState;

pub use handlers::{get_settings, update_settings};

pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/settings", get(get_settings).put(update_settings))
}
