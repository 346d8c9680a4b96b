//! HTTP handlers for runtime settings.

use axum::{extract::State, response::IntoResponse, Json};

use crate::adapters::http::actor::RequireActor;
use crate::adapters::http::error::ApiError;
use crate::adapters::http::state::AppState;
use crate::ports::StoredSettings;

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.settings().resolve().await)
}

/// PUT /api/settings
///
/// Fields left out of the body keep their stored value; channel flags are
/// merged per channel.
pub async fn update_settings(
    State(state): State<AppState>,
    RequireActor(actor): RequireActor,
    Json(patch): Json<StoredSettings>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(actor = %actor.name, "Settings update requested");
    let effective = state.engine.settings().update(patch).await?;
    Ok(Json(effective))
}
