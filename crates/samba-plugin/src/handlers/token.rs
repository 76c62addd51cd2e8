//! Room token handler.

use crate::errors::PluginError;
use crate::middleware::UserId;
use crate::models::{TokenRequest, TokenResponse};
use crate::routes::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::{Extension, Json};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Handler for POST /api/v1/token
///
/// Issues a moderator token for the caller in an existing room. This is how
/// everyone who sees a meeting post joins: the post itself never carries a
/// token.
///
/// # Errors
///
/// - 400 for a malformed body or an empty `room_id`
/// - 500 when the user lookup or the provider call fails
#[instrument(skip_all, name = "ds.token.create", fields(user_id = %user_id.0))]
pub async fn create_token(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    body: Bytes,
) -> Result<Json<TokenResponse>, PluginError> {
    let request: TokenRequest = serde_json::from_slice(&body).map_err(|e| {
        debug!(target: "ds.handlers.token", error = %e, "Invalid token request body");
        PluginError::BadRequest("Invalid request body".to_string())
    })?;

    let room_id = request.room_id.trim();
    if room_id.is_empty() {
        return Err(PluginError::BadRequest("room_id is required".to_string()));
    }

    let snapshot = state.snapshots.snapshot().await;
    let token = state
        .orchestrator
        .create_token(&snapshot, &user_id.0, room_id)
        .await?;

    Ok(Json(TokenResponse { token: token.token }))
}
