//! Per-user preference handlers.
//!
//! Served on both `/api/v1/config` and `/api/v1/user-config`; the webapp
//! uses either path.

use crate::errors::PluginError;
use crate::middleware::UserId;
use crate::models::UserPreference;
use crate::repositories::preferences::parse_preference;
use crate::routes::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::{Extension, Json};
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /api/v1/config
///
/// The caller's stored preferences, or the current defaults.
#[instrument(skip_all, name = "ds.preferences.get", fields(user_id = %user_id.0))]
pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<UserPreference>, PluginError> {
    let snapshot = state.snapshots.snapshot().await;
    let preference = state
        .preferences
        .get(&user_id.0, &snapshot.settings)
        .await?;
    Ok(Json(preference))
}

/// Handler for POST /api/v1/config
///
/// Replaces the caller's preferences and returns the stored record.
///
/// # Errors
///
/// - 400 for a malformed body or an unknown naming scheme
/// - 500 when the store cannot be written
#[instrument(skip_all, name = "ds.preferences.update", fields(user_id = %user_id.0))]
pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    body: Bytes,
) -> Result<Json<UserPreference>, PluginError> {
    let preference = parse_preference(&body)?;
    state.preferences.set(&user_id.0, &preference).await?;
    Ok(Json(preference))
}
