//! Slash command webhook handler.

use crate::errors::PluginError;
use crate::models::{CommandRequest, CommandResponse};
use crate::routes::AppState;
use axum::extract::State;
use axum::{Form, Json};
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /api/v1/command
///
/// Mattermost sends the invocation form-encoded. The reply is always an
/// ephemeral command response; only a bad verification token is an HTTP
/// error (401).
#[instrument(skip_all, name = "ds.command.execute")]
pub async fn execute_command(
    State(state): State<Arc<AppState>>,
    Form(request): Form<CommandRequest>,
) -> Result<Json<CommandResponse>, PluginError> {
    let snapshot = state.snapshots.snapshot().await;
    let response = state.commands.execute(&snapshot, &request).await?;
    Ok(Json(response))
}
