//! Meeting start handler.
//!
//! `POST /api/v1/meetings` serves two callers:
//!
//! - the webapp, with `{channel_id, meeting_id?, meeting_topic?, personal?, root_id?}`
//! - Mattermost action callbacks from the meeting-type prompt, with the same
//!   fields inside `context`
//!
//! The requester is always the `Mattermost-User-Id` caller, never a user ID
//! from the body.
//!
//! An action callback is answered with an `update` that replaces the prompt,
//! so the buttons disappear for the user who clicked. No post is deleted.

use crate::errors::PluginError;
use crate::messages;
use crate::middleware::UserId;
use crate::models::{ActionResponse, ParsedStartRequest, PostUpdate, PromptedResponse};
use crate::routes::AppState;
use crate::services::{StartOutcome, StartRequest};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /api/v1/meetings
///
/// # Response
///
/// - 200 with `MeetingInfo` once the room exists and the meeting is posted;
///   action callbacks get it wrapped in an `ActionResponse`
/// - 202 with `{"prompted": true}` when the caller was asked to choose a
///   meeting type instead
///
/// # Errors
///
/// - 400 for a malformed body
/// - 403 when the caller is not a member of the channel
/// - 404 for an unknown channel
/// - 500 when a provider or host call fails (any room created is deleted)
#[instrument(skip_all, name = "ds.meetings.start", fields(user_id = %user_id.0))]
pub async fn start_meeting(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    body: Bytes,
) -> Result<Response, PluginError> {
    let ParsedStartRequest {
        request,
        from_action,
    } = ParsedStartRequest::from_slice(&body)?;

    let snapshot = state.snapshots.snapshot().await;
    let outcome = state
        .orchestrator
        .start(
            &snapshot,
            StartRequest {
                user_id: user_id.0,
                channel_id: request.channel_id,
                meeting_id: request.meeting_id,
                topic: request.meeting_topic,
                root_id: request.root_id,
                personal: request.personal,
            },
        )
        .await?;

    Ok(match outcome {
        StartOutcome::Provisioned(info) if from_action => {
            let update = PostUpdate {
                message: messages::meeting_started(&info.meeting_id),
                props: serde_json::Map::new(),
            };
            let response = ActionResponse {
                update,
                meeting: info,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        StartOutcome::Provisioned(info) => (StatusCode::OK, Json(info)).into_response(),
        StartOutcome::Prompted(_) => {
            (StatusCode::ACCEPTED, Json(PromptedResponse { prompted: true })).into_response()
        }
    })
}
