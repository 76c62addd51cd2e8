//! Plugin error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Messages
//! are descriptive because they are shown to the user who started the
//! meeting; secrets never appear in them.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Plugin error type.
///
/// Maps to HTTP status codes:
/// - Validation, BadRequest: 400 Bad Request
/// - Unauthorized: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - NotFound: 404 Not Found
/// - Transport, Provider, HostApi, Storage, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum PluginError {
    /// Rejected configuration or preference update. Nothing was changed.
    #[error("{0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not authenticated")]
    Unauthorized,

    /// The caller is known but may not act on the target.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The provider could not be reached, or a body could not be encoded or decoded.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider answered with status >= 400. The body is kept verbatim.
    #[error("API error: status={status}, body={body}")]
    Provider { status: u16, body: String },

    /// A call into the Mattermost server failed.
    #[error("Host API error: {0}")]
    HostApi(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PluginError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            PluginError::Validation(_) | PluginError::BadRequest(_) => 400,
            PluginError::Unauthorized => 401,
            PluginError::Forbidden(_) => 403,
            PluginError::NotFound(_) => 404,
            PluginError::Transport(_)
            | PluginError::Provider { .. }
            | PluginError::HostApi(_)
            | PluginError::Storage(_)
            | PluginError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in the JSON envelope and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            PluginError::Validation(_) => "VALIDATION_ERROR",
            PluginError::BadRequest(_) => "BAD_REQUEST",
            PluginError::Unauthorized => "UNAUTHORIZED",
            PluginError::Forbidden(_) => "FORBIDDEN",
            PluginError::NotFound(_) => "NOT_FOUND",
            PluginError::Transport(_) => "TRANSPORT_ERROR",
            PluginError::Provider { .. } => "PROVIDER_ERROR",
            PluginError::HostApi(_) => "HOST_API_ERROR",
            PluginError::Storage(_) => "STORAGE_ERROR",
            PluginError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for PluginError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(target: "ds.errors", code = self.code(), error = %self, "Request failed");
        }

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(error_response)).into_response()
    }
}

/// Convert Redis errors to PluginError
impl From<redis::RedisError> for PluginError {
    fn from(err: redis::RedisError) -> Self {
        PluginError::Storage(err.to_string())
    }
}
