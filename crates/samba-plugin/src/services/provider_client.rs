//! DigitalSamba REST API client.
//!
//! Wraps the three provider operations the plugin needs: create room,
//! delete room and create token. All of them go through one request path
//! that adds the bearer key, applies the timeout and turns any status
//! >= 400 into `PluginError::Provider` with the raw response body.
//!
//! # Security
//!
//! - The API key is held as a `SecretString` and never logged
//! - Tokens returned by `create_token` are never logged either
//! - Room IDs must match `[A-Za-z0-9_-]+` and are sent as one encoded path
//!   segment, so a caller-supplied ID cannot reach another endpoint

use crate::errors::PluginError;
use crate::observability::metrics::record_provider_request;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, Response, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Timeout for each provider request in seconds.
pub const PROVIDER_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Provider room slugs are limited to this many characters.
pub const MAX_FRIENDLY_URL_LEN: usize = 32;

/// Request body for `POST /rooms`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateRoomRequest {
    pub topic: String,

    /// Room slug; the caller truncates it to [`MAX_FRIENDLY_URL_LEN`].
    pub friendly_url: String,

    pub privacy: String,

    pub max_participants: i64,

    pub recordings_enabled: bool,

    pub chat_enabled: bool,

    pub join_screen_enabled: bool,

    pub mute_on_join: bool,

    pub camera_off_on_join: bool,

    /// "auto" or "tiled".
    pub default_layout: String,

    pub enable_whiteboard: bool,

    pub enable_polling: bool,

    pub enable_qa: bool,

    pub enable_breakout_rooms: bool,

    /// Omitted for rooms that never expire.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A provider room.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Room {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub friendly_url: String,

    #[serde(default)]
    pub privacy: String,

    #[serde(default)]
    pub max_participants: i64,

    #[serde(default)]
    pub enable_recording: bool,

    #[serde(default)]
    pub enable_breakout_rooms: bool,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Role granted by a room token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenRole {
    Moderator,
}

/// Parameters for a room token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTokenRequest {
    pub room_id: String,

    /// Mattermost user ID, sent as the provider's external user ID.
    pub user_id: String,

    pub user_name: String,

    pub user_email: String,

    pub role: TokenRole,

    pub avatar_url: String,
}

/// Wire body for `POST /rooms/{id}/token`.
#[derive(Debug, Serialize)]
struct TokenBody<'a> {
    role: TokenRole,
    name: &'a str,

    /// Display name; skips the provider's login dialog.
    u: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    ud: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    avatar: Option<&'a str>,
}

impl<'a> From<&'a CreateTokenRequest> for TokenBody<'a> {
    fn from(request: &'a CreateTokenRequest) -> Self {
        let non_empty = |s: &'a str| Some(s).filter(|s| !s.is_empty());
        let avatar = non_empty(request.avatar_url.as_str());
        TokenBody {
            role: request.role,
            name: &request.user_name,
            u: &request.user_name,
            ud: non_empty(request.user_id.as_str()),
            email: non_empty(request.user_email.as_str()),
            avatar_url: avatar,
            avatar,
        }
    }
}

/// A token issued by the provider.
#[derive(Clone, Default, PartialEq, Deserialize)]
pub struct RoomToken {
    pub token: String,

    #[serde(default)]
    pub room_url: String,

    #[serde(default)]
    pub participant_id: String,

    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for RoomToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomToken")
            .field("token", &"[REDACTED]")
            .field("room_url", &self.room_url)
            .field("participant_id", &self.participant_id)
            .field("role", &self.role)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// HTTP client for the DigitalSamba REST API.
#[derive(Clone)]
pub struct ProviderClient {
    /// HTTP client with configured timeouts.
    client: Client,

    /// API base URL, without a trailing slash.
    base_url: String,

    /// Parsed `base_url`. Request paths are appended segment by segment.
    api_base: Url,

    api_key: SecretString,
}

impl ProviderClient {
    /// Create a new provider client.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Internal` if the HTTP client cannot be built or
    /// `base_url` is not an http(s) URL.
    pub fn new(base_url: &str, api_key: SecretString) -> Result<Self, PluginError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        let api_base = Url::parse(&base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| PluginError::Internal("invalid provider API URL".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(PROVIDER_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                warn!(target: "ds.services.provider", error = %e, "Failed to build HTTP client");
                PluginError::Internal("failed to build provider HTTP client".to_string())
            })?;

        Ok(Self {
            client,
            base_url,
            api_base,
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, PluginError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| PluginError::Internal("invalid provider API URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Create a room.
    #[instrument(skip_all, fields(friendly_url = %request.friendly_url))]
    pub async fn create_room(&self, request: &CreateRoomRequest) -> Result<Room, PluginError> {
        let response = self
            .execute("create_room", Method::POST, &["rooms"], Some(request))
            .await?;
        let room: Room = decode(response).await?;

        debug!(target: "ds.services.provider", room_id = %room.id, "Room created");
        Ok(room)
    }

    /// Delete a room.
    #[instrument(skip(self))]
    pub async fn delete_room(&self, room_id: &str) -> Result<(), PluginError> {
        check_room_id(room_id)?;
        self.execute::<()>("delete_room", Method::DELETE, &["rooms", room_id], None)
            .await?;

        debug!(target: "ds.services.provider", room_id = %room_id, "Room deleted");
        Ok(())
    }

    /// Issue a token for one participant of a room.
    #[instrument(skip_all, fields(room_id = %request.room_id, user_id = %request.user_id))]
    pub async fn create_token(
        &self,
        request: &CreateTokenRequest,
    ) -> Result<RoomToken, PluginError> {
        check_room_id(&request.room_id)?;
        let body = TokenBody::from(request);
        let response = self
            .execute(
                "create_token",
                Method::POST,
                &["rooms", request.room_id.as_str(), "token"],
                Some(&body),
            )
            .await?;

        decode(response).await
    }

    /// Shared request path for every provider call.
    async fn execute<B: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<Response, PluginError> {
        let url = self.endpoint(segments)?;

        let mut request = self
            .client
            .request(method, url.clone())
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");

        if let Some(body) = body {
            let bytes = serde_json::to_vec(body).map_err(|e| {
                PluginError::Transport(format!("failed to marshal request body: {}", e))
            })?;
            request = request.body(bytes);
        }

        let start = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                record_provider_request(operation, "transport", start.elapsed());
                warn!(target: "ds.services.provider", operation, error = %e, "Provider request failed");
                return Err(PluginError::Transport(format!(
                    "failed to execute request: {}",
                    e
                )));
            }
        };

        let status = response.status();
        if status.as_u16() >= 400 {
            record_provider_request(operation, "error", start.elapsed());
            let body = response.text().await.unwrap_or_default();
            warn!(
                target: "ds.services.provider",
                operation,
                status = status.as_u16(),
                url = %url,
                "Provider returned error"
            );
            return Err(PluginError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        record_provider_request(operation, "success", start.elapsed());
        Ok(response)
    }
}

/// Provider room IDs are UUID-like; anything else never leaves the process.
pub fn is_valid_room_id(room_id: &str) -> bool {
    !room_id.is_empty()
        && room_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn check_room_id(room_id: &str) -> Result<(), PluginError> {
    if is_valid_room_id(room_id) {
        Ok(())
    } else {
        warn!(target: "ds.services.provider", "Rejected malformed room ID");
        Err(PluginError::BadRequest("invalid room_id".to_string()))
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, PluginError> {
    response
        .json::<T>()
        .await
        .map_err(|e| PluginError::Transport(format!("failed to decode response: {}", e)))
}
