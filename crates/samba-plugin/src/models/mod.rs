//! Plugin models.
//!
//! Contains the request/response types of the HTTP surface, the per-user
//! preference record and the naming scheme enum shared across the service.

pub mod mattermost;

use crate::errors::PluginError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use mattermost::{
    Channel, ChannelType, Post, PostAction, PostActionIntegration, SlackAttachment, Team, User,
    MEETING_POST_TYPE,
};

// ============================================================================
// Naming scheme and preferences
// ============================================================================

/// Strategy used to produce a meeting's human-visible identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingScheme {
    /// Four random words, e.g. `SwiftPandasBuildHappily`.
    #[default]
    Words,

    /// Canonical v4 UUID.
    Uuid,

    /// Derived from the user, team and channel names.
    Mattermost,

    /// Ask the user to pick one of the other schemes.
    Ask,
}

impl NamingScheme {
    /// All known schemes, in the order they are listed to users.
    pub const ALL: [NamingScheme; 4] = [
        NamingScheme::Words,
        NamingScheme::Uuid,
        NamingScheme::Mattermost,
        NamingScheme::Ask,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NamingScheme::Words => "words",
            NamingScheme::Uuid => "uuid",
            NamingScheme::Mattermost => "mattermost",
            NamingScheme::Ask => "ask",
        }
    }

    /// Comma-separated list of valid values, for error messages.
    pub fn valid_values() -> String {
        NamingScheme::ALL
            .iter()
            .map(NamingScheme::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for NamingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid naming scheme: {0}")]
pub struct UnknownNamingScheme(pub String);

impl FromStr for NamingScheme {
    type Err = UnknownNamingScheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NamingScheme::ALL
            .into_iter()
            .find(|scheme| scheme.as_str() == s)
            .ok_or_else(|| UnknownNamingScheme(s.to_string()))
    }
}

/// Per-user settings, stored as JSON under `config_<user_id>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreference {
    pub naming_scheme: NamingScheme,

    #[serde(default)]
    pub embedded: bool,

    #[serde(default)]
    pub show_prejoin_page: bool,
}

// ============================================================================
// Meeting API models
// ============================================================================

/// Result of a successful meeting start.
///
/// Broadcast to everyone who can see the originating request, so it never
/// carries an access token. Each viewer fetches their own through
/// `POST /api/v1/token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingInfo {
    pub meeting_id: String,
    pub room_id: String,
    pub room_url: String,
    pub team_name: String,
    pub room_name: String,
}

/// Response when the requester was asked to choose a meeting type instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptedResponse {
    pub prompted: bool,
}

/// Action callback response. Mattermost replaces the clicked ephemeral
/// prompt with `update`; the meeting fields ride along for other callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub update: PostUpdate,

    #[serde(flatten)]
    pub meeting: MeetingInfo,
}

/// Replacement content for the post that carried the clicked button.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostUpdate {
    pub message: String,

    /// Empty props drop the prompt's buttons.
    #[serde(default)]
    pub props: serde_json::Map<String, serde_json::Value>,
}

/// Direct body of `POST /api/v1/meetings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartMeetingRequest {
    pub channel_id: String,

    #[serde(default)]
    pub meeting_id: Option<String>,

    #[serde(default)]
    pub meeting_topic: Option<String>,

    #[serde(default)]
    pub personal: bool,

    #[serde(default)]
    pub root_id: Option<String>,
}

/// Values echoed back by Mattermost from a meeting-type choice button.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionContext {
    #[serde(default)]
    pub meeting_id: Option<String>,

    #[serde(default)]
    pub meeting_topic: Option<String>,

    #[serde(default)]
    pub personal: bool,

    #[serde(default)]
    pub root_id: Option<String>,
}

/// Action callback envelope sent by Mattermost when a button is clicked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCallbackRequest {
    #[serde(default)]
    pub user_id: String,

    pub channel_id: String,

    #[serde(default)]
    pub team_id: String,

    /// The ephemeral prompt that carried the button.
    #[serde(default)]
    pub post_id: String,

    pub context: ActionContext,
}

/// A parsed `POST /api/v1/meetings` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStartRequest {
    pub request: StartMeetingRequest,

    /// Came from a prompt button; the response must replace the prompt.
    pub from_action: bool,
}

impl ParsedStartRequest {
    /// Parse either a direct body or an action callback envelope.
    ///
    /// The envelope is recognized by a `context` object.
    pub fn from_slice(body: &[u8]) -> Result<Self, PluginError> {
        let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
            tracing::debug!(target: "ds.models", error = %e, "Invalid meeting request body");
            PluginError::BadRequest("Invalid request body".to_string())
        })?;

        let is_action = value
            .get("context")
            .map(serde_json::Value::is_object)
            .unwrap_or(false);

        if is_action {
            let action: ActionCallbackRequest = serde_json::from_value(value).map_err(|e| {
                tracing::debug!(target: "ds.models", error = %e, "Invalid action callback body");
                PluginError::BadRequest("Invalid action callback body".to_string())
            })?;

            return Ok(Self {
                request: StartMeetingRequest {
                    channel_id: action.channel_id,
                    meeting_id: action.context.meeting_id,
                    meeting_topic: action.context.meeting_topic,
                    personal: action.context.personal,
                    root_id: action.context.root_id,
                },
                from_action: true,
            });
        }

        let request: StartMeetingRequest = serde_json::from_value(value).map_err(|e| {
            tracing::debug!(target: "ds.models", error = %e, "Invalid meeting request body");
            PluginError::BadRequest("Invalid request body".to_string())
        })?;

        Ok(Self {
            request,
            from_action: false,
        })
    }
}

/// Body of `POST /api/v1/token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    pub room_id: String,
}

/// Response of `POST /api/v1/token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

// ============================================================================
// Slash command models
// ============================================================================

/// Slash-command webhook payload (form-encoded by Mattermost).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub user_id: String,

    pub channel_id: String,

    #[serde(default)]
    pub team_id: String,

    /// The trigger word including the slash, e.g. `/digitalsamba`.
    #[serde(default)]
    pub command: String,

    /// Everything after the trigger.
    #[serde(default)]
    pub text: String,

    /// Verification token configured on the slash command.
    #[serde(default)]
    pub token: String,

    #[serde(default)]
    pub root_id: String,
}

/// Slash-command response. Always ephemeral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub response_type: String,

    #[serde(default)]
    pub text: String,
}

impl CommandResponse {
    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self {
            response_type: "ephemeral".to_string(),
            text: text.into(),
        }
    }
}

/// Treat missing, empty and whitespace-only strings alike.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_scheme_wire_values() {
        for scheme in NamingScheme::ALL {
            let json = serde_json::to_string(&scheme).unwrap();
            assert_eq!(json, format!("\"{}\"", scheme.as_str()));
            assert_eq!(scheme.as_str().parse::<NamingScheme>().unwrap(), scheme);
        }
    }

    #[test]
    fn test_naming_scheme_rejects_unknown() {
        let err = "dice".parse::<NamingScheme>().unwrap_err();
        assert_eq!(err.to_string(), "invalid naming scheme: dice");
        assert!(serde_json::from_str::<NamingScheme>("\"Words\"").is_err());
    }

    #[test]
    fn test_valid_values_list() {
        assert_eq!(NamingScheme::valid_values(), "words, uuid, mattermost, ask");
    }

    #[test]
    fn test_user_preference_json_shape() {
        let pref = UserPreference {
            naming_scheme: NamingScheme::Uuid,
            embedded: true,
            show_prejoin_page: false,
        };
        let json = serde_json::to_value(pref).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "naming_scheme": "uuid",
                "embedded": true,
                "show_prejoin_page": false
            })
        );
    }

    #[test]
    fn test_meeting_info_has_no_token_field() {
        let info = MeetingInfo {
            meeting_id: "m".into(),
            room_id: "r".into(),
            room_url: "https://team.digitalsamba.com/m".into(),
            team_name: "team".into(),
            room_name: "m".into(),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("token").is_none());
    }

    #[test]
    fn test_parse_direct_request() {
        let body = br#"{"channel_id":"C1","meeting_topic":"Standup","root_id":"R1"}"#;
        let parsed = ParsedStartRequest::from_slice(body).unwrap();
        assert_eq!(parsed.request.channel_id, "C1");
        assert_eq!(parsed.request.meeting_topic.as_deref(), Some("Standup"));
        assert_eq!(parsed.request.root_id.as_deref(), Some("R1"));
        assert_eq!(parsed.request.meeting_id, None);
        assert!(!parsed.from_action);
    }

    #[test]
    fn test_parse_action_callback() {
        let body = br#"{
            "user_id": "U1",
            "channel_id": "C9",
            "post_id": "P1",
            "context": {
                "meeting_id": "alice-personal-meeting",
                "meeting_topic": "Alice's Meeting",
                "personal": true
            }
        }"#;
        let parsed = ParsedStartRequest::from_slice(body).unwrap();
        assert_eq!(parsed.request.channel_id, "C9");
        assert_eq!(
            parsed.request.meeting_id.as_deref(),
            Some("alice-personal-meeting")
        );
        assert!(parsed.request.personal);
        assert!(parsed.from_action);
    }

    #[test]
    fn test_action_response_shape() {
        let response = ActionResponse {
            update: PostUpdate {
                message: "Meeting started: m".to_string(),
                props: serde_json::Map::new(),
            },
            meeting: MeetingInfo {
                meeting_id: "m".into(),
                room_id: "r".into(),
                room_url: "https://team.digitalsamba.com/m".into(),
                team_name: "team".into(),
                room_name: "m".into(),
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["update"]["message"], "Meeting started: m");
        assert_eq!(json["update"]["props"], serde_json::json!({}));
        assert_eq!(json["meeting_id"], "m");
        assert_eq!(json["room_url"], "https://team.digitalsamba.com/m");
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        let err = ParsedStartRequest::from_slice(b"{not json").unwrap_err();
        assert!(matches!(err, PluginError::BadRequest(_)));
    }

    #[test]
    fn test_parse_rejects_missing_channel() {
        let err = ParsedStartRequest::from_slice(br#"{"meeting_topic":"x"}"#).unwrap_err();
        assert!(matches!(err, PluginError::BadRequest(_)));
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some("x".into())), Some("x".into()));
    }
}
