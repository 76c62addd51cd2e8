//! Mattermost entities used by the host API.
//!
//! Only the fields this service reads or writes are modeled; everything else
//! the server sends is ignored on deserialization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Post type rendered by the webapp component.
pub const MEETING_POST_TYPE: &str = "custom_digitalsamba";

/// A Mattermost user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,

    pub username: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    #[serde(default)]
    pub nickname: String,

    /// Milliseconds since epoch; used as a cache buster for the avatar URL.
    #[serde(default)]
    pub last_picture_update: i64,
}

impl User {
    /// Display name preferring nickname, then full name, then username.
    pub fn display_name(&self) -> String {
        if !self.nickname.trim().is_empty() {
            return self.nickname.trim().to_string();
        }

        let full_name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full_name = full_name.trim();
        if !full_name.is_empty() {
            return full_name.to_string();
        }

        self.username.clone()
    }

    /// Avatar URL served by the Mattermost server at `site_url`.
    pub fn avatar_url(&self, site_url: &str) -> String {
        format!(
            "{}/api/v4/users/{}/image?_={}",
            site_url.trim_end_matches('/'),
            self.id,
            self.last_picture_update
        )
    }
}

/// Channel type as encoded by Mattermost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelType {
    #[serde(rename = "O")]
    Open,
    #[serde(rename = "P")]
    Private,
    #[serde(rename = "D")]
    Direct,
    #[serde(rename = "G")]
    Group,
}

impl ChannelType {
    /// Direct and group messages have no team and no meaningful name.
    pub fn is_conversation(self) -> bool {
        matches!(self, ChannelType::Direct | ChannelType::Group)
    }
}

/// A Mattermost channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,

    #[serde(default)]
    pub team_id: String,

    #[serde(rename = "type")]
    pub channel_type: ChannelType,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub display_name: String,
}

/// A Mattermost team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub display_name: String,
}

/// A post, either persisted in a channel or ephemeral.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(default)]
    pub user_id: String,

    pub channel_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub root_id: String,

    #[serde(default)]
    pub message: String,

    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub post_type: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub props: Map<String, Value>,
}

impl Post {
    /// Attachments stored under the `attachments` prop, if any.
    pub fn attachments(&self) -> Vec<SlackAttachment> {
        self.props
            .get("attachments")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }

    /// Store attachments under the `attachments` prop.
    pub fn set_attachments(&mut self, attachments: &[SlackAttachment]) {
        let value = serde_json::to_value(attachments).unwrap_or(Value::Array(Vec::new()));
        self.props.insert("attachments".to_string(), value);
    }
}

/// Message attachment (Slack-compatible format).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlackAttachment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fallback: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<PostAction>,
}

/// Interactive button on an attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostAction {
    pub name: String,

    pub integration: PostActionIntegration,
}

/// Where Mattermost sends the action callback, and what it echoes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostActionIntegration {
    pub url: String,

    pub context: Value,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: "u1".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_display_name_prefers_nickname() {
        let mut u = user();
        u.first_name = "Alice".to_string();
        u.last_name = "Liddell".to_string();
        u.nickname = "Al".to_string();
        assert_eq!(u.display_name(), "Al");
    }

    #[test]
    fn test_display_name_full_name_then_username() {
        let mut u = user();
        assert_eq!(u.display_name(), "alice");

        u.first_name = "Alice".to_string();
        assert_eq!(u.display_name(), "Alice");

        u.last_name = "Liddell".to_string();
        assert_eq!(u.display_name(), "Alice Liddell");
    }

    #[test]
    fn test_avatar_url() {
        let mut u = user();
        u.last_picture_update = 1700;
        assert_eq!(
            u.avatar_url("https://chat.example.com/"),
            "https://chat.example.com/api/v4/users/u1/image?_=1700"
        );
    }

    #[test]
    fn test_channel_type_wire_format() {
        let channel: Channel = serde_json::from_str(
            r#"{"id":"c1","team_id":"t1","type":"D","name":"a__b","display_name":""}"#,
        )
        .unwrap();
        assert_eq!(channel.channel_type, ChannelType::Direct);
        assert!(channel.channel_type.is_conversation());
        assert!(!ChannelType::Open.is_conversation());
        assert!(!ChannelType::Private.is_conversation());
        assert!(ChannelType::Group.is_conversation());
    }

    #[test]
    fn test_post_attachments_round_trip_through_props() {
        let mut post = Post {
            channel_id: "c1".to_string(),
            ..Default::default()
        };
        post.set_attachments(&[SlackAttachment {
            title: "Standup".to_string(),
            text: "join".to_string(),
            ..Default::default()
        }]);

        let attachments = post.attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].title, "Standup");
    }

    #[test]
    fn test_post_serialization_skips_empty_fields() {
        let post = Post {
            channel_id: "c1".to_string(),
            message: "hi".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&post).unwrap();
        assert!(!json.contains("root_id"));
        assert!(!json.contains("\"type\""));
        assert!(!json.contains("props"));
    }
}
