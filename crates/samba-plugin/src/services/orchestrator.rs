//! Meeting start workflow.
//!
//! `start` resolves what the requester asked for and either provisions a
//! meeting right away or, for users on the `ask` scheme, posts an ephemeral
//! prompt whose buttons call back with a fully resolved request.
//!
//! Provisioning runs as a saga:
//!
//! 1. create room (no compensation needed on failure)
//! 2. create the requester's moderator token (failure deletes the room)
//! 3. post the meeting message (failure deletes the room)
//!
//! The saga runs on its own task. A caller that stops waiting, such as a
//! client that disconnects, cannot cancel it between steps, so a room is
//! never left behind without its compensation having run.
//!
//! The token is never part of the result. Anyone who sees the post fetches
//! their own through `POST /api/v1/token`.

use crate::errors::PluginError;
use crate::messages;
use crate::models::{
    non_empty, Channel, MeetingInfo, NamingScheme, Post, PostAction, PostActionIntegration,
    SlackAttachment, Team, User, MEETING_POST_TYPE,
};
use crate::naming::{self, NamingContext, DEFAULT_MEETING_TOPIC};
use crate::observability::metrics::{record_meeting_failure, record_meeting_started};
use crate::repositories::UserPreferenceStore;
use crate::services::host::HostApi;
use crate::services::provider_client::{
    CreateRoomRequest, CreateTokenRequest, RoomToken, TokenRole, MAX_FRIENDLY_URL_LEN,
};
use crate::services::saga::Saga;
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn, Instrument, Span};

/// Host part every DigitalSamba team URL shares.
const PROVIDER_DOMAIN: &str = ".digitalsamba.com";

/// Subdomain used when the team cannot be determined.
const PLACEHOLDER_TEAM: &str = "CONFIGURE_TEAM_NAME";

/// A meeting start request from any entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartRequest {
    pub user_id: String,
    pub channel_id: String,
    pub meeting_id: Option<String>,
    pub topic: Option<String>,
    pub root_id: Option<String>,

    /// Carried from the action context; informational only.
    pub personal: bool,
}

/// What `start` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Provisioned(MeetingInfo),

    /// The requester was shown these choices instead.
    Prompted(Vec<MeetingChoice>),
}

/// One button of the meeting-type prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingChoice {
    pub name: String,
    pub meeting_id: String,
    pub meeting_topic: String,
    pub personal: bool,
}

/// Drives meeting starts against the host and the provider.
#[derive(Clone)]
pub struct MeetingOrchestrator {
    host: Arc<dyn HostApi>,
    preferences: UserPreferenceStore,

    /// Base URL Mattermost uses to reach this service.
    public_url: String,

    /// Author of ephemeral prompts.
    bot_user_id: String,
}

impl MeetingOrchestrator {
    pub fn new(
        host: Arc<dyn HostApi>,
        preferences: UserPreferenceStore,
        public_url: &str,
        bot_user_id: &str,
    ) -> Self {
        Self {
            host,
            preferences,
            public_url: public_url.trim_end_matches('/').to_string(),
            bot_user_id: bot_user_id.to_string(),
        }
    }

    /// Resolve the meeting identifier and either provision or prompt.
    #[instrument(skip_all, fields(user_id = %request.user_id, channel_id = %request.channel_id))]
    pub async fn start(
        &self,
        snapshot: &Arc<Snapshot>,
        request: StartRequest,
    ) -> Result<StartOutcome, PluginError> {
        let user = self.host.get_user(&request.user_id).await?;
        let channel = self.host.get_channel(&request.channel_id).await?;
        self.start_for(snapshot, &user, &channel, request).await
    }

    /// `start` for a user and channel the caller already looked up.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Forbidden` if the user is not a member of the
    /// channel. Nothing is prompted or provisioned in that case.
    pub async fn start_for(
        &self,
        snapshot: &Arc<Snapshot>,
        user: &User,
        channel: &Channel,
        request: StartRequest,
    ) -> Result<StartOutcome, PluginError> {
        if !self.host.is_channel_member(&channel.id, &user.id).await? {
            warn!(
                target: "ds.services.orchestrator",
                user_id = %user.id,
                channel_id = %channel.id,
                "Meeting start refused, requester is not a channel member"
            );
            record_meeting_failure("not_member");
            return Err(PluginError::Forbidden(
                "not a member of this channel".to_string(),
            ));
        }

        let topic = non_empty(request.topic);
        let root_id = non_empty(request.root_id);

        let meeting_id = match non_empty(request.meeting_id) {
            Some(id) => id,
            None => {
                let preference = self
                    .preferences
                    .get(&user.id, &snapshot.settings)
                    .await?;

                if preference.naming_scheme == NamingScheme::Ask && topic.is_none() {
                    let choices = self
                        .present_choices(user, channel, root_id.as_deref())
                        .await?;
                    return Ok(StartOutcome::Prompted(choices));
                }

                let team = self.resolve_team(channel).await;
                naming::generate(
                    preference.naming_scheme,
                    &NamingContext {
                        username: &user.username,
                        channel_type: channel.channel_type,
                        channel_name: &channel.name,
                        team_name: team.as_ref().map(|t| t.name.as_str()),
                        topic: topic.as_deref(),
                    },
                )
            }
        };

        let info = self
            .provision_detached(
                Arc::clone(snapshot),
                user.clone(),
                channel.clone(),
                meeting_id,
                topic,
                root_id,
            )
            .await?;

        Ok(StartOutcome::Provisioned(info))
    }

    /// `provision_meeting` on a spawned task. Dropping the returned future
    /// stops the wait, not the saga.
    async fn provision_detached(
        &self,
        snapshot: Arc<Snapshot>,
        user: User,
        channel: Channel,
        meeting_id: String,
        topic: Option<String>,
        root_id: Option<String>,
    ) -> Result<MeetingInfo, PluginError> {
        let orchestrator = self.clone();
        let task = tokio::spawn(
            async move {
                orchestrator
                    .provision_meeting(
                        &snapshot,
                        &user,
                        &channel,
                        &meeting_id,
                        topic.as_deref(),
                        root_id.as_deref(),
                    )
                    .await
            }
            .instrument(Span::current()),
        );

        task.await.map_err(|e| {
            warn!(target: "ds.services.orchestrator", error = %e, "Provisioning task failed");
            PluginError::Internal("meeting provisioning task failed".to_string())
        })?
    }

    /// Show the requester an ephemeral prompt with one button per meeting type.
    #[instrument(skip_all, fields(user_id = %user.id, channel_id = %channel.id))]
    pub async fn present_choices(
        &self,
        user: &User,
        channel: &Channel,
        root_id: Option<&str>,
    ) -> Result<Vec<MeetingChoice>, PluginError> {
        let mut choices = vec![
            MeetingChoice {
                name: messages::CHOICE_RANDOM_WORDS.to_string(),
                meeting_id: naming::random_words(),
                meeting_topic: DEFAULT_MEETING_TOPIC.to_string(),
                personal: true,
            },
            MeetingChoice {
                name: messages::CHOICE_PERSONAL.to_string(),
                meeting_id: naming::personal_meeting_name(&user.username),
                meeting_topic: messages::personal_topic(&user.display_name()),
                personal: true,
            },
        ];

        if !channel.channel_type.is_conversation() {
            if let Some(team) = self.resolve_team(channel).await {
                choices.push(MeetingChoice {
                    name: messages::CHOICE_CHANNEL.to_string(),
                    meeting_id: naming::team_channel_name(&team.name, &channel.name),
                    meeting_topic: messages::channel_topic(&channel.display_name),
                    personal: false,
                });
            }
        }

        choices.push(MeetingChoice {
            name: messages::CHOICE_UUID.to_string(),
            meeting_id: naming::uuid_name(),
            meeting_topic: DEFAULT_MEETING_TOPIC.to_string(),
            personal: false,
        });

        let action_url = format!("{}/api/v1/meetings", self.public_url);
        let actions = choices
            .iter()
            .map(|choice| PostAction {
                name: choice.name.clone(),
                integration: PostActionIntegration {
                    url: action_url.clone(),
                    context: action_context(choice, root_id),
                },
            })
            .collect();

        let mut post = Post {
            user_id: self.bot_user_id.clone(),
            channel_id: channel.id.clone(),
            root_id: root_id.unwrap_or_default().to_string(),
            ..Default::default()
        };
        post.set_attachments(&[SlackAttachment {
            title: messages::ASK_TITLE.to_string(),
            text: messages::ASK_TEXT.to_string(),
            actions,
            ..Default::default()
        }]);

        if let Err(e) = self.host.send_ephemeral_post(&user.id, post).await {
            record_meeting_failure("prompt");
            return Err(e);
        }

        debug!(target: "ds.services.orchestrator", choices = choices.len(), "Meeting type prompt sent");
        Ok(choices)
    }

    /// Create the room, the requester's token and the meeting post.
    #[instrument(skip_all, fields(user_id = %user.id, channel_id = %channel.id, meeting_id = %meeting_id))]
    pub async fn provision_meeting(
        &self,
        snapshot: &Snapshot,
        user: &User,
        channel: &Channel,
        meeting_id: &str,
        topic: Option<&str>,
        root_id: Option<&str>,
    ) -> Result<MeetingInfo, PluginError> {
        let settings = &snapshot.settings;
        let provider = &snapshot.provider;
        let topic = topic.unwrap_or(DEFAULT_MEETING_TOPIC).to_string();
        let slug = friendly_url(meeting_id);
        let expires_at = room_expiry(Utc::now(), settings.room_expiry_minutes);

        let room_request = CreateRoomRequest {
            topic: topic.clone(),
            friendly_url: slug.clone(),
            privacy: "public".to_string(),
            max_participants: settings.max_participants,
            recordings_enabled: settings.enable_recording,
            chat_enabled: true,
            join_screen_enabled: false,
            mute_on_join: false,
            camera_off_on_join: false,
            default_layout: "auto".to_string(),
            enable_whiteboard: true,
            enable_polling: true,
            enable_qa: true,
            enable_breakout_rooms: settings.enable_breakout_rooms,
            expires_at,
        };

        let mut saga = Saga::new();

        let room = saga
            .run("create_room", provider.create_room(&room_request))
            .await?;

        let undo_provider = provider.clone();
        let undo_room_id = room.id.clone();
        saga.on_rollback("delete_room", async move {
            undo_provider.delete_room(&undo_room_id).await
        });

        let token_request = self.token_request(user, &room.id);
        let token = saga
            .run("create_token", provider.create_token(&token_request))
            .await?;
        debug!(
            target: "ds.services.orchestrator",
            room_id = %room.id,
            room_friendly_url = %room.friendly_url,
            token_room_url = %token.room_url,
            "Moderator token created"
        );

        let room_slug = if room.friendly_url.is_empty() {
            slug.as_str()
        } else {
            room.friendly_url.as_str()
        };
        let meeting_url =
            derive_join_url(settings.dashboard_url(), &settings.team_name, room_slug);

        let requester = user.display_name();
        let post = meeting_post(MeetingPost {
            user_id: &user.id,
            requester: &requester,
            channel_id: &channel.id,
            root_id,
            meeting_id,
            room_id: &room.id,
            meeting_url: &meeting_url,
            topic: &topic,
            expires_at,
        });

        saga.run("create_post", self.host.create_post(post)).await?;
        saga.commit();

        record_meeting_started();
        info!(
            target: "ds.services.orchestrator",
            room_id = %room.id,
            meeting_url = %meeting_url,
            "Meeting started"
        );

        let (team_name, room_name) = split_join_url(&meeting_url);
        Ok(MeetingInfo {
            meeting_id: meeting_id.to_string(),
            room_id: room.id,
            room_url: meeting_url,
            team_name,
            room_name,
        })
    }

    /// Issue a moderator token for `user_id` in an existing room.
    #[instrument(skip(self, snapshot))]
    pub async fn create_token(
        &self,
        snapshot: &Snapshot,
        user_id: &str,
        room_id: &str,
    ) -> Result<RoomToken, PluginError> {
        let user = self.host.get_user(user_id).await?;
        let request = self.token_request(&user, room_id);
        snapshot.provider.create_token(&request).await
    }

    fn token_request(&self, user: &User, room_id: &str) -> CreateTokenRequest {
        let avatar_url = self
            .host
            .site_url()
            .filter(|url| !url.is_empty())
            .map(|url| user.avatar_url(url))
            .unwrap_or_default();

        CreateTokenRequest {
            room_id: room_id.to_string(),
            user_id: user.id.clone(),
            user_name: user.display_name(),
            user_email: user.email.clone(),
            role: TokenRole::Moderator,
            avatar_url,
        }
    }

    /// Team of a named channel, if it can be looked up.
    async fn resolve_team(&self, channel: &Channel) -> Option<Team> {
        if channel.team_id.is_empty() {
            return None;
        }
        match self.host.get_team(&channel.team_id).await {
            Ok(team) => Some(team),
            Err(e) => {
                debug!(target: "ds.services.orchestrator", error = %e, "Team lookup failed");
                None
            }
        }
    }
}

fn action_context(choice: &MeetingChoice, root_id: Option<&str>) -> Value {
    let mut context = json!({
        "meeting_id": choice.meeting_id,
        "meeting_topic": choice.meeting_topic,
        "personal": choice.personal,
    });
    if let (Some(root_id), Some(map)) = (root_id, context.as_object_mut()) {
        map.insert("root_id".to_string(), Value::String(root_id.to_string()));
    }
    context
}

struct MeetingPost<'a> {
    user_id: &'a str,

    /// Shown as the post author in place of the bot's name.
    requester: &'a str,

    channel_id: &'a str,
    root_id: Option<&'a str>,
    meeting_id: &'a str,
    room_id: &'a str,
    meeting_url: &'a str,
    topic: &'a str,
    expires_at: Option<DateTime<Utc>>,
}

fn meeting_post(m: MeetingPost<'_>) -> Post {
    let mut text = messages::meeting_text(m.meeting_id, m.meeting_url);
    if let Some(expires_at) = m.expires_at {
        text.push_str("\n\n");
        text.push_str(&messages::room_expires(
            &expires_at.format("%H:%M UTC").to_string(),
        ));
    }

    let mut post = Post {
        user_id: m.user_id.to_string(),
        channel_id: m.channel_id.to_string(),
        root_id: m.root_id.unwrap_or_default().to_string(),
        post_type: MEETING_POST_TYPE.to_string(),
        ..Default::default()
    };
    post.set_attachments(&[SlackAttachment {
        fallback: messages::meeting_fallback(m.meeting_id, m.meeting_url),
        title: m.topic.to_string(),
        text,
        ..Default::default()
    }]);

    let props = &mut post.props;
    props.insert("from_bot".to_string(), json!("true"));
    props.insert("override_username".to_string(), json!(m.requester));
    props.insert("meeting_id".to_string(), json!(m.meeting_id));
    props.insert("room_id".to_string(), json!(m.room_id));
    props.insert("meeting_url".to_string(), json!(m.meeting_url));
    props.insert("meeting_topic".to_string(), json!(m.topic));
    if let Some(expires_at) = m.expires_at {
        props.insert("room_expires_at".to_string(), json!(expires_at.timestamp()));
    }

    post
}

/// Room slug: the first [`MAX_FRIENDLY_URL_LEN`] characters of the meeting ID.
pub fn friendly_url(meeting_id: &str) -> String {
    meeting_id.chars().take(MAX_FRIENDLY_URL_LEN).collect()
}

/// `now + minutes`, or `None` for rooms that never expire.
pub fn room_expiry(now: DateTime<Utc>, minutes: i64) -> Option<DateTime<Utc>> {
    if minutes <= 0 {
        return None;
    }
    let expiry = chrono::Duration::try_minutes(minutes).and_then(|d| now.checked_add_signed(d));
    if expiry.is_none() {
        warn!(target: "ds.services.orchestrator", minutes, "Room expiry out of range, creating room without expiry");
    }
    expiry
}

/// Join URL for a room slug.
///
/// The team comes from a `https://<team>.digitalsamba.com/...` dashboard URL,
/// then from the configured team name. Without either a placeholder team is
/// used so the post still goes out.
pub fn derive_join_url(dashboard_url: &str, team_name: &str, slug: &str) -> String {
    if let Some(team) = team_from_dashboard_url(dashboard_url) {
        return format!("https://{team}{PROVIDER_DOMAIN}/{slug}");
    }

    let team_name = team_name.trim();
    if !team_name.is_empty() {
        return format!("https://{team_name}{PROVIDER_DOMAIN}/{slug}");
    }

    warn!(
        target: "ds.services.orchestrator",
        dashboard_url,
        "Could not extract team name from dashboard URL, using placeholder"
    );
    format!("https://{PLACEHOLDER_TEAM}{PROVIDER_DOMAIN}/{slug}")
}

fn team_from_dashboard_url(dashboard_url: &str) -> Option<&str> {
    if !dashboard_url.contains(PROVIDER_DOMAIN) {
        return None;
    }
    let rest = dashboard_url.strip_prefix("https://")?;
    rest.split('.').next().filter(|team| !team.is_empty())
}

/// Team and room name back out of a join URL.
fn split_join_url(meeting_url: &str) -> (String, String) {
    let without_scheme = meeting_url
        .strip_prefix("https://")
        .unwrap_or(meeting_url);
    let team_name = without_scheme.split('.').next().unwrap_or_default();
    let room_name = meeting_url.rsplit('/').next().unwrap_or_default();
    (team_name.to_string(), room_name.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::models::ChannelType;
    use crate::repositories::kv::mock::RecordingNotifier;
    use crate::repositories::kv::MemoryStore;
    use crate::services::host::mock::MockHost;
    use secrecy::SecretString;
    use std::time::Duration;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(dashboard_url: &str, naming_scheme: NamingScheme, expiry: i64) -> Settings {
        Settings {
            api_key: SecretString::from("test-key".to_string()),
            dashboard_url: dashboard_url.to_string(),
            team_name: String::new(),
            embedded: false,
            show_prejoin_page: false,
            naming_scheme,
            room_expiry_minutes: expiry,
            max_participants: 100,
            enable_recording: false,
            enable_breakout_rooms: false,
        }
    }

    fn snapshot(dashboard_url: &str, naming_scheme: NamingScheme, expiry: i64) -> Arc<Snapshot> {
        Arc::new(Snapshot::build(settings(dashboard_url, naming_scheme, expiry)).unwrap())
    }

    fn host() -> MockHost {
        MockHost::new()
            .with_user(User {
                id: "u1".to_string(),
                username: "alice".to_string(),
                first_name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                ..Default::default()
            })
            .with_channel(Channel {
                id: "C1".to_string(),
                team_id: "t1".to_string(),
                channel_type: ChannelType::Open,
                name: "town-square".to_string(),
                display_name: "Town Square".to_string(),
            })
            .with_channel(Channel {
                id: "D1".to_string(),
                team_id: String::new(),
                channel_type: ChannelType::Direct,
                name: "u1__u2".to_string(),
                display_name: String::new(),
            })
            .with_team(Team {
                id: "t1".to_string(),
                name: "acme".to_string(),
                display_name: "Acme".to_string(),
            })
            .with_site_url("https://chat.example.com")
    }

    fn orchestrator(host: Arc<MockHost>) -> (MeetingOrchestrator, Arc<MemoryStore>) {
        let memory = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let preferences = UserPreferenceStore::new(memory.clone(), notifier);
        (
            MeetingOrchestrator::new(host, preferences, "https://plugin.example.com/", "bot1"),
            memory,
        )
    }

    async fn mount_room(server: &MockServer, room_id: &str, friendly_url: Option<&str>) {
        let mut body = json!({ "id": room_id });
        if let Some(slug) = friendly_url {
            body["friendly_url"] = json!(slug);
        }
        Mock::given(method("POST"))
            .and(path("/rooms"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_token(server: &MockServer, status: u16) {
        let template = if status == 200 {
            ResponseTemplate::new(200).set_body_json(json!({
                "token": "secret-moderator-token",
                "role": "moderator"
            }))
        } else {
            ResponseTemplate::new(status).set_body_string("token refused")
        };
        Mock::given(method("POST"))
            .and(path_regex(r"^/rooms/[^/]+/token$"))
            .respond_with(template)
            .mount(server)
            .await;
    }

    fn start_request(channel_id: &str) -> StartRequest {
        StartRequest {
            user_id: "u1".to_string(),
            channel_id: channel_id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_friendly_url_truncates_to_32_chars() {
        let long = "a".repeat(40);
        assert_eq!(friendly_url(&long).len(), 32);
        assert_eq!(friendly_url("short"), "short");

        let id = uuid::Uuid::new_v4().to_string();
        assert_eq!(friendly_url(&id), id.chars().take(32).collect::<String>());
    }

    #[test]
    fn test_room_expiry() {
        let now = Utc::now();
        assert_eq!(room_expiry(now, 0), None);
        assert_eq!(
            room_expiry(now, 90),
            Some(now + chrono::Duration::minutes(90))
        );
        assert_eq!(room_expiry(now, i64::MAX), None);
    }

    #[test]
    fn test_derive_join_url() {
        assert_eq!(
            derive_join_url("https://acme.digitalsamba.com/api/v1", "", "standup"),
            "https://acme.digitalsamba.com/standup"
        );
        // http dashboards do not reveal the team.
        assert_eq!(
            derive_join_url("http://acme.digitalsamba.com/api/v1", "", "standup"),
            "https://CONFIGURE_TEAM_NAME.digitalsamba.com/standup"
        );
        assert_eq!(
            derive_join_url("https://api.example.com", "acme", "standup"),
            "https://acme.digitalsamba.com/standup"
        );
        assert_eq!(
            derive_join_url("https://api.example.com", "", "standup"),
            "https://CONFIGURE_TEAM_NAME.digitalsamba.com/standup"
        );
    }

    #[test]
    fn test_split_join_url() {
        assert_eq!(
            split_join_url("https://acme.digitalsamba.com/standup"),
            ("acme".to_string(), "standup".to_string())
        );
    }

    #[test]
    fn test_meeting_post_without_expiry() {
        let post = meeting_post(MeetingPost {
            user_id: "u1",
            requester: "Alice",
            channel_id: "C1",
            root_id: Some("R1"),
            meeting_id: "m1",
            room_id: "room-1",
            meeting_url: "https://acme.digitalsamba.com/m1",
            topic: "Standup",
            expires_at: None,
        });

        assert_eq!(post.post_type, MEETING_POST_TYPE);
        assert_eq!(post.root_id, "R1");
        assert_eq!(post.props["override_username"], "Alice");
        assert_eq!(post.props["from_bot"], "true");
        assert_eq!(post.props["meeting_id"], "m1");
        assert_eq!(post.props["room_id"], "room-1");
        assert_eq!(post.props["meeting_url"], "https://acme.digitalsamba.com/m1");
        assert_eq!(post.props["meeting_topic"], "Standup");
        assert!(post.props.get("room_expires_at").is_none());

        let attachments = post.attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].title, "Standup");
        assert!(!attachments[0].text.contains("expires"));
    }

    #[test]
    fn test_meeting_post_with_expiry() {
        let expires_at = DateTime::parse_from_rfc3339("2026-03-01T14:05:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let post = meeting_post(MeetingPost {
            user_id: "u1",
            requester: "Alice",
            channel_id: "C1",
            root_id: None,
            meeting_id: "m1",
            room_id: "room-1",
            meeting_url: "https://acme.digitalsamba.com/m1",
            topic: "Standup",
            expires_at: Some(expires_at),
        });

        assert_eq!(post.props["room_expires_at"], expires_at.timestamp());
        assert!(post.attachments()[0]
            .text
            .ends_with("\n\nRoom expires at: 14:05 UTC"));
        assert!(post.root_id.is_empty());
    }

    #[tokio::test]
    async fn test_start_provisions_and_posts() {
        let server = MockServer::start().await;
        mount_room(&server, "room-42", Some("Weekly-sync")).await;
        mount_token(&server, 200).await;

        let host = Arc::new(host());
        let (orchestrator, _) = orchestrator(host.clone());
        let snapshot = snapshot(&server.uri(), NamingScheme::Ask, 0);

        let outcome = orchestrator
            .start(
                &snapshot,
                StartRequest {
                    topic: Some("Weekly sync".to_string()),
                    root_id: Some("R1".to_string()),
                    ..start_request("C1")
                },
            )
            .await
            .unwrap();

        let StartOutcome::Provisioned(info) = outcome else {
            unreachable!("expected a provisioned meeting");
        };
        assert_eq!(info.meeting_id, "Weekly-sync");
        assert_eq!(info.room_id, "room-42");
        assert_eq!(
            info.room_url,
            "https://CONFIGURE_TEAM_NAME.digitalsamba.com/Weekly-sync"
        );
        assert_eq!(info.team_name, "CONFIGURE_TEAM_NAME");
        assert_eq!(info.room_name, "Weekly-sync");

        let posts = host.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].channel_id, "C1");
        assert_eq!(posts[0].user_id, "u1");
        assert_eq!(posts[0].root_id, "R1");
        assert!(!serde_json::to_string(&posts[0])
            .unwrap()
            .contains("secret-moderator-token"));
    }

    #[tokio::test]
    async fn test_token_failure_deletes_room_once() {
        let server = MockServer::start().await;
        mount_room(&server, "room-7", None).await;
        mount_token(&server, 500).await;
        Mock::given(method("DELETE"))
            .and(path("/rooms/room-7"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let host = Arc::new(host());
        let (orchestrator, _) = orchestrator(host.clone());
        let snapshot = snapshot(&server.uri(), NamingScheme::Uuid, 0);

        let err = orchestrator
            .start(&snapshot, start_request("C1"))
            .await
            .unwrap_err();

        assert!(matches!(err, PluginError::Provider { status: 500, .. }));
        assert_eq!(host.create_post_calls(), 0);
    }

    #[tokio::test]
    async fn test_post_failure_deletes_room_once() {
        let server = MockServer::start().await;
        mount_room(&server, "room-8", None).await;
        mount_token(&server, 200).await;
        Mock::given(method("DELETE"))
            .and(path("/rooms/room-8"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let host = Arc::new(host());
        host.fail_posts();
        let (orchestrator, _) = orchestrator(host.clone());
        let snapshot = snapshot(&server.uri(), NamingScheme::Words, 0);

        let err = orchestrator
            .start(&snapshot, start_request("C1"))
            .await
            .unwrap_err();

        // The post error is returned even though the delete failed too.
        assert!(matches!(err, PluginError::HostApi(_)));
        assert_eq!(host.create_post_calls(), 1);
    }

    #[tokio::test]
    async fn test_room_failure_has_nothing_to_undo() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rooms"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let host = Arc::new(host());
        let (orchestrator, _) = orchestrator(host.clone());
        let snapshot = snapshot(&server.uri(), NamingScheme::Words, 0);

        let err = orchestrator
            .start(&snapshot, start_request("C1"))
            .await
            .unwrap_err();
        assert!(matches!(&err, PluginError::Provider { status: 401, body } if body == "bad key"));
    }

    #[tokio::test]
    async fn test_abandoned_start_still_rolls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rooms"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": "room-slow" }))
                    .set_delay(Duration::from_millis(150)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rooms/room-slow/token"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_string("token refused")
                    .set_delay(Duration::from_millis(150)),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/rooms/room-slow"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let host = Arc::new(host());
        let (orchestrator, _) = orchestrator(host.clone());
        let snapshot = snapshot(&server.uri(), NamingScheme::Words, 0);

        // The caller gives up while the room is still being created.
        let waited = tokio::time::timeout(
            Duration::from_millis(50),
            orchestrator.start(&snapshot, start_request("C1")),
        )
        .await;
        assert!(waited.is_err());

        let mut deleted = false;
        for _ in 0..100 {
            let requests = server.received_requests().await.unwrap();
            if requests.iter().any(|r| r.method.as_str() == "DELETE") {
                deleted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(deleted, "room was not deleted after the caller went away");
        server.verify().await;
        assert_eq!(host.create_post_calls(), 0);
    }

    #[tokio::test]
    async fn test_non_member_is_forbidden() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let host = Arc::new(host().with_non_member("C1", "u1"));
        let (orchestrator, _) = orchestrator(host.clone());

        for scheme in [NamingScheme::Words, NamingScheme::Ask] {
            let snapshot = snapshot(&server.uri(), scheme, 0);
            let err = orchestrator
                .start(&snapshot, start_request("C1"))
                .await
                .unwrap_err();
            assert!(
                matches!(err, PluginError::Forbidden(_)),
                "{scheme:?} gave {err:?}"
            );
        }

        assert!(host.posts().is_empty());
        assert!(host.ephemeral_posts().is_empty());
        server.verify().await;
    }

    #[tokio::test]
    async fn test_ask_without_topic_prompts() {
        let host = Arc::new(host());
        let (orchestrator, memory) = orchestrator(host.clone());
        let snapshot = snapshot("https://acme.digitalsamba.com/api/v1", NamingScheme::Ask, 0);

        let outcome = orchestrator
            .start(
                &snapshot,
                StartRequest {
                    root_id: Some("R9".to_string()),
                    ..start_request("C1")
                },
            )
            .await
            .unwrap();

        let StartOutcome::Prompted(choices) = outcome else {
            unreachable!("expected a prompt");
        };
        let names: Vec<&str> = choices.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                messages::CHOICE_RANDOM_WORDS,
                messages::CHOICE_PERSONAL,
                messages::CHOICE_CHANNEL,
                messages::CHOICE_UUID
            ]
        );
        assert_eq!(choices[1].meeting_id, "alice-personal-meeting");
        assert_eq!(choices[1].meeting_topic, "Alice's Meeting");
        assert_eq!(choices[2].meeting_id, "acme-town-square-meeting");
        assert_eq!(choices[2].meeting_topic, "Town Square Channel Meeting");
        assert!(!choices[2].personal);

        let ephemeral = host.ephemeral_posts();
        assert_eq!(ephemeral.len(), 1);
        let (recipient, post) = &ephemeral[0];
        assert_eq!(recipient, "u1");
        assert_eq!(post.user_id, "bot1");
        assert_eq!(post.root_id, "R9");

        let attachment = &post.attachments()[0];
        assert_eq!(attachment.title, messages::ASK_TITLE);
        assert_eq!(attachment.actions.len(), 4);
        let action = &attachment.actions[0].integration;
        assert_eq!(action.url, "https://plugin.example.com/api/v1/meetings");
        assert_eq!(action.context["meeting_topic"], DEFAULT_MEETING_TOPIC);
        assert_eq!(action.context["personal"], true);
        assert_eq!(action.context["root_id"], "R9");

        assert!(host.posts().is_empty());
        assert!(memory.is_empty().await);
    }

    #[tokio::test]
    async fn test_prompt_in_direct_channel_has_no_channel_choice() {
        let host = Arc::new(host());
        let (orchestrator, _) = orchestrator(host.clone());
        let user = host.get_user("u1").await.unwrap();
        let channel = host.get_channel("D1").await.unwrap();

        let choices = orchestrator
            .present_choices(&user, &channel, None)
            .await
            .unwrap();

        assert_eq!(choices.len(), 3);
        assert!(choices.iter().all(|c| c.name != messages::CHOICE_CHANNEL));
        let context = &host.ephemeral_posts()[0].1.attachments()[0].actions[0]
            .integration
            .context;
        assert!(context.get("root_id").is_none());
    }

    #[tokio::test]
    async fn test_create_token_for_caller() {
        let server = MockServer::start().await;
        mount_token(&server, 200).await;

        let host = Arc::new(host());
        let (orchestrator, _) = orchestrator(host);
        let snapshot = snapshot(&server.uri(), NamingScheme::Words, 0);

        let token = orchestrator
            .create_token(&snapshot, "u1", "room-1")
            .await
            .unwrap();
        assert_eq!(token.token, "secret-moderator-token");
    }

    #[tokio::test]
    async fn test_unknown_channel_is_not_found() {
        let host = Arc::new(host());
        let (orchestrator, _) = orchestrator(host);
        let snapshot = snapshot("https://acme.digitalsamba.com", NamingScheme::Words, 0);

        let err = orchestrator
            .start(&snapshot, start_request("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::NotFound(_)));
    }
}
