//! Slash command handling.
//!
//! Mattermost posts `/digitalsamba ...` invocations to `POST /api/v1/command`.
//! Every reply is ephemeral. Failures are reported as reply text, not HTTP
//! errors, so Mattermost always shows the user something.

use crate::errors::PluginError;
use crate::messages;
use crate::models::{CommandRequest, CommandResponse};
use crate::observability::metrics::record_command;
use crate::repositories::preferences::apply_setting;
use crate::repositories::UserPreferenceStore;
use crate::services::host::HostApi;
use crate::services::orchestrator::{MeetingOrchestrator, StartOutcome, StartRequest};
use crate::snapshot::Snapshot;
use ring::hmac;
use ring::rand::SystemRandom;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    ShowSettings,
    UpdateSetting { key: String, value: String },

    /// `settings` with a key but no value.
    SettingsUsage,

    Start { topic: Option<String> },
}

impl Command {
    /// Parse the text after the trigger.
    ///
    /// Unrecognized first words are part of the topic.
    pub fn parse(text: &str) -> Self {
        let fields: Vec<&str> = text.split_whitespace().collect();

        match fields.as_slice() {
            [] => Command::Start { topic: None },
            ["help", ..] => Command::Help,
            ["settings"] => Command::ShowSettings,
            ["settings", key, value @ ..] if !value.is_empty() => Command::UpdateSetting {
                key: (*key).to_string(),
                value: value.join(" "),
            },
            ["settings", ..] => Command::SettingsUsage,
            ["start", topic @ ..] => Command::Start {
                topic: Some(topic.join(" ")).filter(|t| !t.is_empty()),
            },
            topic => Command::Start {
                topic: Some(topic.join(" ")),
            },
        }
    }

    /// Label for the command counter.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::ShowSettings | Command::UpdateSetting { .. } | Command::SettingsUsage => {
                "settings"
            }
            Command::Start { .. } => "start_meeting",
        }
    }
}

/// Runs slash commands on behalf of the invoking user.
#[derive(Clone)]
pub struct CommandProcessor {
    host: Arc<dyn HostApi>,
    orchestrator: MeetingOrchestrator,
    preferences: UserPreferenceStore,

    /// Trigger without the leading slash.
    trigger: String,

    /// Verification token Mattermost sends with each invocation.
    verification_token: SecretString,
}

impl CommandProcessor {
    pub fn new(
        host: Arc<dyn HostApi>,
        orchestrator: MeetingOrchestrator,
        preferences: UserPreferenceStore,
        trigger: &str,
        verification_token: SecretString,
    ) -> Self {
        Self {
            host,
            orchestrator,
            preferences,
            trigger: trigger.trim_start_matches('/').to_string(),
            verification_token,
        }
    }

    /// Run one invocation.
    ///
    /// # Errors
    ///
    /// Only `Unauthorized`, for a missing or wrong verification token.
    /// Everything else becomes reply text.
    #[instrument(skip_all, fields(user_id = %request.user_id, channel_id = %request.channel_id))]
    pub async fn execute(
        &self,
        snapshot: &Arc<Snapshot>,
        request: &CommandRequest,
    ) -> Result<CommandResponse, PluginError> {
        if !tokens_match(&self.verification_token, &request.token) {
            warn!(target: "ds.commands", "Slash command token mismatch");
            return Err(PluginError::Unauthorized);
        }

        if !request.command.is_empty() && request.command.trim_start_matches('/') != self.trigger
        {
            debug!(target: "ds.commands", command = %request.command, "Ignoring foreign trigger");
            return Ok(CommandResponse::ephemeral(""));
        }

        let command = Command::parse(&request.text);
        record_command(command.metric_label());

        let text = match command {
            Command::Help => messages::COMMAND_HELP.to_string(),
            Command::ShowSettings => self.show_settings(snapshot, &request.user_id).await,
            Command::UpdateSetting { key, value } => {
                self.update_setting(snapshot, &request.user_id, &key, &value)
                    .await
            }
            Command::SettingsUsage => messages::SETTINGS_USAGE.to_string(),
            Command::Start { topic } => self.start_meeting(snapshot, request, topic).await,
        };

        Ok(CommandResponse::ephemeral(text))
    }

    async fn show_settings(&self, snapshot: &Snapshot, user_id: &str) -> String {
        match self.preferences.get(user_id, &snapshot.settings).await {
            Ok(preference) => messages::current_settings(&preference),
            Err(e) => {
                warn!(target: "ds.commands", error = %e, "Failed to read settings");
                messages::SETTINGS_READ_FAILED.to_string()
            }
        }
    }

    async fn update_setting(
        &self,
        snapshot: &Snapshot,
        user_id: &str,
        key: &str,
        value: &str,
    ) -> String {
        let current = match self.preferences.get(user_id, &snapshot.settings).await {
            Ok(preference) => preference,
            Err(e) => {
                warn!(target: "ds.commands", error = %e, "Failed to read settings");
                return messages::SETTINGS_READ_FAILED.to_string();
            }
        };

        let updated = match apply_setting(&current, key, value) {
            Ok(updated) => updated,
            Err(e) => return e.to_string(),
        };

        match self.preferences.set(user_id, &updated).await {
            Ok(()) => messages::SETTINGS_UPDATED.to_string(),
            Err(e) => {
                warn!(target: "ds.commands", error = %e, "Failed to write settings");
                messages::SETTINGS_WRITE_FAILED.to_string()
            }
        }
    }

    /// Prompting, naming and membership are all decided by `start_for`.
    async fn start_meeting(
        &self,
        snapshot: &Arc<Snapshot>,
        request: &CommandRequest,
        topic: Option<String>,
    ) -> String {
        let Ok(user) = self.host.get_user(&request.user_id).await else {
            return messages::USER_LOOKUP_FAILED.to_string();
        };
        let Ok(channel) = self.host.get_channel(&request.channel_id).await else {
            return messages::CHANNEL_LOOKUP_FAILED.to_string();
        };

        let start = StartRequest {
            user_id: user.id.clone(),
            channel_id: channel.id.clone(),
            meeting_id: None,
            topic,
            root_id: Some(request.root_id.clone()),
            personal: false,
        };

        match self
            .orchestrator
            .start_for(snapshot, &user, &channel, start)
            .await
        {
            Ok(StartOutcome::Provisioned(info)) => messages::meeting_started(&info.meeting_id),
            // The prompt itself is the reply.
            Ok(StartOutcome::Prompted(_)) => String::new(),
            Err(e) => {
                warn!(target: "ds.commands", error = %e, "Meeting start from command failed");
                messages::meeting_failed(&e)
            }
        }
    }
}

/// Constant-time token comparison.
fn tokens_match(expected: &SecretString, provided: &str) -> bool {
    let rng = SystemRandom::new();
    let Ok(key) = hmac::Key::generate(hmac::HMAC_SHA256, &rng) else {
        return false;
    };
    let tag = hmac::sign(&key, expected.expose_secret().as_bytes());
    hmac::verify(&key, provided.as_bytes(), tag.as_ref()).is_ok()
}
