//! User-facing text.
//!
//! Default English templates for everything the plugin posts or returns to
//! users. Substitution is plain `format!`; there is no localization layer.

use crate::models::UserPreference;

pub const ASK_TITLE: &str = "DigitalSamba Meeting Start";
pub const ASK_TEXT: &str = "Select type of meeting you want to start";

pub const CHOICE_RANDOM_WORDS: &str = "Meeting name with random words";
pub const CHOICE_PERSONAL: &str = "Personal meeting";
pub const CHOICE_CHANNEL: &str = "Channel meeting";
pub const CHOICE_UUID: &str = "Meeting name with UUID";

/// Label in front of the meeting ID in the meeting post.
pub const MEETING_TYPE_LABEL: &str = "Meeting ID";

pub const COMMAND_HELP: &str = "* |/digitalsamba| - Start a meeting with a random name
* |/digitalsamba [topic]| - Start a meeting with specified topic
* |/digitalsamba start [topic]| - Start a meeting, optionally with a topic
* |/digitalsamba settings| - View your current settings
* |/digitalsamba settings [setting] [value]| - Update your settings
  * |setting| can be \"naming_scheme\" or \"embed\"
  * |naming_scheme| values: \"words\", \"uuid\", \"mattermost\", \"ask\"
  * |embed| values: \"true\", \"false\"
* |/digitalsamba help| - Show this help text";

pub const SETTINGS_USAGE: &str = "Invalid settings command. Use `/digitalsamba settings` to view or `/digitalsamba settings [setting] [value]` to update.";
pub const SETTINGS_UPDATED: &str = "Settings updated successfully";
pub const SETTINGS_READ_FAILED: &str = "Failed to get user settings";
pub const SETTINGS_WRITE_FAILED: &str = "Failed to update settings";
pub const USER_LOOKUP_FAILED: &str = "Failed to get user information";
pub const CHANNEL_LOOKUP_FAILED: &str = "Failed to get channel information";

/// Personal meeting topic, e.g. "Alice's Meeting".
pub fn personal_topic(display_name: &str) -> String {
    format!("{display_name}'s Meeting")
}

/// Channel meeting topic, e.g. "Town Square Channel Meeting".
pub fn channel_topic(channel_display_name: &str) -> String {
    format!("{channel_display_name} Channel Meeting")
}

/// Body of the meeting attachment.
pub fn meeting_text(meeting_id: &str, meeting_url: &str) -> String {
    format!(
        "{MEETING_TYPE_LABEL}: [{meeting_id}]({meeting_url})\n\n[Join Meeting]({meeting_url})"
    )
}

/// Plain fallback for clients that cannot render attachments.
pub fn meeting_fallback(meeting_id: &str, meeting_url: &str) -> String {
    format!(
        "Video Meeting started at [{meeting_id}]({meeting_url}).\n\n[Join Meeting]({meeting_url})"
    )
}

/// Suffix for expiring rooms; `time` is already formatted.
pub fn room_expires(time: &str) -> String {
    format!("Room expires at: {time}")
}

pub fn current_settings(preference: &UserPreference) -> String {
    format!(
        "Current DigitalSamba Settings:\n* Naming Scheme: {}\n* Embed Video: {}\n* Show Pre-join Page: {}",
        preference.naming_scheme, preference.embedded, preference.show_prejoin_page
    )
}

pub fn meeting_started(meeting_id: &str) -> String {
    format!("Meeting started: {meeting_id}")
}

pub fn meeting_failed(error: &dyn std::fmt::Display) -> String {
    format!("Failed to start meeting: {error}")
}
