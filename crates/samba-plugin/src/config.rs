//! Plugin configuration.
//!
//! Configuration is loaded from environment variables. All secrets
//! are redacted in Debug output.
//!
//! [`Settings`] is the reloadable part (provider credentials and meeting
//! defaults); [`Config`] adds the process-level values that only take effect
//! at startup.

use crate::models::NamingScheme;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default public base URL used in action callback URLs.
pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:8080";

/// Default slash-command trigger word.
pub const DEFAULT_COMMAND_TRIGGER: &str = "digitalsamba";

/// Default participant cap for new rooms.
pub const DEFAULT_MAX_PARTICIPANTS: i64 = 100;

/// Bounds for the participant cap.
pub const MIN_MAX_PARTICIPANTS: i64 = 1;
pub const MAX_MAX_PARTICIPANTS: i64 = 2000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    /// Settings parsed but failed validation. The message is user-facing.
    #[error("{0}")]
    Invalid(String),
}

/// Provider settings and meeting defaults.
///
/// Validated as a whole; an invalid set is rejected and the previously
/// active one stays in place.
#[derive(Clone)]
pub struct Settings {
    /// DigitalSamba developer API key.
    pub api_key: SecretString,

    /// Dashboard URL, also used as the provider API base URL.
    pub dashboard_url: String,

    /// Subdomain for join URLs when the dashboard URL does not carry one.
    pub team_name: String,

    /// Default for users who never saved a preference.
    pub embedded: bool,

    pub show_prejoin_page: bool,

    pub naming_scheme: NamingScheme,

    /// Minutes until a new room expires; 0 means never.
    pub room_expiry_minutes: i64,

    pub max_participants: i64,

    pub enable_recording: bool,

    pub enable_breakout_rooms: bool,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &"[REDACTED]")
            .field("dashboard_url", &self.dashboard_url)
            .field("team_name", &self.team_name)
            .field("embedded", &self.embedded)
            .field("show_prejoin_page", &self.show_prejoin_page)
            .field("naming_scheme", &self.naming_scheme)
            .field("room_expiry_minutes", &self.room_expiry_minutes)
            .field("max_participants", &self.max_participants)
            .field("enable_recording", &self.enable_recording)
            .field("enable_breakout_rooms", &self.enable_breakout_rooms)
            .finish()
    }
}

impl Settings {
    /// Load settings from environment variables and validate them.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load settings from a HashMap (for testing) and validate them.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let naming_scheme = match vars.get("DS_NAMING_SCHEME") {
            Some(value) => value
                .trim()
                .parse::<NamingScheme>()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?,
            None => NamingScheme::default(),
        };

        let settings = Settings {
            api_key: SecretString::from(
                vars.get("DS_API_KEY").cloned().unwrap_or_default(),
            ),
            dashboard_url: vars.get("DS_DASHBOARD_URL").cloned().unwrap_or_default(),
            team_name: vars
                .get("DS_TEAM_NAME")
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            embedded: parse_bool(vars, "DS_EMBEDDED", false)?,
            show_prejoin_page: parse_bool(vars, "DS_SHOW_PREJOIN_PAGE", false)?,
            naming_scheme,
            room_expiry_minutes: parse_int(vars, "DS_ROOM_EXPIRY_MINUTES", 0)?,
            max_participants: parse_int(vars, "DS_MAX_PARTICIPANTS", DEFAULT_MAX_PARTICIPANTS)?,
            enable_recording: parse_bool(vars, "DS_ENABLE_RECORDING", false)?,
            enable_breakout_rooms: parse_bool(vars, "DS_ENABLE_BREAKOUT_ROOMS", false)?,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Check the settings as a whole.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Invalid(
                "DigitalSamba API Key is required".to_string(),
            ));
        }

        if self.dashboard_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "DigitalSamba Dashboard URL is required".to_string(),
            ));
        }

        let url = self.dashboard_url.trim();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Invalid(
                "DigitalSamba Dashboard URL must start with http:// or https://".to_string(),
            ));
        }

        if self.room_expiry_minutes < 0 {
            return Err(ConfigError::Invalid(
                "room expiry time cannot be negative".to_string(),
            ));
        }

        if !(MIN_MAX_PARTICIPANTS..=MAX_MAX_PARTICIPANTS).contains(&self.max_participants) {
            return Err(ConfigError::Invalid(format!(
                "maximum participants must be between {} and {}",
                MIN_MAX_PARTICIPANTS, MAX_MAX_PARTICIPANTS
            )));
        }

        Ok(())
    }

    /// Dashboard URL without surrounding whitespace or trailing slashes.
    pub fn dashboard_url(&self) -> &str {
        self.dashboard_url.trim().trim_end_matches('/')
    }
}

/// Plugin service configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Base URL under which Mattermost reaches this service.
    pub public_url: String,

    /// Mattermost server base URL, also used as the site URL.
    pub mattermost_url: String,

    /// Bot access token for the Mattermost REST API.
    pub bot_token: SecretString,

    /// Author of ephemeral prompts. Empty means the server decides.
    pub bot_user_id: String,

    /// Slash-command verification token. Every command request must carry it.
    pub command_token: SecretString,

    pub command_trigger: String,

    /// Preferences live in memory when unset.
    pub redis_url: Option<String>,

    /// Seconds to wait after a shutdown signal before closing the listener.
    pub drain_seconds: u64,

    pub settings: Settings,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("public_url", &self.public_url)
            .field("mattermost_url", &self.mattermost_url)
            .field("bot_token", &"[REDACTED]")
            .field("bot_user_id", &self.bot_user_id)
            .field("command_token", &"[REDACTED]")
            .field("command_trigger", &self.command_trigger)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .field("drain_seconds", &self.drain_seconds)
            .field("settings", &self.settings)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mattermost_url = required(vars, "MM_SERVER_URL")?
            .trim()
            .trim_end_matches('/')
            .to_string();

        let bot_token = SecretString::from(required(vars, "MM_BOT_TOKEN")?);

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let public_url = vars
            .get("PUBLIC_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_PUBLIC_URL.to_string());

        let bot_user_id = vars.get("MM_BOT_USER_ID").cloned().unwrap_or_default();

        let command_token = SecretString::from(required(vars, "MM_COMMAND_TOKEN")?);

        let command_trigger = vars
            .get("MM_COMMAND_TRIGGER")
            .map(|s| s.trim().trim_start_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_COMMAND_TRIGGER.to_string());

        let redis_url = vars.get("REDIS_URL").filter(|s| !s.is_empty()).cloned();

        let drain_seconds = match vars.get("DRAIN_SECONDS") {
            Some(value) => value.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                name: "DRAIN_SECONDS".to_string(),
                reason: format!("must be a non-negative integer, got '{}': {}", value, e),
            })?,
            None => 0,
        };

        let settings = Settings::from_vars(vars)?;

        Ok(Config {
            bind_address,
            public_url,
            mattermost_url,
            bot_token,
            bot_user_id,
            command_token,
            command_trigger,
            redis_url,
            drain_seconds,
            settings,
        })
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_bool(
    vars: &HashMap<String, String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = vars.get(name) else {
        return Ok(default);
    };

    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("expected 'true' or 'false', got '{}'", value),
        }),
    }
}

fn parse_int(vars: &HashMap<String, String>, name: &str, default: i64) -> Result<i64, ConfigError> {
    let Some(value) = vars.get(name) else {
        return Ok(default);
    };

    value
        .trim()
        .parse::<i64>()
        .map_err(|e| ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("must be a valid integer, got '{}': {}", value, e),
        })
}
