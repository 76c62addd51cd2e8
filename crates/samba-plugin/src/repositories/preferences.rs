//! Per-user preference storage.
//!
//! Records live under `config_{user_id}` as JSON. A user who never saved
//! anything gets the current system defaults, and nothing is written on
//! read. Every successful write is followed by a `config_update` signal to
//! the user's sessions.

use crate::config::Settings;
use crate::errors::PluginError;
use crate::models::{NamingScheme, UserPreference};
use crate::repositories::kv::{KvStore, SessionNotifier};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Signal sent to a user's sessions after their preferences change.
pub const CONFIG_UPDATE_EVENT: &str = "config_update";

/// Settings the slash command may change.
pub const SETTABLE_KEYS: [&str; 2] = ["naming_scheme", "embed"];

fn storage_key(user_id: &str) -> String {
    format!("config_{user_id}")
}

/// Preference repository over a key-value store.
#[derive(Clone)]
pub struct UserPreferenceStore {
    kv: Arc<dyn KvStore>,
    notifier: Arc<dyn SessionNotifier>,
}

impl UserPreferenceStore {
    pub fn new(kv: Arc<dyn KvStore>, notifier: Arc<dyn SessionNotifier>) -> Self {
        Self { kv, notifier }
    }

    /// Stored record, or the defaults from `settings` when there is none.
    #[instrument(skip(self, settings))]
    pub async fn get(
        &self,
        user_id: &str,
        settings: &Settings,
    ) -> Result<UserPreference, PluginError> {
        let Some(bytes) = self.kv.get(&storage_key(user_id)).await? else {
            return Ok(defaults(settings));
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            warn!(target: "ds.repositories.preferences", error = %e, "Stored preference is unreadable");
            PluginError::Storage(format!("failed to decode user preference: {e}"))
        })
    }

    /// Persist a record, then signal the user's sessions.
    #[instrument(skip(self))]
    pub async fn set(&self, user_id: &str, preference: &UserPreference) -> Result<(), PluginError> {
        let bytes = serde_json::to_vec(preference)
            .map_err(|e| PluginError::Internal(format!("failed to encode user preference: {e}")))?;
        self.kv.set(&storage_key(user_id), bytes).await?;

        // The record is already stored; a lost signal only delays a refresh.
        if let Err(e) = self.notifier.notify(user_id, CONFIG_UPDATE_EVENT).await {
            warn!(target: "ds.repositories.preferences", error = %e, "Failed to signal preference change");
        }

        debug!(target: "ds.repositories.preferences", "User preference saved");
        Ok(())
    }
}

/// Preference record for a user who never saved one.
pub fn defaults(settings: &Settings) -> UserPreference {
    UserPreference {
        naming_scheme: settings.naming_scheme,
        embedded: settings.embedded,
        show_prejoin_page: settings.show_prejoin_page,
    }
}

/// Apply one `settings <key> <value>` update to a copy of `current`.
///
/// Returns a `Validation` error, and leaves nothing changed, for unknown
/// keys and values.
pub fn apply_setting(
    current: &UserPreference,
    key: &str,
    value: &str,
) -> Result<UserPreference, PluginError> {
    let mut updated = *current;

    match key {
        "naming_scheme" => {
            updated.naming_scheme = value.parse::<NamingScheme>().map_err(|_| {
                PluginError::Validation(format!(
                    "Invalid naming scheme. Valid values are: {}",
                    NamingScheme::valid_values()
                ))
            })?;
        }
        "embed" => {
            updated.embedded = match value {
                "true" => true,
                "false" => false,
                _ => {
                    return Err(PluginError::Validation(
                        "Invalid embed value. Use 'true' or 'false'".to_string(),
                    ))
                }
            };
        }
        _ => {
            return Err(PluginError::Validation(format!(
                "Invalid setting. Valid settings are: {}",
                SETTABLE_KEYS.join(", ")
            )))
        }
    }

    Ok(updated)
}

/// Body of a preference write over HTTP.
#[derive(Debug, Deserialize)]
struct PreferenceUpdate {
    naming_scheme: String,

    #[serde(default)]
    embedded: bool,

    #[serde(default)]
    show_prejoin_page: bool,
}

/// Parse and validate a full preference record sent by the webapp.
pub fn parse_preference(body: &[u8]) -> Result<UserPreference, PluginError> {
    let update: PreferenceUpdate = serde_json::from_slice(body).map_err(|e| {
        debug!(target: "ds.repositories.preferences", error = %e, "Invalid preference body");
        PluginError::BadRequest("Invalid request body".to_string())
    })?;

    let naming_scheme = update
        .naming_scheme
        .parse::<NamingScheme>()
        .map_err(|e| PluginError::Validation(e.to_string()))?;

    Ok(UserPreference {
        naming_scheme,
        embedded: update.embedded,
        show_prejoin_page: update.show_prejoin_page,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::repositories::kv::mock::RecordingNotifier;
    use crate::repositories::kv::{LogNotifier, MemoryStore};
    use secrecy::SecretString;

    fn settings() -> Settings {
        Settings {
            api_key: SecretString::from("k".to_string()),
            dashboard_url: "https://acme.digitalsamba.com".to_string(),
            team_name: String::new(),
            embedded: true,
            show_prejoin_page: true,
            naming_scheme: NamingScheme::Mattermost,
            room_expiry_minutes: 0,
            max_participants: 100,
            enable_recording: false,
            enable_breakout_rooms: false,
        }
    }

    fn store() -> (UserPreferenceStore, Arc<MemoryStore>, Arc<RecordingNotifier>) {
        let memory = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let store = UserPreferenceStore::new(memory.clone(), notifier.clone());
        (store, memory, notifier)
    }

    #[tokio::test]
    async fn test_get_returns_defaults_without_writing() {
        let (store, memory, notifier) = store();

        let pref = store.get("u1", &settings()).await.unwrap();

        assert_eq!(pref.naming_scheme, NamingScheme::Mattermost);
        assert!(pref.embedded);
        assert!(pref.show_prejoin_page);
        assert!(memory.is_empty().await);
        assert!(notifier.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn test_set_then_get_and_notify() {
        let (store, memory, notifier) = store();
        let pref = UserPreference {
            naming_scheme: NamingScheme::Uuid,
            embedded: false,
            show_prejoin_page: false,
        };

        store.set("u1", &pref).await.unwrap();

        assert_eq!(store.get("u1", &settings()).await.unwrap(), pref);
        assert_eq!(
            memory.get("config_u1").await.unwrap().unwrap(),
            br#"{"naming_scheme":"uuid","embedded":false,"show_prejoin_page":false}"#.to_vec()
        );
        assert_eq!(
            notifier.notifications().await,
            vec![("u1".to_string(), CONFIG_UPDATE_EVENT.to_string())]
        );
    }

    #[tokio::test]
    async fn test_repeated_saves_without_redis_keep_one_record() {
        let memory = Arc::new(MemoryStore::new());
        let store = UserPreferenceStore::new(memory.clone(), Arc::new(LogNotifier));
        let pref = UserPreference::default();

        for _ in 0..500 {
            store.set("u1", &pref).await.unwrap();
        }

        assert_eq!(memory.len().await, 1);
        assert_eq!(store.get("u1", &settings()).await.unwrap(), pref);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_storage_error() {
        let (store, memory, _) = store();
        memory.set("config_u1", b"not json".to_vec()).await.unwrap();

        let err = store.get("u1", &settings()).await.unwrap_err();
        assert!(matches!(err, PluginError::Storage(_)));
    }

    #[test]
    fn test_apply_setting_accepts_all_schemes() {
        let current = UserPreference::default();
        for scheme in NamingScheme::ALL {
            let updated = apply_setting(&current, "naming_scheme", scheme.as_str()).unwrap();
            assert_eq!(updated.naming_scheme, scheme);
        }
    }

    #[test]
    fn test_apply_setting_rejects_unknown_scheme() {
        let current = UserPreference {
            naming_scheme: NamingScheme::Uuid,
            ..Default::default()
        };
        let err = apply_setting(&current, "naming_scheme", "dice").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid naming scheme. Valid values are: words, uuid, mattermost, ask"
        );
        assert_eq!(current.naming_scheme, NamingScheme::Uuid);
    }

    #[test]
    fn test_apply_setting_embed() {
        let current = UserPreference::default();
        assert!(apply_setting(&current, "embed", "true").unwrap().embedded);
        assert!(!apply_setting(&current, "embed", "false").unwrap().embedded);

        let err = apply_setting(&current, "embed", "yes").unwrap_err();
        assert_eq!(err.to_string(), "Invalid embed value. Use 'true' or 'false'");
    }

    #[test]
    fn test_apply_setting_unknown_key() {
        let err = apply_setting(&UserPreference::default(), "color", "blue").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid setting. Valid settings are: naming_scheme, embed"
        );
    }

    #[test]
    fn test_parse_preference() {
        let pref =
            parse_preference(br#"{"naming_scheme":"ask","embedded":true}"#).unwrap();
        assert_eq!(pref.naming_scheme, NamingScheme::Ask);
        assert!(pref.embedded);
        assert!(!pref.show_prejoin_page);

        let err = parse_preference(br#"{"naming_scheme":"dice"}"#).unwrap_err();
        assert!(matches!(err, PluginError::Validation(_)));

        let err = parse_preference(b"{").unwrap_err();
        assert!(matches!(err, PluginError::BadRequest(_)));
    }
}
