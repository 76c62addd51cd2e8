//! Key-value storage for per-user records.
//!
//! # Key Patterns
//!
//! - `config_{user_id}` - User preference record (JSON)
//!
//! # Channels
//!
//! - `digitalsamba:{event}` - Session invalidation signals, payload is the user ID
//!
//! [`RedisStore`] is used when `REDIS_URL` is set. Otherwise preferences live
//! in a [`MemoryStore`] and signals go to [`LogNotifier`], since there is no
//! subscriber to deliver them to.

use crate::errors::PluginError;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, error, instrument, warn};

/// Prefix for pub/sub channels carrying session signals.
pub const EVENT_CHANNEL_PREFIX: &str = "digitalsamba:";

/// Raw byte storage keyed by string.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PluginError>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), PluginError>;
}

/// Tells a user's open sessions that something changed.
#[async_trait::async_trait]
pub trait SessionNotifier: Send + Sync {
    async fn notify(&self, user_id: &str, event: &str) -> Result<(), PluginError>;
}

/// Redis-backed store.
///
/// Cheaply cloneable; the multiplexed connection is shared across tasks.
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
}

impl RedisStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Storage` if the connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self, PluginError> {
        let client = Client::open(redis_url).map_err(|e| {
            // The URL may contain credentials; never log it.
            error!(target: "ds.repositories.kv", error = %e, "Failed to open Redis client");
            PluginError::Storage(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!(target: "ds.repositories.kv", error = %e, "Failed to connect to Redis");
                PluginError::Storage(format!("Failed to connect to Redis: {e}"))
            })?;

        Ok(Self { connection })
    }
}

#[async_trait::async_trait]
impl KvStore for RedisStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PluginError> {
        let mut conn = self.connection.clone();
        conn.get(key).await.map_err(|e| {
            warn!(target: "ds.repositories.kv", error = %e, key, "Failed to read key");
            PluginError::from(e)
        })
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), PluginError> {
        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(key, value).await.map_err(|e| {
            warn!(target: "ds.repositories.kv", error = %e, key, "Failed to write key");
            PluginError::from(e)
        })
    }
}

#[async_trait::async_trait]
impl SessionNotifier for RedisStore {
    #[instrument(skip(self))]
    async fn notify(&self, user_id: &str, event: &str) -> Result<(), PluginError> {
        let mut conn = self.connection.clone();
        let channel = format!("{EVENT_CHANNEL_PREFIX}{event}");
        conn.publish::<_, _, ()>(channel, user_id)
            .await
            .map_err(|e| {
                warn!(target: "ds.repositories.kv", error = %e, event, "Failed to publish event");
                PluginError::from(e)
            })
    }
}

/// In-process store.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PluginError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), PluginError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Notifier for single-process deployments. Signals are logged and dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl SessionNotifier for LogNotifier {
    async fn notify(&self, user_id: &str, event: &str) -> Result<(), PluginError> {
        debug!(target: "ds.repositories.kv", user_id, event, "Session signal dropped, no subscriber");
        Ok(())
    }
}

/// Test doubles.
pub mod mock {
    use super::*;

    /// Keeps every signal so tests can assert on them.
    #[derive(Default)]
    pub struct RecordingNotifier {
        notifications: RwLock<Vec<(String, String)>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        /// `(user_id, event)` pairs, oldest first.
        pub async fn notifications(&self) -> Vec<(String, String)> {
            self.notifications.read().await.clone()
        }
    }

    #[async_trait::async_trait]
    impl SessionNotifier for RecordingNotifier {
        async fn notify(&self, user_id: &str, event: &str) -> Result<(), PluginError> {
            self.notifications
                .write()
                .await
                .push((user_id.to_string(), event.to_string()));
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_get_set() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await);
        assert_eq!(store.get("config_u1").await.unwrap(), None);

        store.set("config_u1", b"{}".to_vec()).await.unwrap();
        assert_eq!(store.get("config_u1").await.unwrap(), Some(b"{}".to_vec()));
        assert_eq!(store.len().await, 1);

        store.set("config_u1", b"[]".to_vec()).await.unwrap();
        assert_eq!(store.get("config_u1").await.unwrap(), Some(b"[]".to_vec()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_signals() {
        let notifier = LogNotifier;
        for _ in 0..1000 {
            notifier.notify("u1", "config_update").await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_recording_notifier_keeps_order() {
        let notifier = mock::RecordingNotifier::new();
        notifier.notify("u1", "config_update").await.unwrap();
        notifier.notify("u2", "config_update").await.unwrap();

        assert_eq!(
            notifier.notifications().await,
            vec![
                ("u1".to_string(), "config_update".to_string()),
                ("u2".to_string(), "config_update".to_string()),
            ]
        );
    }
}
