//! Active configuration snapshot.
//!
//! Each request clones the current `Arc<Snapshot>` once and uses it for its
//! whole workflow. A reload builds a complete new snapshot and swaps it in;
//! if anything about the new settings is wrong the old snapshot stays.

use crate::config::Settings;
use crate::errors::PluginError;
use crate::services::provider_client::ProviderClient;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Validated settings and the provider client built from them.
pub struct Snapshot {
    pub settings: Settings,
    pub provider: ProviderClient,
}

impl Snapshot {
    /// Validate `settings` and build a provider client for them.
    pub fn build(settings: Settings) -> Result<Self, PluginError> {
        settings
            .validate()
            .map_err(|e| PluginError::Validation(e.to_string()))?;

        let provider = ProviderClient::new(settings.dashboard_url(), settings.api_key.clone())?;
        Ok(Self { settings, provider })
    }
}

/// Holder for the active snapshot.
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The active snapshot.
    pub async fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.current.read().await)
    }

    /// Replace the active snapshot with one built from `settings`.
    ///
    /// On error the active snapshot is left untouched.
    pub async fn reload(&self, settings: Settings) -> Result<(), PluginError> {
        let snapshot = match Snapshot::build(settings) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(target: "ds.snapshot", error = %e, "Configuration rejected, keeping previous");
                return Err(e);
            }
        };

        *self.current.write().await = Arc::new(snapshot);
        info!(target: "ds.snapshot", "Configuration reloaded");
        Ok(())
    }
}
