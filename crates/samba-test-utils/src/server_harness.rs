//! Test server harness for E2E testing
//!
//! Provides `TestPluginServer` for spawning real plugin server instances in
//! tests. Mattermost is replaced by [`MockHost`], preferences live in a
//! [`MemoryStore`] and session signals are kept by a [`RecordingNotifier`];
//! the provider is whatever URL the test passes, normally a wiremock server.

use metrics_exporter_prometheus::PrometheusHandle;
use samba_plugin::commands::CommandProcessor;
use samba_plugin::config::Config;
use samba_plugin::observability::metrics::init_metrics_recorder;
use samba_plugin::repositories::kv::mock::RecordingNotifier;
use samba_plugin::repositories::{MemoryStore, UserPreferenceStore};
use samba_plugin::routes::{self, AppState};
use samba_plugin::services::host::mock::MockHost;
use samba_plugin::services::MeetingOrchestrator;
use samba_plugin::snapshot::{Snapshot, SnapshotStore};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

use crate::fixtures::test_host;

/// Slash-command verification token configured on every test server.
pub const TEST_COMMAND_TOKEN: &str = "test-command-token";

/// Bot user that authors ephemeral prompts.
pub const TEST_BOT_USER_ID: &str = "bot1";

/// Public URL used in action callback URLs.
pub const TEST_PUBLIC_URL: &str = "http://plugin.test";

/// Global metrics handle for test servers
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder().unwrap_or_else(|_| {
                metrics_exporter_prometheus::PrometheusBuilder::new()
                    .build_recorder()
                    .handle()
            })
        })
        .clone()
}

/// Test harness for spawning the plugin server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// let provider = wiremock::MockServer::start().await;
/// let server = TestPluginServer::spawn(&provider.uri()).await?;
/// let response = reqwest::Client::new()
///     .post(format!("{}/api/v1/meetings", server.url()))
///     .header("Mattermost-User-Id", "u1")
///     .json(&serde_json::json!({ "channel_id": "C1" }))
///     .send()
///     .await?;
/// ```
pub struct TestPluginServer {
    addr: SocketAddr,
    config: Config,
    host: Arc<MockHost>,
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    snapshots: Arc<SnapshotStore>,
    _handle: JoinHandle<()>,
}

impl TestPluginServer {
    /// Spawn a server with default settings and the fixture host.
    pub async fn spawn(provider_url: &str) -> Result<Self, anyhow::Error> {
        Self::spawn_with(provider_url, &[], test_host()).await
    }

    /// Spawn a server with extra environment overrides and a custom host.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn_with(
        provider_url: &str,
        overrides: &[(&str, &str)],
        host: MockHost,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("PUBLIC_URL".to_string(), TEST_PUBLIC_URL.to_string()),
            (
                "MM_SERVER_URL".to_string(),
                "http://mattermost.invalid".to_string(),
            ),
            ("MM_BOT_TOKEN".to_string(), "test-bot-token".to_string()),
            ("MM_BOT_USER_ID".to_string(), TEST_BOT_USER_ID.to_string()),
            (
                "MM_COMMAND_TOKEN".to_string(),
                TEST_COMMAND_TOKEN.to_string(),
            ),
            ("DS_API_KEY".to_string(), "test-api-key".to_string()),
            ("DS_DASHBOARD_URL".to_string(), provider_url.to_string()),
        ]);
        for (name, value) in overrides {
            vars.insert((*name).to_string(), (*value).to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let host = Arc::new(host);
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let preferences = UserPreferenceStore::new(store.clone(), notifier.clone());

        let snapshot = Snapshot::build(config.settings.clone())
            .map_err(|e| anyhow::anyhow!("Failed to build snapshot: {}", e))?;
        let snapshots = Arc::new(SnapshotStore::new(snapshot));

        let orchestrator = MeetingOrchestrator::new(
            host.clone(),
            preferences.clone(),
            &config.public_url,
            &config.bot_user_id,
        );
        let commands = CommandProcessor::new(
            host.clone(),
            orchestrator.clone(),
            preferences.clone(),
            &config.command_trigger,
            config.command_token.clone(),
        );

        let state = Arc::new(AppState {
            snapshots: snapshots.clone(),
            orchestrator,
            preferences,
            commands,
        });

        // Build routes using the plugin's real route builder
        let app = routes::build_routes(state, test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            host,
            store,
            notifier,
            snapshots,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The in-memory Mattermost host, for inspecting posts.
    pub fn host(&self) -> &MockHost {
        &self.host
    }

    /// The preference store backing this server.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Session signals sent so far.
    pub fn notifier(&self) -> &RecordingNotifier {
        &self.notifier
    }

    /// The configuration snapshot holder, for reload tests.
    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }
}

impl Drop for TestPluginServer {
    fn drop(&mut self) {
        // Abort the server task so the port is released when the test ends.
        self._handle.abort();
    }
}
