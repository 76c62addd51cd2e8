//! DigitalSamba Plugin
//!
//! Standalone service that Mattermost talks to for DigitalSamba meetings.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment (fails fast when invalid)
//! 2. Initialize Prometheus metrics recorder
//! 3. Connect the preference store (Redis, or memory without `REDIS_URL`)
//! 4. Build the Mattermost client and the configuration snapshot
//! 5. Spawn the SIGHUP configuration reload task
//! 6. Serve HTTP until SIGINT/SIGTERM, then drain

use samba_plugin::commands::CommandProcessor;
use samba_plugin::config::{Config, Settings};
use samba_plugin::observability::metrics::init_metrics_recorder;
use samba_plugin::repositories::{
    KvStore, LogNotifier, MemoryStore, RedisStore, SessionNotifier, UserPreferenceStore,
};
use samba_plugin::routes::{self, AppState};
use samba_plugin::services::{HostApi, MattermostClient, MeetingOrchestrator};
use samba_plugin::snapshot::{Snapshot, SnapshotStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "samba_plugin=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting DigitalSamba plugin");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        public_url = %config.public_url,
        mattermost_url = %config.mattermost_url,
        naming_scheme = %config.settings.naming_scheme,
        room_expiry_minutes = config.settings.room_expiry_minutes,
        max_participants = config.settings.max_participants,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let (kv, notifier): (Arc<dyn KvStore>, Arc<dyn SessionNotifier>) = match &config.redis_url {
        Some(redis_url) => {
            info!("Connecting to Redis...");
            let store = Arc::new(RedisStore::connect(redis_url).await?);
            info!("Redis connection established");
            let kv: Arc<dyn KvStore> = store.clone();
            let notifier: Arc<dyn SessionNotifier> = store;
            (kv, notifier)
        }
        None => {
            warn!("REDIS_URL not set, user preferences are kept in memory and lost on restart");
            let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
            let notifier: Arc<dyn SessionNotifier> = Arc::new(LogNotifier);
            (kv, notifier)
        }
    };
    let preferences = UserPreferenceStore::new(kv, notifier);

    let host: Arc<dyn HostApi> = Arc::new(MattermostClient::new(
        &config.mattermost_url,
        config.bot_token.clone(),
    )?);

    let snapshots = Arc::new(SnapshotStore::new(Snapshot::build(config.settings.clone())?));

    let orchestrator = MeetingOrchestrator::new(
        host.clone(),
        preferences.clone(),
        &config.public_url,
        &config.bot_user_id,
    );
    let commands = CommandProcessor::new(
        host,
        orchestrator.clone(),
        preferences.clone(),
        &config.command_trigger,
        config.command_token.clone(),
    );

    let reload_handle = tokio::spawn(reload_on_hangup(snapshots.clone()));

    let state = Arc::new(AppState {
        snapshots,
        orchestrator,
        preferences,
        commands,
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("DigitalSamba plugin listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.drain_seconds))
        .await?;

    reload_handle.abort();
    info!("DigitalSamba plugin shutdown complete");

    Ok(())
}

/// Re-read `DS_*` settings on SIGHUP.
///
/// An invalid configuration is logged and the previous snapshot stays active.
async fn reload_on_hangup(snapshots: Arc<SnapshotStore>) {
    #[cfg(unix)]
    {
        let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to listen for SIGHUP, configuration reload disabled: {}", e);
                return;
            }
        };

        while hangup.recv().await.is_some() {
            info!("Received SIGHUP, reloading configuration...");
            match Settings::from_env() {
                // reload() logs its own outcome
                Ok(settings) => {
                    let _ = snapshots.reload(settings).await;
                }
                Err(e) => error!("Configuration rejected, keeping previous: {}", e),
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = snapshots;
        std::future::pending::<()>().await;
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal(drain_secs: u64) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (DRAIN_SECONDS=0)");
    }
}
