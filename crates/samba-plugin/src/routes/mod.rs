//! HTTP routes for the DigitalSamba plugin.
//!
//! Defines the Axum router and application state.

use crate::commands::CommandProcessor;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_user};
use crate::repositories::UserPreferenceStore;
use crate::services::MeetingOrchestrator;
use crate::snapshot::SnapshotStore;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Active configuration snapshot, swapped on reload.
    pub snapshots: Arc<SnapshotStore>,

    pub orchestrator: MeetingOrchestrator,

    pub preferences: UserPreferenceStore,

    pub commands: CommandProcessor,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness check - public, unversioned
/// - `/metrics` - Prometheus metrics endpoint - public, unversioned
/// - `/api/v1/command` - Slash command webhook (verified by token, not header)
/// - `/api/v1/meetings` - Start a meeting - requires `Mattermost-User-Id`
/// - `/api/v1/token` - Moderator token for the caller - requires `Mattermost-User-Id`
/// - `/api/v1/config`, `/api/v1/user-config` - Caller's preferences - requires `Mattermost-User-Id`
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout, except on the two routes that start meetings
///
/// Meeting starts are bounded by the provider and host client timeouts
/// instead. A router timeout there would only abandon the response while the
/// provisioning task finishes or rolls back on its own.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    // Public routes (no identity header required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state.clone());

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes (Mattermost-User-Id required)
    let protected_routes = Router::new()
        .route("/api/v1/token", post(handlers::create_token))
        .route(
            "/api/v1/config",
            get(handlers::get_preferences).post(handlers::update_preferences),
        )
        .route(
            "/api/v1/user-config",
            get(handlers::get_preferences).post(handlers::update_preferences),
        )
        .route_layer(middleware::from_fn(require_user))
        .with_state(state.clone());

    // Meeting workflow routes, merged after the timeout layer so it skips them
    let workflow_routes = Router::new()
        .route(
            "/api/v1/meetings",
            post(handlers::start_meeting).route_layer(middleware::from_fn(require_user)),
        )
        .route("/api/v1/command", post(handlers::execute_command))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost, not on workflow routes)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .merge(workflow_routes)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}
