//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! This endpoint is unauthenticated so Prometheus can scrape it. Labels are
//! bounded and carry no user IDs, tokens or keys.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns 200 OK with the Prometheus text format:
/// ```text
/// # TYPE ds_meetings_started_total counter
/// ds_meetings_started_total 42
/// ```
#[tracing::instrument(skip_all, name = "ds.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
