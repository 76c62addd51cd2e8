//! Metrics definitions for the DigitalSamba plugin.
//!
//! All metrics follow Prometheus naming conventions:
//! - `ds_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: ~8 values (known paths, everything else is `/other`)
//! - `status`: 3 values (success, error, timeout)
//! - `operation`: create_room, delete_room, create_token
//! - `step`: create_room, create_token, create_post, prompt
//! - `command`: help, settings, start_meeting
//!
//! The meeting and command counters double as the plugin's event tracking.
//! Recording never fails and never blocks a request.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("ds_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Provider calls have a 30s client timeout
        .set_buckets_for_metric(
            Matcher::Prefix("ds_provider_request".to_string()),
            &[
                0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000,
            ],
        )
        .map_err(|e| format!("Failed to set provider request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `ds_http_requests_total`, `ds_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// This captures all HTTP responses, including framework-level 404/405/415.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("ds_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("ds_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto a fixed set of labels.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/api/v1/meetings" => "/api/v1/meetings",
        "/api/v1/token" => "/api/v1/token",
        "/api/v1/config" => "/api/v1/config",
        "/api/v1/user-config" => "/api/v1/user-config",
        "/api/v1/command" => "/api/v1/command",
        _ => "/other",
    }
}

// ============================================================================
// Provider Metrics
// ============================================================================

/// Record a DigitalSamba API call
///
/// Metric: `ds_provider_requests_total`, `ds_provider_request_duration_seconds`
/// Labels: `operation`, `status`
///
/// `status` is `success`, `error` (provider answered >= 400) or `transport`.
pub fn record_provider_request(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("ds_provider_request_duration_seconds",
        "operation" => operation,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("ds_provider_requests_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

// ============================================================================
// Meeting Metrics
// ============================================================================

/// Metric: `ds_meetings_started_total`
///
/// Also the `start_meeting` tracking event.
pub fn record_meeting_started() {
    counter!("ds_meetings_started_total").increment(1);
}

/// Metric: `ds_meeting_failures_total`
/// Labels: `step`
pub fn record_meeting_failure(step: &'static str) {
    counter!("ds_meeting_failures_total", "step" => step).increment(1);
}

/// Metric: `ds_compensations_total`
/// Labels: `status` (success, error)
pub fn record_compensation(status: &'static str) {
    counter!("ds_compensations_total", "status" => status).increment(1);
}

// ============================================================================
// Command Metrics
// ============================================================================

/// Metric: `ds_commands_total`
/// Labels: `command` (help, settings, start_meeting)
pub fn record_command(command: &'static str) {
    counter!("ds_commands_total", "command" => command).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // The metrics crate records to a no-op recorder when none is installed,
    // so these only exercise the recording paths.

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/health", 200, Duration::from_millis(5));
        record_http_request("POST", "/api/v1/meetings", 200, Duration::from_millis(900));
        record_http_request("POST", "/api/v1/meetings", 500, Duration::from_secs(2));
        record_http_request("GET", "/nope", 404, Duration::from_millis(1));
        record_http_request("POST", "/api/v1/token", 504, Duration::from_secs(30));
    }

    #[test]
    fn test_record_other_metrics() {
        record_provider_request("create_room", "success", Duration::from_millis(300));
        record_provider_request("create_token", "error", Duration::from_millis(80));
        record_provider_request("delete_room", "transport", Duration::from_secs(30));
        record_meeting_started();
        record_meeting_failure("create_token");
        record_compensation("success");
        record_compensation("error");
        record_command("help");
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(202), "success");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
        assert_eq!(categorize_status_code(400), "error");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(500), "error");
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/api/v1/meetings"), "/api/v1/meetings");
        assert_eq!(normalize_endpoint("/api/v1/user-config"), "/api/v1/user-config");
        assert_eq!(normalize_endpoint("/api/v1/meetings/abc"), "/other");
        assert_eq!(normalize_endpoint("/"), "/other");
    }
}
