//! Liveness check.

use crate::models::HealthResponse;
use axum::Json;
use tracing::instrument;

/// Handler for GET /health
///
/// Always `{"status": "healthy"}` while the process serves requests. The
/// Mattermost server and the provider are not contacted.
#[instrument(skip_all, name = "ds.health.check")]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let Json(response) = health_check().await;
        assert_eq!(response.status, "healthy");
    }
}
