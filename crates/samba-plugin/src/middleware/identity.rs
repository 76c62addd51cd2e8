//! Caller identity for protected routes.
//!
//! Mattermost forwards plugin requests with the authenticated user's ID in
//! the `Mattermost-User-Id` header. Requests without it are rejected before
//! any handler runs, and handlers read the ID from request extensions.

use crate::errors::PluginError;
use axum::{extract::Request, middleware::Next, response::Response};
use tracing::instrument;

/// Header carrying the authenticated Mattermost user ID.
pub const USER_ID_HEADER: &str = "Mattermost-User-Id";

/// Authenticated caller, inserted by [`require_user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

/// Reject requests without a non-empty `Mattermost-User-Id` header.
#[instrument(skip_all, name = "ds.middleware.identity")]
pub async fn require_user(mut req: Request, next: Next) -> Result<Response, PluginError> {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            tracing::debug!(target: "ds.middleware.identity", "Missing user identity header");
            PluginError::Unauthorized
        })?
        .to_string();

    req.extensions_mut().insert(UserId(user_id));

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn whoami(Extension(UserId(id)): Extension<UserId>) -> String {
        id
    }

    fn test_app() -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .route_layer(middleware::from_fn(require_user))
    }

    #[tokio::test]
    async fn test_header_becomes_extension() {
        let request = HttpRequest::builder()
            .uri("/whoami")
            .header(USER_ID_HEADER, "u1")
            .body(Body::empty())
            .unwrap();

        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"u1");
    }

    #[tokio::test]
    async fn test_missing_or_blank_header_is_unauthorized() {
        for header in [None, Some(""), Some("   ")] {
            let mut builder = HttpRequest::builder().uri("/whoami");
            if let Some(value) = header {
                builder = builder.header(USER_ID_HEADER, value);
            }
            let response = test_app()
                .oneshot(builder.body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
