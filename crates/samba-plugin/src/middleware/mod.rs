//! Middleware for the DigitalSamba plugin.
//!
//! # Components
//!
//! - `http_metrics` - HTTP request metrics for every response
//! - `identity` - Mattermost user identity for protected routes

pub mod http_metrics;
pub mod identity;

pub use http_metrics::http_metrics_middleware;
pub use identity::{require_user, UserId, USER_ID_HEADER};
