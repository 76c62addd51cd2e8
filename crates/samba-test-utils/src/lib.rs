//! # DigitalSamba Plugin Test Utilities
//!
//! Shared test utilities for the DigitalSamba plugin.
//!
//! This crate provides:
//! - Server test harness (`TestPluginServer` for E2E tests)
//! - Fixture users, channels and teams for the in-memory Mattermost host
//!
//! ## Usage
//!
//! ```rust,ignore
//! use samba_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let provider = wiremock::MockServer::start().await;
//!     let server = TestPluginServer::spawn(&provider.uri()).await?;
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/health", server.url()))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod server_harness;

// Re-export commonly used items
pub use fixtures::*;
pub use server_harness::*;
