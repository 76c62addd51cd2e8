//! Service layer for the DigitalSamba plugin.
//!
//! # Components
//!
//! - `host` - Mattermost REST client and its in-memory mock
//! - `orchestrator` - Meeting start workflow (prompt or provision)
//! - `provider_client` - HTTP client for the DigitalSamba REST API
//! - `saga` - Compensating-action runner used by provisioning

pub mod host;
pub mod orchestrator;
pub mod provider_client;
pub mod saga;

pub use host::{HostApi, MattermostClient};
pub use orchestrator::{MeetingChoice, MeetingOrchestrator, StartOutcome, StartRequest};
pub use provider_client::ProviderClient;
