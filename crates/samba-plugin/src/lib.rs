//! DigitalSamba Plugin Service Library
//!
//! Mattermost integration for DigitalSamba video meetings:
//!
//! - Start meetings from the webapp, a slash command or a prompt button
//! - Name rooms by per-user scheme (random words, UUID, Mattermost, ask)
//! - Post a joinable meeting message and clean up the room if that fails
//! - Issue per-user moderator tokens for joining
//!
//! # Architecture
//!
//! Handler -> Service -> Repository:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//!                  commands.rs   ->
//! ```
//!
//! # Modules
//!
//! - `commands` - Slash command parsing and execution
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `messages` - User-facing text
//! - `middleware` - Identity and HTTP metrics middleware
//! - `models` - Data models
//! - `naming` - Meeting name generation
//! - `observability` - Metrics
//! - `repositories` - Preference storage
//! - `routes` - Axum router setup
//! - `services` - Provider and host clients, meeting workflow
//! - `snapshot` - Reloadable configuration snapshot

pub mod commands;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod messages;
pub mod middleware;
pub mod models;
pub mod naming;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod snapshot;
