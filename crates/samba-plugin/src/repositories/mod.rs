//! Repository layer for the DigitalSamba plugin.
//!
//! # Components
//!
//! - `kv` - Key-value store and session notifier (Redis, or in-memory with logged signals)
//! - `preferences` - Per-user preference records

pub mod kv;
pub mod preferences;

pub use kv::{KvStore, LogNotifier, MemoryStore, RedisStore, SessionNotifier};
pub use preferences::UserPreferenceStore;
