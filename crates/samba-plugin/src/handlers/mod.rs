//! HTTP request handlers for the DigitalSamba plugin.

pub mod command;
pub mod health;
pub mod meetings;
pub mod metrics;
pub mod preferences;
pub mod token;

pub use command::execute_command;
pub use health::health_check;
pub use meetings::start_meeting;
pub use metrics::metrics_handler;
pub use preferences::{get_preferences, update_preferences};
pub use token::create_token;
