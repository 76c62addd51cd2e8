//! Observability for the DigitalSamba plugin.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
