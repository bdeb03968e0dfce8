//! Infrastructure - configuration, errors, and broker
//!
//! This module contains infrastructure concerns:
//! - `config` - Application configuration (TOML loading, defaults)
//! - `error` - Error taxonomy for tracking operations
//! - `broker` - Embedded MQTT broker (rumqttd)

pub mod broker;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::Config;
pub use error::{TrackingError, TrackingResult};
