//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `http` - HTTP API for tracking operations
//! - `notify` - Typed ride events and the per-user push channel
//! - `mqtt_push` - MQTT publisher delivering events to per-user topics
//! - `rides` - Ride directory and SOS alerting collaborators

pub mod http;
pub mod mqtt_push;
pub mod notify;
pub mod rides;

// Re-export commonly used types
pub use http::start_http_server;
pub use mqtt_push::MqttPusher;
pub use notify::{create_push_channel, NullNotifier, Notifier, PushEnvelope, PushSender, RideEvent};
pub use rides::{InMemoryRideDirectory, LogSosAlerter, RideDirectory, RideRecord, SosAlerter};
