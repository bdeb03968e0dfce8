//! Configuration loading from TOML files
//!
//! Config file is selected via the --config command line argument,
//! defaulting to config/dev.toml. A missing or malformed file falls back
//! to built-in defaults with a warning.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Instance identifier, used in MQTT client ids and log fields
    #[serde(default = "default_service_id")]
    pub id: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { id: default_service_id() }
    }
}

fn default_service_id() -> String {
    "ridewatch".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { bind_address: default_http_bind_address(), port: default_http_port() }
    }
}

fn default_http_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_broker_port")]
    pub port: u16,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self { bind_address: default_broker_bind_address(), port: default_broker_port() }
    }
}

fn default_broker_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Enable real-time push publishing
    #[serde(default = "default_push_enabled")]
    pub enabled: bool,
    /// Broker host the publisher connects to (normally the embedded broker)
    #[serde(default = "default_push_host")]
    pub host: String,
    #[serde(default = "default_broker_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Per-user channel topic prefix; events go to {prefix}/{user_id}
    #[serde(default = "default_push_topic_prefix")]
    pub topic_prefix: String,
    /// Bounded push queue size; full queue drops events (fire-and-forget)
    #[serde(default = "default_push_buffer")]
    pub buffer: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: default_push_enabled(),
            host: default_push_host(),
            port: default_broker_port(),
            username: None,
            password: None,
            topic_prefix: default_push_topic_prefix(),
            buffer: default_push_buffer(),
        }
    }
}

fn default_push_enabled() -> bool {
    true
}

fn default_push_host() -> String {
    "localhost".to_string()
}

fn default_push_topic_prefix() -> String {
    "rides/users".to_string()
}

fn default_push_buffer() -> usize {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    /// Days a terminal session is kept before the sweep removes it
    #[serde(default = "default_retention_days")]
    pub terminal_days: u32,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            terminal_days: default_retention_days(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_retention_days() -> u32 {
    30
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RidesConfig {
    /// Optional JSONL file of ride records to seed the in-memory directory
    #[serde(default)]
    pub seed_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub rides: RidesConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    service_id: String,
    http_bind_address: String,
    http_port: u16,
    broker_bind_address: String,
    broker_port: u16,
    push_enabled: bool,
    push_host: String,
    push_port: u16,
    push_username: Option<String>,
    push_password: Option<String>,
    push_topic_prefix: String,
    push_buffer: usize,
    retention_terminal_days: u32,
    retention_sweep_interval_secs: u64,
    rides_seed_file: Option<String>,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml: TomlConfig, source: &str) -> Self {
        Self {
            service_id: toml.service.id,
            http_bind_address: toml.http.bind_address,
            http_port: toml.http.port,
            broker_bind_address: toml.broker.bind_address,
            broker_port: toml.broker.port,
            push_enabled: toml.push.enabled,
            push_host: toml.push.host,
            push_port: toml.push.port,
            push_username: toml.push.username,
            push_password: toml.push.password,
            push_topic_prefix: toml.push.topic_prefix,
            push_buffer: toml.push.buffer,
            retention_terminal_days: toml.retention.terminal_days,
            retention_sweep_interval_secs: toml.retention.sweep_interval_secs,
            rides_seed_file: toml.rides.seed_file,
            config_file: source.to_string(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration - tries the TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    // Getters for all config fields
    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn http_bind_address(&self) -> &str {
        &self.http_bind_address
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn broker_bind_address(&self) -> &str {
        &self.broker_bind_address
    }

    pub fn broker_port(&self) -> u16 {
        self.broker_port
    }

    pub fn push_enabled(&self) -> bool {
        self.push_enabled
    }

    pub fn push_host(&self) -> &str {
        &self.push_host
    }

    pub fn push_port(&self) -> u16 {
        self.push_port
    }

    pub fn push_username(&self) -> Option<&str> {
        self.push_username.as_deref()
    }

    pub fn push_password(&self) -> Option<&str> {
        self.push_password.as_deref()
    }

    pub fn push_topic_prefix(&self) -> &str {
        &self.push_topic_prefix
    }

    pub fn push_buffer(&self) -> usize {
        self.push_buffer
    }

    pub fn retention_terminal_days(&self) -> u32 {
        self.retention_terminal_days
    }

    /// Terminal retention window in milliseconds
    pub fn retention_window_ms(&self) -> u64 {
        u64::from(self.retention_terminal_days) * 24 * 60 * 60 * 1000
    }

    pub fn retention_sweep_interval_secs(&self) -> u64 {
        self.retention_sweep_interval_secs
    }

    pub fn rides_seed_file(&self) -> Option<&str> {
        self.rides_seed_file.as_deref()
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_id(), "ridewatch");
        assert_eq!(config.http_port(), 8080);
        assert_eq!(config.broker_port(), 1883);
        assert!(config.push_enabled());
        assert_eq!(config.push_topic_prefix(), "rides/users");
        assert_eq!(config.retention_terminal_days(), 30);
    }

    #[test]
    fn test_retention_window_ms() {
        let config = Config::default();
        assert_eq!(config.retention_window_ms(), 30 * 24 * 60 * 60 * 1000);
    }

    #[test]
    fn test_load_from_path_fallback() {
        let config = Config::load_from_path("/nonexistent/path.toml");
        assert_eq!(config.config_file(), "default");
        assert_eq!(config.http_port(), 8080);
    }
}
