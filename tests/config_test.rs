//! Integration tests for configuration loading

use ridewatch::infra::Config;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[service]
id = "test-instance"

[http]
bind_address = "127.0.0.1"
port = 8090

[broker]
bind_address = "127.0.0.1"
port = 1884

[push]
enabled = false
host = "test-broker"
port = 1884
topic_prefix = "test/users"
buffer = 64

[retention]
terminal_days = 7
sweep_interval_secs = 60

[rides]
seed_file = "fixtures/rides.jsonl"
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.service_id(), "test-instance");
    assert_eq!(config.http_bind_address(), "127.0.0.1");
    assert_eq!(config.http_port(), 8090);
    assert_eq!(config.broker_port(), 1884);
    assert!(!config.push_enabled());
    assert_eq!(config.push_topic_prefix(), "test/users");
    assert_eq!(config.push_buffer(), 64);
    assert_eq!(config.retention_terminal_days(), 7);
    assert_eq!(config.retention_window_ms(), 7 * 24 * 60 * 60 * 1000);
    assert_eq!(config.rides_seed_file(), Some("fixtures/rides.jsonl"));
}

#[test]
fn test_partial_config_uses_defaults() {
    let mut temp_file = NamedTempFile::new().unwrap();

    temp_file
        .write_all(
            br#"
[http]
port = 9000
"#,
        )
        .unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.http_port(), 9000);
    assert_eq!(config.service_id(), "ridewatch");
    assert_eq!(config.broker_port(), 1883);
    assert!(config.push_enabled());
    assert_eq!(config.retention_terminal_days(), 30);
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.http_port(), 8080);
    assert_eq!(config.push_host(), "localhost");
    assert_eq!(config.push_topic_prefix(), "rides/users");
}
