// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration loading and validation.

use std::io::Write;

use chitter_config::diagnostic::ConfigError;
use chitter_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

#[test]
fn full_config_deserializes() {
    let toml = r#"
[relay]
host = "0.0.0.0"
port = 8080
auth_secret = "hunter2"
outbound_queue = 16

[call]
ring_timeout_secs = 45
idle_grace_secs = 3
calls_enabled = false
ring_sound = false
ringtone = "chime"
volume = 0.25

[metrics]
enabled = false

[logging]
level = "debug"
"#;
    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.relay.host, "0.0.0.0");
    assert_eq!(config.relay.port, 8080);
    assert_eq!(config.relay.auth_secret.as_deref(), Some("hunter2"));
    assert_eq!(config.relay.outbound_queue, 16);
    assert_eq!(config.call.ring_timeout().as_secs(), 45);
    assert_eq!(config.call.idle_grace().as_secs(), 3);
    let settings = config.call.settings();
    assert!(!settings.calls_enabled);
    assert!(!settings.ring_sound);
    assert_eq!(settings.ringtone, "chime");
    assert_eq!(settings.volume, 0.25);
    assert!(!config.metrics.enabled);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn empty_input_yields_defaults() {
    let config = load_and_validate_str("").expect("defaults are valid");
    assert_eq!(config.relay.host, "127.0.0.1");
    assert_eq!(config.relay.port, 3030);
    assert!(config.relay.auth_secret.is_none());
    assert_eq!(config.call.ring_timeout_secs, 60);
    assert_eq!(config.call.idle_grace_secs, 2);
    assert_eq!(config.call.settings(), chitter_core::CallSettings::default());
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = "[call]\nring_timout_secs = 10\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            valid_keys,
            ..
        } => {
            assert_eq!(key, "ring_timout_secs");
            assert_eq!(suggestion.as_deref(), Some("ring_timeout_secs"));
            assert!(valid_keys.contains("idle_grace_secs"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[video]\nenabled = true\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[relay]\nport = \"eighty\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn validation_errors_surface_through_loader() {
    let errors = load_and_validate_str("[call]\nvolume = 2.0\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}

#[test]
fn explicit_path_is_loaded() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[relay]\nport = 5050").unwrap();
    let config = load_and_validate_path(file.path()).unwrap();
    assert_eq!(config.relay.port, 5050);
}

#[test]
fn missing_path_is_an_error() {
    let errors =
        load_and_validate_path(std::path::Path::new("/nonexistent/chitter.toml")).unwrap_err();
    assert!(matches!(errors[0], ConfigError::Other(_)));
}
