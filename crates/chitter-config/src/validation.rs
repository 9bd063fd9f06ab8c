// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.

use crate::diagnostic::ConfigError;
use crate::model::ChitterConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every problem instead of stopping at the first one.
pub fn validate_config(config: &ChitterConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.relay.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("relay.host must not be empty"));
    } else {
        let is_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_ip && !is_hostname {
            errors.push(ConfigError::validation(format!(
                "relay.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    if config.relay.outbound_queue == 0 {
        errors.push(ConfigError::validation(
            "relay.outbound_queue must be at least 1",
        ));
    }

    if let Some(secret) = &config.relay.auth_secret {
        if secret.is_empty() {
            errors.push(ConfigError::validation(
                "relay.auth_secret must not be empty; omit it to run in open mode",
            ));
        }
    }

    if config.call.ring_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "call.ring_timeout_secs must be greater than 0",
        ));
    }

    if config.call.idle_grace_secs == 0 {
        errors.push(ConfigError::validation(
            "call.idle_grace_secs must be greater than 0",
        ));
    }

    if config.call.idle_grace_secs >= config.call.ring_timeout_secs
        && config.call.ring_timeout_secs > 0
    {
        errors.push(ConfigError::validation(format!(
            "call.idle_grace_secs ({}) must be shorter than call.ring_timeout_secs ({})",
            config.call.idle_grace_secs, config.call.ring_timeout_secs
        )));
    }

    if !(0.0..=1.0).contains(&config.call.volume) {
        errors.push(ConfigError::validation(format!(
            "call.volume must be between 0.0 and 1.0, got {}",
            config.call.volume
        )));
    }

    if config.call.ringtone.trim().is_empty() {
        errors.push(ConfigError::validation("call.ringtone must not be empty"));
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "logging.level `{}` is not one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&ChitterConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = ChitterConfig::default();
        config.relay.host = " ".to_string();
        config.relay.outbound_queue = 0;
        config.call.volume = 1.5;
        config.logging.level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn grace_must_be_shorter_than_ring() {
        let mut config = ChitterConfig::default();
        config.call.ring_timeout_secs = 5;
        config.call.idle_grace_secs = 5;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("idle_grace_secs"));
    }

    #[test]
    fn empty_auth_secret_is_rejected() {
        let mut config = ChitterConfig::default();
        config.relay.auth_secret = Some(String::new());
        assert!(validate_config(&config).is_err());
    }
}
