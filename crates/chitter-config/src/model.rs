// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model.
//!
//! Every struct rejects unknown keys so a typo fails loudly at startup
//! instead of silently falling back to a default.

use std::time::Duration;

use chitter_core::CallSettings;
use serde::{Deserialize, Serialize};

/// Top-level configuration. All sections are optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChitterConfig {
    /// Relay server settings.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Call client timings and preferences.
    #[serde(default)]
    pub call: CallConfig,

    /// Prometheus metrics.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Relay (WebSocket fan-out) settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared secret for connection tokens. `None` runs the relay in open
    /// mode, accepting any claimed identity.
    #[serde(default)]
    pub auth_secret: Option<String>,

    /// Per-connection outbound queue depth. Frames beyond it are dropped.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            auth_secret: None,
            outbound_queue: default_outbound_queue(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3030
}

fn default_outbound_queue() -> usize {
    64
}

/// Call client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CallConfig {
    /// Seconds an unanswered call keeps ringing.
    #[serde(default = "default_ring_timeout_secs")]
    pub ring_timeout_secs: u64,

    /// Seconds a remote "idle" report waits before it tears the call down.
    #[serde(default = "default_idle_grace_secs")]
    pub idle_grace_secs: u64,

    /// Allow placing and receiving calls.
    #[serde(default = "default_true")]
    pub calls_enabled: bool,

    /// Play a ringtone for incoming calls.
    #[serde(default = "default_true")]
    pub ring_sound: bool,

    /// Ringtone key.
    #[serde(default = "default_ringtone")]
    pub ringtone: String,

    /// Playback volume between 0.0 and 1.0.
    #[serde(default = "default_volume")]
    pub volume: f32,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ring_timeout_secs: default_ring_timeout_secs(),
            idle_grace_secs: default_idle_grace_secs(),
            calls_enabled: true,
            ring_sound: true,
            ringtone: default_ringtone(),
            volume: default_volume(),
        }
    }
}

impl CallConfig {
    pub fn ring_timeout(&self) -> Duration {
        Duration::from_secs(self.ring_timeout_secs)
    }

    pub fn idle_grace(&self) -> Duration {
        Duration::from_secs(self.idle_grace_secs)
    }

    /// The user-preference part of this section.
    pub fn settings(&self) -> CallSettings {
        CallSettings {
            calls_enabled: self.calls_enabled,
            ring_sound: self.ring_sound,
            ringtone: self.ringtone.clone(),
            volume: self.volume,
        }
    }
}

fn default_ring_timeout_secs() -> u64 {
    60
}

fn default_idle_grace_secs() -> u64 {
    2
}

fn default_true() -> bool {
    true
}

fn default_ringtone() -> String {
    "classic".to_string()
}

fn default_volume() -> f32 {
    0.6
}

/// Metrics exporter settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Serve Prometheus text on `/metrics`.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Level for chitter crates (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
