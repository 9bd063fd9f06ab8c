// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by every Chitter crate.

use thiserror::Error;

/// The primary error type used across the relay, the call driver, and the
/// collaborator traits.
#[derive(Debug, Error)]
pub enum ChitterError {
    /// Configuration errors (invalid TOML, bad values, unknown keys).
    #[error("configuration error: {0}")]
    Config(String),

    /// A frame or envelope could not be parsed or is structurally invalid.
    #[error("protocol error: {message}")]
    Protocol {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Local audio capture could not be acquired.
    #[error("media error: {0}")]
    Media(#[from] MediaFailure),

    /// The peer transport (offer/answer/candidate negotiation) failed.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The relay is unreachable or the connection to it closed.
    #[error("relay error: {message}")]
    Relay {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The history collaborator rejected a call summary.
    #[error("history error: {message}")]
    History { message: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChitterError {
    /// Shorthand for a protocol error without an underlying source.
    pub fn protocol(message: impl Into<String>) -> Self {
        ChitterError::Protocol {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a relay error without an underlying source.
    pub fn relay(message: impl Into<String>) -> Self {
        ChitterError::Relay {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        ChitterError::Transport {
            message: message.into(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for ChitterError {
    fn from(e: serde_json::Error) -> Self {
        ChitterError::Protocol {
            message: format!("invalid json: {e}"),
            source: Some(Box::new(e)),
        }
    }
}

/// Reasons local audio acquisition can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaFailure {
    /// The user (or the platform) refused microphone access.
    #[error("microphone permission denied")]
    PermissionDenied,

    /// No usable input device.
    #[error("audio device unavailable")]
    DeviceUnavailable,

    /// Anything else the device layer reports.
    #[error("{0}")]
    Other(String),
}
