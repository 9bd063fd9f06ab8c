// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Control frames spoken on a relay WebSocket.
//!
//! Client -> Relay:
//! ```json
//! {"type": "join", "room": "dm-42"}
//! {"type": "leave", "room": "dm-42"}
//! {"type": "signal", "envelope": {"type": "offer", ...}}
//! ```
//!
//! Relay -> Client:
//! ```json
//! {"type": "welcome", "user": "alice", "online": 3}
//! {"type": "online-count", "count": 4}
//! {"type": "signal", "envelope": {...}}
//! {"type": "error", "message": "..."}
//! ```

use chitter_core::{ChitterError, RoomId, UserId};
use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientFrame {
    Join { room: RoomId },
    Leave { room: RoomId },
    Signal { envelope: Envelope },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerFrame {
    Welcome { user: UserId, online: usize },
    OnlineCount { count: usize },
    Signal { envelope: Envelope },
    Error { message: String },
}

impl ClientFrame {
    pub fn from_json(text: &str) -> Result<Self, ChitterError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ChitterError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ServerFrame {
    pub fn from_json(text: &str) -> Result<Self, ChitterError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ChitterError> {
        Ok(serde_json::to_string(self)?)
    }
}
