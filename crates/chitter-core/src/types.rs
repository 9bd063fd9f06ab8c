// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the relay, the signaling protocol, and the call driver.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Milliseconds since the Unix epoch. All wire timestamps use this unit.
pub type Timestamp = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// An authenticated user identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the identity carries no characters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId(s.to_string())
    }
}

/// A conversation key. One DM conversation maps to exactly one room.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        RoomId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        RoomId(s.to_string())
    }
}

/// Lifecycle state of a call as seen by one client.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CallState {
    #[default]
    Idle,
    Calling,
    InCall,
}

/// Opaque handle to acquired local audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaHandle(pub u64);

/// Presentation data for a user. Never consulted for protocol decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub display_name: String,
    pub avatar_url: String,
}

impl Profile {
    /// Fallback profile used when the lookup has nothing for a user.
    pub fn placeholder(user: &UserId) -> Self {
        Profile {
            display_name: user.to_string(),
            avatar_url: String::new(),
        }
    }
}

/// A message as stored by the history collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMessage {
    pub id: String,
    pub room: RoomId,
    pub user: UserId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_type: Option<String>,
    pub timestamp: Timestamp,
}

/// System type tag attached to call summary messages.
pub const CALL_SUMMARY_TYPE: &str = "call-summary";

/// User-facing call preferences. Advisory only.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSettings {
    /// When false, outgoing calls are refused and incoming offers are ignored.
    pub calls_enabled: bool,
    /// Play the ringtone for incoming calls.
    pub ring_sound: bool,
    /// Ringtone key.
    pub ringtone: String,
    /// Playback volume, 0.0 to 1.0.
    pub volume: f32,
}

impl Default for CallSettings {
    fn default() -> Self {
        Self {
            calls_enabled: true,
            ring_sound: true,
            ringtone: "classic".to_string(),
            volume: 0.6,
        }
    }
}

/// Render a call duration the way summaries show it: `42s` or `3m 07s`.
pub fn format_call_duration(total_secs: u64) -> String {
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    if mins > 0 {
        format!("{mins}m {secs:02}s")
    } else {
        format!("{secs}s")
    }
}

/// Render elapsed call time for the live call dock: `m:ss`.
pub fn format_elapsed(total_secs: u64) -> String {
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}
