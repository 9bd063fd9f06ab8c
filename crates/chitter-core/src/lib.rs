// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Chitter call signaling.
//!
//! Identifiers, the shared error type, and the collaborator traits that the
//! relay and the call driver are written against.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ChitterError, MediaFailure};
pub use types::{CallSettings, CallState, MediaHandle, RoomId, Timestamp, UserId, now_millis};

pub use traits::{CandidateSink, HistoryAdapter, MediaAdapter, PeerTransport, ProfileAdapter};
