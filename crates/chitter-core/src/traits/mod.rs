// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits consumed by the call driver.
//!
//! Everything outside the signaling core (history persistence, profile
//! lookup, the audio device, and the peer media transport) is reached through
//! these traits so the state machine can be exercised with mocks.

pub mod history;
pub mod media;
pub mod profile;
pub mod transport;

pub use history::HistoryAdapter;
pub use media::MediaAdapter;
pub use profile::ProfileAdapter;
pub use transport::{CandidateSink, PeerTransport};
