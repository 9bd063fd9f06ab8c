// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signaling protocol for Chitter voice calls.
//!
//! - [`envelope`]: the six signal kinds carried through the relay
//! - [`frame`]: relay WebSocket control frames wrapping envelopes
//! - [`roster`]: participant roster with monotonic reconciliation

pub mod envelope;
pub mod frame;
pub mod roster;

pub use envelope::{
    Answer, CallStateUpdate, Decline, Ended, Envelope, EnvelopeKind, IceCandidate, Offer,
};
pub use frame::{ClientFrame, ServerFrame};
pub use roster::{Participant, ParticipantStatus, Roster, merge};
