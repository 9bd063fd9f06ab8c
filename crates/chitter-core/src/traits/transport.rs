// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Peer media transport boundary.
//!
//! The signaling layer never interprets session descriptions or ICE
//! candidates; it moves them between this trait and the relay as opaque JSON.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ChitterError;
use crate::types::MediaHandle;

/// Callback invoked for every local ICE candidate the transport gathers.
pub type CandidateSink = Box<dyn Fn(Value) + Send + Sync>;

/// Offer/answer/candidate negotiation for one call at a time.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Build a peer connection carrying the given local audio.
    async fn open(&self, media: MediaHandle, candidates: CandidateSink) -> Result<(), ChitterError>;

    /// Create the local offer (caller side).
    async fn create_offer(&self) -> Result<Value, ChitterError>;

    /// Apply the remote offer and create the local answer (callee side).
    async fn create_answer(&self, remote_offer: Value) -> Result<Value, ChitterError>;

    /// Apply the remote answer (caller side).
    async fn apply_answer(&self, remote_answer: Value) -> Result<(), ChitterError>;

    /// Feed a remote ICE candidate into the negotiation.
    async fn add_candidate(&self, candidate: Value) -> Result<(), ChitterError>;

    /// Tear the peer connection down. Must not block.
    fn close(&self);
}
