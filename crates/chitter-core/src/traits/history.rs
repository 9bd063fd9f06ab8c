// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! History collaborator used to persist call summaries.

use async_trait::async_trait;

use crate::error::ChitterError;
use crate::types::{HistoryMessage, RoomId, UserId};

/// Conversation history backend.
///
/// `append_call_summary` must be idempotent per call: a second request for a
/// summary that has not been superseded by a newer message in the room
/// returns the existing message unchanged.
#[async_trait]
pub trait HistoryAdapter: Send + Sync {
    /// Append a call summary authored by `author` to `room`.
    async fn append_call_summary(
        &self,
        room: &RoomId,
        author: &UserId,
        duration_text: &str,
    ) -> Result<HistoryMessage, ChitterError>;
}
