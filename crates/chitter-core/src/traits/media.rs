// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local audio device boundary.

use async_trait::async_trait;

use crate::error::MediaFailure;
use crate::types::MediaHandle;

/// Microphone access.
#[async_trait]
pub trait MediaAdapter: Send + Sync {
    /// Acquire local audio. May be slow (permission prompts) and may fail.
    async fn acquire_audio(&self) -> Result<MediaHandle, MediaFailure>;

    /// Release a previously acquired handle. Must not block.
    fn release(&self, handle: MediaHandle);
}
