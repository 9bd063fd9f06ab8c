// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity/profile lookup, used for presentation only.

use async_trait::async_trait;

use crate::error::ChitterError;
use crate::types::{Profile, UserId};

#[async_trait]
pub trait ProfileAdapter: Send + Sync {
    /// Resolve display data for a user.
    async fn resolve_profile(&self, user: &UserId) -> Result<Profile, ChitterError>;
}
