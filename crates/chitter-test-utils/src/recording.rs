// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capturing signal sink and a fixed profile directory.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chitter_call::SignalSink;
use chitter_core::types::Profile;
use chitter_core::{ChitterError, ProfileAdapter, UserId};
use chitter_signal::{Envelope, EnvelopeKind};

/// Keeps every envelope the driver sends. While offline, sends fail like
/// they would on a dropped relay connection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Envelope>>,
    offline: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Envelope> {
        lock(&self.sent).clone()
    }

    pub fn kinds(&self) -> Vec<EnvelopeKind> {
        lock(&self.sent).iter().map(Envelope::kind).collect()
    }

    pub fn count(&self, kind: EnvelopeKind) -> usize {
        lock(&self.sent).iter().filter(|e| e.kind() == kind).count()
    }

    /// Drain captured envelopes.
    pub fn take(&self) -> Vec<Envelope> {
        std::mem::take(&mut *lock(&self.sent))
    }
}

impl SignalSink for RecordingSink {
    fn send(&self, envelope: Envelope) -> Result<(), ChitterError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ChitterError::relay("relay offline"));
        }
        lock(&self.sent).push(envelope);
        Ok(())
    }
}

/// Profiles from a fixed table. Unknown users are an error.
#[derive(Debug, Default)]
pub struct StaticProfiles {
    profiles: HashMap<UserId, Profile>,
}

impl StaticProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, user: &str, display_name: &str) -> Self {
        self.profiles.insert(
            user.into(),
            Profile {
                display_name: display_name.to_string(),
                avatar_url: format!("https://avatars.invalid/{user}.png"),
            },
        );
        self
    }
}

#[async_trait]
impl ProfileAdapter for StaticProfiles {
    async fn resolve_profile(&self, user: &UserId) -> Result<Profile, ChitterError> {
        self.profiles
            .get(user)
            .cloned()
            .ok_or_else(|| ChitterError::Internal(format!("no profile for {user}")))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
