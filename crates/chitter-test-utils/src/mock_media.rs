// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock audio source with failure injection and handle accounting.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chitter_core::{MediaAdapter, MediaFailure, MediaHandle};

/// Hands out sequential [`MediaHandle`]s and records every acquire and
/// release, so tests can assert nothing leaked.
#[derive(Debug, Default)]
pub struct MockMedia {
    next: AtomicU64,
    failure: Mutex<Option<MediaFailure>>,
    delay: Mutex<Option<Duration>>,
    acquired: Mutex<Vec<MediaHandle>>,
    released: Mutex<Vec<MediaHandle>>,
}

impl MockMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every acquisition fails with `failure`.
    pub fn failing(failure: MediaFailure) -> Self {
        let media = Self::new();
        media.fail_with(Some(failure));
        media
    }

    /// Acquisitions take `delay` before resolving.
    pub fn with_delay(delay: Duration) -> Self {
        let media = Self::new();
        *lock(&media.delay) = Some(delay);
        media
    }

    pub fn fail_with(&self, failure: Option<MediaFailure>) {
        *lock(&self.failure) = failure;
    }

    pub fn acquired(&self) -> Vec<MediaHandle> {
        lock(&self.acquired).clone()
    }

    pub fn released(&self) -> Vec<MediaHandle> {
        lock(&self.released).clone()
    }

    /// Handles acquired and not yet released.
    pub fn outstanding(&self) -> Vec<MediaHandle> {
        let released = self.released();
        self.acquired()
            .into_iter()
            .filter(|h| !released.contains(h))
            .collect()
    }
}

#[async_trait]
impl MediaAdapter for MockMedia {
    async fn acquire_audio(&self) -> Result<MediaHandle, MediaFailure> {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = lock(&self.failure).clone() {
            return Err(failure);
        }
        let handle = MediaHandle(self.next.fetch_add(1, Ordering::SeqCst) + 1);
        lock(&self.acquired).push(handle);
        Ok(handle)
    }

    fn release(&self, handle: MediaHandle) {
        lock(&self.released).push(handle);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracks_outstanding_handles() {
        let media = MockMedia::new();
        let a = media.acquire_audio().await.unwrap();
        let b = media.acquire_audio().await.unwrap();
        assert_ne!(a, b);
        media.release(a);
        assert_eq!(media.outstanding(), vec![b]);
    }

    #[tokio::test]
    async fn injected_failure() {
        let media = MockMedia::failing(MediaFailure::PermissionDenied);
        assert_eq!(media.acquire_audio().await, Err(MediaFailure::PermissionDenied));
        media.fail_with(None);
        assert!(media.acquire_audio().await.is_ok());
    }
}
