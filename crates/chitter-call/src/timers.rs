// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ring fallback and idle grace timers.
//!
//! Each timer kind has one slot holding a sleeping task and a generation
//! number. Arming or cancelling bumps the generation, so a firing that was
//! already queued when the timer was re-armed or cancelled is recognized as
//! stale by [`Supervisor::accept`] and dropped.

use std::time::Duration;

use strum::Display;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum TimerKind {
    /// Gives up on a call nobody answered.
    RingFallback,
    /// Tears down a call after a peer reported idle and nothing contradicted it.
    IdleGrace,
}

/// Timer durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub ring_timeout: Duration,
    pub idle_grace: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            ring_timeout: Duration::from_secs(60),
            idle_grace: Duration::from_secs(2),
        }
    }
}

/// A timer elapsed. Only meaningful if [`Supervisor::accept`] says so.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFiring {
    pub kind: TimerKind,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl Slot {
    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.generation += 1;
    }
}

/// Owns the call timers of one driver.
#[derive(Debug)]
pub struct Supervisor {
    timings: Timings,
    firings: mpsc::UnboundedSender<TimerFiring>,
    ring: Slot,
    grace: Slot,
}

impl Supervisor {
    pub fn new(timings: Timings, firings: mpsc::UnboundedSender<TimerFiring>) -> Self {
        Self {
            timings,
            firings,
            ring: Slot::default(),
            grace: Slot::default(),
        }
    }

    pub fn timings(&self) -> Timings {
        self.timings
    }

    /// Start (or restart) a timer. Must be called inside a tokio runtime.
    pub fn arm(&mut self, kind: TimerKind) -> u64 {
        let after = match kind {
            TimerKind::RingFallback => self.timings.ring_timeout,
            TimerKind::IdleGrace => self.timings.idle_grace,
        };
        let firings = self.firings.clone();
        let slot = self.slot_mut(kind);
        slot.stop();
        let generation = slot.generation;
        slot.task = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = firings.send(TimerFiring { kind, generation });
        }));
        trace!(timer = %kind, generation, ?after, "timer armed");
        generation
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        let slot = self.slot_mut(kind);
        if slot.task.is_some() {
            trace!(timer = %kind, "timer cancelled");
        }
        slot.stop();
    }

    pub fn cancel_all(&mut self) {
        self.ring.stop();
        self.grace.stop();
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        let slot = match kind {
            TimerKind::RingFallback => &self.ring,
            TimerKind::IdleGrace => &self.grace,
        };
        slot.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Whether a firing belongs to the currently armed timer. A current
    /// firing disarms the slot, so each arm is accepted at most once.
    pub fn accept(&mut self, firing: TimerFiring) -> bool {
        let slot = self.slot_mut(firing.kind);
        if slot.generation != firing.generation || slot.task.is_none() {
            trace!(timer = %firing.kind, generation = firing.generation, "stale timer firing");
            return false;
        }
        slot.task = None;
        true
    }

    fn slot_mut(&mut self, kind: TimerKind) -> &mut Slot {
        match kind {
            TimerKind::RingFallback => &mut self.ring,
            TimerKind::IdleGrace => &mut self.grace,
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
