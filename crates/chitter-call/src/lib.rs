// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client side of Chitter voice calls.
//!
//! - [`session`]: the synchronous, effect-returning call state machine
//! - [`timers`]: ring fallback and idle grace timers with stale-fire detection
//! - [`driver`]: the event loop that runs the machine against real collaborators
//! - [`relay_client`]: WebSocket connection to the relay
//! - [`history`]: in-memory history with call summaries
//! - [`presentation`]: display data for the call dock

pub mod driver;
pub mod history;
pub mod presentation;
pub mod relay_client;
pub mod session;
pub mod timers;

pub use driver::{
    CallDriver, Collaborators, Command, DriverConfig, DriverEvent, DriverHandle, DriverState,
    RelayStatus, SignalSink,
};
pub use history::{MemoryHistory, call_summary_text};
pub use relay_client::RelayClient;
pub use session::{ActiveCall, CallFailure, CallId, CallMachine, Effect, Notice, Role};
pub use timers::{Supervisor, TimerFiring, TimerKind, Timings};
