// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Chitter integration tests.
//!
//! Mock collaborators and a harness that runs several call drivers against
//! an in-process relay hub, with no sockets or real media.
//!
//! # Components
//!
//! - [`MockMedia`] - audio source with failure injection and leak tracking
//! - [`MockTransport`] - peer transport that records operations
//! - [`RecordingSink`] - signal sink that captures envelopes
//! - [`StaticProfiles`] - fixed profile directory
//! - [`CallHarness`] - several drivers wired through one [`chitter_relay::Hub`]

pub mod harness;
pub mod mock_media;
pub mod mock_transport;
pub mod recording;

pub use chitter_call::MemoryHistory;
pub use harness::{CallHarness, CallHarnessBuilder, HubSink, TestClient};
pub use mock_media::MockMedia;
pub use mock_transport::{MockTransport, TransportOp};
pub use recording::{RecordingSink, StaticProfiles};
