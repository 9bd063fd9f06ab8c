// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal relay for Chitter voice calls.
//!
//! The relay never interprets call state. It authenticates sockets, tracks
//! presence and room membership in a [`Hub`], and fans each envelope out to
//! the sender's room plus any user mailboxes the envelope names.

pub mod auth;
pub mod hub;
pub mod metrics;
pub mod server;
pub mod ws;

pub use auth::TokenVerifier;
pub use hub::{ConnId, Delivery, Hub};
pub use server::{HealthState, MetricsRender, RelayState, ServerConfig, bind, router, serve};
