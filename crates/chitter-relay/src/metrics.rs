// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; without an installed recorder every call is a
//! no-op.

use chitter_signal::EnvelopeKind;
use metrics::{describe_counter, describe_gauge};

use crate::hub::Delivery;

/// Register metric descriptions. Called once after the recorder is installed.
pub fn register_metrics() {
    describe_gauge!("chitter_relay_connections", "Open relay WebSocket connections");
    describe_gauge!("chitter_relay_online_users", "Users with at least one open connection");
    describe_counter!("chitter_relay_envelopes_total", "Envelopes forwarded, by kind");
    describe_counter!(
        "chitter_relay_deliveries_total",
        "Envelope copies queued to connections, by route"
    );
    describe_counter!(
        "chitter_relay_dropped_total",
        "Envelope copies dropped because a connection queue was full or closed"
    );
}

pub fn record_connection_opened() {
    metrics::gauge!("chitter_relay_connections").increment(1.0);
}

pub fn record_connection_closed() {
    metrics::gauge!("chitter_relay_connections").decrement(1.0);
}

pub fn set_online_users(count: usize) {
    metrics::gauge!("chitter_relay_online_users").set(count as f64);
}

pub fn record_forward(kind: EnvelopeKind, delivery: &Delivery) {
    metrics::counter!("chitter_relay_envelopes_total", "kind" => kind.to_string()).increment(1);
    if delivery.room > 0 {
        metrics::counter!("chitter_relay_deliveries_total", "route" => "room")
            .increment(delivery.room as u64);
    }
    if delivery.mailbox > 0 {
        metrics::counter!("chitter_relay_deliveries_total", "route" => "mailbox")
            .increment(delivery.mailbox as u64);
    }
    if delivery.dropped > 0 {
        metrics::counter!("chitter_relay_dropped_total").increment(delivery.dropped as u64);
    }
}
