// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock peer transport that records every operation.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chitter_core::{CandidateSink, ChitterError, MediaHandle, PeerTransport};
use serde_json::{Value, json};

/// One call made on the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportOp {
    Open(MediaHandle),
    CreateOffer,
    CreateAnswer(Value),
    ApplyAnswer(Value),
    AddCandidate(Value),
    Close,
}

/// Records operations, produces numbered fake descriptions, and lets the
/// test push local candidates through the sink handed to `open`.
#[derive(Default)]
pub struct MockTransport {
    ops: Mutex<Vec<TransportOp>>,
    sink: Mutex<Option<CandidateSink>>,
    counter: AtomicU64,
    fail_open: AtomicBool,
    fail_negotiation: AtomicBool,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("ops", &self.ops())
            .finish_non_exhaustive()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `open` calls fail.
    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make offer/answer creation fail.
    pub fn fail_negotiation(&self, fail: bool) {
        self.fail_negotiation.store(fail, Ordering::SeqCst);
    }

    pub fn ops(&self) -> Vec<TransportOp> {
        lock(&self.ops).clone()
    }

    pub fn count(&self, pred: impl Fn(&TransportOp) -> bool) -> usize {
        lock(&self.ops).iter().filter(|op| pred(op)).count()
    }

    pub fn closes(&self) -> usize {
        self.count(|op| matches!(op, TransportOp::Close))
    }

    pub fn is_open(&self) -> bool {
        lock(&self.sink).is_some()
    }

    /// Emit a local candidate as if ICE gathering produced it. False if the
    /// transport is not open.
    pub fn emit_candidate(&self, candidate: Value) -> bool {
        match lock(&self.sink).as_ref() {
            Some(sink) => {
                sink(candidate);
                true
            }
            None => false,
        }
    }

    fn record(&self, op: TransportOp) {
        lock(&self.ops).push(op);
    }

    fn description(&self, kind: &str) -> Result<Value, ChitterError> {
        if self.fail_negotiation.load(Ordering::SeqCst) {
            return Err(ChitterError::transport(format!("mock {kind} failed")));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({"type": kind, "sdp": format!("mock-{kind}-{n}")}))
    }
}

#[async_trait]
impl PeerTransport for MockTransport {
    async fn open(&self, media: MediaHandle, candidates: CandidateSink) -> Result<(), ChitterError> {
        self.record(TransportOp::Open(media));
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(ChitterError::transport("mock open failed"));
        }
        *lock(&self.sink) = Some(candidates);
        Ok(())
    }

    async fn create_offer(&self) -> Result<Value, ChitterError> {
        self.record(TransportOp::CreateOffer);
        self.description("offer")
    }

    async fn create_answer(&self, remote_offer: Value) -> Result<Value, ChitterError> {
        self.record(TransportOp::CreateAnswer(remote_offer));
        self.description("answer")
    }

    async fn apply_answer(&self, remote_answer: Value) -> Result<(), ChitterError> {
        self.record(TransportOp::ApplyAnswer(remote_answer));
        Ok(())
    }

    async fn add_candidate(&self, candidate: Value) -> Result<(), ChitterError> {
        self.record(TransportOp::AddCandidate(candidate));
        Ok(())
    }

    fn close(&self) {
        self.record(TransportOp::Close);
        *lock(&self.sink) = None;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn candidates_flow_only_while_open() {
        let transport = MockTransport::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        assert!(!transport.emit_candidate(json!({"c": 0})));

        transport
            .open(MediaHandle(1), Box::new(move |c| sink_seen.lock().unwrap().push(c)))
            .await
            .unwrap();
        assert!(transport.emit_candidate(json!({"c": 1})));
        transport.close();
        assert!(!transport.emit_candidate(json!({"c": 2})));

        assert_eq!(*seen.lock().unwrap(), vec![json!({"c": 1})]);
        assert_eq!(transport.closes(), 1);
    }

    #[tokio::test]
    async fn descriptions_are_numbered() {
        let transport = MockTransport::new();
        let offer = transport.create_offer().await.unwrap();
        let answer = transport.create_answer(offer.clone()).await.unwrap();
        assert_eq!(offer["sdp"], "mock-offer-1");
        assert_eq!(answer["sdp"], "mock-answer-2");
        assert_eq!(transport.ops()[1], TransportOp::CreateAnswer(offer));
    }
}
