// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client event loop around [`CallMachine`].
//!
//! One task owns the machine and the timers and processes [`DriverEvent`]s
//! in arrival order. Slow work (audio acquisition, description creation,
//! summary persistence) runs in spawned tasks that report back as events, so
//! inbound envelopes are never blocked behind it. Peer transport operations
//! go through a single worker task to keep them ordered; operations for a
//! call that is no longer active are skipped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chitter_config::CallConfig;
use chitter_core::{
    CallSettings, CandidateSink, ChitterError, HistoryAdapter, MediaAdapter, MediaFailure,
    MediaHandle, PeerTransport, RoomId, UserId, now_millis,
};
use chitter_signal::Envelope;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::session::{ActiveCall, CallFailure, CallId, CallMachine, Effect, Notice};
use crate::timers::{Supervisor, TimerFiring, Timings};

const EVENT_QUEUE: usize = 256;
const NOTICE_QUEUE: usize = 64;

/// Outbound path for envelopes, normally the relay connection.
///
/// Sending is fire-and-forget. An error means the envelope was dropped.
pub trait SignalSink: Send + Sync {
    fn send(&self, envelope: Envelope) -> Result<(), ChitterError>;
}

/// What the local user asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    StartCall { room: RoomId, members: Vec<UserId> },
    Accept,
    Decline,
    HangUp,
    RingAgain,
    DismissError,
    UpdateSettings(CallSettings),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStatus {
    Connected,
    Disconnected,
}

/// Input to the driver loop.
#[derive(Debug)]
pub enum DriverEvent {
    Command(Command),
    Inbound(Envelope),
    MediaAcquired { call: CallId, handle: MediaHandle },
    MediaFailed { call: CallId, reason: MediaFailure },
    LocalDescription { call: CallId, blob: Value },
    LocalCandidate { call: CallId, candidate: Value },
    TransportFailed { call: CallId, reason: String },
    Relay(RelayStatus),
}

/// What the UI observes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverState {
    pub active: Option<ActiveCall>,
    pub error: Option<CallFailure>,
}

/// The external systems a driver talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub media: Arc<dyn MediaAdapter>,
    pub transport: Arc<dyn PeerTransport>,
    pub history: Arc<dyn HistoryAdapter>,
    pub sink: Arc<dyn SignalSink>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverConfig {
    pub settings: CallSettings,
    pub timings: Timings,
}

impl From<&CallConfig> for DriverConfig {
    fn from(config: &CallConfig) -> Self {
        Self {
            settings: config.settings(),
            timings: Timings {
                ring_timeout: config.ring_timeout(),
                idle_grace: config.idle_grace(),
            },
        }
    }
}

/// Cloneable handle used to feed and observe a running driver.
#[derive(Clone)]
pub struct DriverHandle {
    events: mpsc::Sender<DriverEvent>,
    state: watch::Receiver<DriverState>,
    notices: broadcast::Sender<Notice>,
}

impl DriverHandle {
    pub async fn send(&self, event: DriverEvent) -> Result<(), ChitterError> {
        self.events
            .send(event)
            .await
            .map_err(|_| ChitterError::Internal("call driver has stopped".to_string()))
    }

    pub async fn command(&self, command: Command) -> Result<(), ChitterError> {
        self.send(DriverEvent::Command(command)).await
    }

    pub async fn start_call(&self, room: RoomId, members: Vec<UserId>) -> Result<(), ChitterError> {
        self.command(Command::StartCall { room, members }).await
    }

    pub async fn accept(&self) -> Result<(), ChitterError> {
        self.command(Command::Accept).await
    }

    pub async fn decline(&self) -> Result<(), ChitterError> {
        self.command(Command::Decline).await
    }

    pub async fn hang_up(&self) -> Result<(), ChitterError> {
        self.command(Command::HangUp).await
    }

    pub async fn inbound(&self, envelope: Envelope) -> Result<(), ChitterError> {
        self.send(DriverEvent::Inbound(envelope)).await
    }

    /// Sender for producers outside the UI, e.g. the relay client.
    pub fn events(&self) -> mpsc::Sender<DriverEvent> {
        self.events.clone()
    }

    pub fn state(&self) -> DriverState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<DriverState> {
        self.state.clone()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Wait until the published state satisfies `pred`.
    pub async fn wait_for(
        &self,
        timeout: Duration,
        pred: impl FnMut(&DriverState) -> bool,
    ) -> Result<DriverState, ChitterError> {
        let mut rx = self.state.clone();
        match tokio::time::timeout(timeout, rx.wait_for(pred)).await {
            Ok(Ok(state)) => Ok((*state).clone()),
            Ok(Err(_)) => Err(ChitterError::Internal(
                "call driver has stopped".to_string(),
            )),
            Err(_) => Err(ChitterError::Timeout { duration: timeout }),
        }
    }
}

#[derive(Debug)]
enum TransportStep {
    Open(MediaHandle),
    CreateOffer,
    CreateAnswer(Value),
    ApplyAnswer(Value),
    AddCandidate(Value),
}

#[derive(Debug)]
struct TransportOp {
    call: CallId,
    step: TransportStep,
}

/// The driver loop. Build with [`CallDriver::new`], then `run` it on a task.
pub struct CallDriver {
    engine: Engine,
    events_rx: mpsc::Receiver<DriverEvent>,
    timer_rx: mpsc::UnboundedReceiver<TimerFiring>,
    ops_rx: mpsc::UnboundedReceiver<TransportOp>,
}

struct Engine {
    machine: CallMachine,
    supervisor: Supervisor,
    collab: Collaborators,
    events_tx: mpsc::Sender<DriverEvent>,
    ops_tx: mpsc::UnboundedSender<TransportOp>,
    /// Id of the active call, 0 when idle. Read by the transport worker.
    active: Arc<AtomicU64>,
    state_tx: watch::Sender<DriverState>,
    notices_tx: broadcast::Sender<Notice>,
}

impl CallDriver {
    pub fn new(me: UserId, config: DriverConfig, collab: Collaborators) -> (Self, DriverHandle) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(DriverState::default());
        let (notices_tx, _) = broadcast::channel(NOTICE_QUEUE);

        let handle = DriverHandle {
            events: events_tx.clone(),
            state: state_rx,
            notices: notices_tx.clone(),
        };
        let engine = Engine {
            machine: CallMachine::new(me, config.settings),
            supervisor: Supervisor::new(config.timings, timer_tx),
            collab,
            events_tx,
            ops_tx,
            active: Arc::new(AtomicU64::new(0)),
            state_tx,
            notices_tx,
        };
        (
            Self {
                engine,
                events_rx,
                timer_rx,
                ops_rx,
            },
            handle,
        )
    }

    /// Process events until `cancel` fires. An active call is hung up on exit.
    pub async fn run(self, cancel: CancellationToken) {
        let CallDriver {
            mut engine,
            mut events_rx,
            mut timer_rx,
            ops_rx,
        } = self;

        let worker = spawn_transport_worker(
            ops_rx,
            engine.collab.transport.clone(),
            engine.active.clone(),
            engine.events_tx.clone(),
        );
        info!(user = %engine.machine.me(), "call driver started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                Some(event) = events_rx.recv() => engine.on_event(event),
                Some(firing) = timer_rx.recv() => engine.on_timer(firing),
            }
        }

        if engine.machine.active_call().is_some() {
            let effects = engine.machine.hang_up(now_millis());
            engine.execute(effects);
            engine.publish();
        }
        engine.supervisor.cancel_all();
        worker.abort();
        info!(user = %engine.machine.me(), "call driver stopped");
    }
}

impl Engine {
    fn on_event(&mut self, event: DriverEvent) {
        let now = now_millis();
        let effects = match event {
            DriverEvent::Command(command) => {
                debug!(?command, "command");
                match command {
                    Command::StartCall { room, members } => self.machine.start_call(room, members),
                    Command::Accept => self.machine.accept_offer(),
                    Command::Decline => self.machine.decline_offer(now),
                    Command::HangUp => self.machine.hang_up(now),
                    Command::RingAgain => self.machine.ring_again(),
                    Command::DismissError => {
                        self.machine.dismiss_error();
                        Vec::new()
                    }
                    Command::UpdateSettings(settings) => {
                        self.machine.set_settings(settings);
                        Vec::new()
                    }
                }
            }
            DriverEvent::Inbound(envelope) => {
                trace!(kind = %envelope.kind(), room = %envelope.room(), from = %envelope.from(), "inbound");
                self.machine.handle_envelope(envelope, now)
            }
            DriverEvent::MediaAcquired { call, handle } => self.machine.media_acquired(call, handle),
            DriverEvent::MediaFailed { call, reason } => self.machine.media_failed(call, reason, now),
            DriverEvent::LocalDescription { call, blob } => {
                self.machine.local_description_ready(call, blob, now)
            }
            DriverEvent::LocalCandidate { call, candidate } => {
                self.machine.local_candidate(call, candidate)
            }
            DriverEvent::TransportFailed { call, reason } => {
                self.machine.transport_failed(call, reason, now)
            }
            DriverEvent::Relay(RelayStatus::Connected) => {
                self.machine.relay_restored();
                Vec::new()
            }
            DriverEvent::Relay(RelayStatus::Disconnected) => self.machine.relay_lost(),
        };
        self.execute(effects);
        self.publish();
    }

    fn on_timer(&mut self, firing: TimerFiring) {
        if !self.supervisor.accept(firing) {
            return;
        }
        debug!(timer = %firing.kind, "timer fired");
        let effects = self.machine.timer_fired(firing.kind, now_millis());
        self.execute(effects);
        self.publish();
    }

    fn publish(&self) {
        self.state_tx.send_replace(DriverState {
            active: self.machine.snapshot(),
            error: self.machine.error().cloned(),
        });
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        let active = self.machine.active_call().map_or(0, |c| c.0);
        self.active.store(active, Ordering::SeqCst);

        for effect in effects {
            match effect {
                Effect::Send(envelope) => {
                    let kind = envelope.kind();
                    if let Err(e) = self.collab.sink.send(envelope) {
                        debug!(kind = %kind, error = %e, "signal dropped");
                    }
                }
                Effect::AcquireMedia { call } => self.acquire_media(call),
                Effect::ReleaseMedia(handle) => self.collab.media.release(handle),
                Effect::OpenTransport { call, media } => self.transport(call, TransportStep::Open(media)),
                Effect::CreateOffer { call } => self.transport(call, TransportStep::CreateOffer),
                Effect::CreateAnswer { call, offer } => {
                    self.transport(call, TransportStep::CreateAnswer(offer))
                }
                Effect::ApplyAnswer { call, answer } => {
                    self.transport(call, TransportStep::ApplyAnswer(answer))
                }
                Effect::AddCandidate { call, candidate } => {
                    self.transport(call, TransportStep::AddCandidate(candidate))
                }
                Effect::CloseTransport => self.collab.transport.close(),
                Effect::ArmTimer(kind) => {
                    self.supervisor.arm(kind);
                }
                Effect::CancelTimer(kind) => self.supervisor.cancel(kind),
                Effect::PersistSummary {
                    room,
                    author,
                    duration_text,
                } => self.persist_summary(room, author, duration_text),
                Effect::Notify(notice) => {
                    // No subscribers is fine.
                    let _ = self.notices_tx.send(notice);
                }
            }
        }
    }

    fn acquire_media(&self, call: CallId) {
        let media = self.collab.media.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let event = match media.acquire_audio().await {
                Ok(handle) => DriverEvent::MediaAcquired { call, handle },
                Err(reason) => DriverEvent::MediaFailed { call, reason },
            };
            if let Err(mpsc::error::SendError(DriverEvent::MediaAcquired { handle, .. })) =
                events.send(event).await
            {
                media.release(handle);
            }
        });
    }

    fn transport(&self, call: CallId, step: TransportStep) {
        if self.ops_tx.send(TransportOp { call, step }).is_err() {
            warn!(call = %call, "transport worker is gone");
        }
    }

    fn persist_summary(&self, room: RoomId, author: UserId, duration_text: String) {
        let history = self.collab.history.clone();
        tokio::spawn(async move {
            match history
                .append_call_summary(&room, &author, &duration_text)
                .await
            {
                Ok(message) => info!(room = %room, id = %message.id, "call summary recorded"),
                Err(e) => warn!(room = %room, error = %e, "failed to record call summary"),
            }
        });
    }
}

fn spawn_transport_worker(
    mut ops: mpsc::UnboundedReceiver<TransportOp>,
    transport: Arc<dyn PeerTransport>,
    active: Arc<AtomicU64>,
    events: mpsc::Sender<DriverEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(TransportOp { call, step }) = ops.recv().await {
            if active.load(Ordering::SeqCst) != call.0 {
                trace!(call = %call, ?step, "skipping transport op for inactive call");
                continue;
            }
            let opened = matches!(step, TransportStep::Open(_));
            let outcome = match step {
                TransportStep::Open(media) => {
                    let local = events.clone();
                    let sink: CandidateSink = Box::new(move |candidate| {
                        if local
                            .try_send(DriverEvent::LocalCandidate { call, candidate })
                            .is_err()
                        {
                            warn!(call = %call, "dropping local candidate, driver busy");
                        }
                    });
                    transport.open(media, sink).await.map(|()| None)
                }
                TransportStep::CreateOffer => transport
                    .create_offer()
                    .await
                    .map(|blob| Some(DriverEvent::LocalDescription { call, blob })),
                TransportStep::CreateAnswer(offer) => transport
                    .create_answer(offer)
                    .await
                    .map(|blob| Some(DriverEvent::LocalDescription { call, blob })),
                TransportStep::ApplyAnswer(answer) => {
                    transport.apply_answer(answer).await.map(|()| None)
                }
                TransportStep::AddCandidate(candidate) => {
                    if let Err(e) = transport.add_candidate(candidate).await {
                        debug!(call = %call, error = %e, "remote candidate rejected");
                    }
                    Ok(None)
                }
            };

            if active.load(Ordering::SeqCst) != call.0 {
                // The call ended while the op was in flight.
                if opened {
                    transport.close();
                }
                continue;
            }
            let event = match outcome {
                Ok(event) => event,
                Err(e) => Some(DriverEvent::TransportFailed {
                    call,
                    reason: e.to_string(),
                }),
            };
            if let Some(event) = event {
                if events.send(event).await.is_err() {
                    break;
                }
            }
        }
    })
}
