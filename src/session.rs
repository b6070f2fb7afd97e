//! Ingestion session controller.
//!
//! Coordinates one ingestion attempt: opens the session's log channel,
//! submits the job, and folds channel events into an observable
//! [`SessionSnapshot`].
//!
//! # State machine
//!
//! ```text
//!   Idle ──submit──▶ Submitting ──ack──▶ Streaming ──status:complete──▶ Completed
//!                        │                   │  ▲
//!                        │                   └──┘ status:processing
//!                        │                   │
//!                        └──submit error──┐  └──status:error──▶ Failed
//!                                         └────────────────────▶ Failed
//! ```
//!
//! `Submitting` and `Streaming` are labels for display. Events are applied
//! from the moment the channel is open, whether or not the submission call
//! has returned yet. `Completed` and `Failed` are terminal; the log is
//! frozen from then on and a new session must be started to retry. A
//! `Streaming` session whose channel has closed (the stream ended, or it
//! was torn down) stays `Streaming` but no longer blocks a new session.
//!
//! # Channel lifetime
//!
//! A terminal status schedules the channel to close after the configured
//! grace delay, so lines the backend is still flushing can arrive. The
//! scheduled close is a task owned by the controller; [`SessionController::teardown`]
//! cancels it and closes the channel at once.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::channel::{Channel, ChannelCloser, ChannelTransport};
use crate::error::{Result, ViewerError};
use crate::models::{ChannelEvent, IngestRequest, JobStatus, SessionId};
use crate::submission::JobSubmitter;

/// Prefix for status messages in the session log.
pub const STATUS_PREFIX: &str = "[STATUS] ";

/// Phase of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Submitting,
    Streaming,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Submitting => "submitting",
            SessionState::Streaming => "streaming",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
        }
    }
}

/// Read-only view of the session, handed to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: Option<SessionId>,
    pub state: SessionState,
    /// Append-only log; frozen once the state is terminal.
    pub log: Vec<String>,
    pub channel_open: bool,
}

impl SessionSnapshot {
    fn idle() -> Self {
        Self {
            session_id: None,
            state: SessionState::Idle,
            log: Vec::new(),
            channel_open: false,
        }
    }

    /// Nothing more will happen on its own: the session is terminal, or
    /// the log stream ended while the job was still running.
    pub fn is_settled(&self) -> bool {
        self.state.is_terminal() || (self.state == SessionState::Streaming && !self.channel_open)
    }

    /// Blocks a new submission: the submit call is in flight, or the job
    /// was accepted and its log stream is still open.
    pub fn is_active(&self) -> bool {
        match self.state {
            SessionState::Submitting => true,
            SessionState::Streaming => self.channel_open,
            _ => false,
        }
    }
}

#[derive(Default)]
struct Resources {
    closer: Option<ChannelCloser>,
    pump: Option<JoinHandle<()>>,
    pending_close: Option<JoinHandle<()>>,
}

impl Resources {
    /// Cancels pending work and closes the channel.
    fn release(&mut self) {
        if let Some(handle) = self.pending_close.take() {
            handle.abort();
        }
        if let Some(closer) = self.closer.take() {
            if closer.close() {
                tracing::debug!("log stream closed on teardown");
            }
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

struct Shared {
    snapshot: watch::Sender<SessionSnapshot>,
    resources: Mutex<Resources>,
    close_grace: Duration,
}

impl Shared {
    fn resources(&self) -> MutexGuard<'_, Resources> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Modifies the snapshot if it still belongs to `session_id`.
    fn update(&self, session_id: &SessionId, f: impl FnOnce(&mut SessionSnapshot) -> bool) {
        self.snapshot.send_if_modified(|snap| {
            if snap.session_id.as_ref() != Some(session_id) {
                return false;
            }
            f(snap)
        });
    }

    /// Applies one channel event. Returns `true` if it was a terminal
    /// status, i.e. the channel should be scheduled to close.
    fn apply(&self, session_id: &SessionId, event: ChannelEvent) -> bool {
        let mut terminal_status = false;
        self.update(session_id, |snap| match event {
            ChannelEvent::Log { message, .. } => {
                if snap.state.is_terminal() {
                    tracing::debug!(session = %session_id, line = %message, "log line after terminal state dropped");
                    return false;
                }
                snap.log.push(message);
                true
            }
            ChannelEvent::Status { status, message } => {
                terminal_status = status.is_terminal();
                if snap.state.is_terminal() {
                    tracing::debug!(session = %session_id, ?status, "status after terminal state ignored");
                    return false;
                }
                if let Some(message) = message {
                    snap.log.push(format!("{}{}", STATUS_PREFIX, message));
                }
                let next = match status {
                    JobStatus::Processing => SessionState::Streaming,
                    JobStatus::Complete => SessionState::Completed,
                    JobStatus::Error => SessionState::Failed,
                };
                if next != snap.state {
                    tracing::info!(session = %session_id, from = snap.state.as_str(), to = next.as_str(), "session state changed");
                }
                snap.state = next;
                true
            }
        });
        terminal_status
    }

    fn mark_closed(&self, session_id: &SessionId) {
        self.update(session_id, |snap| {
            let was_open = snap.channel_open;
            snap.channel_open = false;
            was_open
        });
    }

    fn schedule_close(self: &Arc<Self>, session_id: &SessionId, closer: ChannelCloser) {
        let mut resources = self.resources();
        if resources.pending_close.is_some() || closer.is_closed() {
            return;
        }

        let shared = Arc::clone(self);
        let session_id = session_id.clone();
        let grace = self.close_grace;
        tracing::debug!(session = %session_id, grace_ms = grace.as_millis() as u64, "log stream close scheduled");

        resources.pending_close = Some(tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if closer.close() {
                tracing::info!(session = %session_id, "log stream closed");
            }
            shared.mark_closed(&session_id);
        }));
    }
}

async fn pump_events(shared: Arc<Shared>, session_id: SessionId, mut channel: Channel) {
    let closer = channel.closer();
    while let Some(event) = channel.next_event().await {
        if shared.apply(&session_id, event) {
            shared.schedule_close(&session_id, closer.clone());
        }
    }
    tracing::debug!(session = %session_id, "log stream drained");
    closer.close();
    shared.mark_closed(&session_id);
}

/// Runs ingestion sessions, one at a time.
pub struct SessionController {
    submitter: Arc<dyn JobSubmitter>,
    transport: Arc<dyn ChannelTransport>,
    shared: Arc<Shared>,
}

impl SessionController {
    pub fn new(
        submitter: Arc<dyn JobSubmitter>,
        transport: Arc<dyn ChannelTransport>,
        close_grace: Duration,
    ) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::idle());
        Self {
            submitter,
            transport,
            shared: Arc::new(Shared {
                snapshot,
                resources: Mutex::new(Resources::default()),
                close_grace,
            }),
        }
    }

    /// Starts a new session for `request`.
    ///
    /// Opens the log channel first, then submits the job, and returns once
    /// the submission call settles. Channel events keep being applied after
    /// this returns; observe them with [`subscribe`](Self::subscribe).
    ///
    /// # Errors
    ///
    /// - [`ViewerError::InvalidRequest`] if `source` is empty. Nothing is
    ///   opened or submitted.
    /// - [`ViewerError::SessionActive`] if the previous session is still
    ///   submitting, or streaming over an open channel. A session whose
    ///   stream ended or was torn down can be replaced.
    /// - [`ViewerError::SubmissionFailed`] if the backend rejected the job.
    ///   The session is `Failed` and its log records the reason.
    pub async fn submit(&self, request: IngestRequest) -> Result<SessionId> {
        if request.source.trim().is_empty() {
            return Err(ViewerError::InvalidRequest {
                reason: "source must not be empty".to_string(),
            });
        }

        let session_id = SessionId::generate();
        let mut rejected = false;
        self.shared.snapshot.send_if_modified(|snap| {
            if snap.is_active() {
                rejected = true;
                return false;
            }
            *snap = SessionSnapshot {
                session_id: Some(session_id.clone()),
                state: SessionState::Submitting,
                log: Vec::new(),
                channel_open: false,
            };
            true
        });
        if rejected {
            return Err(ViewerError::SessionActive);
        }

        // The previous session is settled; drop whatever it still holds.
        self.shared.resources().release();

        tracing::info!(session = %session_id, source = %request.source, "ingestion session started");

        let channel = self.transport.open(&session_id).await;
        let closer = channel.closer();
        self.shared.update(&session_id, |snap| {
            snap.channel_open = !closer.is_closed();
            true
        });
        self.shared.resources().closer = Some(closer);
        let pump = tokio::spawn(pump_events(
            Arc::clone(&self.shared),
            session_id.clone(),
            channel,
        ));
        self.shared.resources().pump = Some(pump);

        match self.submitter.submit(&session_id, &request).await {
            Ok(_) => {
                self.shared.update(&session_id, |snap| {
                    if snap.state != SessionState::Submitting {
                        return false;
                    }
                    snap.state = SessionState::Streaming;
                    true
                });
                Ok(session_id)
            }
            Err(err) => {
                tracing::warn!(session = %session_id, error = %err, "ingestion failed to start");
                let line = format!("[ERROR] Failed to start ingestion: {}", err);
                self.shared.update(&session_id, |snap| {
                    if snap.state.is_terminal() {
                        return false;
                    }
                    snap.log.push(line);
                    snap.state = SessionState::Failed;
                    true
                });
                Err(err)
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Live view of the session; changes on every state or log update.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Waits for a terminal state.
    pub async fn wait_terminal(&self) -> SessionSnapshot {
        self.wait_until(|snap| snap.state.is_terminal()).await
    }

    /// Waits until the session is terminal or its log stream has ended.
    pub async fn wait_settled(&self) -> SessionSnapshot {
        self.wait_until(SessionSnapshot::is_settled).await
    }

    /// Waits until the session's channel is closed.
    pub async fn wait_channel_closed(&self) -> SessionSnapshot {
        self.wait_until(|snap| !snap.channel_open).await
    }

    async fn wait_until(&self, done: impl Fn(&SessionSnapshot) -> bool) -> SessionSnapshot {
        let mut rx = self.subscribe();
        let result = rx.wait_for(|snap| done(snap)).await.map(|snap| SessionSnapshot::clone(&snap));
        // The sender lives in `self`, so the wait cannot observe it dropped.
        result.unwrap_or_else(|_| self.snapshot())
    }

    /// Abandons the current session: cancels a scheduled close and closes
    /// the channel now. The backend job is not cancelled.
    pub fn teardown(&self) {
        self.shared.resources().release();
        self.shared.snapshot.send_if_modified(|snap| {
            let was_open = snap.channel_open;
            snap.channel_open = false;
            was_open
        });
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.shared.resources().release();
    }
}
