//! Live status channel.
//!
//! A channel is a push connection scoped to one session identifier. It
//! delivers the backend's [`ChannelEvent`]s in the exact order they were
//! sent, without reordering or de-duplication, until it is closed.
//!
//! The session controller only sees the [`ChannelTransport`] capability, so
//! the wire (WebSocket, SSE, polling) can change without touching the state
//! machine. [`crate::channel_ws`] provides the WebSocket transport.
//!
//! # Halves
//!
//! ```text
//!  transport task                       consumer
//! ┌──────────────┐  ChannelEvent (FIFO) ┌──────────┐
//! │ ChannelFeed  │ ───────────────────▶ │ Channel  │
//! │              │ ◀─────────────────── │          │
//! └──────────────┘   close request      └──────────┘
//! ```
//!
//! Transport failures never surface as errors to the consumer. The feed
//! turns them into a synthetic [`CONNECTION_FAILED_LINE`] log event so the
//! session log always records lost connectivity.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::error::ViewerError;
use crate::models::{ChannelEvent, SessionId};

/// Log line appended when the transport fails.
pub const CONNECTION_FAILED_LINE: &str = "[ERROR] Connection to log stream failed";

/// Opens push channels addressed by session identifier.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Opens the channel for `session_id`.
    ///
    /// Returns once the transport is attached (or has failed to attach), so
    /// a job submitted afterwards cannot emit events before the channel
    /// listens. Connection failures are delivered as events, not errors.
    async fn open(&self, session_id: &SessionId) -> Channel;
}

/// Consumer half of an open channel.
pub struct Channel {
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    closer: ChannelCloser,
}

impl Channel {
    /// Creates a connected feed/channel pair.
    pub fn pair() -> (ChannelFeed, Channel) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = watch::channel(false);
        let feed = ChannelFeed {
            events: tx,
            closed: close_rx,
        };
        let channel = Channel {
            events: rx,
            closer: ChannelCloser {
                state: Arc::new(close_tx),
            },
        };
        (feed, channel)
    }

    /// Next event, or `None` once the transport has stopped delivering.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// A handle that can close this channel from elsewhere.
    pub fn closer(&self) -> ChannelCloser {
        self.closer.clone()
    }

    pub fn close(&self) {
        self.closer.close();
    }
}

/// Closes a channel. Cloneable; closing is idempotent.
#[derive(Clone)]
pub struct ChannelCloser {
    state: Arc<watch::Sender<bool>>,
}

impl ChannelCloser {
    /// Requests closure. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        let was_closed = self.state.send_replace(true);
        !was_closed
    }

    pub fn is_closed(&self) -> bool {
        *self.state.borrow()
    }
}

/// Producer half, held by the transport.
pub struct ChannelFeed {
    events: mpsc::UnboundedSender<ChannelEvent>,
    closed: watch::Receiver<bool>,
}

impl ChannelFeed {
    /// Delivers an event. Returns `false` if the consumer is gone.
    pub fn push(&self, event: ChannelEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Records a transport failure as a log event.
    pub fn transport_failed(&self, err: &ViewerError) {
        tracing::warn!(error = %err, "log stream transport failed");
        self.push(ChannelEvent::log(CONNECTION_FAILED_LINE));
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once closure is requested or every closer is dropped.
    pub async fn closed(&mut self) {
        let _ = self.closed.wait_for(|closed| *closed).await;
    }
}
