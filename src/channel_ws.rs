//! WebSocket log channel.
//!
//! Connects to `ws(s)://<host>/ws/logs/<sessionId>` and forwards every text
//! frame that parses as a [`ChannelEvent`] to the consumer. Frames that are
//! not log or status events are skipped. Nothing is sent upstream except
//! the close frame.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::channel::{Channel, ChannelFeed, ChannelTransport};
use crate::config::BackendConfig;
use crate::error::ViewerError;
use crate::models::{ChannelEvent, SessionId};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`ChannelTransport`] over WebSocket.
pub struct WebSocketTransport {
    logs_url: String,
    connect_timeout: Duration,
}

impl WebSocketTransport {
    /// `logs_url` is the endpoint prefix; the session id is appended as the
    /// last path segment. A connection not established within
    /// `connect_timeout` counts as a transport failure.
    pub fn new(logs_url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            logs_url: logs_url.into(),
            connect_timeout,
        }
    }

    pub fn from_config(config: &BackendConfig) -> anyhow::Result<Self> {
        Ok(Self::new(config.logs_url()?, config.timeout()))
    }

    fn url_for(&self, session_id: &SessionId) -> String {
        format!("{}/{}", self.logs_url.trim_end_matches('/'), session_id)
    }
}

#[async_trait]
impl ChannelTransport for WebSocketTransport {
    async fn open(&self, session_id: &SessionId) -> Channel {
        let (feed, channel) = Channel::pair();
        let url = self.url_for(session_id);

        match tokio::time::timeout(self.connect_timeout, connect_async(url.as_str())).await {
            Ok(Ok((socket, _))) => {
                tracing::info!(session = %session_id, url = %url, "connected to log stream");
                tokio::spawn(pump(socket, feed, session_id.clone()));
            }
            Ok(Err(e)) => feed.transport_failed(&ViewerError::transport(e)),
            Err(_) => feed.transport_failed(&ViewerError::transport(format!(
                "no handshake from {} within {}s",
                url,
                self.connect_timeout.as_secs_f32()
            ))),
        }

        channel
    }
}

async fn pump(socket: Socket, mut feed: ChannelFeed, session_id: SessionId) {
    let (mut sink, mut frames) = socket.split();

    loop {
        tokio::select! {
            _ = feed.closed() => {
                tracing::debug!(session = %session_id, "closing log stream");
                if let Err(e) = sink.send(Message::Close(None)).await {
                    tracing::debug!(session = %session_id, error = %e, "close frame not sent");
                }
                break;
            }
            frame = frames.next() => match frame {
                Some(Ok(Message::Text(text))) => match ChannelEvent::from_frame(text.as_str()) {
                    Some(event) => {
                        if !feed.push(event) {
                            break;
                        }
                    }
                    None => {
                        tracing::debug!(session = %session_id, frame = %text.as_str(), "skipping unrecognised frame");
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!(session = %session_id, "log stream ended by backend");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    if !feed.is_closed() {
                        feed.transport_failed(&ViewerError::transport(e));
                    }
                    break;
                }
            }
        }
    }
}
