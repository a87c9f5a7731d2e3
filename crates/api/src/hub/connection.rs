//! Per-connection plumbing: the write half handed to the dispatcher and the
//! reader task that feeds it.

use std::fmt::Display;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, Stream, StreamExt};
use thiserror::Error;
use tracing::{debug, instrument};

use super::{ConnectionId, HubHandle};
use super::message::{ClientPayload, ServerMessage};

/// A write to a client failed.
#[derive(Debug, Clone, Error)]
#[error("client write failed: {0}")]
pub struct SinkError(pub String);

/// Lifecycle of one websocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Upgraded, waiting for the dispatcher to acknowledge.
    Connecting,
    /// Registered and being read.
    Open,
    Closed,
}

/// Write half of a client connection. Only the dispatcher holds these.
#[async_trait]
pub trait ClientSink: Send {
    async fn send(&mut self, message: &ServerMessage) -> Result<(), SinkError>;

    /// Close the transport. Errors are ignored; the peer may already be gone.
    async fn close(&mut self);
}

#[async_trait]
impl ClientSink for SplitSink<WebSocket, Message> {
    async fn send(&mut self, message: &ServerMessage) -> Result<(), SinkError> {
        let text = serde_json::to_string(message).map_err(|e| SinkError(e.to_string()))?;
        SinkExt::send(self, Message::Text(text.into()))
            .await
            .map_err(|e| SinkError(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = SinkExt::close(self).await;
    }
}

/// Drive one upgraded socket: register its write half with the hub, then
/// read until it closes.
#[instrument(skip_all)]
pub async fn serve_socket(socket: WebSocket, hub: HubHandle) {
    let (sink, stream) = socket.split();
    let mut state = ConnectionState::Connecting;

    let id = match hub.register(Box::new(sink), None).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            debug!(?state, "Connection rejected during acknowledgement");
            return;
        }
        Err(e) => {
            debug!(error = %e, ?state, "Hub unavailable, dropping connection");
            return;
        }
    };

    state = ConnectionState::Open;
    debug!(connection = %id, ?state, "Connection open");

    read_loop(id, stream, &hub).await;

    state = ConnectionState::Closed;
    debug!(connection = %id, ?state, "Connection closed");
}

/// Forward every JSON text frame to the hub until the stream ends, then
/// unregister.
///
/// Frames that do not decode are skipped. A close frame, a read error or
/// end-of-stream stops the loop.
pub async fn read_loop<S, E>(id: ConnectionId, mut stream: S, hub: &HubHandle)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientPayload>(text.as_str()) {
                Ok(payload) => {
                    if hub.inbound(id, payload).is_err() {
                        break;
                    }
                }
                Err(e) => debug!(connection = %id, error = %e, "Skipping malformed frame"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(connection = %id, error = %e, "Read failed");
                break;
            }
        }
    }

    // The dispatcher may already be gone during shutdown.
    let _ = hub.unregister(id);
}
