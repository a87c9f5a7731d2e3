//! Realtime notification hub.
//!
//! One dispatcher task ([`Hub::run`]) owns the registry of live connections
//! and is the only writer to their sockets. Everything else talks to it
//! through a [`HubHandle`]: per-connection reader tasks forward inbound
//! frames, HTTP handlers publish server events. No lock guards the
//! registry.
//!
//! Broadcast is best effort: a failed write drops that connection and the
//! pass carries on with the rest.

pub mod connection;
pub mod message;

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use connection::{ClientSink, ConnectionState, SinkError, read_loop, serve_socket};
pub use message::{ClientAction, ClientPayload, HubEvent, ServerMessage};

/// Identifies one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The dispatcher has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("notification hub is not running")]
pub struct HubClosed;

/// Commands accepted by the dispatcher.
pub enum HubCommand {
    /// Acknowledge and register a new connection. `registered` reports
    /// whether the acknowledgement went through.
    Register {
        id: ConnectionId,
        label: Option<String>,
        sink: Box<dyn ClientSink>,
        registered: oneshot::Sender<bool>,
    },
    Unregister(ConnectionId),
    Inbound {
        id: ConnectionId,
        payload: ClientPayload,
    },
    /// A server-originated event.
    Publish(HubEvent),
    ConnectionCount(oneshot::Sender<usize>),
}

impl fmt::Debug for HubCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register { id, label, .. } => f
                .debug_struct("Register")
                .field("id", id)
                .field("label", label)
                .finish_non_exhaustive(),
            Self::Unregister(id) => f.debug_tuple("Unregister").field(id).finish(),
            Self::Inbound { id, payload } => f
                .debug_struct("Inbound")
                .field("id", id)
                .field("payload", payload)
                .finish(),
            Self::Publish(event) => f.debug_tuple("Publish").field(event).finish(),
            Self::ConnectionCount(_) => f.write_str("ConnectionCount"),
        }
    }
}

/// Cloneable sender side of the dispatcher.
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    /// Register a connection. Resolves to `None` if the acknowledgement
    /// could not be written, in which case the sink has been closed.
    ///
    /// # Errors
    ///
    /// Returns `HubClosed` if the dispatcher is gone.
    pub async fn register(
        &self,
        sink: Box<dyn ClientSink>,
        label: Option<String>,
    ) -> Result<Option<ConnectionId>, HubClosed> {
        let id = ConnectionId::new();
        let (registered, reply) = oneshot::channel();
        self.send(HubCommand::Register {
            id,
            label,
            sink,
            registered,
        })?;

        let accepted = reply.await.map_err(|_| HubClosed)?;
        Ok(accepted.then_some(id))
    }

    /// # Errors
    ///
    /// Returns `HubClosed` if the dispatcher is gone.
    pub fn unregister(&self, id: ConnectionId) -> Result<(), HubClosed> {
        self.send(HubCommand::Unregister(id))
    }

    /// # Errors
    ///
    /// Returns `HubClosed` if the dispatcher is gone.
    pub fn inbound(&self, id: ConnectionId, payload: ClientPayload) -> Result<(), HubClosed> {
        self.send(HubCommand::Inbound { id, payload })
    }

    /// Queue `event` for broadcast to every connection.
    ///
    /// # Errors
    ///
    /// Returns `HubClosed` if the dispatcher is gone.
    pub fn publish(&self, event: HubEvent) -> Result<(), HubClosed> {
        self.send(HubCommand::Publish(event))
    }

    /// Number of registered connections.
    ///
    /// # Errors
    ///
    /// Returns `HubClosed` if the dispatcher is gone.
    pub async fn connection_count(&self) -> Result<usize, HubClosed> {
        let (tx, rx) = oneshot::channel();
        self.send(HubCommand::ConnectionCount(tx))?;
        rx.await.map_err(|_| HubClosed)
    }

    fn send(&self, command: HubCommand) -> Result<(), HubClosed> {
        self.commands.send(command).map_err(|_| HubClosed)
    }
}

struct Entry {
    label: Option<String>,
    sink: Box<dyn ClientSink>,
}

/// The dispatcher. Owns the registry and every socket's write half.
pub struct Hub {
    connections: HashMap<ConnectionId, Entry>,
    commands: mpsc::UnboundedReceiver<HubCommand>,
}

impl Hub {
    /// Start the dispatcher on the current runtime.
    ///
    /// It runs until every [`HubHandle`] has been dropped.
    #[must_use]
    pub fn spawn() -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Self {
            connections: HashMap::new(),
            commands: rx,
        };
        (HubHandle { commands: tx }, tokio::spawn(hub.run()))
    }

    /// Process commands until the channel closes, then close every socket.
    pub async fn run(mut self) {
        info!("Notification hub started");

        while let Some(command) = self.commands.recv().await {
            self.handle(command).await;
        }

        for (_, mut entry) in self.connections.drain() {
            entry.sink.close().await;
        }
        info!("Notification hub stopped");
    }

    async fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register {
                id,
                label,
                sink,
                registered,
            } => {
                let accepted = self.register(id, label, sink).await;
                // The connection task may have gone away; nothing to tell it.
                let _ = registered.send(accepted);
            }
            HubCommand::Unregister(id) => self.unregister(id).await,
            HubCommand::Inbound { id, payload } => match payload.event() {
                Some(event) => {
                    debug!(connection = %id, ?event, "Client action");
                    self.broadcast(event).await;
                }
                None => debug!(connection = %id, action = ?payload.action, "Ignoring client action"),
            },
            HubCommand::Publish(event) => self.broadcast(event).await,
            HubCommand::ConnectionCount(reply) => {
                let _ = reply.send(self.connections.len());
            }
        }
    }

    async fn register(
        &mut self,
        id: ConnectionId,
        label: Option<String>,
        mut sink: Box<dyn ClientSink>,
    ) -> bool {
        if let Err(e) = sink.send(&ServerMessage::connected()).await {
            warn!(connection = %id, error = %e, "Acknowledgement failed, dropping connection");
            sink.close().await;
            return false;
        }

        debug!(connection = %id, ?label, "Connection registered");
        self.connections.insert(id, Entry { label, sink });
        true
    }

    async fn unregister(&mut self, id: ConnectionId) {
        if let Some(mut entry) = self.connections.remove(&id) {
            entry.sink.close().await;
            debug!(connection = %id, label = ?entry.label, "Connection unregistered");
        }
    }

    async fn broadcast(&mut self, event: HubEvent) {
        let message = event.to_message();
        let mut failed = Vec::new();

        for (id, entry) in &mut self.connections {
            if let Err(e) = entry.sink.send(&message).await {
                warn!(connection = %id, error = %e, "Broadcast write failed, dropping connection");
                failed.push(*id);
            }
        }

        for id in failed {
            self.unregister(id).await;
        }

        debug!(?event, recipients = self.connections.len(), "Broadcast complete");
    }
}
