//! WebSocket Connection Hub
//!
//! Owns the live connection set and fans out every broadcast. The set lives
//! inside a single actor task; [`ConnectionHub`] is a cheap handle that
//! submits commands over a channel, so registration, removal and broadcast
//! are applied strictly one at a time in submission order.
//!
//! Delivery never waits on a client. A connection whose outbound queue is
//! full or closed is evicted as if it had disconnected.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::connection::{Connection, ConnectionId, OutboundQueue};
use super::messages::{InboundMessage, SystemEvent};
use super::transform::{BroadcastTransform, RelayMode};

/// Configuration for the connection hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent connections
    pub max_connections: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
        }
    }
}

/// Counters maintained by the hub task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub connections: usize,
    pub registered_total: u64,
    pub messages_broadcast: u64,
    pub frames_delivered: u64,
    pub evicted: u64,
}

/// Errors that can occur in the connection hub
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),

    #[error("Connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),

    #[error("Connection hub has shut down")]
    Closed,
}

enum HubCommand {
    Register {
        connection: Connection,
        respond_to: oneshot::Sender<Result<(), HubError>>,
    },
    Unregister {
        id: ConnectionId,
    },
    Broadcast {
        message: InboundMessage,
    },
    Stats {
        respond_to: oneshot::Sender<HubStats>,
    },
    Shutdown {
        respond_to: oneshot::Sender<()>,
    },
}

/// Handle to the hub task
#[derive(Clone)]
pub struct ConnectionHub {
    sender: mpsc::UnboundedSender<HubCommand>,
    mode: RelayMode,
}

impl ConnectionHub {
    /// Spawn the hub task and return a handle to it.
    ///
    /// The task runs until every handle is dropped or [`shutdown`](Self::shutdown)
    /// is called. Must be called from within a tokio runtime.
    pub fn spawn(config: HubConfig, transform: Arc<dyn BroadcastTransform>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mode = transform.mode();

        let actor = HubActor {
            config,
            transform,
            connections: HashMap::new(),
            pending_removals: VecDeque::new(),
            pending_ids: HashSet::new(),
            stats: HubStats::default(),
        };
        tokio::spawn(actor.run(receiver));

        Self { sender, mode }
    }

    pub fn mode(&self) -> RelayMode {
        self.mode
    }

    /// Add a connection to the live set and announce it to the others.
    ///
    /// Resolves once the hub has applied the registration.
    pub async fn register(&self, connection: Connection) -> Result<(), HubError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(HubCommand::Register {
                connection,
                respond_to: tx,
            })
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)?
    }

    /// Remove a connection and close its outbound queue. Removing an id that
    /// is not live is a no-op.
    pub fn unregister(&self, id: &str) {
        let command = HubCommand::Unregister { id: id.to_string() };
        if self.sender.send(command).is_err() {
            tracing::debug!(connection_id = %id, "Hub closed, unregister ignored");
        }
    }

    /// Queue a client message for fan-out
    pub fn broadcast(&self, message: InboundMessage) -> Result<(), HubError> {
        self.sender
            .send(HubCommand::Broadcast { message })
            .map_err(|_| HubError::Closed)
    }

    /// Snapshot of the hub counters
    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(HubCommand::Stats { respond_to: tx })
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Number of live connections
    pub async fn connection_count(&self) -> usize {
        self.stats().await.map(|s| s.connections).unwrap_or(0)
    }

    /// Close every outbound queue and stop the hub task
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(HubCommand::Shutdown { respond_to: tx })
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}

struct LiveConnection {
    peer_addr: Option<SocketAddr>,
    queue: OutboundQueue,
    connected_at: DateTime<Utc>,
}

struct HubActor {
    config: HubConfig,
    transform: Arc<dyn BroadcastTransform>,
    connections: HashMap<ConnectionId, LiveConnection>,
    /// Connections that failed delivery, removed after the current fan-out
    pending_removals: VecDeque<ConnectionId>,
    /// Ids currently in `pending_removals`
    pending_ids: HashSet<ConnectionId>,
    stats: HubStats,
}

impl HubActor {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<HubCommand>) {
        tracing::debug!(mode = self.transform.mode().as_str(), "Connection hub started");

        while let Some(command) = receiver.recv().await {
            match command {
                HubCommand::Register {
                    connection,
                    respond_to,
                } => {
                    let result = self.register(connection);
                    let _ = respond_to.send(result);
                }
                HubCommand::Unregister { id } => {
                    self.schedule_removal(id);
                }
                HubCommand::Broadcast { message } => self.broadcast(&message),
                HubCommand::Stats { respond_to } => {
                    let mut stats = self.stats.clone();
                    stats.connections = self.connections.len();
                    let _ = respond_to.send(stats);
                }
                HubCommand::Shutdown { respond_to } => {
                    receiver.close();
                    self.close_all();
                    let _ = respond_to.send(());
                    break;
                }
            }
            self.process_removals();
        }

        self.close_all();
        tracing::debug!("Connection hub stopped");
    }

    fn register(&mut self, connection: Connection) -> Result<(), HubError> {
        if self.connections.contains_key(&connection.id) {
            return Err(HubError::AlreadyRegistered(connection.id));
        }
        if self.connections.len() >= self.config.max_connections {
            return Err(HubError::TooManyConnections(self.config.max_connections));
        }

        let Connection {
            id,
            peer_addr,
            queue,
        } = connection;

        self.connections.insert(
            id.clone(),
            LiveConnection {
                peer_addr,
                queue,
                connected_at: Utc::now(),
            },
        );
        self.stats.registered_total += 1;

        tracing::info!(
            connection_id = %id,
            peer = ?peer_addr,
            total = self.connections.len(),
            "WebSocket connected"
        );

        self.announce(SystemEvent::Joined, peer_addr, Some(id.as_str()));
        Ok(())
    }

    fn broadcast(&mut self, message: &InboundMessage) {
        let outbound = match self.transform.relay(message) {
            Ok(outbound) => outbound,
            Err(e) => {
                tracing::error!(connection_id = %message.sender, error = %e, "Failed to build broadcast");
                return;
            }
        };

        let exclude = outbound.exclude_sender.then_some(message.sender.as_str());
        let delivered = self.fan_out(&outbound.frame, exclude);
        self.stats.messages_broadcast += 1;

        tracing::trace!(
            connection_id = %message.sender,
            delivered,
            "Broadcast message"
        );
    }

    fn announce(&mut self, event: SystemEvent, peer: Option<SocketAddr>, exclude: Option<&str>) {
        match self.transform.notice(event, peer) {
            Ok(frame) => {
                self.fan_out(&frame, exclude);
            }
            Err(e) => tracing::error!(error = %e, "Failed to build system notice"),
        }
    }

    /// Enqueue `frame` on every live connection except `exclude`.
    ///
    /// Connections that cannot take the frame are queued for removal rather
    /// than removed here, so the iteration never sees its own mutation.
    /// Connections already queued for removal are skipped.
    fn fan_out(&mut self, frame: &str, exclude: Option<&str>) -> usize {
        let mut delivered = 0;
        let mut failed = Vec::new();

        for (id, conn) in &self.connections {
            if exclude == Some(id.as_str()) || self.pending_ids.contains(id) {
                continue;
            }
            match conn.queue.enqueue(frame.to_string()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(connection_id = %id, error = %e, "Dropping slow connection");
                    failed.push(id.clone());
                }
            }
        }

        for id in failed {
            if self.schedule_removal(id) {
                self.stats.evicted += 1;
            }
        }

        self.stats.frames_delivered += delivered as u64;
        delivered
    }

    /// Queue `id` for removal; returns false if it is already queued
    fn schedule_removal(&mut self, id: ConnectionId) -> bool {
        if !self.pending_ids.insert(id.clone()) {
            return false;
        }
        self.pending_removals.push_back(id);
        true
    }

    /// Remove queued connections. Each removal announces a departure, which
    /// may in turn evict further connections; the loop runs until none remain.
    fn process_removals(&mut self) {
        while let Some(id) = self.pending_removals.pop_front() {
            self.pending_ids.remove(&id);
            let Some(mut conn) = self.connections.remove(&id) else {
                continue;
            };
            conn.queue.close();

            let connected_for = Utc::now().signed_duration_since(conn.connected_at);
            tracing::info!(
                connection_id = %id,
                peer = ?conn.peer_addr,
                connected_secs = connected_for.num_seconds(),
                total = self.connections.len(),
                "WebSocket disconnected"
            );

            self.announce(SystemEvent::Left, conn.peer_addr, None);
        }
    }

    fn close_all(&mut self) {
        for (_, mut conn) in self.connections.drain() {
            conn.queue.close();
        }
        self.pending_removals.clear();
        self.pending_ids.clear();
    }
}
