//! Connection and Outbound Queue
//!
//! A [`Connection`] is what the upgrade handler hands to the hub: an id, the
//! peer address, and the producer side of a bounded outbound queue. The
//! consumer side ([`OutboundReceiver`]) stays with the connection's writer
//! task.
//!
//! The queue carries an explicit [`QueueState`] shared by both ends:
//!
//! - `Open`: the hub can enqueue frames
//! - `Draining`: the hub closed the queue; frames already enqueued still flow
//! - `Closed`: the writer has drained everything and must stop

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// Unique identifier for a WebSocket connection
pub type ConnectionId = String;

/// Lifecycle of an outbound queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Open,
    Draining,
    Closed,
}

impl QueueState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => QueueState::Open,
            1 => QueueState::Draining,
            _ => QueueState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            QueueState::Open => 0,
            QueueState::Draining => 1,
            QueueState::Closed => 2,
        }
    }
}

#[derive(Debug)]
struct SharedState(AtomicU8);

impl SharedState {
    fn new() -> Arc<Self> {
        Arc::new(Self(AtomicU8::new(QueueState::Open.as_u8())))
    }

    fn get(&self) -> QueueState {
        QueueState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves forward only: Open -> Draining -> Closed.
    fn advance(&self, to: QueueState) {
        self.0.fetch_max(to.as_u8(), Ordering::AcqRel);
    }
}

/// Why a frame could not be enqueued
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("outbound queue is full")]
    Full,

    #[error("outbound queue is closed")]
    Closed,
}

/// Producer side of a connection's outbound queue, owned by the hub
#[derive(Debug)]
pub struct OutboundQueue {
    sender: Option<mpsc::Sender<String>>,
    state: Arc<SharedState>,
}

impl OutboundQueue {
    /// Enqueue a frame without waiting
    pub fn enqueue(&self, frame: String) -> Result<(), EnqueueError> {
        let sender = self.sender.as_ref().ok_or(EnqueueError::Closed)?;
        sender.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => EnqueueError::Full,
            TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Close the queue. The writer drains what is already enqueued and then
    /// sees the end of the stream. Calling this again is a no-op.
    pub fn close(&mut self) {
        if self.sender.take().is_some() {
            self.state.advance(QueueState::Draining);
        }
    }

    pub fn state(&self) -> QueueState {
        self.state.get()
    }
}

/// Consumer side of a connection's outbound queue, owned by the writer task
#[derive(Debug)]
pub struct OutboundReceiver {
    receiver: mpsc::Receiver<String>,
    state: Arc<SharedState>,
}

impl OutboundReceiver {
    /// Next frame in FIFO order, or `None` once the queue is closed and empty.
    pub async fn next(&mut self) -> Option<String> {
        let frame = self.receiver.recv().await;
        if frame.is_none() {
            self.state.advance(QueueState::Closed);
        }
        frame
    }

    pub fn state(&self) -> QueueState {
        self.state.get()
    }
}

/// Create a bounded outbound queue. A capacity of zero is raised to one.
pub fn outbound_queue(capacity: usize) -> (OutboundQueue, OutboundReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let state = SharedState::new();

    (
        OutboundQueue {
            sender: Some(sender),
            state: Arc::clone(&state),
        },
        OutboundReceiver { receiver, state },
    )
}

/// A client connection as handed to the hub on registration
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub peer_addr: Option<SocketAddr>,
    pub(crate) queue: OutboundQueue,
}

impl Connection {
    /// Create a connection with a fresh id and its outbound queue
    pub fn new(peer_addr: Option<SocketAddr>, queue_capacity: usize) -> (Self, OutboundReceiver) {
        Self::with_id(Uuid::new_v4().to_string(), peer_addr, queue_capacity)
    }

    pub fn with_id(
        id: impl Into<ConnectionId>,
        peer_addr: Option<SocketAddr>,
        queue_capacity: usize,
    ) -> (Self, OutboundReceiver) {
        let (queue, receiver) = outbound_queue(queue_capacity);
        (
            Self {
                id: id.into(),
                peer_addr,
                queue,
            },
            receiver,
        )
    }
}
