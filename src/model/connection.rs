use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::{
    atomic::{AtomicU64, AtomicU8, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// Opaque identity of one accepted relay connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn next() -> ConnectionId {
        static ID_COUNTER: AtomicU64 = AtomicU64::new(0);
        ConnectionId(ID_COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Deref for ConnectionId {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Liveness of a relay connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Liveness {
    /// Registered and accepting deliveries
    Open = 0,
    /// The hub has queued a close frame; no further deliveries
    Closing = 1,
    /// The writer has shut down
    Closed = 2,
}

impl Liveness {
    fn from_u8(v: u8) -> Liveness {
        match v {
            0 => Liveness::Open,
            1 => Liveness::Closing,
            _ => Liveness::Closed,
        }
    }
}

/// Shared handle to a connection's outbound queue.
///
/// The registry hands out clones of this; the socket itself is owned by the
/// connection's reader and writer tasks.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    pub connected_at: DateTime<Utc>,
    liveness: Arc<AtomicU8>,
    tx: mpsc::Sender<Message>,
}

impl ConnectionHandle {
    pub fn new(peer_addr: SocketAddr, tx: mpsc::Sender<Message>) -> ConnectionHandle {
        ConnectionHandle {
            id: ConnectionId::next(),
            peer_addr,
            connected_at: Utc::now(),
            liveness: Arc::new(AtomicU8::new(Liveness::Open as u8)),
            tx,
        }
    }

    /// `Closed` once the writer task has dropped its end of the queue.
    pub fn liveness(&self) -> Liveness {
        if self.tx.is_closed() {
            return Liveness::Closed;
        }
        Liveness::from_u8(self.liveness.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.liveness() == Liveness::Open
    }

    pub fn set_liveness(&self, liveness: Liveness) {
        self.liveness.store(liveness as u8, Ordering::Release);
    }

    /// Queue a message without waiting.
    ///
    /// Returns `false` when the connection is not open or its queue is full;
    /// the message is dropped for this connection only.
    pub fn try_deliver(&self, msg: Message) -> bool {
        if !self.is_open() {
            return false;
        }

        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Connection({}) outbound queue full, skipping", *self.id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Queue a close frame and stop accepting deliveries.
    ///
    /// The close is queued behind anything already accepted, so earlier
    /// broadcasts still reach the peer first.
    pub fn close(&self, frame: Message) {
        if self.liveness() != Liveness::Open {
            return;
        }
        self.set_liveness(Liveness::Closing);

        if self.tx.try_send(frame).is_err() {
            debug!("Connection({}) close frame not queued", *self.id);
        }
    }

    /// How long this connection has been registered.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.connected_at
    }
}
