//! Connection membership for the relay hub
//!
//! The registry is the hub's only shared state. Broadcasts work on a
//! snapshot taken under the lock, so connections joining or leaving during a
//! fan-out never affect the iteration in progress.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_tungstenite::tungstenite::Message;

use crate::model::connection::{ConnectionHandle, ConnectionId};

#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<BTreeMap<ConnectionId, ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, conn: ConnectionHandle) {
        self.inner.lock().insert(conn.id, conn);
    }

    pub fn remove(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.inner.lock().remove(&id)
    }

    pub fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.inner.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Deliver `msg` to every open connection, the sender included.
    ///
    /// Returns the number of connections the message was queued for.
    pub fn broadcast(&self, msg: &Message) -> usize {
        self.snapshot()
            .iter()
            .filter(|conn| conn.try_deliver(msg.clone()))
            .count()
    }
}
