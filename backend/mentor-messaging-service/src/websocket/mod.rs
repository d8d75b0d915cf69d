//! Real-time delivery.
//!
//! `ConnectionRegistry` tracks which users currently have live channels,
//! `EventBroadcaster` pushes serialized events into them.

pub mod broadcaster;
pub mod events;

pub use broadcaster::{DeliveryReport, EventBroadcaster};
pub use events::{ClientEvent, ServerEvent};

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::metrics;

/// Opaque handle for one live connection (one device or tab).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(pub Uuid);

impl std::fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Connection {
    pub(crate) handle: ConnectionHandle,
    pub(crate) sender: mpsc::Sender<String>,
}

/// Process-local map of user id to live connections.
///
/// All mutation goes through `register`/`unregister`; the map never keeps an
/// empty entry, so `is_online` is a plain key lookup.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<Uuid, Vec<Connection>>>>,
    /// handle -> owning user, so `unregister` needs only the handle.
    owners: Arc<RwLock<HashMap<ConnectionHandle, Uuid>>>,
    buffer: usize,
}

impl ConnectionRegistry {
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            owners: Arc::new(RwLock::new(HashMap::new())),
            buffer: buffer.max(1),
        }
    }

    /// Register a new connection for `user_id`. Events published to the user
    /// arrive on the returned receiver, already serialized.
    pub async fn register(&self, user_id: Uuid) -> (ConnectionHandle, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let handle = ConnectionHandle(Uuid::new_v4());

        // Lock order: inner before owners, everywhere.
        let mut inner = self.inner.write().await;
        let mut owners = self.owners.write().await;
        inner.entry(user_id).or_default().push(Connection { handle, sender: tx });
        owners.insert(handle, user_id);
        let total = inner.values().map(Vec::len).sum();
        drop(owners);
        drop(inner);

        metrics::set_ws_connections(total);
        tracing::debug!(user_id = %user_id, connection = %handle, "connection registered");
        (handle, rx)
    }

    /// Remove a connection. Unknown or already-removed handles are ignored.
    /// Returns whether anything was removed.
    pub async fn unregister(&self, handle: ConnectionHandle) -> bool {
        let mut inner = self.inner.write().await;
        let mut owners = self.owners.write().await;

        let Some(user_id) = owners.remove(&handle) else {
            return false;
        };
        if let Some(list) = inner.get_mut(&user_id) {
            list.retain(|c| c.handle != handle);
            if list.is_empty() {
                inner.remove(&user_id);
            }
        }
        let total = inner.values().map(Vec::len).sum();
        drop(owners);
        drop(inner);

        metrics::set_ws_connections(total);
        tracing::debug!(user_id = %user_id, connection = %handle, "connection unregistered");
        true
    }

    /// Snapshot of a user's live connections.
    pub(crate) async fn connections_for(&self, user_id: Uuid) -> Vec<Connection> {
        self.inner
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.read().await.contains_key(&user_id)
    }

    pub async fn connection_count(&self, user_id: Uuid) -> usize {
        self.inner
            .read()
            .await
            .get(&user_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub async fn total_connections(&self) -> usize {
        self.inner.read().await.values().map(Vec::len).sum()
    }

    pub async fn connected_users_count(&self) -> usize {
        self.inner.read().await.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(64)
    }
}
