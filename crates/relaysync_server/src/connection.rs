//! Live client connections.

use crate::clients::ClientId;
use parking_lot::{Mutex, RwLock};
use relaysync_store::DocumentId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A duplex connection to one client.
///
/// Implementations wrap whatever real-time channel the embedding process
/// provides (a WebSocket, typically). Sends must be best-effort and
/// bounded: a stalled consumer must fail or drop the message rather than
/// block the caller indefinitely.
pub trait Connection: Send + Sync {
    /// Sends a text message. Fire-and-forget: an error is captured by the
    /// caller, never retried.
    fn send(&self, text: &str) -> Result<(), String>;

    /// Returns true if the connection is closed or closing.
    fn is_closed(&self) -> bool;

    /// Closes the connection.
    fn close(&self);
}

struct Registered {
    doc: DocumentId,
    connection: Arc<dyn Connection>,
}

/// Tracks one live connection per client id.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ClientId, Registered>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection for a client, scoped to a document.
    ///
    /// Any existing connection for the same client id is closed first and
    /// replaced; a client never fans out to multiple connections.
    pub fn register(&self, doc: DocumentId, client_id: ClientId, connection: Arc<dyn Connection>) {
        let mut connections = self.connections.write();
        if let Some(previous) = connections.insert(client_id.clone(), Registered { doc, connection })
        {
            debug!(%client_id, "replacing existing connection");
            previous.connection.close();
        }
    }

    /// Removes a client's connection, if any.
    pub fn unregister(&self, client_id: &str) {
        self.connections.write().remove(client_id);
    }

    /// Returns the connections registered for one document's clients.
    pub fn snapshot(&self, doc: &DocumentId) -> Vec<(ClientId, Arc<dyn Connection>)> {
        self.connections
            .read()
            .iter()
            .filter(|(_, registered)| &registered.doc == doc)
            .map(|(id, registered)| (id.clone(), Arc::clone(&registered.connection)))
            .collect()
    }

    /// Returns the number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Returns true if no connections are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("len", &self.len())
            .finish()
    }
}

/// An in-memory connection that records sent messages.
///
/// Useful for tests and loopback embeddings: sent messages are captured,
/// and the closed/failing state can be toggled to exercise pruning and
/// delivery-failure paths.
#[derive(Default)]
pub struct MockConnection {
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
    fail_sends: AtomicBool,
}

impl MockConnection {
    /// Creates an open mock connection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all messages sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Makes subsequent sends fail.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

impl Connection for MockConnection {
    fn send(&self, text: &str) -> Result<(), String> {
        if self.is_closed() {
            return Err("connection closed".into());
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err("send failed".into());
        }
        self.sent.lock().push(text.to_string());
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
