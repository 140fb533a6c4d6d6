//! Main sync server.

use crate::clients::{ClientId, ClientRegistry};
use crate::config::ServerConfig;
use crate::connection::{Connection, ConnectionRegistry};
use crate::dispatch::PokeDispatcher;
use crate::error::{ServerError, ServerResult};
use crate::mutator::MutatorRegistry;
use crate::process::{MutationProcessor, PushOutcome};
use crate::pull::PullHandler;
use parking_lot::{Mutex, RwLock};
use relaysync_protocol::{PullRequest, PullResponse, PushRequest};
use relaysync_store::{DocumentId, SnapshotStore};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-document critical sections.
///
/// Every operation addressing one document runs under that document's
/// exclusive lock, held for the lifetime of the request and released only
/// after the resulting checkpoint (if any) is finalized. Different
/// documents share nothing.
#[derive(Debug, Default)]
struct DocumentLocks {
    locks: RwLock<HashMap<DocumentId, Arc<Mutex<()>>>>,
}

impl DocumentLocks {
    fn lock_for(&self, doc: &DocumentId) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().get(doc) {
            return Arc::clone(lock);
        }
        let mut locks = self.locks.write();
        Arc::clone(locks.entry(doc.clone()).or_default())
    }
}

/// The sync server.
///
/// Serves push, pull, and real-time poke fan-out over a snapshot store.
/// The mutator table holds the externally supplied business logic; the
/// server itself only enforces ordering, idempotency, versioning, and
/// delta computation.
///
/// # Example
///
/// ```
/// use relaysync_server::{MutatorRegistry, ServerConfig, SyncServer, WriteTransaction};
/// use relaysync_store::MemoryStore;
/// use serde_json::Value;
///
/// let mut mutators = MutatorRegistry::new();
/// mutators.register("put", |tx: &mut WriteTransaction<'_>, args: &Value| {
///     let key = args["key"].as_str().ok_or("missing key")?;
///     tx.put(key, args["value"].clone());
///     Ok(())
/// });
///
/// let server = SyncServer::new(ServerConfig::default(), MemoryStore::new(), mutators);
/// // The embedding process exposes HTTP endpoints that call
/// // server.handle_push(), handle_pull(), and connect().
/// ```
pub struct SyncServer<S: SnapshotStore> {
    store: S,
    config: ServerConfig,
    clients: Arc<ClientRegistry>,
    connections: Arc<ConnectionRegistry>,
    processor: MutationProcessor,
    pull_handler: PullHandler,
    dispatcher: PokeDispatcher,
    locks: DocumentLocks,
}

impl<S: SnapshotStore> SyncServer<S> {
    /// Creates a new sync server over a store and a mutator table.
    pub fn new(config: ServerConfig, store: S, mutators: MutatorRegistry) -> Self {
        let clients = Arc::new(ClientRegistry::new());
        let connections = Arc::new(ConnectionRegistry::new());
        let mutators = Arc::new(mutators);

        Self {
            store,
            config,
            processor: MutationProcessor::new(Arc::clone(&clients), mutators),
            pull_handler: PullHandler::new(Arc::clone(&clients)),
            dispatcher: PokeDispatcher::new(Arc::clone(&clients), Arc::clone(&connections)),
            clients,
            connections,
            locks: DocumentLocks::default(),
        }
    }

    /// Handles a push: applies the batch, mints a checkpoint, fans out
    /// pokes to the document's connected clients.
    ///
    /// The entire operation runs under the document's critical section.
    pub fn handle_push(
        &self,
        doc: &DocumentId,
        request: &PushRequest,
    ) -> ServerResult<PushOutcome> {
        if request.mutations.len() > self.config.max_push_batch {
            return Err(ServerError::InvalidRequest(format!(
                "too many mutations: {} > {}",
                request.mutations.len(),
                self.config.max_push_batch
            )));
        }

        let lock = self.locks.lock_for(doc);
        let _guard = lock.lock();

        let outcome = self.processor.push(&self.store, doc, request)?;
        self.dispatcher.poke(&self.store, doc, outcome.checkpoint)?;
        Ok(outcome)
    }

    /// Handles a pull under the document's critical section.
    pub fn handle_pull(
        &self,
        doc: &DocumentId,
        request: &PullRequest,
    ) -> ServerResult<PullResponse> {
        let lock = self.locks.lock_for(doc);
        let _guard = lock.lock();

        self.pull_handler.pull(&self.store, doc, request)
    }

    /// Registers a live connection for a client, replacing any stale one.
    pub fn connect(&self, doc: DocumentId, client_id: ClientId, connection: Arc<dyn Connection>) {
        self.connections.register(doc, client_id, connection);
    }

    /// Unregisters a client's connection on close notification.
    pub fn disconnect(&self, client_id: &str) {
        self.connections.unregister(client_id);
    }

    /// Returns the client registry.
    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Returns the connection registry.
    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
