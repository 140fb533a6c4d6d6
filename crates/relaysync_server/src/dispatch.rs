//! Poke fan-out after a committed push.

use crate::clients::ClientRegistry;
use crate::connection::ConnectionRegistry;
use crate::cookie;
use crate::error::ServerResult;
use crate::patch::PatchMemo;
use relaysync_protocol::{Poke, PullResponse};
use relaysync_store::{CheckpointId, DocumentId, SnapshotStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fans deltas out to every live connection after a push commits.
#[derive(Debug)]
pub struct PokeDispatcher {
    clients: Arc<ClientRegistry>,
    connections: Arc<ConnectionRegistry>,
}

impl PokeDispatcher {
    /// Creates a dispatcher over the client and connection registries.
    pub fn new(clients: Arc<ClientRegistry>, connections: Arc<ConnectionRegistry>) -> Self {
        Self {
            clients,
            connections,
        }
    }

    /// Pokes every connection registered for the document's clients.
    ///
    /// Closed connections are pruned lazily. Patches are memoized per
    /// source checkpoint, so clients sharing a baseline trigger exactly one
    /// diff. Delivery is fire-and-forget: a failed send is warned and
    /// skipped, and the client's baseline is advanced to the new head
    /// optimistically, before any acknowledgment. A client whose delivery
    /// was actually lost recovers by re-pulling.
    ///
    /// Returns the number of pokes handed to connections.
    pub fn poke(
        &self,
        store: &dyn SnapshotStore,
        doc: &DocumentId,
        new_head: CheckpointId,
    ) -> ServerResult<usize> {
        let targets = self.connections.snapshot(doc);
        info!(%doc, %new_head, connections = targets.len(), "sending pokes");

        let mut memo = PatchMemo::new(Some(new_head));
        let mut delivered = 0;

        for (client_id, connection) in targets {
            if connection.is_closed() {
                debug!(%client_id, "pruning closed connection");
                self.connections.unregister(&client_id);
                continue;
            }

            let mut record = self.clients.get_or_default(&client_id);
            let patch = memo.patch_for(store, doc, record.last_checkpoint)?;
            let poke = Poke {
                base_cookie: cookie::encode(record.last_checkpoint),
                response: PullResponse {
                    cookie: cookie::encode(Some(new_head)),
                    last_mutation_id: record.last_mutation_id,
                    patch,
                },
            };
            let message = match serde_json::to_string(&poke) {
                Ok(message) => message,
                Err(err) => {
                    warn!(%client_id, %err, "failed to encode poke, skipping");
                    continue;
                }
            };

            if let Err(err) = connection.send(&message) {
                warn!(%client_id, %err, "poke delivery failed");
            } else {
                delivered += 1;
            }

            // Optimistic: advance the baseline before any delivery ack.
            record.last_checkpoint = Some(new_head);
            self.clients.set(record);
        }

        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientRecord;
    use crate::connection::{Connection, MockConnection};
    use relaysync_protocol::PatchOp;
    use relaysync_store::{EntryChange, MemoryStore, StoreResult};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store wrapper that counts diff computations.
    struct CountingStore {
        inner: MemoryStore,
        diffs: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                diffs: AtomicUsize::new(0),
            }
        }

        fn diff_count(&self) -> usize {
            self.diffs.load(Ordering::SeqCst)
        }
    }

    impl SnapshotStore for CountingStore {
        fn get(&self, doc: &DocumentId, key: &str) -> (Option<Value>, u64) {
            self.inner.get(doc, key)
        }

        fn put(&self, doc: &DocumentId, key: &str, value: Value, version: u64) {
            self.inner.put(doc, key, value, version);
        }

        fn del(&self, doc: &DocumentId, key: &str, version: u64) {
            self.inner.del(doc, key, version);
        }

        fn live_keys(&self, doc: &DocumentId) -> Vec<String> {
            self.inner.live_keys(doc)
        }

        fn head_version(&self, doc: &DocumentId) -> u64 {
            self.inner.head_version(doc)
        }

        fn head_checkpoint(&self, doc: &DocumentId) -> Option<CheckpointId> {
            self.inner.head_checkpoint(doc)
        }

        fn commit_checkpoint(&self, doc: &DocumentId) -> CheckpointId {
            self.inner.commit_checkpoint(doc)
        }

        fn contains_checkpoint(&self, doc: &DocumentId, checkpoint: CheckpointId) -> bool {
            self.inner.contains_checkpoint(doc, checkpoint)
        }

        fn live_entries(
            &self,
            doc: &DocumentId,
            checkpoint: CheckpointId,
        ) -> StoreResult<Vec<(String, Value)>> {
            self.inner.live_entries(doc, checkpoint)
        }

        fn diff(
            &self,
            doc: &DocumentId,
            from: CheckpointId,
            to: CheckpointId,
        ) -> StoreResult<Vec<EntryChange>> {
            self.diffs.fetch_add(1, Ordering::SeqCst);
            self.inner.diff(doc, from, to)
        }
    }

    struct Fixture {
        dispatcher: PokeDispatcher,
        clients: Arc<ClientRegistry>,
        connections: Arc<ConnectionRegistry>,
        store: CountingStore,
        doc: DocumentId,
    }

    fn fixture() -> Fixture {
        let clients = Arc::new(ClientRegistry::new());
        let connections = Arc::new(ConnectionRegistry::new());
        Fixture {
            dispatcher: PokeDispatcher::new(Arc::clone(&clients), Arc::clone(&connections)),
            clients,
            connections,
            store: CountingStore::new(),
            doc: DocumentId::new("d1"),
        }
    }

    fn connect(f: &Fixture, client_id: &str) -> Arc<MockConnection> {
        let conn = Arc::new(MockConnection::new());
        f.connections.register(
            f.doc.clone(),
            client_id.to_string(),
            Arc::clone(&conn) as Arc<dyn Connection>,
        );
        conn
    }

    fn set_baseline(f: &Fixture, client_id: &str, checkpoint: Option<CheckpointId>) {
        let mut record = ClientRecord::new(client_id);
        record.last_checkpoint = checkpoint;
        f.clients.set(record);
    }

    #[test]
    fn each_client_gets_patch_for_its_own_baseline() {
        let f = fixture();
        f.store.put(&f.doc, "a", json!(1), 1);
        let x = f.store.commit_checkpoint(&f.doc);
        f.store.put(&f.doc, "b", json!(2), 2);
        let y = f.store.commit_checkpoint(&f.doc);
        f.store.put(&f.doc, "c", json!(3), 3);
        let z = f.store.commit_checkpoint(&f.doc);

        let conn_a = connect(&f, "a");
        let conn_b = connect(&f, "b");
        set_baseline(&f, "a", Some(x));
        set_baseline(&f, "b", Some(y));

        let delivered = f.dispatcher.poke(&f.store, &f.doc, z).unwrap();
        assert_eq!(delivered, 2);

        let poke_a: Poke = serde_json::from_str(&conn_a.sent()[0]).unwrap();
        assert_eq!(poke_a.base_cookie, cookie::encode(Some(x)));
        assert_eq!(poke_a.response.patch.len(), 2);

        let poke_b: Poke = serde_json::from_str(&conn_b.sent()[0]).unwrap();
        assert_eq!(poke_b.base_cookie, cookie::encode(Some(y)));
        assert_eq!(poke_b.response.patch, vec![PatchOp::put("c", json!(3))]);

        // Distinct baselines: one diff each.
        assert_eq!(f.store.diff_count(), 2);
    }

    #[test]
    fn shared_baseline_triggers_one_diff() {
        let f = fixture();
        f.store.put(&f.doc, "a", json!(1), 1);
        let x = f.store.commit_checkpoint(&f.doc);
        f.store.put(&f.doc, "b", json!(2), 2);
        let z = f.store.commit_checkpoint(&f.doc);

        for id in ["a", "b", "c"] {
            connect(&f, id);
            set_baseline(&f, id, Some(x));
        }

        let delivered = f.dispatcher.poke(&f.store, &f.doc, z).unwrap();
        assert_eq!(delivered, 3);
        assert_eq!(f.store.diff_count(), 1);
    }

    #[test]
    fn baseline_advances_optimistically_even_on_send_failure() {
        let f = fixture();
        f.store.put(&f.doc, "a", json!(1), 1);
        let z = f.store.commit_checkpoint(&f.doc);

        let conn = connect(&f, "a");
        conn.set_fail_sends(true);

        let delivered = f.dispatcher.poke(&f.store, &f.doc, z).unwrap();
        assert_eq!(delivered, 0);
        assert_eq!(
            f.clients.must_get("a").unwrap().last_checkpoint,
            Some(z)
        );
        // Still registered: a failed send is not a closed connection.
        assert_eq!(f.connections.len(), 1);
    }

    #[test]
    fn closed_connections_are_pruned_and_skipped() {
        let f = fixture();
        let z = f.store.commit_checkpoint(&f.doc);

        let open = connect(&f, "open");
        let closed = connect(&f, "closed");
        closed.close();

        let delivered = f.dispatcher.poke(&f.store, &f.doc, z).unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(open.sent().len(), 1);
        assert!(closed.sent().is_empty());
        assert_eq!(f.connections.len(), 1);
        // The pruned client's record is untouched.
        assert!(f.clients.must_get("closed").is_err());
    }

    #[test]
    fn connections_on_other_documents_are_not_poked() {
        let f = fixture();
        let z = f.store.commit_checkpoint(&f.doc);

        let other_conn = Arc::new(MockConnection::new());
        f.connections.register(
            DocumentId::new("other"),
            "elsewhere".to_string(),
            Arc::clone(&other_conn) as Arc<dyn Connection>,
        );

        let delivered = f.dispatcher.poke(&f.store, &f.doc, z).unwrap();
        assert_eq!(delivered, 0);
        assert!(other_conn.sent().is_empty());
    }
}
