//! Named mutation handlers and their transactional view.

use relaysync_store::{DocumentId, SnapshotStore};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// A buffered transactional view over one document.
///
/// Mutators read through the overlay to the underlying store, but all
/// writes are staged in memory. Nothing becomes visible until
/// [`commit`](WriteTransaction::commit); dropping the transaction discards
/// every staged operation, so an aborted push leaves the document exactly
/// as it was.
pub struct WriteTransaction<'a> {
    store: &'a dyn SnapshotStore,
    doc: &'a DocumentId,
    /// Staged operations: `Some` is an upsert, `None` a soft delete.
    staged: BTreeMap<String, Option<Value>>,
}

impl<'a> WriteTransaction<'a> {
    /// Creates a transaction over one document.
    pub fn new(store: &'a dyn SnapshotStore, doc: &'a DocumentId) -> Self {
        Self {
            store,
            doc,
            staged: BTreeMap::new(),
        }
    }

    /// Returns the value for a key, observing staged writes.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.staged.get(key) {
            Some(staged) => staged.clone(),
            None => self.store.get(self.doc, key).0,
        }
    }

    /// Returns true if the key currently resolves to a value.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns true if the document holds no live keys, observing staged
    /// writes and deletes.
    pub fn is_empty(&self) -> bool {
        if self.staged.values().any(Option::is_some) {
            return false;
        }
        // Every staged entry is a delete at this point; a stored key
        // survives only if it is not staged for deletion.
        self.store
            .live_keys(self.doc)
            .iter()
            .all(|key| self.staged.contains_key(key))
    }

    /// Stages an upsert.
    pub fn put(&mut self, key: impl Into<String>, value: Value) {
        self.staged.insert(key.into(), Some(value));
    }

    /// Stages a soft delete.
    ///
    /// Returns true if the key resolved to a value before the delete.
    pub fn del(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        let had = self.has(&key);
        if had {
            self.staged.insert(key, None);
        }
        had
    }

    /// Returns the number of staged operations.
    #[must_use]
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Applies all staged operations to the store at the given version.
    pub fn commit(self, version: u64) {
        for (key, staged) in self.staged {
            match staged {
                Some(value) => self.store.put(self.doc, &key, value, version),
                None => self.store.del(self.doc, &key, version),
            }
        }
    }
}

/// A named mutation handler.
///
/// Mutators hold the business logic of the system. They receive a
/// transactional view of the pushing client's document plus the mutation's
/// opaque arguments. A returned error is recorded against the push outcome
/// but never aborts the batch.
pub trait Mutator: Send + Sync {
    /// Applies the mutation against the transactional view.
    fn apply(&self, tx: &mut WriteTransaction<'_>, args: &Value) -> Result<(), String>;
}

impl<F> Mutator for F
where
    F: Fn(&mut WriteTransaction<'_>, &Value) -> Result<(), String> + Send + Sync,
{
    fn apply(&self, tx: &mut WriteTransaction<'_>, args: &Value) -> Result<(), String> {
        self(tx, args)
    }
}

/// A statically registered table of named mutators.
///
/// Populated once at startup; a lookup miss at push time is a handled
/// branch, never a crash.
#[derive(Default)]
pub struct MutatorRegistry {
    mutators: HashMap<String, Box<dyn Mutator>>,
}

impl MutatorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mutator under a name, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, mutator: impl Mutator + 'static) {
        self.mutators.insert(name.into(), Box::new(mutator));
    }

    /// Looks up a mutator by name.
    pub fn get(&self, name: &str) -> Option<&dyn Mutator> {
        self.mutators.get(name).map(|m| m.as_ref())
    }

    /// Returns the registered names, for startup validation.
    pub fn names(&self) -> Vec<&str> {
        self.mutators.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for MutatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutatorRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaysync_store::MemoryStore;
    use serde_json::json;

    fn doc() -> DocumentId {
        DocumentId::new("d1")
    }

    #[test]
    fn reads_observe_staged_writes() {
        let store = MemoryStore::new();
        let doc = doc();
        store.put(&doc, "a", json!("stored"), 1);

        let mut tx = WriteTransaction::new(&store, &doc);
        assert_eq!(tx.get("a"), Some(json!("stored")));

        tx.put("a", json!("staged"));
        assert_eq!(tx.get("a"), Some(json!("staged")));
        // Store is untouched until commit.
        assert_eq!(store.get(&doc, "a"), (Some(json!("stored")), 1));
    }

    #[test]
    fn del_reports_prior_liveness() {
        let store = MemoryStore::new();
        let doc = doc();
        store.put(&doc, "a", json!(1), 1);

        let mut tx = WriteTransaction::new(&store, &doc);
        assert!(tx.del("a"));
        assert!(!tx.has("a"));
        assert!(!tx.del("never-written"));
        assert_eq!(tx.staged_len(), 1);
    }

    #[test]
    fn is_empty_observes_staged_writes() {
        let store = MemoryStore::new();
        let doc = doc();

        let mut tx = WriteTransaction::new(&store, &doc);
        assert!(tx.is_empty());

        tx.put("a", json!(1));
        assert!(!tx.is_empty());
    }

    #[test]
    fn is_empty_after_staged_delete_of_last_key() {
        let store = MemoryStore::new();
        let doc = doc();
        store.put(&doc, "only", json!(1), 1);
        store.put(&doc, "gone", json!(2), 1);
        store.del(&doc, "gone", 2);

        let mut tx = WriteTransaction::new(&store, &doc);
        assert!(!tx.is_empty());
        tx.del("only");
        assert!(tx.is_empty());
    }

    #[test]
    fn commit_applies_staged_operations_at_version() {
        let store = MemoryStore::new();
        let doc = doc();
        store.put(&doc, "old", json!(1), 1);

        let mut tx = WriteTransaction::new(&store, &doc);
        tx.put("new", json!(2));
        tx.del("old");
        tx.commit(2);

        assert_eq!(store.get(&doc, "new"), (Some(json!(2)), 2));
        assert_eq!(store.get(&doc, "old"), (None, 2));
    }

    #[test]
    fn drop_discards_staged_operations() {
        let store = MemoryStore::new();
        let doc = doc();
        {
            let mut tx = WriteTransaction::new(&store, &doc);
            tx.put("a", json!(1));
        }
        assert_eq!(store.get(&doc, "a"), (None, 0));
        assert_eq!(store.head_version(&doc), 0);
    }

    #[test]
    fn registry_dispatches_closures() {
        let mut registry = MutatorRegistry::new();
        registry.register("incr", |tx: &mut WriteTransaction<'_>, args: &Value| {
            let by = args.as_i64().ok_or("expected integer args")?;
            let current = tx.get("counter").and_then(|v| v.as_i64()).unwrap_or(0);
            tx.put("counter", json!(current + by));
            Ok(())
        });

        assert!(registry.get("incr").is_some());
        assert!(registry.get("missing").is_none());

        let store = MemoryStore::new();
        let doc = doc();
        let mut tx = WriteTransaction::new(&store, &doc);
        registry
            .get("incr")
            .unwrap()
            .apply(&mut tx, &json!(5))
            .unwrap();
        assert_eq!(tx.get("counter"), Some(json!(5)));
    }
}
