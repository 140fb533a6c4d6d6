//! In-memory snapshot store.

use crate::error::{StoreError, StoreResult};
use crate::store::{EntryChange, SnapshotStore};
use crate::types::{CheckpointId, DocumentId};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// One key's state within a document.
#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    version: u64,
    deleted: bool,
}

/// Per-document state: live entries plus checkpoint history.
#[derive(Debug, Default)]
struct DocumentState {
    entries: BTreeMap<String, Entry>,
    /// Live-value snapshots, one per minted checkpoint.
    checkpoints: BTreeMap<CheckpointId, BTreeMap<String, Value>>,
    head: Option<CheckpointId>,
}

impl DocumentState {
    fn live_snapshot(&self) -> BTreeMap<String, Value> {
        self.entries
            .iter()
            .filter(|(_, e)| !e.deleted)
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }
}

/// An in-memory snapshot store.
///
/// This store keeps all documents, entries, and checkpoint history in
/// memory. Checkpoints are full copies of a document's live state, which
/// keeps diffing trivially correct at the cost of memory; it is suitable
/// for tests and as the reference backend behind the sync engine.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use relaysync_store::{DocumentId, MemoryStore, SnapshotStore};
///
/// let store = MemoryStore::new();
/// let doc = DocumentId::new("d1");
/// store.put(&doc, "k", "v".into(), 1);
/// let head = store.commit_checkpoint(&doc);
/// assert!(store.contains_checkpoint(&doc, head));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<DocumentId, DocumentState>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents with any recorded state.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.docs.read().len()
    }

    fn snapshot_at(
        &self,
        doc: &DocumentId,
        checkpoint: CheckpointId,
    ) -> StoreResult<BTreeMap<String, Value>> {
        let docs = self.docs.read();
        docs.get(doc)
            .and_then(|state| state.checkpoints.get(&checkpoint))
            .cloned()
            .ok_or_else(|| StoreError::CheckpointNotFound {
                document: doc.clone(),
                checkpoint,
            })
    }
}

impl SnapshotStore for MemoryStore {
    fn get(&self, doc: &DocumentId, key: &str) -> (Option<Value>, u64) {
        let docs = self.docs.read();
        match docs.get(doc).and_then(|state| state.entries.get(key)) {
            Some(entry) if entry.deleted => (None, entry.version),
            Some(entry) => (Some(entry.value.clone()), entry.version),
            None => (None, 0),
        }
    }

    fn put(&self, doc: &DocumentId, key: &str, value: Value, version: u64) {
        let mut docs = self.docs.write();
        let state = docs.entry(doc.clone()).or_default();
        state.entries.insert(
            key.to_string(),
            Entry {
                value,
                version,
                deleted: false,
            },
        );
    }

    fn del(&self, doc: &DocumentId, key: &str, version: u64) {
        let mut docs = self.docs.write();
        let state = docs.entry(doc.clone()).or_default();
        // Soft delete; a key that was never written stays unrecorded.
        if let Some(entry) = state.entries.get_mut(key) {
            entry.deleted = true;
            entry.version = version;
        }
    }

    fn live_keys(&self, doc: &DocumentId) -> Vec<String> {
        let docs = self.docs.read();
        docs.get(doc)
            .map(|state| {
                state
                    .entries
                    .iter()
                    .filter(|(_, e)| !e.deleted)
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn head_version(&self, doc: &DocumentId) -> u64 {
        let docs = self.docs.read();
        docs.get(doc)
            .map(|state| {
                state
                    .entries
                    .values()
                    .map(|e| e.version)
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    fn head_checkpoint(&self, doc: &DocumentId) -> Option<CheckpointId> {
        self.docs.read().get(doc).and_then(|state| state.head)
    }

    fn commit_checkpoint(&self, doc: &DocumentId) -> CheckpointId {
        let mut docs = self.docs.write();
        let state = docs.entry(doc.clone()).or_default();
        let next = state
            .head
            .map(CheckpointId::next)
            .unwrap_or(CheckpointId::new(1));
        let snapshot = state.live_snapshot();
        state.checkpoints.insert(next, snapshot);
        state.head = Some(next);
        next
    }

    fn contains_checkpoint(&self, doc: &DocumentId, checkpoint: CheckpointId) -> bool {
        self.docs
            .read()
            .get(doc)
            .is_some_and(|state| state.checkpoints.contains_key(&checkpoint))
    }

    fn live_entries(
        &self,
        doc: &DocumentId,
        checkpoint: CheckpointId,
    ) -> StoreResult<Vec<(String, Value)>> {
        let snapshot = self.snapshot_at(doc, checkpoint)?;
        Ok(snapshot.into_iter().collect())
    }

    fn diff(
        &self,
        doc: &DocumentId,
        from: CheckpointId,
        to: CheckpointId,
    ) -> StoreResult<Vec<EntryChange>> {
        let source = self.snapshot_at(doc, from)?;
        let dest = self.snapshot_at(doc, to)?;

        let mut changes = Vec::new();
        for (key, value) in &dest {
            if source.get(key) != Some(value) {
                changes.push(EntryChange {
                    key: key.clone(),
                    value: Some(value.clone()),
                });
            }
        }
        for key in source.keys() {
            if !dest.contains_key(key) {
                changes.push(EntryChange {
                    key: key.clone(),
                    value: None,
                });
            }
        }
        Ok(changes)
    }
}
