//! Snapshot store trait definition.

use crate::error::StoreResult;
use crate::types::{CheckpointId, DocumentId};
use serde_json::Value;

/// A key's state change between two checkpoints.
///
/// Produced by [`SnapshotStore::diff`]. A `value` of `None` means the key is
/// live in the source checkpoint but absent (or deleted) in the destination.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryChange {
    /// The affected key.
    pub key: String,
    /// The destination value, or `None` if the key was removed.
    pub value: Option<Value>,
}

/// A versioned key/value space scoped per document.
///
/// The snapshot store is the sync engine's system of record. Keys hold
/// opaque JSON values; the store never interprets them. Every write and
/// soft delete carries a caller-supplied version, and the store can capture
/// the full live state of a document as an immutable checkpoint and diff
/// any two checkpoints of the same document.
///
/// # Invariants
///
/// - Versions are monotonically non-decreasing per document; the head
///   version is the maximum version across all entries, 0 when empty
/// - Deletes are soft: a deleted key still reads back its delete version
/// - Checkpoints form a total order per document; once minted they are
///   immutable and remain resolvable for diffs
/// - Documents are fully independent
///
/// # Implementors
///
/// - [`super::MemoryStore`] - In-memory reference implementation
pub trait SnapshotStore: Send + Sync {
    /// Returns the value and version for a key.
    ///
    /// A key that was never written reads as `(None, 0)`. A soft-deleted
    /// key reads as `None` paired with the version of the delete.
    fn get(&self, doc: &DocumentId, key: &str) -> (Option<Value>, u64);

    /// Writes a value at the given version, clearing any deleted flag.
    fn put(&self, doc: &DocumentId, key: &str, value: Value, version: u64);

    /// Soft-deletes a key at the given version.
    ///
    /// Deleting a key that was never written is a no-op.
    fn del(&self, doc: &DocumentId, key: &str, version: u64);

    /// Returns the maximum version across all entries of a document.
    ///
    /// Returns 0 for an empty document. Writes to one document never change
    /// another document's head version.
    fn head_version(&self, doc: &DocumentId) -> u64;

    /// Returns the keys currently live (written and not soft-deleted) in a
    /// document, in stable key order.
    fn live_keys(&self, doc: &DocumentId) -> Vec<String>;

    /// Returns the document's current head checkpoint.
    ///
    /// Returns `None` before the first [`commit_checkpoint`] call.
    ///
    /// [`commit_checkpoint`]: SnapshotStore::commit_checkpoint
    fn head_checkpoint(&self, doc: &DocumentId) -> Option<CheckpointId>;

    /// Captures the current live state as a new checkpoint.
    ///
    /// The new checkpoint succeeds the previous head; the previous head
    /// stays in the document's history for future diffs.
    fn commit_checkpoint(&self, doc: &DocumentId) -> CheckpointId;

    /// Returns true if the checkpoint exists in the document's history.
    fn contains_checkpoint(&self, doc: &DocumentId, checkpoint: CheckpointId) -> bool;

    /// Returns the live (non-deleted) entries at a checkpoint, in stable
    /// key order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CheckpointNotFound`] if the checkpoint is not
    /// in the document's history.
    ///
    /// [`StoreError::CheckpointNotFound`]: crate::StoreError::CheckpointNotFound
    fn live_entries(
        &self,
        doc: &DocumentId,
        checkpoint: CheckpointId,
    ) -> StoreResult<Vec<(String, Value)>>;

    /// Diffs two checkpoints of the same document.
    ///
    /// Returns one [`EntryChange`] per key whose live value differs between
    /// `from` and `to`: `Some(value)` for keys added or changed in `to`,
    /// `None` for keys live in `from` but absent from `to`. Diffing a
    /// checkpoint against itself returns no changes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CheckpointNotFound`] if either checkpoint is
    /// not in the document's history.
    ///
    /// [`StoreError::CheckpointNotFound`]: crate::StoreError::CheckpointNotFound
    fn diff(
        &self,
        doc: &DocumentId,
        from: CheckpointId,
        to: CheckpointId,
    ) -> StoreResult<Vec<EntryChange>>;
}
