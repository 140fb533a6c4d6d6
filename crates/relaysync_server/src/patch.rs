//! Patch computation between checkpoints.

use crate::error::{ServerError, ServerResult};
use relaysync_protocol::{Patch, PatchOp};
use relaysync_store::{CheckpointId, DocumentId, SnapshotStore, StoreError};
use std::collections::HashMap;
use tracing::warn;

/// Computes the patch transforming `source` state into `dest` state.
///
/// - `dest` of `None` (document with no committed state yet) yields a bare
///   `clear`.
/// - A `source` that is `None` or names a checkpoint the store no longer
///   has yields a full reset: `clear` followed by one `put` per live entry
///   of `dest`. An unresolvable source is a warning, not an error: the
///   client's baseline is simply unknown or expired.
/// - Otherwise the two checkpoints are diffed; `source == dest` yields the
///   empty patch.
///
/// # Errors
///
/// Returns [`ServerError::CorruptState`] if `dest` (or a verified `source`)
/// cannot be located when it is expected to exist.
pub fn compute_patch(
    store: &dyn SnapshotStore,
    doc: &DocumentId,
    source: Option<CheckpointId>,
    dest: Option<CheckpointId>,
) -> ServerResult<Patch> {
    let Some(dest) = dest else {
        return Ok(vec![PatchOp::Clear]);
    };

    let source = match source {
        Some(checkpoint) if store.contains_checkpoint(doc, checkpoint) => Some(checkpoint),
        Some(checkpoint) => {
            warn!(%doc, %checkpoint, "source checkpoint not found, sending reset patch");
            None
        }
        None => None,
    };

    match source {
        None => {
            let mut patch = vec![PatchOp::Clear];
            let entries = store
                .live_entries(doc, dest)
                .map_err(expected_checkpoint)?;
            patch.extend(
                entries
                    .into_iter()
                    .map(|(key, value)| PatchOp::Put { key, value }),
            );
            Ok(patch)
        }
        Some(source) => {
            let changes = store.diff(doc, source, dest).map_err(expected_checkpoint)?;
            Ok(changes
                .into_iter()
                .map(|change| match change.value {
                    Some(value) => PatchOp::Put {
                        key: change.key,
                        value,
                    },
                    None => PatchOp::Del { key: change.key },
                })
                .collect())
        }
    }
}

/// A checkpoint that should exist is missing: lost server state.
fn expected_checkpoint(err: StoreError) -> ServerError {
    match err {
        StoreError::CheckpointNotFound {
            document,
            checkpoint,
        } => ServerError::CorruptState {
            document,
            checkpoint,
        },
        other => ServerError::Store(other),
    }
}

/// Per-fanout patch cache keyed by source checkpoint.
///
/// The poke dispatcher computes the patch from each connected client's
/// baseline to the new head; clients sharing a baseline must trigger only
/// one diff. The memo lives for a single fan-out, so the destination is
/// fixed at construction.
pub struct PatchMemo {
    dest: Option<CheckpointId>,
    cache: HashMap<Option<CheckpointId>, Patch>,
}

impl PatchMemo {
    /// Creates a memo for patches targeting `dest`.
    #[must_use]
    pub fn new(dest: Option<CheckpointId>) -> Self {
        Self {
            dest,
            cache: HashMap::new(),
        }
    }

    /// Returns the patch from `source` to the memo's destination,
    /// computing it at most once per distinct source.
    pub fn patch_for(
        &mut self,
        store: &dyn SnapshotStore,
        doc: &DocumentId,
        source: Option<CheckpointId>,
    ) -> ServerResult<Patch> {
        if let Some(cached) = self.cache.get(&source) {
            return Ok(cached.clone());
        }
        let patch = compute_patch(store, doc, source, self.dest)?;
        self.cache.insert(source, patch.clone());
        Ok(patch)
    }
}
