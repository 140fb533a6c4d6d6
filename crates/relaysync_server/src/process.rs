//! Ordered, idempotent mutation application.

use crate::clients::ClientRegistry;
use crate::error::{ServerError, ServerResult};
use crate::mutator::{MutatorRegistry, WriteTransaction};
use relaysync_protocol::PushRequest;
use relaysync_store::{CheckpointId, DocumentId, SnapshotStore};
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a consumed mutation did not take effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// No mutator is registered under the mutation's name.
    MutatorNotFound {
        /// The unresolved name.
        name: String,
    },
    /// The mutator ran and returned an error.
    MutatorFailed {
        /// The mutator's name.
        name: String,
        /// The error it returned.
        message: String,
    },
}

/// A mutation whose id was consumed but whose intent was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationFailure {
    /// The mutation's id.
    pub mutation_id: u64,
    /// What went wrong.
    pub kind: FailureKind,
}

/// Result of a committed push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    /// The checkpoint minted by this push.
    pub checkpoint: CheckpointId,
    /// Mutations applied successfully.
    pub applied: usize,
    /// Already-applied mutations skipped for idempotency.
    pub skipped: usize,
    /// Mutations whose id was consumed without taking effect.
    pub failures: Vec<MutationFailure>,
}

/// Applies ordered mutation batches against the snapshot store.
///
/// One processor serves all documents; the caller serializes access per
/// document (see [`SyncServer`](crate::SyncServer)).
#[derive(Debug)]
pub struct MutationProcessor {
    clients: Arc<ClientRegistry>,
    mutators: Arc<MutatorRegistry>,
}

impl MutationProcessor {
    /// Creates a processor over the given registries.
    pub fn new(clients: Arc<ClientRegistry>, mutators: Arc<MutatorRegistry>) -> Self {
        Self { clients, mutators }
    }

    /// Applies one client's mutation batch and mints a new checkpoint.
    ///
    /// For each mutation, with `expected = last_mutation_id + 1`:
    /// - a stale id (`< expected`) is skipped, keeping at-least-once
    ///   delivery idempotent;
    /// - a future id (`> expected`) aborts the whole push with
    ///   [`ServerError::MutationOutOfOrder`] and nothing applied;
    /// - the expected id consumes: a missing or failing mutator is recorded
    ///   and warned, but `last_mutation_id` still advances. Discarding the
    ///   mutation's intent instead of blocking the client is a deliberate
    ///   policy choice.
    ///
    /// The batch's net effect, the updated client record, and the new
    /// checkpoint become visible together; an aborted push leaves no trace.
    pub fn push(
        &self,
        store: &dyn SnapshotStore,
        doc: &DocumentId,
        request: &PushRequest,
    ) -> ServerResult<PushOutcome> {
        let mut record = self.clients.get_or_default(&request.client_id);
        let mut tx = WriteTransaction::new(store, doc);

        let mut applied = 0;
        let mut skipped = 0;
        let mut failures = Vec::new();

        for mutation in &request.mutations {
            let expected = record.last_mutation_id + 1;

            if mutation.id < expected {
                debug!(
                    client_id = %request.client_id,
                    mutation_id = mutation.id,
                    "mutation already processed, skipping"
                );
                skipped += 1;
                continue;
            }
            if mutation.id > expected {
                // Abort before anything becomes visible; tx is dropped.
                return Err(ServerError::MutationOutOfOrder {
                    mutation_id: mutation.id,
                    expected,
                });
            }

            match self.mutators.get(&mutation.name) {
                None => {
                    warn!(
                        client_id = %request.client_id,
                        mutation_id = mutation.id,
                        name = %mutation.name,
                        "unknown mutator, discarding mutation"
                    );
                    failures.push(MutationFailure {
                        mutation_id: mutation.id,
                        kind: FailureKind::MutatorNotFound {
                            name: mutation.name.clone(),
                        },
                    });
                }
                Some(mutator) => match mutator.apply(&mut tx, &mutation.args) {
                    Ok(()) => applied += 1,
                    Err(message) => {
                        warn!(
                            client_id = %request.client_id,
                            mutation_id = mutation.id,
                            name = %mutation.name,
                            %message,
                            "mutator failed, discarding mutation"
                        );
                        failures.push(MutationFailure {
                            mutation_id: mutation.id,
                            kind: FailureKind::MutatorFailed {
                                name: mutation.name.clone(),
                                message,
                            },
                        });
                    }
                },
            }

            record.last_mutation_id = expected;
        }

        // One version per push batch; the checkpoint succeeds the prior
        // head and the prior head stays diffable.
        let version = store.head_version(doc) + 1;
        tx.commit(version);
        self.clients.set(record);
        let checkpoint = store.commit_checkpoint(doc);

        Ok(PushOutcome {
            checkpoint,
            applied,
            skipped,
            failures,
        })
    }
}
