//! Pull handling: "what changed since cookie C".

use crate::clients::ClientRegistry;
use crate::cookie;
use crate::error::ServerResult;
use crate::patch::compute_patch;
use relaysync_protocol::{PullRequest, PullResponse};
use relaysync_store::{DocumentId, SnapshotStore};
use std::sync::Arc;
use tracing::warn;

/// Answers pull requests with a patch from the client's cookie to head.
#[derive(Debug)]
pub struct PullHandler {
    clients: Arc<ClientRegistry>,
}

impl PullHandler {
    /// Creates a pull handler over the client registry.
    pub fn new(clients: Arc<ClientRegistry>) -> Self {
        Self { clients }
    }

    /// Computes the delta from the requested cookie to the current head.
    ///
    /// First-seen clients resolve to the implicit zero-state record, so an
    /// unknown client can pull a full snapshot without prior registration.
    /// The client's `last_checkpoint` is set to head before responding, so
    /// a later poke computes from the post-pull baseline.
    pub fn pull(
        &self,
        store: &dyn SnapshotStore,
        doc: &DocumentId,
        request: &PullRequest,
    ) -> ServerResult<PullResponse> {
        let source = match &request.cookie {
            None => None,
            Some(raw) => {
                let parsed = cookie::parse(raw);
                if parsed.is_none() {
                    warn!(%doc, cookie = %raw, "unparseable cookie, sending reset patch");
                }
                parsed
            }
        };

        let mut record = self.clients.get_or_default(&request.client_id);
        let head = store.head_checkpoint(doc);
        let patch = compute_patch(store, doc, source, head)?;

        record.last_checkpoint = head;
        self.clients.set(record.clone());

        Ok(PullResponse {
            cookie: cookie::encode(head),
            last_mutation_id: record.last_mutation_id,
            patch,
        })
    }
}
