//! Persistent per-client records.

use crate::error::{ServerError, ServerResult};
use parking_lot::RwLock;
use relaysync_store::CheckpointId;
use std::collections::HashMap;

/// Client identifier, assigned by the client itself.
pub type ClientId = String;

/// Per-client sync state.
///
/// One record per client id, created implicitly on first reference and
/// never deleted. `last_mutation_id` is advanced only by the mutation
/// processor; `last_checkpoint` by the pull and poke paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    /// The client's id.
    pub id: ClientId,
    /// Highest mutation id applied (or consumed) for this client.
    pub last_mutation_id: u64,
    /// The checkpoint last delivered to this client, if any.
    pub last_checkpoint: Option<CheckpointId>,
}

impl ClientRecord {
    /// Creates the implicit default record for a first-seen client.
    pub fn new(id: impl Into<ClientId>) -> Self {
        Self {
            id: id.into(),
            last_mutation_id: 0,
            last_checkpoint: None,
        }
    }
}

/// Process-wide registry of client records.
///
/// Individual record fields need no extra locking: all mutation of a given
/// client's record happens while holding that client's document's critical
/// section.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    records: RwLock<HashMap<ClientId, ClientRecord>>,
}

impl ClientRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for a client, or the implicit default for a
    /// first-seen id.
    ///
    /// The default is not persisted; call [`set`] to store an updated
    /// record.
    ///
    /// [`set`]: ClientRegistry::set
    pub fn get_or_default(&self, id: &str) -> ClientRecord {
        self.records
            .read()
            .get(id)
            .cloned()
            .unwrap_or_else(|| ClientRecord::new(id))
    }

    /// Returns the record for a client, failing loudly on an unknown id.
    pub fn must_get(&self, id: &str) -> ServerResult<ClientRecord> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ServerError::UnknownClient(id.to_string()))
    }

    /// Returns records for a set of ids, all-or-nothing.
    ///
    /// If any id is unknown the whole lookup fails; no partial map is
    /// returned.
    pub fn must_get_many(&self, ids: &[ClientId]) -> ServerResult<HashMap<ClientId, ClientRecord>> {
        let records = self.records.read();
        let mut result = HashMap::with_capacity(ids.len());
        for id in ids {
            let record = records
                .get(id)
                .cloned()
                .ok_or_else(|| ServerError::UnknownClient(id.clone()))?;
            result.insert(id.clone(), record);
        }
        Ok(result)
    }

    /// Stores a record, creating or replacing it.
    pub fn set(&self, record: ClientRecord) {
        self.records.write().insert(record.id.clone(), record);
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_seen_client_defaults() {
        let registry = ClientRegistry::new();
        let record = registry.get_or_default("c1");
        assert_eq!(record.id, "c1");
        assert_eq!(record.last_mutation_id, 0);
        assert_eq!(record.last_checkpoint, None);
        // The default is not persisted.
        assert!(registry.is_empty());
    }

    #[test]
    fn set_then_get_round_trips() {
        let registry = ClientRegistry::new();
        let mut record = ClientRecord::new("c1");
        record.last_mutation_id = 4;
        record.last_checkpoint = Some(CheckpointId::new(2));
        registry.set(record.clone());

        assert_eq!(registry.get_or_default("c1"), record);
        assert_eq!(registry.must_get("c1").unwrap(), record);
    }

    #[test]
    fn must_get_unknown_fails() {
        let registry = ClientRegistry::new();
        assert!(matches!(
            registry.must_get("nobody"),
            Err(ServerError::UnknownClient(_))
        ));
    }

    #[test]
    fn must_get_many_is_all_or_nothing() {
        let registry = ClientRegistry::new();
        registry.set(ClientRecord::new("a"));
        registry.set(ClientRecord::new("b"));

        let ok = registry
            .must_get_many(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(ok.len(), 2);

        let err = registry.must_get_many(&["a".to_string(), "missing".to_string()]);
        assert!(matches!(err, Err(ServerError::UnknownClient(id)) if id == "missing"));
    }
}
