//! Error types for snapshot store operations.

use crate::types::{CheckpointId, DocumentId};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during snapshot store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced checkpoint does not exist in the document's history.
    #[error("checkpoint {checkpoint} not found in {document}")]
    CheckpointNotFound {
        /// The document whose history was searched.
        document: DocumentId,
        /// The missing checkpoint.
        checkpoint: CheckpointId,
    },

    /// The store's internal state is inconsistent.
    #[error("store corrupted: {0}")]
    Corrupted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StoreError::CheckpointNotFound {
            document: DocumentId::new("d1"),
            checkpoint: CheckpointId::new(4),
        };
        let msg = err.to_string();
        assert!(msg.contains("ckpt:4"));
        assert!(msg.contains("doc:d1"));
    }
}
