//! Error types for the sync server.

use relaysync_store::{CheckpointId, DocumentId, StoreError};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
///
/// Already-applied mutations are not an error (they are silently skipped),
/// and a missing or failing mutator is a recorded push outcome, not an
/// error. Everything here either rejects a request before state is touched
/// or aborts it with nothing applied.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Strict lookup of a client id that has never been seen.
    #[error("unknown client: {0}")]
    UnknownClient(String),

    /// A mutation id skipped ahead of the client's applied count.
    ///
    /// The whole push is aborted; the client must resynchronize and
    /// resubmit.
    #[error("mutation {mutation_id} is from the future (expected {expected})")]
    MutationOutOfOrder {
        /// The offending mutation id.
        mutation_id: u64,
        /// The id the server expected next.
        expected: u64,
    },

    /// The pull request's cookie is not a string or null.
    #[error("invalid cookie: {0}")]
    InvalidCookie(String),

    /// A checkpoint that is expected to exist cannot be located.
    ///
    /// This indicates lost or inconsistent server state and requires
    /// operator attention; it is never silently recovered.
    #[error("corrupt state: checkpoint {checkpoint} missing from {document}")]
    CorruptState {
        /// The affected document.
        document: DocumentId,
        /// The missing checkpoint.
        checkpoint: CheckpointId,
    },

    /// Storage-layer error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_) | ServerError::InvalidCookie(_)
        )
    }

    /// Returns true if this is a server error (5xx).
    ///
    /// `MutationOutOfOrder` is reported as a server error on the wire even
    /// though the client resolves it by resyncing; that status is part of
    /// the protocol.
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }
}
