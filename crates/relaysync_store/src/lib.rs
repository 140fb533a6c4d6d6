//! # RelaySync Store
//!
//! Snapshot store trait and in-memory implementation for RelaySync.
//!
//! This crate provides the versioned key/value space the sync engine runs
//! against. Each document is an independent namespace of string keys holding
//! opaque JSON values. Writes and soft deletes carry a per-document version;
//! committing mints a checkpoint that captures the full live state of the
//! document and can later be diffed against another checkpoint.
//!
//! ## Design Principles
//!
//! - Documents are fully independent; versions and checkpoints are never
//!   compared across documents
//! - Deletes are soft: the key stays resolvable with the delete's version
//! - Checkpoints are immutable once minted and form a total order per
//!   document
//! - Stores must be `Send + Sync` for concurrent access
//!
//! ## Example
//!
//! ```rust
//! use relaysync_store::{DocumentId, MemoryStore, SnapshotStore};
//!
//! let store = MemoryStore::new();
//! let doc = DocumentId::new("doc-1");
//! store.put(&doc, "greeting", "hello".into(), 1);
//! let (value, version) = store.get(&doc, "greeting");
//! assert_eq!(value, Some("hello".into()));
//! assert_eq!(version, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod store;
mod types;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use store::{EntryChange, SnapshotStore};
pub use types::{CheckpointId, DocumentId};
