//! # RelaySync Server
//!
//! Server-of-record sync engine for RelaySync.
//!
//! This crate provides:
//! - Ordered, idempotent mutation application per client (push)
//! - Minimal state deltas between checkpoints (pull)
//! - Low-latency delta fan-out to connected clients (poke)
//! - Per-client records and per-client live connections
//! - A framework-agnostic HTTP request boundary
//!
//! # Architecture
//!
//! Clients hold a local replica, apply mutations speculatively, and
//! reconcile with this server of record. The server applies each client's
//! mutations in order against a [`SnapshotStore`], mints a checkpoint per
//! push, and fans the resulting delta out to every connected client,
//! computing at most one diff per distinct client baseline.
//!
//! Business logic lives in externally registered [`Mutator`]s; the engine
//! only enforces ordering, idempotency, versioning, and delta computation.
//!
//! # Key Invariants
//!
//! - Mutation ids are a per-client strictly increasing sequence; a stale id
//!   is skipped, a future id aborts the whole push
//! - Each push mints a checkpoint succeeding the document's previous head
//! - All operations on one document are serialized; documents are
//!   independent
//! - An aborted request leaves the document exactly as it was
//!
//! [`SnapshotStore`]: relaysync_store::SnapshotStore

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect().
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod clients;
mod config;
mod connection;
mod cookie;
mod dispatch;
mod error;
mod http;
mod mutator;
mod patch;
mod process;
mod pull;
mod server;

pub use clients::{ClientId, ClientRecord, ClientRegistry};
pub use config::ServerConfig;
pub use connection::{Connection, ConnectionRegistry, MockConnection};
pub use dispatch::PokeDispatcher;
pub use error::{ServerError, ServerResult};
pub use http::HttpResponse;
pub use mutator::{Mutator, MutatorRegistry, WriteTransaction};
pub use patch::{compute_patch, PatchMemo};
pub use process::{FailureKind, MutationFailure, MutationProcessor, PushOutcome};
pub use pull::PullHandler;
pub use server::SyncServer;
