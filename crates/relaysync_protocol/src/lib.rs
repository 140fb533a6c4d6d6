//! # RelaySync Protocol
//!
//! Sync protocol types and JSON wire format for RelaySync.
//!
//! This crate defines the messages exchanged between clients and the sync
//! server:
//! - Push: an ordered batch of named mutations from one client
//! - Pull: a request for "what changed since cookie C" and its patch reply
//! - Poke: an unsolicited server-to-client delta notification
//!
//! All types serialize to the client-visible JSON wire format (camelCase
//! field names such as `clientID` and `lastMutationID`). Values carried by
//! mutations and patches are opaque [`serde_json::Value`]s; the protocol
//! never interprets them.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod messages;
mod patch;

pub use messages::{Mutation, Poke, PullRequest, PullResponse, PushRequest};
pub use patch::{Patch, PatchOp};
