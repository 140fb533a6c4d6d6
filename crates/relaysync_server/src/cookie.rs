//! Cookie encoding.
//!
//! A cookie is the client-visible name of a checkpoint: an opaque string on
//! the wire, a decimal [`CheckpointId`] on the server.

use relaysync_store::CheckpointId;

/// Encodes a checkpoint reference as a wire cookie.
pub fn encode(checkpoint: Option<CheckpointId>) -> Option<String> {
    checkpoint.map(|c| c.as_u64().to_string())
}

/// Parses a wire cookie back into a checkpoint reference.
///
/// Returns `None` for a cookie that does not name any checkpoint; the
/// caller treats that the same as an unknown checkpoint (full reset), not
/// as an error.
pub fn parse(cookie: &str) -> Option<CheckpointId> {
    cookie.parse::<u64>().ok().map(CheckpointId::new)
}
