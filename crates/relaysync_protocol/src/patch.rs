//! Patch operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An ordered sequence of operations transforming one replica state into
/// another.
pub type Patch = Vec<PatchOp>;

/// A single patch operation.
///
/// A `clear`, when present, is always the first operation of a patch and
/// tells the client to discard its entire prior replica before applying the
/// puts that follow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    /// Set a key to a value.
    Put {
        /// The affected key.
        key: String,
        /// The new value.
        value: Value,
    },
    /// Remove a key.
    Del {
        /// The affected key.
        key: String,
    },
    /// Discard the entire prior replica.
    Clear,
}

impl PatchOp {
    /// Creates a put operation.
    pub fn put(key: impl Into<String>, value: Value) -> Self {
        Self::Put {
            key: key.into(),
            value,
        }
    }

    /// Creates a del operation.
    pub fn del(key: impl Into<String>) -> Self {
        Self::Del { key: key.into() }
    }
}
