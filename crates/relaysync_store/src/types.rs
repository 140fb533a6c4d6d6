//! Core identifier types for the snapshot store.

use std::fmt;

/// Identifier for a document (independent key/value namespace).
///
/// All versioning and checkpointing is scoped to one document; two documents
/// never share state or locks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    /// Creates a new document ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc:{}", self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifier for a checkpoint within one document.
///
/// Checkpoint IDs are monotonically increasing per document and never
/// reused. Each committed push mints the checkpoint succeeding the previous
/// head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CheckpointId(pub u64);

impl CheckpointId {
    /// Creates a new checkpoint ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next checkpoint ID.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ckpt:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_id_ordering() {
        let c1 = CheckpointId::new(1);
        let c2 = c1.next();
        assert!(c1 < c2);
        assert_eq!(c2.as_u64(), 2);
    }

    #[test]
    fn document_id_display() {
        let d = DocumentId::new("drawing-7");
        assert_eq!(format!("{d}"), "doc:drawing-7");
        assert_eq!(d.as_str(), "drawing-7");
    }
}
