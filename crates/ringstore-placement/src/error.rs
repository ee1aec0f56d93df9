//! Error types for ring placement.

/// Errors returned by [`HashRing`](crate::HashRing) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    /// The ring has no nodes, so no index has an owner.
    #[error("ring is empty")]
    EmptyRing,

    /// A hash string could not be decoded as hex.
    #[error("invalid hash {hash:?}: {reason}")]
    InvalidHash {
        /// The rejected input.
        hash: String,
        /// Why decoding failed.
        reason: String,
    },

    /// The address is already a member of the ring.
    #[error("node already in ring: {0}")]
    DuplicateNode(String),

    /// Another node already sits at the computed index.
    #[error("ring index {index} of {addr} is already taken by {existing}")]
    IndexCollision {
        /// Address that was being added.
        addr: String,
        /// Its computed ring index.
        index: u64,
        /// Address already holding that index.
        existing: String,
    },
}
