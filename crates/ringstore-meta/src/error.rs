//! Error types for the metadata store.

use ringstore_net::NetError;
use ringstore_placement::PlacementError;
use ringstore_types::RemoteError;

/// Errors returned by [`MetaStore`](crate::MetaStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    /// The proposed version was not exactly one above the stored one.
    #[error("version conflict on {filename}: supplied {supplied}, latest {latest}")]
    VersionConflict {
        /// File the update targeted.
        filename: String,
        /// Version carried by the rejected update.
        supplied: u64,
        /// Version currently stored.
        latest: u64,
    },

    /// No block store is on the ring.
    #[error("ring is empty")]
    EmptyRing,

    /// The address is not on the ring.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// The address is already on the ring.
    #[error("node already in ring: {0}")]
    DuplicateNode(String),

    /// Another node already holds the address's ring index.
    #[error("ring index {index} of {addr} is already taken by {existing}")]
    IndexCollision {
        /// Address that was being added.
        addr: String,
        /// Its computed ring index.
        index: u64,
        /// Address already holding that index.
        existing: String,
    },

    /// The node is the only one on the ring.
    #[error("cannot remove last node: {0}")]
    LastNode(String),

    /// The migration that must precede a ring change failed. The ring was
    /// not modified.
    #[error("migration via {addr} failed: {source}")]
    Migration {
        /// Block store that was asked to migrate.
        addr: String,
        /// Underlying failure.
        #[source]
        source: NetError,
    },

    /// Any other ring failure.
    #[error("placement error: {0}")]
    Placement(PlacementError),
}

impl From<PlacementError> for MetaError {
    fn from(e: PlacementError) -> Self {
        match e {
            PlacementError::EmptyRing => MetaError::EmptyRing,
            PlacementError::DuplicateNode(addr) => MetaError::DuplicateNode(addr),
            PlacementError::IndexCollision {
                addr,
                index,
                existing,
            } => MetaError::IndexCollision {
                addr,
                index,
                existing,
            },
            other => MetaError::Placement(other),
        }
    }
}

impl MetaError {
    /// Convert into the failure reported to an RPC caller.
    pub fn to_remote(&self) -> RemoteError {
        match self {
            MetaError::VersionConflict {
                filename,
                supplied,
                latest,
            } => RemoteError::VersionConflict {
                filename: filename.clone(),
                supplied: *supplied,
                latest: *latest,
            },
            MetaError::EmptyRing => RemoteError::EmptyRing,
            MetaError::UnknownNode(addr) => RemoteError::UnknownNode(addr.clone()),
            MetaError::DuplicateNode(addr) => RemoteError::DuplicateNode(addr.clone()),
            MetaError::IndexCollision {
                addr,
                index,
                existing,
            } => RemoteError::IndexCollision {
                addr: addr.clone(),
                index: *index,
                existing: existing.clone(),
            },
            MetaError::LastNode(addr) => RemoteError::LastNode(addr.clone()),
            // The migrating store already classified its own failure.
            MetaError::Migration {
                source: NetError::Remote(remote),
                ..
            } => remote.clone(),
            MetaError::Migration { source, .. } if source.is_transient() => {
                RemoteError::Unreachable(self.to_string())
            }
            MetaError::Migration { .. } | MetaError::Placement(_) => {
                RemoteError::Internal(self.to_string())
            }
        }
    }
}
