//! Error types for block storage operations.

use ringstore_net::NetError;
use ringstore_types::{BlockHash, RemoteError};

/// Errors that can occur during block storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested block is not stored on this node.
    #[error("block not found: {0}")]
    NotFound(BlockHash),

    /// Copying blocks to `dest` failed part way. Blocks pushed before the
    /// failure stay on the destination.
    #[error("migration to {dest} failed after {copied} blocks: {source}")]
    Migration {
        /// Destination block store.
        dest: String,
        /// Blocks successfully copied before the failure.
        copied: usize,
        /// Underlying transport failure.
        #[source]
        source: NetError,
    },
}

impl StoreError {
    /// Convert into the failure reported to an RPC caller.
    pub fn to_remote(&self) -> RemoteError {
        match self {
            StoreError::NotFound(hash) => RemoteError::NotFound(*hash),
            StoreError::Migration { source, .. } if source.is_transient() => {
                RemoteError::Unreachable(self.to_string())
            }
            StoreError::Migration { .. } => RemoteError::Internal(self.to_string()),
        }
    }
}
