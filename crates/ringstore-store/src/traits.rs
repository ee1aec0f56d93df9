//! Core trait for block storage backends.

use std::collections::HashMap;

use ringstore_types::{Block, BlockHash};

use crate::error::StoreError;

/// Trait for storing and retrieving content-addressed blocks.
///
/// The backend is keyed by whatever hash the caller computed; deriving the
/// key from the payload is the job of [`crate::BlockStore`].
#[async_trait::async_trait]
pub trait BlockStorage: Send + Sync {
    /// Store a block under `hash`. Overwriting an existing key is allowed.
    async fn put(&self, hash: BlockHash, block: Block) -> Result<(), StoreError>;

    /// Retrieve a block. Returns `None` if not found.
    async fn get(&self, hash: &BlockHash) -> Result<Option<Block>, StoreError>;

    /// Return the subsequence of `hashes` that are stored, keeping input
    /// order. Evaluated against one consistent view of the store.
    async fn retain_present(&self, hashes: &[BlockHash]) -> Result<Vec<BlockHash>, StoreError>;

    /// Clone out every block whose hash satisfies `filter`, as of one
    /// consistent view of the store.
    async fn select(
        &self,
        filter: &(dyn for<'a> Fn(&'a BlockHash) -> bool + Send + Sync),
    ) -> Result<Vec<(BlockHash, Block)>, StoreError>;

    /// Copy of the whole store.
    async fn snapshot(&self) -> Result<HashMap<BlockHash, Block>, StoreError>;

    /// Number of stored blocks.
    async fn len(&self) -> Result<usize, StoreError>;
}
