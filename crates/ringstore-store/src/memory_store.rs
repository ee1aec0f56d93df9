//! In-memory block storage backend.

use std::collections::HashMap;

use ringstore_types::{Block, BlockHash};
use tokio::sync::RwLock;
use tracing::trace;

use crate::error::StoreError;
use crate::traits::BlockStorage;

/// In-memory block storage backed by a `RwLock<HashMap>`.
///
/// Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blocks: RwLock<HashMap<BlockHash, Block>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl BlockStorage for MemoryStorage {
    async fn put(&self, hash: BlockHash, block: Block) -> Result<(), StoreError> {
        trace!(%hash, size = block.size, "storing block in memory");
        self.blocks.write().await.insert(hash, block);
        Ok(())
    }

    async fn get(&self, hash: &BlockHash) -> Result<Option<Block>, StoreError> {
        Ok(self.blocks.read().await.get(hash).cloned())
    }

    async fn retain_present(&self, hashes: &[BlockHash]) -> Result<Vec<BlockHash>, StoreError> {
        let blocks = self.blocks.read().await;
        Ok(hashes
            .iter()
            .filter(|hash| blocks.contains_key(*hash))
            .copied()
            .collect())
    }

    async fn select(
        &self,
        filter: &(dyn for<'a> Fn(&'a BlockHash) -> bool + Send + Sync),
    ) -> Result<Vec<(BlockHash, Block)>, StoreError> {
        let blocks = self.blocks.read().await;
        Ok(blocks
            .iter()
            .filter(|(hash, _)| filter(*hash))
            .map(|(hash, block)| (*hash, block.clone()))
            .collect())
    }

    async fn snapshot(&self) -> Result<HashMap<BlockHash, Block>, StoreError> {
        Ok(self.blocks.read().await.clone())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.blocks.read().await.len())
    }
}
