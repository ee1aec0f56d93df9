//! The block store service.

use std::collections::HashMap;
use std::sync::Arc;

use ringstore_net::Transport;
use ringstore_placement::{circular_range_contains, compute_block_index};
use ringstore_types::{Block, BlockHash, MigrationInstruction, RingSize};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::memory_store::MemoryStorage;
use crate::traits::BlockStorage;

/// A block store node: content-addressed storage plus outbound migration.
///
/// The service never trusts a caller-supplied key: every block is stored
/// under the SHA-256 of its payload.
pub struct BlockStore {
    storage: Arc<dyn BlockStorage>,
    ring_size: RingSize,
    transport: Arc<dyn Transport>,
}

impl BlockStore {
    /// Create a block store over an arbitrary storage backend.
    ///
    /// `ring_size` must match the meta store's, or migrations will select
    /// the wrong blocks.
    pub fn new(
        storage: Arc<dyn BlockStorage>,
        ring_size: RingSize,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            storage,
            ring_size,
            transport,
        }
    }

    /// Create a block store backed by [`MemoryStorage`].
    pub fn in_memory(ring_size: RingSize, transport: Arc<dyn Transport>) -> Self {
        Self::new(Arc::new(MemoryStorage::new()), ring_size, transport)
    }

    /// Size of the ring this store places its blocks on.
    pub fn ring_size(&self) -> RingSize {
        self.ring_size
    }

    /// Fetch a block by its content hash.
    pub async fn get_block(&self, hash: &BlockHash) -> Result<Block, StoreError> {
        self.storage
            .get(hash)
            .await?
            .ok_or(StoreError::NotFound(*hash))
    }

    /// Store a block under the hash of its payload and return that hash.
    ///
    /// Re-putting identical content is a no-op.
    pub async fn put_block(&self, block: Block) -> Result<BlockHash, StoreError> {
        let hash = block.hash();
        debug!(%hash, size = block.size, "put block");
        self.storage.put(hash, block).await?;
        Ok(hash)
    }

    /// Return the subsequence of `hashes` stored here, in input order.
    pub async fn has_blocks(&self, hashes: &[BlockHash]) -> Result<Vec<BlockHash>, StoreError> {
        self.storage.retain_present(hashes).await
    }

    /// Copy every local block whose ring index lies in the instruction's
    /// inclusive circular range to the destination block store.
    ///
    /// Blocks are pushed in ring order starting at `lower_index` over one
    /// connection. The first failed push aborts the migration; blocks copied
    /// before it stay copied. Nothing is ever deleted locally.
    ///
    /// Returns the number of blocks copied.
    pub async fn migrate_blocks(
        &self,
        instruction: &MigrationInstruction,
    ) -> Result<usize, StoreError> {
        let ring_size = self.ring_size;
        let lower = instruction.lower_index;
        let upper = instruction.upper_index;
        let dest = instruction.dest_addr.as_str();

        let in_range = move |hash: &BlockHash| {
            circular_range_contains(lower, upper, compute_block_index(hash, ring_size), ring_size)
        };
        let mut batch = self.storage.select(&in_range).await?;

        // Order by clockwise distance from the lower bound.
        let size = ring_size.get();
        let start = lower % size;
        batch.sort_by_cached_key(|(hash, _)| {
            let idx = compute_block_index(hash, ring_size);
            if idx >= start {
                idx - start
            } else {
                idx + (size - start)
            }
        });

        debug!(
            lower,
            upper,
            %dest,
            candidates = batch.len(),
            "starting migration"
        );

        let mut client = self
            .transport
            .connect(dest)
            .await
            .map_err(|source| StoreError::Migration {
                dest: dest.to_string(),
                copied: 0,
                source,
            })?;

        for (copied, (hash, block)) in batch.iter().enumerate() {
            if let Err(source) = client.put_block(block).await {
                warn!(%hash, %dest, copied, error = %source, "migration aborted");
                return Err(StoreError::Migration {
                    dest: dest.to_string(),
                    copied,
                    source,
                });
            }
        }

        info!(count = batch.len(), lower, upper, %dest, "migrated blocks");
        Ok(batch.len())
    }

    /// Copy of every stored block, keyed by hash.
    pub async fn block_map(&self) -> Result<HashMap<BlockHash, Block>, StoreError> {
        self.storage.snapshot().await
    }
}
