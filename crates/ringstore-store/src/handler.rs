//! RPC dispatch for the block store.

use ringstore_net::{RequestHandler, RingMessage};
use tracing::debug;

use crate::service::BlockStore;

#[async_trait::async_trait]
impl RequestHandler for BlockStore {
    async fn handle(&self, request: RingMessage) -> RingMessage {
        match request {
            RingMessage::GetBlock { hash } => match self.get_block(&hash).await {
                Ok(block) => RingMessage::Block(block),
                Err(e) => RingMessage::Error(e.to_remote()),
            },
            RingMessage::PutBlock { block } => match self.put_block(block).await {
                Ok(hash) => RingMessage::Stored { hash },
                Err(e) => RingMessage::Error(e.to_remote()),
            },
            RingMessage::HasBlocks { hashes } => match self.has_blocks(&hashes).await {
                Ok(present) => RingMessage::HashList(present),
                Err(e) => RingMessage::Error(e.to_remote()),
            },
            RingMessage::MigrateBlocks { instruction } => {
                match self.migrate_blocks(&instruction).await {
                    Ok(_) => RingMessage::Done,
                    Err(e) => RingMessage::Error(e.to_remote()),
                }
            }
            RingMessage::GetBlockMap => match self.block_map().await {
                Ok(map) => RingMessage::BlockMap(map),
                Err(e) => RingMessage::Error(e.to_remote()),
            },
            other => {
                debug!(request = other.kind(), "not a block store request");
                RingMessage::unsupported(&other)
            }
        }
    }
}
