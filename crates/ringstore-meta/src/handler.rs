//! RPC dispatch for the meta store.

use ringstore_net::{RequestHandler, RingMessage};
use tracing::debug;

use crate::store::MetaStore;

#[async_trait::async_trait]
impl RequestHandler for MetaStore {
    async fn handle(&self, request: RingMessage) -> RingMessage {
        match request {
            RingMessage::GetFileInfoMap => RingMessage::FileInfoMap(self.get_file_info_map().await),
            RingMessage::UpdateFile { meta } => match self.update_file(meta).await {
                Ok(latest) => RingMessage::Version { latest },
                Err(e) => RingMessage::Error(e.to_remote()),
            },
            RingMessage::GetBlockStoreMap { hashes } => {
                match self.get_block_store_map(&hashes).await {
                    Ok(map) => RingMessage::BlockStoreMap(map),
                    Err(e) => RingMessage::Error(e.to_remote()),
                }
            }
            RingMessage::AddNode { addr } => match self.add_node(&addr).await {
                Ok(()) => RingMessage::Done,
                Err(e) => RingMessage::Error(e.to_remote()),
            },
            RingMessage::RemoveNode { addr } => match self.remove_node(&addr).await {
                Ok(()) => RingMessage::Done,
                Err(e) => RingMessage::Error(e.to_remote()),
            },
            other => {
                debug!(request = other.kind(), "not a meta store request");
                RingMessage::unsupported(&other)
            }
        }
    }
}
