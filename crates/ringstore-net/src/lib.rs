//! RPC layer between ringstore nodes.
//!
//! This crate implements the synchronous request/response surface of block
//! stores and the meta store on top of plain TCP:
//!
//! - [`RingMessage`] - the wire protocol (postcard, length-prefixed).
//! - [`TcpTransport`] - dials peers with bounded retries and hands out
//!   per-call [`RpcClient`] connections with request timeouts.
//! - [`serve`] - accept loop dispatching decoded requests to a
//!   [`RequestHandler`].

mod error;
mod message;
mod server;
mod transport;

use std::collections::HashMap;

use ringstore_types::{Block, BlockHash, MigrationInstruction};

pub use error::NetError;
pub use message::RingMessage;
pub use server::{RequestHandler, serve};
pub use transport::{RpcClient, TcpTransport, TransportConfig, recv_message, send_message};

/// Dials block stores.
///
/// The seam between the storage/coordination logic and the network, so tests
/// can route calls to in-process stores instead of sockets.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Open a client to the block store at `addr`.
    ///
    /// The connection lives as long as the returned client and is closed
    /// when it is dropped.
    async fn connect(&self, addr: &str) -> Result<Box<dyn BlockStoreClient>, NetError>;
}

/// Client stub for the block store RPC surface.
#[async_trait::async_trait]
pub trait BlockStoreClient: Send {
    /// Address of the remote block store.
    fn peer(&self) -> &str;

    /// Fetch a block by hash. A miss is `NetError::Remote(RemoteError::NotFound)`.
    async fn get_block(&mut self, hash: BlockHash) -> Result<Block, NetError>;

    /// Store a block. Returns the hash the remote computed for it.
    async fn put_block(&mut self, block: &Block) -> Result<BlockHash, NetError>;

    /// Return the subsequence of `hashes` held by the remote, in input order.
    async fn has_blocks(&mut self, hashes: &[BlockHash]) -> Result<Vec<BlockHash>, NetError>;

    /// Ask the remote to copy a ring range of its blocks to another node.
    async fn migrate_blocks(&mut self, instruction: &MigrationInstruction) -> Result<(), NetError>;

    /// Dump every block held by the remote.
    async fn get_block_map(&mut self) -> Result<HashMap<BlockHash, Block>, NetError>;
}
