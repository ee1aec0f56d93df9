//! Protocol messages for the ringstore RPC layer.
//!
//! All messages are serialized with postcard and sent length-prefixed over a
//! TCP stream. Each request gets exactly one response on the same stream.

use std::collections::{BTreeMap, HashMap};

use ringstore_types::{Block, BlockHash, FileMetaData, MigrationInstruction, RemoteError};
use serde::{Deserialize, Serialize};

/// Protocol messages exchanged between ringstore nodes and their clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RingMessage {
    // ----- Block store requests -----
    /// Fetch a block by hash. Answered with [`RingMessage::Block`].
    GetBlock {
        /// Content hash of the wanted block.
        hash: BlockHash,
    },

    /// Store a block. Answered with [`RingMessage::Stored`].
    PutBlock {
        /// The block to store; the receiver derives its key.
        block: Block,
    },

    /// Ask which of the given hashes are stored. Answered with
    /// [`RingMessage::HashList`].
    HasBlocks {
        /// Hashes to check, in caller order.
        hashes: Vec<BlockHash>,
    },

    /// Copy a ring range of blocks to another node. Answered with
    /// [`RingMessage::Done`].
    MigrateBlocks {
        /// Which range to copy, and where.
        instruction: MigrationInstruction,
    },

    /// Dump the whole block map (debugging). Answered with
    /// [`RingMessage::BlockMap`].
    GetBlockMap,

    // ----- Meta store requests -----
    /// Fetch every file's metadata. Answered with [`RingMessage::FileInfoMap`].
    GetFileInfoMap,

    /// Commit a new file version. Answered with [`RingMessage::Version`].
    UpdateFile {
        /// Candidate metadata carrying the proposed version.
        meta: FileMetaData,
    },

    /// Route hashes to their owning block stores. Answered with
    /// [`RingMessage::BlockStoreMap`].
    GetBlockStoreMap {
        /// Hashes to route.
        hashes: Vec<BlockHash>,
    },

    /// Join a block store to the ring. Answered with [`RingMessage::Done`].
    AddNode {
        /// Address of the joining block store.
        addr: String,
    },

    /// Remove a block store from the ring. Answered with [`RingMessage::Done`].
    RemoveNode {
        /// Address of the leaving block store.
        addr: String,
    },

    // ----- Responses -----
    /// A stored block.
    Block(Block),

    /// A block was stored under `hash`.
    Stored {
        /// Hash computed by the store.
        hash: BlockHash,
    },

    /// An ordered list of hashes.
    HashList(Vec<BlockHash>),

    /// A full block map snapshot.
    BlockMap(HashMap<BlockHash, Block>),

    /// A full file metadata snapshot.
    FileInfoMap(BTreeMap<String, FileMetaData>),

    /// The version now stored for a file.
    Version {
        /// Latest accepted version.
        latest: u64,
    },

    /// Block store address -> hashes it owns.
    BlockStoreMap(BTreeMap<String, Vec<BlockHash>>),

    /// The request completed with nothing to return.
    Done,

    /// The request failed on the remote.
    Error(RemoteError),
}

impl RingMessage {
    /// Short name of the variant, for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            RingMessage::GetBlock { .. } => "GetBlock",
            RingMessage::PutBlock { .. } => "PutBlock",
            RingMessage::HasBlocks { .. } => "HasBlocks",
            RingMessage::MigrateBlocks { .. } => "MigrateBlocks",
            RingMessage::GetBlockMap => "GetBlockMap",
            RingMessage::GetFileInfoMap => "GetFileInfoMap",
            RingMessage::UpdateFile { .. } => "UpdateFile",
            RingMessage::GetBlockStoreMap { .. } => "GetBlockStoreMap",
            RingMessage::AddNode { .. } => "AddNode",
            RingMessage::RemoveNode { .. } => "RemoveNode",
            RingMessage::Block(_) => "Block",
            RingMessage::Stored { .. } => "Stored",
            RingMessage::HashList(_) => "HashList",
            RingMessage::BlockMap(_) => "BlockMap",
            RingMessage::FileInfoMap(_) => "FileInfoMap",
            RingMessage::Version { .. } => "Version",
            RingMessage::BlockStoreMap(_) => "BlockStoreMap",
            RingMessage::Done => "Done",
            RingMessage::Error(_) => "Error",
        }
    }

    /// Answer for a request the receiving node does not serve.
    pub fn unsupported(request: &RingMessage) -> Self {
        RingMessage::Error(RemoteError::Unsupported(request.kind().to_string()))
    }
}
