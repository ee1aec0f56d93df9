//! Shared types and identifiers for ringstore.
//!
//! This crate defines the core types used across the ringstore workspace:
//! the content identifier ([`BlockHash`]), stored data ([`Block`]),
//! file version records ([`FileMetaData`]), ring parameters ([`RingSize`]),
//! rebalancing commands ([`MigrationInstruction`]), and the failure kinds
//! carried back over RPC ([`RemoteError`]).

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Content identifier
// ---------------------------------------------------------------------------

/// Length of a [`BlockHash`] in bytes (SHA-256).
pub const HASH_LEN: usize = 32;

/// Content-addressed identifier for a block: `sha256(block_data)`.
///
/// Rendered as 64 lowercase hex characters. The same digest is used to place
/// both blocks and node addresses on the ring.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct BlockHash([u8; HASH_LEN]);

impl BlockHash {
    /// Hash arbitrary data with SHA-256.
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Return the raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl From<[u8; HASH_LEN]> for BlockHash {
    fn from(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for BlockHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({self})")
    }
}

/// Error returned when a string is not a valid hex-encoded [`BlockHash`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseHashError {
    /// The input contained a non-hex character or had odd length.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// The decoded digest was not 32 bytes long.
    #[error("expected {HASH_LEN} bytes, got {0}")]
    WrongLength(usize),
}

impl FromStr for BlockHash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| ParseHashError::InvalidHex(e.to_string()))?;
        let len = bytes.len();
        let arr: [u8; HASH_LEN] = bytes
            .try_into()
            .map_err(|_| ParseHashError::WrongLength(len))?;
        Ok(Self(arr))
    }
}

// ---------------------------------------------------------------------------
// Core data structures
// ---------------------------------------------------------------------------

/// An opaque payload together with its declared size.
///
/// A block's identity is the hash of `data`; the store never trusts a
/// client-supplied key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Raw block contents.
    pub data: Bytes,
    /// Declared size of the block in bytes.
    pub size: u64,
}

impl Block {
    /// Build a block whose declared size matches the payload length.
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let size = data.len() as u64;
        Self { data, size }
    }

    /// Content hash of the payload.
    pub fn hash(&self) -> BlockHash {
        BlockHash::of(&self.data)
    }
}

/// Versioned metadata for one file.
///
/// A filename missing from the metadata map is equivalent to version 0 with
/// an empty hash list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetaData {
    /// Unique key of the file.
    pub filename: String,
    /// Strictly increasing version, starting at 1.
    pub version: u64,
    /// Ordered block hashes reconstructing the file contents.
    pub block_hash_list: Vec<BlockHash>,
}

impl FileMetaData {
    /// Convenience constructor.
    pub fn new(filename: impl Into<String>, version: u64, block_hash_list: Vec<BlockHash>) -> Self {
        Self {
            filename: filename.into(),
            version,
            block_hash_list,
        }
    }
}

// ---------------------------------------------------------------------------
// Ring types
// ---------------------------------------------------------------------------

/// Size of the circular index space `[0, ring_size)`.
///
/// Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RingSize(NonZeroU64);

impl RingSize {
    /// Returns `None` for zero.
    pub fn new(size: u64) -> Option<Self> {
        NonZeroU64::new(size).map(Self)
    }

    /// The ring size as a plain integer.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for RingSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tells a block store to copy every block whose ring index lies in the
/// inclusive circular range `[lower_index, upper_index]` to `dest_addr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationInstruction {
    /// Inclusive lower bound of the range.
    pub lower_index: u64,
    /// Inclusive upper bound of the range (may be below `lower_index` when
    /// the range wraps through zero).
    pub upper_index: u64,
    /// Address of the block store receiving the copies.
    pub dest_addr: String,
}

// ---------------------------------------------------------------------------
// RPC failures
// ---------------------------------------------------------------------------

/// Typed failure returned by a remote block store or meta store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum RemoteError {
    /// The requested block is not stored on the node.
    #[error("block not found: {0}")]
    NotFound(BlockHash),

    /// The supplied file version was not exactly `latest + 1`.
    #[error("version conflict on {filename}: supplied {supplied}, latest {latest}")]
    VersionConflict {
        /// File the update targeted.
        filename: String,
        /// Version carried by the rejected update.
        supplied: u64,
        /// Version currently stored by the meta store.
        latest: u64,
    },

    /// The ring has no nodes to route to.
    #[error("ring is empty")]
    EmptyRing,

    /// The address is not a member of the ring.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// The address is already a member of the ring.
    #[error("node already in ring: {0}")]
    DuplicateNode(String),

    /// Another node already sits at the computed ring index.
    #[error("ring index {index} of {addr} is already taken by {existing}")]
    IndexCollision {
        /// Address that was being added.
        addr: String,
        /// Its computed ring index.
        index: u64,
        /// Address already holding that index.
        existing: String,
    },

    /// Removing the node would leave no successor to inherit its blocks.
    #[error("cannot remove last node: {0}")]
    LastNode(String),

    /// A node involved in the operation could not be reached.
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// The node does not serve this kind of request.
    #[error("unsupported request: {0}")]
    Unsupported(String),

    /// Any other server-side failure.
    #[error("internal error: {0}")]
    Internal(String),
}
