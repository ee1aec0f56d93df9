//! Consistent hashing ring for deterministic block placement.
//!
//! Block hashes and node addresses are mapped onto the same fixed circular
//! index space `[0, ring_size)`: a block's index is its SHA-256 digest read as
//! a big unsigned integer modulo the ring size, and a node's index is the
//! digest of its address reduced the same way.
//!
//! A node owns the half-open arc `(predecessor.index, node.index]`, so the
//! owner of any index is the first node at or after it, wrapping through zero.

mod error;
mod ring;

pub use error::PlacementError;
pub use ring::{
    HashRing, Node, circular_range_contains, compute_block_index, compute_node_index, index_of,
    index_of_digest,
};
