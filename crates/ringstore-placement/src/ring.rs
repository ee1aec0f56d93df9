//! Consistent hashing ring implementation.

use std::collections::{BTreeMap, HashMap};

use ringstore_types::{BlockHash, RingSize};
use tracing::debug;

use crate::PlacementError;

/// A block store on the ring.
///
/// The index is always derived from the address; it cannot be set directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    addr: String,
    index: u64,
}

impl Node {
    /// Place `addr` on a ring of the given size.
    pub fn new(addr: impl Into<String>, ring_size: RingSize) -> Self {
        let addr = addr.into();
        let index = compute_node_index(&addr, ring_size);
        Self { addr, index }
    }

    /// Network address identifying the node.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Position of the node on the ring.
    pub fn index(&self) -> u64 {
        self.index
    }
}

/// Consistent hashing ring over a fixed index space.
///
/// Nodes are kept ordered by index so successor and predecessor queries are
/// range lookups. Addresses and indices are both unique.
#[derive(Debug, Clone)]
pub struct HashRing {
    ring_size: RingSize,
    /// Ring position -> node.
    positions: BTreeMap<u64, Node>,
    /// Address -> ring position.
    addrs: HashMap<String, u64>,
}

impl HashRing {
    /// Create an empty ring.
    pub fn new(ring_size: RingSize) -> Self {
        Self {
            ring_size,
            positions: BTreeMap::new(),
            addrs: HashMap::new(),
        }
    }

    /// Create a ring populated with the given block store addresses.
    pub fn with_nodes<I, S>(ring_size: RingSize, addrs: I) -> Result<Self, PlacementError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ring = Self::new(ring_size);
        for addr in addrs {
            ring.add_node(addr)?;
        }
        Ok(ring)
    }

    /// Size of the index space.
    pub fn ring_size(&self) -> RingSize {
        self.ring_size
    }

    /// Ring index of a block.
    pub fn compute_block_index(&self, hash: &BlockHash) -> u64 {
        compute_block_index(hash, self.ring_size)
    }

    /// Ring index of a node address.
    pub fn compute_node_index(&self, addr: &str) -> u64 {
        compute_node_index(addr, self.ring_size)
    }

    /// Insert a node by address.
    ///
    /// Fails if the address is already present or if another address hashes
    /// to the same index.
    pub fn add_node(&mut self, addr: impl Into<String>) -> Result<Node, PlacementError> {
        let node = Node::new(addr, self.ring_size);
        if self.addrs.contains_key(&node.addr) {
            return Err(PlacementError::DuplicateNode(node.addr));
        }
        if let Some(existing) = self.positions.get(&node.index) {
            return Err(PlacementError::IndexCollision {
                addr: node.addr,
                index: node.index,
                existing: existing.addr.clone(),
            });
        }

        self.addrs.insert(node.addr.clone(), node.index);
        self.positions.insert(node.index, node.clone());
        debug!(addr = %node.addr, index = node.index, "added node to ring");
        Ok(node)
    }

    /// Remove a node by address. Returns `None` if it was not on the ring.
    pub fn remove_node(&mut self, addr: &str) -> Option<Node> {
        let index = self.addrs.remove(addr)?;
        let node = self.positions.remove(&index);
        debug!(%addr, index, "removed node from ring");
        node
    }

    /// Find the node owning `ring_index`: the first node whose index is at or
    /// after it, wrapping to the lowest index.
    pub fn find_hosting_node(&self, ring_index: u64) -> Result<&Node, PlacementError> {
        let ring_index = ring_index % self.ring_size.get();
        self.positions
            .range(ring_index..)
            .next()
            .or_else(|| self.positions.iter().next())
            .map(|(_, node)| node)
            .ok_or(PlacementError::EmptyRing)
    }

    /// Find the node with the largest index strictly below `query_index`,
    /// wrapping to the highest index.
    pub fn find_pred_node(&self, query_index: u64) -> Result<&Node, PlacementError> {
        let query_index = query_index % self.ring_size.get();
        self.positions
            .range(..query_index)
            .next_back()
            .or_else(|| self.positions.iter().next_back())
            .map(|(_, node)| node)
            .ok_or(PlacementError::EmptyRing)
    }

    /// Whether `addr` is on the ring.
    pub fn contains(&self, addr: &str) -> bool {
        self.addrs.contains_key(addr)
    }

    /// Look up a node by address.
    pub fn node(&self, addr: &str) -> Option<&Node> {
        self.addrs.get(addr).and_then(|idx| self.positions.get(idx))
    }

    /// All nodes in ring order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.positions.values()
    }

    /// Number of nodes on the ring.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the ring has no nodes.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Decode a hex digest as a big unsigned integer and reduce it modulo
/// `ring_size`.
pub fn index_of(hash_hex: &str, ring_size: RingSize) -> Result<u64, PlacementError> {
    let bytes = hex::decode(hash_hex).map_err(|e| PlacementError::InvalidHash {
        hash: hash_hex.to_string(),
        reason: e.to_string(),
    })?;
    Ok(index_of_digest(&bytes, ring_size))
}

/// Reduce a big-endian digest of any length modulo `ring_size`.
///
/// Horner's rule over the bytes keeps every intermediate below
/// `ring_size * 256`, so the result is exact for digests of any width.
pub fn index_of_digest(digest: &[u8], ring_size: RingSize) -> u64 {
    let modulus = u128::from(ring_size.get());
    let rem = digest
        .iter()
        .fold(0u128, |acc, &b| ((acc << 8) | u128::from(b)) % modulus);
    rem as u64
}

/// Ring index of a block.
pub fn compute_block_index(hash: &BlockHash, ring_size: RingSize) -> u64 {
    index_of_digest(hash.as_bytes(), ring_size)
}

/// Ring index of a node address, hashed with the same function as blocks.
pub fn compute_node_index(addr: &str, ring_size: RingSize) -> u64 {
    compute_block_index(&BlockHash::of(addr.as_bytes()), ring_size)
}

/// Whether `test` lies in the inclusive circular interval from `lower` to
/// `upper`. All three operands are reduced modulo `ring_size` first.
pub fn circular_range_contains(lower: u64, upper: u64, test: u64, ring_size: RingSize) -> bool {
    let m = ring_size.get();
    let (lower, upper, test) = (lower % m, upper % m, test % m);
    if lower <= upper {
        lower <= test && test <= upper
    } else {
        test >= lower || test <= upper
    }
}
