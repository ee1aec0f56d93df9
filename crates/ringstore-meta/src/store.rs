//! [`MetaStore`] implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use ringstore_net::Transport;
use ringstore_placement::{HashRing, Node};
use ringstore_types::{BlockHash, FileMetaData, MigrationInstruction, RingSize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::MetaError;

type Result<T> = std::result::Result<T, MetaError>;

/// Cluster coordinator: file versions, block routing and ring membership.
///
/// The file map and the ring sit behind separate locks. A ring change holds
/// the ring's write lock for its whole migrate-then-mutate sequence, so
/// routing queries never observe a node whose blocks have not arrived yet.
pub struct MetaStore {
    files: RwLock<BTreeMap<String, FileMetaData>>,
    ring: RwLock<HashRing>,
    transport: Arc<dyn Transport>,
}

impl MetaStore {
    /// Create a meta store over an initial ring.
    pub fn new(ring: HashRing, transport: Arc<dyn Transport>) -> Self {
        Self {
            files: RwLock::new(BTreeMap::new()),
            ring: RwLock::new(ring),
            transport,
        }
    }

    // ----- File metadata -----

    /// Snapshot of every file's metadata.
    pub async fn get_file_info_map(&self) -> BTreeMap<String, FileMetaData> {
        self.files.read().await.clone()
    }

    /// Commit `candidate` if its version is exactly one above the stored
    /// version (0 when the file is unknown).
    ///
    /// Returns the new version on success. On rejection the error carries
    /// the version that is stored now.
    pub async fn update_file(&self, candidate: FileMetaData) -> Result<u64> {
        let mut files = self.files.write().await;
        let latest = files.get(&candidate.filename).map_or(0, |meta| meta.version);

        if latest.checked_add(1) != Some(candidate.version) {
            warn!(
                filename = %candidate.filename,
                supplied = candidate.version,
                latest,
                "rejected file update"
            );
            return Err(MetaError::VersionConflict {
                filename: candidate.filename,
                supplied: candidate.version,
                latest,
            });
        }

        let version = candidate.version;
        debug!(
            filename = %candidate.filename,
            version,
            blocks = candidate.block_hash_list.len(),
            "updated file"
        );
        files.insert(candidate.filename.clone(), candidate);
        Ok(version)
    }

    // ----- Routing -----

    /// Group `hashes` by the block store that hosts each of them.
    ///
    /// Every input hash lands in exactly one bucket, and buckets keep input
    /// order.
    pub async fn get_block_store_map(
        &self,
        hashes: &[BlockHash],
    ) -> Result<BTreeMap<String, Vec<BlockHash>>> {
        let mut buckets: BTreeMap<String, Vec<BlockHash>> = BTreeMap::new();
        if hashes.is_empty() {
            return Ok(buckets);
        }

        let ring = self.ring.read().await;
        for hash in hashes {
            let node = ring.find_hosting_node(ring.compute_block_index(hash))?;
            buckets
                .entry(node.addr().to_string())
                .or_default()
                .push(*hash);
        }
        Ok(buckets)
    }

    // ----- Membership -----

    /// Join `addr` to the ring.
    ///
    /// The node that currently hosts the new node's index first copies the
    /// arc `(pred.index, idx]` to `addr`; the ring changes only once that
    /// succeeds. The first node of an empty ring is inserted directly.
    pub async fn add_node(&self, addr: &str) -> Result<()> {
        let mut ring = self.ring.write().await;

        if ring.contains(addr) {
            return Err(MetaError::DuplicateNode(addr.to_string()));
        }

        if ring.is_empty() {
            let node = ring.add_node(addr)?;
            info!(addr, index = node.index(), "first node joined ring");
            return Ok(());
        }

        let idx = ring.compute_node_index(addr);
        let successor = ring.find_hosting_node(idx)?.clone();
        if successor.index() == idx {
            return Err(MetaError::IndexCollision {
                addr: addr.to_string(),
                index: idx,
                existing: successor.addr().to_string(),
            });
        }
        let pred = ring.find_pred_node(idx)?.clone();

        let instruction = arc_instruction(&pred, idx, ring.ring_size(), addr);
        self.migrate(&successor, &instruction).await?;

        let node = ring.add_node(addr)?;
        info!(
            addr,
            index = node.index(),
            from = successor.addr(),
            nodes = ring.len(),
            "node joined ring"
        );
        Ok(())
    }

    /// Remove `addr` from the ring.
    ///
    /// The leaving node first copies its arc `(pred.index, idx]` to its
    /// successor; the ring changes only once that succeeds.
    pub async fn remove_node(&self, addr: &str) -> Result<()> {
        let mut ring = self.ring.write().await;

        let leaving = ring
            .node(addr)
            .cloned()
            .ok_or_else(|| MetaError::UnknownNode(addr.to_string()))?;
        if ring.len() == 1 {
            return Err(MetaError::LastNode(addr.to_string()));
        }

        let idx = leaving.index();
        // Querying one past the node skips the node itself.
        let successor = ring.find_hosting_node(idx + 1)?.clone();
        let pred = ring.find_pred_node(idx)?.clone();

        let instruction = arc_instruction(&pred, idx, ring.ring_size(), successor.addr());
        self.migrate(&leaving, &instruction).await?;

        ring.remove_node(addr);
        info!(
            addr,
            index = idx,
            to = successor.addr(),
            nodes = ring.len(),
            "node left ring"
        );
        Ok(())
    }

    /// Current ring members in index order.
    pub async fn ring_nodes(&self) -> Vec<Node> {
        self.ring.read().await.nodes().cloned().collect()
    }

    /// Size of the ring's index space.
    pub async fn ring_size(&self) -> RingSize {
        self.ring.read().await.ring_size()
    }

    async fn migrate(&self, source: &Node, instruction: &MigrationInstruction) -> Result<()> {
        debug!(
            source = source.addr(),
            lower = instruction.lower_index,
            upper = instruction.upper_index,
            dest = %instruction.dest_addr,
            "requesting migration"
        );
        let failed = |e| MetaError::Migration {
            addr: source.addr().to_string(),
            source: e,
        };
        let mut client = self.transport.connect(source.addr()).await.map_err(failed)?;
        client.migrate_blocks(instruction).await.map_err(failed)
    }
}

/// Instruction covering the arc `(pred.index, upper]`.
fn arc_instruction(
    pred: &Node,
    upper: u64,
    ring_size: RingSize,
    dest: &str,
) -> MigrationInstruction {
    MigrationInstruction {
        lower_index: (pred.index() + 1) % ring_size.get(),
        upper_index: upper,
        dest_addr: dest.to_string(),
    }
}
