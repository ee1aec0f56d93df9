//! Integration test: rebalancing.
//!
//! Grow and shrink the ring while files are stored, and check that every
//! block stays readable from the node routing sends it to.

use std::collections::HashSet;

use ringstore_integration_tests::{IntegrationCluster, test_data_seeded};
use ringstore_placement::{circular_range_contains, compute_block_index, compute_node_index};
use ringstore_types::BlockHash;

async fn write_files(c: &IntegrationCluster, count: usize) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    for i in 0..count {
        let data = test_data_seeded(2000 + i * 137, i as u32 + 1);
        let name = format!("obj-{i:03}");
        c.write_file(&name, &data).await.unwrap();
        files.push((name, data));
    }
    files
}

async fn assert_all_readable(c: &IntegrationCluster, files: &[(String, Vec<u8>)]) {
    for (name, expected) in files {
        let got = c.read_file(name).await.unwrap();
        assert_eq!(&got, expected, "data mismatch for {name}");
    }
    assert!(c.misrouted_blocks().await.unwrap().is_empty());
}

/// 3-node cluster, write 30 files, add 3 more nodes one by one.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_add_nodes_files_still_readable() {
    let mut c = IntegrationCluster::new(3).await;
    let files = write_files(&c, 30).await;
    assert_eq!(c.ring_addrs().await.len(), 3);

    for expected in 4..=6 {
        c.join_new_node().await.unwrap();
        assert_eq!(c.ring_addrs().await.len(), expected);
        assert_all_readable(&c, &files).await;
    }
}

/// A join moves exactly the new node's arc: the new node receives only
/// blocks in that arc, and routing of every other block is unchanged.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_join_moves_only_new_arc() {
    let mut c = IntegrationCluster::with_ring_size(3, 4096).await;
    write_files(&c, 40).await;
    let size = c.ring_size();

    let all: Vec<BlockHash> = c
        .meta()
        .get_file_info_map()
        .await
        .values()
        .flat_map(|m| m.block_hash_list.iter().copied())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let before = c.routes(&all).await;

    let new_addr = c.join_new_node().await.unwrap();
    let after = c.routes(&all).await;

    // The new node's arc is (pred, idx].
    let idx = compute_node_index(&new_addr, size);
    let nodes = c.meta().ring_nodes().await;
    let pos = nodes.iter().position(|n| n.addr() == new_addr).unwrap();
    let pred = &nodes[(pos + nodes.len() - 1) % nodes.len()];
    let lower = (pred.index() + 1) % size.get();

    let in_arc = |h: &BlockHash| circular_range_contains(lower, idx, compute_block_index(h, size), size);

    let moved: HashSet<BlockHash> = after.get(&new_addr).cloned().unwrap_or_default().into_iter().collect();
    let expected: HashSet<BlockHash> = all.iter().copied().filter(|h| in_arc(h)).collect();
    assert_eq!(moved, expected);

    let on_new: HashSet<BlockHash> = c
        .store(&new_addr)
        .await
        .block_map()
        .await
        .unwrap()
        .into_keys()
        .collect();
    assert_eq!(on_new, expected, "new node holds exactly its arc");

    for (addr, owned) in &before {
        let kept: Vec<BlockHash> = owned.iter().copied().filter(|h| !in_arc(h)).collect();
        let now: Vec<BlockHash> = after
            .get(addr)
            .map(|v| v.iter().copied().filter(|h| !in_arc(h)).collect())
            .unwrap_or_default();
        assert_eq!(kept, now, "routing outside the arc changed for {addr}");
    }
}

/// Shrink a 5-node cluster to 1 node; files stay readable throughout and
/// removed nodes never appear in routing.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_remove_nodes_down_to_one() {
    let c = IntegrationCluster::new(5).await;
    let files = write_files(&c, 25).await;

    let mut removed = Vec::new();
    while c.ring_addrs().await.len() > 1 {
        let victim = c.ring_addrs().await[0].clone();
        c.meta().remove_node(&victim).await.unwrap();
        removed.push(victim);

        assert_all_readable(&c, &files).await;
        let hashes: Vec<BlockHash> = c
            .meta()
            .get_file_info_map()
            .await
            .values()
            .flat_map(|m| m.block_hash_list.clone())
            .collect();
        let routes = c.routes(&hashes).await;
        for gone in &removed {
            assert!(!routes.contains_key(gone), "{gone} still routed");
        }
    }

    // The survivor holds every committed block.
    let last = c.ring_addrs().await[0].clone();
    let committed: HashSet<BlockHash> = c
        .meta()
        .get_file_info_map()
        .await
        .values()
        .flat_map(|m| m.block_hash_list.iter().copied())
        .collect();
    let held: HashSet<BlockHash> = c
        .store(&last)
        .await
        .block_map()
        .await
        .unwrap()
        .into_keys()
        .collect();
    assert!(committed.is_subset(&held));

    let err = c.meta().remove_node(&last).await.unwrap_err();
    assert!(err.to_string().contains("last node"));
}

/// Removed nodes keep their copies: migration is additive.
#[tokio::test]
async fn test_removed_node_keeps_its_blocks() {
    let c = IntegrationCluster::new(3).await;
    write_files(&c, 10).await;

    let victim = c.ring_addrs().await[1].clone();
    let held = c.block_count(&victim).await;
    c.meta().remove_node(&victim).await.unwrap();
    assert_eq!(c.block_count(&victim).await, held);
}

/// Interleave joins, leaves and writes.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_churn_with_writes() {
    let mut c = IntegrationCluster::new(2).await;
    let mut files = write_files(&c, 5).await;

    for round in 0..4u32 {
        c.join_new_node().await.unwrap();
        let name = format!("round-{round}");
        let data = test_data_seeded(4096, 100 + round);
        c.write_file(&name, &data).await.unwrap();
        files.push((name, data));

        let victim = c.ring_addrs().await[round as usize % 2].clone();
        c.meta().remove_node(&victim).await.unwrap();
        assert_all_readable(&c, &files).await;
    }
}
