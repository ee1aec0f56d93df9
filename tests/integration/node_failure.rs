//! Integration test: node failure.
//!
//! Kill block stores during joins and leaves, and check that a failed
//! topology change leaves the ring untouched and can be retried.

use ringstore_integration_tests::{IntegrationCluster, test_data_seeded};
use ringstore_meta::MetaError;
use ringstore_placement::compute_node_index;

/// Joining a node that is down fails; the ring is unchanged. After the node
/// comes back the same join succeeds.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_join_of_dead_node_fails_then_retries() {
    let mut c = IntegrationCluster::new(3).await;
    let data = test_data_seeded(20_000, 7);
    c.write_file("f", &data).await.unwrap();

    let before = c.ring_addrs().await;
    let newcomer = c.spawn_store().await;
    c.kill_node(&newcomer).await;

    let err = c.meta().add_node(&newcomer).await.unwrap_err();
    assert!(matches!(err, MetaError::Migration { .. }), "got {err:?}");
    assert_eq!(c.ring_addrs().await, before);
    assert_eq!(c.read_file("f").await.unwrap(), data);

    c.revive_node(&newcomer).await;
    c.meta().add_node(&newcomer).await.unwrap();
    assert!(c.ring_addrs().await.contains(&newcomer));
    assert_eq!(c.read_file("f").await.unwrap(), data);
    assert!(c.misrouted_blocks().await.unwrap().is_empty());
}

/// Joining fails when the node that must hand over the arc is down.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_join_fails_when_successor_down() {
    let mut c = IntegrationCluster::new(3).await;
    let before = c.ring_addrs().await;
    let newcomer = c.spawn_store().await;

    // The successor is the first ring member at or after the newcomer.
    let size = c.ring_size();
    let idx = compute_node_index(&newcomer, size);
    let nodes = c.meta().ring_nodes().await;
    let successor = nodes
        .iter()
        .find(|n| n.index() >= idx)
        .unwrap_or(&nodes[0])
        .addr()
        .to_string();
    c.kill_node(&successor).await;

    let err = c.meta().add_node(&newcomer).await.unwrap_err();
    match err {
        MetaError::Migration { addr, .. } => assert_eq!(addr, successor),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(c.ring_addrs().await, before);
}

/// Removing a node whose successor is down fails and keeps the node on the
/// ring, so routing still points at the blocks it holds.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_remove_fails_when_successor_down() {
    let c = IntegrationCluster::new(3).await;
    let data = test_data_seeded(30_000, 3);
    c.write_file("f", &data).await.unwrap();

    let addrs = c.ring_addrs().await;
    let (leaving, successor) = (addrs[0].clone(), addrs[1].clone());
    c.kill_node(&successor).await;

    let err = c.meta().remove_node(&leaving).await.unwrap_err();
    assert!(matches!(err, MetaError::Migration { ref addr, .. } if *addr == leaving));
    assert_eq!(c.ring_addrs().await, addrs);

    c.revive_node(&successor).await;
    c.meta().remove_node(&leaving).await.unwrap();
    assert_eq!(c.read_file("f").await.unwrap(), data);
}

/// Removing a node that is itself down fails: its blocks cannot be copied.
#[tokio::test]
async fn test_remove_of_dead_node_fails() {
    let c = IntegrationCluster::new(2).await;
    let addrs = c.ring_addrs().await;
    c.kill_node(&addrs[1]).await;

    let err = c.meta().remove_node(&addrs[1]).await.unwrap_err();
    assert!(err.to_string().contains("migration"));
    assert_eq!(c.ring_addrs().await.len(), 2);
}

/// Reads fail while a block's owner is down, and recover when it returns.
#[tokio::test]
async fn test_read_fails_while_owner_down() {
    let c = IntegrationCluster::new(3).await;
    let data = test_data_seeded(40_000, 11);
    c.write_file("big", &data).await.unwrap();

    let mut victim = String::new();
    let mut most = 0;
    for addr in c.ring_addrs().await {
        let count = c.block_count(&addr).await;
        if count > most {
            (victim, most) = (addr, count);
        }
    }
    assert!(most > 0, "some node should own blocks");
    c.kill_node(&victim).await;
    assert!(c.read_file("big").await.is_err());

    c.revive_node(&victim).await;
    assert_eq!(c.read_file("big").await.unwrap(), data);
}
