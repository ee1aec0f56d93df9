//! Integration test: concurrent clients.

use std::sync::Arc;

use ringstore_integration_tests::{IntegrationCluster, test_data_seeded};
use ringstore_meta::MetaError;
use ringstore_types::{BlockHash, FileMetaData};

/// Writers racing on the same version: exactly one wins each round, the
/// losers learn the winning version.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30000)]
async fn test_racing_writers_one_winner_per_version() {
    let c = IntegrationCluster::new(2).await;
    let meta = c.meta().clone();

    for version in 1..=5u64 {
        let mut handles = Vec::new();
        for writer in 0..8u8 {
            let meta = meta.clone();
            handles.push(tokio::spawn(async move {
                let hash = BlockHash::of(&[writer, version as u8]);
                meta.update_file(FileMetaData::new("shared", version, vec![hash]))
                    .await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(v) => {
                    assert_eq!(v, version);
                    accepted += 1;
                }
                Err(MetaError::VersionConflict { latest, .. }) => assert_eq!(latest, version),
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(accepted, 1, "round {version}");
    }

    assert_eq!(meta.get_file_info_map().await["shared"].version, 5);
}

/// Distinct files written in parallel all commit at version 1.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30000)]
async fn test_parallel_writes_distinct_files() {
    let c = Arc::new(IntegrationCluster::new(4).await);

    let mut handles = Vec::new();
    for i in 0..16u32 {
        let c = c.clone();
        handles.push(tokio::spawn(async move {
            let name = format!("par-{i}");
            let data = test_data_seeded(3000 + i as usize * 211, 500 + i);
            let version = c.write_file(&name, &data).await.unwrap();
            (name, data, version)
        }));
    }

    let mut files = Vec::new();
    for handle in handles {
        let (name, data, version) = handle.await.unwrap();
        assert_eq!(version, 1);
        files.push((name, data));
    }

    for (name, data) in &files {
        assert_eq!(&c.read_file(name).await.unwrap(), data);
    }
    assert_eq!(c.meta().get_file_info_map().await.len(), 16);
    assert!(c.misrouted_blocks().await.unwrap().is_empty());
}

/// Reads issued while a node joins never hit a node that lacks the block.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30000)]
async fn test_reads_during_join() {
    let mut c = IntegrationCluster::new(3).await;
    let mut files = Vec::new();
    for i in 0..10u32 {
        let data = test_data_seeded(8000, 900 + i);
        let name = format!("hot-{i}");
        c.write_file(&name, &data).await.unwrap();
        files.push((name, data));
    }

    for _ in 0..3 {
        let newcomer = c.spawn_store().await;
        let join = c.meta().add_node(&newcomer);
        let reads = async {
            for _ in 0..5 {
                for (name, data) in &files {
                    assert_eq!(&c.read_file(name).await.unwrap(), data);
                }
            }
        };
        let (joined, ()) = tokio::join!(join, reads);
        joined.unwrap();
    }

    assert_eq!(c.ring_addrs().await.len(), 6);
    assert!(c.misrouted_blocks().await.unwrap().is_empty());
}
