//! Integration test: write and read files through the cluster.

use ringstore_integration_tests::{BLOCK_SIZE, IntegrationCluster, test_data_seeded};
use ringstore_net::Transport;
use ringstore_types::{BlockHash, FileMetaData};

/// 4-node cluster, write 20 files of varied sizes, read them all back.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_write_read_many_files() {
    let c = IntegrationCluster::new(4).await;

    let mut files = Vec::new();
    for i in 0..20 {
        let data = test_data_seeded(500 + i * 731, i as u32 + 1);
        let name = format!("file-{i:02}");
        assert_eq!(c.write_file(&name, &data).await.unwrap(), 1);
        files.push((name, data));
    }

    for (name, expected) in &files {
        let got = c.read_file(name).await.unwrap();
        assert_eq!(&got, expected, "data mismatch for {name}");
    }
    assert!(c.misrouted_blocks().await.unwrap().is_empty());

    // Blocks spread over more than one node.
    let mut used = 0;
    for addr in c.ring_addrs().await {
        if c.block_count(&addr).await > 0 {
            used += 1;
        }
    }
    assert!(used > 1, "blocks should be spread across nodes");
}

/// Overwriting a file bumps its version and serves the new content.
#[tokio::test]
#[ntest::timeout(30000)]
async fn test_overwrite_bumps_version() {
    let c = IntegrationCluster::new(3).await;

    let v1 = test_data_seeded(5000, 1);
    let v2 = test_data_seeded(3000, 2);
    assert_eq!(c.write_file("doc", &v1).await.unwrap(), 1);
    assert_eq!(c.write_file("doc", &v2).await.unwrap(), 2);

    assert_eq!(c.read_file("doc").await.unwrap(), v2);
    let files = c.meta().get_file_info_map().await;
    assert_eq!(files["doc"].version, 2);
    assert_eq!(files["doc"].block_hash_list.len(), 3000usize.div_ceil(BLOCK_SIZE));
}

/// An empty file has no blocks and reads back empty.
#[tokio::test]
async fn test_empty_file() {
    let c = IntegrationCluster::new(2).await;
    assert_eq!(c.write_file("empty", &[]).await.unwrap(), 1);
    assert!(c.read_file("empty").await.unwrap().is_empty());
    assert!(c.meta().get_file_info_map().await["empty"]
        .block_hash_list
        .is_empty());
}

/// Identical content shared by two files is stored once.
#[tokio::test]
async fn test_identical_blocks_deduplicated() {
    let c = IntegrationCluster::new(3).await;
    let data = test_data_seeded(BLOCK_SIZE * 4, 9);

    c.write_file("a", &data).await.unwrap();
    let mut before = 0;
    for addr in c.ring_addrs().await {
        before += c.block_count(&addr).await;
    }
    c.write_file("b", &data).await.unwrap();
    let mut after = 0;
    for addr in c.ring_addrs().await {
        after += c.block_count(&addr).await;
    }

    assert_eq!(before, 4);
    assert_eq!(before, after);
    assert_eq!(c.read_file("b").await.unwrap(), data);
}

/// Repeated blocks inside one file keep their order in the hash list.
#[tokio::test]
async fn test_repeated_blocks_keep_order() {
    let c = IntegrationCluster::new(2).await;
    let a = vec![b'a'; BLOCK_SIZE];
    let b = vec![b'b'; BLOCK_SIZE];
    let data = [a.clone(), b.clone(), a.clone()].concat();

    c.write_file("aba", &data).await.unwrap();
    let list = c.meta().get_file_info_map().await["aba"].block_hash_list.clone();
    assert_eq!(
        list,
        vec![BlockHash::of(&a), BlockHash::of(&b), BlockHash::of(&a)]
    );
    assert_eq!(c.read_file("aba").await.unwrap(), data);
}

/// Direct block store access: missing blocks are reported, not synthesized.
#[tokio::test]
async fn test_has_blocks_and_missing_block() {
    let c = IntegrationCluster::new(2).await;
    let data = test_data_seeded(BLOCK_SIZE * 3, 4);
    c.write_file("f", &data).await.unwrap();

    let hashes = c.meta().get_file_info_map().await["f"].block_hash_list.clone();
    let absent = BlockHash::of(b"never written");
    let routes = c.routes(&hashes).await;
    let transport = c.transport();

    for (addr, owned) in routes {
        let mut client = transport.connect(&addr).await.unwrap();
        let mut query = vec![absent];
        query.extend(owned.iter().copied());
        assert_eq!(client.has_blocks(&query).await.unwrap(), owned);

        let err = client.get_block(absent).await.unwrap_err();
        assert!(err.to_string().contains("not found"), "got {err}");
    }
}

/// The misrouting check surfaces routing failures instead of reporting a
/// clean cluster.
#[tokio::test]
async fn test_misrouted_check_reports_routing_failure() {
    let c = IntegrationCluster::new(0).await;
    c.meta()
        .update_file(FileMetaData::new("orphan", 1, vec![BlockHash::of(b"orphan")]))
        .await
        .unwrap();

    let err = c.misrouted_blocks().await.unwrap_err();
    assert!(format!("{err:#}").contains("ring is empty"), "got {err:#}");
}

/// A block missing from its routed owner is reported.
#[tokio::test]
async fn test_misrouted_check_finds_missing_block() {
    let c = IntegrationCluster::new(2).await;
    let data = test_data_seeded(BLOCK_SIZE * 2, 12);
    c.write_file("f", &data).await.unwrap();
    assert!(c.misrouted_blocks().await.unwrap().is_empty());

    let ghost = BlockHash::of(b"committed but never uploaded");
    c.meta()
        .update_file(FileMetaData::new("ghost", 1, vec![ghost]))
        .await
        .unwrap();
    assert_eq!(c.misrouted_blocks().await.unwrap(), vec![ghost]);
}
