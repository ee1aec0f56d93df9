//! `ringstored`: the ringstore daemon and admin tool.
//!
//! Runs a block store or the meta store, and talks to a running cluster.
//!
//! # Usage
//!
//! ```text
//! ringstored block-store -l 127.0.0.1:4821          # start a block store
//! ringstored meta-store -b 127.0.0.1:4821           # start the meta store
//! ringstored -c ringstore.toml meta-store           # start with a config file
//! ringstored add-node 127.0.0.1:4822                # join a block store
//! ringstored remove-node 127.0.0.1:4821             # drain and remove one
//! ringstored files                                  # list file versions
//! ringstored route <hash>...                        # show block owners
//! ringstored blocks 127.0.0.1:4822                  # dump a block store
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ringstore_meta::MetaStore;
use ringstore_net::{BlockStoreClient, RequestHandler, RpcClient, TcpTransport, serve};
use ringstore_placement::HashRing;
use ringstore_store::BlockStore;
use ringstore_types::BlockHash;
use tokio::net::TcpListener;
use tracing::info;

use config::CliConfig;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "ringstored",
    version,
    about = "Consistent-hash sharded block storage"
)]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Meta store address used by the admin commands.
    #[arg(
        short,
        long,
        global = true,
        env = "RINGSTORE_META",
        default_value = "127.0.0.1:4820"
    )]
    meta: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a block store.
    BlockStore {
        /// Override listen address.
        #[arg(short, long)]
        listen_addr: Option<String>,
    },

    /// Run the meta store.
    MetaStore {
        /// Override listen address.
        #[arg(short, long)]
        listen_addr: Option<String>,

        /// Block store placed on the initial ring. Can be repeated; replaces
        /// `[ring] block_stores` when given.
        #[arg(short, long)]
        block_store: Vec<String>,
    },

    /// Join a block store to the ring.
    AddNode {
        /// Block store address.
        addr: String,
    },

    /// Move a block store's blocks to its successor and remove it.
    RemoveNode {
        /// Block store address.
        addr: String,
    },

    /// List every file's version and block count.
    Files,

    /// Show which block store owns each hash.
    Route {
        /// Hex-encoded block hashes.
        #[arg(required = true)]
        hashes: Vec<BlockHash>,
    },

    /// List the blocks held by one block store.
    Blocks {
        /// Block store address.
        addr: String,
    },
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    setup_tracing(&config.log.level);

    match cli.command {
        Commands::BlockStore { listen_addr } => {
            if let Some(addr) = listen_addr {
                config.node.listen_addr = addr;
            }
            cmd_block_store(config).await
        }
        Commands::MetaStore {
            listen_addr,
            block_store,
        } => {
            // CLI args override config file values.
            if let Some(addr) = listen_addr {
                config.node.listen_addr = addr;
            }
            if !block_store.is_empty() {
                config.ring.block_stores = block_store;
            }
            cmd_meta_store(config).await
        }
        Commands::AddNode { addr } => {
            let mut meta = connect(&config, &cli.meta).await?;
            meta.add_node(&addr)
                .await
                .with_context(|| format!("failed to add {addr}"))?;
            println!("added {addr}");
            Ok(())
        }
        Commands::RemoveNode { addr } => {
            let mut meta = connect(&config, &cli.meta).await?;
            meta.remove_node(&addr)
                .await
                .with_context(|| format!("failed to remove {addr}"))?;
            println!("removed {addr}");
            Ok(())
        }
        Commands::Files => cmd_files(&config, &cli.meta).await,
        Commands::Route { hashes } => cmd_route(&config, &cli.meta, hashes).await,
        Commands::Blocks { addr } => cmd_blocks(&config, &addr).await,
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// -----------------------------------------------------------------------
// Servers
// -----------------------------------------------------------------------

async fn cmd_block_store(config: CliConfig) -> Result<()> {
    let ring_size = config.ring_size()?;
    let transport = Arc::new(TcpTransport::new(config.transport_config()));
    let store = Arc::new(BlockStore::in_memory(ring_size, transport));

    info!(addr = %config.node.listen_addr, %ring_size, "starting block store");
    run_server(&config.node.listen_addr, store).await
}

async fn cmd_meta_store(config: CliConfig) -> Result<()> {
    let ring_size = config.ring_size()?;
    let ring = HashRing::with_nodes(ring_size, config.ring.block_stores.iter().cloned())
        .context("invalid [ring] block_stores")?;
    for node in ring.nodes() {
        info!(addr = node.addr(), index = node.index(), "initial ring member");
    }

    let transport = Arc::new(TcpTransport::new(config.transport_config()));
    let meta = Arc::new(MetaStore::new(ring, transport));

    info!(addr = %config.node.listen_addr, %ring_size, "starting meta store");
    run_server(&config.node.listen_addr, meta).await
}

/// Serve `handler` on `addr` until the accept loop fails or Ctrl-C.
async fn run_server<H: RequestHandler>(addr: &str, handler: Arc<H>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tokio::select! {
        result = serve(listener, handler) => result.context("server failed"),
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    }
}

// -----------------------------------------------------------------------
// Admin commands
// -----------------------------------------------------------------------

async fn connect(config: &CliConfig, addr: &str) -> Result<RpcClient> {
    TcpTransport::new(config.transport_config())
        .connect_client(addr)
        .await
        .with_context(|| format!("cannot reach {addr}"))
}

async fn cmd_files(config: &CliConfig, meta_addr: &str) -> Result<()> {
    let mut meta = connect(config, meta_addr).await?;
    let files = meta.get_file_info_map().await?;

    println!("Files: {}", files.len());
    for (name, file) in &files {
        println!(
            "  {name} version={} blocks={}",
            file.version,
            file.block_hash_list.len()
        );
    }
    Ok(())
}

async fn cmd_route(config: &CliConfig, meta_addr: &str, hashes: Vec<BlockHash>) -> Result<()> {
    let mut meta = connect(config, meta_addr).await?;
    let routes = meta.get_block_store_map(hashes).await?;

    for (addr, owned) in &routes {
        println!("{addr}:");
        for hash in owned {
            println!("  {hash}");
        }
    }
    Ok(())
}

async fn cmd_blocks(config: &CliConfig, addr: &str) -> Result<()> {
    let mut store = connect(config, addr).await?;
    let blocks = store.get_block_map().await?;

    let mut entries: Vec<_> = blocks.iter().collect();
    entries.sort_by_key(|(hash, _)| **hash);
    let total: u64 = blocks.values().map(|b| b.size).sum();
    println!("Blocks on {addr}: {} ({total} bytes)", blocks.len());
    for (hash, block) in entries {
        println!("  {hash} size={}", block.size);
    }
    Ok(())
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
