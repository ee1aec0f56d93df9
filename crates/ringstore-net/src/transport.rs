//! TCP transport with length-prefixed postcard framing.
//!
//! Each [`RpcClient`] owns one TCP connection. Requests on a client are
//! strictly sequential: one request frame, then one response frame.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::time::Duration;

use rand::Rng;
use ringstore_types::{Block, BlockHash, FileMetaData, MigrationInstruction};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::error::NetError;
use crate::message::RingMessage;
use crate::{BlockStoreClient, Transport};

/// Maximum frame size: 64 MiB. Blocks are small, but a full block map dump
/// can carry many of them.
pub(crate) const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Delay before the second connect attempt; doubled after each failure.
const INITIAL_BACKOFF: Duration = Duration::from_millis(50);

/// Upper bound on the delay between connect attempts.
const MAX_BACKOFF: Duration = Duration::from_millis(1_000);

/// Timeouts and retry policy for outgoing RPCs.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Budget for a single TCP connect attempt.
    pub connect_timeout: Duration,
    /// Budget for one request/response exchange.
    pub request_timeout: Duration,
    /// Number of connect attempts before giving up. Zero is treated as one.
    pub connect_attempts: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
            connect_attempts: 3,
        }
    }
}

/// Dials ringstore nodes over TCP.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    config: TransportConfig,
}

impl TcpTransport {
    /// Create a transport with the given timeouts.
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// The transport's timeouts and retry policy.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Open a connection to `addr`, retrying with jittered exponential
    /// backoff.
    pub async fn connect_client(&self, addr: &str) -> Result<RpcClient, NetError> {
        let attempts = self.config.connect_attempts.max(1);
        let mut backoff = INITIAL_BACKOFF;
        let mut last_reason = String::new();

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr)).await
            {
                Ok(Ok(stream)) => {
                    // Request/response frames are small; do not batch them.
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(%addr, error = %e, "failed to set TCP_NODELAY");
                    }
                    debug!(%addr, attempt, "connected to peer");
                    return Ok(RpcClient {
                        addr: addr.to_string(),
                        stream,
                        request_timeout: self.config.request_timeout,
                        broken: false,
                    });
                }
                Ok(Err(e)) => last_reason = e.to_string(),
                Err(_) => {
                    last_reason = format!("timed out after {:?}", self.config.connect_timeout)
                }
            }

            if attempt < attempts {
                let jitter_ms = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64 / 2);
                let delay = backoff + Duration::from_millis(jitter_ms);
                debug!(%addr, attempt, reason = %last_reason, ?delay, "connect failed, retrying");
                tokio::time::sleep(delay).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }

        warn!(%addr, attempts, reason = %last_reason, "giving up on peer");
        Err(NetError::Connect {
            addr: addr.to_string(),
            reason: last_reason,
        })
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, addr: &str) -> Result<Box<dyn BlockStoreClient>, NetError> {
        Ok(Box::new(self.connect_client(addr).await?))
    }
}

/// One open connection to a block store or meta store.
///
/// A call that fails partway through an exchange (timeout, I/O error,
/// undecodable frame) may leave a response in flight, so the client is
/// marked broken and every later call fails with [`NetError::Closed`].
#[derive(Debug)]
pub struct RpcClient {
    addr: String,
    stream: TcpStream,
    request_timeout: Duration,
    broken: bool,
}

impl RpcClient {
    /// Send `request` and wait for its response.
    ///
    /// A [`RingMessage::Error`] answer is surfaced as [`NetError::Remote`].
    pub async fn call(&mut self, request: RingMessage) -> Result<RingMessage, NetError> {
        if self.broken {
            return Err(NetError::Closed(self.addr.clone()));
        }

        let kind = request.kind();
        let exchange = async {
            send_message(&mut self.stream, &request).await?;
            recv_message(&mut self.stream)
                .await?
                .ok_or_else(|| NetError::Closed(self.addr.clone()))
        };

        let outcome = tokio::time::timeout(self.request_timeout, exchange).await;
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                self.broken = true;
                return Err(e);
            }
            Err(_) => {
                self.broken = true;
                let _ = self.stream.shutdown().await;
                return Err(NetError::Timeout {
                    addr: self.addr.clone(),
                    after: self.request_timeout,
                });
            }
        };

        match response {
            RingMessage::Error(remote) => {
                debug!(addr = %self.addr, request = kind, error = %remote, "remote returned error");
                Err(NetError::Remote(remote))
            }
            other => Ok(other),
        }
    }

    /// Fetch the meta store's full file metadata map.
    pub async fn get_file_info_map(&mut self) -> Result<BTreeMap<String, FileMetaData>, NetError> {
        match self.call(RingMessage::GetFileInfoMap).await? {
            RingMessage::FileInfoMap(map) => Ok(map),
            other => Err(unexpected("FileInfoMap", &other)),
        }
    }

    /// Propose a new file version. Returns the version now stored.
    pub async fn update_file(&mut self, meta: FileMetaData) -> Result<u64, NetError> {
        match self.call(RingMessage::UpdateFile { meta }).await? {
            RingMessage::Version { latest } => Ok(latest),
            other => Err(unexpected("Version", &other)),
        }
    }

    /// Route block hashes to the block stores that own them.
    pub async fn get_block_store_map(
        &mut self,
        hashes: Vec<BlockHash>,
    ) -> Result<BTreeMap<String, Vec<BlockHash>>, NetError> {
        match self.call(RingMessage::GetBlockStoreMap { hashes }).await? {
            RingMessage::BlockStoreMap(map) => Ok(map),
            other => Err(unexpected("BlockStoreMap", &other)),
        }
    }

    /// Ask the meta store to join `addr` to the ring.
    pub async fn add_node(&mut self, addr: &str) -> Result<(), NetError> {
        let request = RingMessage::AddNode {
            addr: addr.to_string(),
        };
        match self.call(request).await? {
            RingMessage::Done => Ok(()),
            other => Err(unexpected("Done", &other)),
        }
    }

    /// Ask the meta store to remove `addr` from the ring.
    pub async fn remove_node(&mut self, addr: &str) -> Result<(), NetError> {
        let request = RingMessage::RemoveNode {
            addr: addr.to_string(),
        };
        match self.call(request).await? {
            RingMessage::Done => Ok(()),
            other => Err(unexpected("Done", &other)),
        }
    }
}

#[async_trait::async_trait]
impl BlockStoreClient for RpcClient {
    fn peer(&self) -> &str {
        &self.addr
    }

    async fn get_block(&mut self, hash: BlockHash) -> Result<Block, NetError> {
        match self.call(RingMessage::GetBlock { hash }).await? {
            RingMessage::Block(block) => Ok(block),
            other => Err(unexpected("Block", &other)),
        }
    }

    async fn put_block(&mut self, block: &Block) -> Result<BlockHash, NetError> {
        let request = RingMessage::PutBlock {
            block: block.clone(),
        };
        match self.call(request).await? {
            RingMessage::Stored { hash } => Ok(hash),
            other => Err(unexpected("Stored", &other)),
        }
    }

    async fn has_blocks(&mut self, hashes: &[BlockHash]) -> Result<Vec<BlockHash>, NetError> {
        let request = RingMessage::HasBlocks {
            hashes: hashes.to_vec(),
        };
        match self.call(request).await? {
            RingMessage::HashList(list) => Ok(list),
            other => Err(unexpected("HashList", &other)),
        }
    }

    async fn migrate_blocks(&mut self, instruction: &MigrationInstruction) -> Result<(), NetError> {
        let request = RingMessage::MigrateBlocks {
            instruction: instruction.clone(),
        };
        match self.call(request).await? {
            RingMessage::Done => Ok(()),
            other => Err(unexpected("Done", &other)),
        }
    }

    async fn get_block_map(&mut self) -> Result<HashMap<BlockHash, Block>, NetError> {
        match self.call(RingMessage::GetBlockMap).await? {
            RingMessage::BlockMap(map) => Ok(map),
            other => Err(unexpected("BlockMap", &other)),
        }
    }
}

fn unexpected(expected: &str, got: &RingMessage) -> NetError {
    NetError::UnexpectedResponse(format!("expected {expected}, got {}", got.kind()))
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Write one message: 4-byte big-endian length prefix, then the
/// postcard-encoded payload.
pub async fn send_message<W>(writer: &mut W, message: &RingMessage) -> Result<(), NetError>
where
    W: AsyncWrite + Unpin,
{
    let payload =
        postcard::to_allocvec(message).map_err(|e| NetError::Serialization(e.to_string()))?;
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(NetError::FrameTooLarge(payload.len()));
    }

    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one message written by [`send_message`].
///
/// Returns `Ok(None)` if the peer closed the stream cleanly before a new
/// frame started. A close inside the length prefix is an error.
pub async fn recv_message<R>(reader: &mut R) -> Result<Option<RingMessage>, NetError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = reader.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("stream closed after {filled} of 4 length bytes"),
            )
            .into());
        }
        filled += n;
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(NetError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    let message =
        postcard::from_bytes(&payload).map_err(|e| NetError::Serialization(e.to_string()))?;
    Ok(Some(message))
}
