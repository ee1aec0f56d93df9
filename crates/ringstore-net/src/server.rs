//! Accept loop for incoming RPC connections.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::NetError;
use crate::message::RingMessage;
use crate::transport::{recv_message, send_message};

/// Answers decoded requests.
///
/// Implemented by the block store and the meta store. Failures are reported
/// in-band as [`RingMessage::Error`] so the connection stays usable.
#[async_trait::async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Produce the response for one request.
    async fn handle(&self, request: RingMessage) -> RingMessage;
}

/// First pause after a failed `accept`.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);
/// Longest pause between failed `accept`s.
const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Accept connections on `listener` forever, serving each on its own task.
///
/// Accept failures (descriptor exhaustion, aborted handshakes) are logged
/// and retried with a growing pause; they never end the loop.
pub async fn serve<H>(listener: TcpListener, handler: Arc<H>) -> Result<(), NetError>
where
    H: RequestHandler,
{
    if let Ok(local) = listener.local_addr() {
        info!(addr = %local, "serving requests");
    }

    let mut backoff: Option<Duration> = None;
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => {
                backoff = None;
                accepted
            }
            Err(e) => {
                let delay = next_accept_backoff(backoff);
                warn!(error = %e, ?delay, "accept failed");
                backoff = Some(delay);
                tokio::time::sleep(delay).await;
                continue;
            }
        };
        debug!(%peer, "accepted connection");
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, handler.as_ref()).await {
                warn!(%peer, error = %e, "connection ended with error");
            }
        });
    }
}

fn next_accept_backoff(previous: Option<Duration>) -> Duration {
    match previous {
        None => ACCEPT_BACKOFF,
        Some(d) => (d * 2).min(MAX_ACCEPT_BACKOFF),
    }
}

async fn handle_connection<H>(mut stream: TcpStream, handler: &H) -> Result<(), NetError>
where
    H: RequestHandler,
{
    stream.set_nodelay(true)?;
    while let Some(request) = recv_message(&mut stream).await? {
        let kind = request.kind();
        let response = handler.handle(request).await;
        if let RingMessage::Error(e) = &response {
            debug!(request = kind, error = %e, "request failed");
        }
        send_message(&mut stream, &response).await?;
    }
    Ok(())
}
