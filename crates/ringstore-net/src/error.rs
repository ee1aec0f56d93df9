//! Error types for network operations.

use std::time::Duration;

use ringstore_types::RemoteError;

/// Errors that can occur during RPC calls.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Failed to establish a connection to a remote node.
    #[error("failed to connect to {addr}: {reason}")]
    Connect {
        /// Address that was dialed.
        addr: String,
        /// Last failure observed.
        reason: String,
    },

    /// An I/O error on an established connection.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A frame exceeded the maximum message size.
    #[error("message too large: {0} bytes")]
    FrameTooLarge(usize),

    /// The remote did not answer within the request timeout.
    #[error("request to {addr} timed out after {after:?}")]
    Timeout {
        /// Address of the remote.
        addr: String,
        /// Configured request timeout.
        after: Duration,
    },

    /// The peer closed the connection before answering.
    #[error("connection closed by {0}")]
    Closed(String),

    /// The remote answered with a message of the wrong kind.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The remote handled the request and reported a typed failure.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
}

impl NetError {
    /// Whether the failure is a connectivity problem a caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NetError::Connect { .. } | NetError::Io(_) | NetError::Timeout { .. } | NetError::Closed(_)
        )
    }
}
