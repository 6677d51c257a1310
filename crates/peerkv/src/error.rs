//! Error types for the Node.

use peerkv_net::NetError;
use peerkv_store::StoreError;
use thiserror::Error;

/// Errors that can occur during Node operations.
///
/// `put` and `get` only ever fail with [`NodeError::Store`]: network
/// failures are absorbed per peer. Inbound handlers report the network
/// errors that ended their stream.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Network error on a single stream.
    #[error("network error: {0}")]
    Net(#[from] NetError),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for Node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
