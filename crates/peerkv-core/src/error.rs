//! Error types for peerkv core.

use thiserror::Error;

/// Errors raised while interpreting peerkv data.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Payload is not valid JSON or does not have the expected shape.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Message exceeds a wire limit.
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),

    #[error("invalid node id: {0}")]
    InvalidNodeId(#[from] hex::FromHexError),

    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
