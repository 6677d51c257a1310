//! Error types for the net module.

use peerkv_core::CoreError;
use thiserror::Error;

/// Errors produced while reading or writing frames.
///
/// A framing error terminates the stream it occurred on and nothing else.
#[derive(Debug, Error)]
pub enum FramingError {
    /// Frame length exceeds the configured maximum.
    #[error("frame exceeds maximum size of {max} bytes")]
    FrameTooLarge { max: usize },

    /// Stream closed in the middle of a frame.
    #[error("stream closed mid-frame with {remaining} bytes buffered")]
    Truncated { remaining: usize },

    #[error("frame payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Stream closed where a frame was required.
    #[error("stream closed before a frame arrived")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while talking to a peer.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Peer unreachable or protocol unsupported.
    #[error("dial {address} failed: {reason}")]
    Dial { address: String, reason: String },

    /// No progress within the bound for a peer operation.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Payload is not valid JSON or is missing expected fields.
    #[error("decode error: {0}")]
    Decode(#[from] CoreError),

    /// Well-formed message that does not answer the request.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NetError {
    pub(crate) fn dial(address: &str, reason: impl ToString) -> Self {
        NetError::Dial {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for net operations.
pub type Result<T> = std::result::Result<T, NetError>;
