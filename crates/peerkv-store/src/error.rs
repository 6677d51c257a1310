//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
///
/// These are local invariant violations; the node treats them as fatal.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A writer panicked while holding the store lock.
    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
