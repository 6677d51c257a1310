//! Store trait: the abstract interface for the local value map.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use peerkv_core::ValueRecord;

use crate::error::Result;

/// The value set held under one key.
pub type ValueSet = BTreeSet<ValueRecord>;

/// Result of inserting a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Value was added to the key's set.
    Inserted,
    /// Identical value already present (idempotent - not an error).
    AlreadyExists,
}

/// The Store trait: async interface to the local multivalue map.
///
/// Implementations must serialize writes to a key's set and must never
/// remove an entry or a value once present.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert one value under `key`, creating the entry if absent.
    async fn insert(&self, key: &str, value: ValueRecord) -> Result<InsertResult>;

    /// Union `values` into the set under `key`, creating the entry if absent.
    ///
    /// Returns how many values were new.
    async fn merge(&self, key: &str, values: Vec<ValueRecord>) -> Result<usize>;

    /// Create an empty entry for `key` if none exists.
    ///
    /// Returns true if the entry was created by this call.
    async fn ensure_entry(&self, key: &str) -> Result<bool>;

    /// Get the current set under `key`, or `None` if no entry exists.
    async fn get(&self, key: &str) -> Result<Option<ValueSet>>;

    /// Wait until an entry for `key` exists, up to `timeout`.
    ///
    /// Returns `None` if the entry still does not exist when the timeout
    /// elapses.
    async fn wait_for_entry(&self, key: &str, timeout: Duration) -> Result<Option<ValueSet>>;

    /// List all keys with an entry.
    async fn keys(&self) -> Result<Vec<String>>;
}
