//! The peer directory: every peer this node has learned about.
//!
//! Append-only for the lifetime of the process. A peer that stops answering
//! stays listed; fanout simply fails for it.

use std::sync::{PoisonError, RwLock};

use peerkv_core::PeerRecord;

/// Ordered, deduplicated set of known peers.
///
/// Insertion order is preserved so fanout order is reproducible. Records are
/// keyed by `address`; the owner's own address is never admitted.
#[derive(Debug, Default)]
pub struct PeerDirectory {
    own_address: Option<String>,
    peers: RwLock<Vec<PeerRecord>>,
}

impl PeerDirectory {
    /// Create an empty directory that admits any address.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty directory for the node reachable at `own_address`.
    pub fn for_node(own_address: impl Into<String>) -> Self {
        Self {
            own_address: Some(own_address.into()),
            peers: RwLock::new(Vec::new()),
        }
    }

    /// Append `record` unless a peer with the same address is known.
    ///
    /// Returns true if the record was added.
    pub fn add_peer(&self, record: PeerRecord) -> bool {
        if self.own_address.as_deref() == Some(record.address.as_str()) {
            return false;
        }

        // The vector is only ever appended to, so a poisoned lock still
        // guards a consistent list.
        let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
        if peers.iter().any(|p| p.address == record.address) {
            return false;
        }

        tracing::debug!(address = %record.address, "peer added to directory");
        peers.push(record);
        true
    }

    /// Add every record; returns how many were new.
    pub fn merge(&self, records: impl IntoIterator<Item = PeerRecord>) -> usize {
        records
            .into_iter()
            .filter(|record| self.add_peer(record.clone()))
            .count()
    }

    /// A stable copy of the directory, in insertion order.
    pub fn snapshot(&self) -> Vec<PeerRecord> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|p| p.address == address)
    }

    pub fn len(&self) -> usize {
        self.peers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
