//! # peerkv Store
//!
//! The local half of the replicated store: a map from key to a set of
//! [`ValueRecord`](peerkv_core::ValueRecord)s, behind the async [`Store`] trait.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait the node replicates through
//! - [`MemoryStore`] - Process-lifetime in-memory implementation
//! - [`InsertResult`] - Result of inserting one value
//! - [`ValueSet`] - The ordered value set held under a key
//!
//! ## Design Notes
//!
//! - **Monotonic**: there is no delete; a key's set only grows by union.
//! - **Idempotent inserts**: inserting an identical `(originPeer, data)` twice
//!   returns `AlreadyExists`.
//! - **Bounded waits**: [`Store::wait_for_entry`] resolves when the key's entry
//!   is created or when the timeout elapses, whichever comes first.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use traits::{InsertResult, Store, ValueSet};
