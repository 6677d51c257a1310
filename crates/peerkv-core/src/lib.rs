//! # peerkv Core
//!
//! Pure data types for the peerkv replicated store: peer descriptors,
//! stored values, protocol identifiers and the JSON wire messages.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`NodeId`] - Stable identifier of the local node
//! - [`PeerRecord`] - A dialable peer, merged by address
//! - [`ValueRecord`] - One `(originPeer, data)` member of a key's value set
//! - [`Protocol`] - The three stream protocols a node speaks
//!
//! ## Wire Format
//!
//! Every message is a single JSON document; see [`messages`] for the shapes
//! carried on each protocol.

pub mod error;
pub mod messages;
pub mod types;

pub use error::{CoreError, Result};
pub use messages::{limits, GetRequest, GetResponse, PeerList, PutRequest, WireMessage};
pub use types::{NodeId, PeerRecord, Protocol, ValueRecord};
