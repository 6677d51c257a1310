//! # peerkv
//!
//! A minimal peer-to-peer replicated key-value store over raw duplex streams.
//!
//! ## Overview
//!
//! Each key maps to a set of `(originPeer, data)` values. Sets only grow:
//! a put adds a value locally and pushes it to every known peer, a get pulls
//! every known peer's set and unions it into the local one. There is no
//! routing table and no consensus; a peer that is down is skipped.
//!
//! Peers are learned through a one-shot bootstrap exchange against the
//! configured bootstrap addresses.
//!
//! ## Protocols
//!
//! | Protocol    | Request              | Response              |
//! |-------------|----------------------|-----------------------|
//! | `bootstrap` | peer list            | peer list             |
//! | `putDHT`    | `{key, val}`         | none                  |
//! | `getDHT`    | `{key}`              | `{key, val: [string]}` |
//!
//! Every message is one length-prefixed JSON frame.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use peerkv::{Node, NodeConfig, NodeId};
//! use peerkv::net::TcpTransport;
//! use peerkv::store::MemoryStore;
//!
//! async fn example() -> peerkv::Result<()> {
//!     let (transport, incoming) = TcpTransport::bind("127.0.0.1:4001").await?;
//!     let node = Node::new(NodeId::random(), MemoryStore::new(), transport, NodeConfig::default())?;
//!     node.serve(incoming);
//!
//!     node.bootstrap("127.0.0.1:4000").await;
//!     node.put("color", "red").await?;
//!     let values = node.get("color").await?;
//!     println!("{} value(s)", values.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `peerkv::core` - Data types and wire messages
//! - `peerkv::store` - The local store
//! - `peerkv::net` - Framing, transports, directory and bootstrap

pub mod config;
pub mod error;
pub mod fanout;
mod handlers;
pub mod node;

// Re-export component crates
pub use peerkv_core as core;
pub use peerkv_net as net;
pub use peerkv_store as store;

pub use config::NodeConfig;
pub use error::{NodeError, Result};
pub use fanout::{FanoutReport, PeerFailure};
pub use node::Node;

// Re-export commonly used types
pub use peerkv_core::{NodeId, PeerRecord, Protocol, ValueRecord};
pub use peerkv_net::BootstrapState;
pub use peerkv_store::ValueSet;
