//! # peerkv Testkit
//!
//! Testing utilities for peerkv.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: in-memory clusters of serving nodes
//! - **Generators**: Proptest strategies for keys, values and peer lists
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use peerkv_testkit::fixtures::{fast_config, TestCluster};
//!
//! # async fn example() {
//! let cluster = TestCluster::new(2, fast_config()).await;
//! cluster.bootstrap_star().await;
//!
//! cluster.node(0).put("color", "red").await.unwrap();
//! let values = cluster.node(1).get("color").await.unwrap();
//! # }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use peerkv_testkit::generators::{key, value_record};
//!
//! proptest! {
//!     #[test]
//!     fn insert_is_idempotent(key in key(), value in value_record()) {
//!         // ...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{eventually, fast_config, node_address, SilentPeer, TestCluster, TestNode};
