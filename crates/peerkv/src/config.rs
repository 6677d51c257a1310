//! Node configuration.

use std::time::Duration;

use peerkv_net::{BootstrapConfig, DEFAULT_MAX_FRAME_SIZE};

use crate::error::{NodeError, Result};

/// Configuration for a [`Node`](crate::Node).
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Maximum payload size of a single frame, both directions.
    pub max_frame_size: usize,
    /// Bound on one fanout attempt against one peer.
    pub peer_timeout: Duration,
    /// How long an inbound `getDHT` waits for a missing key's entry.
    pub entry_wait_timeout: Duration,
    /// Bound on one bootstrap exchange, dial included.
    pub bootstrap_timeout: Duration,
    /// Peers contacted in parallel during fanout.
    pub fanout_concurrency: usize,
    /// HTTP endpoint advertised to peers.
    pub http: String,
    /// gRPC endpoint advertised to peers.
    pub grpc: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            peer_timeout: Duration::from_secs(5),
            entry_wait_timeout: Duration::from_secs(2),
            bootstrap_timeout: Duration::from_secs(5),
            fanout_concurrency: 16,
            http: String::new(),
            grpc: String::new(),
        }
    }
}

impl NodeConfig {
    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_size == 0 {
            return Err(NodeError::Config("max_frame_size must be positive".into()));
        }
        if self.fanout_concurrency == 0 {
            return Err(NodeError::Config(
                "fanout_concurrency must be positive".into(),
            ));
        }
        // A responder still waiting when the requester gives up answers nobody.
        if self.entry_wait_timeout >= self.peer_timeout {
            return Err(NodeError::Config(format!(
                "entry_wait_timeout ({:?}) must be shorter than peer_timeout ({:?})",
                self.entry_wait_timeout, self.peer_timeout
            )));
        }
        Ok(())
    }

    /// The bootstrap settings implied by this configuration.
    pub fn bootstrap(&self) -> BootstrapConfig {
        BootstrapConfig {
            timeout: self.bootstrap_timeout,
            max_frame_size: self.max_frame_size,
        }
    }
}
