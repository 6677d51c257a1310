//! Test fixtures and helpers.
//!
//! In-memory clusters of serving nodes for integration tests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use peerkv::net::{InboundStream, MemoryNetwork, MemoryTransport};
use peerkv::store::MemoryStore;
use peerkv::{Node, NodeConfig, NodeId, PeerRecord};

/// A node on the in-memory network.
pub type TestNode = Node<MemoryStore, MemoryTransport>;

/// Timeouts short enough for tests, still ordered the way `validate` wants.
pub fn fast_config() -> NodeConfig {
    NodeConfig {
        peer_timeout: Duration::from_millis(300),
        entry_wait_timeout: Duration::from_millis(100),
        bootstrap_timeout: Duration::from_millis(300),
        ..NodeConfig::default()
    }
}

/// Address of the `i`th cluster node.
pub fn node_address(i: usize) -> String {
    format!("mem://node-{i}")
}

/// Deterministic node id for the `i`th cluster node.
pub fn node_id(i: usize) -> NodeId {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&(i as u64 + 1).to_be_bytes());
    NodeId::from_bytes(bytes)
}

/// A listener that accepts streams and never touches them.
///
/// Dials to it succeed; reads from it hang until the holder drops it.
pub struct SilentPeer {
    pub address: String,
    _incoming: mpsc::Receiver<InboundStream>,
    _transport: MemoryTransport,
}

impl SilentPeer {
    pub fn record(&self) -> PeerRecord {
        PeerRecord::with_address(self.address.clone())
    }
}

/// A set of serving nodes sharing one in-memory network.
pub struct TestCluster {
    pub network: Arc<MemoryNetwork>,
    pub nodes: Vec<TestNode>,
    routers: Vec<JoinHandle<()>>,
}

impl TestCluster {
    /// Start `size` serving nodes with `config`. Nobody knows anybody yet.
    pub async fn new(size: usize, config: NodeConfig) -> Self {
        let network = MemoryNetwork::new();
        let mut cluster = Self {
            network,
            nodes: Vec::with_capacity(size),
            routers: Vec::with_capacity(size),
        };
        for _ in 0..size {
            cluster.add_node(config.clone()).await;
        }
        cluster
    }

    /// Start one more serving node and return its index.
    pub async fn add_node(&mut self, config: NodeConfig) -> usize {
        let i = self.nodes.len();
        let (transport, incoming) = self.network.create_transport(node_address(i)).await;
        let node = match Node::new(node_id(i), MemoryStore::new(), transport, config) {
            Ok(node) => node,
            Err(e) => panic!("invalid test node config: {e}"),
        };

        self.routers.push(node.serve(incoming));
        self.nodes.push(node);
        i
    }

    /// Register a listener at `address` that never answers.
    pub async fn silent_peer(&self, address: &str) -> SilentPeer {
        let (transport, incoming) = self.network.create_transport(address).await;
        SilentPeer {
            address: address.to_string(),
            _incoming: incoming,
            _transport: transport,
        }
    }

    pub fn node(&self, i: usize) -> &TestNode {
        &self.nodes[i]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bootstrap every other node against node 0, in order.
    ///
    /// Later nodes learn the earlier ones through node 0's directory.
    pub async fn bootstrap_star(&self) {
        for node in self.nodes.iter().skip(1) {
            let state = node.bootstrap(&node_address(0)).await;
            assert!(state.is_done(), "bootstrap against node 0 failed: {state:?}");
        }
    }

    /// Take node `i` off the network; dials to it fail from now on.
    pub async fn disconnect(&self, i: usize) {
        self.network.disconnect(&node_address(i)).await;
    }
}

impl Drop for TestCluster {
    fn drop(&mut self) {
        for router in &self.routers {
            router.abort();
        }
    }
}

/// Poll `check` until it holds or `timeout` elapses.
///
/// Replication is fire-and-forget, so tests observing a remote node use this
/// instead of sleeping a fixed amount.
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
