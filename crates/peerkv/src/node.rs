//! The Node: a replicated store instance bound to one transport.
//!
//! The Node owns the local store and the peer directory. Writes land locally
//! first and are then fanned out to every known peer; reads pull every known
//! peer's set into the local one. Replication is best-effort: a peer that
//! cannot be reached is logged and skipped.

use std::sync::Arc;

use peerkv_core::{
    GetRequest, GetResponse, NodeId, PeerRecord, Protocol, PutRequest, ValueRecord, WireMessage,
};
use peerkv_net::{
    bootstrap_all, Bootstrap, BootstrapState, FramedChannel, NetError, PeerDirectory, Transport,
};
use peerkv_store::{Store, ValueSet};

use crate::config::NodeConfig;
use crate::error::{NodeError, Result};
use crate::fanout::{fanout, FanoutReport};

/// A peerkv node.
///
/// Cheap to clone: clones share the same store, directory and transport.
pub struct Node<S: Store, T: Transport> {
    pub(crate) inner: Arc<NodeInner<S, T>>,
}

pub(crate) struct NodeInner<S, T> {
    /// The identity stamped as `originPeer` on local puts.
    pub(crate) id: NodeId,
    /// How this node describes itself to peers.
    pub(crate) own: PeerRecord,
    pub(crate) store: S,
    pub(crate) transport: T,
    pub(crate) directory: PeerDirectory,
    pub(crate) config: NodeConfig,
}

impl<S: Store, T: Transport> Clone for Node<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Store, T: Transport> Node<S, T> {
    /// Create a node serving `store` over `transport`.
    ///
    /// The directory starts empty; populate it with [`Node::bootstrap`].
    pub fn new(id: NodeId, store: S, transport: T, config: NodeConfig) -> Result<Self> {
        config.validate()?;

        let address = transport.local_address();
        let own = PeerRecord::new(address.clone(), config.http.clone(), config.grpc.clone());

        Ok(Self {
            inner: Arc::new(NodeInner {
                id,
                own,
                store,
                transport,
                directory: PeerDirectory::for_node(address),
                config,
            }),
        })
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// The record this node sends in bootstrap exchanges.
    pub fn own_record(&self) -> &PeerRecord {
        &self.inner.own
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn directory(&self) -> &PeerDirectory {
        &self.inner.directory
    }

    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    /// Currently known peers, in insertion order.
    pub fn peers(&self) -> Vec<PeerRecord> {
        self.inner.directory.snapshot()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Bootstrap
    // ─────────────────────────────────────────────────────────────────────────

    /// Exchange peer lists with the node at `address`.
    ///
    /// Never fails: a failed attempt is reported in the returned state and
    /// leaves the directory as it was.
    pub async fn bootstrap(&self, address: &str) -> BootstrapState {
        let config = self.inner.config.bootstrap();
        Bootstrap::new(
            &self.inner.transport,
            &self.inner.directory,
            &self.inner.own,
            &config,
        )
        .run(address)
        .await
    }

    /// Bootstrap against each address in turn.
    pub async fn bootstrap_all(&self, addresses: &[String]) -> Vec<(String, BootstrapState)> {
        let config = self.inner.config.bootstrap();
        bootstrap_all(
            &self.inner.transport,
            &self.inner.directory,
            &self.inner.own,
            addresses,
            &config,
        )
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Put / Get
    // ─────────────────────────────────────────────────────────────────────────

    /// Store `data` under `key` locally, then send it to every known peer.
    ///
    /// The local write completes before any peer is contacted. Peers are
    /// not asked to acknowledge; a delivered put means the frame was written.
    pub async fn put(&self, key: &str, data: impl Into<String>) -> Result<FanoutReport> {
        let value = ValueRecord::new(self.inner.id.to_hex(), data);
        self.inner.store.insert(key, value.clone()).await?;

        let request = PutRequest {
            key: key.to_string(),
            val: value,
        }
        .to_json()
        .map_err(NetError::from)?;

        let peers = self.inner.directory.snapshot();
        let report = fanout(
            Protocol::PutDht,
            peers,
            self.inner.config.fanout_concurrency,
            self.inner.config.peer_timeout,
            |peer| {
                let request = &request;
                async move { self.send_put(&peer.address, request).await }
            },
            |()| Ok::<_, NodeError>(()),
        )
        .await?;

        tracing::debug!(
            key,
            delivered = report.delivered,
            attempted = report.attempted,
            "put replicated"
        );
        Ok(report)
    }

    /// Collect every known peer's values for `key` into the local set.
    ///
    /// Creates the local entry if it does not exist, so peers waiting on
    /// this key are answered. Returns the local set once every peer has
    /// answered, failed or timed out.
    pub async fn get(&self, key: &str) -> Result<ValueSet> {
        self.inner.store.ensure_entry(key).await?;

        let request = GetRequest {
            key: key.to_string(),
        }
        .to_json()
        .map_err(NetError::from)?;

        let peers = self.inner.directory.snapshot();
        let mut merged = Vec::new();
        let report = fanout(
            Protocol::GetDht,
            peers,
            self.inner.config.fanout_concurrency,
            self.inner.config.peer_timeout,
            |peer| {
                let request = &request;
                async move { self.request_get(&peer.address, key, request).await }
            },
            |values| {
                merged.push(values);
                Ok::<_, NodeError>(())
            },
        )
        .await?;

        let mut learned = 0;
        for values in merged {
            learned += self.inner.store.merge(key, values).await?;
        }
        tracing::debug!(
            key,
            learned,
            reached = report.delivered,
            attempted = report.attempted,
            "get merged"
        );

        Ok(self.inner.store.get(key).await?.unwrap_or_default())
    }

    async fn send_put(&self, address: &str, request: &str) -> peerkv_net::Result<()> {
        let stream = self.inner.transport.dial(address, Protocol::PutDht).await?;
        let mut channel = FramedChannel::new(stream, self.inner.config.max_frame_size);
        channel.send(request).await?;
        channel.close().await?;
        Ok(())
    }

    async fn request_get(
        &self,
        address: &str,
        key: &str,
        request: &str,
    ) -> peerkv_net::Result<Vec<ValueRecord>> {
        let stream = self.inner.transport.dial(address, Protocol::GetDht).await?;
        let mut channel = FramedChannel::new(stream, self.inner.config.max_frame_size);
        channel.send(request).await?;

        let response: GetResponse = channel.recv_json().await?;
        if response.key != key {
            return Err(NetError::UnexpectedResponse(format!(
                "asked for key {key:?}, got {:?}",
                response.key
            )));
        }
        Ok(response.values()?)
    }
}
