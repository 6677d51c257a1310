//! Inbound stream handlers and the protocol router.
//!
//! Every inbound stream runs in its own task. A handler error ends that
//! stream only.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use peerkv_core::{GetRequest, GetResponse, Protocol, PutRequest, WireMessage};
use peerkv_net::{respond, FramedChannel, InboundStream, NetError, Transport};
use peerkv_store::{InsertResult, Store, ValueSet};

use crate::error::{NodeError, Result};
use crate::node::Node;

/// Read the single request frame of an inbound stream, bounded by `limit`.
async fn recv_request<M, St>(channel: &mut FramedChannel<St>, limit: Duration) -> Result<M>
where
    M: WireMessage,
    St: AsyncRead + AsyncWrite + Unpin,
{
    match tokio::time::timeout(limit, channel.recv_json()).await {
        Ok(request) => Ok(request?),
        Err(_) => Err(NetError::Timeout("waiting for request".into()).into()),
    }
}

impl<S: Store, T: Transport> Node<S, T> {
    /// Serve `putDHT`: read one `{key, val}` frame and store it. Sends nothing.
    pub async fn handle_put<St>(&self, stream: St) -> Result<InsertResult>
    where
        St: AsyncRead + AsyncWrite + Send + Unpin,
    {
        let mut channel = FramedChannel::new(stream, self.inner.config.max_frame_size);
        let limit = self.inner.config.peer_timeout;
        let request: PutRequest = recv_request(&mut channel, limit).await?;

        let outcome = self.inner.store.insert(&request.key, request.val).await?;
        tracing::debug!(key = %request.key, ?outcome, "replicated value received");
        Ok(outcome)
    }

    /// Serve `getDHT`: read one `{key}` frame and answer with the local set.
    ///
    /// A key with no entry yet is waited on for `entry_wait_timeout`; the
    /// answer is an empty set if it never appears.
    pub async fn handle_get<St>(&self, stream: St) -> Result<usize>
    where
        St: AsyncRead + AsyncWrite + Send + Unpin,
    {
        let mut channel = FramedChannel::new(stream, self.inner.config.max_frame_size);
        let limit = self.inner.config.peer_timeout;
        let request: GetRequest = recv_request(&mut channel, limit).await?;

        let values = self
            .inner
            .store
            .wait_for_entry(&request.key, self.inner.config.entry_wait_timeout)
            .await?
            .unwrap_or_else(|| {
                tracing::debug!(key = %request.key, "no entry after wait, answering empty");
                ValueSet::new()
            });

        let response = GetResponse::from_values(request.key, &values);
        channel.send_json(&response).await?;
        channel.close().await.map_err(NetError::from)?;
        Ok(values.len())
    }

    /// Serve `bootstrap`: the responder side of the peer-list exchange.
    pub async fn handle_bootstrap<St>(&self, stream: St) -> Result<usize>
    where
        St: AsyncRead + AsyncWrite + Send + Unpin,
    {
        let config = self.inner.config.bootstrap();
        let learned = respond(stream, &self.inner.own, &self.inner.directory, &config).await?;
        tracing::info!(learned, "answered bootstrap");
        Ok(learned)
    }

    /// Run the handler for one inbound stream's protocol.
    pub async fn handle_inbound(&self, inbound: InboundStream) {
        let InboundStream { protocol, stream } = inbound;
        let span = tracing::info_span!("inbound", %protocol);

        async move {
            let outcome = match protocol {
                Protocol::Bootstrap => self.handle_bootstrap(stream).await.map(drop),
                Protocol::PutDht => self.handle_put(stream).await.map(drop),
                Protocol::GetDht => self.handle_get(stream).await.map(drop),
            };

            match outcome {
                Ok(()) => {}
                Err(NodeError::Net(e @ NetError::Decode(_))) => {
                    tracing::warn!(error = %e, "malformed inbound message");
                }
                Err(e) => tracing::debug!(error = %e, "inbound stream failed"),
            }
        }
        .instrument(span)
        .await
    }
}

impl<S, T> Node<S, T>
where
    S: Store + 'static,
    T: Transport + 'static,
{
    /// Route every stream from `incoming` to its handler.
    ///
    /// Spawns one task per stream. The returned task ends once the
    /// transport drops its sender.
    pub fn serve(&self, mut incoming: mpsc::Receiver<InboundStream>) -> JoinHandle<()> {
        let node = self.clone();
        tokio::spawn(async move {
            while let Some(inbound) = incoming.recv().await {
                let node = node.clone();
                tokio::spawn(async move { node.handle_inbound(inbound).await });
            }
            tracing::debug!("inbound channel closed, router stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use peerkv_core::{NodeId, PeerRecord, ValueRecord};
    use peerkv_net::{encode_frames, MemoryNetwork, MemoryTransport, DEFAULT_MAX_FRAME_SIZE};
    use peerkv_store::MemoryStore;
    use tokio::io::AsyncWriteExt;

    use crate::config::NodeConfig;

    async fn node(network: &Arc<MemoryNetwork>) -> Node<MemoryStore, MemoryTransport> {
        let (transport, _incoming) = network.create_transport("mem://local").await;
        Node::new(
            NodeId::from_bytes([7; 32]),
            MemoryStore::new(),
            transport,
            NodeConfig {
                entry_wait_timeout: Duration::from_millis(50),
                ..NodeConfig::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_handle_put_inserts_value() {
        let node = node(&MemoryNetwork::new()).await;
        let (mut client, server) = tokio::io::duplex(1024);

        let request = PutRequest {
            key: "color".into(),
            val: ValueRecord::new("remote", "red"),
        };
        let frames = encode_frames([request.to_json().unwrap()], DEFAULT_MAX_FRAME_SIZE).unwrap();
        client.write_all(&frames).await.unwrap();

        let outcome = node.handle_put(server).await.unwrap();
        assert_eq!(outcome, InsertResult::Inserted);
        let set = node.store().get("color").await.unwrap().unwrap();
        assert!(set.contains(&ValueRecord::new("remote", "red")));
    }

    #[tokio::test]
    async fn test_handle_put_rejects_malformed_request() {
        let node = node(&MemoryNetwork::new()).await;
        let (mut client, server) = tokio::io::duplex(1024);

        let frames = encode_frames([r#"{"key":"color"}"#], DEFAULT_MAX_FRAME_SIZE).unwrap();
        client.write_all(&frames).await.unwrap();

        let err = node.handle_put(server).await.unwrap_err();
        assert!(matches!(err, NodeError::Net(NetError::Decode(_))));
        assert!(node.store().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handlers_give_up_on_silent_client() {
        let network = MemoryNetwork::new();
        let (transport, _incoming) = network.create_transport("mem://local").await;
        let node = Node::new(
            NodeId::from_bytes([7; 32]),
            MemoryStore::new(),
            transport,
            NodeConfig {
                peer_timeout: Duration::from_millis(100),
                entry_wait_timeout: Duration::from_millis(50),
                ..NodeConfig::default()
            },
        )
        .unwrap();

        // Client halves stay open but never write.
        let (_put_client, put_server) = tokio::io::duplex(1024);
        let (_get_client, get_server) = tokio::io::duplex(1024);
        let bound = Duration::from_secs(2);

        let put = tokio::time::timeout(bound, node.handle_put(put_server))
            .await
            .expect("put handler hung");
        assert!(matches!(put, Err(NodeError::Net(NetError::Timeout(_)))));

        let get = tokio::time::timeout(bound, node.handle_get(get_server))
            .await
            .expect("get handler hung");
        assert!(matches!(get, Err(NodeError::Net(NetError::Timeout(_)))));
        assert!(node.store().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handle_get_answers_existing_entry() {
        let node = node(&MemoryNetwork::new()).await;
        node.store()
            .insert("color", ValueRecord::new("A", "red"))
            .await
            .unwrap();

        let (client, server) = tokio::io::duplex(1024);
        let handler = tokio::spawn({
            let node = node.clone();
            async move { node.handle_get(server).await }
        });

        let mut channel = FramedChannel::new(client, DEFAULT_MAX_FRAME_SIZE);
        channel
            .send_json(&GetRequest {
                key: "color".into(),
            })
            .await
            .unwrap();
        let response: GetResponse = channel.recv_json().await.unwrap();

        assert_eq!(response.key, "color");
        assert_eq!(response.values().unwrap(), vec![ValueRecord::new("A", "red")]);
        assert_eq!(handler.await.unwrap().unwrap(), 1);
        // The handler closes its side after answering.
        assert!(channel.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_handle_get_answers_empty_after_wait() {
        let node = node(&MemoryNetwork::new()).await;
        let (client, server) = tokio::io::duplex(1024);
        let handler = tokio::spawn({
            let node = node.clone();
            async move { node.handle_get(server).await }
        });

        let mut channel = FramedChannel::new(client, DEFAULT_MAX_FRAME_SIZE);
        channel
            .send_json(&GetRequest {
                key: "missing".into(),
            })
            .await
            .unwrap();
        let response: GetResponse = channel.recv_json().await.unwrap();

        assert_eq!(response.key, "missing");
        assert!(response.val.is_empty());
        assert_eq!(handler.await.unwrap().unwrap(), 0);
        // Answering does not create the entry.
        assert!(node.store().get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_handle_bootstrap_learns_initiator() {
        let node = node(&MemoryNetwork::new()).await;
        let (client, server) = tokio::io::duplex(1024);
        let handler = tokio::spawn({
            let node = node.clone();
            async move { node.handle_bootstrap(server).await }
        });

        let mut channel = FramedChannel::new(client, DEFAULT_MAX_FRAME_SIZE);
        let ours: peerkv_core::PeerList = vec![PeerRecord::new("mem://remote", "h", "g")];
        channel.send_json(&ours).await.unwrap();
        let theirs: peerkv_core::PeerList = channel.recv_json().await.unwrap();

        assert_eq!(theirs, vec![node.own_record().clone()]);
        assert_eq!(handler.await.unwrap().unwrap(), 1);
        assert!(node.directory().contains("mem://remote"));
    }

    #[tokio::test]
    async fn test_serve_dispatches_by_protocol() {
        let network = MemoryNetwork::new();
        let (transport, incoming) = network.create_transport("mem://server").await;
        let server = Node::new(
            NodeId::from_bytes([1; 32]),
            MemoryStore::new(),
            transport,
            NodeConfig::default(),
        )
        .unwrap();
        let router = server.serve(incoming);

        let (client, _client_incoming) = network.create_transport("mem://client").await;
        let stream = client.dial("mem://server", Protocol::PutDht).await.unwrap();
        let mut channel = FramedChannel::new(stream, DEFAULT_MAX_FRAME_SIZE);
        channel
            .send_json(&PutRequest {
                key: "k".into(),
                val: ValueRecord::new("client", "v"),
            })
            .await
            .unwrap();
        channel.close().await.unwrap();

        let set = server
            .store()
            .wait_for_entry("k", Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(set.len(), 1);

        network.disconnect("mem://server").await;
        drop(client);
        router.abort();
    }
}
