//! Transport abstraction for peerkv streams.
//!
//! A transport opens one duplex byte stream per request, already bound to a
//! protocol. Inbound streams are delivered on the channel returned when the
//! transport is created; routing them to handlers is the node's job.

use std::fmt;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use peerkv_core::Protocol;

use crate::error::Result;

/// Any bidirectional byte stream a transport can hand out.
pub trait RawStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> RawStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// A stream to or from a peer, with the protocol already negotiated.
pub type PeerStream = Box<dyn RawStream>;

/// A stream opened by a remote peer.
pub struct InboundStream {
    /// The protocol the remote dialed.
    pub protocol: Protocol,
    pub stream: PeerStream,
}

impl fmt::Debug for InboundStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundStream")
            .field("protocol", &self.protocol)
            .finish_non_exhaustive()
    }
}

/// Transport trait for opening protocol streams to peers.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a stream to `address` speaking `protocol`.
    async fn dial(&self, address: &str, protocol: Protocol) -> Result<PeerStream>;

    /// The address peers dial to reach this node.
    fn local_address(&self) -> String;
}

/// An in-process transport for tests.
///
/// Streams are `tokio::io::duplex` pipes handed to the listener registered
/// under the dialed address.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::{mpsc, RwLock};

    use crate::error::NetError;

    /// Buffer size of each in-memory pipe.
    const STREAM_BUFFER: usize = 64 * 1024;

    /// Pending inbound streams per listener.
    const INBOUND_QUEUE: usize = 1000;

    /// Shared state for the memory transport network.
    pub struct MemoryNetwork {
        /// Inbound stream senders for each listening address.
        listeners: RwLock<HashMap<String, mpsc::Sender<InboundStream>>>,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Create a transport listening on `address`.
        ///
        /// Registering an address twice replaces the earlier listener.
        pub async fn create_transport(
            self: &Arc<Self>,
            address: impl Into<String>,
        ) -> (MemoryTransport, mpsc::Receiver<InboundStream>) {
            let address = address.into();
            let (tx, rx) = mpsc::channel(INBOUND_QUEUE);

            self.listeners.write().await.insert(address.clone(), tx);

            let transport = MemoryTransport {
                address,
                network: Arc::clone(self),
            };
            (transport, rx)
        }

        /// Remove the listener on `address`; later dials to it fail.
        pub async fn disconnect(&self, address: &str) {
            self.listeners.write().await.remove(address);
        }
    }

    impl Default for MemoryNetwork {
        fn default() -> Self {
            Self {
                listeners: RwLock::new(HashMap::new()),
            }
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        address: String,
        network: Arc<MemoryNetwork>,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn dial(&self, address: &str, protocol: Protocol) -> Result<PeerStream> {
            let listener = self
                .network
                .listeners
                .read()
                .await
                .get(address)
                .cloned()
                .ok_or_else(|| NetError::dial(address, "peer not found"))?;

            let (local, remote) = tokio::io::duplex(STREAM_BUFFER);
            listener
                .send(InboundStream {
                    protocol,
                    stream: Box::new(remote),
                })
                .await
                .map_err(|_| NetError::dial(address, "peer stopped listening"))?;

            Ok(Box::new(local))
        }

        fn local_address(&self) -> String {
            self.address.clone()
        }
    }
}

/// A TCP transport: one connection per stream.
///
/// The dialer opens each connection by writing a single frame holding the
/// protocol id; everything after it belongs to the protocol.
pub mod tcp {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    use crate::error::NetError;

    /// Longest accepted protocol id.
    pub const MAX_PROTOCOL_ID_LEN: usize = 64;

    /// How long an accepted connection may take to name its protocol.
    const NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(5);

    const INBOUND_QUEUE: usize = 1000;

    /// TCP transport implementation.
    pub struct TcpTransport {
        local_addr: SocketAddr,
        /// Address peers are told to dial; the bound address unless overridden.
        advertised: String,
    }

    impl TcpTransport {
        /// Bind a listener on `addr` and start accepting streams.
        ///
        /// The accept loop stops once the returned receiver is dropped.
        pub async fn bind(addr: &str) -> Result<(Self, mpsc::Receiver<InboundStream>)> {
            let listener = TcpListener::bind(addr).await?;
            let local_addr = listener.local_addr()?;
            let (tx, rx) = mpsc::channel(INBOUND_QUEUE);

            tokio::spawn(accept_loop(listener, tx));
            tracing::info!(%local_addr, "tcp transport listening");

            let advertised = local_addr.to_string();
            Ok((
                Self {
                    local_addr,
                    advertised,
                },
                rx,
            ))
        }

        /// Advertise `address` to peers instead of the bound socket address.
        ///
        /// Needed when binding a wildcard address such as `0.0.0.0`.
        pub fn advertise(mut self, address: impl Into<String>) -> Self {
            self.advertised = address.into();
            self
        }

        pub fn local_addr(&self) -> SocketAddr {
            self.local_addr
        }
    }

    async fn accept_loop(listener: TcpListener, tx: mpsc::Sender<InboundStream>) {
        loop {
            let (mut socket, remote) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            };
            if tx.is_closed() {
                break;
            }

            let tx = tx.clone();
            tokio::spawn(async move {
                let negotiated =
                    tokio::time::timeout(NEGOTIATION_TIMEOUT, read_protocol(&mut socket)).await;
                let protocol = match negotiated {
                    Ok(Ok(protocol)) => protocol,
                    Ok(Err(e)) => {
                        tracing::debug!(%remote, error = %e, "protocol negotiation failed");
                        return;
                    }
                    Err(_) => {
                        tracing::debug!(%remote, "protocol negotiation timed out");
                        return;
                    }
                };

                let inbound = InboundStream {
                    protocol,
                    stream: Box::new(socket),
                };
                // Receiver gone means the node is shutting down.
                let _ = tx.send(inbound).await;
            });
        }
    }

    async fn write_protocol(socket: &mut TcpStream, protocol: Protocol) -> std::io::Result<()> {
        let id = protocol.as_str().as_bytes();
        socket.write_u32(id.len() as u32).await?;
        socket.write_all(id).await?;
        socket.flush().await
    }

    /// Read the negotiation frame without buffering past it.
    async fn read_protocol(socket: &mut TcpStream) -> Result<Protocol> {
        let len = socket.read_u32().await? as usize;
        if len > MAX_PROTOCOL_ID_LEN {
            return Err(crate::FramingError::FrameTooLarge {
                max: MAX_PROTOCOL_ID_LEN,
            }
            .into());
        }

        let mut id = vec![0u8; len];
        socket.read_exact(&mut id).await?;
        let id = String::from_utf8(id).map_err(crate::FramingError::from)?;
        Ok(id.parse::<Protocol>()?)
    }

    #[async_trait]
    impl Transport for TcpTransport {
        async fn dial(&self, address: &str, protocol: Protocol) -> Result<PeerStream> {
            let mut socket = TcpStream::connect(address)
                .await
                .map_err(|e| NetError::dial(address, e))?;
            socket.set_nodelay(true)?;
            write_protocol(&mut socket, protocol)
                .await
                .map_err(|e| NetError::dial(address, e))?;
            Ok(Box::new(socket))
        }

        fn local_address(&self) -> String {
            self.advertised.clone()
        }
    }
}
