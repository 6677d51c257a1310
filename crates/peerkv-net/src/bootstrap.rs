//! Bootstrap exchange: the one-shot peer-list swap that seeds the directory.
//!
//! Each side sends `[own record, ..directory snapshot]` as one frame and
//! merges the list it receives. The exchange is not repeated or gossiped.
//!
//! ```text
//! Idle -> Dialing -> Exchanging -> Done
//!            |            |
//!            +------------+------> Failed
//! ```
//!
//! Failure is never fatal: the node keeps running with whatever it knew.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};

use peerkv_core::{PeerList, PeerRecord, Protocol, WireMessage};

use crate::directory::PeerDirectory;
use crate::error::{FramingError, NetError, Result};
use crate::framing::{FrameCodec, DEFAULT_MAX_FRAME_SIZE};
use crate::transport::Transport;

/// Configuration for bootstrap exchanges.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Bound on dial plus exchange.
    pub timeout: Duration,
    /// Maximum frame size accepted from the peer.
    pub max_frame_size: usize,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Progress of one bootstrap attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapState {
    Idle,
    Dialing,
    Exchanging,
    /// Exchange completed.
    Done {
        /// Peers added to the directory by this exchange.
        learned: usize,
    },
    /// Attempt abandoned.
    Failed { reason: String },
}

impl BootstrapState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BootstrapState::Done { .. } | BootstrapState::Failed { .. })
    }

    pub fn is_done(&self) -> bool {
        matches!(self, BootstrapState::Done { .. })
    }
}

/// Initiator side of a bootstrap exchange.
pub struct Bootstrap<'a, T: Transport + ?Sized> {
    transport: &'a T,
    directory: &'a PeerDirectory,
    own: &'a PeerRecord,
    config: &'a BootstrapConfig,
    state: BootstrapState,
}

impl<'a, T: Transport + ?Sized> Bootstrap<'a, T> {
    pub fn new(
        transport: &'a T,
        directory: &'a PeerDirectory,
        own: &'a PeerRecord,
        config: &'a BootstrapConfig,
    ) -> Self {
        Self {
            transport,
            directory,
            own,
            config,
            state: BootstrapState::Idle,
        }
    }

    pub fn state(&self) -> &BootstrapState {
        &self.state
    }

    /// Dial `address` and run the exchange, returning the terminal state.
    ///
    /// The terminal state stays readable through [`Bootstrap::state`].
    pub async fn run(&mut self, address: &str) -> BootstrapState {
        let deadline = Instant::now() + self.config.timeout;

        self.transition(BootstrapState::Dialing);
        let dialed =
            tokio::time::timeout_at(deadline, self.transport.dial(address, Protocol::Bootstrap))
                .await;
        let stream = match dialed {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return self.fail(address, e),
            Err(_) => return self.fail(address, NetError::Timeout("dialing".into())),
        };

        self.transition(BootstrapState::Exchanging);
        let exchanged = tokio::time::timeout_at(
            deadline,
            exchange(stream, self.own, self.directory, self.config.max_frame_size),
        )
        .await;

        match exchanged {
            Ok(Ok(learned)) => {
                tracing::info!(address, learned, "bootstrap complete");
                self.transition(BootstrapState::Done { learned });
            }
            Ok(Err(e)) => return self.fail(address, e),
            Err(_) => return self.fail(address, NetError::Timeout("exchanging peer lists".into())),
        }
        self.state.clone()
    }

    fn transition(&mut self, next: BootstrapState) {
        tracing::trace!(from = ?self.state, to = ?next, "bootstrap transition");
        self.state = next;
    }

    fn fail(&mut self, address: &str, error: NetError) -> BootstrapState {
        tracing::info!(address, error = %error, "bootstrap failed");
        self.transition(BootstrapState::Failed {
            reason: error.to_string(),
        });
        self.state.clone()
    }
}

/// Bootstrap against each address in turn.
///
/// Returns one terminal state per address, in order.
pub async fn bootstrap_all<T: Transport + ?Sized>(
    transport: &T,
    directory: &PeerDirectory,
    own: &PeerRecord,
    addresses: &[String],
    config: &BootstrapConfig,
) -> Vec<(String, BootstrapState)> {
    let mut outcomes = Vec::with_capacity(addresses.len());
    for address in addresses {
        let state = Bootstrap::new(transport, directory, own, config)
            .run(address)
            .await;
        outcomes.push((address.clone(), state));
    }
    outcomes
}

/// Responder side: run the exchange on an inbound `bootstrap` stream.
///
/// Returns the number of peers learned.
pub async fn respond<S>(
    stream: S,
    own: &PeerRecord,
    directory: &PeerDirectory,
    config: &BootstrapConfig,
) -> Result<usize>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    tokio::time::timeout(
        config.timeout,
        exchange(stream, own, directory, config.max_frame_size),
    )
    .await
    .map_err(|_| NetError::Timeout("exchanging peer lists".into()))?
}

/// Send our list and receive theirs concurrently, then merge.
///
/// The exchange is symmetric, so both roles share it.
async fn exchange<S>(
    stream: S,
    own: &PeerRecord,
    directory: &PeerDirectory,
    max_frame_size: usize,
) -> Result<usize>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    let mut outgoing: PeerList = vec![own.clone()];
    outgoing.extend(directory.snapshot());
    let json = outgoing.to_json()?;

    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = FramedRead::new(read_half, FrameCodec::new(max_frame_size));
    let mut writer = FramedWrite::new(write_half, FrameCodec::new(max_frame_size));

    let send = async {
        writer.send(json.as_str()).await?;
        SinkExt::<&str>::close(&mut writer).await
    };
    let recv = async {
        let frame = reader.next().await.transpose()?.ok_or(FramingError::Closed)?;
        Ok::<_, NetError>(PeerList::from_json(&frame)?)
    };

    let (sent, received) = tokio::join!(send, recv);
    sent?;
    let peers = received?;

    Ok(directory.merge(peers))
}
