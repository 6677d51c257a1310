//! # peerkv Net
//!
//! Everything between the replicated store and the raw byte streams.
//!
//! ## Overview
//!
//! - [`framing`]: length-prefixed frames (`u32` big-endian length + UTF-8
//!   payload) over any `AsyncRead`/`AsyncWrite`.
//! - [`transport`]: the [`Transport`] trait that dials a peer on a protocol,
//!   with an in-memory network for tests and a TCP transport.
//! - [`directory`]: the append-only [`PeerDirectory`].
//! - [`bootstrap`]: the one-shot peer-list exchange that seeds the directory.
//!
//! ## Bootstrap Flow
//!
//! ```text
//! Initiator                         Responder
//!   |---- dial(addr, "bootstrap") ---->|
//!   |---- [own, ..known] ------------->|
//!   |<--- [own, ..known] --------------|
//!   merge                            merge
//! ```
//!
//! Both sides write and read concurrently; neither waits for the other's
//! list before sending its own.

pub mod bootstrap;
pub mod directory;
pub mod error;
pub mod framing;
pub mod transport;

pub use bootstrap::{bootstrap_all, respond, Bootstrap, BootstrapConfig, BootstrapState};
pub use directory::PeerDirectory;
pub use error::{FramingError, NetError, Result};
pub use framing::{
    encode_frames, read_frames, write_frames, FrameCodec, FramedChannel, DEFAULT_MAX_FRAME_SIZE,
};
pub use transport::{
    memory::MemoryNetwork, memory::MemoryTransport, tcp::TcpTransport, RawStream,
    InboundStream, PeerStream, Transport,
};
