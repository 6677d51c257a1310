//! Length-prefixed message framing.
//!
//! Every message on every protocol is one frame:
//!
//! ```text
//! +----------------+---------------------------+
//! | len: u32 (BE)  | payload: len bytes, UTF-8 |
//! +----------------+---------------------------+
//! ```
//!
//! Frames are self-delimiting, so a decoder reconstructs message boundaries
//! from the byte order alone, however the bytes were chunked in transit.

use bytes::{Bytes, BytesMut};
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{
    Decoder, Encoder, Framed, FramedRead, FramedWrite, LengthDelimitedCodec,
    LengthDelimitedCodecError,
};

use peerkv_core::WireMessage;

use crate::error::{FramingError, Result};

/// Width of the length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Default maximum payload size of a single frame (1 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Codec turning frames into `String` messages and back.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    length_codec: LengthDelimitedCodec,
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a codec rejecting payloads longer than `max_frame_size` bytes.
    pub fn new(max_frame_size: usize) -> Self {
        let length_codec = LengthDelimitedCodec::builder()
            .length_field_length(LENGTH_PREFIX_LEN)
            .big_endian()
            .max_frame_length(max_frame_size)
            .new_codec();

        Self {
            length_codec,
            max_frame_size,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    fn map_io(&self, err: std::io::Error) -> FramingError {
        let too_large = err
            .get_ref()
            .is_some_and(|inner| inner.is::<LengthDelimitedCodecError>());
        if too_large {
            FramingError::FrameTooLarge {
                max: self.max_frame_size,
            }
        } else {
            FramingError::Io(err)
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = String;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> std::result::Result<Option<String>, FramingError> {
        let frame = match self.length_codec.decode(src) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(None),
            Err(err) => return Err(self.map_io(err)),
        };

        Ok(Some(String::from_utf8(frame.to_vec())?))
    }

    fn decode_eof(
        &mut self,
        src: &mut BytesMut,
    ) -> std::result::Result<Option<String>, FramingError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FramingError::Truncated {
                remaining: src.len(),
            }),
        }
    }
}

impl<'a> Encoder<&'a str> for FrameCodec {
    type Error = FramingError;

    fn encode(&mut self, item: &'a str, dst: &mut BytesMut) -> std::result::Result<(), FramingError> {
        if item.len() > self.max_frame_size {
            return Err(FramingError::FrameTooLarge {
                max: self.max_frame_size,
            });
        }

        self.length_codec
            .encode(Bytes::copy_from_slice(item.as_bytes()), dst)
            .map_err(|err| self.map_io(err))
    }
}

impl Encoder<String> for FrameCodec {
    type Error = FramingError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> std::result::Result<(), FramingError> {
        Encoder::<&str>::encode(self, item.as_str(), dst)
    }
}

/// Encode `messages` into one contiguous buffer of frames, in order.
pub fn encode_frames<I, S>(
    messages: I,
    max_frame_size: usize,
) -> std::result::Result<BytesMut, FramingError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut codec = FrameCodec::new(max_frame_size);
    let mut buf = BytesMut::new();
    for message in messages {
        Encoder::<&str>::encode(&mut codec, message.as_ref(), &mut buf)?;
    }
    Ok(buf)
}

/// Write a lazy sequence of messages to `writer`, then shut it down.
pub async fn write_frames<W, M>(
    writer: W,
    messages: M,
    max_frame_size: usize,
) -> std::result::Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
    M: Stream<Item = String> + Unpin,
{
    let mut sink = FramedWrite::new(writer, FrameCodec::new(max_frame_size));
    let mut messages = messages.map(Ok);
    sink.send_all(&mut messages).await?;
    SinkExt::<String>::close(&mut sink).await
}

/// Decode frames from `reader` lazily until it closes.
pub fn read_frames<R: AsyncRead>(reader: R, max_frame_size: usize) -> FramedRead<R, FrameCodec> {
    FramedRead::new(reader, FrameCodec::new(max_frame_size))
}

/// A duplex stream carrying frames in both directions.
#[derive(Debug)]
pub struct FramedChannel<S> {
    inner: Framed<S, FrameCodec>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> FramedChannel<S> {
    pub fn new(stream: S, max_frame_size: usize) -> Self {
        Self {
            inner: Framed::new(stream, FrameCodec::new(max_frame_size)),
        }
    }

    /// Send one message as a frame and flush it.
    pub async fn send(&mut self, message: &str) -> std::result::Result<(), FramingError> {
        self.inner.send(message).await
    }

    /// Receive the next message, or `None` once the peer closed cleanly.
    pub async fn recv(&mut self) -> std::result::Result<Option<String>, FramingError> {
        self.inner.next().await.transpose()
    }

    pub async fn send_json<T: WireMessage>(&mut self, message: &T) -> Result<()> {
        let json = message.to_json()?;
        self.send(&json).await?;
        Ok(())
    }

    /// Receive exactly one JSON message.
    pub async fn recv_json<T: WireMessage>(&mut self) -> Result<T> {
        let frame = self.recv().await?.ok_or(FramingError::Closed)?;
        Ok(T::from_json(&frame)?)
    }

    /// Flush and shut down the write side.
    pub async fn close(&mut self) -> std::result::Result<(), FramingError> {
        SinkExt::<&str>::close(&mut self.inner).await
    }

    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use proptest::prelude::*;
    use tokio_test::io::Builder;

    fn collect_frames(
        chunks: &[&[u8]],
        max: usize,
    ) -> Vec<std::result::Result<String, FramingError>> {
        let mut builder = Builder::new();
        for chunk in chunks {
            builder.read(chunk);
        }
        let mock = builder.build();

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(read_frames(mock, max).collect::<Vec<_>>())
    }

    #[test]
    fn test_frame_layout() {
        let buf = encode_frames(["hi", ""], DEFAULT_MAX_FRAME_SIZE).unwrap();
        assert_eq!(&buf[..], &[0, 0, 0, 2, b'h', b'i', 0, 0, 0, 0]);
    }

    #[test]
    fn test_length_counts_utf8_bytes() {
        let buf = encode_frames(["é"], DEFAULT_MAX_FRAME_SIZE).unwrap();
        assert_eq!(&buf[..4], &[0, 0, 0, 2]);
    }

    #[test]
    fn test_decode_byte_by_byte() {
        let buf = encode_frames(["hello", "world"], DEFAULT_MAX_FRAME_SIZE).unwrap();
        let chunks: Vec<&[u8]> = buf.chunks(1).collect();

        let frames: Vec<String> = collect_frames(&chunks, DEFAULT_MAX_FRAME_SIZE)
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(frames, vec!["hello".to_string(), "world".to_string()]);
    }

    #[test]
    fn test_truncated_payload_fails() {
        let buf = encode_frames(["hello"], DEFAULT_MAX_FRAME_SIZE).unwrap();
        let frames = collect_frames(&[&buf[..buf.len() - 1]], DEFAULT_MAX_FRAME_SIZE);
        assert!(matches!(
            frames.last(),
            Some(Err(FramingError::Truncated { .. }))
        ));
    }

    #[test]
    fn test_truncated_prefix_fails() {
        let frames = collect_frames(&[&[0, 0]], DEFAULT_MAX_FRAME_SIZE);
        assert!(matches!(
            frames.last(),
            Some(Err(FramingError::Truncated { .. }))
        ));
    }

    #[test]
    fn test_clean_close_yields_nothing() {
        let frames = collect_frames(&[], DEFAULT_MAX_FRAME_SIZE);
        assert!(frames.is_empty());
    }

    #[test]
    fn test_oversized_frame_rejected_on_decode() {
        let frames = collect_frames(&[&[0, 0, 0, 9]], 8);
        assert!(matches!(
            frames.first(),
            Some(Err(FramingError::FrameTooLarge { max: 8 }))
        ));
    }

    #[test]
    fn test_oversized_frame_rejected_on_encode() {
        let err = encode_frames(["123456789"], 8).unwrap_err();
        assert!(matches!(err, FramingError::FrameTooLarge { max: 8 }));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let frames = collect_frames(&[&[0, 0, 0, 2, 0xff, 0xfe]], DEFAULT_MAX_FRAME_SIZE);
        assert!(matches!(frames.first(), Some(Err(FramingError::InvalidUtf8(_)))));
    }

    #[tokio::test]
    async fn test_write_frames_then_read() {
        let (client, server) = tokio::io::duplex(64);
        let messages = vec!["a".to_string(), "b".repeat(200), "c".to_string()];

        let writer = tokio::spawn(write_frames(
            client,
            stream::iter(messages.clone()),
            DEFAULT_MAX_FRAME_SIZE,
        ));

        let received: Vec<String> = read_frames(server, DEFAULT_MAX_FRAME_SIZE)
            .map(|r| r.unwrap())
            .collect()
            .await;

        writer.await.unwrap().unwrap();
        assert_eq!(received, messages);
    }

    #[tokio::test]
    async fn test_channel_request_response() {
        let (a, b) = tokio::io::duplex(1024);
        let mut left = FramedChannel::new(a, DEFAULT_MAX_FRAME_SIZE);
        let mut right = FramedChannel::new(b, DEFAULT_MAX_FRAME_SIZE);

        left.send("ping").await.unwrap();
        assert_eq!(right.recv().await.unwrap().as_deref(), Some("ping"));

        right.send("pong").await.unwrap();
        right.close().await.unwrap();
        assert_eq!(left.recv().await.unwrap().as_deref(), Some("pong"));
        assert!(left.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recv_json_on_closed_stream() {
        let (a, b) = tokio::io::duplex(1024);
        drop(a);
        let mut channel = FramedChannel::new(b, DEFAULT_MAX_FRAME_SIZE);

        let err = channel
            .recv_json::<peerkv_core::GetRequest>()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::NetError::Framing(FramingError::Closed)
        ));
    }

    proptest! {
        #[test]
        fn decode_inverts_encode_under_any_chunking(
            messages in prop::collection::vec(".{0,64}", 0..16),
            chunk_size in 1usize..32,
        ) {
            let buf = encode_frames(&messages, DEFAULT_MAX_FRAME_SIZE).unwrap();
            let chunks: Vec<&[u8]> = buf.chunks(chunk_size).collect();

            let decoded: Vec<String> = collect_frames(&chunks, DEFAULT_MAX_FRAME_SIZE)
                .into_iter()
                .map(|r| r.unwrap())
                .collect();
            prop_assert_eq!(decoded, messages);
        }
    }
}
