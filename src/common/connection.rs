//! # Framed Socket Halves
//!
//! Async wrappers that move [`FrameDecoder`] output on and off a byte stream.
//!
//! The reader and writer are separate types so that each direction of a
//! socket can be owned by a different task (the client reads responses on a
//! spawned task while its send loop owns the write half).

use bytes::Bytes;
use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::codec::{encode_frame, FrameDecoder};
use super::error::{FaceGateError, Result};

/// Read-side chunk reservation, matching a typical socket receive size.
const READ_CHUNK: usize = 4096;

/// Reads length-prefixed frames from any async byte source.
pub struct FrameReader<R> {
    inner: R,
    decoder: FrameDecoder,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, max_frame_size: usize) -> Self {
        Self {
            inner,
            decoder: FrameDecoder::new(max_frame_size),
        }
    }

    /// Read the next complete frame.
    ///
    /// Bytes belonging to a following frame stay buffered for the next call.
    ///
    /// # Returns
    /// - `Ok(payload)`: one complete payload
    /// - `Err(ConnectionClosed)`: the peer closed while a prefix or payload was outstanding
    /// - `Err(FrameTooLarge)` / `Err(Io)`: the stream is unusable
    pub async fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(payload) = self.decoder.decode()? {
                return Ok(payload);
            }

            let buffer = self.decoder.buffer_mut();
            buffer.reserve(READ_CHUNK);
            let read = self.inner.read_buf(buffer).await?;
            if read == 0 {
                debug!(
                    "🔌 Peer closed with {} bytes pending ({:?})",
                    self.decoder.buffered(),
                    self.decoder.state()
                );
                return Err(FaceGateError::ConnectionClosed);
            }
        }
    }
}

/// Writes length-prefixed frames to any async byte sink.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Send one frame: prefix and payload in a single write, then flush.
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        let frame = encode_frame(payload)?;
        self.inner.write_all(&frame).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
