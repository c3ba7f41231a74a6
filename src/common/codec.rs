//! # Frame Codec
//!
//! Both directions of the socket share one envelope:
//!
//! ```text
//! [4 bytes: payload length, big-endian u32] [N bytes: payload]
//! ```
//!
//! Images travel client -> server, JSON decisions travel server -> client.
//! The decoder is a pure state machine over a growable buffer so that it can
//! be fed whatever a socket read happens to return: half a prefix, a payload
//! split across many reads, or several pipelined frames in one read.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::{FaceGateError, Result};

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Default upper bound on a single payload (100MB).
pub const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// Prefix `payload` with its length.
///
/// # Errors
/// - `FrameTooLarge` if the payload does not fit in a u32 length.
pub fn encode_frame(payload: &[u8]) -> Result<Bytes> {
    let length = u32::try_from(payload.len()).map_err(|_| FaceGateError::FrameTooLarge {
        length: payload.len(),
        limit: u32::MAX as usize,
    })?;

    let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    frame.put_u32(length);
    frame.extend_from_slice(payload);
    Ok(frame.freeze())
}

/// Where the decoder is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    AwaitingLength,
    AwaitingPayload(usize),
}

/// Incremental length-prefixed frame decoder.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    state: DecodeState,
    max_frame_size: usize,
}

impl FrameDecoder {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            state: DecodeState::AwaitingLength,
            max_frame_size,
        }
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Bytes received but not yet consumed by a complete frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Append freshly read bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Pop the next complete frame, if the buffer holds one.
    ///
    /// # Returns
    /// - `Ok(Some(payload))`: one complete payload; any trailing bytes stay buffered
    /// - `Ok(None)`: more bytes are needed
    /// - `Err(FrameTooLarge)`: the announced length exceeds the limit
    pub fn decode(&mut self) -> Result<Option<Bytes>> {
        if self.state == DecodeState::AwaitingLength {
            if self.buffer.len() < LENGTH_PREFIX_LEN {
                return Ok(None);
            }
            let length = self.buffer.get_u32() as usize;
            if length > self.max_frame_size {
                return Err(FaceGateError::FrameTooLarge {
                    length,
                    limit: self.max_frame_size,
                });
            }
            self.state = DecodeState::AwaitingPayload(length);
        }

        match self.state {
            DecodeState::AwaitingPayload(length) if self.buffer.len() >= length => {
                self.state = DecodeState::AwaitingLength;
                Ok(Some(self.buffer.split_to(length).freeze()))
            }
            _ => Ok(None),
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}
