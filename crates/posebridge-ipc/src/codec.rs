//! Frame codec: 4-byte little-endian length prefix followed by a CBOR message
//!
//! The length counts the header itself, so the smallest legal frame is 4 bytes.

use posebridge_core::Message;
use thiserror::Error;

pub const HEADER_LEN: usize = 4;

/// Largest frame accepted in either direction
pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Frame too large: {0} bytes")]
    TooLarge(usize),
    #[error("Frame too short: {0} bytes")]
    TooShort(usize),
    #[error("CBOR encode error: {0}")]
    Encode(#[source] serde_cbor::Error),
    #[error("CBOR decode error: {0}")]
    Decode(#[source] serde_cbor::Error),
}

impl FrameError {
    /// Errors after which the byte stream can no longer be trusted
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TooLarge(_) | Self::TooShort(_))
    }
}

fn encode_header(frame_len: u32) -> [u8; HEADER_LEN] {
    frame_len.to_le_bytes()
}

fn decode_header(data: &[u8]) -> Option<usize> {
    let bytes: [u8; HEADER_LEN] = data.get(..HEADER_LEN)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes) as usize)
}

/// Encode one message into a complete frame
pub fn encode_frame(message: &Message) -> Result<Vec<u8>, FrameError> {
    let body = serde_cbor::to_vec(message).map_err(FrameError::Encode)?;
    let frame_len = HEADER_LEN + body.len();
    if frame_len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(frame_len));
    }

    let mut frame = Vec::with_capacity(frame_len);
    frame.extend_from_slice(&encode_header(frame_len as u32));
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Reassembles frames from a byte stream
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Next complete message, `Ok(None)` if more bytes are needed
    ///
    /// A frame whose body fails to decode is consumed before the error is
    /// returned, so decoding can continue with the following frame.
    pub fn next_frame(&mut self) -> Result<Option<Message>, FrameError> {
        let Some(frame_len) = decode_header(&self.buf) else {
            return Ok(None);
        };
        if frame_len < HEADER_LEN {
            return Err(FrameError::TooShort(frame_len));
        }
        if frame_len > MAX_FRAME_LEN {
            return Err(FrameError::TooLarge(frame_len));
        }
        if self.buf.len() < frame_len {
            return Ok(None);
        }

        let result = serde_cbor::from_slice(&self.buf[HEADER_LEN..frame_len]);
        self.buf.drain(..frame_len);
        result.map(Some).map_err(FrameError::Decode)
    }
}
