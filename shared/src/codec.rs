//! Length-prefixed framing for the session byte stream.
//!
//! ```text
//! +-------------------+---------+---------------------+
//! | LEN (4 bytes)     | ID (1)  | PAYLOAD (LEN - 1)   |
//! | u32 little-endian |         |                     |
//! +-------------------+---------+---------------------+
//! ```
//!
//! `LEN` counts the id byte plus the payload, never the prefix itself.

use crate::error::ProtocolError;

/// Size of the length prefix in bytes.
pub const LEN_PREFIX: usize = 4;

/// Default upper bound for `LEN` (1 MiB).
pub const DEFAULT_MAX_FRAME_LEN: u32 = 1_048_576;

/// One protocol message: an id byte and its raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(id: u8, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }

    pub fn empty(id: u8) -> Self {
        Self::new(id, Vec::new())
    }

    pub fn encode(&self) -> Vec<u8> {
        encode(self.id, &self.payload)
    }
}

/// Encodes `id` and `payload` as `LEN ++ id ++ payload`.
pub fn encode(id: u8, payload: &[u8]) -> Vec<u8> {
    let len = (payload.len() + 1) as u32;
    let mut out = Vec::with_capacity(LEN_PREFIX + len as usize);
    out.extend_from_slice(&len.to_le_bytes());
    out.push(id);
    out.extend_from_slice(payload);
    out
}

/// Appends `new_bytes` to `buffer` and extracts every complete frame.
///
/// Incomplete trailing bytes stay in `buffer`, so calling this again with
/// more input continues where the previous call stopped no matter how the
/// stream was chunked. A length prefix of zero or above `max_len` is
/// rejected before anything is allocated for it. Frames completed ahead of
/// a bad prefix are still returned; the prefix stays at the front of
/// `buffer` and the next call reports it.
pub fn feed(
    buffer: &mut Vec<u8>,
    new_bytes: &[u8],
    max_len: u32,
) -> Result<Vec<Frame>, ProtocolError> {
    buffer.extend_from_slice(new_bytes);

    let mut frames = Vec::new();
    let mut offset = 0;

    loop {
        let len = match check_prefix(&buffer[offset..], max_len) {
            Ok(Some(len)) => len,
            Ok(None) => break,
            Err(e) if frames.is_empty() => return Err(e),
            Err(_) => break,
        };

        let end = offset + LEN_PREFIX + len as usize;
        if buffer.len() < end {
            break;
        }

        let id = buffer[offset + LEN_PREFIX];
        let payload = buffer[offset + LEN_PREFIX + 1..end].to_vec();
        frames.push(Frame { id, payload });
        offset = end;
    }

    buffer.drain(..offset);
    Ok(frames)
}

/// Validates the length prefix at the start of `buffered`, if one is there.
pub fn check_prefix(buffered: &[u8], max_len: u32) -> Result<Option<u32>, ProtocolError> {
    if buffered.len() < LEN_PREFIX {
        return Ok(None);
    }
    let mut prefix = [0u8; LEN_PREFIX];
    prefix.copy_from_slice(&buffered[..LEN_PREFIX]);
    let len = u32::from_le_bytes(prefix);

    if len == 0 {
        return Err(ProtocolError::EmptyFrame);
    }
    if len > max_len {
        return Err(ProtocolError::FrameTooLarge { len, max: max_len });
    }
    Ok(Some(len))
}

/// Stateful wrapper around [`feed`] owning the receive buffer.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_frame_len: u32,
}

impl FrameDecoder {
    pub fn new(max_frame_len: u32) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_len,
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Frame>, ProtocolError> {
        feed(&mut self.buffer, bytes, self.max_frame_len)
    }

    /// The violation waiting at the front of the buffer, if any. Set when
    /// [`FrameDecoder::feed`] returned frames that preceded a bad prefix.
    pub fn pending_error(&self) -> Option<ProtocolError> {
        check_prefix(&self.buffer, self.max_frame_len).err()
    }

    /// Number of bytes waiting for the rest of their frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}
