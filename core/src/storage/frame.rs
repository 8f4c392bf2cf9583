//! Record frame codec.
//!
//! Every record is stored on disk as one frame (big-endian):
//!
//! ```text
//! +------------------+--------------+---------------------------+
//! |  payload_length  |    offset    |          payload          |
//! |     (4 bytes)    |   (8 bytes)  |  (payload_length bytes)   |
//! +------------------+--------------+---------------------------+
//! ```
//!
//! The log file is nothing more than the concatenation of these frames. A frame that
//! ends early is reported as [`FrameError::Truncated`]; at the tail of the log this is
//! either a clean end after a crash-free run or the remains of an interrupted write,
//! and the encoding alone cannot tell the two apart.

use crate::protocol::Offset;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::{self, Read};
use thiserror::Error;

/// Size of the `[payload_length][offset]` prefix.
pub const FRAME_HEADER_SIZE: usize = 12;

const MAX_PREALLOCATION: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("truncated frame: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("payload of {len} bytes does not fit a u32 length field")]
    PayloadTooLarge { len: usize },

    #[error("frame I/O error: {0}")]
    Io(#[from] io::Error),
}

/// One immutable log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub offset: Offset,
    pub payload: Bytes,
}

impl Record {
    pub fn new(offset: Offset, payload: impl Into<Bytes>) -> Result<Self, FrameError> {
        let payload = payload.into();
        if u32::try_from(payload.len()).is_err() {
            return Err(FrameError::PayloadTooLarge { len: payload.len() });
        }
        Ok(Self { offset, payload })
    }

    pub fn payload_len(&self) -> u32 {
        // Record::new rejects anything wider.
        self.payload.len() as u32
    }

    /// Bytes this record occupies as a frame.
    pub fn encoded_len(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        dst.put_u32(self.payload_len());
        dst.put_u64(self.offset);
        dst.put_slice(&self.payload);
    }

    /// Decode one frame from the front of `src`, consuming it.
    ///
    /// On `Truncated` nothing is consumed.
    pub fn decode(src: &mut Bytes) -> Result<Self, FrameError> {
        let available = src.len();
        if available < FRAME_HEADER_SIZE {
            return Err(FrameError::Truncated {
                needed: FRAME_HEADER_SIZE,
                available,
            });
        }

        let mut header = [0u8; FRAME_HEADER_SIZE];
        header.copy_from_slice(&src[..FRAME_HEADER_SIZE]);
        let (payload_len, offset) = parse_header(&header);

        let needed = FRAME_HEADER_SIZE + payload_len;
        if available < needed {
            return Err(FrameError::Truncated { needed, available });
        }

        src.advance(FRAME_HEADER_SIZE);
        let payload = src.split_to(payload_len);
        Ok(Self { offset, payload })
    }
}

fn parse_header(header: &[u8; FRAME_HEADER_SIZE]) -> (usize, Offset) {
    let mut cursor = &header[..];
    let payload_len = cursor.get_u32() as usize;
    let offset = cursor.get_u64();
    (payload_len, offset)
}

/// Read the next frame from a byte stream.
///
/// Returns `Ok(None)` when the stream ends exactly on a frame boundary and
/// `Err(FrameError::Truncated)` when it ends inside a frame.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Record>, FrameError> {
    read_frame_within(reader, u64::MAX)
}

/// Like [`read_frame`], for a stream that holds at most `remaining` more bytes.
///
/// A header whose length runs past `remaining` is reported as truncated before any
/// payload byte is read, so a corrupt length costs nothing.
pub fn read_frame_within<R: Read>(
    reader: &mut R,
    remaining: u64,
) -> Result<Option<Record>, FrameError> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let filled = read_full(reader, &mut header)?;
    if filled == 0 {
        return Ok(None);
    }
    if filled < FRAME_HEADER_SIZE {
        return Err(FrameError::Truncated {
            needed: FRAME_HEADER_SIZE,
            available: filled,
        });
    }

    let (payload_len, offset) = parse_header(&header);
    let needed = FRAME_HEADER_SIZE.saturating_add(payload_len);
    if needed as u64 > remaining {
        return Err(FrameError::Truncated {
            needed,
            available: usize::try_from(remaining).unwrap_or(usize::MAX),
        });
    }

    // Unbounded streams still must not turn a corrupt length into a huge up-front allocation.
    let mut payload = Vec::with_capacity(payload_len.min(MAX_PREALLOCATION));
    let filled = reader
        .by_ref()
        .take(payload_len as u64)
        .read_to_end(&mut payload)?;
    if filled < payload_len {
        return Err(FrameError::Truncated {
            needed,
            available: FRAME_HEADER_SIZE + filled,
        });
    }

    Ok(Some(Record {
        offset,
        payload: Bytes::from(payload),
    }))
}

/// Like `read_exact`, but reports how much was read instead of failing at EOF.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
