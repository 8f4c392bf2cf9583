use super::Offset;
use crate::storage::Record;
use crate::{Result, SolomqError};
use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const PRODUCE_REQUEST: u32 = 1;
pub const FETCH_REQUEST: u32 = 2;

/// `[total_length][request_type]`
pub const REQUEST_HEADER_SIZE: usize = 8;
/// Bytes of `request_type` counted by `total_length`.
pub const REQUEST_TYPE_SIZE: u32 = 4;
/// `[offset][payload_length]` in front of each fetched record.
pub const FETCHED_RECORD_HEADER_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Produce,
    Fetch,
}

impl RequestKind {
    pub fn from_type(request_type: u32) -> Option<Self> {
        match request_type {
            PRODUCE_REQUEST => Some(Self::Produce),
            FETCH_REQUEST => Some(Self::Fetch),
            _ => None,
        }
    }

    pub fn request_type(self) -> u32 {
        match self {
            Self::Produce => PRODUCE_REQUEST,
            Self::Fetch => FETCH_REQUEST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Produce { payload: Bytes },
    Fetch { from_offset: Offset },
    /// A request type the broker does not serve. Its body is skipped and
    /// nothing is sent back.
    Unknown { request_type: u32, body_len: u32 },
}

impl Request {
    pub fn produce(payload: impl Into<Bytes>) -> Self {
        Self::Produce {
            payload: payload.into(),
        }
    }

    pub fn fetch(from_offset: Offset) -> Self {
        Self::Fetch { from_offset }
    }

    pub fn request_type(&self) -> u32 {
        match self {
            Self::Produce { .. } => PRODUCE_REQUEST,
            Self::Fetch { .. } => FETCH_REQUEST,
            Self::Unknown { request_type, .. } => *request_type,
        }
    }

    pub fn kind(&self) -> Option<RequestKind> {
        RequestKind::from_type(self.request_type())
    }

    /// Write the full request envelope, `total_length` included.
    ///
    /// An `Unknown` request is written with a zero-filled body of `body_len` bytes.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        match self {
            Self::Produce { payload } => {
                let payload_len = u32::try_from(payload.len()).map_err(|_| {
                    SolomqError::Protocol(format!(
                        "payload of {} bytes exceeds u32::MAX",
                        payload.len()
                    ))
                })?;
                let total_length = payload_len.checked_add(REQUEST_TYPE_SIZE + 4).ok_or_else(
                    || SolomqError::Protocol("produce request length overflows u32".to_string()),
                )?;
                dst.reserve(REQUEST_HEADER_SIZE + 4 + payload.len());
                dst.put_u32(total_length);
                dst.put_u32(PRODUCE_REQUEST);
                dst.put_u32(payload_len);
                dst.put_slice(payload);
            }
            Self::Fetch { from_offset } => {
                dst.reserve(REQUEST_HEADER_SIZE + 8);
                dst.put_u32(REQUEST_TYPE_SIZE + 8);
                dst.put_u32(FETCH_REQUEST);
                dst.put_u64(*from_offset);
            }
            Self::Unknown {
                request_type,
                body_len,
            } => {
                let total_length = body_len.checked_add(REQUEST_TYPE_SIZE).ok_or_else(|| {
                    SolomqError::Protocol("request length overflows u32".to_string())
                })?;
                dst.reserve(REQUEST_HEADER_SIZE + *body_len as usize);
                dst.put_u32(total_length);
                dst.put_u32(*request_type);
                dst.put_bytes(0, *body_len as usize);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Produce { offset: Offset },
    Fetch { records: Vec<Record> },
}

impl Response {
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        match self {
            Self::Produce { offset } => {
                dst.reserve(8);
                dst.put_u64(*offset);
            }
            Self::Fetch { records } => {
                let count = u32::try_from(records.len()).map_err(|_| {
                    SolomqError::Protocol(format!(
                        "{} records do not fit a fetch response",
                        records.len()
                    ))
                })?;
                let body: usize = records
                    .iter()
                    .map(|r| FETCHED_RECORD_HEADER_SIZE + r.payload.len())
                    .sum();
                dst.reserve(4 + body);
                dst.put_u32(count);
                for record in records {
                    dst.put_u64(record.offset);
                    dst.put_u32(record.payload_len());
                    dst.put_slice(&record.payload);
                }
            }
        }
        Ok(())
    }

    /// Decode the response to a request of `kind` from the front of `src`.
    ///
    /// Returns `Ok(None)` and consumes nothing until the whole response is buffered.
    pub fn decode(kind: RequestKind, src: &mut BytesMut) -> Result<Option<Self>> {
        match kind {
            RequestKind::Produce => {
                if src.len() < 8 {
                    return Ok(None);
                }
                Ok(Some(Self::Produce {
                    offset: src.get_u64(),
                }))
            }
            RequestKind::Fetch => {
                let Some(total) = fetch_response_len(src) else {
                    return Ok(None);
                };
                let mut frame = src.split_to(total).freeze();
                let count = frame.get_u32();
                let mut records = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let offset = frame.get_u64();
                    let payload_len = frame.get_u32() as usize;
                    let payload = frame.split_to(payload_len);
                    records.push(Record::new(offset, payload)?);
                }
                Ok(Some(Self::Fetch { records }))
            }
        }
    }
}

/// Length of the complete fetch response at the front of `src`, if it is all there.
fn fetch_response_len(src: &[u8]) -> Option<usize> {
    let mut cursor = src;
    if cursor.remaining() < 4 {
        return None;
    }
    let count = cursor.get_u32();
    let mut total = 4usize;
    for _ in 0..count {
        if cursor.remaining() < FETCHED_RECORD_HEADER_SIZE {
            return None;
        }
        cursor.advance(8);
        let payload_len = cursor.get_u32() as usize;
        if cursor.remaining() < payload_len {
            return None;
        }
        cursor.advance(payload_len);
        total += FETCHED_RECORD_HEADER_SIZE + payload_len;
    }
    Some(total)
}
