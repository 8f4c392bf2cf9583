//! Broker-side framing.
//!
//! [`BrokerCodec`] turns the byte stream of one connection into [`Request`]s and writes
//! [`Response`]s back. `total_length` is checked against what each request type
//! actually carries; a mismatch means the stream can no longer be trusted and the
//! connection is dropped.

use super::messages::{
    Request, Response, FETCH_REQUEST, PRODUCE_REQUEST, REQUEST_HEADER_SIZE, REQUEST_TYPE_SIZE,
};
use crate::{Result, SolomqError};
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

/// `total_length` of every fetch request.
const FETCH_TOTAL_LENGTH: u32 = REQUEST_TYPE_SIZE + 8;
/// Envelope plus `payload_length`.
const PRODUCE_HEADER_SIZE: usize = REQUEST_HEADER_SIZE + 4;

#[derive(Debug, Default)]
pub struct BrokerCodec {
    max_request_bytes: Option<u32>,
    /// Body bytes of an unknown request still to be discarded.
    skipping: usize,
}

impl BrokerCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject produce payloads longer than `max_request_bytes`.
    pub fn with_max_request_bytes(max_request_bytes: Option<u32>) -> Self {
        Self {
            max_request_bytes,
            skipping: 0,
        }
    }

    fn drain_skipped(&mut self, src: &mut BytesMut) {
        let n = self.skipping.min(src.len());
        src.advance(n);
        self.skipping -= n;
    }

    fn decode_produce(&self, total_length: u32, src: &mut BytesMut) -> Result<Option<Request>> {
        if src.len() < PRODUCE_HEADER_SIZE {
            return Ok(None);
        }
        let payload_len = peek_u32(src, REQUEST_HEADER_SIZE);

        if u64::from(total_length) != u64::from(payload_len) + 8 {
            return Err(SolomqError::Protocol(format!(
                "produce total_length {} does not match payload_length {}",
                total_length, payload_len
            )));
        }
        if let Some(max) = self.max_request_bytes {
            if payload_len > max {
                return Err(SolomqError::Protocol(format!(
                    "produce payload of {} bytes exceeds limit of {}",
                    payload_len, max
                )));
            }
        }

        let frame_len = PRODUCE_HEADER_SIZE + payload_len as usize;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(PRODUCE_HEADER_SIZE);
        let payload: Bytes = src.split_to(payload_len as usize).freeze();
        Ok(Some(Request::Produce { payload }))
    }

    fn decode_fetch(&self, total_length: u32, src: &mut BytesMut) -> Result<Option<Request>> {
        if total_length != FETCH_TOTAL_LENGTH {
            return Err(SolomqError::Protocol(format!(
                "fetch total_length {} must be {}",
                total_length, FETCH_TOTAL_LENGTH
            )));
        }
        if src.len() < REQUEST_HEADER_SIZE + 8 {
            return Ok(None);
        }

        src.advance(REQUEST_HEADER_SIZE);
        Ok(Some(Request::Fetch {
            from_offset: src.get_u64(),
        }))
    }
}

fn peek_u32(src: &[u8], at: usize) -> u32 {
    let mut field = &src[at..at + 4];
    field.get_u32()
}

impl Decoder for BrokerCodec {
    type Item = Request;
    type Error = SolomqError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if self.skipping > 0 {
            self.drain_skipped(src);
            if self.skipping > 0 {
                return Ok(None);
            }
        }

        if src.len() < REQUEST_HEADER_SIZE {
            return Ok(None);
        }

        let total_length = peek_u32(src, 0);
        if total_length < REQUEST_TYPE_SIZE {
            return Err(SolomqError::Protocol(format!(
                "total_length {} is shorter than the request type",
                total_length
            )));
        }
        let request_type = peek_u32(src, 4);

        match request_type {
            PRODUCE_REQUEST => self.decode_produce(total_length, src),
            FETCH_REQUEST => self.decode_fetch(total_length, src),
            _ => {
                let body_len = total_length - REQUEST_TYPE_SIZE;
                trace!(request_type, body_len, "skipping unknown request");
                src.advance(REQUEST_HEADER_SIZE);
                self.skipping = body_len as usize;
                self.drain_skipped(src);
                Ok(Some(Request::Unknown {
                    request_type,
                    body_len,
                }))
            }
        }
    }
}

impl Encoder<Response> for BrokerCodec {
    type Error = SolomqError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<()> {
        item.encode(dst)
    }
}
