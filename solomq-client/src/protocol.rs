//! Client side of the wire format.
//!
//! Responses carry no type tag, so the codec remembers the kind of every request it has
//! sent and decodes responses against that queue in order.

use crate::error::ClientError;
use bytes::BytesMut;
use solomq::protocol::{Request, RequestKind, Response};
use std::collections::VecDeque;
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Default)]
pub struct ClientCodec {
    pending: VecDeque<RequestKind>,
}

impl ClientCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests sent whose response has not been decoded yet
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

impl Encoder<Request> for ClientCodec {
    type Error = ClientError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst)?;
        // unknown request types are never answered
        if let Some(kind) = item.kind() {
            self.pending.push_back(kind);
        }
        Ok(())
    }
}

impl Decoder for ClientCodec {
    type Item = Response;
    type Error = ClientError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(&kind) = self.pending.front() else {
            if src.is_empty() {
                return Ok(None);
            }
            return Err(ClientError::protocol(format!(
                "{} unexpected bytes from broker",
                src.len()
            )));
        };

        let response = Response::decode(kind, src)?;
        if response.is_some() {
            self.pending.pop_front();
        }
        Ok(response)
    }
}
