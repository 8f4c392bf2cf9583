//! # SoloMQ Protocol Module
//!
//! Wire protocol spoken over each broker connection. Every integer is big-endian.
//!
//! ```text
//! request:  [total_length: u32][request_type: u32][body]
//!
//! produce (type 1)   body: [payload_length: u32][payload]
//!                    response: [offset: u64]
//! fetch   (type 2)   body: [from_offset: u64]
//!                    response: [record_count: u32] then per record
//!                              [offset: u64][payload_length: u32][payload]
//! ```
//!
//! `total_length` covers `request_type` and the body. The broker checks it against the
//! decoded body and drops the connection on a mismatch; for an unrecognised
//! `request_type` it is what lets the broker skip the body and stay in sync.
//!
//! - [`messages`] - request/response types and their encodings
//! - [`codec`] - the broker-side `tokio_util` codec

pub mod codec;
pub mod messages;

pub use codec::BrokerCodec;
pub use messages::*;

pub type Offset = u64;
