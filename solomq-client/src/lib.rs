//! # SoloMQ Client Library
//!
//! An async Rust client for the SoloMQ broker.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use solomq_client::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut client = BrokerClient::connect("127.0.0.1:9092", Duration::from_secs(5)).await?;
//!
//!     let offset = client.produce("orderId=100 product=P0 qty=2 price=100").await?;
//!     println!("stored at offset {}", offset);
//!
//!     for record in client.fetch(0).await? {
//!         println!("{}: {}", record.offset, String::from_utf8_lossy(&record.payload));
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod protocol;

pub use client::*;
pub use error::*;
pub use protocol::ClientCodec;
pub use solomq::{Offset, Record};

/// Client library result type
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Map a `--log-level` argument to a tracing level
pub fn parse_log_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
