//! # SoloMQ Core Library
//!
//! SoloMQ is a single-log message broker. Producers append opaque payloads to one
//! durable, append-only log over TCP and get back the offset each payload was stored
//! at; consumers fetch every record at or after a given offset.
//!
//! ## Guarantees
//!
//! - **Durable acknowledgements**: an offset is returned only after its frame is synced
//! - **Dense offsets**: records are numbered 0, 1, 2, ... with no gaps and no duplicates
//! - **Ordered reads**: a fetch returns records in offset order, which is also file order
//! - **Restart safety**: recovery re-derives the next offset from the log before any
//!   connection is accepted
//!
//! ## Architecture Overview
//!
//! - [`broker`] - TCP server and request handling
//! - [`storage`] - the log file, offset allocation and crash recovery
//! - [`protocol`] - wire format and the `tokio_util` codec
//! - [`config`] - broker settings
//! - [`metrics`] - lock-free counters
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use solomq::{BrokerConfig, BrokerServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BrokerConfig {
//!         port: 9092,
//!         data_dir: "./data".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let server = BrokerServer::new(config)?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod broker;
pub mod config;
pub mod metrics;
pub mod protocol;
pub mod storage;

pub use broker::{BrokerServer, MessageHandler};
pub use config::BrokerConfig;
pub use metrics::{BrokerMetrics, MetricsSnapshot};
pub use protocol::{BrokerCodec, Offset, Request, RequestKind, Response};
pub use storage::{CommitLog, FrameError, Record, RecoveryReport};

use thiserror::Error;

/// SoloMQ error types
///
/// # Example
///
/// ```rust,no_run
/// use solomq::{Result, SolomqError};
///
/// fn handle_error(result: Result<()>) {
///     match result {
///         Ok(()) => println!("Success"),
///         Err(SolomqError::Io(e)) => println!("I/O error: {}", e),
///         Err(SolomqError::Protocol(msg)) => println!("Protocol error: {}", msg),
///         Err(e) => println!("Other error: {}", e),
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum SolomqError {
    /// File or socket I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A log frame that could not be decoded
    #[error("Frame error: {0}")]
    Frame(#[from] storage::FrameError),

    /// A request that violates the wire format
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A blocking storage task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, SolomqError>;
