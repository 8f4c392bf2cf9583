//! # SoloMQ Broker Module
//!
//! TCP front end of the broker.
//!
//! - [`server`] - accepts connections and runs one task per connection, each reading
//!   requests through [`crate::protocol::BrokerCodec`]
//! - [`handler`] - executes Produce and Fetch against the [`crate::storage::CommitLog`]
//!
//! Requests on one connection are answered strictly in order; connections are
//! independent of each other, and a protocol or storage error closes only the connection
//! it happened on.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use solomq::{BrokerConfig, BrokerServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BrokerConfig {
//!         port: 9092,
//!         host: "0.0.0.0".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let server = BrokerServer::new(config)?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod handler;
pub mod server;

pub use handler::*;
pub use server::*;
