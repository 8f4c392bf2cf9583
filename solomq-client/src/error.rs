//! Error types for the SoloMQ client library

/// Main error type for SoloMQ client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Could not reach the broker, or it went away mid-request
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// The broker answered with something this client cannot interpret
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// A request could not be encoded
    #[error("Broker error: {0}")]
    Broker(#[from] solomq::SolomqError),
}

impl ClientError {
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Errors after which the connection should be discarded
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Broker(_))
    }
}
