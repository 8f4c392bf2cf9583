//! Connection to a single SoloMQ broker

use crate::error::ClientError;
use crate::protocol::ClientCodec;
use crate::Result;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use solomq::protocol::{Offset, Request, Response};
use solomq::Record;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info};

pub const DEFAULT_BROKER: &str = "127.0.0.1:9092";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub broker: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            broker: DEFAULT_BROKER.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// One long-lived connection carrying any number of request/response pairs.
///
/// Requests are sent one at a time; each call waits for its own response.
pub struct BrokerClient {
    broker: String,
    framed: Framed<TcpStream, ClientCodec>,
    request_timeout: Duration,
}

impl BrokerClient {
    pub async fn connect(broker: &str, connect_timeout: Duration) -> Result<Self> {
        Self::connect_with_config(ClientConfig {
            broker: broker.to_string(),
            connect_timeout,
            ..Default::default()
        })
        .await
    }

    pub async fn connect_with_config(config: ClientConfig) -> Result<Self> {
        debug!("Connecting to broker: {}", config.broker);

        let stream = timeout(config.connect_timeout, TcpStream::connect(&config.broker))
            .await
            .map_err(|_| ClientError::timeout(config.connect_timeout.as_millis() as u64))?
            .map_err(|e| {
                ClientError::connection(format!("Failed to connect to {}: {}", config.broker, e))
            })?;
        stream.set_nodelay(true)?;

        info!("Connected to broker: {}", config.broker);
        Ok(Self {
            broker: config.broker,
            framed: Framed::new(stream, ClientCodec::new()),
            request_timeout: config.request_timeout,
        })
    }

    pub fn broker(&self) -> &str {
        &self.broker
    }

    /// Append `payload` to the log and return the offset the broker assigned.
    pub async fn produce(&mut self, payload: impl Into<Bytes>) -> Result<Offset> {
        match self.send_request(Request::produce(payload)).await? {
            Response::Produce { offset } => Ok(offset),
            other => Err(ClientError::protocol(format!(
                "expected produce response, got {:?}",
                other
            ))),
        }
    }

    /// Every record with `offset >= from_offset`, in offset order.
    pub async fn fetch(&mut self, from_offset: Offset) -> Result<Vec<Record>> {
        match self.send_request(Request::fetch(from_offset)).await? {
            Response::Fetch { records } => Ok(records),
            other => Err(ClientError::protocol(format!(
                "expected fetch response, got {:?}",
                other
            ))),
        }
    }

    async fn send_request(&mut self, request: Request) -> Result<Response> {
        let request_timeout = self.request_timeout;
        timeout(request_timeout, self.exchange(request))
            .await
            .map_err(|_| ClientError::timeout(request_timeout.as_millis() as u64))?
    }

    async fn exchange(&mut self, request: Request) -> Result<Response> {
        self.framed.send(request).await?;
        match self.framed.next().await {
            Some(response) => response,
            None => Err(ClientError::connection(format!(
                "broker {} closed the connection",
                self.broker
            ))),
        }
    }
}
