use crate::{
    config::BrokerConfig,
    metrics::BrokerMetrics,
    protocol::{Offset, Request, Response},
    storage::{CommitLog, Record},
    Result, SolomqError,
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

/// Serves decoded requests against the commit log.
///
/// Storage calls block on file I/O and `fsync`, so they run on tokio's blocking pool and
/// never stall the connection tasks.
pub struct MessageHandler {
    log: Arc<CommitLog>,
    metrics: Arc<BrokerMetrics>,
}

impl MessageHandler {
    /// Open the configured log. Recovery completes before this returns.
    pub fn new(config: &BrokerConfig) -> Result<Self> {
        let log = CommitLog::open_with_config(config)?;
        Ok(Self::with_log(Arc::new(log)))
    }

    pub fn with_log(log: Arc<CommitLog>) -> Self {
        Self {
            log,
            metrics: Arc::new(BrokerMetrics::new()),
        }
    }

    pub fn log(&self) -> &Arc<CommitLog> {
        &self.log
    }

    pub fn metrics(&self) -> Arc<BrokerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Process one request. Unknown request types produce no response.
    pub async fn handle_request(&self, request: Request) -> Result<Option<Response>> {
        match request {
            Request::Produce { payload } => {
                debug!("Handling produce request with {} bytes", payload.len());
                let offset = self.handle_produce(payload).await?;
                Ok(Some(Response::Produce { offset }))
            }
            Request::Fetch { from_offset } => {
                debug!("Handling fetch request from offset {}", from_offset);
                let records = self.handle_fetch(from_offset).await?;
                Ok(Some(Response::Fetch { records }))
            }
            Request::Unknown {
                request_type,
                body_len,
            } => {
                warn!(request_type, body_len, "ignoring unknown request type");
                self.metrics.unknown_request();
                Ok(None)
            }
        }
    }

    async fn handle_produce(&self, payload: Bytes) -> Result<Offset> {
        let len = payload.len() as u64;
        let log = Arc::clone(&self.log);
        let offset = tokio::task::spawn_blocking(move || log.produce(payload))
            .await
            .map_err(|e| SolomqError::Task(e.to_string()))??;

        self.metrics.record_produce(len);
        debug!(offset, bytes = len, "appended record");
        Ok(offset)
    }

    async fn handle_fetch(&self, from_offset: Offset) -> Result<Vec<Record>> {
        let log = Arc::clone(&self.log);
        let records = tokio::task::spawn_blocking(move || log.fetch(from_offset))
            .await
            .map_err(|e| SolomqError::Task(e.to_string()))??;

        self.metrics.record_fetch(records.len() as u64);
        Ok(records)
    }
}
