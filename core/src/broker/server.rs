use crate::protocol::BrokerCodec;
use crate::{broker::MessageHandler, config::BrokerConfig, Result};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

pub struct BrokerServer {
    config: BrokerConfig,
    handler: Arc<MessageHandler>,
    // Graceful shutdown coordination
    shutdown_tx: broadcast::Sender<()>,
}

impl BrokerServer {
    /// Validate `config` and recover the log. No connection is accepted before this succeeds.
    pub fn new(config: BrokerConfig) -> Result<Self> {
        config.validate().map_err(crate::SolomqError::Config)?;
        let handler = MessageHandler::new(&config)?;
        Ok(Self::with_handler(config, Arc::new(handler)))
    }

    pub fn with_handler(config: BrokerConfig, handler: Arc<MessageHandler>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            handler,
            shutdown_tx,
        }
    }

    pub fn handler(&self) -> &Arc<MessageHandler> {
        &self.handler
    }

    /// Stop accepting connections. Connections already open run until their peer leaves.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the configured address and serve until [`BrokerServer::shutdown`].
    pub async fn run(&self) -> Result<()> {
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr).await?;
        self.run_with_listener(listener).await
    }

    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(
            "SoloMQ broker listening on {} (log {}, next offset {})",
            local_addr,
            self.config.log_path().display(),
            self.handler.log().next_offset()
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => self.spawn_client(stream, peer_addr),
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal, stopping server gracefully...");
                    break;
                }
            }
        }

        info!(
            metrics = ?self.handler.metrics().snapshot(),
            "Server shutdown complete"
        );
        Ok(())
    }

    fn spawn_client(&self, stream: TcpStream, peer_addr: SocketAddr) {
        if let Err(e) = Self::optimize_client_socket(&stream) {
            warn!("Failed to optimize client socket {}: {}", peer_addr, e);
        }

        let handler = Arc::clone(&self.handler);
        let max_request_bytes = self.config.max_request_bytes;
        info!("New client connected: {}", peer_addr);

        tokio::spawn(async move {
            let metrics = handler.metrics();
            metrics.connection_opened();

            if let Err(e) = Self::handle_client(stream, &handler, max_request_bytes).await {
                metrics.error_occurred();
                warn!("Closing connection to {}: {}", peer_addr, e);
            } else {
                info!("Client {} disconnected", peer_addr);
            }

            metrics.connection_closed();
            debug!(metrics = ?metrics.snapshot(), "connection closed");
        });
    }

    fn optimize_client_socket(stream: &TcpStream) -> Result<()> {
        use socket2::SockRef;

        let socket_ref = SockRef::from(stream);
        // Acks are 8 bytes; do not let Nagle hold them back.
        socket_ref.set_tcp_nodelay(true)?;
        socket_ref.set_keepalive(true)?;

        Ok(())
    }

    /// Read requests one at a time and answer each before reading the next.
    ///
    /// Returns `Ok(())` when the peer closes the connection between requests. Any error
    /// ends this connection only.
    async fn handle_client(
        stream: TcpStream,
        handler: &MessageHandler,
        max_request_bytes: Option<u32>,
    ) -> Result<()> {
        let codec = BrokerCodec::with_max_request_bytes(max_request_bytes);
        let mut framed = Framed::new(stream, codec);

        while let Some(request) = framed.next().await {
            let request = request?;
            if let Some(response) = handler.handle_request(request).await? {
                framed.send(response).await?;
            }
        }

        Ok(())
    }
}
