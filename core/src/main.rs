use clap::Parser;
use solomq::{BrokerConfig, BrokerServer, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "solomq")]
#[command(about = "A single-log durable message broker")]
struct Args {
    /// Overrides SOLOMQ_HOST
    #[arg(long)]
    host: Option<String>,

    /// Overrides SOLOMQ_PORT
    #[arg(short, long)]
    port: Option<u16>,

    #[arg(long)]
    data_dir: Option<String>,

    /// Log file name inside the data directory
    #[arg(long)]
    log_file: Option<String>,

    /// Largest accepted produce payload in bytes
    #[arg(long)]
    max_request_bytes: Option<u32>,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn apply(self, mut config: BrokerConfig) -> BrokerConfig {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(log_file) = self.log_file {
            config.log_file = log_file;
        }
        if self.max_request_bytes.is_some() {
            config.max_request_bytes = self.max_request_bytes;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(parse_log_level(&args.log_level))
        .init();

    let config = args.apply(BrokerConfig::from_env()?);

    info!("Starting SoloMQ broker on {}", config.bind_address());
    info!("Log file: {}", config.log_path().display());

    let server = Arc::new(BrokerServer::new(config)?);

    let server_task = Arc::clone(&server);
    let mut server_handle = tokio::spawn(async move {
        if let Err(e) = server_task.run().await {
            error!("Server error: {}", e);
        }
    });

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            server.shutdown();
            let _ = (&mut server_handle).await;
        }
        _ = &mut server_handle => {
            info!("Server task completed");
        }
    }

    info!("SoloMQ shut down successfully");
    Ok(())
}

fn parse_log_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            warn!("Invalid log level '{}', defaulting to 'info'", level);
            tracing::Level::INFO
        }
    }
}
