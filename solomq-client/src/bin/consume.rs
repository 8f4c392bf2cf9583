//! Fetch and print records from a SoloMQ broker.

use clap::Parser;
use solomq_client::{parse_log_level, BrokerClient, ClientConfig, Result, DEFAULT_BROKER};

#[derive(Parser, Debug)]
#[command(name = "solomq-consume")]
#[command(about = "Print every record at or after an offset")]
struct Args {
    #[arg(short, long, default_value = DEFAULT_BROKER)]
    broker: String,

    /// First offset to print
    #[arg(short, long, default_value = "0")]
    from: u64,

    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(parse_log_level(&args.log_level))
        .init();

    let mut client = BrokerClient::connect_with_config(ClientConfig {
        broker: args.broker,
        ..Default::default()
    })
    .await?;

    let records = client.fetch(args.from).await?;
    for record in &records {
        println!(
            "Consumed -> offset={} payload={}",
            record.offset,
            String::from_utf8_lossy(&record.payload)
        );
    }
    println!("{} records from offset {}", records.len(), args.from);

    Ok(())
}
