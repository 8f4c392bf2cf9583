//! Send payloads to a SoloMQ broker and print the offset of each.

use clap::Parser;
use solomq_client::{parse_log_level, BrokerClient, ClientConfig, Result, DEFAULT_BROKER};

#[derive(Parser, Debug)]
#[command(name = "solomq-produce")]
#[command(about = "Append records to a SoloMQ broker")]
struct Args {
    #[arg(short, long, default_value = DEFAULT_BROKER)]
    broker: String,

    /// Payloads to append, in order. Without any, a sample batch of orders 100..=110 is sent.
    payloads: Vec<String>,

    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

fn sample_orders() -> Vec<String> {
    (100..=110)
        .map(|order_id| {
            format!(
                "orderId={} product=P{} qty={} price={}",
                order_id,
                order_id % 5,
                order_id % 3 + 1,
                100 + (order_id % 10) * 10
            )
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(parse_log_level(&args.log_level))
        .init();

    let payloads = if args.payloads.is_empty() {
        sample_orders()
    } else {
        args.payloads
    };

    let mut client = BrokerClient::connect_with_config(ClientConfig {
        broker: args.broker,
        ..Default::default()
    })
    .await?;

    for payload in payloads {
        let offset = client.produce(payload.clone()).await?;
        println!("Produced -> offset={} payload={}", offset, payload);
    }

    Ok(())
}
