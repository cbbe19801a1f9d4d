//! Test Transaction Producer
//!
//! Generates and publishes test transactions to NATS for pipeline testing.
//!
//! Usage: `test_producer [nats_url] [subject] [count] [fraud_rate] [delay_ms]`

use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};
use vigilant_sentinel::generator::TransactionGenerator;
use vigilant_sentinel::TransactionRecord;

/// Mixes legitimate and suspicious transactions at a fixed fraud rate
struct TrafficMix {
    generator: TransactionGenerator,
    fraud_rate: f64,
    legitimate: u64,
    suspicious: u64,
}

impl TrafficMix {
    fn new(fraud_rate: f64) -> Self {
        Self {
            generator: TransactionGenerator::from_entropy(),
            fraud_rate: fraud_rate.clamp(0.0, 1.0),
            legitimate: 0,
            suspicious: 0,
        }
    }

    fn next(&mut self) -> TransactionRecord {
        if rand::thread_rng().gen_bool(self.fraud_rate) {
            self.suspicious += 1;
            self.generator.generate_suspicious()
        } else {
            self.legitimate += 1;
            self.generator.generate_legitimate()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Transaction Producer");

    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("transactions");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        fraud_rate = fraud_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, fraud_rate, delay_ms).await;
        }
    };

    let mut mix = TrafficMix::new(fraud_rate);
    info!("Starting to publish {} transactions...", count);

    for i in 0..count {
        let transaction = mix.next();
        let payload = serde_json::to_vec(&transaction)?;
        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!(
                "Published {}/{} transactions ({} legitimate, {} suspicious)",
                i + 1,
                count,
                mix.legitimate,
                mix.suspicious
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
    client.flush().await?;

    info!(
        "Completed! Published {} transactions ({} legitimate, {} suspicious)",
        count, mix.legitimate, mix.suspicious
    );

    Ok(())
}

async fn run_dry_mode(count: u64, fraud_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut mix = TrafficMix::new(fraud_rate);

    for i in 0..count {
        let transaction = mix.next();
        let json = serde_json::to_string_pretty(&transaction)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample transaction {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Dry run finished ({} legitimate, {} suspicious)",
        mix.legitimate, mix.suspicious
    );
    Ok(())
}
