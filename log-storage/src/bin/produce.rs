//! Sample producer: publishes JSON log records read from stdin, one per line,
//! to the log topic.
//!
//! ```text
//! echo '{"index_name":"app-logs","body":{"level":"info","msg":"hello"}}' \
//!     | log-storage-produce
//! ```

use anyhow::{bail, Context, Result};
use dotenv::dotenv;
use log_storage::processor::validate;
use log_storage::producer::KafkaProducer;
use log_storage::Settings;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_env().context("invalid configuration")?;
    let producer = KafkaProducer::create_connector(&settings.producer_settings(&settings.topic)).await;
    info!(topic = %producer.topic(), "Producer ready, reading records from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sent = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Skipping line that is not JSON");
                skipped += 1;
                continue;
            }
        };
        let record = match validate(&value) {
            Ok(record) => record,
            Err(reason) => {
                warn!(reason = %reason, "Skipping invalid record");
                skipped += 1;
                continue;
            }
        };

        let outcome = producer
            .send(&record, None, producer.delivery_timeout())
            .await;
        if outcome.is_delivered() {
            sent += 1;
        } else {
            failed += 1;
        }
    }

    producer.close(Duration::from_secs(10)).await;
    info!(sent, skipped, failed, "Done");

    if failed > 0 {
        bail!("{} of {} records were not delivered", failed, sent + failed);
    }
    Ok(())
}
