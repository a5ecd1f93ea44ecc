//! Replay tool: prints the messages of the log topic from a given offset
//! without committing anything, one JSON line per message.
//!
//! ```text
//! log-storage-replay 1200     # every partition from offset 1200
//! log-storage-replay          # from the group's committed position
//! ```

use anyhow::{Context, Result};
use dotenv::dotenv;
use log_storage::consumer::{deserialize, KafkaConsumer, StreamSource};
use log_storage::orchestrator::wait_for_shutdown_signal;
use log_storage::Settings;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const POLL_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_RECORDS: usize = 100;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let offset = match std::env::args().nth(1) {
        Some(arg) => Some(
            arg.parse::<i64>()
                .with_context(|| format!("invalid offset '{}'", arg))?,
        ),
        None => None,
    };

    let settings = Settings::from_env().context("invalid configuration")?;
    let mut consumer = KafkaConsumer::replay_from(settings.consumer_settings(), offset)
        .await
        .context("failed to start replay")?;

    let mut printed = 0usize;
    let stop = wait_for_shutdown_signal();
    tokio::pin!(stop);

    loop {
        let messages = tokio::select! {
            _ = &mut stop => break,
            polled = consumer.poll(POLL_TIMEOUT, MAX_RECORDS) => polled,
        };
        let messages = match messages {
            Ok(messages) => messages,
            Err(e) if e.is_transport() => {
                warn!(error = %e, "Transport failure, reconnecting");
                consumer.reconnect().await.context("reconnect failed")?;
                continue;
            }
            Err(e) => return Err(e).context("poll failed"),
        };

        for message in &messages {
            let value = match deserialize(message) {
                Ok(value) => value,
                Err(e) => json!({ "undecodable": e.original(), "reason": e.reason }),
            };
            let line = json!({
                "partition": message.partition,
                "offset": message.offset,
                "timestamp_ms": message.timestamp_ms,
                "value": value,
            });
            println!("{}", line);
            printed += 1;
        }
    }

    consumer.close().await;
    info!(printed, "Replay stopped");
    Ok(())
}
