//! Settings read from the environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use log_storage_kafka::{KafkaClientConfig, OffsetReset};

use crate::consumer::{ConsumerSettings, DEFAULT_CONNECT_TIMEOUT_MS};
use crate::loader::{RetryPolicy, TerminalFailurePolicy, DEFAULT_BACKOFF_BASE_MS, DEFAULT_MAX_ATTEMPTS};
use crate::orchestrator::OrchestratorConfig;
use crate::producer::ProducerSettings;
use crate::LogStorageError;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default Kafka broker address.
const DEFAULT_KAFKA_BROKER: &str = "localhost:9092";

/// Default Kafka consumer group ID.
const DEFAULT_KAFKA_GROUP_ID: &str = "log_storage_consumer";

/// Default topic carrying log records.
const DEFAULT_KAFKA_TOPIC: &str = "logs";

/// Default dead-letter topic.
const DEFAULT_DEAD_LETTER_TOPIC: &str = "logs_dead_letter";

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Connection mode for OpenSearch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection every interval until successful.
    Retry,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Defaults to "retry" if not set or invalid.
    fn parse(value: Option<String>) -> Self {
        match value
            .unwrap_or_else(|| "retry".to_string())
            .to_lowercase()
            .as_str()
        {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!("Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Every setting of the pipeline.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Number of pipeline processes; more than one turns `main` into a supervisor.
    pub workers: usize,
    pub kafka: KafkaClientConfig,
    pub topic: String,
    pub dead_letter_topic: String,
    pub group_id: String,
    pub offset_reset: OffsetReset,
    pub connect_timeout: Duration,
    pub opensearch_url: String,
    pub opensearch_username: Option<String>,
    pub opensearch_password: Option<String>,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
    pub retry: RetryPolicy,
    pub terminal_failure_policy: TerminalFailurePolicy,
    pub orchestrator: OrchestratorConfig,
}

impl Settings {
    /// Read settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `WORKERS`: Pipeline processes (default: 1)
    /// - `KAFKA_BROKER`, `KAFKA_USERNAME`, `KAFKA_PASSWORD`, `KAFKA_SASL_MECHANISM`,
    ///   `KAFKA_SECURITY_PROTOCOL`, `KAFKA_SSL_CA_PEM`, `KAFKA_KERBEROS_PRINCIPAL`,
    ///   `KAFKA_KERBEROS_KEYTAB`: Kafka connection and security
    /// - `KAFKA_TOPIC`: Log topic (default: logs)
    /// - `DEAD_LETTER_TOPIC`: Dead-letter topic (default: logs_dead_letter)
    /// - `KAFKA_GROUP_ID`: Consumer group ID (default: log_storage_consumer)
    /// - `KAFKA_OFFSET_RESET`: earliest or latest (default: latest)
    /// - `KAFKA_CONNECT_TIMEOUT_MS`: Broker reachability timeout (default: 10000)
    /// - `POLL_TIMEOUT_MS`: Poll wait (default: 1000)
    /// - `MAX_POLL_RECORDS`: Messages per batch (default: 500)
    /// - `WORKER_POOL_SIZE`: Worker tasks per process (default: 50)
    /// - `BULK_MAX_ATTEMPTS`: Bulk attempts per batch (default: 3)
    /// - `BULK_BACKOFF_BASE_MS`: First retry delay (default: 1000)
    /// - `TERMINAL_FAILURE_POLICY`: dead-letter or hold (default: dead-letter)
    /// - `METRICS_INTERVAL_SECS`: Summary interval (default: 60)
    /// - `DRAIN_TIMEOUT_SECS`: Shutdown drain timeout (default: 30)
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `OPENSEARCH_USERNAME`, `OPENSEARCH_PASSWORD`: Basic auth (optional)
    /// - `OPENSEARCH_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `OPENSEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    pub fn from_env() -> Result<Self, LogStorageError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LogStorageError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let kafka = KafkaClientConfig::from_lookup(DEFAULT_KAFKA_BROKER, "log-storage", &lookup)
            .map_err(|e| LogStorageError::config(e.to_string()))?;

        let offset_reset = match lookup("KAFKA_OFFSET_RESET") {
            Some(value) => value
                .parse()
                .map_err(|e: log_storage_kafka::KafkaConfigError| {
                    LogStorageError::config(e.to_string())
                })?,
            None => OffsetReset::default(),
        };

        let terminal_failure_policy = match lookup("TERMINAL_FAILURE_POLICY") {
            Some(value) => value.parse().map_err(LogStorageError::config)?,
            None => TerminalFailurePolicy::default(),
        };

        let defaults = OrchestratorConfig::default();
        let orchestrator = OrchestratorConfig {
            poll_timeout: Duration::from_millis(parse_or(
                &lookup,
                "POLL_TIMEOUT_MS",
                defaults.poll_timeout.as_millis() as u64,
            )?),
            max_poll_records: parse_or(&lookup, "MAX_POLL_RECORDS", defaults.max_poll_records)?,
            worker_pool_size: parse_or(&lookup, "WORKER_POOL_SIZE", defaults.worker_pool_size)?,
            channel_buffer_size: defaults.channel_buffer_size,
            metrics_interval: Duration::from_secs(parse_or(
                &lookup,
                "METRICS_INTERVAL_SECS",
                defaults.metrics_interval.as_secs(),
            )?),
            drain_timeout: Duration::from_secs(parse_or(
                &lookup,
                "DRAIN_TIMEOUT_SECS",
                defaults.drain_timeout.as_secs(),
            )?),
        };

        let retry = RetryPolicy::new(
            parse_or(&lookup, "BULK_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
            Duration::from_millis(parse_or(
                &lookup,
                "BULK_BACKOFF_BASE_MS",
                DEFAULT_BACKOFF_BASE_MS,
            )?),
        );

        let workers: usize = parse_or(&lookup, "WORKERS", 1)?;
        if workers == 0 {
            return Err(LogStorageError::config("WORKERS must be at least 1"));
        }
        if orchestrator.max_poll_records == 0 {
            return Err(LogStorageError::config("MAX_POLL_RECORDS must be at least 1"));
        }

        Ok(Self {
            workers,
            kafka,
            topic: lookup("KAFKA_TOPIC").unwrap_or_else(|| DEFAULT_KAFKA_TOPIC.to_string()),
            dead_letter_topic: lookup("DEAD_LETTER_TOPIC")
                .unwrap_or_else(|| DEFAULT_DEAD_LETTER_TOPIC.to_string()),
            group_id: lookup("KAFKA_GROUP_ID")
                .unwrap_or_else(|| DEFAULT_KAFKA_GROUP_ID.to_string()),
            offset_reset,
            connect_timeout: Duration::from_millis(parse_or(
                &lookup,
                "KAFKA_CONNECT_TIMEOUT_MS",
                DEFAULT_CONNECT_TIMEOUT_MS,
            )?),
            opensearch_url: lookup("OPENSEARCH_URL")
                .unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string()),
            opensearch_username: lookup("OPENSEARCH_USERNAME"),
            opensearch_password: lookup("OPENSEARCH_PASSWORD"),
            connection_mode: ConnectionMode::parse(lookup("OPENSEARCH_CONNECTION_MODE")),
            retry_interval: Duration::from_secs(parse_or(
                &lookup,
                "OPENSEARCH_RETRY_INTERVAL_SECS",
                DEFAULT_RETRY_INTERVAL_SECS,
            )?),
            retry,
            terminal_failure_policy,
            orchestrator,
        })
    }

    pub fn consumer_settings(&self) -> ConsumerSettings {
        ConsumerSettings {
            client: self.kafka.clone(),
            topic: self.topic.clone(),
            group_id: self.group_id.clone(),
            offset_reset: self.offset_reset,
            connect_timeout: self.connect_timeout,
        }
    }

    /// Producer settings for `topic`.
    pub fn producer_settings(&self, topic: &str) -> ProducerSettings {
        let mut settings = ProducerSettings::new(self.kafka.clone(), topic);
        settings.kerberos = self.kafka.kerberos.clone();
        settings.connect_timeout = self.connect_timeout;
        settings
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, LogStorageError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| LogStorageError::config(format!("invalid value '{}' for {}", value, key))),
        None => Ok(default),
    }
}
