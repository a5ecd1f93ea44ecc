//! Error types for the log storage ingest.

use log_storage_repository::DocumentStoreError;
use thiserror::Error;

/// Errors that can occur in the log storage ingest.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Kafka-related error.
    #[error("Kafka error: {0}")]
    KafkaError(String),

    /// A broker or store could not be reached.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error parsing or decoding data.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Channel communication error.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Error from the document store.
    #[error("Store error: {0}")]
    StoreError(#[from] DocumentStoreError),
}

impl IngestError {
    /// Create a Kafka error.
    pub fn kafka(msg: impl Into<String>) -> Self {
        Self::KafkaError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a channel error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }

    /// Whether the error comes from the broker transport and the session
    /// should be re-created.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::KafkaError(_) | Self::ConnectionError(_))
    }
}

impl From<rdkafka::error::KafkaError> for IngestError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Self::KafkaError(err.to_string())
    }
}

impl From<log_storage_kafka::KafkaConfigError> for IngestError {
    fn from(err: log_storage_kafka::KafkaConfigError) -> Self {
        Self::ConnectionError(err.to_string())
    }
}
