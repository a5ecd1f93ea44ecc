//! Consumer module for the log storage ingest.
//!
//! Provides the Kafka consumer gateway and the decoding of raw payloads.

mod codec;
mod kafka_consumer;
mod messages;
mod source;

pub use codec::{decode_payload, deserialize, DeserializationError};
pub use kafka_consumer::{ConsumerSettings, GatewayContext, KafkaConsumer, DEFAULT_CONNECT_TIMEOUT_MS};
pub use messages::{Batch, BatchOffsets, RawMessage, TopicPartition};
pub use source::{CommitMode, StreamSource};
