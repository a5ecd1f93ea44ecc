//! Producer module for the log storage pipeline.
//!
//! Publishes dead letters (and sample log records) to Kafka.

mod encoding;
mod kafka_producer;

pub use encoding::{encode, WireMessage};
pub use kafka_producer::{DeliveryOutcome, KafkaProducer, ProducerSettings, DEFAULT_DELIVERY_TIMEOUT};
