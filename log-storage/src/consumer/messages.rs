//! Message types for the consumer.
//!
//! Defines the raw messages handed to the orchestrator and the offset sets
//! used to acknowledge them.

use std::collections::BTreeMap;

use rdkafka::message::{BorrowedMessage, Message};

/// A topic and partition pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

/// Owned copy of one message polled from the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
    /// Broker or producer timestamp in milliseconds, when available.
    pub timestamp_ms: Option<i64>,
}

impl RawMessage {
    /// Build a message without key or timestamp.
    pub fn new(
        topic: impl Into<String>,
        partition: i32,
        offset: i64,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            payload: Some(payload.into()),
            timestamp_ms: None,
        }
    }

    /// Copy a message borrowed from the consumer.
    pub fn from_kafka(msg: &BorrowedMessage<'_>) -> Self {
        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key: msg.key().map(<[u8]>::to_vec),
            payload: msg.payload().map(<[u8]>::to_vec),
            timestamp_ms: msg.timestamp().to_millis(),
        }
    }

    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }
}

/// Highest offset seen per partition.
///
/// Offsets are stored as the offset of the last handled message; the
/// consumer commits `offset + 1`, the position of the next message to read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOffsets {
    offsets: BTreeMap<TopicPartition, i64>,
}

impl BatchOffsets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offsets covering every message in `messages`.
    pub fn from_messages(messages: &[RawMessage]) -> Self {
        let mut offsets = Self::new();
        for msg in messages {
            offsets.record(msg.topic_partition(), msg.offset);
        }
        offsets
    }

    /// Record an offset, keeping the highest one per partition.
    pub fn record(&mut self, tp: TopicPartition, offset: i64) {
        self.offsets
            .entry(tp)
            .and_modify(|current| *current = (*current).max(offset))
            .or_insert(offset);
    }

    /// Merge another offset set into this one.
    pub fn merge(&mut self, other: &BatchOffsets) {
        for (tp, offset) in other.iter() {
            self.record(tp.clone(), offset);
        }
    }

    pub fn get(&self, topic: &str, partition: i32) -> Option<i64> {
        self.offsets
            .get(&TopicPartition::new(topic, partition))
            .copied()
    }

    pub fn remove(&mut self, tp: &TopicPartition) -> Option<i64> {
        self.offsets.remove(tp)
    }

    pub fn partitions(&self) -> impl Iterator<Item = &TopicPartition> {
        self.offsets.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TopicPartition, i64)> {
        self.offsets.iter().map(|(tp, offset)| (tp, *offset))
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// One poll result handed to the worker pool.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Sequence number assigned by the poll loop, increasing per poll.
    pub sequence: u64,
    pub messages: Vec<RawMessage>,
    pub offsets: BatchOffsets,
}

impl Batch {
    pub fn new(sequence: u64, messages: Vec<RawMessage>) -> Self {
        let offsets = BatchOffsets::from_messages(&messages);
        Self {
            sequence,
            messages,
            offsets,
        }
    }
}
