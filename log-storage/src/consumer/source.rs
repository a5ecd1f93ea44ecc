//! The consumer interface used by the orchestrator.

use std::time::Duration;

use async_trait::async_trait;

use crate::consumer::{BatchOffsets, RawMessage};
use crate::errors::IngestError;

/// How an offset commit is sent to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// Fire and forget; failures are reported later and retried synchronously.
    Async,
    /// Block until the broker confirms.
    Sync,
}

/// A source of raw messages with explicit offset commits.
///
/// Implemented by [`KafkaConsumer`](crate::consumer::KafkaConsumer); tests
/// provide scripted implementations.
#[async_trait]
pub trait StreamSource: Send {
    /// Return whatever arrives within `timeout`, up to `max_records` messages.
    /// An empty result is valid.
    async fn poll(
        &mut self,
        timeout: Duration,
        max_records: usize,
    ) -> Result<Vec<RawMessage>, IngestError>;

    /// Commit the positions after the given offsets.
    async fn commit_offsets(
        &mut self,
        offsets: &BatchOffsets,
        mode: CommitMode,
    ) -> Result<(), IngestError>;

    /// Commit the positions after the last offsets returned by `poll`.
    async fn commit(&mut self, mode: CommitMode) -> Result<(), IngestError>;

    /// Close the session and open a new one after a transport failure.
    async fn reconnect(&mut self) -> Result<(), IngestError>;

    /// Leave the group. Nothing is committed.
    async fn close(&mut self);
}
