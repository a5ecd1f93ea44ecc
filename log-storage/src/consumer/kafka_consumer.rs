//! Kafka consumer gateway.
//!
//! Polls raw log messages from the log topic and commits offsets explicitly
//! once the orchestrator has handled them. Auto-commit is always disabled.
//! Calls that block inside librdkafka run on the blocking thread pool.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    client::ClientContext,
    consumer::{Consumer, ConsumerContext, StreamConsumer},
    error::KafkaResult,
    Offset, TopicPartitionList,
};
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, error, info, instrument, warn};

use log_storage_kafka::{KafkaClientConfig, OffsetReset};

use crate::consumer::{BatchOffsets, CommitMode, RawMessage, StreamSource, TopicPartition};
use crate::errors::IngestError;

/// Delay between reconnection attempts after a transport failure.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Default time allowed to reach the brokers when connecting.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Settings for the consumer gateway.
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub client: KafkaClientConfig,
    pub topic: String,
    pub group_id: String,
    pub offset_reset: OffsetReset,
    /// Time allowed to fetch the topic metadata when connecting.
    pub connect_timeout: Duration,
}

/// Consumer context recording asynchronous commit failures.
#[derive(Default)]
pub struct GatewayContext {
    failed_commits: Mutex<Vec<TopicPartitionList>>,
}

impl GatewayContext {
    fn take_failed(&self) -> Vec<TopicPartitionList> {
        match self.failed_commits.lock() {
            Ok(mut failed) => std::mem::take(&mut *failed),
            Err(_) => Vec::new(),
        }
    }
}

impl ClientContext for GatewayContext {}

impl ConsumerContext for GatewayContext {
    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        if let Err(e) = result {
            warn!(
                error = %e,
                partition_count = offsets.count(),
                "Offset commit failed, retrying synchronously"
            );
            if let Ok(mut failed) = self.failed_commits.lock() {
                failed.push(offsets.clone());
            }
        }
    }
}

/// How the consumer is attached to the topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attachment {
    /// Group subscription; handled offsets are committed.
    Subscribed,
    /// Manual assignment of every partition from a start position. Nothing is
    /// committed.
    Replay { start: Option<i64> },
}

/// Kafka consumer for raw log messages.
pub struct KafkaConsumer {
    consumer: Arc<StreamConsumer<GatewayContext>>,
    settings: ConsumerSettings,
    attachment: Attachment,
    /// Highest offset read per partition while replaying.
    replayed: BatchOffsets,
    /// Offsets returned by the most recent poll.
    last_polled: BatchOffsets,
    /// Highest offsets requested for commit, per partition.
    requested: BatchOffsets,
}

impl KafkaConsumer {
    /// Create the session, subscribe to the topic and check that the brokers
    /// answer within the connect timeout.
    ///
    /// # Returns
    ///
    /// * `Ok(KafkaConsumer)` - A subscribed consumer
    /// * `Err(IngestError)` - If the session cannot be created or the brokers
    ///   are unreachable
    pub async fn connect(settings: ConsumerSettings) -> Result<Self, IngestError> {
        let (consumer, _) = Self::open(&settings).await?;
        consumer
            .subscribe(&[settings.topic.as_str()])
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        info!(
            brokers = %settings.client.brokers,
            topic = %settings.topic,
            group_id = %settings.group_id,
            offset_reset = settings.offset_reset.as_str(),
            "Created Kafka consumer"
        );

        Ok(Self::new(consumer, settings, Attachment::Subscribed))
    }

    /// Read every partition of the topic from `offset` without committing.
    ///
    /// With no offset each partition resumes from the group's committed
    /// position, or from `offset_reset` when there is none. Commit requests
    /// on the returned consumer are ignored, so replaying never moves the
    /// group's progress.
    pub async fn replay_from(
        settings: ConsumerSettings,
        offset: Option<i64>,
    ) -> Result<Self, IngestError> {
        let (consumer, partitions) = Self::open(&settings).await?;
        let assignment =
            replay_assignment(&settings.topic, &partitions, offset, &BatchOffsets::new())?;
        consumer
            .assign(&assignment)
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        info!(
            topic = %settings.topic,
            partition_count = partitions.len(),
            offset = ?offset,
            "Replaying Kafka topic"
        );

        Ok(Self::new(consumer, settings, Attachment::Replay { start: offset }))
    }

    fn new(
        consumer: Arc<StreamConsumer<GatewayContext>>,
        settings: ConsumerSettings,
        attachment: Attachment,
    ) -> Self {
        Self {
            consumer,
            settings,
            attachment,
            replayed: BatchOffsets::new(),
            last_polled: BatchOffsets::new(),
            requested: BatchOffsets::new(),
        }
    }

    /// Create the session and fetch the topic metadata within the connect
    /// timeout. Returns the topic's partition ids.
    async fn open(
        settings: &ConsumerSettings,
    ) -> Result<(Arc<StreamConsumer<GatewayContext>>, Vec<i32>), IngestError> {
        let config = settings.client.consumer_config(
            &settings.group_id,
            settings.offset_reset,
            false,
        )?;

        let consumer: Arc<StreamConsumer<GatewayContext>> = Arc::new(
            config
                .create_with_context(GatewayContext::default())
                .map_err(|e| IngestError::connection(e.to_string()))?,
        );

        let client = Arc::clone(&consumer);
        let topic = settings.topic.clone();
        let timeout = settings.connect_timeout;
        let fetched = tokio::task::spawn_blocking(move || {
            client.fetch_metadata(Some(topic.as_str()), timeout).map(|metadata| {
                metadata
                    .topics()
                    .iter()
                    .filter(|t| t.name() == topic)
                    .flat_map(|t| t.partitions().iter().map(|p| p.id()))
                    .collect::<Vec<i32>>()
            })
        })
        .await
        .map_err(|e| IngestError::connection(e.to_string()))?;

        let partitions = fetched.map_err(|e| {
            IngestError::connection(format!(
                "brokers {} unreachable within {}ms: {}",
                settings.client.brokers,
                settings.connect_timeout.as_millis(),
                e
            ))
        })?;

        Ok((consumer, partitions))
    }

    /// Open a new session attached the same way as the current one.
    async fn reopen(&self) -> Result<Arc<StreamConsumer<GatewayContext>>, IngestError> {
        let (consumer, partitions) = Self::open(&self.settings).await?;
        match self.attachment {
            Attachment::Subscribed => consumer
                .subscribe(&[self.settings.topic.as_str()])
                .map_err(|e| IngestError::kafka(e.to_string()))?,
            Attachment::Replay { start } => {
                let assignment =
                    replay_assignment(&self.settings.topic, &partitions, start, &self.replayed)?;
                consumer
                    .assign(&assignment)
                    .map_err(|e| IngestError::kafka(e.to_string()))?;
            }
        }
        Ok(consumer)
    }

    fn detach(&self) {
        match self.attachment {
            Attachment::Subscribed => self.consumer.unsubscribe(),
            Attachment::Replay { .. } => {
                if let Err(e) = self.consumer.assign(&TopicPartitionList::new()) {
                    warn!(error = %e, "Failed to clear partition assignment");
                }
            }
        }
    }

    fn to_partition_list(offsets: &BatchOffsets) -> Result<TopicPartitionList, IngestError> {
        let mut tpl = TopicPartitionList::new();
        for (tp, offset) in offsets.iter() {
            tpl.add_partition_offset(&tp.topic, tp.partition, Offset::Offset(offset + 1))
                .map_err(|e| IngestError::kafka(e.to_string()))?;
        }
        Ok(tpl)
    }

    /// Synchronous commit, retried once before giving up.
    async fn commit_sync(&self, tpl: TopicPartitionList) -> Result<(), IngestError> {
        let consumer = Arc::clone(&self.consumer);
        tokio::task::spawn_blocking(move || -> Result<(), IngestError> {
            if let Err(first) = consumer.commit(&tpl, rdkafka::consumer::CommitMode::Sync) {
                warn!(error = %first, "Synchronous offset commit failed, retrying once");
                consumer
                    .commit(&tpl, rdkafka::consumer::CommitMode::Sync)
                    .map_err(|e| IngestError::kafka(format!("offset commit failed: {}", e)))?;
            }
            Ok(())
        })
        .await
        .map_err(|e| IngestError::kafka(e.to_string()))?
    }

    /// Re-commit offsets whose asynchronous commit was reported as failed,
    /// unless a later commit request already covers them.
    async fn retry_failed_commits(&self) {
        let mut retry = BatchOffsets::new();
        for tpl in self.consumer.context().take_failed() {
            for elem in tpl.elements() {
                if let Offset::Offset(next) = elem.offset() {
                    let tp = TopicPartition::new(elem.topic(), elem.partition());
                    let last = next - 1;
                    let latest = self.requested.get(&tp.topic, tp.partition);
                    if latest.map_or(true, |requested| requested <= last) {
                        retry.record(tp, last);
                    }
                }
            }
        }
        if retry.is_empty() {
            return;
        }

        let committed = match Self::to_partition_list(&retry) {
            Ok(tpl) => self.commit_sync(tpl).await,
            Err(e) => Err(e),
        };
        match committed {
            Ok(()) => debug!(partition_count = retry.len(), "Re-committed failed offsets"),
            Err(e) => warn!(error = %e, "Could not re-commit failed offsets"),
        }
    }
}

#[async_trait]
impl StreamSource for KafkaConsumer {
    #[instrument(skip(self), fields(topic = %self.settings.topic))]
    async fn poll(
        &mut self,
        timeout: Duration,
        max_records: usize,
    ) -> Result<Vec<RawMessage>, IngestError> {
        self.retry_failed_commits().await;

        let deadline = Instant::now() + timeout;
        let mut messages = Vec::new();

        while messages.len() < max_records {
            match timeout_at(deadline, self.consumer.recv()).await {
                Err(_) => break,
                Ok(Ok(msg)) => messages.push(RawMessage::from_kafka(&msg)),
                Ok(Err(e)) => {
                    if messages.is_empty() {
                        return Err(e.into());
                    }
                    // Hand over what was already received; the error resurfaces on the next poll.
                    warn!(error = %e, received = messages.len(), "Kafka error during poll");
                    break;
                }
            }
        }

        if !messages.is_empty() {
            self.last_polled = BatchOffsets::from_messages(&messages);
            if let Attachment::Replay { .. } = self.attachment {
                self.replayed.merge(&self.last_polled);
            }
            debug!(message_count = messages.len(), "Polled messages");
        }
        Ok(messages)
    }

    async fn commit_offsets(
        &mut self,
        offsets: &BatchOffsets,
        mode: CommitMode,
    ) -> Result<(), IngestError> {
        if offsets.is_empty() {
            return Ok(());
        }
        if let Attachment::Replay { .. } = self.attachment {
            debug!(partition_count = offsets.len(), "Replaying, offsets not committed");
            return Ok(());
        }
        self.requested.merge(offsets);
        let tpl = Self::to_partition_list(offsets)?;

        match mode {
            CommitMode::Async => {
                if let Err(e) = self
                    .consumer
                    .commit(&tpl, rdkafka::consumer::CommitMode::Async)
                {
                    warn!(error = %e, "Async offset commit rejected, committing synchronously");
                    self.commit_sync(tpl).await?;
                }
            }
            CommitMode::Sync => self.commit_sync(tpl).await?,
        }

        debug!(partition_count = offsets.len(), mode = ?mode, "Committed offsets");
        Ok(())
    }

    async fn commit(&mut self, mode: CommitMode) -> Result<(), IngestError> {
        let offsets = self.last_polled.clone();
        self.commit_offsets(&offsets, mode).await
    }

    async fn reconnect(&mut self) -> Result<(), IngestError> {
        self.detach();
        loop {
            sleep(RECONNECT_DELAY).await;
            match self.reopen().await {
                Ok(consumer) => {
                    self.consumer = consumer;
                    info!(topic = %self.settings.topic, "Kafka consumer reconnected");
                    return Ok(());
                }
                Err(e) => {
                    error!(
                        error = %e,
                        retry_in_secs = RECONNECT_DELAY.as_secs(),
                        "Failed to reconnect Kafka consumer"
                    );
                }
            }
        }
    }

    async fn close(&mut self) {
        self.detach();
        info!(topic = %self.settings.topic, "Kafka consumer closed");
    }
}

/// Partition list assigning every partition of `topic` for a replay.
///
/// Partitions already read resume after the last offset seen; the others
/// start at `start`, or at the stored group position when `start` is `None`.
fn replay_assignment(
    topic: &str,
    partitions: &[i32],
    start: Option<i64>,
    replayed: &BatchOffsets,
) -> Result<TopicPartitionList, IngestError> {
    let mut tpl = TopicPartitionList::new();
    for &partition in partitions {
        let position = match (replayed.get(topic, partition), start) {
            (Some(last), _) => Offset::Offset(last + 1),
            (None, Some(offset)) => Offset::Offset(offset),
            (None, None) => Offset::Stored,
        };
        tpl.add_partition_offset(topic, partition, position)
            .map_err(|e| IngestError::kafka(e.to_string()))?;
    }
    Ok(tpl)
}
