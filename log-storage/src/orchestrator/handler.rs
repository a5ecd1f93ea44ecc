//! Handling of one polled batch.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use log_storage_shared::LogRecord;

use crate::consumer::RawMessage;
use crate::dead_letter::DeadLetterRouter;
use crate::index_cache::IndexLifecycleCache;
use crate::loader::{BulkLoader, LoadOutcome, TerminalFailurePolicy};
use crate::orchestrator::PipelineMetrics;
use crate::processor::RecordParser;

/// What happened to one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Records decoded from the batch, valid or not.
    pub received: usize,
    /// Documents the store accepted.
    pub written: usize,
    /// Dead letters routed (published or dropped).
    pub dead_lettered: usize,
    /// Whether the batch's offsets may be committed.
    pub commit: bool,
}

/// Runs parse, index provisioning, bulk write and dead-lettering for a batch.
pub struct BatchHandler {
    parser: RecordParser,
    cache: Arc<IndexLifecycleCache>,
    loader: BulkLoader,
    router: DeadLetterRouter,
    policy: TerminalFailurePolicy,
    metrics: Arc<PipelineMetrics>,
}

impl BatchHandler {
    pub fn new(
        cache: Arc<IndexLifecycleCache>,
        loader: BulkLoader,
        router: DeadLetterRouter,
        policy: TerminalFailurePolicy,
    ) -> Self {
        Self {
            parser: RecordParser::new(),
            cache,
            loader,
            router,
            policy,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn cache(&self) -> &IndexLifecycleCache {
        &self.cache
    }

    /// Handle every message of a batch.
    ///
    /// Every record ends up either written or dead-lettered, except when the
    /// bulk request fails on every attempt under the hold policy.
    #[instrument(skip(self, messages), fields(message_count = messages.len()))]
    pub async fn handle(&self, messages: &[RawMessage]) -> BatchReport {
        let parsed = self.parser.parse_batch(messages);
        let mut report = BatchReport {
            received: parsed.total(),
            commit: true,
            ..Default::default()
        };
        self.metrics.add_received(report.received);

        let mut dead_letters: Vec<(Value, String)> = parsed
            .rejected
            .into_iter()
            .map(|r| (r.original, r.reason))
            .collect();

        let records = self.provision_indices(parsed.records, &mut dead_letters).await;

        let mut exhausted = false;
        match self.loader.load(&records).await {
            LoadOutcome::Completed { written, failed } => {
                report.written = written;
                dead_letters.extend(failed.iter().map(|item| (item.original(), item.reason.clone())));
            }
            LoadOutcome::Exhausted { attempts, error } => {
                exhausted = true;
                match self.policy {
                    TerminalFailurePolicy::DeadLetter => {
                        let reason = error.to_string();
                        warn!(
                            attempts = attempts,
                            record_count = records.len(),
                            "Dead-lettering batch after bulk retries were exhausted"
                        );
                        dead_letters.extend(records.iter().map(|r| (r.to_value(), reason.clone())));
                    }
                    TerminalFailurePolicy::Hold => {
                        error!(
                            attempts = attempts,
                            record_count = records.len(),
                            error = %error,
                            "Holding batch uncommitted after bulk retries were exhausted"
                        );
                        report.commit = false;
                    }
                }
            }
        }

        report.dead_lettered = self.route_all(dead_letters).await;
        self.metrics.add_written(report.written);
        self.metrics.batch_handled(exhausted);

        if report.dead_lettered > 0 {
            info!(
                received = report.received,
                written = report.written,
                dead_lettered = report.dead_lettered,
                "Batch handled with dead letters"
            );
        } else {
            debug!(received = report.received, written = report.written, "Batch handled");
        }
        report
    }

    /// Ensure every target index exists. Records bound for an index that
    /// could not be created are moved to `dead_letters`.
    async fn provision_indices(
        &self,
        records: Vec<LogRecord>,
        dead_letters: &mut Vec<(Value, String)>,
    ) -> Vec<LogRecord> {
        if records.is_empty() {
            return records;
        }

        let names: BTreeSet<String> = records.iter().map(|r| r.index_name.clone()).collect();
        let mut mappings = HashMap::new();
        for record in &records {
            if let Some(m) = &record.mappings {
                mappings
                    .entry(record.index_name.clone())
                    .or_insert_with(|| m.clone());
            }
        }

        let ensured = self.cache.ensure(&names, &mappings).await;
        if ensured.is_ok() {
            return records;
        }

        let (kept, lost): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|r| ensured.failure(&r.index_name).is_none());
        for record in lost {
            let cause = ensured.failure(&record.index_name).unwrap_or_default();
            let reason = format!("index creation failed: {}", cause);
            dead_letters.push((record.to_value(), reason));
        }
        kept
    }

    /// Publish dead letters concurrently. Returns how many were routed.
    async fn route_all(&self, dead_letters: Vec<(Value, String)>) -> usize {
        let count = dead_letters.len();
        if count == 0 {
            return 0;
        }

        let outcomes = join_all(
            dead_letters
                .into_iter()
                .map(|(original, reason)| self.router.route(original, reason)),
        )
        .await;

        let failures = outcomes.iter().filter(|o| !o.is_delivered()).count();
        self.metrics.add_dead_lettered(count);
        self.metrics.add_dead_letter_failures(failures);
        count
    }
}
