//! Orchestrator module for the log storage ingest.
//!
//! Runs the poll loop, fans batches out to a fixed pool of workers, and
//! commits offsets as batches are acknowledged.

mod handler;
mod metrics;
mod offsets;

pub use handler::{BatchHandler, BatchReport};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use offsets::OffsetTracker;

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::consumer::{Batch, CommitMode, StreamSource};
use crate::errors::IngestError;

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How long one poll waits for messages.
    pub poll_timeout: Duration,
    /// Maximum messages per poll, and so per batch.
    pub max_poll_records: usize,
    /// Number of worker tasks handling batches.
    pub worker_pool_size: usize,
    /// Batches queued for the workers before the poll loop waits.
    pub channel_buffer_size: usize,
    /// Interval between processing summaries.
    pub metrics_interval: Duration,
    /// Time allowed for in-flight batches to finish at shutdown.
    pub drain_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(1000),
            max_poll_records: 500,
            worker_pool_size: 50,
            channel_buffer_size: 100,
            metrics_interval: Duration::from_secs(60),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// Sent by a worker when it finished a batch.
#[derive(Debug, Clone, Copy)]
struct BatchAck {
    sequence: u64,
    commit: bool,
}

/// Stops an [`Orchestrator`] from another task.
///
/// The request is remembered: a shutdown asked for before or during startup
/// makes the next [`Orchestrator::run`] stop right away.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// Orchestrator that coordinates the ingest components.
///
/// The orchestrator:
/// - Polls batches from the stream source
/// - Dispatches them to the worker pool over a bounded channel
/// - Commits offsets in order as workers acknowledge batches
/// - Drains in-flight work on shutdown
pub struct Orchestrator {
    source: Box<dyn StreamSource>,
    handler: Arc<BatchHandler>,
    config: OrchestratorConfig,
    shutdown: ShutdownHandle,
}

impl Orchestrator {
    /// Create a new orchestrator with the default configuration.
    pub fn new(source: Box<dyn StreamSource>, handler: BatchHandler) -> Self {
        Self::with_config(source, handler, OrchestratorConfig::default())
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        source: Box<dyn StreamSource>,
        handler: BatchHandler,
        config: OrchestratorConfig,
    ) -> Self {
        let (tx, _) = watch::channel(false);

        Self {
            source,
            handler: Arc::new(handler),
            config,
            shutdown: ShutdownHandle { tx: Arc::new(tx) },
        }
    }

    /// Handle that stops the poll loop.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.handler.metrics()
    }

    /// Run the orchestrator.
    ///
    /// Starts the worker pool and polls until shutdown is requested, then
    /// drains in-flight batches, commits what they finished and closes the
    /// source.
    #[instrument(skip(self))]
    pub async fn run(&mut self) -> Result<(), IngestError> {
        info!(
            worker_pool_size = self.config.worker_pool_size,
            max_poll_records = self.config.max_poll_records,
            "Starting log storage orchestrator"
        );

        let mut shutdown_rx = self.shutdown.tx.subscribe();

        tokio::select! {
            _ = self.handler.cache().refresh() => {}
            _ = shutdown_rx.wait_for(|stop| *stop) => {}
        }

        let (job_tx, job_rx) = mpsc::channel::<Batch>(self.config.channel_buffer_size.max(1));
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (ack_tx, mut ack_rx) = mpsc::unbounded_channel::<BatchAck>();

        let mut workers: Vec<JoinHandle<()>> = (0..self.config.worker_pool_size.max(1))
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    Arc::clone(&self.handler),
                    Arc::clone(&job_rx),
                    ack_tx.clone(),
                ))
            })
            .collect();
        drop(ack_tx);

        let mut tracker = OffsetTracker::new();
        let metrics = self.handler.metrics();
        let mut previous = metrics.snapshot();
        let mut last_summary = Instant::now();

        info!("Ready to process log records from Kafka");

        loop {
            if *shutdown_rx.borrow() {
                info!("Received shutdown signal");
                break;
            }

            self.commit_acknowledged(&mut ack_rx, &mut tracker, CommitMode::Async)
                .await;

            if last_summary.elapsed() >= self.config.metrics_interval {
                let snapshot = metrics.snapshot();
                snapshot.log_summary(&previous, last_summary.elapsed());
                previous = snapshot;
                last_summary = Instant::now();
            }

            let messages = match self
                .source
                .poll(self.config.poll_timeout, self.config.max_poll_records)
                .await
            {
                Ok(messages) => messages,
                Err(e) if e.is_transport() => {
                    warn!(error = %e, "Stream transport error, reconnecting");
                    tokio::select! {
                        reconnected = self.source.reconnect() => {
                            if let Err(e) = reconnected {
                                error!(error = %e, "Reconnect failed");
                            }
                        }
                        _ = shutdown_rx.wait_for(|stop| *stop) => {
                            info!("Received shutdown signal while reconnecting");
                            break;
                        }
                    }
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "Poll failed");
                    continue;
                }
            };
            if messages.is_empty() {
                continue;
            }

            let batch = tracker.register(messages);
            debug!(
                sequence = batch.sequence,
                message_count = batch.messages.len(),
                "Dispatching batch"
            );

            tokio::select! {
                sent = job_tx.send(batch) => {
                    if sent.is_err() {
                        error!("Worker pool stopped, ending poll loop");
                        break;
                    }
                }
                _ = shutdown_rx.wait_for(|stop| *stop) => {
                    // The undispatched batch is not committed and is read again after restart.
                    info!("Received shutdown signal while dispatching");
                    break;
                }
            }
        }

        // Let queued and in-flight batches finish, up to the drain timeout.
        drop(job_tx);
        let drained = tokio::time::timeout(
            self.config.drain_timeout,
            join_all(workers.iter_mut()),
        )
        .await;
        if drained.is_err() {
            warn!(
                drain_timeout_secs = self.config.drain_timeout.as_secs(),
                in_flight = tracker.in_flight(),
                "Drain timed out, abandoning unfinished batches"
            );
            for handle in &workers {
                handle.abort();
            }
        }

        self.commit_acknowledged(&mut ack_rx, &mut tracker, CommitMode::Sync)
            .await;
        if tracker.held() > 0 {
            warn!(
                held = tracker.held(),
                "Batches held uncommitted will be delivered again"
            );
        }
        self.source.close().await;

        let totals = metrics.snapshot();
        info!(
            records_received = totals.records_received,
            documents_written = totals.documents_written,
            dead_lettered = totals.dead_lettered,
            "Orchestrator shutdown complete"
        );
        Ok(())
    }

    /// Apply pending acknowledgements and commit what became committable.
    async fn commit_acknowledged(
        &mut self,
        acks: &mut mpsc::UnboundedReceiver<BatchAck>,
        tracker: &mut OffsetTracker,
        mode: CommitMode,
    ) {
        while let Ok(ack) = acks.try_recv() {
            tracker.acknowledge(ack.sequence, ack.commit);
        }

        let offsets = tracker.take_committable();
        if offsets.is_empty() {
            return;
        }
        if let Err(e) = self.source.commit_offsets(&offsets, mode).await {
            warn!(error = %e, "Offset commit failed, offsets will be committed with a later batch");
        }
    }
}

async fn worker(
    id: usize,
    handler: Arc<BatchHandler>,
    jobs: Arc<Mutex<mpsc::Receiver<Batch>>>,
    acks: mpsc::UnboundedSender<BatchAck>,
) {
    loop {
        let next = { jobs.lock().await.recv().await };
        let Some(batch) = next else {
            break;
        };

        let report = handler.handle(&batch.messages).await;
        let ack = BatchAck {
            sequence: batch.sequence,
            commit: report.commit,
        };
        if acks.send(ack).is_err() {
            break;
        }
    }
    debug!(worker = id, "Worker stopped");
}

/// Wait for SIGINT or SIGTERM.
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM, waiting for Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
