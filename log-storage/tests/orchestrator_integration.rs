//! Integration tests for the log storage orchestrator.
//!
//! These tests run the real Orchestrator and BatchHandler against scripted
//! mocks of the stream source, the document store and the dead-letter
//! publisher.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::time::{sleep, timeout};

use log_storage::consumer::{BatchOffsets, CommitMode, RawMessage, StreamSource};
use log_storage::dead_letter::{DeadLetterPublisher, DeadLetterRouter};
use log_storage::errors::IngestError;
use log_storage::index_cache::IndexLifecycleCache;
use log_storage::loader::{BulkLoader, RetryPolicy, TerminalFailurePolicy};
use log_storage::orchestrator::{BatchHandler, Orchestrator, OrchestratorConfig};
use log_storage::producer::DeliveryOutcome;
use log_storage_repository::{
    BulkAction, BulkItemResult, BulkResponse, CreateIndexOutcome, DocumentStore,
    DocumentStoreError,
};
use log_storage_shared::DeadLetterMessage;

const TOPIC: &str = "logs";

// Mock stream source

#[derive(Default)]
struct SourceState {
    batches: VecDeque<Vec<RawMessage>>,
    commits: Vec<(BatchOffsets, CommitMode)>,
    /// Documents durable in the store when each commit was made.
    written_at_commit: Vec<HashSet<i64>>,
    closed: bool,
    /// Polls that fail with a transport error before any batch is returned.
    errors_before: usize,
    /// Fail with a transport error instead of returning an empty poll.
    fail_when_empty: bool,
    /// Reconnecting never completes.
    reconnect_hangs: bool,
    reconnects: usize,
}

struct MockSource {
    state: Arc<Mutex<SourceState>>,
    store: Arc<MockStore>,
}

#[async_trait]
impl StreamSource for MockSource {
    async fn poll(
        &mut self,
        timeout: Duration,
        _max_records: usize,
    ) -> Result<Vec<RawMessage>, IngestError> {
        let (next, fail) = {
            let mut state = self.state.lock().unwrap();
            if state.errors_before > 0 {
                state.errors_before -= 1;
                (None, true)
            } else {
                let next = state.batches.pop_front();
                let fail = next.is_none() && state.fail_when_empty;
                (next, fail)
            }
        };
        if fail {
            return Err(IngestError::kafka("Local: Broker transport failure"));
        }
        match next {
            Some(batch) => Ok(batch),
            None => {
                sleep(timeout).await;
                Ok(Vec::new())
            }
        }
    }

    async fn commit_offsets(
        &mut self,
        offsets: &BatchOffsets,
        mode: CommitMode,
    ) -> Result<(), IngestError> {
        let written = self.store.written_offsets();
        let mut state = self.state.lock().unwrap();
        state.commits.push((offsets.clone(), mode));
        state.written_at_commit.push(written);
        Ok(())
    }

    async fn commit(&mut self, _mode: CommitMode) -> Result<(), IngestError> {
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<(), IngestError> {
        let hangs = {
            let mut state = self.state.lock().unwrap();
            state.reconnects += 1;
            state.reconnect_hangs
        };
        if hangs {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.state.lock().unwrap().closed = true;
    }
}

// Mock document store

#[derive(Default)]
struct MockStore {
    aliases: HashSet<String>,
    /// Indices whose creation fails.
    broken_indices: HashSet<String>,
    /// Every bulk request fails as a whole.
    fail_bulk: bool,
    /// Documents whose `seq` field the store rejects.
    reject_seq: HashSet<i64>,
    /// Time bulk requests touching an index take.
    delays: HashMap<String, Duration>,
    created: Mutex<HashSet<String>>,
    create_calls: Mutex<Vec<String>>,
    bulk_calls: Mutex<usize>,
    written: Mutex<Vec<Map<String, Value>>>,
}

impl MockStore {
    fn written_count(&self) -> usize {
        self.written.lock().unwrap().len()
    }

    fn written_offsets(&self) -> HashSet<i64> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .filter_map(|doc| doc.get("seq").and_then(Value::as_i64))
            .collect()
    }

    fn create_calls(&self) -> Vec<String> {
        self.create_calls.lock().unwrap().clone()
    }

    fn bulk_calls(&self) -> usize {
        *self.bulk_calls.lock().unwrap()
    }
}

#[async_trait]
impl DocumentStore for MockStore {
    async fn list_aliases(&self) -> Result<HashSet<String>, DocumentStoreError> {
        Ok(self.aliases.clone())
    }

    async fn index_exists(&self, name: &str) -> Result<bool, DocumentStoreError> {
        Ok(self.aliases.contains(name) || self.created.lock().unwrap().contains(name))
    }

    async fn create_index(
        &self,
        name: &str,
        _mappings: Option<&Map<String, Value>>,
    ) -> Result<CreateIndexOutcome, DocumentStoreError> {
        self.create_calls.lock().unwrap().push(name.to_string());
        if self.broken_indices.contains(name) {
            return Err(DocumentStoreError::index_creation(format!(
                "invalid_index_name_exception for {}",
                name
            )));
        }
        if self.created.lock().unwrap().insert(name.to_string()) {
            Ok(CreateIndexOutcome::Created)
        } else {
            Ok(CreateIndexOutcome::AlreadyExists)
        }
    }

    async fn bulk_write(&self, actions: &[BulkAction]) -> Result<BulkResponse, DocumentStoreError> {
        *self.bulk_calls.lock().unwrap() += 1;
        if self.fail_bulk {
            return Err(DocumentStoreError::request("connection reset by peer"));
        }
        let delay = actions
            .iter()
            .filter_map(|a| self.delays.get(a.directive.index()))
            .max()
            .copied();
        if let Some(delay) = delay {
            sleep(delay).await;
        }

        let mut items = Vec::with_capacity(actions.len());
        let mut written = self.written.lock().unwrap();
        for action in actions {
            let index = action.directive.index();
            let seq = action.document.get("seq").and_then(Value::as_i64);
            if seq.map_or(false, |s| self.reject_seq.contains(&s)) {
                items.push(BulkItemResult::failed(
                    "create",
                    index,
                    400,
                    "mapper_parsing_exception",
                    "failed to parse field [level]",
                ));
            } else {
                written.push(action.document.clone());
                items.push(BulkItemResult::ok("create", index, 201));
            }
        }
        let errors = items.iter().any(BulkItemResult::is_error);
        Ok(BulkResponse {
            took: 1,
            errors,
            items,
        })
    }
}

// Mock dead-letter publisher

#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<DeadLetterMessage>>,
}

impl RecordingPublisher {
    fn messages(&self) -> Vec<DeadLetterMessage> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeadLetterPublisher for RecordingPublisher {
    async fn publish(&self, message: &DeadLetterMessage) -> DeliveryOutcome {
        self.published.lock().unwrap().push(message.clone());
        DeliveryOutcome::Delivered {
            partition: 0,
            offset: 0,
        }
    }
}

// Helpers

fn message(partition: i32, offset: i64, payload: Value) -> RawMessage {
    RawMessage::new(TOPIC, partition, offset, payload.to_string())
}

fn log_message(partition: i32, offset: i64, index: &str) -> RawMessage {
    message(
        partition,
        offset,
        json!({"index_name": index, "body": {"msg": "ok", "seq": offset}}),
    )
}

fn test_config(workers: usize) -> OrchestratorConfig {
    OrchestratorConfig {
        poll_timeout: Duration::from_millis(10),
        max_poll_records: 500,
        worker_pool_size: workers,
        channel_buffer_size: 8,
        metrics_interval: Duration::from_secs(60),
        drain_timeout: Duration::from_secs(5),
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1))
}

struct Harness {
    store: Arc<MockStore>,
    publisher: Arc<RecordingPublisher>,
    source: Arc<Mutex<SourceState>>,
    orchestrator: Orchestrator,
}

fn harness(
    store: MockStore,
    batches: Vec<Vec<RawMessage>>,
    policy: TerminalFailurePolicy,
    workers: usize,
) -> Harness {
    let source = SourceState {
        batches: batches.into(),
        ..Default::default()
    };
    harness_with(store, source, policy, test_config(workers))
}

fn harness_with(
    store: MockStore,
    source: SourceState,
    policy: TerminalFailurePolicy,
    config: OrchestratorConfig,
) -> Harness {
    let store = Arc::new(store);
    let publisher = Arc::new(RecordingPublisher::default());
    let source_state = Arc::new(Mutex::new(source));

    let dyn_store: Arc<dyn DocumentStore> = store.clone();
    let cache = Arc::new(IndexLifecycleCache::new(Arc::clone(&dyn_store)));
    let loader = BulkLoader::with_retry(dyn_store, fast_retry());
    let router = DeadLetterRouter::new(publisher.clone());
    let handler = BatchHandler::new(cache, loader, router, policy);

    let source = MockSource {
        state: Arc::clone(&source_state),
        store: Arc::clone(&store),
    };
    let orchestrator = Orchestrator::with_config(Box::new(source), handler, config);

    Harness {
        store,
        publisher,
        source: source_state,
        orchestrator,
    }
}

/// Run the orchestrator until `done` holds, then shut it down.
async fn run_until<F>(orchestrator: &mut Orchestrator, done: F)
where
    F: Fn() -> bool,
{
    let shutdown = orchestrator.shutdown_handle();
    let driver = async {
        while !done() {
            sleep(Duration::from_millis(10)).await;
        }
        // Give workers a moment to acknowledge before stopping.
        sleep(Duration::from_millis(50)).await;
        shutdown.shutdown();
    };

    let both = async { tokio::join!(orchestrator.run(), driver) };
    let (result, _) = timeout(Duration::from_secs(10), both)
        .await
        .expect("orchestrator did not stop in time");
    result.expect("orchestrator failed");
}

fn last_committed(state: &Arc<Mutex<SourceState>>, partition: i32) -> Option<i64> {
    state
        .lock()
        .unwrap()
        .commits
        .iter()
        .filter_map(|(offsets, _)| offsets.get(TOPIC, partition))
        .max()
}

async fn with_timeout<T>(fut: impl Future<Output = T>) -> T {
    timeout(Duration::from_secs(10), fut)
        .await
        .expect("test timed out")
}

// Tests

#[tokio::test]
async fn test_valid_record_is_written_and_committed() {
    let mut h = harness(
        MockStore::default(),
        vec![vec![message(
            0,
            0,
            json!({"index_name": "svc_logs", "body": {"msg": "ok"}}),
        )]],
        TerminalFailurePolicy::DeadLetter,
        2,
    );

    let store = Arc::clone(&h.store);
    let source = Arc::clone(&h.source);
    run_until(&mut h.orchestrator, || {
        store.written_count() == 1 && last_committed(&source, 0).is_some()
    })
    .await;

    assert_eq!(h.store.written_count(), 1);
    assert!(h.publisher.messages().is_empty());
    assert_eq!(last_committed(&h.source, 0), Some(0));
    assert_eq!(h.store.create_calls(), vec!["svc_logs".to_string()]);
    assert!(h.source.lock().unwrap().closed);
}

#[tokio::test]
async fn test_missing_body_is_dead_lettered_and_committed() {
    let mut h = harness(
        MockStore::default(),
        vec![vec![message(0, 0, json!({"index_name": "svc_logs"}))]],
        TerminalFailurePolicy::DeadLetter,
        2,
    );

    let publisher = Arc::clone(&h.publisher);
    let source = Arc::clone(&h.source);
    run_until(&mut h.orchestrator, || {
        publisher.messages().len() == 1 && last_committed(&source, 0).is_some()
    })
    .await;

    assert_eq!(h.store.written_count(), 0);
    assert_eq!(h.store.bulk_calls(), 0);
    let dead = h.publisher.messages();
    assert_eq!(dead.len(), 1);
    assert!(dead[0].reason.contains("body"), "reason: {}", dead[0].reason);
    assert_eq!(dead[0].original, json!({"index_name": "svc_logs"}));
    assert_eq!(last_committed(&h.source, 0), Some(0));
}

#[tokio::test]
async fn test_exhausted_bulk_dead_letters_whole_batch_and_commits() {
    let store = MockStore {
        fail_bulk: true,
        ..Default::default()
    };
    let batch: Vec<RawMessage> = (0..4).map(|o| log_message(0, o, "svc_logs")).collect();
    let mut h = harness(store, vec![batch], TerminalFailurePolicy::DeadLetter, 2);

    let publisher = Arc::clone(&h.publisher);
    let source = Arc::clone(&h.source);
    run_until(&mut h.orchestrator, || {
        publisher.messages().len() == 4 && last_committed(&source, 0).is_some()
    })
    .await;

    assert_eq!(h.store.bulk_calls(), 3);
    let dead = h.publisher.messages();
    assert_eq!(dead.len(), 4);
    let reasons: HashSet<&str> = dead.iter().map(|d| d.reason.as_str()).collect();
    assert_eq!(reasons.len(), 1);
    assert!(dead[0].reason.contains("connection reset by peer"));
    assert_eq!(last_committed(&h.source, 0), Some(3));
}

#[tokio::test]
async fn test_partial_bulk_failure_dead_letters_only_failed_items() {
    let store = MockStore {
        reject_seq: [2].into_iter().collect(),
        ..Default::default()
    };
    let batch: Vec<RawMessage> = (0..5).map(|o| log_message(0, o, "svc_logs")).collect();
    let mut h = harness(store, vec![batch], TerminalFailurePolicy::DeadLetter, 2);

    let publisher = Arc::clone(&h.publisher);
    let source = Arc::clone(&h.source);
    run_until(&mut h.orchestrator, || {
        publisher.messages().len() == 1 && last_committed(&source, 0).is_some()
    })
    .await;

    assert_eq!(h.store.written_count(), 4);
    assert_eq!(h.store.bulk_calls(), 1);
    let dead = h.publisher.messages();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].reason, "failed to parse field [level]");
    assert_eq!(dead[0].original["action"]["create"]["_index"], "svc_logs");
    assert_eq!(dead[0].original["document"]["seq"], 2);
    assert_eq!(
        dead[0].original["error"]["type"],
        "mapper_parsing_exception"
    );
    assert_eq!(last_committed(&h.source, 0), Some(4));
}

#[tokio::test]
async fn test_index_creation_failure_dead_letters_its_records() {
    let store = MockStore {
        broken_indices: ["bad_logs".to_string()].into_iter().collect(),
        ..Default::default()
    };
    let batch = vec![
        log_message(0, 0, "svc_logs"),
        log_message(0, 1, "bad_logs"),
        log_message(0, 2, "svc_logs"),
    ];
    let mut h = harness(store, vec![batch], TerminalFailurePolicy::DeadLetter, 2);

    let publisher = Arc::clone(&h.publisher);
    let source = Arc::clone(&h.source);
    run_until(&mut h.orchestrator, || {
        publisher.messages().len() == 1 && last_committed(&source, 0).is_some()
    })
    .await;

    assert_eq!(h.store.written_count(), 2);
    let dead = h.publisher.messages();
    assert_eq!(dead.len(), 1);
    assert!(dead[0].reason.starts_with("index creation failed: "));
    assert_eq!(dead[0].original["index_name"], "bad_logs");
    assert_eq!(last_committed(&h.source, 0), Some(2));
}

#[tokio::test]
async fn test_hold_policy_leaves_batch_uncommitted() {
    let store = MockStore {
        fail_bulk: true,
        ..Default::default()
    };
    let batch: Vec<RawMessage> = (0..3).map(|o| log_message(0, o, "svc_logs")).collect();
    let mut h = harness(store, vec![batch], TerminalFailurePolicy::Hold, 2);

    let store = Arc::clone(&h.store);
    run_until(&mut h.orchestrator, || store.bulk_calls() == 3).await;

    assert!(h.publisher.messages().is_empty());
    assert_eq!(last_committed(&h.source, 0), None);
    let metrics = h.orchestrator.metrics().snapshot();
    assert_eq!(metrics.batches_exhausted, 1);
}

#[tokio::test]
async fn test_commits_wait_for_earlier_batches() {
    let store = MockStore {
        delays: HashMap::from([("slow_logs".to_string(), Duration::from_millis(300))]),
        ..Default::default()
    };
    let batches = vec![
        vec![log_message(0, 0, "slow_logs"), log_message(0, 1, "slow_logs")],
        vec![log_message(0, 2, "fast_logs"), log_message(0, 3, "fast_logs")],
        vec![log_message(1, 100, "fast_logs")],
    ];
    let mut h = harness(store, batches, TerminalFailurePolicy::DeadLetter, 4);

    let store = Arc::clone(&h.store);
    let source = Arc::clone(&h.source);
    run_until(&mut h.orchestrator, || {
        store.written_count() == 5 && last_committed(&source, 0) == Some(3)
    })
    .await;

    let state = h.source.lock().unwrap();
    let mut previous = -1;
    for ((offsets, _), written) in state.commits.iter().zip(state.written_at_commit.iter()) {
        if let Some(committed) = offsets.get(TOPIC, 0) {
            assert!(committed > previous, "commit went backwards");
            previous = committed;
            for offset in 0..=committed {
                assert!(
                    written.contains(&offset),
                    "offset {} committed before it was written",
                    offset
                );
            }
        }
    }
    assert_eq!(previous, 3);
    drop(state);
    assert_eq!(last_committed(&h.source, 1), Some(100));
}

#[tokio::test]
async fn test_shutdown_before_run_stops_immediately() {
    let mut h = harness(
        MockStore::default(),
        vec![vec![log_message(0, 0, "svc_logs")]],
        TerminalFailurePolicy::DeadLetter,
        2,
    );

    h.orchestrator.shutdown();
    with_timeout(h.orchestrator.run())
        .await
        .expect("orchestrator failed");

    let state = h.source.lock().unwrap();
    assert!(state.closed);
    assert_eq!(state.batches.len(), 1);
    assert!(state.commits.is_empty());
    drop(state);
    assert_eq!(h.store.written_count(), 0);
}

#[tokio::test]
async fn test_transport_error_reconnects_and_resumes() {
    let source = SourceState {
        batches: vec![
            vec![log_message(0, 0, "svc_logs")],
            vec![log_message(0, 1, "svc_logs")],
        ]
        .into(),
        errors_before: 2,
        ..Default::default()
    };
    let mut h = harness_with(
        MockStore::default(),
        source,
        TerminalFailurePolicy::DeadLetter,
        test_config(2),
    );

    let source = Arc::clone(&h.source);
    run_until(&mut h.orchestrator, || last_committed(&source, 0) == Some(1)).await;

    let state = h.source.lock().unwrap();
    assert_eq!(state.reconnects, 2);
    assert!(state.closed);
    drop(state);
    assert_eq!(h.store.written_count(), 2);
    assert!(h.publisher.messages().is_empty());
}

#[tokio::test]
async fn test_shutdown_interrupts_hanging_reconnect() {
    let source = SourceState {
        batches: vec![vec![log_message(0, 0, "svc_logs")]].into(),
        fail_when_empty: true,
        reconnect_hangs: true,
        ..Default::default()
    };
    let mut h = harness_with(
        MockStore::default(),
        source,
        TerminalFailurePolicy::DeadLetter,
        test_config(2),
    );

    let store = Arc::clone(&h.store);
    let source = Arc::clone(&h.source);
    run_until(&mut h.orchestrator, || {
        store.written_count() == 1 && source.lock().unwrap().reconnects == 1
    })
    .await;

    let state = h.source.lock().unwrap();
    assert!(state.closed);
    assert_eq!(state.reconnects, 1);
    drop(state);
    // The batch handled before the transport failure is still committed.
    assert_eq!(last_committed(&h.source, 0), Some(0));
}

#[tokio::test]
async fn test_drain_timeout_commits_only_finished_batches() {
    let store = MockStore {
        delays: HashMap::from([
            ("quick_logs".to_string(), Duration::from_millis(150)),
            ("stuck_logs".to_string(), Duration::from_secs(30)),
        ]),
        ..Default::default()
    };
    let source = SourceState {
        batches: vec![
            vec![log_message(0, 0, "quick_logs")],
            vec![log_message(1, 10, "stuck_logs")],
        ]
        .into(),
        ..Default::default()
    };
    let config = OrchestratorConfig {
        drain_timeout: Duration::from_millis(500),
        ..test_config(2)
    };
    let mut h = harness_with(store, source, TerminalFailurePolicy::DeadLetter, config);

    // Stop as soon as both batches are in flight.
    let shutdown = h.orchestrator.shutdown_handle();
    let store = Arc::clone(&h.store);
    let driver = async {
        while store.bulk_calls() < 2 {
            sleep(Duration::from_millis(5)).await;
        }
        shutdown.shutdown();
    };

    let started = Instant::now();
    let (result, _) = with_timeout(async { tokio::join!(h.orchestrator.run(), driver) }).await;
    result.expect("orchestrator failed");
    assert!(started.elapsed() < Duration::from_secs(5));

    let state = h.source.lock().unwrap();
    assert!(state.closed);
    let commits: Vec<_> = state
        .commits
        .iter()
        .filter(|(offsets, _)| !offsets.is_empty())
        .collect();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].0.get(TOPIC, 0), Some(0));
    assert_eq!(commits[0].1, CommitMode::Sync);
    drop(state);
    assert_eq!(last_committed(&h.source, 1), None);
    assert!(h.publisher.messages().is_empty());
}

#[tokio::test]
async fn test_known_indices_are_not_created_again() {
    let store = MockStore {
        aliases: ["svc_logs".to_string()].into_iter().collect(),
        ..Default::default()
    };
    let batches = vec![
        vec![log_message(0, 0, "svc_logs")],
        vec![log_message(0, 1, "svc_logs")],
    ];
    let mut h = harness(store, batches, TerminalFailurePolicy::DeadLetter, 2);

    let store = Arc::clone(&h.store);
    run_until(&mut h.orchestrator, || store.written_count() == 2).await;

    assert!(h.store.create_calls().is_empty());
}

#[tokio::test]
async fn test_handler_creates_each_index_once() {
    let store = Arc::new(MockStore::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let dyn_store: Arc<dyn DocumentStore> = store.clone();
    let cache = Arc::new(IndexLifecycleCache::new(Arc::clone(&dyn_store)));
    let handler = BatchHandler::new(
        cache,
        BulkLoader::with_retry(dyn_store, fast_retry()),
        DeadLetterRouter::new(publisher.clone()),
        TerminalFailurePolicy::DeadLetter,
    );

    let first = with_timeout(handler.handle(&[
        log_message(0, 0, "a_logs"),
        log_message(0, 1, "b_logs"),
    ]))
    .await;
    let second = with_timeout(handler.handle(&[
        log_message(0, 2, "a_logs"),
        log_message(0, 3, "b_logs"),
    ]))
    .await;

    assert_eq!(first.written, 2);
    assert_eq!(second.written, 2);
    assert!(first.commit && second.commit);
    let mut calls = store.create_calls();
    calls.sort();
    assert_eq!(calls, vec!["a_logs".to_string(), "b_logs".to_string()]);
    assert!(publisher.messages().is_empty());
}

#[tokio::test]
async fn test_handler_fans_out_array_payloads() {
    let store = Arc::new(MockStore::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let dyn_store: Arc<dyn DocumentStore> = store.clone();
    let handler = BatchHandler::new(
        Arc::new(IndexLifecycleCache::new(Arc::clone(&dyn_store))),
        BulkLoader::with_retry(dyn_store, fast_retry()),
        DeadLetterRouter::new(publisher.clone()),
        TerminalFailurePolicy::DeadLetter,
    );

    let payload = json!([
        {"index_name": "svc_logs", "body": [{"seq": 10}, {"seq": 11}]},
        {"index_name": "svc_logs", "body": "not an object"},
    ]);
    let report = with_timeout(handler.handle(&[message(0, 0, payload)])).await;

    assert_eq!(report.received, 2);
    assert_eq!(report.written, 2);
    assert_eq!(report.dead_lettered, 1);
    assert_eq!(store.written_offsets(), [10, 11].into_iter().collect());

    let snapshot = handler.metrics().snapshot();
    assert_eq!(snapshot.records_received, 2);
    assert_eq!(snapshot.documents_written, 2);
    assert_eq!(snapshot.dead_lettered, 1);
}
