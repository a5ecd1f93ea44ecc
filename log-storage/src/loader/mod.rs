//! Loader module for the log storage ingest.
//!
//! Writes the documents of validated records with one bulk request per
//! batch, retrying the whole request with exponential back-off when the
//! store fails, and reporting per-item failures of a completed request.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio_retry::Retry;
use tracing::{debug, error, instrument, warn};

use log_storage_repository::{BulkAction, DocumentStore, DocumentStoreError};
use log_storage_shared::LogRecord;

/// Default number of bulk attempts per batch.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Default delay before the first retry.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;

/// Retry schedule for bulk requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: usize,
    /// Delay before the first retry; doubled before each following one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delays between attempts: base, 2x base, 4x base, ...
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        std::iter::successors(Some(self.base_delay), |delay| Some(*delay * 2))
            .take(self.max_attempts.saturating_sub(1))
    }
}

/// What to do with a batch whose bulk request failed on every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminalFailurePolicy {
    /// Dead-letter every record and commit the batch.
    #[default]
    DeadLetter,
    /// Leave the batch uncommitted so it is delivered again after a restart.
    Hold,
}

impl FromStr for TerminalFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dead-letter" | "dead_letter" | "deadletter" => Ok(Self::DeadLetter),
            "hold" => Ok(Self::Hold),
            other => Err(format!("unknown terminal failure policy '{}'", other)),
        }
    }
}

impl fmt::Display for TerminalFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeadLetter => f.write_str("dead-letter"),
            Self::Hold => f.write_str("hold"),
        }
    }
}

/// A document the store rejected in an otherwise completed bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedItem {
    pub index: String,
    pub document: Map<String, Value>,
    pub status: u16,
    pub reason: String,
    /// The store's error object.
    pub error: Option<Value>,
}

impl FailedItem {
    /// Dead-letter `original`: the action, the document and the store's error.
    pub fn original(&self) -> Value {
        json!({
            "action": {"create": {"_index": self.index}},
            "document": self.document,
            "error": self.error.clone().unwrap_or_else(|| Value::String(self.reason.clone())),
        })
    }
}

/// Outcome of loading one batch.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The bulk request completed. Documents not listed in `failed` are durable.
    Completed {
        written: usize,
        failed: Vec<FailedItem>,
    },
    /// Every attempt failed.
    Exhausted {
        attempts: usize,
        error: DocumentStoreError,
    },
}

/// Loader that writes documents into the store with bulk requests.
pub struct BulkLoader {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
}

impl BulkLoader {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_retry(store, RetryPolicy::default())
    }

    pub fn with_retry(store: Arc<dyn DocumentStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Flatten records into `create` actions, one per document.
    pub fn actions(records: &[LogRecord]) -> Vec<BulkAction> {
        records
            .iter()
            .flat_map(|record| {
                record
                    .body
                    .documents()
                    .map(|doc| BulkAction::create(record.index_name.clone(), doc.clone()))
            })
            .collect()
    }

    /// Write the documents of `records` with one bulk request.
    #[instrument(skip(self, records), fields(record_count = records.len()))]
    pub async fn load(&self, records: &[LogRecord]) -> LoadOutcome {
        let actions = Self::actions(records);
        if actions.is_empty() {
            return LoadOutcome::Completed {
                written: 0,
                failed: Vec::new(),
            };
        }

        let store = &self.store;
        let actions_ref = &actions;
        let mut attempts = 0usize;
        let result = Retry::spawn(self.retry.delays(), || {
            attempts += 1;
            let attempt = attempts;
            async move {
                store.bulk_write(actions_ref).await.map_err(|e| {
                    warn!(attempt = attempt, error = %e, "Bulk request failed");
                    e
                })
            }
        })
        .await;

        let response = match result {
            Ok(response) => response,
            Err(error) => {
                error!(
                    attempts = attempts,
                    document_count = actions.len(),
                    error = %error,
                    "Bulk request failed on every attempt"
                );
                return LoadOutcome::Exhausted { attempts, error };
            }
        };

        let mut failed = Vec::new();
        if response.errors {
            for (action, item) in actions.iter().zip(response.items.iter()) {
                if let Some(item_error) = &item.error {
                    failed.push(FailedItem {
                        index: item
                            .index
                            .clone()
                            .unwrap_or_else(|| action.directive.index().to_string()),
                        document: action.document.clone(),
                        status: item.status,
                        reason: item_error.reason.clone(),
                        error: item.raw_error.clone(),
                    });
                }
            }
            warn!(
                failed = failed.len(),
                total = actions.len(),
                "Bulk request completed with item errors"
            );
        }

        let written = actions.len() - failed.len();
        debug!(written = written, took_ms = response.took, "Bulk request completed");
        LoadOutcome::Completed { written, failed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use log_storage_repository::{BulkItemResult, BulkResponse, CreateIndexOutcome};
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Store whose bulk call fails a set number of times before succeeding.
    struct FlakyStore {
        failures_left: Mutex<usize>,
        calls: Mutex<usize>,
        reject_index: Option<usize>,
    }

    impl FlakyStore {
        fn new(failures: usize) -> Self {
            Self {
                failures_left: Mutex::new(failures),
                calls: Mutex::new(0),
                reject_index: None,
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn list_aliases(&self) -> Result<HashSet<String>, DocumentStoreError> {
            Ok(HashSet::new())
        }

        async fn index_exists(&self, _name: &str) -> Result<bool, DocumentStoreError> {
            Ok(true)
        }

        async fn create_index(
            &self,
            _name: &str,
            _mappings: Option<&Map<String, Value>>,
        ) -> Result<CreateIndexOutcome, DocumentStoreError> {
            Ok(CreateIndexOutcome::Created)
        }

        async fn bulk_write(
            &self,
            actions: &[BulkAction],
        ) -> Result<BulkResponse, DocumentStoreError> {
            *self.calls.lock().unwrap() += 1;
            {
                let mut left = self.failures_left.lock().unwrap();
                if *left > 0 {
                    *left -= 1;
                    return Err(DocumentStoreError::bulk("connection reset"));
                }
            }
            let items = actions
                .iter()
                .enumerate()
                .map(|(i, a)| {
                    if Some(i) == self.reject_index {
                        BulkItemResult::failed(
                            "create",
                            a.directive.index(),
                            400,
                            "mapper_parsing_exception",
                            "failed to parse field [n]",
                        )
                    } else {
                        BulkItemResult::ok("create", a.directive.index(), 201)
                    }
                })
                .collect();
            Ok(BulkResponse {
                took: 1,
                errors: self.reject_index.is_some(),
                items,
            })
        }
    }

    fn record(index: &str, docs: usize) -> LogRecord {
        let docs = (0..docs)
            .map(|n| json!({ "n": n }).as_object().cloned().unwrap())
            .collect();
        LogRecord {
            index_name: index.to_string(),
            body: log_storage_shared::LogBody::Many(docs),
            mappings: None,
        }
    }

    #[test]
    fn test_default_delays_double() {
        let delays: Vec<_> = RetryPolicy::default().delays().collect();
        assert_eq!(delays, vec![Duration::from_secs(1), Duration::from_secs(2)]);
        assert_eq!(RetryPolicy::new(1, Duration::from_secs(1)).delays().count(), 0);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "hold".parse::<TerminalFailurePolicy>().unwrap(),
            TerminalFailurePolicy::Hold
        );
        assert_eq!(
            "Dead-Letter".parse::<TerminalFailurePolicy>().unwrap(),
            TerminalFailurePolicy::DeadLetter
        );
        assert!("drop".parse::<TerminalFailurePolicy>().is_err());
    }

    #[test]
    fn test_actions_flatten_bodies() {
        let actions = BulkLoader::actions(&[record("a", 2), record("b", 1)]);
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[2].directive.index(), "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success() {
        let store = Arc::new(FlakyStore::new(2));
        let loader = BulkLoader::new(store.clone());

        match loader.load(&[record("a", 3)]).await {
            LoadOutcome::Completed { written, failed } => {
                assert_eq!(written, 3);
                assert!(failed.is_empty());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(*store.calls.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_after_three_attempts() {
        let store = Arc::new(FlakyStore::new(10));
        let loader = BulkLoader::new(store.clone());

        let started = tokio::time::Instant::now();
        match loader.load(&[record("a", 1)]).await {
            LoadOutcome::Exhausted { attempts, error } => {
                assert_eq!(attempts, 3);
                assert!(error.to_string().contains("connection reset"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(*store.calls.lock().unwrap(), 3);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_item_errors_are_reported() {
        let store = Arc::new(FlakyStore {
            reject_index: Some(1),
            ..FlakyStore::new(0)
        });
        let loader = BulkLoader::new(store);

        match loader.load(&[record("a", 5)]).await {
            LoadOutcome::Completed { written, failed } => {
                assert_eq!(written, 4);
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].reason, "failed to parse field [n]");
                assert_eq!(failed[0].document["n"], 1);
                let original = failed[0].original();
                assert_eq!(original["action"]["create"]["_index"], "a");
                assert_eq!(original["error"]["type"], "mapper_parsing_exception");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_batch_skips_store() {
        let store = Arc::new(FlakyStore::new(0));
        let loader = BulkLoader::new(store.clone());
        assert!(matches!(
            loader.load(&[]).await,
            LoadOutcome::Completed { written: 0, .. }
        ));
        assert_eq!(*store.calls.lock().unwrap(), 0);
    }
}
