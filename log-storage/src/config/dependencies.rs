//! Dependency initialization and wiring for the log storage pipeline.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::{ConnectionMode, Settings};
use crate::consumer::KafkaConsumer;
use crate::dead_letter::DeadLetterRouter;
use crate::index_cache::IndexLifecycleCache;
use crate::loader::BulkLoader;
use crate::orchestrator::{BatchHandler, Orchestrator};
use crate::producer::KafkaProducer;
use crate::LogStorageError;
use log_storage_repository::{DocumentStore, OpenSearchStore, StoreConfig};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
    /// Producer behind the dead-letter router, flushed at shutdown.
    pub dead_letter_producer: KafkaProducer,
}

impl Dependencies {
    /// Initialize all dependencies from settings.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(LogStorageError)` - If initialization fails (OpenSearch only in
    ///   fail-fast mode)
    pub async fn new(settings: &Settings) -> Result<Self, LogStorageError> {
        info!(
            opensearch_url = %settings.opensearch_url,
            kafka_broker = %settings.kafka.brokers,
            topic = %settings.topic,
            dead_letter_topic = %settings.dead_letter_topic,
            group_id = %settings.group_id,
            connection_mode = ?settings.connection_mode,
            terminal_failure_policy = %settings.terminal_failure_policy,
            "Initializing dependencies"
        );

        // Initialize OpenSearch store with retry logic
        let store = Self::connect_to_opensearch(settings).await?;
        info!("OpenSearch connection established");
        let store: Arc<dyn DocumentStore> = Arc::new(store);

        // The dead-letter producer retries until the brokers answer
        let dead_letter_producer =
            KafkaProducer::create_connector(&settings.producer_settings(&settings.dead_letter_topic))
                .await;
        info!("Dead-letter producer created");

        let consumer = KafkaConsumer::connect(settings.consumer_settings())
            .await
            .map_err(|e| {
                LogStorageError::config(format!("Failed to create Kafka consumer: {}", e))
            })?;
        info!("Kafka consumer created");

        let cache = Arc::new(IndexLifecycleCache::new(Arc::clone(&store)));
        let loader = BulkLoader::with_retry(store, settings.retry);
        let router = DeadLetterRouter::new(Arc::new(dead_letter_producer.clone()));
        let handler = BatchHandler::new(cache, loader, router, settings.terminal_failure_policy);

        let orchestrator =
            Orchestrator::with_config(Box::new(consumer), handler, settings.orchestrator.clone());

        Ok(Self {
            orchestrator,
            dead_letter_producer,
        })
    }

    /// Connect to OpenSearch with retry logic based on connection mode.
    async fn connect_to_opensearch(settings: &Settings) -> Result<OpenSearchStore, LogStorageError> {
        loop {
            match Self::try_connect_opensearch(settings).await {
                Ok(store) => return Ok(store),
                Err(e) => match settings.connection_mode {
                    ConnectionMode::FailFast => {
                        return Err(LogStorageError::config(format!(
                            "Failed to connect to OpenSearch: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            opensearch_url = %settings.opensearch_url,
                            error = %e,
                            retry_interval_secs = settings.retry_interval.as_secs(),
                            "Failed to connect to OpenSearch, retrying..."
                        );
                        sleep(settings.retry_interval).await;
                    }
                },
            }
        }
    }

    /// Attempt to connect to OpenSearch.
    async fn try_connect_opensearch(settings: &Settings) -> Result<OpenSearchStore, LogStorageError> {
        let mut config = StoreConfig::new(settings.opensearch_url.clone());
        if let (Some(username), Some(password)) =
            (&settings.opensearch_username, &settings.opensearch_password)
        {
            config = config.with_credentials(username.clone(), password.clone());
        }

        let store = OpenSearchStore::new(config).map_err(|e| {
            LogStorageError::config(format!("Failed to create OpenSearch store: {}", e))
        })?;
        store
            .ping()
            .await
            .map_err(|e| LogStorageError::config(format!("OpenSearch unreachable: {}", e)))?;

        Ok(store)
    }

    /// Flush the dead-letter producer.
    pub async fn close(self, timeout: Duration) {
        self.dead_letter_producer.close(timeout).await;
    }
}
