//! Index lifecycle cache.
//!
//! Tracks which target indices are known to exist and provisions missing ones
//! on demand. The cache is a hint: a name is only added after the store
//! confirmed the index exists, and a miss is always checked against the store.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use log_storage_repository::{CreateIndexOutcome, DocumentStore};

/// Result of an [`IndexLifecycleCache::ensure`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnsureReport {
    /// Indices that could not be provisioned, with the cause.
    pub failed: HashMap<String, String>,
}

impl EnsureReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }

    /// Cause of the failure for `name`, if provisioning it failed.
    pub fn failure(&self, name: &str) -> Option<&str> {
        self.failed.get(name).map(String::as_str)
    }
}

/// Cache of index names known to exist in the store.
pub struct IndexLifecycleCache {
    store: Arc<dyn DocumentStore>,
    known: RwLock<HashSet<String>>,
}

impl IndexLifecycleCache {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            known: RwLock::new(HashSet::new()),
        }
    }

    /// Replace the cached names with the store's alias listing.
    ///
    /// On failure the previous names are kept.
    #[instrument(skip(self))]
    pub async fn refresh(&self) {
        match self.store.list_aliases().await {
            Ok(names) => {
                let count = names.len();
                *self.known.write().await = names;
                info!(index_count = count, "Refreshed index cache");
            }
            Err(e) => {
                warn!(error = %e, "Failed to refresh index cache, keeping previous entries");
            }
        }
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.known.read().await.contains(name)
    }

    pub async fn len(&self) -> usize {
        self.known.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.known.read().await.is_empty()
    }

    /// Make sure every index in `names` exists.
    ///
    /// Uncached names are checked in the store and created with their entry
    /// in `mappings` when absent. A creation conflict counts as success.
    /// Names that cannot be provisioned are reported and stay uncached, so
    /// the next batch tries again.
    #[instrument(skip(self, names, mappings), fields(index_count = names.len()))]
    pub async fn ensure(
        &self,
        names: &BTreeSet<String>,
        mappings: &HashMap<String, Map<String, Value>>,
    ) -> EnsureReport {
        let missing: Vec<&String> = {
            let known = self.known.read().await;
            names.iter().filter(|name| !known.contains(*name)).collect()
        };

        let mut report = EnsureReport::default();
        for name in missing {
            match self.provision(name, mappings.get(name)).await {
                Ok(()) => {
                    self.known.write().await.insert(name.clone());
                }
                Err(cause) => {
                    error!(index = %name, cause = %cause, "Failed to provision index");
                    report.failed.insert(name.clone(), cause);
                }
            }
        }
        report
    }

    async fn provision(
        &self,
        name: &str,
        mappings: Option<&Map<String, Value>>,
    ) -> Result<(), String> {
        if self.store.index_exists(name).await.map_err(|e| e.to_string())? {
            debug!(index = %name, "Index exists");
            return Ok(());
        }

        match self
            .store
            .create_index(name, mappings)
            .await
            .map_err(|e| e.to_string())?
        {
            CreateIndexOutcome::Created => {
                info!(index = %name, with_mappings = mappings.is_some(), "Created index");
            }
            CreateIndexOutcome::AlreadyExists => {
                debug!(index = %name, "Index created concurrently");
            }
        }
        Ok(())
    }
}
