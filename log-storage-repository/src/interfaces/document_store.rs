//! Document store trait definition.
//!
//! This module defines the abstract interface for the operations the
//! pipeline needs from a document store: alias listing, index existence,
//! index creation and bulk writes.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::DocumentStoreError;
use crate::types::{BulkAction, BulkResponse, CreateIndexOutcome};

/// Abstracts the underlying document store (OpenSearch, Elasticsearch, etc.).
///
/// Implementations are shared across the worker pool behind an `Arc`, so all
/// methods take `&self`. All methods return `Result<T, DocumentStoreError>`
/// for consistent error handling across backends.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List the index names known to the store's alias API.
    ///
    /// Used to warm the index lifecycle cache at startup.
    async fn list_aliases(&self) -> Result<HashSet<String>, DocumentStoreError>;

    /// Check whether an index exists.
    async fn index_exists(&self, name: &str) -> Result<bool, DocumentStoreError>;

    /// Create an index, optionally with mappings.
    ///
    /// An index that already exists is reported as
    /// `CreateIndexOutcome::AlreadyExists`, not as an error, so concurrent
    /// writers racing to create the same index all succeed.
    ///
    /// # Returns
    ///
    /// * `Ok(CreateIndexOutcome)` - If the store confirmed the index exists
    /// * `Err(DocumentStoreError)` - If creation failed or was not acknowledged
    async fn create_index(
        &self,
        name: &str,
        mappings: Option<&Map<String, Value>>,
    ) -> Result<CreateIndexOutcome, DocumentStoreError>;

    /// Submit a bulk request.
    ///
    /// Returns `Err` only when the request failed as a whole. A request that
    /// completed but rejected some documents returns `Ok` with
    /// `BulkResponse::errors` set and the per-item outcomes in `items`, in
    /// the same order as `actions`.
    async fn bulk_write(&self, actions: &[BulkAction]) -> Result<BulkResponse, DocumentStoreError>;
}
