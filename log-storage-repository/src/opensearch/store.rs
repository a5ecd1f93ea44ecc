//! OpenSearch document store.
//!
//! This module provides the concrete implementation of `DocumentStore`
//! using the OpenSearch Rust crate.

use std::collections::HashSet;

use async_trait::async_trait;
use opensearch::{
    auth::Credentials,
    http::request::JsonBody,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts, IndicesGetAliasParts},
    BulkParts, OpenSearch,
};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::StoreConfig;
use crate::errors::DocumentStoreError;
use crate::interfaces::DocumentStore;
use crate::types::{BulkAction, BulkResponse, CreateIndexOutcome};
use crate::utils::{is_already_exists_error, parse_bulk_response};

/// OpenSearch document store.
///
/// Holds one HTTP client for the lifetime of the owning process; it is
/// constructed explicitly and injected into the pipeline.
///
/// # Example
///
/// ```ignore
/// use log_storage_repository::{OpenSearchStore, StoreConfig};
///
/// let store = OpenSearchStore::new(StoreConfig::new("http://localhost:9200"))?;
/// let indices = store.list_aliases().await?;
/// ```
pub struct OpenSearchStore {
    client: OpenSearch,
    url: String,
}

impl OpenSearchStore {
    /// Create a new store client for the configured URL.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchStore)` - A new store instance
    /// * `Err(DocumentStoreError)` - If the URL or transport setup is invalid
    pub fn new(config: StoreConfig) -> Result<Self, DocumentStoreError> {
        let parsed_url =
            Url::parse(&config.url).map_err(|e| DocumentStoreError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let mut builder = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(config.request_timeout);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.auth(Credentials::Basic(username.clone(), password.clone()));
        }

        let transport = builder
            .build()
            .map_err(|e| DocumentStoreError::connection(e.to_string()))?;

        info!(url = %config.url, "Created OpenSearch store");

        Ok(Self {
            client: OpenSearch::new(transport),
            url: config.url,
        })
    }

    /// Verify the cluster answers.
    pub async fn ping(&self) -> Result<(), DocumentStoreError> {
        let response = self
            .client
            .ping()
            .send()
            .await
            .map_err(|e| DocumentStoreError::connection(e.to_string()))?;
        if !response.status_code().is_success() {
            return Err(DocumentStoreError::connection(format!(
                "ping to {} failed with status {}",
                self.url,
                response.status_code()
            )));
        }
        Ok(())
    }

    /// Build the newline-delimited bulk body: action line, then document.
    fn bulk_body(actions: &[BulkAction]) -> Vec<JsonBody<Value>> {
        let mut body = Vec::with_capacity(actions.len() * 2);
        for action in actions {
            body.push(JsonBody::new(action.directive.to_value()));
            body.push(JsonBody::new(Value::Object(action.document.clone())));
        }
        body
    }

    async fn error_body(response: Response) -> (u16, String) {
        let status = response.status_code().as_u16();
        let body = response.text().await.unwrap_or_default();
        (status, body)
    }
}

#[async_trait]
impl DocumentStore for OpenSearchStore {
    async fn list_aliases(&self) -> Result<HashSet<String>, DocumentStoreError> {
        let response = self
            .client
            .indices()
            .get_alias(IndicesGetAliasParts::None)
            .send()
            .await?;

        if !response.status_code().is_success() {
            let (status, body) = Self::error_body(response).await;
            return Err(DocumentStoreError::response(status, body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| DocumentStoreError::parse(e.to_string()))?;

        let names = body
            .as_object()
            .map(|indices| indices.keys().cloned().collect())
            .unwrap_or_default();
        Ok(names)
    }

    async fn index_exists(&self, name: &str) -> Result<bool, DocumentStoreError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[name]))
            .send()
            .await?;

        match response.status_code().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            _ => {
                let (status, body) = Self::error_body(response).await;
                Err(DocumentStoreError::response(status, body))
            }
        }
    }

    async fn create_index(
        &self,
        name: &str,
        mappings: Option<&Map<String, Value>>,
    ) -> Result<CreateIndexOutcome, DocumentStoreError> {
        let body = match mappings {
            Some(mappings) => json!({ "mappings": mappings }),
            None => json!({}),
        };

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(name))
            .body(body)
            .send()
            .await
            .map_err(|e| DocumentStoreError::index_creation(e.to_string()))?;

        let status = response.status_code();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if status.is_success() {
            if body.get("acknowledged").and_then(Value::as_bool) == Some(false) {
                warn!(index = %name, "Index creation was not acknowledged");
                return Err(DocumentStoreError::index_creation(format!(
                    "creation of index '{}' was not acknowledged",
                    name
                )));
            }
            debug!(index = %name, "Index created");
            return Ok(CreateIndexOutcome::Created);
        }

        if is_already_exists_error(&body) {
            debug!(index = %name, "Index already exists");
            return Ok(CreateIndexOutcome::AlreadyExists);
        }

        error!(index = %name, status = %status, body = %body, "Index creation failed");
        let reason = body
            .pointer("/error/reason")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());
        Err(DocumentStoreError::index_creation(format!(
            "status {}: {}",
            status.as_u16(),
            reason
        )))
    }

    async fn bulk_write(&self, actions: &[BulkAction]) -> Result<BulkResponse, DocumentStoreError> {
        if actions.is_empty() {
            return Ok(BulkResponse::default());
        }

        let response = self
            .client
            .bulk(BulkParts::None)
            .body(Self::bulk_body(actions))
            .send()
            .await
            .map_err(|e| DocumentStoreError::bulk(e.to_string()))?;

        if !response.status_code().is_success() {
            let (status, body) = Self::error_body(response).await;
            error!(status = status, body = %body, "Bulk request failed");
            return Err(DocumentStoreError::response(status, body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| DocumentStoreError::parse(e.to_string()))?;

        let parsed = parse_bulk_response(&body)?;
        debug!(
            took_ms = parsed.took,
            items = parsed.items.len(),
            errors = parsed.errors,
            "Bulk request completed"
        );
        Ok(parsed)
    }
}
