//! Request and response types for document store operations.

use serde::Serialize;
use serde_json::{Map, Value};

/// Write directive for one document in a bulk request.
///
/// Serializes to the bulk API action line, e.g. `{"create":{"_index":"logs"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkDirective {
    /// Create a new document with a store-assigned id.
    Create {
        #[serde(rename = "_index")]
        index: String,
    },
}

impl BulkDirective {
    /// Target index of the directive.
    pub fn index(&self) -> &str {
        match self {
            BulkDirective::Create { index } => index,
        }
    }

    /// Action line as JSON.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A directive paired with the document it applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkAction {
    pub directive: BulkDirective,
    pub document: Map<String, Value>,
}

impl BulkAction {
    /// Build a `create` action for `index`.
    pub fn create(index: impl Into<String>, document: Map<String, Value>) -> Self {
        Self {
            directive: BulkDirective::Create {
                index: index.into(),
            },
            document,
        }
    }
}

/// Outcome of an index creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateIndexOutcome {
    /// The store created the index.
    Created,
    /// The index was already there (possibly created by a concurrent writer).
    AlreadyExists,
}

/// Error reported by the store for a single bulk item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemError {
    /// Store error type, e.g. `mapper_parsing_exception`.
    pub error_type: String,
    /// Human readable reason.
    pub reason: String,
}

/// Outcome of one item in a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemResult {
    /// Operation name as reported by the store (`create`, `index`, ...).
    pub operation: String,
    /// Index the item was written to.
    pub index: Option<String>,
    /// HTTP status for this item.
    pub status: u16,
    /// Error details when the item failed.
    pub error: Option<BulkItemError>,
    /// The raw error object, kept for dead-letter diagnostics.
    pub raw_error: Option<Value>,
}

impl BulkItemResult {
    /// Successful item.
    pub fn ok(operation: impl Into<String>, index: impl Into<String>, status: u16) -> Self {
        Self {
            operation: operation.into(),
            index: Some(index.into()),
            status,
            error: None,
            raw_error: None,
        }
    }

    /// Failed item.
    pub fn failed(
        operation: impl Into<String>,
        index: impl Into<String>,
        status: u16,
        error_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let error = BulkItemError {
            error_type: error_type.into(),
            reason: reason.into(),
        };
        let raw_error = serde_json::json!({
            "type": error.error_type,
            "reason": error.reason,
        });
        Self {
            operation: operation.into(),
            index: Some(index.into()),
            status,
            error: Some(error),
            raw_error: Some(raw_error),
        }
    }

    /// Whether the store rejected this item.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Parsed response of a bulk request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BulkResponse {
    /// Milliseconds the store spent on the request.
    pub took: u64,
    /// True if at least one item failed.
    pub errors: bool,
    /// Per-item outcomes, in request order.
    pub items: Vec<BulkItemResult>,
}

impl BulkResponse {
    /// Number of failed items.
    pub fn failed_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_error()).count()
    }
}
