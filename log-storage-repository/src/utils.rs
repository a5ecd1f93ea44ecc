//! Utility functions for the log storage repository.

use serde_json::Value;

use crate::errors::DocumentStoreError;
use crate::types::{BulkItemError, BulkItemResult, BulkResponse};

/// Error type the store reports when creating an index that already exists.
pub const RESOURCE_ALREADY_EXISTS: &str = "resource_already_exists_exception";

/// Parse the JSON body of a bulk API response.
///
/// Each entry of `items` is an object with a single key naming the operation
/// (`create`, `index`, ...) whose value holds `_index`, `status` and, for
/// failed items, an `error` object.
///
/// # Example
///
/// ```
/// use log_storage_repository::parse_bulk_response;
/// use serde_json::json;
///
/// let response = parse_bulk_response(&json!({
///     "took": 5,
///     "errors": false,
///     "items": [{"create": {"_index": "logs", "status": 201}}]
/// })).expect("valid response");
/// assert_eq!(response.items.len(), 1);
/// ```
pub fn parse_bulk_response(body: &Value) -> Result<BulkResponse, DocumentStoreError> {
    let obj = body
        .as_object()
        .ok_or_else(|| DocumentStoreError::parse("bulk response is not an object"))?;

    let errors = obj
        .get("errors")
        .and_then(Value::as_bool)
        .ok_or_else(|| DocumentStoreError::parse("bulk response has no 'errors' flag"))?;
    let took = obj.get("took").and_then(Value::as_u64).unwrap_or(0);
    let raw_items = obj
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| DocumentStoreError::parse("bulk response has no 'items' array"))?;

    let items = raw_items
        .iter()
        .map(parse_bulk_item)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BulkResponse {
        took,
        errors,
        items,
    })
}

fn parse_bulk_item(item: &Value) -> Result<BulkItemResult, DocumentStoreError> {
    let (operation, detail) = item
        .as_object()
        .and_then(|o| o.iter().next())
        .ok_or_else(|| DocumentStoreError::parse(format!("malformed bulk item: {}", item)))?;

    let index = detail
        .get("_index")
        .and_then(Value::as_str)
        .map(str::to_string);
    let status = detail
        .get("status")
        .and_then(Value::as_u64)
        .and_then(|s| u16::try_from(s).ok())
        .unwrap_or(0);

    let raw_error = detail.get("error").cloned();
    let error = raw_error.as_ref().map(item_error);

    Ok(BulkItemResult {
        operation: operation.clone(),
        index,
        status,
        error,
        raw_error,
    })
}

fn item_error(error: &Value) -> BulkItemError {
    match error {
        Value::String(reason) => BulkItemError {
            error_type: "unknown".to_string(),
            reason: reason.clone(),
        },
        _ => {
            let error_type = error
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let reason = error
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error_type.clone());
            BulkItemError { error_type, reason }
        }
    }
}

/// Whether an error body from index creation means the index already exists.
pub fn is_already_exists_error(body: &Value) -> bool {
    body.pointer("/error/type").and_then(Value::as_str) == Some(RESOURCE_ALREADY_EXISTS)
}
