//! Document store error types.
//!
//! This module defines the unified error type for all document store
//! operations, from connection setup to bulk response parsing.

use thiserror::Error;

/// Unified errors from document store operations.
///
/// Used by the `DocumentStore` trait and its implementations. Every variant
/// carries a human readable message; the pipeline forwards that message as
/// the dead-letter reason when an operation fails terminally.
#[derive(Debug, Clone, Error)]
pub enum DocumentStoreError {
    /// Failed to configure or reach the store.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request could not be sent or timed out.
    #[error("Request error: {0}")]
    RequestError(String),

    /// The store answered with a non-success status.
    #[error("Store responded with status {status}: {body}")]
    ResponseError { status: u16, body: String },

    /// Failed to create an index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// A bulk request failed as a whole.
    #[error("Bulk error: {0}")]
    BulkError(String),

    /// Failed to parse a response from the store.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl DocumentStoreError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a request error.
    pub fn request(msg: impl Into<String>) -> Self {
        Self::RequestError(msg.into())
    }

    /// Create a response error from a status code and body.
    pub fn response(status: u16, body: impl Into<String>) -> Self {
        Self::ResponseError {
            status,
            body: body.into(),
        }
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create a bulk error.
    pub fn bulk(msg: impl Into<String>) -> Self {
        Self::BulkError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }
}

impl From<opensearch::Error> for DocumentStoreError {
    fn from(err: opensearch::Error) -> Self {
        Self::RequestError(err.to_string())
    }
}
