//! # Log Storage Repository
//!
//! This crate provides the document store boundary used by the log storage
//! pipeline. It includes the error type, the `DocumentStore` trait, the bulk
//! request/response types, and a concrete implementation for OpenSearch.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod types;
pub mod utils;

pub use config::StoreConfig;
pub use errors::DocumentStoreError;
pub use interfaces::DocumentStore;
pub use opensearch::OpenSearchStore;
pub use types::{
    BulkAction, BulkDirective, BulkItemError, BulkItemResult, BulkResponse, CreateIndexOutcome,
};
pub use utils::parse_bulk_response;
