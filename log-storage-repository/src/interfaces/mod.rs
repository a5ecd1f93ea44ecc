//! Interface definitions for the document store.
//!
//! This module defines the abstract `DocumentStore` trait that allows the
//! pipeline to be wired against OpenSearch in production and mocks in tests.

mod document_store;

pub use document_store::DocumentStore;
