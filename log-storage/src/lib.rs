//! # Log Storage
//!
//! Log storage pipeline - consumes batches of structured log records from
//! Kafka and stores them into OpenSearch, creating target indices on demand
//! and routing records that cannot be stored to a dead-letter topic.
//!
//! ## Architecture
//!
//! The pipeline follows the Consumer-Processor-Loader pattern:
//!
//! 1. **Consumer**: Polls raw messages from Kafka and commits offsets
//! 2. **Processor**: Decodes and validates messages into log records
//! 3. **Loader**: Writes documents with bulk requests, retrying on failure
//! 4. **Orchestrator**: Runs the poll loop and the worker pool
//!
//! Records rejected at any stage are published by the dead-letter router
//! through the producer gateway.
//!
//! ## Modules
//!
//! - [`config`]: Settings and dependency initialization
//! - [`consumer`]: Kafka consumer gateway and payload decoding
//! - [`producer`]: Kafka producer gateway
//! - [`dead_letter`]: Dead-letter routing
//! - [`index_cache`]: Known-index cache and index provisioning
//! - [`processor`]: Record parsing and validation
//! - [`loader`]: Bulk writes with retry
//! - [`orchestrator`]: Batch handling, worker pool and offset tracking
//! - [`supervisor`]: Multi-process mode
//! - [`errors`]: Error types for the ingest

pub mod config;
pub mod consumer;
pub mod dead_letter;
pub mod errors;
pub mod index_cache;
pub mod loader;
pub mod orchestrator;
pub mod processor;
pub mod producer;
pub mod supervisor;

pub use config::{Dependencies, Settings};
pub use errors::IngestError;

use thiserror::Error;

/// Errors that can occur during pipeline initialization or execution.
#[derive(Error, Debug)]
pub enum LogStorageError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Ingest error.
    #[error("Ingest error: {0}")]
    IngestError(#[from] IngestError),

    /// Worker process management error.
    #[error("Supervisor error: {0}")]
    SupervisorError(String),
}

impl LogStorageError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a supervisor error.
    pub fn supervisor(msg: impl Into<String>) -> Self {
        Self::SupervisorError(msg.into())
    }
}
