//! # Log Storage Shared
//!
//! Shared data structures for the log storage pipeline: the log records read
//! from the stream, the dead-letter messages written back to it, and the
//! protobuf envelopes used as the binary fallback encoding for both.

pub mod types;
pub mod wire;

pub use types::dead_letter::{DeadLetterMessage, DeadLetterMetadata, SERVICE_NAME, SERVICE_VERSION};
pub use types::log_record::{LogBody, LogRecord};
pub use wire::{DeadLetterEnvelope, LogRecordEnvelope};
