//! Core data structures that flow through the log storage pipeline.

pub mod dead_letter;
pub mod log_record;

pub use dead_letter::{DeadLetterMessage, DeadLetterMetadata};
pub use log_record::{LogBody, LogRecord};
