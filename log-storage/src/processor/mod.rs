//! Processor module for the log storage ingest.
//!
//! Turns raw messages into validated log records.

mod record_parser;

pub use record_parser::{validate, ParsedBatch, RecordParser, Rejection};
