//! Record parser.
//!
//! Decodes raw messages into `LogRecord`s and checks their structure. A
//! message whose payload is a JSON array yields one record per element.

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use log_storage_shared::{LogBody, LogRecord};

use crate::consumer::{deserialize, RawMessage};

/// A record that failed decoding or validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// What was received: the decoded value, or the payload text.
    pub original: Value,
    pub reason: String,
}

/// Output of parsing one batch.
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub records: Vec<LogRecord>,
    pub rejected: Vec<Rejection>,
}

impl ParsedBatch {
    /// Number of records received, valid or not.
    pub fn total(&self) -> usize {
        self.records.len() + self.rejected.len()
    }
}

/// Turns raw messages into validated log records.
#[derive(Debug, Default, Clone)]
pub struct RecordParser;

impl RecordParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse every message of a batch.
    #[instrument(skip(self, messages), fields(message_count = messages.len()))]
    pub fn parse_batch(&self, messages: &[RawMessage]) -> ParsedBatch {
        let mut parsed = ParsedBatch::default();

        for msg in messages {
            let value = match deserialize(msg) {
                Ok(value) => value,
                Err(e) => {
                    warn!(
                        topic = %msg.topic,
                        partition = msg.partition,
                        offset = msg.offset,
                        reason = %e.reason,
                        "Failed to decode message"
                    );
                    parsed.rejected.push(Rejection {
                        original: e.original(),
                        reason: e.reason,
                    });
                    continue;
                }
            };

            let values = match value {
                Value::Array(items) => items,
                other => vec![other],
            };
            for value in values {
                match validate(&value) {
                    Ok(record) => parsed.records.push(record),
                    Err(reason) => {
                        warn!(
                            topic = %msg.topic,
                            partition = msg.partition,
                            offset = msg.offset,
                            reason = %reason,
                            "Rejected invalid record"
                        );
                        parsed.rejected.push(Rejection {
                            original: value,
                            reason,
                        });
                    }
                }
            }
        }

        debug!(
            valid = parsed.records.len(),
            rejected = parsed.rejected.len(),
            "Parsed batch"
        );
        parsed
    }
}

/// Check the structure of one decoded record.
pub fn validate(value: &Value) -> Result<LogRecord, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| format!("record must be an object, got {}", type_name(value)))?;

    let index_name = match obj.get("index_name") {
        None | Some(Value::Null) => return Err("missing required field 'index_name'".to_string()),
        Some(Value::String(name)) if name.trim().is_empty() => {
            return Err("field 'index_name' must not be empty".to_string())
        }
        Some(Value::String(name)) => name.clone(),
        Some(other) => {
            return Err(format!(
                "field 'index_name' must be a string, got {}",
                type_name(other)
            ))
        }
    };

    let body = match obj.get("body") {
        None | Some(Value::Null) => return Err("missing required field 'body'".to_string()),
        Some(Value::Object(doc)) => LogBody::One(doc.clone()),
        Some(Value::Array(items)) => LogBody::Many(documents(items)?),
        Some(other) => {
            return Err(format!(
                "field 'body' must be an object or an array of objects, got {}",
                type_name(other)
            ))
        }
    };

    let mappings = match obj.get("mappings") {
        None | Some(Value::Null) => None,
        Some(Value::Object(mappings)) => Some(mappings.clone()),
        Some(other) => {
            return Err(format!(
                "field 'mappings' must be an object, got {}",
                type_name(other)
            ))
        }
    };

    Ok(LogRecord {
        index_name,
        body,
        mappings,
    })
}

fn documents(items: &[Value]) -> Result<Vec<Map<String, Value>>, String> {
    if items.is_empty() {
        return Err("field 'body' must not be an empty array".to_string());
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_object().cloned().ok_or_else(|| {
                format!(
                    "field 'body' must be an object or an array of objects, element {} is {}",
                    i,
                    type_name(item)
                )
            })
        })
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
