//! Protobuf envelopes for the binary encoding.
//!
//! JSON is the primary encoding on both topics. These envelopes are the
//! secondary form: consumers fall back to them when a payload is not valid
//! JSON, and producers emit them when JSON encoding fails. Documents and
//! mappings travel inside the envelopes as JSON bytes.

use serde_json::{Map, Value};

use crate::types::{DeadLetterMessage, DeadLetterMetadata, LogBody, LogRecord};

/// Binary form of a log record.
#[derive(Clone, PartialEq, prost::Message)]
pub struct LogRecordEnvelope {
    #[prost(string, tag = "1")]
    pub index_name: String,
    /// JSON-encoded body (object or array of objects).
    #[prost(bytes = "vec", tag = "2")]
    pub body_json: Vec<u8>,
    /// JSON-encoded mappings, if any.
    #[prost(bytes = "vec", optional, tag = "3")]
    pub mappings_json: Option<Vec<u8>>,
}

impl LogRecordEnvelope {
    /// Expand the envelope into the same JSON shape as the primary encoding,
    /// so decoded records go through one validation path.
    pub fn into_value(self) -> Result<Value, serde_json::Error> {
        let body: Value = serde_json::from_slice(&self.body_json)?;
        let mappings = match self.mappings_json {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => Value::Null,
        };

        let mut obj = Map::new();
        obj.insert("index_name".to_string(), Value::String(self.index_name));
        obj.insert("body".to_string(), body);
        if !mappings.is_null() {
            obj.insert("mappings".to_string(), mappings);
        }
        Ok(Value::Object(obj))
    }
}

impl From<&LogRecord> for LogRecordEnvelope {
    fn from(record: &LogRecord) -> Self {
        let body = match &record.body {
            LogBody::One(doc) => Value::Object(doc.clone()),
            LogBody::Many(docs) => Value::Array(docs.iter().cloned().map(Value::Object).collect()),
        };
        Self {
            index_name: record.index_name.clone(),
            body_json: body.to_string().into_bytes(),
            mappings_json: record
                .mappings
                .as_ref()
                .map(|m| Value::Object(m.clone()).to_string().into_bytes()),
        }
    }
}

/// Binary form of a dead letter.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DeadLetterEnvelope {
    /// JSON text of the original record.
    #[prost(string, tag = "1")]
    pub original_json: String,
    #[prost(double, tag = "2")]
    pub timestamp: f64,
    #[prost(string, tag = "3")]
    pub reason: String,
    #[prost(string, tag = "4")]
    pub service: String,
    #[prost(string, tag = "5")]
    pub version: String,
}

impl From<&DeadLetterMessage> for DeadLetterEnvelope {
    fn from(msg: &DeadLetterMessage) -> Self {
        Self {
            original_json: msg.original.to_string(),
            timestamp: msg.timestamp,
            reason: msg.reason.clone(),
            service: msg.metadata.service.clone(),
            version: msg.metadata.version.clone(),
        }
    }
}

impl DeadLetterEnvelope {
    /// Rebuild the dead letter. An unparseable `original_json` is kept as a string.
    pub fn into_message(self) -> DeadLetterMessage {
        let original = serde_json::from_str(&self.original_json)
            .unwrap_or(Value::String(self.original_json));
        DeadLetterMessage {
            original,
            timestamp: self.timestamp,
            reason: self.reason,
            metadata: DeadLetterMetadata {
                service: self.service,
                version: self.version,
            },
        }
    }
}
