//! Payload decoding for inbound messages.
//!
//! JSON is tried first; payloads that are not JSON are decoded as a protobuf
//! `LogRecordEnvelope`. Decoding never panics: a payload that fits neither
//! encoding comes back as a [`DeserializationError`] carrying the raw bytes.

use log_storage_shared::LogRecordEnvelope;
use prost::Message;
use serde_json::Value;
use thiserror::Error;

use crate::consumer::RawMessage;

/// A payload that could not be decoded.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{reason}")]
pub struct DeserializationError {
    /// The undecodable payload.
    pub payload: Vec<u8>,
    pub reason: String,
}

impl DeserializationError {
    pub fn new(payload: impl Into<Vec<u8>>, reason: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            reason: reason.into(),
        }
    }

    /// The payload as a dead-letter `original`: lossy UTF-8 text.
    pub fn original(&self) -> Value {
        Value::String(String::from_utf8_lossy(&self.payload).into_owned())
    }
}

/// Decode a message payload into a JSON value.
pub fn deserialize(raw: &RawMessage) -> Result<Value, DeserializationError> {
    match raw.payload.as_deref() {
        None | Some([]) => Err(DeserializationError::new(Vec::<u8>::new(), "empty payload")),
        Some(payload) => decode_payload(payload),
    }
}

/// Decode raw bytes into a JSON value.
pub fn decode_payload(payload: &[u8]) -> Result<Value, DeserializationError> {
    let json_error = match serde_json::from_slice::<Value>(payload) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let binary = LogRecordEnvelope::decode(payload)
        .map_err(|e| e.to_string())
        .and_then(|envelope| envelope.into_value().map_err(|e| e.to_string()));

    binary.map_err(|binary_error| {
        DeserializationError::new(
            payload,
            format!(
                "undecodable payload (json: {}; protobuf: {})",
                json_error, binary_error
            ),
        )
    })
}
