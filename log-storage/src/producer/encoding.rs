//! Payload encoding for outbound messages.

use log_storage_shared::{DeadLetterEnvelope, DeadLetterMessage, LogRecord, LogRecordEnvelope};
use prost::Message;
use tracing::warn;

/// A message that can be published on a topic.
///
/// JSON is the primary encoding; the protobuf envelope is used when JSON
/// encoding fails.
pub trait WireMessage {
    fn to_json(&self) -> Result<Vec<u8>, serde_json::Error>;

    fn to_binary(&self) -> Vec<u8>;
}

impl WireMessage for DeadLetterMessage {
    fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    fn to_binary(&self) -> Vec<u8> {
        DeadLetterEnvelope::from(self).encode_to_vec()
    }
}

impl WireMessage for LogRecord {
    fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    fn to_binary(&self) -> Vec<u8> {
        LogRecordEnvelope::from(self).encode_to_vec()
    }
}

/// Encode a message, falling back to its binary form.
pub fn encode<M: WireMessage + ?Sized>(message: &M) -> Vec<u8> {
    match message.to_json() {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "JSON encoding failed, using protobuf encoding");
            message.to_binary()
        }
    }
}
