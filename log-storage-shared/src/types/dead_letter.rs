//! Dead-letter message types.
//!
//! Records that cannot be stored are wrapped in a `DeadLetterMessage` and
//! published to the dead-letter topic for later inspection.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Service name stamped on every dead letter.
pub const SERVICE_NAME: &str = "log_storage";

/// Service version stamped on every dead letter.
pub const SERVICE_VERSION: &str = "1.0";

/// Identifies the service that produced a dead letter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterMetadata {
    pub service: String,
    pub version: String,
}

impl Default for DeadLetterMetadata {
    fn default() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
            version: SERVICE_VERSION.to_string(),
        }
    }
}

/// A record that could not be processed, with the reason it was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterMessage {
    /// The source record (or the raw payload when it could not be decoded).
    pub original: Value,
    /// Seconds since the Unix epoch, with sub-second precision.
    pub timestamp: f64,
    /// Why the record was rejected.
    pub reason: String,
    pub metadata: DeadLetterMetadata,
}

impl DeadLetterMessage {
    /// Build a dead letter stamped with the current time.
    pub fn new(original: Value, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        let timestamp = now.timestamp_micros() as f64 / 1_000_000.0;
        Self::with_timestamp(original, reason, timestamp)
    }

    /// Build a dead letter with an explicit timestamp.
    pub fn with_timestamp(original: Value, reason: impl Into<String>, timestamp: f64) -> Self {
        Self {
            original,
            timestamp,
            reason: reason.into(),
            metadata: DeadLetterMetadata::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let msg = DeadLetterMessage::with_timestamp(json!({"index_name": "a"}), "boom", 12.5);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "original": {"index_name": "a"},
                "timestamp": 12.5,
                "reason": "boom",
                "metadata": {"service": "log_storage", "version": "1.0"}
            })
        );
    }

    #[test]
    fn test_new_stamps_current_time() {
        let before = Utc::now().timestamp() as f64;
        let msg = DeadLetterMessage::new(Value::Null, "reason");
        assert!(msg.timestamp >= before);
        assert_eq!(msg.metadata.service, SERVICE_NAME);
        assert_eq!(msg.metadata.version, SERVICE_VERSION);
    }
}
