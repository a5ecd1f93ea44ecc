//! Dead-letter routing.
//!
//! Records that cannot be stored are wrapped in a [`DeadLetterMessage`] and
//! published to the dead-letter topic. Publishing is best effort: a failed
//! publish is logged and the message dropped.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

use log_storage_shared::DeadLetterMessage;

use crate::producer::{DeliveryOutcome, KafkaProducer};

/// Reason used when a failure carries no description.
pub const UNKNOWN_REASON: &str = "unknown error";

/// Publishes dead letters.
#[async_trait]
pub trait DeadLetterPublisher: Send + Sync {
    async fn publish(&self, message: &DeadLetterMessage) -> DeliveryOutcome;
}

#[async_trait]
impl DeadLetterPublisher for KafkaProducer {
    async fn publish(&self, message: &DeadLetterMessage) -> DeliveryOutcome {
        self.send(message, None, self.delivery_timeout()).await
    }
}

/// Routes rejected records to the dead-letter topic.
#[derive(Clone)]
pub struct DeadLetterRouter {
    publisher: Arc<dyn DeadLetterPublisher>,
}

impl DeadLetterRouter {
    pub fn new(publisher: Arc<dyn DeadLetterPublisher>) -> Self {
        Self { publisher }
    }

    /// Build a dead letter for `original` and publish it.
    pub async fn route(&self, original: Value, reason: impl Into<String>) -> DeliveryOutcome {
        let mut reason = reason.into();
        if reason.trim().is_empty() {
            reason = UNKNOWN_REASON.to_string();
        }
        let message = DeadLetterMessage::new(original, reason);

        let outcome = self.publisher.publish(&message).await;
        match &outcome {
            DeliveryOutcome::Delivered { partition, offset } => {
                debug!(
                    partition = partition,
                    offset = offset,
                    reason = %message.reason,
                    "Dead letter published"
                );
            }
            DeliveryOutcome::Failed(cause) => {
                error!(
                    cause = %cause,
                    reason = %message.reason,
                    original = %message.original,
                    "Failed to publish dead letter, dropping it"
                );
            }
        }
        outcome
    }
}
