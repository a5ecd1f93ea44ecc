//! Kafka producer gateway.
//!
//! Publishes messages to a fixed topic and reports the broker acknowledgement
//! as a [`DeliveryOutcome`] instead of raising.

use std::time::Duration;

use rdkafka::{
    producer::{FutureProducer, FutureRecord, Producer},
    util::Timeout,
};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use log_storage_kafka::{KafkaClientConfig, KerberosParams};

use crate::errors::IngestError;
use crate::producer::{encode, WireMessage};

/// Delay between connection attempts in [`KafkaProducer::create_connector`].
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Default time to wait for a broker acknowledgement.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of publishing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The broker stored the message.
    Delivered { partition: i32, offset: i64 },
    /// The message was not stored.
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Settings for the producer gateway.
#[derive(Debug, Clone)]
pub struct ProducerSettings {
    pub client: KafkaClientConfig,
    pub topic: String,
    /// Ticket parameters for SASL/GSSAPI; falls back to the client config's.
    pub kerberos: Option<KerberosParams>,
    /// Time allowed to fetch the topic metadata when connecting.
    pub connect_timeout: Duration,
    /// Time to wait for a broker acknowledgement.
    pub delivery_timeout: Duration,
}

impl ProducerSettings {
    pub fn new(client: KafkaClientConfig, topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
            kerberos: None,
            connect_timeout: Duration::from_secs(10),
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }
}

/// Kafka producer bound to one topic.
#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
    topic: String,
    delivery_timeout: Duration,
}

impl KafkaProducer {
    /// Create the producer session and verify it by fetching the topic metadata.
    ///
    /// Returns `None` when the session cannot be established; the cause is logged.
    pub async fn connect(settings: &ProducerSettings) -> Option<Self> {
        match Self::try_connect(settings).await {
            Ok(producer) => Some(producer),
            Err(e) => {
                error!(
                    brokers = %settings.client.brokers,
                    topic = %settings.topic,
                    error = %e,
                    "Failed to connect Kafka producer"
                );
                None
            }
        }
    }

    async fn try_connect(settings: &ProducerSettings) -> Result<Self, IngestError> {
        if settings.client.requires_ticket() {
            let params = settings
                .kerberos
                .as_ref()
                .or(settings.client.kerberos.as_ref());
            match params {
                Some(p) if !p.principal.is_empty() && !p.keytab.is_empty() => {}
                _ => {
                    return Err(IngestError::connection(
                        "GSSAPI authentication requires a Kerberos principal and keytab",
                    ))
                }
            }
        }

        let producer: FutureProducer = settings
            .client
            .producer_config(settings.kerberos.as_ref())?
            .create()
            .map_err(|e| IngestError::connection(e.to_string()))?;

        let client = producer.clone();
        let topic = settings.topic.clone();
        let timeout = settings.connect_timeout;
        let verified = tokio::task::spawn_blocking(move || {
            client
                .client()
                .fetch_metadata(Some(topic.as_str()), timeout)
                .map(|_| ())
        })
        .await
        .map_err(|e| IngestError::connection(e.to_string()))?;
        verified.map_err(|e| IngestError::connection(e.to_string()))?;

        info!(
            brokers = %settings.client.brokers,
            topic = %settings.topic,
            "Created Kafka producer"
        );

        Ok(Self {
            producer,
            topic: settings.topic.clone(),
            delivery_timeout: settings.delivery_timeout,
        })
    }

    /// Connect, retrying every 5 seconds until it succeeds.
    pub async fn create_connector(settings: &ProducerSettings) -> Self {
        loop {
            if let Some(producer) = Self::connect(settings).await {
                return producer;
            }
            warn!(
                topic = %settings.topic,
                retry_in_secs = CONNECT_RETRY_DELAY.as_secs(),
                "Kafka producer unavailable, retrying"
            );
            sleep(CONNECT_RETRY_DELAY).await;
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn delivery_timeout(&self) -> Duration {
        self.delivery_timeout
    }

    /// Encode and publish a message, waiting up to `timeout` for the broker
    /// acknowledgement.
    #[instrument(skip(self, message), fields(topic = %self.topic))]
    pub async fn send<M: WireMessage + ?Sized + Sync>(
        &self,
        message: &M,
        partition: Option<i32>,
        timeout: Duration,
    ) -> DeliveryOutcome {
        let payload = encode(message);
        let mut record = FutureRecord::<(), [u8]>::to(&self.topic).payload(&payload);
        if let Some(partition) = partition {
            record = record.partition(partition);
        }

        let outcome =
            match tokio::time::timeout(timeout, self.producer.send(record, Timeout::After(timeout)))
                .await
            {
                Ok(Ok((partition, offset))) => DeliveryOutcome::Delivered { partition, offset },
                Ok(Err((e, _))) => DeliveryOutcome::Failed(e.to_string()),
                Err(_) => DeliveryOutcome::Failed(format!(
                    "no acknowledgement within {}ms",
                    timeout.as_millis()
                )),
            };

        match &outcome {
            DeliveryOutcome::Delivered { partition, offset } => {
                info!(partition = partition, offset = offset, "Message delivered");
            }
            DeliveryOutcome::Failed(reason) => {
                error!(reason = %reason, "Message delivery failed");
            }
        }
        outcome
    }

    /// Wait for queued messages to be delivered.
    pub async fn flush(&self, timeout: Duration) -> Result<(), IngestError> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| IngestError::kafka(e.to_string()))??;
        Ok(())
    }

    /// Flush and drop the session.
    pub async fn close(self, timeout: Duration) {
        if let Err(e) = self.flush(timeout).await {
            warn!(error = %e, topic = %self.topic, "Producer flush failed on close");
        }
        info!(topic = %self.topic, "Kafka producer closed");
    }
}
