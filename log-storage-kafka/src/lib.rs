//! Shared Kafka client configuration for the log storage pipeline.
//!
//! Both the consumer and the producer gateways build their rdkafka
//! `ClientConfig` from a [`KafkaClientConfig`], so broker addresses and
//! security settings (SASL/PLAIN, SASL/SCRAM, SASL/GSSAPI, TLS) are read and
//! validated in one place.
//!
//! ## Usage
//!
//! ```ignore
//! use log_storage_kafka::{KafkaClientConfig, OffsetReset};
//!
//! let config = KafkaClientConfig::from_env("localhost:9092", "log-storage");
//! let producer_config = config.producer_config(None)?;
//! let consumer_config = config.consumer_config("log_storage_consumer", OffsetReset::Latest, false)?;
//! ```

use std::env;
use std::fmt;
use std::str::FromStr;

use rdkafka::config::ClientConfig;
use thiserror::Error;

/// Default Kerberos service name of the brokers.
const DEFAULT_KERBEROS_SERVICE_NAME: &str = "kafka";

/// Errors raised while building a client configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KafkaConfigError {
    /// An option has a value we do not understand.
    #[error("Invalid value '{value}' for {option}")]
    InvalidValue { option: &'static str, value: String },

    /// GSSAPI was selected without the ticket parameters.
    #[error("Kerberos authentication requires both a principal and a keytab")]
    MissingKerberosParams,

    /// A SASL mechanism that needs credentials has none.
    #[error("SASL mechanism {0} requires a username and password")]
    MissingCredentials(SaslMechanism),
}

/// Transport security protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityProtocol {
    Plaintext,
    Ssl,
    SaslPlaintext,
    SaslSsl,
}

impl SecurityProtocol {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Plaintext => "PLAINTEXT",
            Self::Ssl => "SSL",
            Self::SaslPlaintext => "SASL_PLAINTEXT",
            Self::SaslSsl => "SASL_SSL",
        }
    }

    fn uses_sasl(&self) -> bool {
        matches!(self, Self::SaslPlaintext | Self::SaslSsl)
    }
}

impl FromStr for SecurityProtocol {
    type Err = KafkaConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PLAINTEXT" => Ok(Self::Plaintext),
            "SSL" => Ok(Self::Ssl),
            "SASL_PLAINTEXT" => Ok(Self::SaslPlaintext),
            "SASL_SSL" => Ok(Self::SaslSsl),
            _ => Err(KafkaConfigError::InvalidValue {
                option: "security protocol",
                value: s.to_string(),
            }),
        }
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslMechanism {
    Plain,
    ScramSha256,
    ScramSha512,
    /// Kerberos; needs a ticket obtained from a principal and keytab.
    Gssapi,
}

impl SaslMechanism {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::ScramSha512 => "SCRAM-SHA-512",
            Self::Gssapi => "GSSAPI",
        }
    }

    /// Whether the mechanism authenticates with a Kerberos ticket.
    pub fn requires_ticket(&self) -> bool {
        matches!(self, Self::Gssapi)
    }
}

impl fmt::Display for SaslMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaslMechanism {
    type Err = KafkaConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PLAIN" => Ok(Self::Plain),
            "SCRAM-SHA-256" => Ok(Self::ScramSha256),
            "SCRAM-SHA-512" => Ok(Self::ScramSha512),
            "GSSAPI" => Ok(Self::Gssapi),
            _ => Err(KafkaConfigError::InvalidValue {
                option: "SASL mechanism",
                value: s.to_string(),
            }),
        }
    }
}

/// Where a consumer group without committed offsets starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetReset {
    Earliest,
    #[default]
    Latest,
}

impl OffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earliest => "earliest",
            Self::Latest => "latest",
        }
    }
}

impl FromStr for OffsetReset {
    type Err = KafkaConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "earliest" | "smallest" => Ok(Self::Earliest),
            "latest" | "largest" => Ok(Self::Latest),
            _ => Err(KafkaConfigError::InvalidValue {
                option: "offset reset policy",
                value: s.to_string(),
            }),
        }
    }
}

/// Kerberos ticket parameters for SASL/GSSAPI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KerberosParams {
    pub principal: String,
    pub keytab: String,
    /// Broker service name (defaults to "kafka").
    pub service_name: String,
}

impl KerberosParams {
    pub fn new(principal: impl Into<String>, keytab: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            keytab: keytab.into(),
            service_name: DEFAULT_KERBEROS_SERVICE_NAME.to_string(),
        }
    }
}

/// Configuration shared by every Kafka client of the pipeline.
#[derive(Debug, Clone)]
pub struct KafkaClientConfig {
    /// Kafka broker addresses (comma-separated).
    pub brokers: String,
    /// Client ID reported to the brokers.
    pub client_id: String,
    /// Explicit security protocol; inferred from the credentials when unset.
    pub security_protocol: Option<SecurityProtocol>,
    /// SASL mechanism (PLAIN when credentials are set and nothing else is chosen).
    pub sasl_mechanism: Option<SaslMechanism>,
    /// SASL username.
    pub username: Option<String>,
    /// SASL password.
    pub password: Option<String>,
    /// Custom CA certificate in PEM format.
    pub ssl_ca_pem: Option<String>,
    /// Kerberos parameters read from the environment, if any.
    pub kerberos: Option<KerberosParams>,
}

impl KafkaClientConfig {
    /// Create a plaintext configuration for the given brokers.
    pub fn new(brokers: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            client_id: client_id.into(),
            security_protocol: None,
            sasl_mechanism: None,
            username: None,
            password: None,
            ssl_ca_pem: None,
            kerberos: None,
        }
    }

    /// Create a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `KAFKA_BROKER` - Broker addresses (uses provided default if not set)
    /// - `KAFKA_SECURITY_PROTOCOL` - PLAINTEXT, SSL, SASL_PLAINTEXT or SASL_SSL (optional)
    /// - `KAFKA_SASL_MECHANISM` - PLAIN, SCRAM-SHA-256, SCRAM-SHA-512 or GSSAPI (optional)
    /// - `KAFKA_USERNAME` / `KAFKA_PASSWORD` - SASL credentials (optional)
    /// - `KAFKA_SSL_CA_PEM` - Custom CA cert in PEM format (optional)
    /// - `KAFKA_KERBEROS_PRINCIPAL` / `KAFKA_KERBEROS_KEYTAB` - GSSAPI ticket parameters (optional)
    pub fn from_env(
        default_broker: &str,
        client_id: impl Into<String>,
    ) -> Result<Self, KafkaConfigError> {
        Self::from_lookup(default_broker, client_id, |key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable lookup.
    pub fn from_lookup<F>(
        default_broker: &str,
        client_id: impl Into<String>,
        lookup: F,
    ) -> Result<Self, KafkaConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let security_protocol = lookup("KAFKA_SECURITY_PROTOCOL")
            .map(|v| v.parse())
            .transpose()?;
        let sasl_mechanism = lookup("KAFKA_SASL_MECHANISM")
            .map(|v| v.parse())
            .transpose()?;
        let kerberos = match (
            lookup("KAFKA_KERBEROS_PRINCIPAL"),
            lookup("KAFKA_KERBEROS_KEYTAB"),
        ) {
            (Some(principal), Some(keytab)) => Some(KerberosParams::new(principal, keytab)),
            _ => None,
        };

        Ok(Self {
            brokers: lookup("KAFKA_BROKER").unwrap_or_else(|| default_broker.to_string()),
            client_id: client_id.into(),
            security_protocol,
            sasl_mechanism,
            username: lookup("KAFKA_USERNAME"),
            password: lookup("KAFKA_PASSWORD"),
            ssl_ca_pem: lookup("KAFKA_SSL_CA_PEM"),
            kerberos,
        })
    }

    /// Set SASL credentials.
    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    /// Set the SASL mechanism.
    pub fn with_sasl_mechanism(mut self, mechanism: SaslMechanism) -> Self {
        self.sasl_mechanism = Some(mechanism);
        self
    }

    /// Set custom CA certificate.
    pub fn with_ssl_ca(mut self, ca_pem: String) -> Self {
        self.ssl_ca_pem = Some(ca_pem);
        self
    }

    /// Whether the configured mechanism needs a Kerberos ticket.
    pub fn requires_ticket(&self) -> bool {
        self.sasl_mechanism
            .map(|m| m.requires_ticket())
            .unwrap_or(false)
    }

    /// Effective security protocol.
    ///
    /// SASL credentials or a SASL mechanism without an explicit protocol
    /// select SASL_SSL (managed Kafka); otherwise plaintext is used
    /// (local development).
    pub fn effective_protocol(&self) -> SecurityProtocol {
        if let Some(protocol) = self.security_protocol {
            return protocol;
        }
        if self.sasl_mechanism.is_some() || (self.username.is_some() && self.password.is_some()) {
            SecurityProtocol::SaslSsl
        } else {
            SecurityProtocol::Plaintext
        }
    }

    /// Base client configuration with brokers and security applied.
    ///
    /// `kerberos` overrides the parameters read from the environment.
    pub fn client_config(
        &self,
        kerberos: Option<&KerberosParams>,
    ) -> Result<ClientConfig, KafkaConfigError> {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("client.id", &self.client_id);
        self.apply_security(&mut config, kerberos)?;
        Ok(config)
    }

    /// Client configuration for a producer.
    ///
    /// Configures zstd compression and buffering for high throughput, plus
    /// idempotent delivery so broker acknowledgements are not duplicated on
    /// internal retries.
    pub fn producer_config(
        &self,
        kerberos: Option<&KerberosParams>,
    ) -> Result<ClientConfig, KafkaConfigError> {
        let mut config = self.client_config(kerberos)?;
        config
            .set("compression.type", "zstd")
            .set("message.timeout.ms", "30000")
            .set("enable.idempotence", "true")
            .set("queue.buffering.max.messages", "100000")
            .set("queue.buffering.max.kbytes", "1048576")
            .set("batch.num.messages", "10000");
        Ok(config)
    }

    /// Client configuration for a consumer in `group_id`.
    pub fn consumer_config(
        &self,
        group_id: &str,
        offset_reset: OffsetReset,
        auto_commit: bool,
    ) -> Result<ClientConfig, KafkaConfigError> {
        let mut config = self.client_config(None)?;
        config
            .set("group.id", group_id)
            .set("enable.auto.commit", if auto_commit { "true" } else { "false" })
            .set("auto.offset.reset", offset_reset.as_str())
            .set("max.poll.interval.ms", "300000")
            .set("session.timeout.ms", "6000");
        Ok(config)
    }

    fn apply_security(
        &self,
        config: &mut ClientConfig,
        kerberos: Option<&KerberosParams>,
    ) -> Result<(), KafkaConfigError> {
        let protocol = self.effective_protocol();
        config.set("security.protocol", protocol.as_str());

        if protocol.uses_sasl() {
            let mechanism = self.sasl_mechanism.unwrap_or(SaslMechanism::Plain);
            config.set("sasl.mechanisms", mechanism.as_str());

            if mechanism.requires_ticket() {
                let params = kerberos
                    .or(self.kerberos.as_ref())
                    .ok_or(KafkaConfigError::MissingKerberosParams)?;
                if params.principal.is_empty() || params.keytab.is_empty() {
                    return Err(KafkaConfigError::MissingKerberosParams);
                }
                config
                    .set("sasl.kerberos.service.name", &params.service_name)
                    .set("sasl.kerberos.principal", &params.principal)
                    .set("sasl.kerberos.keytab", &params.keytab);
            } else {
                match (&self.username, &self.password) {
                    (Some(username), Some(password)) => {
                        config
                            .set("sasl.username", username)
                            .set("sasl.password", password);
                    }
                    _ => return Err(KafkaConfigError::MissingCredentials(mechanism)),
                }
            }
        }

        // Use custom CA certificate if provided
        if let Some(ca_pem) = &self.ssl_ca_pem {
            config.set("ssl.ca.pem", ca_pem);
        }

        Ok(())
    }
}
