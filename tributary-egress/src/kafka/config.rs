// Copyright 2025 Tributary Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Kafka egress configuration.

use rdkafka::ClientConfig;
use std::str::FromStr;

/// Acknowledgement level required from the brokers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Acks {
    /// Wait for the full in-sync replica set (required for idempotence).
    #[default]
    All,

    /// Wait for the partition leader only.
    Leader,

    /// Fire and forget.
    None,
}

impl Acks {
    /// The value passed to the client's `acks` property.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Leader => "1",
            Self::None => "0",
        }
    }
}

impl FromStr for Acks {
    type Err = EgressConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "all" | "-1" => Ok(Self::All),
            "1" => Ok(Self::Leader),
            "0" => Ok(Self::None),
            other => Err(EgressConfigError::InvalidAcks {
                value: other.to_string(),
            }),
        }
    }
}

/// Compression applied to produced batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// No compression.
    #[default]
    None,

    /// Snappy block compression.
    Snappy,
}

impl Compression {
    /// The value passed to the client's `compression.codec` property.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Snappy => "snappy",
        }
    }
}

impl FromStr for Compression {
    type Err = EgressConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "none" => Ok(Self::None),
            "snappy" => Ok(Self::Snappy),
            other => Err(EgressConfigError::InvalidCompression {
                value: other.to_string(),
            }),
        }
    }
}

/// Kafka egress configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum EgressConfigError {
    /// Missing bootstrap servers.
    #[error("bootstrap_servers is required")]
    MissingBootstrapServers,

    /// Missing topic name.
    #[error("topic is required")]
    MissingTopic,

    /// Invalid egress batch count.
    #[error("invalid batch_count: {value} ({reason})")]
    InvalidBatchCount {
        /// The rejected value.
        value: usize,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Invalid linger value.
    #[error("invalid linger_ms: {value} (must be at most 5)")]
    InvalidLinger {
        /// The rejected value.
        value: u64,
    },

    /// Unrecognized acks value.
    #[error("invalid acks value: {value}")]
    InvalidAcks {
        /// The rejected value.
        value: String,
    },

    /// Unrecognized compression value.
    #[error("invalid compression value: {value}")]
    InvalidCompression {
        /// The rejected value.
        value: String,
    },
}

/// Configuration for the Kafka egress producer.
#[derive(Debug, Clone)]
pub struct KafkaEgressConfig {
    /// Broker addresses, comma separated.
    pub bootstrap_servers: String,

    /// Target topic.
    pub topic: String,

    /// Client identifier reported to the brokers.
    pub client_id: String,

    /// Maximum request size in bytes.
    pub max_request_bytes: u32,

    /// Acknowledgement level.
    pub acks: Acks,

    /// Records accumulated before an inline flush.
    pub batch_count: usize,

    /// Client-side linger before a protocol batch is sent.
    pub linger_ms: u64,

    /// Compression codec.
    pub compression: Compression,

    /// Whether the idempotent producer is enabled.
    pub idempotent: bool,

    /// Maximum client-level delivery retries per record.
    pub retry_max_attempts: u32,

    /// Pause between client-level retries, in milliseconds.
    pub retry_backoff_ms: u64,
}

impl KafkaEgressConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> KafkaEgressConfigBuilder {
        KafkaEgressConfigBuilder::default()
    }

    /// Renders this configuration as client properties.
    #[must_use]
    pub fn to_client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("client.id", &self.client_id)
            .set("message.max.bytes", self.max_request_bytes.to_string())
            .set("acks", self.acks.as_str())
            .set("enable.idempotence", self.idempotent.to_string())
            .set("linger.ms", self.linger_ms.to_string())
            .set("compression.codec", self.compression.as_str())
            .set(
                "message.send.max.retries",
                self.retry_max_attempts.to_string(),
            )
            .set("retry.backoff.ms", self.retry_backoff_ms.to_string());
        config
    }
}

/// Builder for [`KafkaEgressConfig`].
#[derive(Debug, Default)]
pub struct KafkaEgressConfigBuilder {
    bootstrap_servers: Option<String>,
    topic: Option<String>,
    client_id: Option<String>,
    max_request_bytes: Option<u32>,
    acks: Option<Acks>,
    batch_count: Option<usize>,
    linger_ms: Option<u64>,
    compression: Option<Compression>,
    idempotent: Option<bool>,
    retry_max_attempts: Option<u32>,
    retry_backoff_ms: Option<u64>,
}

impl KafkaEgressConfigBuilder {
    /// Sets the broker addresses.
    #[must_use]
    pub fn bootstrap_servers(mut self, servers: impl Into<String>) -> Self {
        self.bootstrap_servers = Some(servers.into());
        self
    }

    /// Sets the target topic.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Sets the client identifier. Default: `tributary-cdc`.
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the maximum request size. Default: 1 MiB.
    #[must_use]
    pub fn max_request_bytes(mut self, bytes: u32) -> Self {
        self.max_request_bytes = Some(bytes);
        self
    }

    /// Sets the acknowledgement level. Default: all.
    #[must_use]
    pub fn acks(mut self, acks: Acks) -> Self {
        self.acks = Some(acks);
        self
    }

    /// Sets the egress batch count. Default: 100.
    #[must_use]
    pub fn batch_count(mut self, count: usize) -> Self {
        self.batch_count = Some(count);
        self
    }

    /// Sets the client linger in milliseconds (at most 5). Default: 0.
    #[must_use]
    pub fn linger_ms(mut self, linger: u64) -> Self {
        self.linger_ms = Some(linger);
        self
    }

    /// Sets the compression codec. Default: none.
    #[must_use]
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Enables or disables the idempotent producer. Default: enabled.
    #[must_use]
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = Some(idempotent);
        self
    }

    /// Sets the client-level retry budget. Default: 5.
    #[must_use]
    pub fn retry_max_attempts(mut self, attempts: u32) -> Self {
        self.retry_max_attempts = Some(attempts);
        self
    }

    /// Sets the client-level retry backoff in milliseconds. Default: 1000.
    #[must_use]
    pub fn retry_backoff_ms(mut self, backoff: u64) -> Self {
        self.retry_backoff_ms = Some(backoff);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or values are out of
    /// range.
    pub fn build(self) -> Result<KafkaEgressConfig, EgressConfigError> {
        let bootstrap_servers = self
            .bootstrap_servers
            .ok_or(EgressConfigError::MissingBootstrapServers)?;
        let topic = self.topic.ok_or(EgressConfigError::MissingTopic)?;

        let batch_count = match self.batch_count {
            None => 100,
            Some(0) => {
                return Err(EgressConfigError::InvalidBatchCount {
                    value: 0,
                    reason: "batch_count must be greater than 0",
                })
            }
            Some(count) => count,
        };

        let linger_ms = self.linger_ms.unwrap_or(0);
        if linger_ms > 5 {
            return Err(EgressConfigError::InvalidLinger { value: linger_ms });
        }

        Ok(KafkaEgressConfig {
            bootstrap_servers,
            topic,
            client_id: self
                .client_id
                .unwrap_or_else(|| "tributary-cdc".to_string()),
            max_request_bytes: self.max_request_bytes.unwrap_or(1_048_576),
            acks: self.acks.unwrap_or_default(),
            batch_count,
            linger_ms,
            compression: self.compression.unwrap_or_default(),
            idempotent: self.idempotent.unwrap_or(true),
            retry_max_attempts: self.retry_max_attempts.unwrap_or(5),
            retry_backoff_ms: self.retry_backoff_ms.unwrap_or(1000),
        })
    }
}
