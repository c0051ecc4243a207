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

//! Kafka-backed [`LogClient`].

use crate::kafka::config::KafkaEgressConfig;
use crate::producer::{DeliveryError, DeliveryReport, LogClient, SubmitError};
use futures::future::BoxFuture;
use futures::FutureExt;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// How long `close` waits for in-flight records to drain.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors creating or probing the Kafka client.
#[derive(Debug, Error)]
pub enum KafkaClientError {
    /// The underlying client reported an error.
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// A connectivity probe could not be completed.
    #[error("probe failed: {0}")]
    Probe(String),
}

/// [`LogClient`] implementation over the Kafka future producer.
///
/// Submission is non-blocking: records land in the client's local queue
/// and a future resolves to the broker's per-record delivery report.
/// Retries, idempotence and acknowledgement policy are the client's
/// concern, configured from [`KafkaEgressConfig`].
pub struct KafkaLogClient {
    producer: FutureProducer,
    topic: String,
}

impl KafkaLogClient {
    /// Creates a Kafka client from the egress configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the producer cannot be constructed (invalid
    /// properties, unloadable client library).
    pub fn new(config: &KafkaEgressConfig) -> Result<Self, KafkaClientError> {
        info!(
            bootstrap_servers = %config.bootstrap_servers,
            topic = %config.topic,
            client_id = %config.client_id,
            acks = config.acks.as_str(),
            idempotent = config.idempotent,
            "Creating Kafka producer"
        );

        let producer: FutureProducer = config.to_client_config().create()?;

        Ok(Self {
            producer,
            topic: config.topic.clone(),
        })
    }

    /// Returns a handle for broker connectivity probes.
    ///
    /// The handle shares the underlying producer and stays valid after the
    /// client has been moved into the batching producer.
    #[must_use]
    pub fn probe_handle(&self) -> KafkaProbe {
        KafkaProbe {
            producer: self.producer.clone(),
            topic: self.topic.clone(),
        }
    }
}

/// Broker connectivity probe used by readiness checks and startup.
#[derive(Clone)]
pub struct KafkaProbe {
    producer: FutureProducer,
    topic: String,
}

impl KafkaProbe {
    /// Fetches topic metadata to verify broker connectivity.
    ///
    /// This call blocks; run it on a blocking-capable thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the brokers do not answer within `timeout`.
    pub fn probe(&self, timeout: Duration) -> Result<(), KafkaClientError> {
        self.producer
            .client()
            .fetch_metadata(Some(&self.topic), timeout)?;
        Ok(())
    }
}

impl LogClient for KafkaLogClient {
    type Delivery = BoxFuture<'static, Result<DeliveryReport, DeliveryError>>;

    fn submit(&mut self, key: &str, payload: &[u8]) -> Result<Self::Delivery, SubmitError> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);

        match self.producer.send_result(record) {
            Ok(delivery) => {
                let topic = self.topic.clone();
                Ok(async move {
                    match delivery.await {
                        Ok(Ok((partition, offset))) => Ok(DeliveryReport {
                            topic,
                            partition,
                            offset,
                        }),
                        Ok(Err((err, _message))) => Err(DeliveryError::Failed(err.to_string())),
                        Err(_canceled) => Err(DeliveryError::Canceled),
                    }
                }
                .boxed())
            }
            Err((err, _record)) => Err(SubmitError {
                message: err.to_string(),
            }),
        }
    }

    fn close(&mut self) {
        if let Err(err) = self.producer.flush(CLOSE_TIMEOUT) {
            warn!(error = %err, "Kafka producer flush on close failed");
        }
        info!("Kafka producer closed");
    }
}
