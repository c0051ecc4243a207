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

//! The batching egress producer.
//!
//! [`BatchingProducer`] accumulates (key, payload) records into a
//! count-bounded FIFO batch. When the batch reaches its bound, it is
//! flushed inline on the sending caller: every pending record is submitted
//! to the log client in order, then all in-flight delivery reports are
//! awaited before the batch is cleared.
//!
//! Per-record delivery failures are counted and logged - they never
//! propagate to the caller of `send`. Retries are the log client's
//! responsibility (idempotent producer, `acks=all`); this layer does not
//! retry.
//!
//! The producer is generic over the thin [`LogClient`] seam so the batch
//! discipline is testable without a broker; production wires in
//! [`KafkaLogClient`](crate::kafka::KafkaLogClient).

use async_trait::async_trait;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info, warn};
use tributary_core::metrics;
use tributary_core::sink::{DocumentSink, SinkError};

/// Acknowledgement of a delivered record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Topic the record landed on.
    pub topic: String,

    /// Partition the record landed on.
    pub partition: i32,

    /// Offset assigned by the broker.
    pub offset: i64,
}

/// A record failed to deliver after the client exhausted its own retries.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The broker or client reported a terminal failure.
    #[error("delivery failed: {0}")]
    Failed(String),

    /// The client dropped the delivery without a report.
    #[error("delivery canceled")]
    Canceled,
}

/// The client rejected a record at submission time.
#[derive(Debug, Error)]
#[error("submit rejected: {message}")]
pub struct SubmitError {
    /// Human-readable rejection reason.
    pub message: String,
}

/// Thin interface over the log broker client.
///
/// `submit` must be non-blocking: it enqueues the record and returns a
/// future resolving to the per-record delivery report.
pub trait LogClient: Send + Sync {
    /// Future resolving to one record's delivery report.
    type Delivery: Future<Output = Result<DeliveryReport, DeliveryError>> + Send + Unpin;

    /// Enqueues a record for delivery.
    ///
    /// # Errors
    ///
    /// Returns an error when the record cannot be enqueued at all (queue
    /// full, oversized record).
    fn submit(&mut self, key: &str, payload: &[u8]) -> Result<Self::Delivery, SubmitError>;

    /// Releases the client, waiting out its in-flight records.
    fn close(&mut self);
}

struct PendingRecord {
    key: String,
    payload: Vec<u8>,
}

/// Count-bounded batching producer over a [`LogClient`].
///
/// The pending batch is owned by the single caller thread; concurrent
/// `send`s require external serialization.
pub struct BatchingProducer<C: LogClient> {
    client: C,
    batch: Vec<PendingRecord>,
    batch_count: usize,
    closed: bool,
    flushes: u64,
    delivered_ok: u64,
    delivered_err: u64,
}

impl<C: LogClient> BatchingProducer<C> {
    /// Creates a producer flushing every `batch_count` records.
    #[must_use]
    pub fn new(client: C, batch_count: usize) -> Self {
        info!(batch_count, "Created batching egress producer");
        Self {
            client,
            batch: Vec::with_capacity(batch_count),
            batch_count,
            closed: false,
            flushes: 0,
            delivered_ok: 0,
            delivered_err: 0,
        }
    }

    /// Number of records currently pending in the batch.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    /// Number of non-empty flushes performed.
    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.flushes
    }

    /// Number of records acknowledged by the broker.
    #[must_use]
    pub fn delivered_ok(&self) -> u64 {
        self.delivered_ok
    }

    /// Number of records that failed delivery or submission.
    #[must_use]
    pub fn delivered_err(&self) -> u64 {
        self.delivered_err
    }

    /// Drains the pending batch: submit everything FIFO, then await every
    /// delivery report.
    async fn flush_pending(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        let records = std::mem::take(&mut self.batch);
        let batch_size = records.len();
        debug!(batch_size, "Flushing egress batch");

        let mut in_flight = Vec::with_capacity(batch_size);
        for record in &records {
            match self.client.submit(&record.key, &record.payload) {
                Ok(delivery) => in_flight.push(delivery),
                Err(err) => {
                    warn!(error = %err, key = %record.key, "Record rejected at submission");
                    metrics::increment_egress_sent(false);
                    self.delivered_err += 1;
                }
            }
        }

        for delivery in in_flight {
            match delivery.await {
                Ok(report) => {
                    debug!(
                        topic = %report.topic,
                        partition = report.partition,
                        offset = report.offset,
                        "Record delivered"
                    );
                    metrics::increment_egress_sent(true);
                    self.delivered_ok += 1;
                }
                Err(err) => {
                    warn!(error = %err, "Record delivery failed");
                    metrics::increment_egress_sent(false);
                    self.delivered_err += 1;
                }
            }
        }

        self.flushes += 1;
        metrics::record_egress_flush(batch_size);
    }
}

#[async_trait]
impl<C: LogClient> DocumentSink for BatchingProducer<C> {
    async fn send(&mut self, key: &str, payload: Vec<u8>) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }

        self.batch.push(PendingRecord {
            key: key.to_string(),
            payload,
        });

        if self.batch.len() >= self.batch_count {
            self.flush_pending().await;
        }

        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        if self.closed {
            warn!("Flush on closed egress producer ignored");
            return Ok(());
        }

        self.flush_pending().await;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        if self.closed {
            return Ok(());
        }

        info!(pending = self.batch.len(), "Closing egress producer");
        self.flush_pending().await;
        self.client.close();
        self.closed = true;

        Ok(())
    }
}

impl<C: LogClient> Drop for BatchingProducer<C> {
    fn drop(&mut self) {
        if !self.closed && !self.batch.is_empty() {
            warn!(
                pending = self.batch.len(),
                "Egress producer dropped without close(), pending records lost"
            );
        }
    }
}
