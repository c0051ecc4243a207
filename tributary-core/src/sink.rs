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

//! The document sink consumed by the snapshot loader and the change feed
//! processor.
//!
//! The pipeline has exactly one sink: the batching egress producer that
//! owns the connection to the log broker. The trait exists as the seam
//! between the feed-driving components and that producer, and so tests can
//! substitute a recording implementation.
//!
//! # Contract
//!
//! - [`DocumentSink::send`] appends a keyed payload; implementations may
//!   flush internally when a batch bound is reached.
//! - [`DocumentSink::flush`] drains everything pending to the broker and
//!   waits for the acknowledgements of all in-flight records.
//! - [`DocumentSink::close`] flushes, then releases the underlying client.
//!   Further sends fail with [`SinkError::Closed`].
//!
//! Record-level delivery failures surface in metrics and logs, not as
//! errors from `send`; only client-level faults are returned.

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a document sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink was closed and cannot accept further records.
    #[error("sink is closed")]
    Closed,

    /// The underlying client rejected a record outright (e.g. the local
    /// queue is full or the record is oversized).
    #[error("submit error: {message}")]
    Submit {
        /// Human-readable error message.
        message: String,
    },

    /// Client-level failure not tied to a single record.
    #[error("client error: {message}")]
    Client {
        /// Human-readable error message.
        message: String,
        /// The underlying client error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl SinkError {
    /// Creates a submit error with a custom message.
    #[must_use]
    pub fn submit(message: impl Into<String>) -> Self {
        Self::Submit {
            message: message.into(),
        }
    }

    /// Creates a client error from any error type.
    #[must_use]
    pub fn client(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Client {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }
}

/// Destination for keyed JSON payloads.
///
/// Implementations are owned by a single caller at a time; concurrent use
/// requires external serialization (the pipeline wraps its sink in a
/// mutex and drives it from one loop at a time).
#[async_trait]
pub trait DocumentSink: Send {
    /// Appends a record to the pending batch.
    ///
    /// The key selects the target partition; per-key submission order is
    /// preserved through to the broker.
    ///
    /// # Errors
    ///
    /// Returns an error only for client-level faults; per-record delivery
    /// failures are reported through metrics.
    async fn send(&mut self, key: &str, payload: Vec<u8>) -> Result<(), SinkError>;

    /// Drains all pending records and waits for their acknowledgements.
    ///
    /// # Errors
    ///
    /// Returns an error for client-level faults.
    async fn flush(&mut self) -> Result<(), SinkError>;

    /// Flushes pending records and closes the underlying client.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    async fn close(&mut self) -> Result<(), SinkError>;
}
