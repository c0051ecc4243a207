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

//! Bulk snapshot loader: the one-shot full-collection read performed before
//! tailing.
//!
//! Streams every document through the document sink with
//! `_operation = "read"` and `_source = "initial_load"`. Flush cadence is
//! driven entirely by the sink's own batching; the loader itself keeps no
//! completion marker, so re-running it emits the whole collection again.
//! Instances that must guard against a repeat snapshot disable it through
//! configuration.

use crate::envelope::{self, EventSource};
use crate::metrics;
use crate::sink::DocumentSink;
use crate::source::{SnapshotSource, SourceError};
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Errors that abort a snapshot run.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The collection scan failed.
    #[error("snapshot scan error: {0}")]
    Scan(#[from] SourceError),
}

/// Outcome of a snapshot run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotSummary {
    /// Whether the loader actually ran (false when disabled).
    pub ran: bool,

    /// Documents emitted through the sink.
    pub documents: u64,

    /// Wall-clock duration of the run.
    pub duration: Duration,
}

/// The bulk snapshot loader.
pub struct SnapshotLoader<F, S> {
    source: F,
    sink: Arc<Mutex<S>>,
    enabled: bool,
    batch_size: u32,
}

impl<F, S> SnapshotLoader<F, S>
where
    F: SnapshotSource,
    S: DocumentSink,
{
    /// Creates a new loader.
    ///
    /// `batch_size` is passed through to the server-side cursor and also
    /// sets the progress-logging cadence.
    pub fn new(source: F, sink: Arc<Mutex<S>>, enabled: bool, batch_size: u32) -> Self {
        Self {
            source,
            sink,
            enabled,
            batch_size: batch_size.max(1),
        }
    }

    /// Runs the snapshot.
    ///
    /// Returns immediately without touching the sink when the snapshot is
    /// disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection scan cannot be opened or fails
    /// mid-stream.
    #[instrument(skip(self), fields(batch_size = self.batch_size))]
    pub async fn run(&self) -> Result<SnapshotSummary, SnapshotError> {
        if !self.enabled {
            info!("Initial load is disabled, skipping");
            return Ok(SnapshotSummary::default());
        }

        info!("Starting initial data load");
        let start = Instant::now();

        let mut documents = self.source.scan(self.batch_size).await?;
        let mut processed: u64 = 0;

        while let Some(item) = documents.next().await {
            let document = item?;

            let key = envelope::partition_key(&document);
            let payload = envelope::build(&document, "read", EventSource::InitialLoad);

            match serde_json::to_vec(&payload) {
                Ok(bytes) => {
                    let mut sink = self.sink.lock().await;
                    if let Err(err) = sink.send(&key, bytes).await {
                        warn!(error = %err, key = %key, "Sink rejected snapshot record");
                        continue;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "Failed to serialize snapshot envelope, skipping");
                    continue;
                }
            }

            processed += 1;
            if processed % u64::from(self.batch_size) == 0 {
                info!(documents = processed, "Initial load progress");
            }
        }

        let duration = start.elapsed();
        metrics::increment_snapshot_documents(processed);
        metrics::record_snapshot_duration(duration);

        info!(
            documents = processed,
            elapsed_ms = duration.as_millis(),
            "Initial data load completed"
        );

        Ok(SnapshotSummary {
            ran: true,
            documents: processed,
            duration,
        })
    }
}
