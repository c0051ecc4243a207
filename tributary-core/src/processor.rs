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

//! Change feed processor: the indefinite tailing phase of the pipeline.
//!
//! The processor opens the change feed (resuming from the persisted cursor
//! when one exists), classifies each event, emits envelopes through the
//! document sink, and persists the event's resume token afterwards.
//!
//! # Delivery semantics
//!
//! The cursor is saved after the event's envelope has been handed to the
//! sink but without waiting for broker acknowledgement. On a crash between
//! emission and cursor save the event replays; between save and broker ack
//! the idempotent `acks=all` producer configuration covers the gap. The
//! result is at-least-once delivery; stronger guarantees would need a
//! cross-system transaction, which is out of scope.
//!
//! # Error handling
//!
//! Every feed read runs through the source circuit breaker. Transient read
//! errors are recorded by the breaker, logged and swallowed; the loop keeps
//! going. An open breaker aborts the run and surfaces as
//! [`ProcessorError::BreakerOpen`], leaving restart policy to the caller.
//!
//! Within an event, bad data (missing post-image, unknown operation) skips
//! the emission but still advances the cursor, so one malformed event
//! cannot wedge the feed.

use crate::breaker::{BreakerError, CircuitBreaker};
use crate::cursor::CursorStore;
use crate::envelope::{self, EventSource};
use crate::event::ChangeEvent;
use crate::metrics;
use crate::sink::DocumentSink;
use crate::source::{FeedOptions, FeedSource, SourceError};
use bson::Document;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

/// Literal substring marking legacy snapshot artifacts in `_id` values.
///
/// Events whose stringified document key contains it are discarded (the
/// cursor still advances past them).
pub const INITIAL_LOAD_MARKER: &str = "initial_load_marker";

/// Errors that abort a processor run.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// The source circuit breaker is open.
    #[error("circuit breaker '{breaker}' is open")]
    BreakerOpen {
        /// Name of the open breaker.
        breaker: String,
    },

    /// The feed could not be opened.
    #[error("feed error: {0}")]
    Feed(#[from] SourceError),
}

/// Counters maintained by the processor, snapshotted for logs and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Events classified (marker skips excluded).
    pub events_processed: u64,

    /// Envelopes handed to the sink.
    pub events_emitted: u64,

    /// Events skipped without emission (markers, missing post-images,
    /// non-emitting operations are not counted here).
    pub events_skipped: u64,

    /// Events with a non-whitelisted operation type.
    pub events_unknown: u64,

    /// Successful cursor saves.
    pub cursor_saves: u64,

    /// Failed cursor saves.
    pub cursor_save_errors: u64,

    /// Errors swallowed by the tailing loop.
    pub loop_errors: u64,
}

/// Tuning knobs for the feed, carried from the source configuration.
#[derive(Debug, Clone, Default)]
pub struct FeedSettings {
    /// Server-side batch size for feed reads.
    pub batch_size: Option<u32>,

    /// Upper bound on a single blocking feed read.
    pub read_timeout: Option<Duration>,
}

/// The change feed processor.
///
/// Exactly one tailing loop runs per processor instance; the stop flag is
/// the only state the outside world mutates while the loop is live.
pub struct FeedProcessor<F, C, S> {
    source: F,
    cursor_store: Arc<C>,
    sink: Arc<Mutex<S>>,
    breaker: Arc<CircuitBreaker>,
    settings: FeedSettings,
    stop: Arc<AtomicBool>,
    stats: Arc<RwLock<ProcessorStats>>,
}

impl<F, C, S> FeedProcessor<F, C, S>
where
    F: FeedSource,
    C: CursorStore,
    S: DocumentSink,
{
    /// Creates a new processor.
    pub fn new(
        source: F,
        cursor_store: Arc<C>,
        sink: Arc<Mutex<S>>,
        breaker: Arc<CircuitBreaker>,
        settings: FeedSettings,
    ) -> Self {
        Self {
            source,
            cursor_store,
            sink,
            breaker,
            settings,
            stop: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(RwLock::new(ProcessorStats::default())),
        }
    }

    /// Handle used by the shutdown coordinator to request a stop.
    ///
    /// Setting the flag makes the loop exit within one event of latency.
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Requests the tailing loop to stop.
    pub fn stop(&self) {
        info!("Stopping change feed processor");
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Returns a snapshot of the processor counters.
    pub async fn stats(&self) -> ProcessorStats {
        self.stats.read().await.clone()
    }

    /// Runs the tailing loop until stopped or aborted.
    ///
    /// Resumes from the persisted cursor when one exists; a cursor load
    /// failure is logged and treated as "start from now".
    ///
    /// # Errors
    ///
    /// [`ProcessorError::BreakerOpen`] when the source breaker rejects a
    /// read, [`ProcessorError::Feed`] when the feed cannot be opened.
    #[instrument(skip(self), fields(breaker = %self.breaker.name()))]
    pub async fn run(&self) -> Result<(), ProcessorError> {
        let resume_after = self.load_cursor().await;
        if let Some(ref token) = resume_after {
            info!(?token, "Resuming change feed from saved cursor");
        }

        let options = FeedOptions {
            resume_after,
            batch_size: self.settings.batch_size,
            read_timeout: self.settings.read_timeout,
        };

        let mut feed = self
            .breaker
            .execute(|| self.source.open(options))
            .await
            .map_err(|err| self.map_breaker_error(err))?;

        info!("Change feed opened, tailing");

        while !self.stop.load(Ordering::SeqCst) {
            let read = self
                .breaker
                .execute(|| async {
                    match feed.next().await {
                        Some(Ok(event)) => Ok(Some(event)),
                        Some(Err(err)) => Err(err),
                        None => Ok(None),
                    }
                })
                .await;

            match read {
                Ok(Some(event)) => self.handle_event(event).await,
                Ok(None) => {
                    warn!("Change feed ended unexpectedly");
                    break;
                }
                Err(BreakerError::Open { name }) => {
                    warn!(breaker = %name, "Source breaker open, aborting tail run");
                    return Err(ProcessorError::BreakerOpen { breaker: name });
                }
                Err(BreakerError::Inner(err)) => {
                    warn!(error = %err, "Error reading change feed");
                    metrics::increment_feed_error();
                    self.stats.write().await.loop_errors += 1;
                }
            }
        }

        let stats = self.stats().await;
        info!(
            events_processed = stats.events_processed,
            events_emitted = stats.events_emitted,
            events_skipped = stats.events_skipped,
            cursor_saves = stats.cursor_saves,
            "Change feed processor stopped"
        );

        Ok(())
    }

    /// Processes one classified feed event: marker filter, classify, act,
    /// acknowledge.
    async fn handle_event(&self, event: ChangeEvent) {
        if let Some(id) = event.document_id() {
            if envelope::scalar_to_string(id).contains(INITIAL_LOAD_MARKER) {
                debug!("Skipping legacy snapshot marker document");
                metrics::increment_feed_skipped("marker");
                self.stats.write().await.events_skipped += 1;
                self.save_cursor(&event.resume_token).await;
                return;
            }
        }

        let operation = event.operation.sanitized();
        debug!(operation, document_key = ?event.document_key, "Received change event");

        metrics::increment_feed_event(operation);
        {
            let mut stats = self.stats.write().await;
            stats.events_processed += 1;
            if event.operation.is_unknown() {
                stats.events_unknown += 1;
            }
        }

        if event.operation.carries_post_image() {
            match event.full_document {
                Some(ref document) => self.emit(document, operation).await,
                None => {
                    warn!(operation, "Post-image missing, skipping emission");
                    metrics::increment_feed_skipped("missing_post_image");
                    self.stats.write().await.events_skipped += 1;
                }
            }
        } else if event.operation == crate::event::OperationType::Delete {
            match event.document_key {
                Some(ref key_document) => self.emit(key_document, operation).await,
                None => {
                    warn!("Document key missing for delete, skipping emission");
                    metrics::increment_feed_skipped("missing_document_key");
                    self.stats.write().await.events_skipped += 1;
                }
            }
        } else {
            debug!(operation, "No emission for operation");
        }

        self.save_cursor(&event.resume_token).await;
    }

    /// Builds the envelope for `document` and hands it to the sink.
    async fn emit(&self, document: &Document, operation: &'static str) {
        let key = envelope::partition_key(document);
        let payload = envelope::build(document, operation, EventSource::ChangeStream);

        let bytes = match serde_json::to_vec(&payload) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "Failed to serialize envelope, skipping");
                metrics::increment_feed_skipped("serialization");
                self.stats.write().await.events_skipped += 1;
                return;
            }
        };

        let mut sink = self.sink.lock().await;
        match sink.send(&key, bytes).await {
            Ok(()) => {
                self.stats.write().await.events_emitted += 1;
            }
            Err(err) => {
                warn!(error = %err, key = %key, "Sink rejected record");
                metrics::increment_feed_error();
                self.stats.write().await.loop_errors += 1;
            }
        }
    }

    /// Persists the resume token. Failures are logged and counted, never
    /// fatal: the next acknowledgement overwrites.
    async fn save_cursor(&self, token: &Document) {
        match self.cursor_store.save(token).await {
            Ok(()) => {
                metrics::increment_cursor_save(true);
                self.stats.write().await.cursor_saves += 1;
            }
            Err(err) => {
                warn!(error = %err, "Failed to save resume cursor");
                metrics::increment_cursor_save(false);
                self.stats.write().await.cursor_save_errors += 1;
            }
        }
    }

    /// Loads the persisted cursor; any failure degrades to "start from
    /// now".
    async fn load_cursor(&self) -> Option<Document> {
        match self.cursor_store.load().await {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "Failed to load resume cursor, starting from now");
                metrics::increment_cursor_load_error();
                None
            }
        }
    }

    fn map_breaker_error(&self, err: BreakerError<SourceError>) -> ProcessorError {
        match err {
            BreakerError::Open { name } => ProcessorError::BreakerOpen { breaker: name },
            BreakerError::Inner(source) => ProcessorError::Feed(source),
        }
    }
}
