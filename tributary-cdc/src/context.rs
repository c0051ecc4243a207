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

//! Assembly context: wires every pipeline component from validated
//! settings and owns their lifecycle.
//!
//! Construction order: source client (with a connectivity check), Kafka
//! egress, cursor store selection, source breaker, then the snapshot
//! loader, the feed processor and the shutdown coordinator with its
//! registered actions. Construction failures are fatal; the daemon exits
//! non-zero.

use crate::env::{CursorBacking, Settings};
use crate::health::HealthService;
use async_trait::async_trait;
use bson::Document;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tributary_core::breaker::CircuitBreaker;
use tributary_core::config::PipelineConfig;
use tributary_core::cursor::{CursorStore, CursorStoreError};
use tributary_core::mongo::MongoSource;
use tributary_core::processor::{FeedProcessor, FeedSettings, ProcessorError};
use tributary_core::shutdown::ShutdownCoordinator;
use tributary_core::snapshot::{SnapshotError, SnapshotLoader};
use tributary_core::source::SourceError;
use tributary_egress::kafka::{KafkaClientError, KafkaLogClient, KafkaProbe};
use tributary_egress::producer::BatchingProducer;
use tributary_stores::local::FileCursorStore;
use tributary_stores::s3::{S3CursorStore, S3StoreConfig};

type Sink = BatchingProducer<KafkaLogClient>;

/// Errors that take the daemon down.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// The source store is unreachable at startup.
    #[error("source unavailable: {0}")]
    Source(#[from] SourceError),

    /// The log broker client could not be constructed or probed.
    #[error("log broker unavailable: {0}")]
    Broker(#[from] KafkaClientError),

    /// The bulk snapshot failed.
    #[error("initial load failed: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The tail kept failing past the retry budget.
    #[error("change feed failed after {attempts} attempts: {last}")]
    TailExhausted {
        /// Consecutive failed runs.
        attempts: u32,
        /// The last run's error.
        #[source]
        last: ProcessorError,
    },
}

/// The selected cursor backing behind one concrete type.
pub enum CursorBackend {
    /// Local file store.
    File(FileCursorStore),

    /// S3 object store.
    Remote(S3CursorStore),
}

#[async_trait]
impl CursorStore for CursorBackend {
    async fn load(&self) -> Result<Option<Document>, CursorStoreError> {
        match self {
            Self::File(store) => store.load().await,
            Self::Remote(store) => store.load().await,
        }
    }

    async fn save(&self, token: &Document) -> Result<(), CursorStoreError> {
        match self {
            Self::File(store) => store.save(token).await,
            Self::Remote(store) => store.save(token).await,
        }
    }

    async fn close(&self) -> Result<(), CursorStoreError> {
        match self {
            Self::File(store) => store.close().await,
            Self::Remote(store) => store.close().await,
        }
    }
}

/// Owns every wired component of one pipeline instance.
pub struct PipelineContext {
    settings: Settings,
    cursor_store: Arc<CursorBackend>,
    loader: SnapshotLoader<MongoSource, Sink>,
    processor: Arc<FeedProcessor<MongoSource, CursorBackend, Sink>>,
    coordinator: Arc<ShutdownCoordinator<Sink>>,
    health: HealthService,
}

impl PipelineContext {
    /// Builds and wires the full pipeline.
    ///
    /// Verifies connectivity to both the source store and the log broker
    /// before returning.
    ///
    /// # Errors
    ///
    /// Returns an error when either dependency is unreachable or a client
    /// cannot be constructed.
    pub async fn new(settings: Settings) -> Result<Self, ContextError> {
        info!(
            database = %settings.source.database,
            collection = %settings.source.collection,
            topic = %settings.egress.topic,
            "Initializing pipeline context"
        );

        // Source client and connectivity check.
        let client = MongoSource::connect(&settings.source).await?;
        let source = MongoSource::new(&client, &settings.source);
        source.ping().await?;

        // Kafka egress and broker probe.
        let kafka_client = KafkaLogClient::new(&settings.egress)?;
        let probe: KafkaProbe = kafka_client.probe_handle();
        probe_broker(&probe, settings.source.connect_timeout).await?;

        let sink = Arc::new(Mutex::new(BatchingProducer::new(
            kafka_client,
            settings.egress.batch_count,
        )));

        // Cursor backing was selected from the environment.
        let cursor_store = Arc::new(match settings.cursor.clone() {
            CursorBacking::Local { path } => CursorBackend::File(FileCursorStore::new(path)),
            CursorBacking::Remote {
                bucket,
                key,
                region,
            } => CursorBackend::Remote(
                S3CursorStore::new(S3StoreConfig::new(bucket, key, region)).await,
            ),
        });

        let breaker = Arc::new(CircuitBreaker::new(
            "mongodb",
            settings.pipeline.breaker_failure_threshold,
            settings.pipeline.breaker_reset_timeout,
        ));

        let loader = SnapshotLoader::new(
            source.clone(),
            Arc::clone(&sink),
            settings.pipeline.snapshot_enabled,
            settings.source.batch_size,
        );

        let processor = Arc::new(FeedProcessor::new(
            source.clone(),
            Arc::clone(&cursor_store),
            Arc::clone(&sink),
            Arc::clone(&breaker),
            FeedSettings {
                batch_size: Some(settings.source.batch_size),
                read_timeout: Some(settings.source.read_timeout),
            },
        ));

        let coordinator = Arc::new(ShutdownCoordinator::new(
            processor.stop_handle(),
            Arc::clone(&sink),
        ));

        let store_for_shutdown = Arc::clone(&cursor_store);
        coordinator.register("close cursor store", move || {
            Box::pin(async move {
                store_for_shutdown.close().await?;
                Ok(())
            })
        });

        let client_for_shutdown = client.clone();
        coordinator.register("close source client", move || {
            Box::pin(async move {
                client_for_shutdown.shutdown().await;
                Ok(())
            })
        });

        let health = HealthService::new(
            source,
            probe,
            Arc::clone(&breaker),
            settings.source.connect_timeout,
        );

        info!("Pipeline context initialized");

        Ok(Self {
            settings,
            cursor_store,
            loader,
            processor,
            coordinator,
            health,
        })
    }

    /// The shutdown coordinator, for signal handlers.
    #[must_use]
    pub fn coordinator(&self) -> Arc<ShutdownCoordinator<Sink>> {
        Arc::clone(&self.coordinator)
    }

    /// The health views exported for the external prober.
    #[must_use]
    pub fn health(&self) -> &HealthService {
        &self.health
    }

    /// Drives the pipeline: snapshot first, then the indefinite tail.
    ///
    /// The tail is restarted after a `retry_backoff` pause on failure; a
    /// breaker-open abort waits out the breaker reset window instead.
    /// Returns when a stop has been requested.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot fails or the tail exhausts its
    /// retry budget.
    pub async fn run(&self) -> Result<(), ContextError> {
        if self.should_run_snapshot().await {
            self.loader.run().await?;
        } else {
            info!("Skipping initial load");
        }

        let stop = self.processor.stop_handle();
        let mut consecutive_failures: u32 = 0;

        loop {
            if stop.load(Ordering::SeqCst) {
                return Ok(());
            }

            match self.processor.run().await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    consecutive_failures += 1;
                    if consecutive_failures >= self.settings.pipeline.retry_max_attempts {
                        return Err(ContextError::TailExhausted {
                            attempts: consecutive_failures,
                            last: err,
                        });
                    }

                    let pause = restart_pause(&self.settings.pipeline, &err);

                    warn!(
                        error = %err,
                        attempt = consecutive_failures,
                        pause_ms = pause.as_millis(),
                        "Tail run failed, restarting"
                    );
                    tokio::time::sleep(pause).await;
                }
            }
        }
    }

    /// Snapshot gate: enabled, and either forced or no cursor exists yet.
    ///
    /// A restart that already holds a resume cursor does not replay the
    /// collection unless explicitly forced.
    async fn should_run_snapshot(&self) -> bool {
        if !self.settings.pipeline.snapshot_enabled {
            return true; // The loader logs and returns immediately.
        }
        if self.settings.pipeline.snapshot_force {
            return true;
        }

        match self.cursor_store.load().await {
            Ok(Some(_)) => {
                info!("Resume cursor present, skipping initial load");
                false
            }
            Ok(None) => true,
            Err(err) => {
                warn!(error = %err, "Cursor probe failed, running initial load");
                true
            }
        }
    }
}

/// Pause applied before a tail restart.
///
/// A breaker-open abort waits out the breaker reset window so the next run
/// can probe; every other failure waits the configured flat backoff.
fn restart_pause(pipeline: &PipelineConfig, err: &ProcessorError) -> Duration {
    match err {
        ProcessorError::BreakerOpen { .. } => pipeline.breaker_reset_timeout,
        ProcessorError::Feed(_) => pipeline.retry_backoff,
    }
}

async fn probe_broker(probe: &KafkaProbe, timeout: Duration) -> Result<(), ContextError> {
    let probe = probe.clone();
    tokio::task::spawn_blocking(move || probe.probe(timeout))
        .await
        .map_err(|join| ContextError::Broker(KafkaClientError::Probe(join.to_string())))??;
    Ok(())
}
