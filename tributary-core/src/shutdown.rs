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

//! Graceful shutdown coordination.
//!
//! The coordinator owns the sequencing of quiescence: mark the processor's
//! stop flag, run every registered shutdown action concurrently under a
//! deadline, then drain and close the egress sink. Re-entrant calls
//! collapse into the first shutdown; later callers receive its outcome.
//!
//! # Example
//!
//! ```rust,no_run
//! use tributary_core::shutdown::ShutdownCoordinator;
//! # use tributary_core::sink::{DocumentSink, SinkError};
//! # use std::sync::Arc;
//! # use std::sync::atomic::AtomicBool;
//! # use std::time::Duration;
//! # use tokio::sync::Mutex;
//! # async fn example<S: DocumentSink + 'static>(sink: Arc<Mutex<S>>) {
//! let stop = Arc::new(AtomicBool::new(false));
//! let coordinator = ShutdownCoordinator::new(Arc::clone(&stop), sink);
//!
//! coordinator.register("close cursor store", || {
//!     Box::pin(async { Ok(()) })
//! });
//!
//! let clean = coordinator.shutdown(Duration::from_secs(30)).await;
//! assert!(clean);
//! # }
//! ```

use crate::metrics;
use crate::sink::DocumentSink;
use futures::future::{join_all, BoxFuture};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OnceCell};
use tracing::{error, info, warn};

/// Error type produced by shutdown actions.
pub type ActionError = Box<dyn std::error::Error + Send + Sync>;

type ActionFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), ActionError>> + Send>;

struct NamedAction {
    name: &'static str,
    run: ActionFn,
}

/// Coordinates graceful shutdown across the pipeline components.
pub struct ShutdownCoordinator<S> {
    stop: Arc<AtomicBool>,
    sink: Arc<Mutex<S>>,
    actions: StdMutex<Vec<NamedAction>>,
    outcome: OnceCell<bool>,
}

impl<S> ShutdownCoordinator<S>
where
    S: DocumentSink,
{
    /// Creates a coordinator over the processor stop flag and the egress
    /// sink.
    pub fn new(stop: Arc<AtomicBool>, sink: Arc<Mutex<S>>) -> Self {
        Self {
            stop,
            sink,
            actions: StdMutex::new(Vec::new()),
            outcome: OnceCell::new(),
        }
    }

    /// Registers a named shutdown action.
    ///
    /// Actions registered after shutdown has started are not run.
    pub fn register<F>(&self, name: &'static str, action: F)
    where
        F: FnOnce() -> BoxFuture<'static, Result<(), ActionError>> + Send + 'static,
    {
        let mut actions = self
            .actions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        actions.push(NamedAction {
            name,
            run: Box::new(action),
        });
    }

    /// Runs the shutdown protocol.
    ///
    /// Returns true when every action finished before the deadline and the
    /// sink closed cleanly. Re-entrant and repeated calls return the first
    /// call's outcome without re-running anything.
    pub async fn shutdown(&self, deadline: Duration) -> bool {
        *self
            .outcome
            .get_or_init(|| self.run_shutdown(deadline))
            .await
    }

    async fn run_shutdown(&self, deadline: Duration) -> bool {
        info!(deadline_ms = deadline.as_millis(), "Initiating graceful shutdown");
        let start = Instant::now();

        self.stop.store(true, Ordering::SeqCst);

        let actions: Vec<NamedAction> = {
            let mut guard = self
                .actions
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.drain(..).collect()
        };

        let tasks = actions.into_iter().map(|action| async move {
            let name = action.name;
            match (action.run)().await {
                Ok(()) => {
                    info!(action = name, "Shutdown action completed");
                    true
                }
                Err(err) => {
                    error!(action = name, error = %err, "Shutdown action failed");
                    false
                }
            }
        });

        let all_done = match tokio::time::timeout(deadline, join_all(tasks)).await {
            Ok(results) => results.into_iter().all(|ok| ok),
            Err(_) => {
                warn!("Deadline elapsed waiting for shutdown actions");
                false
            }
        };

        // The sink is drained last so every stopping component gets its
        // final records into the batch first.
        let sink_closed = {
            let mut sink = self.sink.lock().await;
            match sink.close().await {
                Ok(()) => {
                    info!("Egress sink flushed and closed");
                    true
                }
                Err(err) => {
                    error!(error = %err, "Failed to close egress sink");
                    false
                }
            }
        };

        let elapsed = start.elapsed();
        metrics::record_shutdown_duration(elapsed);
        info!(
            elapsed_ms = elapsed.as_millis(),
            complete = all_done && sink_closed,
            "Graceful shutdown finished"
        );

        all_done && sink_closed
    }
}
