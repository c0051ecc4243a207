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

//! Health views.
//!
//! The pipeline exports two booleans for the external HTTP prober:
//! liveness (the process is up and the source breaker is not open) and
//! readiness (both the source store and the log broker answer their
//! probes within the deadline). Serving them over HTTP is the prober's
//! concern, not this crate's.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tributary_core::breaker::{BreakerState, CircuitBreaker};
use tributary_core::mongo::MongoSource;
use tributary_egress::kafka::KafkaProbe;

/// Boolean health views over the pipeline's dependencies.
pub struct HealthService {
    source: MongoSource,
    broker_probe: KafkaProbe,
    source_breaker: Arc<CircuitBreaker>,
    probe_timeout: Duration,
}

impl HealthService {
    /// Creates the health views.
    #[must_use]
    pub fn new(
        source: MongoSource,
        broker_probe: KafkaProbe,
        source_breaker: Arc<CircuitBreaker>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            source,
            broker_probe,
            source_breaker,
            probe_timeout,
        }
    }

    /// Liveness: the process is running and the source breaker is not
    /// currently open.
    #[must_use]
    pub fn liveness(&self) -> bool {
        let state = self.source_breaker.state();
        debug!(breaker_state = state.as_str(), "Liveness check");
        state != BreakerState::Open
    }

    /// Readiness: source ping and broker metadata probe both succeed
    /// within the probe deadline.
    pub async fn readiness(&self) -> bool {
        let source_ok = match self.source.ping().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "Source readiness probe failed");
                false
            }
        };

        let probe = self.broker_probe.clone();
        let timeout = self.probe_timeout;
        let broker_ok = match tokio::task::spawn_blocking(move || probe.probe(timeout)).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!(error = %err, "Broker readiness probe failed");
                false
            }
            Err(err) => {
                warn!(error = %err, "Broker readiness probe task failed");
                false
            }
        };

        source_ok && broker_ok
    }
}
