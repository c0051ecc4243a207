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

//! Circuit breaker protecting calls against an external dependency.
//!
//! The breaker sheds load while a dependency is misbehaving instead of
//! piling retries onto it, then probes for recovery once the reset window
//! has passed.
//!
//! # State machine
//!
//! - **Closed** → **Open** when consecutive failures reach the configured
//!   threshold. A success while closed resets the counter.
//! - **Open** → **HalfOpen** once the reset timeout has elapsed since the
//!   most recent failure; the next call runs as a single probe.
//! - **HalfOpen** → **Closed** on a successful probe; **HalfOpen** →
//!   **Open** on any failure.
//!
//! Calls rejected while open fail with [`BreakerError::Open`] without the
//! action being invoked; rejections are not counted as failures.
//!
//! # Examples
//!
//! ```rust
//! use tributary_core::breaker::{BreakerError, CircuitBreaker};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::new("mongodb", 3, Duration::from_secs(30));
//!
//! let result: Result<u32, BreakerError<std::io::Error>> =
//!     breaker.execute(|| async { Ok(42) }).await;
//! assert_eq!(result.unwrap(), 42);
//! # }
//! ```

use crate::metrics;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Current position of a breaker in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls flow through normally.
    Closed,

    /// Calls are rejected without invoking the action.
    Open,

    /// One probe call is allowed through to test recovery.
    HalfOpen,
}

impl BreakerState {
    /// Lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    /// The breaker is open; the action was not invoked.
    #[error("circuit breaker '{name}' is open")]
    Open {
        /// Name of the rejecting breaker.
        name: String,
    },

    /// The action ran and failed; the failure has been recorded.
    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Returns true if this is a breaker-open rejection.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

struct BreakerCell {
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// Circuit breaker wrapping a dependency-bound action.
///
/// The mutable tuple (state, failure count, last failure instant) lives
/// under a single mutex; readers may observe a transient state but never a
/// torn one.
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    cell: Mutex<BreakerCell>,
}

impl CircuitBreaker {
    /// Creates a new breaker.
    ///
    /// `failure_threshold` consecutive failures open the circuit;
    /// `reset_timeout` is how long after the last failure the breaker waits
    /// before allowing a probe.
    #[must_use]
    pub fn new(name: impl Into<String>, failure_threshold: u32, reset_timeout: Duration) -> Self {
        let name = name.into();
        info!(
            breaker = %name,
            failure_threshold,
            reset_timeout_ms = reset_timeout.as_millis(),
            "Created circuit breaker"
        );

        Self {
            name,
            failure_threshold,
            reset_timeout,
            cell: Mutex::new(BreakerCell {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
        }
    }

    /// Name of this breaker, as used in logs and metric labels.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current state, for diagnostics and health views.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// Runs `action` under breaker protection.
    ///
    /// If the breaker is open and the reset window has not elapsed, returns
    /// [`BreakerError::Open`] without invoking the action. Otherwise the
    /// action runs and its success or failure is recorded.
    ///
    /// # Errors
    ///
    /// [`BreakerError::Open`] on rejection, [`BreakerError::Inner`] with
    /// the action's own error otherwise.
    pub async fn execute<T, E, F, Fut>(&self, action: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        {
            let mut cell = self.lock();
            if cell.state == BreakerState::Open {
                let window_elapsed = cell
                    .last_failure
                    .map_or(true, |at| at.elapsed() >= self.reset_timeout);

                if !window_elapsed {
                    metrics::increment_breaker_rejected(&self.name);
                    return Err(BreakerError::Open {
                        name: self.name.clone(),
                    });
                }

                info!(breaker = %self.name, "Circuit breaker attempting reset probe");
                cell.state = BreakerState::HalfOpen;
                metrics::increment_breaker_transition(&self.name, BreakerState::HalfOpen);
            }
        }

        match action().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(BreakerError::Inner(err))
            }
        }
    }

    fn record_success(&self) {
        let mut cell = self.lock();
        if cell.state == BreakerState::HalfOpen {
            info!(breaker = %self.name, "Circuit breaker reset to closed");
            cell.state = BreakerState::Closed;
            metrics::increment_breaker_transition(&self.name, BreakerState::Closed);
        }
        cell.failure_count = 0;
    }

    fn record_failure(&self) {
        let mut cell = self.lock();
        cell.last_failure = Some(Instant::now());

        match cell.state {
            BreakerState::HalfOpen => {
                warn!(breaker = %self.name, "Probe failed, circuit breaker re-opened");
                cell.state = BreakerState::Open;
                metrics::increment_breaker_transition(&self.name, BreakerState::Open);
            }
            BreakerState::Closed => {
                cell.failure_count += 1;
                if cell.failure_count >= self.failure_threshold {
                    warn!(
                        breaker = %self.name,
                        failures = cell.failure_count,
                        "Failure threshold reached, circuit breaker opened"
                    );
                    cell.state = BreakerState::Open;
                    metrics::increment_breaker_transition(&self.name, BreakerState::Open);
                }
            }
            BreakerState::Open => {}
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerCell> {
        // A poisoned breaker mutex only means a panic elsewhere while the
        // lock was held; the tuple itself is always consistent.
        self.cell.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("failure_threshold", &self.failure_threshold)
            .field("reset_timeout", &self.reset_timeout)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn failing() -> Result<(), io::Error> {
        Err(io::Error::other("boom"))
    }

    async fn trip(breaker: &CircuitBreaker, times: u32) {
        for _ in 0..times {
            let _ = breaker.execute(|| async { failing() }).await;
        }
    }

    #[tokio::test]
    async fn success_passes_through() {
        let breaker = CircuitBreaker::new("test", 3, Duration::from_millis(50));

        let result: Result<u32, BreakerError<io::Error>> =
            breaker.execute(|| async { Ok(42) }).await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new("test", 3, Duration::from_secs(30));

        trip(&breaker, 2).await;
        assert_eq!(breaker.state(), BreakerState::Closed);

        trip(&breaker, 1).await;
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn open_rejects_without_invoking_action() {
        let breaker = CircuitBreaker::new("test", 1, Duration::from_secs(30));
        trip(&breaker, 1).await;

        let invoked = AtomicU32::new(0);
        let result: Result<(), BreakerError<io::Error>> = breaker
            .execute(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Open { .. })));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn success_resets_the_failure_counter() {
        let breaker = CircuitBreaker::new("test", 3, Duration::from_secs(30));

        // threshold - 1 failures, then a success: counter starts over.
        trip(&breaker, 2).await;
        let _: Result<(), BreakerError<io::Error>> = breaker.execute(|| async { Ok(()) }).await;

        trip(&breaker, 2).await;
        assert_eq!(breaker.state(), BreakerState::Closed);

        trip(&breaker, 1).await;
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn half_open_probe_closes_on_success() {
        let breaker = CircuitBreaker::new("test", 1, Duration::from_millis(20));
        trip(&breaker, 1).await;
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;

        let invoked = AtomicU32::new(0);
        let result: Result<(), BreakerError<io::Error>> = breaker
            .execute(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(invoked.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_probe_reopens_on_failure() {
        let breaker = CircuitBreaker::new("test", 1, Duration::from_millis(20));
        trip(&breaker, 1).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        trip(&breaker, 1).await;

        assert_eq!(breaker.state(), BreakerState::Open);

        // Fresh failure instant: still rejecting inside the new window.
        let result: Result<(), BreakerError<io::Error>> =
            breaker.execute(|| async { Ok(()) }).await;
        assert!(matches!(result, Err(BreakerError::Open { .. })));
    }

    #[tokio::test]
    async fn trip_sequence_matches_threshold_and_window() {
        let breaker = CircuitBreaker::new("source", 3, Duration::from_millis(50));
        let invoked = AtomicU32::new(0);

        // Three failing calls are all invoked, then the circuit opens.
        for _ in 0..3 {
            let result: Result<(), BreakerError<io::Error>> = breaker
                .execute(|| async {
                    invoked.fetch_add(1, Ordering::SeqCst);
                    failing()
                })
                .await;
            assert!(matches!(result, Err(BreakerError::Inner(_))));
        }
        assert_eq!(invoked.load(Ordering::SeqCst), 3);
        assert_eq!(breaker.state(), BreakerState::Open);

        // Inside the reset window: rejected without invocation.
        let result: Result<(), BreakerError<io::Error>> = breaker
            .execute(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                failing()
            })
            .await;
        assert!(result.err().is_some_and(|e| e.is_open()));
        assert_eq!(invoked.load(Ordering::SeqCst), 3);

        // After the window: exactly one probe runs in half-open.
        tokio::time::sleep(Duration::from_millis(60)).await;
        let result: Result<(), BreakerError<io::Error>> = breaker
            .execute(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(invoked.load(Ordering::SeqCst), 4);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
