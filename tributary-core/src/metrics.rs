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

//! Metrics instrumentation for pipeline observability.
//!
//! Built on the `metrics` facade crate so any exporter (Prometheus, StatsD,
//! ...) can be installed by the embedding process. All metric names follow
//! Prometheus conventions: underscores, unit suffixes, `tributary_` prefix,
//! counters ending in `_total`.
//!
//! Labels are kept to low-cardinality values only: operation names, breaker
//! names, result kinds and skip reasons. Document ids, error messages and
//! timestamps never become labels.
//!
//! # Examples
//!
//! ```rust
//! use tributary_core::metrics;
//!
//! metrics::init_metrics();
//! metrics::increment_feed_event("insert");
//! metrics::increment_egress_sent(true);
//! ```

use crate::breaker::BreakerState;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Metric name prefix for all tributary metrics.
#[doc(hidden)]
pub const METRIC_PREFIX: &str = "tributary";

/// Total classified change feed events, labeled by sanitized operation.
///
/// Type: Counter. Labels: operation.
#[doc(hidden)]
pub const FEED_EVENTS_TOTAL: &str = "tributary_feed_events_total";

/// Total feed events skipped without emission, labeled by reason.
///
/// Type: Counter. Labels: reason.
#[doc(hidden)]
pub const FEED_EVENTS_SKIPPED_TOTAL: &str = "tributary_feed_events_skipped_total";

/// Total errors swallowed inside the tailing loop.
///
/// Type: Counter.
const FEED_ERRORS_TOTAL: &str = "tributary_feed_errors_total";

/// Total egress delivery reports, labeled by result.
///
/// Type: Counter. Labels: result ("ok" | "err").
#[doc(hidden)]
pub const EGRESS_SENT_TOTAL: &str = "tributary_egress_sent_total";

/// Total egress batch flushes.
///
/// Type: Counter.
const EGRESS_FLUSHES_TOTAL: &str = "tributary_egress_flushes_total";

/// Distribution of flushed egress batch sizes.
///
/// Type: Histogram. Unit: records.
const EGRESS_BATCH_SIZE: &str = "tributary_egress_batch_size";

/// Total documents emitted by the bulk snapshot.
///
/// Type: Counter.
const SNAPSHOT_DOCUMENTS_TOTAL: &str = "tributary_snapshot_documents_total";

/// Wall-clock duration of the bulk snapshot.
///
/// Type: Histogram. Unit: seconds.
#[doc(hidden)]
pub const SNAPSHOT_DURATION_SECONDS: &str = "tributary_snapshot_duration_seconds";

/// Total resume-cursor save attempts, labeled by result.
///
/// Type: Counter. Labels: result ("ok" | "err").
const CURSOR_SAVES_TOTAL: &str = "tributary_cursor_saves_total";

/// Total resume-cursor load failures (other than absence).
///
/// Type: Counter.
const CURSOR_LOAD_ERRORS_TOTAL: &str = "tributary_cursor_load_errors_total";

/// Total breaker state transitions, labeled by breaker and target state.
///
/// Type: Counter. Labels: breaker, state.
const BREAKER_TRANSITIONS_TOTAL: &str = "tributary_breaker_transitions_total";

/// Total calls rejected by an open breaker.
///
/// Type: Counter. Labels: breaker.
const BREAKER_REJECTED_TOTAL: &str = "tributary_breaker_rejected_total";

/// Wall-clock duration of graceful shutdown.
///
/// Type: Histogram. Unit: seconds.
const SHUTDOWN_DURATION_SECONDS: &str = "tributary_shutdown_duration_seconds";

/// Registers descriptions for all metrics.
///
/// Call once at startup, before the pipeline runs, so exporters can attach
/// help texts.
pub fn init_metrics() {
    describe_counter!(
        FEED_EVENTS_TOTAL,
        "Total change feed events classified by the processor"
    );
    describe_counter!(
        FEED_EVENTS_SKIPPED_TOTAL,
        "Total change feed events skipped without emission"
    );
    describe_counter!(
        FEED_ERRORS_TOTAL,
        "Total errors swallowed inside the change feed loop"
    );
    describe_counter!(EGRESS_SENT_TOTAL, "Total egress record delivery reports");
    describe_counter!(EGRESS_FLUSHES_TOTAL, "Total egress batch flushes");
    describe_counter!(
        SNAPSHOT_DOCUMENTS_TOTAL,
        "Total documents emitted by the bulk snapshot"
    );
    describe_counter!(
        CURSOR_SAVES_TOTAL,
        "Total resume-cursor save attempts by result"
    );
    describe_counter!(
        CURSOR_LOAD_ERRORS_TOTAL,
        "Total resume-cursor load failures other than absence"
    );
    describe_counter!(
        BREAKER_TRANSITIONS_TOTAL,
        "Total circuit breaker state transitions"
    );
    describe_counter!(
        BREAKER_REJECTED_TOTAL,
        "Total calls rejected by an open circuit breaker"
    );

    describe_histogram!(
        EGRESS_BATCH_SIZE,
        metrics::Unit::Count,
        "Distribution of flushed egress batch sizes"
    );
    describe_histogram!(
        SNAPSHOT_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Wall-clock duration of the bulk snapshot"
    );
    describe_histogram!(
        SHUTDOWN_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Wall-clock duration of graceful shutdown"
    );
}

/// Increments the classified feed event counter.
///
/// `operation` must already be sanitized through the whitelist.
pub fn increment_feed_event(operation: &'static str) {
    counter!(FEED_EVENTS_TOTAL, "operation" => operation).increment(1);
}

/// Increments the skipped feed event counter.
pub fn increment_feed_skipped(reason: &'static str) {
    counter!(FEED_EVENTS_SKIPPED_TOTAL, "reason" => reason).increment(1);
}

/// Increments the swallowed loop error counter.
pub fn increment_feed_error() {
    counter!(FEED_ERRORS_TOTAL).increment(1);
}

/// Records one egress delivery report.
pub fn increment_egress_sent(ok: bool) {
    let result = if ok { "ok" } else { "err" };
    counter!(EGRESS_SENT_TOTAL, "result" => result).increment(1);
}

/// Records a flushed egress batch and its size.
pub fn record_egress_flush(batch_size: usize) {
    counter!(EGRESS_FLUSHES_TOTAL).increment(1);
    histogram!(EGRESS_BATCH_SIZE).record(batch_size as f64);
}

/// Increments the snapshot document counter by `count`.
pub fn increment_snapshot_documents(count: u64) {
    counter!(SNAPSHOT_DOCUMENTS_TOTAL).increment(count);
}

/// Records the total duration of a snapshot run.
pub fn record_snapshot_duration(duration: Duration) {
    histogram!(SNAPSHOT_DURATION_SECONDS).record(duration.as_secs_f64());
}

/// Records one resume-cursor save attempt.
pub fn increment_cursor_save(ok: bool) {
    let result = if ok { "ok" } else { "err" };
    counter!(CURSOR_SAVES_TOTAL, "result" => result).increment(1);
}

/// Increments the resume-cursor load failure counter.
pub fn increment_cursor_load_error() {
    counter!(CURSOR_LOAD_ERRORS_TOTAL).increment(1);
}

/// Records a breaker state transition.
pub fn increment_breaker_transition(breaker: &str, state: BreakerState) {
    counter!(
        BREAKER_TRANSITIONS_TOTAL,
        "breaker" => breaker.to_string(),
        "state" => state.as_str()
    )
    .increment(1);
}

/// Records a call rejected by an open breaker.
pub fn increment_breaker_rejected(breaker: &str) {
    counter!(BREAKER_REJECTED_TOTAL, "breaker" => breaker.to_string()).increment(1);
}

/// Records the duration of a graceful shutdown pass.
pub fn record_shutdown_duration(duration: Duration) {
    histogram!(SHUTDOWN_DURATION_SECONDS).record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_follow_conventions() {
        assert!(FEED_EVENTS_TOTAL.starts_with(METRIC_PREFIX));
        assert!(FEED_EVENTS_TOTAL.ends_with("_total"));
        assert!(EGRESS_SENT_TOTAL.ends_with("_total"));
        assert!(SNAPSHOT_DURATION_SECONDS.ends_with("_seconds"));
    }

    #[test]
    fn recording_without_an_exporter_is_a_noop() {
        // The facade must accept calls before any recorder is installed.
        init_metrics();
        increment_feed_event("insert");
        increment_feed_skipped("marker");
        increment_egress_sent(true);
        record_egress_flush(10);
        increment_cursor_save(false);
    }
}
