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

//! Pipeline configuration types.
//!
//! Configuration is validated at build time and immutable afterwards.
//! [`SourceConfig`] describes the watched collection and connection
//! tuning; [`PipelineConfig`] carries the pipeline-level knobs (snapshot
//! gating, retry policy, breaker thresholds).
//!
//! # Example
//!
//! ```rust
//! use tributary_core::config::{PipelineConfig, SourceConfig};
//!
//! # fn example() -> Result<(), tributary_core::config::ConfigError> {
//! let source = SourceConfig::builder()
//!     .uri("mongodb://localhost:27017")
//!     .database("mydb")
//!     .collection("mycollection")
//!     .batch_size(500)
//!     .build()?;
//!
//! let pipeline = PipelineConfig::builder()
//!     .snapshot_enabled(true)
//!     .retry_max_attempts(5)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Missing required source URI.
    #[error("source uri is required")]
    MissingUri,

    /// Missing required database name.
    #[error("database is required")]
    MissingDatabase,

    /// Missing required collection name.
    #[error("collection is required")]
    MissingCollection,

    /// Invalid batch size.
    #[error("invalid batch_size: {value} ({reason})")]
    InvalidBatchSize {
        /// The rejected value.
        value: u32,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Invalid connection pool bounds.
    #[error("invalid pool bounds: min {min} exceeds max {max}")]
    InvalidPoolBounds {
        /// Configured minimum pool size.
        min: u32,
        /// Configured maximum pool size.
        max: u32,
    },

    /// Invalid retry policy.
    #[error("invalid retry policy: {reason}")]
    InvalidRetryPolicy {
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Invalid breaker settings.
    #[error("invalid breaker settings: {reason}")]
    InvalidBreaker {
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Source-collection configuration.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Connection URI.
    pub uri: String,

    /// Database name.
    pub database: String,

    /// Collection name.
    pub collection: String,

    /// Server-side batch size for scans and feed reads.
    pub batch_size: u32,

    /// Minimum connection pool size.
    pub min_pool_size: u32,

    /// Maximum connection pool size.
    pub max_pool_size: u32,

    /// Connection establishment timeout.
    pub connect_timeout: Duration,

    /// Upper bound on a single blocking read.
    pub read_timeout: Duration,
}

impl SourceConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> SourceConfigBuilder {
        SourceConfigBuilder::default()
    }
}

/// Builder for [`SourceConfig`].
#[derive(Debug, Default)]
pub struct SourceConfigBuilder {
    uri: Option<String>,
    database: Option<String>,
    collection: Option<String>,
    batch_size: Option<u32>,
    min_pool_size: Option<u32>,
    max_pool_size: Option<u32>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
}

impl SourceConfigBuilder {
    /// Sets the connection URI.
    #[must_use]
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Sets the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Sets the collection name.
    #[must_use]
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Sets the server-side batch size. Default: 1000.
    #[must_use]
    pub fn batch_size(mut self, size: u32) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Sets the minimum pool size. Default: 1.
    #[must_use]
    pub fn min_pool_size(mut self, size: u32) -> Self {
        self.min_pool_size = Some(size);
        self
    }

    /// Sets the maximum pool size. Default: 10.
    #[must_use]
    pub fn max_pool_size(mut self, size: u32) -> Self {
        self.max_pool_size = Some(size);
        self
    }

    /// Sets the connect timeout. Default: 30 s.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the read timeout. Default: 30 s.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or values are out of
    /// range.
    pub fn build(self) -> Result<SourceConfig, ConfigError> {
        let uri = self.uri.ok_or(ConfigError::MissingUri)?;
        let database = self.database.ok_or(ConfigError::MissingDatabase)?;
        let collection = self.collection.ok_or(ConfigError::MissingCollection)?;

        let batch_size = match self.batch_size {
            None => 1000,
            Some(0) => {
                return Err(ConfigError::InvalidBatchSize {
                    value: 0,
                    reason: "batch_size must be greater than 0",
                })
            }
            Some(size) => size,
        };

        let min_pool_size = self.min_pool_size.unwrap_or(1);
        let max_pool_size = self.max_pool_size.unwrap_or(10);
        if min_pool_size > max_pool_size {
            return Err(ConfigError::InvalidPoolBounds {
                min: min_pool_size,
                max: max_pool_size,
            });
        }

        Ok(SourceConfig {
            uri,
            database,
            collection,
            batch_size,
            min_pool_size,
            max_pool_size,
            connect_timeout: self.connect_timeout.unwrap_or(Duration::from_secs(30)),
            read_timeout: self.read_timeout.unwrap_or(Duration::from_secs(30)),
        })
    }
}

/// Pipeline-level configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Whether the bulk snapshot runs before tailing.
    pub snapshot_enabled: bool,

    /// Re-run the snapshot even when a resume cursor already exists.
    pub snapshot_force: bool,

    /// Port the external health prober binds to.
    pub health_port: u16,

    /// Maximum consecutive failed tail runs before giving up.
    pub retry_max_attempts: u32,

    /// Base pause between tail restarts.
    pub retry_backoff: Duration,

    /// Consecutive failures before the source breaker opens.
    pub breaker_failure_threshold: u32,

    /// How long the source breaker stays open before probing.
    pub breaker_reset_timeout: Duration,
}

impl PipelineConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    snapshot_enabled: Option<bool>,
    snapshot_force: Option<bool>,
    health_port: Option<u16>,
    retry_max_attempts: Option<u32>,
    retry_backoff: Option<Duration>,
    breaker_failure_threshold: Option<u32>,
    breaker_reset_timeout: Option<Duration>,
}

impl PipelineConfigBuilder {
    /// Enables or disables the bulk snapshot. Default: enabled.
    #[must_use]
    pub fn snapshot_enabled(mut self, enabled: bool) -> Self {
        self.snapshot_enabled = Some(enabled);
        self
    }

    /// Forces the snapshot to run even when a cursor exists. Default: off.
    #[must_use]
    pub fn snapshot_force(mut self, force: bool) -> Self {
        self.snapshot_force = Some(force);
        self
    }

    /// Sets the health prober port. Default: 8080.
    #[must_use]
    pub fn health_port(mut self, port: u16) -> Self {
        self.health_port = Some(port);
        self
    }

    /// Sets the maximum consecutive failed tail runs. Default: 5.
    #[must_use]
    pub fn retry_max_attempts(mut self, attempts: u32) -> Self {
        self.retry_max_attempts = Some(attempts);
        self
    }

    /// Sets the base pause between tail restarts. Default: 1 s.
    #[must_use]
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = Some(backoff);
        self
    }

    /// Sets the breaker failure threshold. Default: 3.
    #[must_use]
    pub fn breaker_failure_threshold(mut self, threshold: u32) -> Self {
        self.breaker_failure_threshold = Some(threshold);
        self
    }

    /// Sets the breaker reset timeout. Default: 30 s.
    #[must_use]
    pub fn breaker_reset_timeout(mut self, timeout: Duration) -> Self {
        self.breaker_reset_timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the retry policy or breaker settings are out of
    /// range.
    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        let retry_max_attempts = self.retry_max_attempts.unwrap_or(5);
        if retry_max_attempts == 0 {
            return Err(ConfigError::InvalidRetryPolicy {
                reason: "retry_max_attempts must be greater than 0",
            });
        }

        let retry_backoff = self.retry_backoff.unwrap_or(Duration::from_millis(1000));
        if retry_backoff.is_zero() {
            return Err(ConfigError::InvalidRetryPolicy {
                reason: "retry_backoff must be greater than 0",
            });
        }

        let breaker_failure_threshold = self.breaker_failure_threshold.unwrap_or(3);
        if breaker_failure_threshold == 0 {
            return Err(ConfigError::InvalidBreaker {
                reason: "failure_threshold must be greater than 0",
            });
        }

        Ok(PipelineConfig {
            snapshot_enabled: self.snapshot_enabled.unwrap_or(true),
            snapshot_force: self.snapshot_force.unwrap_or(false),
            health_port: self.health_port.unwrap_or(8080),
            retry_max_attempts,
            retry_backoff,
            breaker_failure_threshold,
            breaker_reset_timeout: self
                .breaker_reset_timeout
                .unwrap_or(Duration::from_secs(30)),
        })
    }
}
