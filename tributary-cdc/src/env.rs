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

//! Environment-variable configuration loading.
//!
//! The daemon is configured entirely through environment variables; the
//! core components only ever see validated config structs. The presence of
//! both `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY` (non-empty)
//! selects the S3 cursor backing, otherwise the local file backing is
//! used.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tributary_core::config::{ConfigError, PipelineConfig, SourceConfig};
use tributary_egress::kafka::{Acks, Compression, EgressConfigError, KafkaEgressConfig};

/// Errors raised while loading settings from the environment.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// A variable was present but unparsable.
    #[error("invalid value for {name}: {value}")]
    Invalid {
        /// The environment variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },

    /// Core configuration validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Egress configuration validation failed.
    #[error(transparent)]
    Egress(#[from] EgressConfigError),
}

/// Where the resume cursor lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorBacking {
    /// Local file at the given path.
    Local {
        /// Path of the token file.
        path: PathBuf,
    },

    /// S3 object at `bucket/key` in `region`.
    Remote {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// AWS region.
        region: String,
    },
}

/// Fully validated daemon settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Source collection configuration.
    pub source: SourceConfig,

    /// Pipeline-level configuration.
    pub pipeline: PipelineConfig,

    /// Kafka egress configuration.
    pub egress: KafkaEgressConfig,

    /// Selected cursor backing.
    pub cursor: CursorBacking,
}

impl Settings {
    /// Loads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error for unparsable values or failed validation.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(&|name| std::env::var(name).ok())
    }

    /// Loads settings through an explicit variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error for unparsable values or failed validation.
    pub fn from_lookup(get: &dyn Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let source = SourceConfig::builder()
            .uri(var_or(get, "MONGODB_URI", "mongodb://localhost:27017"))
            .database(var_or(get, "MONGODB_DATABASE", "mydb"))
            .collection(var_or(get, "MONGODB_COLLECTION", "mycollection"))
            .batch_size(parsed(get, "MONGODB_BATCH_SIZE", 1000)?)
            .min_pool_size(parsed(get, "MONGODB_MIN_POOL_SIZE", 1)?)
            .max_pool_size(parsed(get, "MONGODB_MAX_POOL_SIZE", 10)?)
            .connect_timeout(Duration::from_millis(parsed(
                get,
                "MONGODB_CONNECT_TIMEOUT_MS",
                30_000,
            )?))
            .read_timeout(Duration::from_millis(parsed(
                get,
                "MONGODB_READ_TIMEOUT_MS",
                30_000,
            )?))
            .build()?;

        let pipeline = PipelineConfig::builder()
            .snapshot_enabled(parsed(get, "INITIAL_LOAD_ENABLED", true)?)
            .snapshot_force(parsed(get, "INITIAL_LOAD_FORCE", false)?)
            .health_port(parsed(get, "HEALTH_PORT", 8080)?)
            .retry_max_attempts(parsed(get, "RETRY_MAX_ATTEMPTS", 5)?)
            .retry_backoff(Duration::from_millis(parsed(
                get,
                "RETRY_BACKOFF_MS",
                1000,
            )?))
            .build()?;

        let acks: Acks = parse_var(get, "KAFKA_ACKS")?.unwrap_or_default();
        let compression: Compression = parse_var(get, "KAFKA_COMPRESSION")?.unwrap_or_default();

        let egress = KafkaEgressConfig::builder()
            .bootstrap_servers(var_or(get, "KAFKA_BOOTSTRAP_SERVERS", "localhost:9092"))
            .topic(var_or(get, "KAFKA_TOPIC", "mongodb-data"))
            .client_id(var_or(get, "KAFKA_CLIENT_ID", "tributary-cdc"))
            .max_request_bytes(parsed(get, "KAFKA_MAX_REQUEST_SIZE", 1_048_576)?)
            .acks(acks)
            .batch_count(parsed(get, "KAFKA_BATCH_SIZE", 100)?)
            .linger_ms(parsed(get, "KAFKA_LINGER_MS", 0)?)
            .compression(compression)
            .idempotent(parsed(get, "KAFKA_IDEMPOTENT", true)?)
            .retry_max_attempts(pipeline.retry_max_attempts)
            .retry_backoff_ms(u64::try_from(pipeline.retry_backoff.as_millis()).unwrap_or(1000))
            .build()?;

        let cursor = if has_aws_credentials(get) {
            CursorBacking::Remote {
                bucket: var_or(get, "RESUME_TOKEN_BUCKET", "mongo-kafka-cdc-tokens"),
                key: var_or(get, "RESUME_TOKEN_KEY", "resume-token.json"),
                region: var_or(get, "AWS_REGION", "us-east-1"),
            }
        } else {
            CursorBacking::Local {
                path: PathBuf::from(var_or(get, "RESUME_TOKEN_PATH", "./resume-token.json")),
            }
        };

        Ok(Self {
            source,
            pipeline,
            egress,
            cursor,
        })
    }
}

fn has_aws_credentials(get: &dyn Fn(&str) -> Option<String>) -> bool {
    let non_empty = |name: &str| get(name).is_some_and(|v| !v.is_empty());
    non_empty("AWS_ACCESS_KEY_ID") && non_empty("AWS_SECRET_ACCESS_KEY")
}

fn var_or(get: &dyn Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    match get(name) {
        Some(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn parsed<T: FromStr>(
    get: &dyn Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, SettingsError> {
    Ok(parse_var(get, name)?.unwrap_or(default))
}

fn parse_var<T: FromStr>(
    get: &dyn Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, SettingsError> {
    match get(name) {
        Some(value) if !value.is_empty() => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| SettingsError::Invalid { name, value }),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_select_local_cursor_backing() {
        let settings = Settings::from_lookup(&lookup(&[])).unwrap();

        assert_eq!(settings.source.uri, "mongodb://localhost:27017");
        assert_eq!(settings.source.batch_size, 1000);
        assert_eq!(settings.egress.topic, "mongodb-data");
        assert_eq!(settings.egress.batch_count, 100);
        assert!(settings.pipeline.snapshot_enabled);
        assert_eq!(
            settings.cursor,
            CursorBacking::Local {
                path: PathBuf::from("./resume-token.json")
            }
        );
    }

    #[test]
    fn aws_credentials_select_remote_backing() {
        let settings = Settings::from_lookup(&lookup(&[
            ("AWS_ACCESS_KEY_ID", "AKIA123"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_REGION", "eu-west-1"),
            ("RESUME_TOKEN_BUCKET", "my-tokens"),
        ]))
        .unwrap();

        assert_eq!(
            settings.cursor,
            CursorBacking::Remote {
                bucket: "my-tokens".to_string(),
                key: "resume-token.json".to_string(),
                region: "eu-west-1".to_string(),
            }
        );
    }

    #[test]
    fn empty_credentials_fall_back_to_local() {
        let settings = Settings::from_lookup(&lookup(&[
            ("AWS_ACCESS_KEY_ID", ""),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]))
        .unwrap();

        assert!(matches!(settings.cursor, CursorBacking::Local { .. }));
    }

    #[test]
    fn overrides_are_applied() {
        let settings = Settings::from_lookup(&lookup(&[
            ("MONGODB_DATABASE", "orders"),
            ("MONGODB_COLLECTION", "events"),
            ("MONGODB_BATCH_SIZE", "250"),
            ("KAFKA_BATCH_SIZE", "50"),
            ("KAFKA_ACKS", "1"),
            ("KAFKA_COMPRESSION", "snappy"),
            ("INITIAL_LOAD_ENABLED", "false"),
        ]))
        .unwrap();

        assert_eq!(settings.source.database, "orders");
        assert_eq!(settings.source.collection, "events");
        assert_eq!(settings.source.batch_size, 250);
        assert_eq!(settings.egress.batch_count, 50);
        assert_eq!(settings.egress.acks, Acks::Leader);
        assert_eq!(settings.egress.compression, Compression::Snappy);
        assert!(!settings.pipeline.snapshot_enabled);
    }

    #[test]
    fn unparsable_values_are_rejected() {
        let err = Settings::from_lookup(&lookup(&[("MONGODB_BATCH_SIZE", "many")])).unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid {
                name: "MONGODB_BATCH_SIZE",
                ..
            }
        ));

        let err = Settings::from_lookup(&lookup(&[("KAFKA_ACKS", "quorum")])).unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid {
                name: "KAFKA_ACKS",
                ..
            }
        ));
    }
}
