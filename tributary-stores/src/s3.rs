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

//! S3-backed cursor store.
//!
//! Keeps the resume token as a single object at `bucket/key`, relying on
//! the object store's atomic PUT for crash safety. Chosen when AWS
//! credentials are configured. Custom endpoints and path-style addressing
//! are supported for S3-compatible stores (LocalStack, MinIO).

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bson::Document;
use tracing::{debug, info, warn};
use tributary_core::cursor::{CursorStore, CursorStoreError};

use crate::{token_from_bytes, token_to_bytes};

/// Configuration for the S3 cursor store.
#[derive(Debug, Clone)]
pub struct S3StoreConfig {
    /// Bucket holding the token object.
    pub bucket: String,

    /// Object key of the token.
    pub key: String,

    /// AWS region.
    pub region: String,

    /// Custom endpoint URL for S3-compatible stores.
    pub endpoint_url: Option<String>,

    /// Use path-style addressing (required by most S3 emulators).
    pub force_path_style: bool,
}

impl S3StoreConfig {
    /// Creates a configuration with the given bucket, key and region.
    #[must_use]
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            region: region.into(),
            endpoint_url: None,
            force_path_style: false,
        }
    }

    /// Sets a custom endpoint URL.
    #[must_use]
    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    /// Enables path-style addressing.
    #[must_use]
    pub fn force_path_style(mut self, force: bool) -> Self {
        self.force_path_style = force;
        self
    }
}

/// Cursor store backed by an S3 object.
pub struct S3CursorStore {
    client: S3Client,
    bucket: String,
    key: String,
}

impl S3CursorStore {
    /// Creates the store, initializing the AWS SDK with its default
    /// credential providers.
    pub async fn new(config: S3StoreConfig) -> Self {
        info!(
            bucket = %config.bucket,
            key = %config.key,
            region = %config.region,
            "Using S3 resume cursor storage"
        );

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if let Some(ref endpoint_url) = config.endpoint_url {
            debug!(endpoint = %endpoint_url, "Using custom S3 endpoint");
            loader = loader.endpoint_url(endpoint_url);
        }

        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(builder.build()),
            bucket: config.bucket,
            key: config.key,
        }
    }

    /// Creates the store from an existing client (used by tests against
    /// S3-compatible endpoints).
    #[must_use]
    pub fn with_client(client: S3Client, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

#[async_trait]
impl CursorStore for S3CursorStore {
    async fn load(&self) -> Result<Option<Document>, CursorStoreError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| CursorStoreError::Backend(e.to_string()))?
                    .into_bytes();

                debug!(bucket = %self.bucket, key = %self.key, "Loaded resume cursor from S3");
                token_from_bytes(&bytes).map(Some)
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(aws_sdk_s3::operation::get_object::GetObjectError::is_no_such_key) =>
            {
                warn!(bucket = %self.bucket, key = %self.key, "No resume cursor object found");
                Ok(None)
            }
            Err(err) => Err(CursorStoreError::Backend(err.to_string())),
        }
    }

    async fn save(&self, token: &Document) -> Result<(), CursorStoreError> {
        let bytes = token_to_bytes(token)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .body(ByteStream::from(bytes))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| CursorStoreError::Backend(e.to_string()))?;

        debug!(bucket = %self.bucket, key = %self.key, "Saved resume cursor to S3");
        Ok(())
    }

    async fn close(&self) -> Result<(), CursorStoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_carries_endpoint_overrides() {
        let config = S3StoreConfig::new("tokens", "resume-token.json", "us-east-1")
            .endpoint_url("http://localhost:4566")
            .force_path_style(true);

        assert_eq!(config.bucket, "tokens");
        assert_eq!(config.key, "resume-token.json");
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:4566"));
        assert!(config.force_path_style);
    }
}
